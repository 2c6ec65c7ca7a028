//! Profile registry with load-time referential checks

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::profile::DeviceProfile;
use crate::profiles::BUILTIN_PROFILES;

/// Validated set of device profiles, keyed by profile id
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<&'static DeviceProfile>,
    by_id: HashMap<&'static str, usize>,
}

impl ProfileRegistry {
    /// Registry holding the shipped profiles
    pub fn builtin() -> Result<Self> {
        Self::from_profiles(BUILTIN_PROFILES)
    }

    /// Validate and index `profiles`
    pub fn from_profiles(profiles: &[&'static DeviceProfile]) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(profiles.len());
        for (index, profile) in profiles.iter().enumerate() {
            validate_profile(profile)?;
            if by_id.insert(profile.id, index).is_some() {
                return Err(ModelError::DuplicateProfile(profile.id.to_string()));
            }
            debug!(
                "Profile '{}' loaded: {} registers, {} virtuals",
                profile.id,
                profile.registers.len(),
                profile.virtuals.len()
            );
        }

        Ok(Self {
            profiles: profiles.to_vec(),
            by_id,
        })
    }

    /// Resolve a device type id
    pub fn get(&self, device_type: &str) -> Result<&'static DeviceProfile> {
        self.by_id
            .get(device_type)
            .map(|&index| self.profiles[index])
            .ok_or_else(|| ModelError::UnknownDeviceType(device_type.to_string()))
    }

    pub fn contains(&self, device_type: &str) -> bool {
        self.by_id.contains_key(device_type)
    }

    /// Profiles in registration order
    pub fn profiles(&self) -> &[&'static DeviceProfile] {
        &self.profiles
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.profiles.iter().map(|p| p.id)
    }
}

/// Check key uniqueness, key disjointness and formula input resolution
pub fn validate_profile(profile: &DeviceProfile) -> Result<()> {
    let mut raw_keys = HashSet::new();
    for register in profile.registers {
        if !raw_keys.insert(register.key) {
            return Err(ModelError::DuplicateKey {
                profile: profile.id.to_string(),
                key: register.key.to_string(),
            });
        }
        let last = u32::from(register.address) + u32::from(register.word_count()) - 1;
        if last > u32::from(u16::MAX) {
            return Err(ModelError::InvalidRegister {
                profile: profile.id.to_string(),
                key: register.key.to_string(),
                reason: format!(
                    "{} words at {:#06X} exceed the address space",
                    register.word_count(),
                    register.address
                ),
            });
        }
        if matches!(register.scale, Some(s) if !s.is_finite()) {
            return Err(ModelError::InvalidRegister {
                profile: profile.id.to_string(),
                key: register.key.to_string(),
                reason: "scale is not finite".to_string(),
            });
        }
    }

    // Inputs resolve against raw keys plus virtual keys declared earlier
    let mut resolved: HashSet<&str> = raw_keys.clone();
    let mut virtual_keys = HashSet::new();
    for spec in profile.virtuals {
        if raw_keys.contains(spec.key) {
            return Err(ModelError::KeyCollision {
                profile: profile.id.to_string(),
                key: spec.key.to_string(),
            });
        }
        if !virtual_keys.insert(spec.key) {
            return Err(ModelError::DuplicateKey {
                profile: profile.id.to_string(),
                key: spec.key.to_string(),
            });
        }
        if let Some(input) = spec
            .formula
            .inputs()
            .iter()
            .find(|input| !resolved.contains(**input))
        {
            return Err(ModelError::UnresolvedInput {
                profile: profile.id.to_string(),
                key: spec.key.to_string(),
                input: (*input).to_string(),
            });
        }
        resolved.insert(spec.key);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::formula::Formula;
    use crate::profile::{RegisterSpec, VirtualSpec};
    use crate::types::{DeviceKind, Encoding};

    const RAW_V: RegisterSpec = RegisterSpec::new("pv_voltage_raw", "V", 0x0107, Encoding::Uint16);
    const RAW_I: RegisterSpec = RegisterSpec::new("pv_current_raw", "I", 0x0108, Encoding::Int16);

    #[test]
    fn test_builtin_registry_loads() {
        let registry = ProfileRegistry::builtin().unwrap();
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["smart_battery", "dc_to_dc"]
        );
        assert_eq!(registry.get("dc_to_dc").unwrap().kind, DeviceKind::DcToDc);
    }

    #[test]
    fn test_unknown_device_type() {
        let registry = ProfileRegistry::builtin().unwrap();
        let err = registry.get("inverter").unwrap_err();
        assert_eq!(err.to_string(), "unknown device type: inverter");
        assert!(!registry.contains("inverter"));
    }

    #[test]
    fn test_duplicate_register_key_rejected() {
        static PROFILE: DeviceProfile = DeviceProfile {
            id: "dup",
            display_name: "Dup",
            kind: DeviceKind::Battery,
            registers: &[RAW_V, RAW_V],
            virtuals: &[],
        };
        assert!(matches!(
            ProfileRegistry::from_profiles(&[&PROFILE]),
            Err(ModelError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_virtual_key_collision_rejected() {
        static PROFILE: DeviceProfile = DeviceProfile {
            id: "collide",
            display_name: "Collide",
            kind: DeviceKind::DcToDc,
            registers: &[RAW_V],
            virtuals: &[VirtualSpec::new("pv_voltage_raw", "V", Formula::PvVoltage)],
        };
        assert!(matches!(
            validate_profile(&PROFILE),
            Err(ModelError::KeyCollision { .. })
        ));
    }

    #[test]
    fn test_derived_input_must_be_declared_earlier() {
        // pv_power listed before the virtuals it reads
        static PROFILE: DeviceProfile = DeviceProfile {
            id: "order",
            display_name: "Order",
            kind: DeviceKind::DcToDc,
            registers: &[RAW_V, RAW_I],
            virtuals: &[
                VirtualSpec::new("pv_power", "P", Formula::PvPower),
                VirtualSpec::new("pv_voltage", "V", Formula::PvVoltage),
                VirtualSpec::new("pv_current", "I", Formula::PvCurrent),
            ],
        };
        match validate_profile(&PROFILE).unwrap_err() {
            ModelError::UnresolvedInput { key, input, .. } => {
                assert_eq!(key, "pv_power");
                assert_eq!(input, "pv_voltage");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_raw_input_rejected() {
        static PROFILE: DeviceProfile = DeviceProfile {
            id: "missing",
            display_name: "Missing",
            kind: DeviceKind::Battery,
            registers: &[RAW_V],
            virtuals: &[VirtualSpec::new("wattage", "W", Formula::Wattage)],
        };
        assert!(matches!(
            validate_profile(&PROFILE),
            Err(ModelError::UnresolvedInput { .. })
        ));
    }

    #[test]
    fn test_register_past_address_space_rejected() {
        static PROFILE: DeviceProfile = DeviceProfile {
            id: "edge",
            display_name: "Edge",
            kind: DeviceKind::DcToDc,
            registers: &[RegisterSpec::new("tail", "Tail", 0xFFFF, Encoding::Uint32)],
            virtuals: &[],
        };
        assert!(matches!(
            validate_profile(&PROFILE),
            Err(ModelError::InvalidRegister { .. })
        ));
    }

    #[test]
    fn test_duplicate_profile_id_rejected() {
        let err = ProfileRegistry::from_profiles(&[
            &crate::profiles::DC_TO_DC_PROFILE,
            &crate::profiles::DC_TO_DC_PROFILE,
        ])
        .unwrap_err();
        assert_eq!(err, ModelError::DuplicateProfile("dc_to_dc".into()));
    }
}
