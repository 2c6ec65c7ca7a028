//! Running device instance and its read surface
//!
//! An instance bundles the transport, the coordinator, the profile and the
//! device name. Every register and virtual spec of the profile is exposed
//! as a named sensor whose value tracks the latest published tick.

use std::sync::Arc;

use charge_modbus::RegisterTransport;
use charge_model::{Category, DerivedValue, DeviceProfile};
use serde::Serialize;

use crate::coordinator::Coordinator;

pub const MANUFACTURER: &str = "Renogy";

/// Identity of the physical device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    /// Decoded register
    Raw,
    /// Formula output
    Virtual,
}

/// Static description of one exposed value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorDescriptor {
    pub unique_id: String,
    pub name: String,
    pub key: &'static str,
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub source: SensorSource,
}

/// Current value of one sensor; `None` when absent this tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub unique_id: String,
    pub key: &'static str,
    pub value: Option<DerivedValue>,
    pub unit: Option<&'static str>,
}

/// One configured device, alive from setup until teardown
pub struct DeviceInstance {
    instance_id: String,
    device_id: String,
    device_name: String,
    profile: &'static DeviceProfile,
    transport: Arc<dyn RegisterTransport>,
    coordinator: Coordinator,
}

impl DeviceInstance {
    pub fn new(
        instance_id: String,
        device_id: String,
        device_name: String,
        profile: &'static DeviceProfile,
        transport: Arc<dyn RegisterTransport>,
        coordinator: Coordinator,
    ) -> Self {
        Self {
            instance_id,
            device_id,
            device_name,
            profile,
            transport,
            coordinator,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    pub fn transport(&self) -> &dyn RegisterTransport {
        self.transport.as_ref()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifier: self.device_name.clone(),
            manufacturer: MANUFACTURER,
            model: self.profile.display_name,
        }
    }

    /// Raw sensors in poll order, then virtual sensors in formula order
    pub fn sensors(&self) -> Vec<SensorDescriptor> {
        let raw = self.profile.registers.iter().map(|spec| SensorDescriptor {
            unique_id: self.unique_id(spec.key),
            name: format!("{} {}", self.device_name, spec.display_name),
            key: spec.key,
            unit: spec.unit,
            category: spec.category,
            source: SensorSource::Raw,
        });
        let virtuals = self.profile.virtuals.iter().map(|spec| SensorDescriptor {
            unique_id: self.unique_id(spec.key),
            name: format!("{} {}", self.device_name, spec.display_name),
            key: spec.key,
            unit: spec.unit,
            category: None,
            source: SensorSource::Virtual,
        });
        raw.chain(virtuals).collect()
    }

    /// Values from the latest tick, derived values recomputed now
    pub fn readings(&self) -> Vec<SensorReading> {
        let state = self.coordinator.current();
        let derived = state.derived();

        let raw = state
            .snapshot
            .iter()
            .zip(self.profile.registers)
            .map(|((key, value), spec)| SensorReading {
                unique_id: self.unique_id(key),
                key,
                value: value.map(DerivedValue::Number),
                unit: spec.unit,
            });
        let virtuals = derived
            .iter()
            .zip(self.profile.virtuals)
            .map(|((key, value), spec)| SensorReading {
                unique_id: self.unique_id(key),
                key,
                value: value.cloned(),
                unit: spec.unit,
            });
        raw.chain(virtuals).collect()
    }

    /// Stop polling, then release the transport
    pub async fn shutdown(&self) {
        self.coordinator.stop().await;
        self.transport.close().await;
    }

    fn unique_id(&self, key: &str) -> String {
        format!("{}_{}", self.device_name, key)
    }
}

impl std::fmt::Debug for DeviceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInstance")
            .field("instance_id", &self.instance_id)
            .field("device_id", &self.device_id)
            .field("device_name", &self.device_name)
            .field("profile", &self.profile.id)
            .finish()
    }
}
