//! Per-tick value containers
//!
//! `None` is the absent marker: the register read failed or the formula had
//! an absent input. It is never conflated with zero.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{ModelError, Result};
use crate::profile::DeviceProfile;

/// One poll tick's decoded register values
///
/// Holds exactly one slot per register of its profile, in poll order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    profile: &'static DeviceProfile,
    values: Vec<Option<f64>>,
    taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Every key absent
    pub fn absent(profile: &'static DeviceProfile) -> Self {
        Self {
            profile,
            values: vec![None; profile.registers.len()],
            taken_at: Utc::now(),
        }
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Value for a register key; `None` for absent or unknown keys
    pub fn get(&self, key: &str) -> Option<f64> {
        self.profile
            .register_index(key)
            .and_then(|index| self.values[index])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.profile.register_index(key).is_some()
    }

    pub fn set(&mut self, key: &str, value: Option<f64>) -> Result<()> {
        let index = self
            .profile
            .register_index(key)
            .ok_or_else(|| ModelError::UnknownKey(key.to_string()))?;
        self.values[index] = value;
        Ok(())
    }

    /// Set the slot at a poll-order position
    pub fn set_at(&mut self, index: usize, value: Option<f64>) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(key, value)` pairs in poll order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<f64>)> + '_ {
        self.profile
            .registers
            .iter()
            .zip(self.values.iter())
            .map(|(spec, value)| (spec.key, *value))
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn all_absent(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

/// Result of one formula
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DerivedValue {
    Number(f64),
    Text(String),
}

impl DerivedValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(t) => Some(t),
        }
    }
}

impl std::fmt::Display for DerivedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

/// Derived values for one snapshot, in virtual-spec order
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSnapshot {
    profile: &'static DeviceProfile,
    values: Vec<Option<DerivedValue>>,
}

impl DerivedSnapshot {
    pub fn new(profile: &'static DeviceProfile, values: Vec<Option<DerivedValue>>) -> Self {
        Self { profile, values }
    }

    pub fn get(&self, key: &str) -> Option<&DerivedValue> {
        self.profile
            .virtuals
            .iter()
            .position(|v| v.key == key)
            .and_then(|index| self.values.get(index))
            .and_then(Option::as_ref)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(DerivedValue::as_number)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(DerivedValue::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&DerivedValue>)> + '_ {
        self.profile
            .virtuals
            .iter()
            .zip(self.values.iter())
            .map(|(spec, value)| (spec.key, value.as_ref()))
    }
}

impl Serialize for DerivedSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}
