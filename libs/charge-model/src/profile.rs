//! Profile schema structs (compile-time constants)

use serde::Serialize;

use crate::formula::Formula;
use crate::types::{Category, DeviceKind, Encoding};

/// One polled register or register pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegisterSpec {
    /// Unique within the profile
    pub key: &'static str,
    pub display_name: &'static str,
    pub address: u16,
    pub encoding: Encoding,
    /// Multiplier applied after decoding; `None` means 1
    pub scale: Option<f64>,
    pub unit: Option<&'static str>,
    pub category: Option<Category>,
}

impl RegisterSpec {
    pub const fn new(
        key: &'static str,
        display_name: &'static str,
        address: u16,
        encoding: Encoding,
    ) -> Self {
        Self {
            key,
            display_name,
            address,
            encoding,
            scale: None,
            unit: None,
            category: None,
        }
    }

    pub const fn scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn diagnostic(mut self) -> Self {
        self.category = Some(Category::Diagnostic);
        self
    }

    pub const fn word_count(&self) -> u16 {
        self.encoding.word_count()
    }
}

/// One derived value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VirtualSpec {
    /// Unique within the profile, disjoint from register keys
    pub key: &'static str,
    pub display_name: &'static str,
    pub unit: Option<&'static str>,
    pub formula: Formula,
    /// Rounding digits for numeric results
    pub precision: Option<u8>,
}

impl VirtualSpec {
    pub const fn new(key: &'static str, display_name: &'static str, formula: Formula) -> Self {
        Self {
            key,
            display_name,
            unit: None,
            formula,
            precision: None,
        }
    }

    pub const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn precision(mut self, digits: u8) -> Self {
        self.precision = Some(digits);
        self
    }
}

/// Static description of one device family
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub id: &'static str,
    pub display_name: &'static str,
    pub kind: DeviceKind,
    /// Poll order
    pub registers: &'static [RegisterSpec],
    /// Evaluation order; a spec may read keys of earlier specs
    pub virtuals: &'static [VirtualSpec],
}

impl DeviceProfile {
    pub fn register(&self, key: &str) -> Option<&'static RegisterSpec> {
        self.registers.iter().find(|r| r.key == key)
    }

    pub fn virtual_spec(&self, key: &str) -> Option<&'static VirtualSpec> {
        self.virtuals.iter().find(|v| v.key == key)
    }

    /// Position of a register key in poll order
    pub fn register_index(&self, key: &str) -> Option<usize> {
        self.registers.iter().position(|r| r.key == key)
    }

    pub fn register_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registers.iter().map(|r| r.key)
    }

    pub fn virtual_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.virtuals.iter().map(|v| v.key)
    }
}
