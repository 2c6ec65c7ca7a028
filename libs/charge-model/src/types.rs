//! Register encodings, entity categories and device kinds

use serde::{Deserialize, Serialize};

/// On-wire encoding of a register value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Uint16,
    /// Two's complement 16-bit
    Int16,
    /// Two consecutive words, high word first
    Uint32,
}

impl Encoding {
    /// Number of 16-bit words occupied on the device
    pub const fn word_count(&self) -> u16 {
        match self {
            Self::Uint16 | Self::Int16 => 1,
            Self::Uint32 => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Uint32 => "uint32",
        }
    }
}

/// Entity classification exposed on the read surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Diagnostic,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diagnostic => "diagnostic",
        }
    }
}

/// Capability class of a device profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Smart battery with a built-in monitor
    Battery,
    /// DC-DC charger with a writable charge-current limit
    DcToDc,
}

impl DeviceKind {
    pub fn all() -> &'static [DeviceKind] {
        &[Self::Battery, Self::DcToDc]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::DcToDc => "dc_to_dc",
        }
    }

    /// Parse from string (use try_parse to avoid trait conflict)
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "battery" => Some(Self::Battery),
            "dc_to_dc" => Some(Self::DcToDc),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
