//! Model Layer Error Types

use thiserror::Error;

/// Result type for charge-model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Model layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Device type id not present in the registry
    #[error("unknown device type: {0}")]
    UnknownDeviceType(String),

    /// Two profiles registered under the same id
    #[error("Duplicate profile id: {0}")]
    DuplicateProfile(String),

    /// Key appears twice among a profile's registers or virtual specs
    #[error("Duplicate key '{key}' in profile '{profile}'")]
    DuplicateKey { profile: String, key: String },

    /// Virtual key shadows a register key
    #[error("Virtual key '{key}' collides with a register key in profile '{profile}'")]
    KeyCollision { profile: String, key: String },

    /// Formula input not produced by any register or earlier virtual spec
    #[error("Virtual '{key}' in profile '{profile}' depends on unresolved input '{input}'")]
    UnresolvedInput {
        profile: String,
        key: String,
        input: String,
    },

    /// Register definition that cannot be read as declared
    #[error("Invalid register '{key}' in profile '{profile}': {reason}")]
    InvalidRegister {
        profile: String,
        key: String,
        reason: String,
    },

    /// Formula name does not resolve
    #[error("Unknown formula: {0}")]
    UnknownFormula(String),

    /// Snapshot write for a key the profile does not define
    #[error("Unknown register key: {0}")]
    UnknownKey(String),
}
