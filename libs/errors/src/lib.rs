//! Unified error handling for the charge monitor service
//!
//! Library crates keep their own error enums (`ModbusError`, `ModelError`).
//! Everything that crosses into the service is folded into `MonitorError`,
//! whose `category()` places it in the service taxonomy:
//! connection, protocol, validation, write, configuration, not-found, internal.

use charge_modbus::ModbusError;
use charge_model::ModelError;
use thiserror::Error;

// ============================================================================
// MonitorError - Main error type
// ============================================================================

/// Main error type for the monitor service
#[derive(Debug, Error)]
pub enum MonitorError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Transport Errors
    // ======================================
    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Write failed at {address:#06X}: {reason}")]
    WriteFailed { address: u16, reason: String },

    // ======================================
    // Validation Errors
    // ======================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("unknown device type: {0}")]
    UnknownDeviceType(String),

    #[error("Device '{device}' is a {actual} device; {operation} requires {required}")]
    KindMismatch {
        device: String,
        operation: String,
        required: String,
        actual: String,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),

    // ======================================
    // Lookup Errors
    // ======================================
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No running instance for device '{device}' (instance {instance})")]
    InstanceNotFound { device: String, instance: String },

    #[error("Device already set up: {0}")]
    AlreadyExists(String),

    // ======================================
    // System Errors
    // ======================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result alias used across the service
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Map a transport failure on the write path
    pub fn write_failed(address: u16, err: &ModbusError) -> Self {
        Self::WriteFailed {
            address,
            reason: err.to_string(),
        }
    }

    /// Attach the device endpoint to a transport failure
    pub fn from_modbus(endpoint: &str, err: ModbusError) -> Self {
        match err {
            ModbusError::Connection(reason) | ModbusError::Io(reason) => Self::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason,
            },
            ModbusError::Timeout(_) => Self::Timeout(endpoint.to_string()),
            other => Self::from(other),
        }
    }
}

impl From<ModbusError> for MonitorError {
    fn from(err: ModbusError) -> Self {
        match err {
            ModbusError::Connection(reason) | ModbusError::Io(reason) => Self::ConnectionFailed {
                endpoint: "modbus".to_string(),
                reason,
            },
            ModbusError::Timeout(msg) => Self::Timeout(msg),
            ModbusError::Protocol(_) | ModbusError::Exception { .. } => {
                Self::Protocol(err.to_string())
            },
            ModbusError::InvalidRequest(msg) => Self::Validation(msg),
        }
    }
}

impl From<ModelError> for MonitorError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownDeviceType(id) => Self::UnknownDeviceType(id),
            ModelError::UnknownKey(_) => Self::Internal(err.to_string()),
            other => Self::Configuration(other.to_string()),
        }
    }
}

// ============================================================================
// Error classification
// ============================================================================

/// Service error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Socket could not be opened, was lost, or timed out
    Connection,
    /// Device answered with an exception or a malformed frame
    Protocol,
    /// Request rejected before touching the device
    Validation,
    /// Control write rejected by the device or transport
    Write,
    /// Configuration or profile definition error
    Configuration,
    /// Unknown device or instance
    NotFound,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Protocol => "protocol",
            Self::Validation => "validation",
            Self::Write => "write",
            Self::Configuration => "configuration",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification shared by service errors
pub trait MonitorErrorTrait: std::error::Error {
    /// Stable machine-readable code
    fn error_code(&self) -> &'static str;

    fn category(&self) -> ErrorCategory;

    /// Whether the next scheduled attempt may succeed
    fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Connection)
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Write => Level::ERROR,
            ErrorCategory::Connection | ErrorCategory::Protocol => Level::WARN,
            ErrorCategory::Validation | ErrorCategory::NotFound => Level::INFO,
            ErrorCategory::Configuration => Level::ERROR,
        }
    }
}

impl MonitorErrorTrait for MonitorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::WriteFailed { .. } => "WRITE_FAILED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnknownDeviceType(_) => "UNKNOWN_DEVICE_TYPE",
            Self::KindMismatch { .. } => "KIND_MISMATCH",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            Self::InstanceNotFound { .. } => "INSTANCE_NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "UNKNOWN_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } | Self::AlreadyExists(_) => {
                ErrorCategory::Configuration
            },
            Self::ConnectionFailed { .. } | Self::Timeout(_) => ErrorCategory::Connection,
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::WriteFailed { .. } => ErrorCategory::Write,
            Self::Validation(_)
            | Self::UnknownDeviceType(_)
            | Self::KindMismatch { .. }
            | Self::MissingField(_) => ErrorCategory::Validation,
            Self::DeviceNotFound(_) | Self::InstanceNotFound { .. } => ErrorCategory::NotFound,
            Self::Internal(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }
}
