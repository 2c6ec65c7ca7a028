//! Transport error types

use std::fmt;
use thiserror::Error;

/// Result type for charge-modbus operations
pub type Result<T> = std::result::Result<T, ModbusError>;

/// Modbus exception code returned by the remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionCode(pub u8);

impl ExceptionCode {
    /// Standard description of the exception code
    pub fn description(&self) -> &'static str {
        match self.0 {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Slave Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Slave Device Busy",
            0x07 => "Negative Acknowledge",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.0)
    }
}

/// Modbus transport errors
#[derive(Debug, Error, Clone)]
pub enum ModbusError {
    /// Socket could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// IO error on an established stream
    #[error("IO error: {0}")]
    Io(String),

    /// Operation did not complete in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Malformed or mismatched response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Device answered with an exception response
    #[error("Modbus exception on FC{function:02X}: {code}")]
    Exception { function: u8, code: ExceptionCode },

    /// Request rejected before it reached the wire
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ModbusError {
    pub fn connection(msg: impl Into<String>) -> Self {
        ModbusError::Connection(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        ModbusError::Io(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        ModbusError::Timeout(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ModbusError::Protocol(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ModbusError::InvalidRequest(msg.into())
    }

    /// The session could not reach the device at all
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ModbusError::Connection(_))
    }

    /// The device answered, but not with usable data
    pub fn is_protocol_failure(&self) -> bool {
        matches!(
            self,
            ModbusError::Protocol(_) | ModbusError::Exception { .. }
        )
    }

    /// Check if the stream must be dropped before the next request
    ///
    /// A timed-out or garbled exchange can leave a late response in the
    /// socket buffer, which would be read as the answer to the next request.
    pub fn needs_reconnect(&self) -> bool {
        matches!(
            self,
            ModbusError::Connection(_)
                | ModbusError::Io(_)
                | ModbusError::Timeout(_)
                | ModbusError::Protocol(_)
        )
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::Io(err.to_string())
    }
}

/// Classify client errors by what they mean for the stream
///
/// Anything that is not a timeout, a framing problem or an exception
/// response is treated as a broken stream.
impl From<voltage_modbus::ModbusError> for ModbusError {
    fn from(err: voltage_modbus::ModbusError) -> Self {
        use voltage_modbus::ModbusError as ClientError;

        match err {
            ClientError::Exception { function, code, .. } => ModbusError::Exception {
                function: function & 0x7F,
                code: ExceptionCode(code),
            },
            ClientError::Timeout { .. } => ModbusError::Timeout(err.to_string()),
            ClientError::Frame { .. } => ModbusError::Protocol(err.to_string()),
            other => ModbusError::Io(other.to_string()),
        }
    }
}
