//! Modbus TCP transport for charge-controller and battery-monitor devices
//!
//! This library owns the wire side of the monitor: one TCP session per
//! configured device, carrying FC03 (read holding registers) and FC16
//! (write multiple registers) requests. Framing and PDU encoding come from
//! `voltage_modbus`.
//!
//! # Architecture
//!
//! ```text
//! charge-modbus
//!     ├── ModbusSession (exclusive access gate, lazy reconnect, timeouts)
//!     │       └── voltage_modbus::ModbusTcpClient (MBAP + PDU)
//!     ├── ModbusError (connection / io / timeout / protocol / exception)
//!     └── RegisterTransport (trait seam used by the poller and command path)
//! ```
//!
//! Every operation on a [`ModbusSession`] holds the session gate for the
//! whole request/response round trip, so a read and a write issued from
//! different tasks never interleave on the wire.

pub mod constants;
mod error;
mod session;
mod traits;

#[cfg(feature = "simulator")]
pub mod simulator;

pub use error::{ExceptionCode, ModbusError, Result};
pub use session::{ModbusSession, SessionConfig};
pub use traits::RegisterTransport;
