//! Modbus TCP protocol constants
//!
//! Framing lives in `voltage_modbus`; these are the limits and codes the
//! session and the simulator still need by name.

/// MBAP header length up to (not including) the unit identifier:
/// transaction id (2) + protocol id (2) + length (2)
pub const MBAP_HEADER_LEN: usize = 6;

/// Maximum registers per FC03 request
pub const MODBUS_MAX_READ_REGISTERS: u16 = 125;

/// Maximum registers per FC16 request
pub const MODBUS_MAX_WRITE_REGISTERS: u16 = 123;

/// Read holding registers
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Write multiple registers
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Standard Modbus TCP port
pub const DEFAULT_TCP_PORT: u16 = 502;
