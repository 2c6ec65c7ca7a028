//! Control write path
//!
//! Physical value in, one FC16 write out. The profile kind is checked
//! before anything touches the transport; failures go straight back to the
//! caller without retry.

use charge_modbus::RegisterTransport;
use charge_model::{DeviceKind, DeviceProfile};
use errors::{MonitorError, MonitorResult};
use tracing::{error, info};

/// Max charge current limit on DC-DC chargers, in 0.01 A
pub const MAX_CHARGE_CURRENT_REGISTER: u16 = 0xE001;

/// A writable register and the profile kind that exposes it
#[derive(Debug, Clone, Copy)]
pub struct ControlRegister {
    pub address: u16,
    pub name: &'static str,
    pub required_kind: DeviceKind,
    /// Register units per physical unit
    pub factor: f64,
}

pub const CONTROL_REGISTERS: &[ControlRegister] = &[ControlRegister {
    address: MAX_CHARGE_CURRENT_REGISTER,
    name: "set max charge current",
    required_kind: DeviceKind::DcToDc,
    factor: 100.0,
}];

pub fn control_register(address: u16) -> Option<&'static ControlRegister> {
    CONTROL_REGISTERS.iter().find(|r| r.address == address)
}

/// Scale a physical value into the register domain: `round(value * factor)`
pub fn scale_to_register(value: f64, factor: f64) -> MonitorResult<u16> {
    if !value.is_finite() {
        return Err(MonitorError::validation(format!(
            "value {} is not a finite number",
            value
        )));
    }
    let scaled = (value * factor).round();
    if !(0.0..=f64::from(u16::MAX)).contains(&scaled) {
        return Err(MonitorError::validation(format!(
            "value {} scales to {} which is outside 0..=65535",
            value, scaled
        )));
    }
    Ok(scaled as u16)
}

/// Validate, scale and write one control register
///
/// Returns the register value written.
pub async fn set_control_register(
    transport: &dyn RegisterTransport,
    device_name: &str,
    profile: &DeviceProfile,
    address: u16,
    physical_value: f64,
) -> MonitorResult<u16> {
    let register = control_register(address).ok_or_else(|| {
        MonitorError::validation(format!("register {:#06X} is not writable", address))
    })?;

    if profile.kind != register.required_kind {
        return Err(MonitorError::KindMismatch {
            device: device_name.to_string(),
            operation: register.name.to_string(),
            required: register.required_kind.to_string(),
            actual: profile.kind.to_string(),
        });
    }

    let scaled = scale_to_register(physical_value, register.factor)?;
    info!(
        "{}: {} {} (register {:#06X} <- {})",
        device_name, register.name, physical_value, address, scaled
    );

    transport
        .write_registers(address, &[scaled])
        .await
        .map_err(|e| {
            error!("{}: write to {:#06X} failed: {}", device_name, address, e);
            MonitorError::write_failed(address, &e)
        })?;

    Ok(scaled)
}
