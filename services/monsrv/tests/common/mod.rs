//! Shared fixtures: simulators seeded with realistic register maps

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use charge_modbus::simulator::ModbusTcpSimulator;
use charge_model::ProfileRegistry;
use monsrv::{DeviceConfig, DeviceManager};

pub const UNIT_ID: u8 = 1;

/// Battery drawing 1 A at 13.2 V, 85.536 of 200 Ah, cells 21-23 °C
pub const BATTERY_REGISTERS: &[(u16, u16)] = &[
    (0x13B2, 0xFF9C),
    (0x13B3, 132),
    (0x13B4, 1),
    (0x13B5, 20000),
    (0x13B6, 3),
    (0x13B7, 3392),
    (0x13B8, 12),
    (5018, 210),
    (5019, 220),
    (5020, 230),
    (5021, 220),
];

/// 12 V / 50 A charger in boost, battery over temp alarm
pub const CHARGER_REGISTERS: &[(u16, u16)] = &[
    (0x001A, 1),
    (0x000A, 0x0C32),
    (0xE001, 2000),
    (0x0018, 0x0001),
    (0x0019, 0x0002),
    (0x0014, 0x0001),
    (0x0015, 0x0100),
    (0x0016, 0x0001),
    (0x0017, 0x0000),
    (0x0100, 87),
    (0x0101, 132),
    (0x0102, 0xFB2E),
    (0x0103, 0x1E19),
    (0x0104, 141),
    (0x0105, 1050),
    (0x0106, 148),
    (0x0107, 187),
    (0x0108, 333),
    (0x0113, 420),
    (0x011C, 0x0001),
    (0x011D, 0x86A0),
    (0x0120, 4),
    (0x0121, 0),
    (0x0122, 1 << 6),
];

pub async fn start_simulator(registers: &[(u16, u16)]) -> ModbusTcpSimulator {
    let sim = ModbusTcpSimulator::start(UNIT_ID).await.unwrap();
    sim.set_registers(registers);
    sim
}

/// Device entry pointing at `sim` with test-friendly timing
pub fn device_config(sim: &ModbusTcpSimulator, name: &str, device_type: &str) -> DeviceConfig {
    let mut config = DeviceConfig::new(name, "127.0.0.1", sim.port(), device_type);
    config.unit_id = sim.unit_id();
    config.poll_interval_secs = 1;
    config.operation_timeout_ms = 300;
    config.connect_timeout_ms = 500;
    config
}

pub fn manager() -> DeviceManager {
    DeviceManager::new(ProfileRegistry::builtin().unwrap())
}
