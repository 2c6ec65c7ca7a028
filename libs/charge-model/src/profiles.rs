//! Built-in device profiles
//!
//! Addresses, encodings and scales follow the Renogy register maps for the
//! smart battery monitor and the DCC-series DC-DC chargers.

use crate::formula::Formula;
use crate::profile::{DeviceProfile, RegisterSpec, VirtualSpec};
use crate::types::{DeviceKind, Encoding};

// ============================================================================
// Smart Battery
// ============================================================================

pub const SMART_BATTERY_PROFILE: DeviceProfile = DeviceProfile {
    id: "smart_battery",
    display_name: "Smart Battery",
    kind: DeviceKind::Battery,
    registers: &[
        RegisterSpec::new("current", "Current", 0x13B2, Encoding::Int16)
            .scale(0.01)
            .unit("A"),
        RegisterSpec::new("voltage", "Voltage", 0x13B3, Encoding::Uint16)
            .scale(0.1)
            .unit("V"),
        // Capacity, device-specific two-register packing
        RegisterSpec::new("cap_reg1", "Capacity Reg1", 0x13B4, Encoding::Uint16).diagnostic(),
        RegisterSpec::new("cap_reg2", "Capacity Reg2", 0x13B5, Encoding::Uint16).diagnostic(),
        RegisterSpec::new("maxcap_reg1", "Max Capacity Reg1", 0x13B6, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("maxcap_reg2", "Max Capacity Reg2", 0x13B7, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("cycles", "Cycles", 0x13B8, Encoding::Uint16).unit("cycles"),
        // Cell temperatures (decimal addresses in the vendor map)
        RegisterSpec::new("temp1", "Cell 1 Temperature Raw", 5018, Encoding::Int16)
            .scale(0.1)
            .unit("°C")
            .diagnostic(),
        RegisterSpec::new("temp2", "Cell 2 Temperature Raw", 5019, Encoding::Int16)
            .scale(0.1)
            .unit("°C")
            .diagnostic(),
        RegisterSpec::new("temp3", "Cell 3 Temperature Raw", 5020, Encoding::Int16)
            .scale(0.1)
            .unit("°C")
            .diagnostic(),
        RegisterSpec::new("temp4", "Cell 4 Temperature Raw", 5021, Encoding::Int16)
            .scale(0.1)
            .unit("°C")
            .diagnostic(),
    ],
    virtuals: &[
        VirtualSpec::new("capacity_ah", "Capacity", Formula::CapacityAh).unit("Ah"),
        VirtualSpec::new("max_capacity_ah", "Max Capacity", Formula::MaxCapacityAh).unit("Ah"),
        VirtualSpec::new("percentage", "Percentage", Formula::Percentage).unit("%"),
        VirtualSpec::new("remaining_wh", "Remaining Wh", Formula::RemainingWh).unit("Wh"),
        VirtualSpec::new("temperature", "Temperature", Formula::AverageTemp).unit("°C"),
        VirtualSpec::new("state", "State", Formula::ChargingState),
        VirtualSpec::new("wattage", "Wattage", Formula::Wattage).unit("W"),
    ],
};

// ============================================================================
// DC-DC Charger
// ============================================================================

pub const DC_TO_DC_PROFILE: DeviceProfile = DeviceProfile {
    id: "dc_to_dc",
    display_name: "DC-DC Charger (DCC50S / DCC30S / Smart Charger)",
    kind: DeviceKind::DcToDc,
    registers: &[
        // Product information
        RegisterSpec::new("modbus_address", "Modbus Address", 0x001A, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("rated_voltage_raw", "Rated Voltage Raw", 0x000A, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("set_current_raw", "Set Current Raw", 0xE001, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("serial_raw", "Serial Raw", 0x0018, Encoding::Uint32).diagnostic(),
        RegisterSpec::new("software_raw", "Software Raw", 0x0014, Encoding::Uint32).diagnostic(),
        RegisterSpec::new("hardware_raw", "Hardware Raw", 0x0016, Encoding::Uint32).diagnostic(),
        // Battery side
        RegisterSpec::new("batt_soc_raw", "Battery SOC Raw", 0x0100, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("batt_voltage_raw", "Battery Voltage Raw", 0x0101, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("batt_current_raw", "Battery Current Raw", 0x0102, Encoding::Int16)
            .diagnostic(),
        // High byte internal, low byte probe
        RegisterSpec::new(
            "temp_packed_raw",
            "Temperature Packed Raw",
            0x0103,
            Encoding::Uint16,
        )
        .diagnostic(),
        // Alternator input
        RegisterSpec::new("alt_voltage_raw", "Alternator Voltage Raw", 0x0104, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("alt_current_raw", "Alternator Current Raw", 0x0105, Encoding::Int16)
            .diagnostic(),
        RegisterSpec::new("alt_power_raw", "Alternator Power Raw", 0x0106, Encoding::Int16)
            .diagnostic(),
        // Hookup / PV input
        RegisterSpec::new("pv_voltage_raw", "Hookup Voltage Raw", 0x0107, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("pv_current_raw", "Hookup Current Raw", 0x0108, Encoding::Int16)
            .diagnostic(),
        // Energy
        RegisterSpec::new("energy_today_raw", "Energy Today Raw", 0x0113, Encoding::Uint16)
            .diagnostic(),
        RegisterSpec::new("energy_total_raw", "Energy Total Raw", 0x011C, Encoding::Uint32)
            .diagnostic(),
        // State / alarms
        RegisterSpec::new("state_raw", "State Raw", 0x0120, Encoding::Uint16).diagnostic(),
        RegisterSpec::new("alarm_a_raw", "Alarm A Raw", 0x0121, Encoding::Uint16).diagnostic(),
        RegisterSpec::new("alarm_b_raw", "Alarm B Raw", 0x0122, Encoding::Uint16).diagnostic(),
    ],
    virtuals: &[
        VirtualSpec::new("rated_voltage", "Rated Voltage", Formula::RatedVoltage)
            .unit("V")
            .precision(0),
        VirtualSpec::new("rated_current", "Rated Current", Formula::RatedCurrent)
            .unit("A")
            .precision(0),
        VirtualSpec::new("batt_soc", "Battery SOC", Formula::BattSoc).unit("%"),
        VirtualSpec::new("batt_voltage", "Battery Voltage", Formula::BattVoltage)
            .unit("V")
            .precision(1),
        VirtualSpec::new("batt_current", "Battery Current", Formula::BattCurrent)
            .unit("A")
            .precision(2),
        VirtualSpec::new("temp_internal", "Internal Temperature", Formula::TempInternal)
            .unit("°C"),
        VirtualSpec::new("temp_probe", "Probe Temperature", Formula::TempProbe).unit("°C"),
        VirtualSpec::new("alt_voltage", "Alternator Voltage", Formula::AltVoltage)
            .unit("V")
            .precision(1),
        VirtualSpec::new("alt_current", "Alternator Current", Formula::AltCurrent)
            .unit("A")
            .precision(2),
        VirtualSpec::new("alt_power", "Alternator Power", Formula::AltPower).unit("W"),
        VirtualSpec::new("pv_voltage", "Hookup Voltage", Formula::PvVoltage)
            .unit("V")
            .precision(1),
        VirtualSpec::new("pv_current", "Hookup Current", Formula::PvCurrent)
            .unit("A")
            .precision(2),
        VirtualSpec::new("pv_power", "Hookup Power", Formula::PvPower).unit("W"),
        VirtualSpec::new("energy_today", "Energy Today", Formula::EnergyToday).unit("Wh"),
        VirtualSpec::new("energy_total", "Energy Total", Formula::EnergyTotal).unit("Wh"),
        VirtualSpec::new("charger_state", "Charger State", Formula::ChargerState),
        VirtualSpec::new("alarms", "Charger Alarms", Formula::Alarms),
        VirtualSpec::new("max_charge_current", "Max Charge Current", Formula::MaxChargeCurrent)
            .unit("A")
            .precision(1),
    ],
};

/// All profiles shipped with the monitor, in registry order
pub const BUILTIN_PROFILES: &[&DeviceProfile] = &[&SMART_BATTERY_PROFILE, &DC_TO_DC_PROFILE];
