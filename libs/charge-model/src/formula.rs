//! Formula identifiers
//!
//! The set of formulas is closed: a virtual spec names one of these
//! variants, and the registry checks its inputs once at load time.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ModelError;

/// Built-in formula kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    // === Smart battery ===
    CapacityAh,
    MaxCapacityAh,
    Percentage,
    RemainingWh,
    AverageTemp,
    ChargingState,
    Wattage,

    // === DC-DC charger ===
    RatedVoltage,
    RatedCurrent,
    BattSoc,
    BattVoltage,
    BattCurrent,
    TempInternal,
    TempProbe,
    AltVoltage,
    AltCurrent,
    AltPower,
    PvVoltage,
    PvCurrent,
    /// Product of the derived hookup voltage and current
    PvPower,
    EnergyToday,
    EnergyTotal,
    ChargerState,
    Alarms,
    MaxChargeCurrent,
}

impl Formula {
    pub fn all() -> &'static [Formula] {
        &[
            Self::CapacityAh,
            Self::MaxCapacityAh,
            Self::Percentage,
            Self::RemainingWh,
            Self::AverageTemp,
            Self::ChargingState,
            Self::Wattage,
            Self::RatedVoltage,
            Self::RatedCurrent,
            Self::BattSoc,
            Self::BattVoltage,
            Self::BattCurrent,
            Self::TempInternal,
            Self::TempProbe,
            Self::AltVoltage,
            Self::AltCurrent,
            Self::AltPower,
            Self::PvVoltage,
            Self::PvCurrent,
            Self::PvPower,
            Self::EnergyToday,
            Self::EnergyTotal,
            Self::ChargerState,
            Self::Alarms,
            Self::MaxChargeCurrent,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapacityAh => "capacity_ah",
            Self::MaxCapacityAh => "max_capacity_ah",
            Self::Percentage => "percentage",
            Self::RemainingWh => "remaining_wh",
            Self::AverageTemp => "average_temp",
            Self::ChargingState => "charging_state",
            Self::Wattage => "wattage",
            Self::RatedVoltage => "rated_voltage",
            Self::RatedCurrent => "rated_current",
            Self::BattSoc => "batt_soc",
            Self::BattVoltage => "batt_voltage",
            Self::BattCurrent => "batt_current",
            Self::TempInternal => "temp_internal",
            Self::TempProbe => "temp_probe",
            Self::AltVoltage => "alt_voltage",
            Self::AltCurrent => "alt_current",
            Self::AltPower => "alt_power",
            Self::PvVoltage => "pv_voltage",
            Self::PvCurrent => "pv_current",
            Self::PvPower => "pv_power",
            Self::EnergyToday => "energy_today",
            Self::EnergyTotal => "energy_total",
            Self::ChargerState => "charger_state",
            Self::Alarms => "alarms",
            Self::MaxChargeCurrent => "max_charge_current",
        }
    }

    /// Keys the formula reads, in argument order
    ///
    /// Keys are register keys, except for `PvPower` which reads the derived
    /// hookup voltage and current.
    pub fn inputs(&self) -> &'static [&'static str] {
        match self {
            Self::CapacityAh => &["cap_reg1", "cap_reg2"],
            Self::MaxCapacityAh => &["maxcap_reg1", "maxcap_reg2"],
            Self::Percentage => &["cap_reg1", "cap_reg2", "maxcap_reg1", "maxcap_reg2"],
            Self::RemainingWh => &["cap_reg1", "cap_reg2", "voltage"],
            Self::AverageTemp => &["temp1", "temp2", "temp3", "temp4"],
            Self::ChargingState => &["current"],
            Self::Wattage => &["voltage", "current"],
            Self::RatedVoltage | Self::RatedCurrent => &["rated_voltage_raw"],
            Self::BattSoc => &["batt_soc_raw"],
            Self::BattVoltage => &["batt_voltage_raw"],
            Self::BattCurrent => &["batt_current_raw"],
            Self::TempInternal | Self::TempProbe => &["temp_packed_raw"],
            Self::AltVoltage => &["alt_voltage_raw"],
            Self::AltCurrent => &["alt_current_raw"],
            Self::AltPower => &["alt_power_raw"],
            Self::PvVoltage => &["pv_voltage_raw"],
            Self::PvCurrent => &["pv_current_raw"],
            Self::PvPower => &["pv_voltage", "pv_current"],
            Self::EnergyToday => &["energy_today_raw"],
            Self::EnergyTotal => &["energy_total_raw"],
            Self::ChargerState => &["state_raw"],
            Self::Alarms => &["alarm_a_raw", "alarm_b_raw"],
            Self::MaxChargeCurrent => &["set_current_raw"],
        }
    }

    /// True when the formula yields a label rather than a number
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::ChargingState | Self::ChargerState | Self::Alarms
        )
    }

    /// Parse from string (use try_parse to avoid trait conflict)
    pub fn try_parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.as_str() == s)
    }
}

impl FromStr for Formula {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s).ok_or_else(|| ModelError::UnknownFormula(s.to_string()))
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_formula_name_roundtrip() {
        for formula in Formula::all() {
            assert_eq!(formula.as_str().parse::<Formula>().unwrap(), *formula);
        }
    }

    #[test]
    fn test_unknown_formula_rejected() {
        let err = "state_of_health".parse::<Formula>().unwrap_err();
        assert_eq!(err, ModelError::UnknownFormula("state_of_health".into()));
    }

    #[test]
    fn test_every_formula_has_inputs() {
        for formula in Formula::all() {
            assert!(!formula.inputs().is_empty(), "{formula} has no inputs");
        }
    }

    #[test]
    fn test_pv_power_reads_derived_keys() {
        assert_eq!(Formula::PvPower.inputs(), &["pv_voltage", "pv_current"]);
    }
}
