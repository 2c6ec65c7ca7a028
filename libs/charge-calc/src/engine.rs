//! Formula engine
//!
//! Evaluates a profile's virtual specs over one snapshot. Specs run in
//! declaration order, so a formula may read the numeric output of an
//! earlier spec. Chained formulas see unrounded values; precision applies
//! only to what is published.

use std::collections::HashMap;
use tracing::debug;

use charge_model::{DerivedSnapshot, DerivedValue, Formula, Snapshot, VirtualSpec};

use crate::functions::{
    alarms, average_temp, charger_state, charging_state, combine_capacity, high_byte, linear,
    low_byte, percentage, remaining_wh, round, wattage,
};

/// Stateless evaluator for the built-in formulas
#[derive(Debug, Default, Clone, Copy)]
pub struct FormulaEngine;

impl FormulaEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute every virtual value of the snapshot's profile
    pub fn derive(&self, snapshot: &Snapshot) -> DerivedSnapshot {
        let profile = snapshot.profile();
        let mut scratch: HashMap<&'static str, f64> = HashMap::new();
        let mut values = Vec::with_capacity(profile.virtuals.len());

        for spec in profile.virtuals {
            let value = self.evaluate(spec.formula, |key| {
                scratch.get(key).copied().or_else(|| snapshot.get(key))
            });

            if let Some(DerivedValue::Number(n)) = &value {
                scratch.insert(spec.key, *n);
            }
            values.push(value.map(|v| apply_precision(spec, v)));
        }

        let absent = values.iter().filter(|v| v.is_none()).count();
        if absent > 0 {
            debug!(
                "Derived {} values for '{}', {} absent",
                values.len(),
                profile.id,
                absent
            );
        }

        DerivedSnapshot::new(profile, values)
    }

    /// Evaluate one formula, resolving its inputs through `lookup`
    pub fn evaluate<F>(&self, formula: Formula, lookup: F) -> Option<DerivedValue>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let args: Vec<Option<f64>> = formula.inputs().iter().map(|key| lookup(*key)).collect();
        let number = |v: Option<f64>| v.map(DerivedValue::Number);

        match formula {
            Formula::CapacityAh | Formula::MaxCapacityAh => {
                number(combine_capacity(args[0], args[1]))
            },
            Formula::Percentage => number(percentage(
                combine_capacity(args[0], args[1]),
                combine_capacity(args[2], args[3]),
            )),
            Formula::RemainingWh => {
                number(remaining_wh(combine_capacity(args[0], args[1]), args[2]))
            },
            Formula::AverageTemp => number(average_temp(&args)),
            Formula::ChargingState => {
                charging_state(args[0]).map(|s| DerivedValue::Text(s.to_string()))
            },
            Formula::Wattage => number(wattage(args[0], args[1])),

            Formula::RatedVoltage | Formula::TempInternal => number(high_byte(args[0])),
            Formula::RatedCurrent | Formula::TempProbe => number(low_byte(args[0])),
            Formula::BattVoltage | Formula::AltVoltage | Formula::PvVoltage => {
                number(linear(args[0], 0.1))
            },
            Formula::BattCurrent
            | Formula::AltCurrent
            | Formula::PvCurrent
            | Formula::MaxChargeCurrent => number(linear(args[0], 0.01)),
            Formula::BattSoc | Formula::AltPower | Formula::EnergyToday | Formula::EnergyTotal => {
                number(args[0])
            },
            Formula::PvPower => number(wattage(args[0], args[1])),
            Formula::ChargerState => charger_state(args[0]).map(DerivedValue::Text),
            Formula::Alarms => Some(DerivedValue::Text(alarms(args[0], args[1]))),
        }
    }
}

fn apply_precision(spec: &VirtualSpec, value: DerivedValue) -> DerivedValue {
    match (spec.precision, value) {
        (Some(digits), DerivedValue::Number(n)) => DerivedValue::Number(round(n, i32::from(digits))),
        (_, value) => value,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use charge_model::profiles::{DC_TO_DC_PROFILE, SMART_BATTERY_PROFILE};

    fn battery_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::absent(&SMART_BATTERY_PROFILE);
        for (key, value) in [
            ("current", 2.5),
            ("voltage", 13.2),
            ("cap_reg1", 1.0),
            ("cap_reg2", 20000.0),
            ("maxcap_reg1", 3.0),
            ("maxcap_reg2", 3392.0),
            ("cycles", 12.0),
            ("temp1", 21.0),
            ("temp3", 23.0),
        ] {
            snapshot.set(key, Some(value)).unwrap();
        }
        snapshot
    }

    fn charger_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::absent(&DC_TO_DC_PROFILE);
        for (key, value) in [
            ("rated_voltage_raw", f64::from(0x0C32_u16)),
            ("set_current_raw", 2000.0),
            ("batt_soc_raw", 87.0),
            ("batt_voltage_raw", 132.0),
            ("batt_current_raw", -1234.0),
            ("temp_packed_raw", f64::from(0x1E19_u16)),
            ("alt_voltage_raw", 141.0),
            ("alt_current_raw", 1050.0),
            ("alt_power_raw", 148.0),
            ("pv_voltage_raw", 187.0),
            ("pv_current_raw", 333.0),
            ("energy_today_raw", 420.0),
            ("energy_total_raw", 100_000.0),
            ("state_raw", 4.0),
            ("alarm_a_raw", 0.0),
            ("alarm_b_raw", f64::from(1u16 << 6)),
        ] {
            snapshot.set(key, Some(value)).unwrap();
        }
        snapshot
    }

    #[test]
    fn test_battery_virtuals() {
        let derived = FormulaEngine::new().derive(&battery_snapshot());

        // (1*32768 + 10000) * 0.002
        let capacity = derived.number("capacity_ah").unwrap();
        assert!((capacity - 85.536).abs() < 1e-9);
        // (3*32768 + 1696) * 0.002
        let max_capacity = derived.number("max_capacity_ah").unwrap();
        assert!((max_capacity - 200.0).abs() < 1e-9);

        let pct = derived.number("percentage").unwrap();
        assert!((pct - 42.768).abs() < 1e-9);
        let remaining = derived.number("remaining_wh").unwrap();
        assert!((remaining - 85.536 * 13.2).abs() < 1e-9);
        let wattage = derived.number("wattage").unwrap();
        assert!((wattage - 33.0).abs() < 1e-9);

        assert_eq!(derived.number("temperature"), Some(22.0));
        assert_eq!(derived.text("state"), Some("Charging"));
    }

    #[test]
    fn test_absent_inputs_propagate() {
        let mut snapshot = battery_snapshot();
        snapshot.set("cap_reg2", None).unwrap();
        snapshot.set("current", None).unwrap();
        let derived = FormulaEngine::new().derive(&snapshot);

        assert_eq!(derived.get("capacity_ah"), None);
        assert_eq!(derived.get("percentage"), None);
        assert_eq!(derived.get("remaining_wh"), None);
        assert_eq!(derived.get("wattage"), None);
        assert_eq!(derived.get("state"), None);
        // Unaffected values still computed
        assert!(derived.number("max_capacity_ah").is_some());
    }

    #[test]
    fn test_charger_virtuals_with_precision() {
        let derived = FormulaEngine::new().derive(&charger_snapshot());

        assert_eq!(derived.number("rated_voltage"), Some(12.0));
        assert_eq!(derived.number("rated_current"), Some(50.0));
        assert_eq!(derived.number("batt_soc"), Some(87.0));
        assert_eq!(derived.number("batt_voltage"), Some(13.2));
        assert_eq!(derived.number("batt_current"), Some(-12.34));
        assert_eq!(derived.number("temp_internal"), Some(30.0));
        assert_eq!(derived.number("temp_probe"), Some(25.0));
        assert_eq!(derived.number("alt_voltage"), Some(14.1));
        assert_eq!(derived.number("alt_current"), Some(10.5));
        assert_eq!(derived.number("alt_power"), Some(148.0));
        assert_eq!(derived.number("pv_voltage"), Some(18.7));
        assert_eq!(derived.number("pv_current"), Some(3.33));
        assert_eq!(derived.number("energy_today"), Some(420.0));
        assert_eq!(derived.number("energy_total"), Some(100_000.0));
        assert_eq!(derived.text("charger_state"), Some("Boost Charging"));
        assert_eq!(derived.text("alarms"), Some("Battery Over Temp"));
        assert_eq!(derived.number("max_charge_current"), Some(20.0));
    }

    #[test]
    fn test_precision_rounds_ties_to_even() {
        let mut snapshot = charger_snapshot();
        snapshot.set("set_current_raw", Some(1225.0)).unwrap();
        let derived = FormulaEngine::new().derive(&snapshot);
        assert_eq!(derived.number("max_charge_current"), Some(12.2));

        snapshot.set("set_current_raw", Some(1275.0)).unwrap();
        let derived = FormulaEngine::new().derive(&snapshot);
        assert_eq!(derived.number("max_charge_current"), Some(12.8));
    }

    #[test]
    fn test_pv_power_uses_unrounded_derived_inputs() {
        let derived = FormulaEngine::new().derive(&charger_snapshot());
        let power = derived.number("pv_power").unwrap();
        assert!((power - 18.7 * 3.33).abs() < 1e-9);
    }

    #[test]
    fn test_pv_power_absent_when_hookup_input_missing() {
        let mut snapshot = charger_snapshot();
        snapshot.set("pv_current_raw", None).unwrap();
        let derived = FormulaEngine::new().derive(&snapshot);
        assert_eq!(derived.get("pv_current"), None);
        assert_eq!(derived.get("pv_power"), None);
        assert!(derived.number("pv_voltage").is_some());
    }

    #[test]
    fn test_all_absent_snapshot() {
        let derived = FormulaEngine::new().derive(&Snapshot::absent(&DC_TO_DC_PROFILE));
        for (key, value) in derived.iter() {
            if key == "alarms" {
                assert_eq!(value.and_then(DerivedValue::as_text), Some("OK"));
            } else {
                assert_eq!(value, None, "{key} should be absent");
            }
        }
    }

    #[test]
    fn test_evaluate_with_custom_lookup() {
        let engine = FormulaEngine::new();
        let value = engine.evaluate(Formula::ChargerState, |_| Some(7.0));
        assert_eq!(value, Some(DerivedValue::Text("Unknown (7)".into())));
    }
}
