//! Formula functions
//!
//! Pure functions over optional inputs. Any absent input yields an absent
//! result, except `alarms`, which treats a missing field as zero.

// ============================================================================
// Numeric helpers
// ============================================================================

/// Multiply by factor
#[inline]
pub fn scale(value: f64, factor: f64) -> f64 {
    value * factor
}

/// Clamp a value to a range
#[inline]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.clamp(min, max)
}

/// Round to specified decimal places, ties to even
#[inline]
pub fn round(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Integer division rounding toward negative infinity
#[inline]
fn floor_div(value: f64, divisor: f64) -> f64 {
    (value / divisor).floor()
}

// ============================================================================
// Smart battery
// ============================================================================

/// Device-specific capacity packing: `(reg1*32768 + reg2//2) * 0.002` Ah
///
/// Not a plain high/low merge; the low register carries one extra bit.
pub fn combine_capacity(reg1: Option<f64>, reg2: Option<f64>) -> Option<f64> {
    let (reg1, reg2) = (reg1?, reg2?);
    Some((reg1 * 32768.0 + floor_div(reg2, 2.0)) * 0.002)
}

/// State of charge in percent, clamped to 0..=100
pub fn percentage(cap: Option<f64>, maxcap: Option<f64>) -> Option<f64> {
    let (cap, maxcap) = (cap?, maxcap?);
    if maxcap == 0.0 {
        return None;
    }
    Some(clamp(cap / maxcap * 100.0, 0.0, 100.0))
}

pub fn wattage(voltage: Option<f64>, current: Option<f64>) -> Option<f64> {
    Some(voltage? * current?)
}

pub fn remaining_wh(capacity_ah: Option<f64>, voltage: Option<f64>) -> Option<f64> {
    Some(capacity_ah? * voltage?)
}

/// Mean of the present readings; absent only when all are absent
pub fn average_temp(temps: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = temps.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

pub fn charging_state(current: Option<f64>) -> Option<&'static str> {
    let current = current?;
    Some(if current < 0.0 {
        "Discharging"
    } else if current > 0.0 {
        "Charging"
    } else {
        "Idle"
    })
}

// ============================================================================
// DC-DC charger
// ============================================================================

/// Upper byte of a packed register
pub fn high_byte(raw: Option<f64>) -> Option<f64> {
    Some(floor_div(raw?, 256.0))
}

/// Lower byte of a packed register
pub fn low_byte(raw: Option<f64>) -> Option<f64> {
    Some(raw?.rem_euclid(256.0))
}

pub fn linear(raw: Option<f64>, factor: f64) -> Option<f64> {
    Some(scale(raw?, factor))
}

const CHARGER_STATES: &[(u16, &str)] = &[
    (0, "Not Charging"),
    (2, "MPPT Charging"),
    (3, "Equalization"),
    (4, "Boost Charging"),
    (5, "Float Charging"),
    (6, "Current Limited"),
    (8, "Direct Charging"),
];

/// Label for the charger state register; unmapped codes render as `Unknown (n)`
pub fn charger_state(raw: Option<f64>) -> Option<String> {
    let raw = raw?;
    let label = CHARGER_STATES
        .iter()
        .find(|(code, _)| f64::from(*code) == raw)
        .map(|(_, label)| (*label).to_string());
    Some(label.unwrap_or_else(|| format!("Unknown ({raw})")))
}

/// Alarm A bit table
pub const ALARM_A_FLAGS: &[(u8, &str)] = &[
    (4, "Controller Inside Over Temp"),
    (5, "Alternator Input Over Current"),
    (8, "Alternator Input Over Voltage"),
    (9, "Starter Battery Reverse Polarity"),
    (10, "BMS Over Charge Protection"),
    (11, "Low Temperature Cutoff"),
];

/// Alarm B bit table
pub const ALARM_B_FLAGS: &[(u8, &str)] = &[
    (1, "Battery Over Discharged"),
    (2, "Battery Over Charged"),
    (5, "Controller Inside Temp Too High"),
    (6, "Battery Over Temp"),
    (7, "Hookup Input Too High"),
    (10, "Hookup Input Over Voltage"),
    (12, "Hookup Reverse Polarity"),
];

/// Comma-joined messages for every set bit, A table first, or `OK`
///
/// Missing fields count as zero, so the result is never absent.
pub fn alarms(alarm_a: Option<f64>, alarm_b: Option<f64>) -> String {
    let a = alarm_a.unwrap_or(0.0) as u32;
    let b = alarm_b.unwrap_or(0.0) as u32;

    let messages: Vec<&str> = ALARM_A_FLAGS
        .iter()
        .filter(|(bit, _)| a & (1 << bit) != 0)
        .chain(ALARM_B_FLAGS.iter().filter(|(bit, _)| b & (1 << bit) != 0))
        .map(|(_, message)| *message)
        .collect();

    if messages.is_empty() {
        "OK".to_string()
    } else {
        messages.join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn approx(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be present");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_round() {
        assert_eq!(round(1.23456, 2), 1.23);
        assert_eq!(round(12.96, 1), 13.0);
        assert_eq!(round(-1.005, 0), -1.0);
    }

    #[test]
    fn test_round_ties_to_even() {
        assert_eq!(round(12.25, 1), 12.2);
        assert_eq!(round(0.25, 1), 0.2);
        assert_eq!(round(0.75, 1), 0.8);
        assert_eq!(round(2.5, 0), 2.0);
        assert_eq!(round(-2.5, 0), -2.0);
    }

    #[test]
    fn test_combine_capacity() {
        approx(combine_capacity(Some(100.0), Some(50.0)), 13107.3);
        // Odd low register loses its lowest bit
        approx(combine_capacity(Some(0.0), Some(51.0)), 0.05);
        assert_eq!(combine_capacity(None, Some(50.0)), None);
        assert_eq!(combine_capacity(Some(100.0), None), None);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(Some(50.0), Some(0.0)), None);
        assert_eq!(percentage(Some(150.0), Some(100.0)), Some(100.0));
        assert_eq!(percentage(Some(-5.0), Some(100.0)), Some(0.0));
        approx(percentage(Some(25.0), Some(100.0)), 25.0);
        assert_eq!(percentage(None, Some(100.0)), None);
    }

    #[test]
    fn test_products() {
        approx(wattage(Some(13.2), Some(-2.5)), -33.0);
        assert_eq!(wattage(None, Some(1.0)), None);
        approx(remaining_wh(Some(100.0), Some(12.8)), 1280.0);
        assert_eq!(remaining_wh(Some(100.0), None), None);
    }

    #[test]
    fn test_average_temp_present_only() {
        approx(average_temp(&[Some(10.0), None, Some(30.0), None]), 20.0);
        approx(average_temp(&[None, None, None, Some(-4.5)]), -4.5);
        assert_eq!(average_temp(&[None, None, None, None]), None);
    }

    #[test]
    fn test_charging_state() {
        assert_eq!(charging_state(Some(-0.01)), Some("Discharging"));
        assert_eq!(charging_state(Some(1.2)), Some("Charging"));
        assert_eq!(charging_state(Some(0.0)), Some("Idle"));
        assert_eq!(charging_state(None), None);
    }

    #[test]
    fn test_byte_split() {
        // 0x0C1E: 12 V rated, 30 A rated
        assert_eq!(high_byte(Some(f64::from(0x0C1E_u16))), Some(12.0));
        assert_eq!(low_byte(Some(f64::from(0x0C1E_u16))), Some(30.0));
        assert_eq!(high_byte(None), None);
        assert_eq!(low_byte(None), None);
    }

    #[test]
    fn test_charger_state_lookup() {
        assert_eq!(charger_state(Some(2.0)).as_deref(), Some("MPPT Charging"));
        assert_eq!(charger_state(Some(8.0)).as_deref(), Some("Direct Charging"));
        assert_eq!(charger_state(Some(7.0)).as_deref(), Some("Unknown (7)"));
        assert_eq!(charger_state(None), None);
    }

    #[test]
    fn test_alarms() {
        assert_eq!(alarms(Some(0b10000 as f64), Some(0.0)), "Controller Inside Over Temp");
        assert_eq!(alarms(Some(0.0), Some(0.0)), "OK");
        assert_eq!(alarms(None, None), "OK");
        // Bits outside the tables are ignored
        assert_eq!(alarms(Some(1.0), Some(1.0)), "OK");
    }

    #[test]
    fn test_alarms_table_order() {
        let a = f64::from((1u16 << 11) | (1 << 4));
        let b = f64::from((1u16 << 12) | (1 << 1));
        assert_eq!(
            alarms(Some(a), Some(b)),
            "Controller Inside Over Temp, Low Temperature Cutoff, \
             Battery Over Discharged, Hookup Reverse Polarity"
        );
    }

    #[test]
    fn test_alarms_missing_field_defaults_to_zero() {
        assert_eq!(alarms(None, Some(f64::from(1u16 << 6))), "Battery Over Temp");
    }
}
