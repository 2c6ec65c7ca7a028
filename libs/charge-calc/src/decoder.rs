//! Register decoder
//!
//! Converts the words returned for one `RegisterSpec` into a physical value.

use charge_model::{Encoding, RegisterSpec};

use crate::error::{CalcError, Result};

/// Reinterpret a raw word as two's complement
#[inline]
pub fn to_int16(raw: u16) -> i32 {
    let raw = i32::from(raw);
    if raw >= 0x8000 {
        raw - 0x10000
    } else {
        raw
    }
}

/// Plain 32-bit merge, high word first
#[inline]
pub fn combine_u32(high: u16, low: u16) -> u32 {
    u32::from(high) * 0x10000 + u32::from(low)
}

/// Decode the words read for `spec` and apply its scale
pub fn decode_register(spec: &RegisterSpec, words: &[u16]) -> Result<f64> {
    let expected = spec.word_count() as usize;
    if words.len() != expected {
        return Err(CalcError::decode(format!(
            "'{}' expects {} word(s), got {}",
            spec.key,
            expected,
            words.len()
        )));
    }

    let value = match spec.encoding {
        Encoding::Uint16 => f64::from(words[0]),
        Encoding::Int16 => f64::from(to_int16(words[0])),
        Encoding::Uint32 => f64::from(combine_u32(words[0], words[1])),
    };

    Ok(match spec.scale {
        Some(factor) => crate::functions::scale(value, factor),
        None => value,
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use charge_model::profiles::{DC_TO_DC_PROFILE, SMART_BATTERY_PROFILE};

    #[test]
    fn test_int16_conversion_boundaries() {
        assert_eq!(to_int16(0x0000), 0);
        assert_eq!(to_int16(0x7FFF), 32767);
        assert_eq!(to_int16(0x8000), -32768);
        assert_eq!(to_int16(0xFFFF), -1);
        assert_eq!(to_int16(0xFF9C), -100);
    }

    #[test]
    fn test_int16_matches_offset_rule_across_range() {
        for raw in (0u16..=0xFFFF).step_by(257) {
            let expected = if raw >= 0x8000 {
                i32::from(raw) - 0x10000
            } else {
                i32::from(raw)
            };
            assert_eq!(to_int16(raw), expected);
        }
    }

    #[test]
    fn test_decode_signed_scaled_current() {
        let spec = SMART_BATTERY_PROFILE.register("current").unwrap();
        let value = decode_register(spec, &[0xFF9C]).unwrap();
        assert!((value - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_decode_unsigned_without_scale() {
        let spec = SMART_BATTERY_PROFILE.register("cycles").unwrap();
        assert_eq!(decode_register(spec, &[0x8001]).unwrap(), 32769.0);
    }

    #[test]
    fn test_decode_uint32_high_low() {
        let spec = DC_TO_DC_PROFILE.register("energy_total_raw").unwrap();
        assert_eq!(decode_register(spec, &[0x0001, 0x86A0]).unwrap(), 100_000.0);
    }

    #[test]
    fn test_decode_word_count_mismatch() {
        let spec = DC_TO_DC_PROFILE.register("serial_raw").unwrap();
        assert!(decode_register(spec, &[0x0001]).is_err());
    }
}
