//! Decimal precision and boundary helpers
//!
//! FHIRPath treats a written decimal as denoting an interval: `1.5` stands
//! for anything in `[1.45, 1.55)`. `low_boundary`/`high_boundary` expose the
//! ends of that interval quantized to a requested number of fractional
//! digits, rounding halves outward (down for the low end, up for the high
//! end).

use rust_decimal::Decimal;

/// Largest digit count accepted by the boundary functions
pub const MAX_BOUNDARY_DIGITS: i64 = 31;

/// Default digit count for the boundary functions
pub const DEFAULT_BOUNDARY_DIGITS: i64 = 8;

/// The backend's maximum representable fractional scale. Digit counts above
/// this are accepted but quantization clamps here.
const MAX_SCALE: u32 = 28;

/// Number of fractional digits of a decimal as written (its scale)
pub fn fraction_digits(value: &Decimal) -> u32 {
    value.scale()
}

/// Half of one unit in the last written place of `value`
fn half_ulp(value: &Decimal) -> Decimal {
    // 0.5 × 10^(−scale)
    Decimal::new(5, value.scale() + 1)
}

fn pow10(scale: u32) -> Decimal {
    Decimal::from_i128_with_scale(10i128.pow(scale.min(MAX_SCALE)), 0)
}

/// Quantize to `scale` fractional digits, rounding an exact half toward
/// negative infinity: `ceil(v·10^s − ½) / 10^s`.
fn quantize_half_down(value: Decimal, scale: u32) -> Decimal {
    let scale = scale.min(MAX_SCALE);
    if scale >= value.scale() {
        return value.normalize();
    }
    let p = pow10(scale);
    match value.checked_mul(p) {
        Some(shifted) => ((shifted - Decimal::new(5, 1)).ceil()) / p,
        None => value.normalize(),
    }
}

/// Quantize to `scale` fractional digits, rounding an exact half toward
/// positive infinity: `floor(v·10^s + ½) / 10^s`.
fn quantize_half_up(value: Decimal, scale: u32) -> Decimal {
    let scale = scale.min(MAX_SCALE);
    if scale >= value.scale() {
        return value.normalize();
    }
    let p = pow10(scale);
    match value.checked_mul(p) {
        Some(shifted) => ((shifted + Decimal::new(5, 1)).floor()) / p,
        None => value.normalize(),
    }
}

/// Lower end of the interval a written decimal denotes, at `digits`
/// fractional places. `None` when `digits` falls outside `[0, 31]`.
pub fn low_boundary(value: &Decimal, digits: i64) -> Option<Decimal> {
    if !(0..=MAX_BOUNDARY_DIGITS).contains(&digits) {
        return None;
    }
    let boundary = value - half_ulp(value);
    Some(quantize_half_down(boundary, digits as u32))
}

/// Upper end of the interval a written decimal denotes, at `digits`
/// fractional places. `None` when `digits` falls outside `[0, 31]`.
pub fn high_boundary(value: &Decimal, digits: i64) -> Option<Decimal> {
    if !(0..=MAX_BOUNDARY_DIGITS).contains(&digits) {
        return None;
    }
    let boundary = value + half_ulp(value);
    Some(quantize_half_up(boundary, digits as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn fraction_digit_count() {
        assert_eq!(fraction_digits(&dec("1.58")), 2);
        assert_eq!(fraction_digits(&dec("1.0")), 1);
        assert_eq!(fraction_digits(&dec("7")), 0);
    }

    #[test]
    fn boundaries_at_eight_digits() {
        assert_eq!(low_boundary(&dec("1.587"), 8).unwrap(), dec("1.5865"));
        assert_eq!(high_boundary(&dec("1.587"), 8).unwrap(), dec("1.5875"));
    }

    #[test]
    fn boundaries_at_zero_digits() {
        // 1.587 − 0.0005 = 1.5865, then rounded at zero places.
        assert_eq!(low_boundary(&dec("1.587"), 0).unwrap(), dec("2"));
        assert_eq!(high_boundary(&dec("1.587"), 0).unwrap(), dec("2"));
        // The exact half rounds outward.
        assert_eq!(low_boundary(&dec("0.5"), 0).unwrap(), dec("0"));
        assert_eq!(high_boundary(&dec("0.5"), 0).unwrap(), dec("1"));
    }

    #[test]
    fn boundaries_bracket_the_value() {
        for s in ["0", "1.5", "-2.77", "42.0001"] {
            let v = dec(s);
            assert!(low_boundary(&v, 8).unwrap() <= v);
            assert!(high_boundary(&v, 8).unwrap() >= v);
        }
    }

    #[test]
    fn digit_range_is_enforced() {
        assert!(low_boundary(&dec("1"), -1).is_none());
        assert!(low_boundary(&dec("1"), 32).is_none());
        assert!(low_boundary(&dec("1"), 31).is_some());
        assert!(high_boundary(&dec("1"), 31).is_some());
    }

    #[test]
    fn negative_values_mirror() {
        assert_eq!(low_boundary(&dec("-1.5"), 8).unwrap(), dec("-1.55"));
        assert_eq!(high_boundary(&dec("-1.5"), 8).unwrap(), dec("-1.45"));
    }
}
