//! Quantity values with UCUM and calendar-unit support
//!
//! A quantity pairs a decimal value with a unit string. Calendar-literal
//! units (`year`, `months`, …) are kept apart from their UCUM lookalikes
//! (`'a'`, `'mo'`) because calendar years and months are not definite
//! durations: `1 year = 1 'a'` is unknown, while `1 'a' = 1 'a'` is true.

use std::fmt;

use octofhir_ucum::analyse;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::error::{FhirPathError, Result};

/// Calendar duration units used in temporal arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalendarUnit {
    /// Calendar year
    Year,
    /// Calendar month
    Month,
    /// Seven days
    Week,
    /// Calendar day
    Day,
    /// Hour
    Hour,
    /// Minute
    Minute,
    /// Second
    Second,
    /// Millisecond
    Millisecond,
}

impl CalendarUnit {
    /// Parse a calendar word (singular or plural) or UCUM time alias
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "year" | "years" | "a" => Some(Self::Year),
            "month" | "months" | "mo" => Some(Self::Month),
            "week" | "weeks" | "wk" => Some(Self::Week),
            "day" | "days" | "d" => Some(Self::Day),
            "hour" | "hours" | "h" => Some(Self::Hour),
            "minute" | "minutes" | "min" => Some(Self::Minute),
            "second" | "seconds" | "s" => Some(Self::Second),
            "millisecond" | "milliseconds" | "ms" => Some(Self::Millisecond),
            _ => None,
        }
    }

    /// Parse a calendar word only (no UCUM aliases); this is what makes a
    /// quantity literal a calendar quantity rather than a UCUM one.
    pub fn from_calendar_word(name: &str) -> Option<Self> {
        matches!(
            name,
            "year"
                | "years"
                | "month"
                | "months"
                | "week"
                | "weeks"
                | "day"
                | "days"
                | "hour"
                | "hours"
                | "minute"
                | "minutes"
                | "second"
                | "seconds"
                | "millisecond"
                | "milliseconds"
        )
        .then(|| Self::from_name(name))
        .flatten()
    }

    /// Canonical singular word
    pub fn word(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
        }
    }

    /// Equivalent UCUM code
    pub fn ucum_code(&self) -> &'static str {
        match self {
            Self::Year => "a",
            Self::Month => "mo",
            Self::Week => "wk",
            Self::Day => "d",
            Self::Hour => "h",
            Self::Minute => "min",
            Self::Second => "s",
            Self::Millisecond => "ms",
        }
    }

    /// True for the units whose length varies with the calendar
    pub fn is_variable_length(&self) -> bool {
        matches!(self, Self::Year | Self::Month)
    }

    /// Milliseconds per unit for the fixed-length units (week and below);
    /// year/month use the UCUM mean values and only feed duration math.
    pub fn millisecond_factor(&self) -> Decimal {
        match self {
            Self::Year => Decimal::from(31_556_952_000i64),
            Self::Month => Decimal::from(2_629_746_000i64),
            Self::Week => Decimal::from(604_800_000i64),
            Self::Day => Decimal::from(86_400_000i64),
            Self::Hour => Decimal::from(3_600_000i64),
            Self::Minute => Decimal::from(60_000i64),
            Self::Second => Decimal::from(1_000i64),
            Self::Millisecond => Decimal::ONE,
        }
    }
}

impl fmt::Display for CalendarUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}

/// UCUM analysis distilled to what quantity arithmetic needs
#[derive(Debug, Clone, PartialEq)]
struct UnitAnalysis {
    factor: f64,
    dimension: String,
}

/// Cached wrapper around [`octofhir_ucum::analyse`]; unit expressions repeat
/// heavily inside loops over collections.
fn analyse_unit(unit: &str) -> Option<UnitAnalysis> {
    static CACHE: Mutex<Option<FxHashMap<String, Option<UnitAnalysis>>>> = Mutex::new(None);

    if unit.is_empty() || unit.len() > 256 {
        return None;
    }
    let mut guard = CACHE.lock();
    let cache = guard.get_or_insert_with(FxHashMap::default);
    if let Some(hit) = cache.get(unit) {
        return hit.clone();
    }
    let result = analyse(unit).ok().map(|a| UnitAnalysis {
        factor: a.factor,
        dimension: a.dimension.to_string(),
    });
    if cache.len() >= 1024 {
        cache.clear();
    }
    cache.insert(unit.to_string(), result.clone());
    result
}

/// A quantity: decimal value plus unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quantity {
    /// The numeric value
    pub value: Decimal,
    /// Canonicalized unit string; `"1"` for unitless quantities
    pub unit: String,
    /// Set when the unit was written as a calendar word
    pub calendar_unit: Option<CalendarUnit>,
}

impl Quantity {
    /// Create a quantity with a UCUM (or composite) unit. An empty unit
    /// canonicalizes to `"1"`.
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        let unit = if unit.is_empty() { "1".to_string() } else { unit };
        Self {
            value,
            unit,
            calendar_unit: None,
        }
    }

    /// Create a unitless quantity (unit `"1"`)
    pub fn unitless(value: Decimal) -> Self {
        Self::new(value, "1")
    }

    /// Create a calendar-literal quantity (`1 year`, `3 months`, …)
    pub fn calendar(value: Decimal, unit: CalendarUnit) -> Self {
        Self {
            value,
            unit: unit.word().to_string(),
            calendar_unit: Some(unit),
        }
    }

    /// The calendar unit this quantity can drive temporal arithmetic with:
    /// either a calendar word or one of the UCUM time aliases.
    pub fn temporal_unit(&self) -> Option<CalendarUnit> {
        self.calendar_unit.or_else(|| CalendarUnit::from_name(&self.unit))
    }

    /// True when UCUM can convert between the two quantities' units
    pub fn comparable(&self, other: &Quantity) -> bool {
        let (Some(a), Some(b)) = (self.analysis(), other.analysis()) else {
            return false;
        };
        a.dimension == b.dimension
    }

    fn analysis(&self) -> Option<UnitAnalysis> {
        let unit = self
            .calendar_unit
            .map(|u| u.ucum_code())
            .unwrap_or(self.unit.as_str());
        analyse_unit(unit)
    }

    /// Convert this quantity's value into `target_unit`. Fails when the
    /// units are not UCUM-comparable.
    pub fn convert_to(&self, target_unit: &str) -> Result<Quantity> {
        if self.unit == target_unit {
            return Ok(self.clone());
        }
        let source = self
            .analysis()
            .ok_or_else(|| FhirPathError::unit_error(self.unit.clone(), target_unit))?;
        let target = analyse_unit(target_unit)
            .ok_or_else(|| FhirPathError::unit_error(self.unit.clone(), target_unit))?;
        if source.dimension != target.dimension {
            return Err(FhirPathError::unit_error(self.unit.clone(), target_unit));
        }
        let value = self.value.to_f64().unwrap_or(0.0);
        let converted = value * (source.factor / target.factor);
        // Trim float noise before re-entering decimal space.
        let converted = (converted * 1e12).round() / 1e12;
        let value = Decimal::from_f64(converted)
            .ok_or_else(|| FhirPathError::unit_error(self.unit.clone(), target_unit))?;
        Ok(Quantity::new(value.normalize(), target_unit))
    }

    /// Addition: the right operand is converted to the left's unit (calendar
    /// words convert through their UCUM alias but keep the left's spelling)
    pub fn add(&self, other: &Quantity) -> Result<Quantity> {
        let left = self.as_ucum();
        let converted = other.as_ucum().convert_to(&left.unit)?;
        Ok(Quantity {
            value: left.value + converted.value,
            unit: self.unit.clone(),
            calendar_unit: self.calendar_unit,
        })
    }

    /// Subtraction: the right operand is converted to the left's unit
    pub fn subtract(&self, other: &Quantity) -> Result<Quantity> {
        let left = self.as_ucum();
        let converted = other.as_ucum().convert_to(&left.unit)?;
        Ok(Quantity {
            value: left.value - converted.value,
            unit: self.unit.clone(),
            calendar_unit: self.calendar_unit,
        })
    }

    /// Multiplication forms the composite unit `a.b`, simplifying when one
    /// side is unitless.
    pub fn multiply(&self, other: &Quantity) -> Option<Quantity> {
        let value = self.value.checked_mul(other.value)?;
        let unit = compose_units(&self.unit, &other.unit, '.');
        Some(Quantity::new(value, unit))
    }

    /// Division forms the composite unit `a/b`, simplifying when the right
    /// side is unitless or the units cancel. Division by zero yields `None`.
    pub fn divide(&self, other: &Quantity) -> Option<Quantity> {
        if other.value.is_zero() {
            return None;
        }
        let value = self.value.checked_div(other.value)?;
        let unit = if self.unit == other.unit {
            "1".to_string()
        } else {
            compose_units(&self.unit, &other.unit, '/')
        };
        Some(Quantity::new(value, unit))
    }

    /// Strict equality per the calendar rule: a calendar-literal year/month
    /// against its variable-length UCUM lookalike is unknown; otherwise
    /// convert and compare. Non-comparable units are unequal-unknown (`None`).
    pub fn equal(&self, other: &Quantity) -> Option<bool> {
        match (self.calendar_unit, other.calendar_unit) {
            (Some(a), Some(b)) => {
                if a == b {
                    return Some(self.value == other.value);
                }
            }
            (Some(cal), None) | (None, Some(cal)) => {
                // `1 year = 1 'a'` is empty: a calendar year is not a
                // definite duration.
                let ucum = if self.calendar_unit.is_some() {
                    &other.unit
                } else {
                    &self.unit
                };
                if cal.is_variable_length() && CalendarUnit::from_name(ucum) == Some(cal) {
                    return None;
                }
            }
            (None, None) => {}
        }
        if !self.comparable(other) {
            return None;
        }
        let left = self.as_ucum();
        let right = other.as_ucum();
        match right.convert_to(&left.unit) {
            Ok(converted) => Some(left.value == converted.value),
            Err(_) => None,
        }
    }

    /// Equivalence: like equality but calendar words equate to their UCUM
    /// lookalikes, and values compare at the least precise operand's scale.
    pub fn equivalent(&self, other: &Quantity) -> bool {
        let left = self.as_ucum();
        let right = other.as_ucum();
        if !left.comparable(&right) {
            return false;
        }
        let Ok(converted) = right.convert_to(&left.unit) else {
            return false;
        };
        let scale = left.value.scale().min(converted.value.scale());
        round_to(left.value, scale) == round_to(converted.value, scale)
    }

    /// Ordering for the inequality operators; `None` when not comparable
    pub fn compare(&self, other: &Quantity) -> Option<std::cmp::Ordering> {
        let left = self.as_ucum();
        let right = other.as_ucum();
        if !left.comparable(&right) {
            return None;
        }
        let converted = right.convert_to(&left.unit).ok()?;
        Some(left.value.cmp(&converted.value))
    }

    /// View a calendar quantity through its UCUM alias for conversion math
    fn as_ucum(&self) -> Quantity {
        match self.calendar_unit {
            Some(unit) => Quantity::new(self.value, unit.ucum_code()),
            None => self.clone(),
        }
    }
}

fn round_to(value: Decimal, scale: u32) -> Decimal {
    value.round_dp(scale)
}

fn compose_units(left: &str, right: &str, op: char) -> String {
    match (left, right, op) {
        ("1", unit, '.') | (unit, "1", '.') | (unit, "1", '/') => unit.to_string(),
        ("1", unit, '/') => format!("1/{unit}"),
        _ => format!("{left}{op}{right}"),
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other) == Some(true)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.calendar_unit.is_some() {
            write!(f, "{} {}", self.value, self.unit)
        } else if self.unit == "1" {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} '{}'", self.value, self.unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(value: i64, unit: &str) -> Quantity {
        Quantity::new(Decimal::from(value), unit)
    }

    #[test]
    fn kilogram_plus_grams() {
        let sum = q(2, "kg").add(&q(500, "g")).unwrap();
        assert_eq!(sum.value, Decimal::new(25, 1));
        assert_eq!(sum.unit, "kg");
    }

    #[test]
    fn incompatible_addition_fails() {
        assert!(q(1, "m").add(&q(1, "kg")).is_err());
    }

    #[test]
    fn comparability() {
        assert!(q(1, "m").comparable(&q(100, "cm")));
        assert!(!q(1, "m").comparable(&q(1, "kg")));
    }

    #[test]
    fn calendar_vs_ucum_equality() {
        let year_word = Quantity::calendar(Decimal::ONE, CalendarUnit::Year);
        let year_ucum = q(1, "a");
        assert_eq!(year_word.equal(&year_ucum), None);
        assert_eq!(year_ucum.equal(&q(1, "a")), Some(true));
        assert_eq!(
            year_word.equal(&Quantity::calendar(Decimal::ONE, CalendarUnit::Year)),
            Some(true)
        );
        // Fixed-length calendar units do equate to their UCUM codes.
        let day_word = Quantity::calendar(Decimal::ONE, CalendarUnit::Day);
        assert_eq!(day_word.equal(&q(1, "d")), Some(true));
    }

    #[test]
    fn equivalence_bridges_calendar_words() {
        let year_word = Quantity::calendar(Decimal::ONE, CalendarUnit::Year);
        assert!(year_word.equivalent(&q(1, "a")));
    }

    #[test]
    fn conversion_comparison() {
        assert_eq!(
            q(1, "m").compare(&q(100, "cm")),
            Some(std::cmp::Ordering::Equal)
        );
        assert_eq!(
            q(2, "m").compare(&q(150, "cm")),
            Some(std::cmp::Ordering::Greater)
        );
        assert_eq!(q(1, "m").compare(&q(1, "kg")), None);
    }

    #[test]
    fn composite_units() {
        let product = q(2, "m").multiply(&q(3, "s")).unwrap();
        assert_eq!(product.unit, "m.s");
        let ratio = q(6, "m").divide(&q(2, "s")).unwrap();
        assert_eq!(ratio.unit, "m/s");
        let scalar = q(6, "m").divide(&q(2, "1")).unwrap();
        assert_eq!(scalar.unit, "m");
        let cancelled = q(6, "m").divide(&q(2, "m")).unwrap();
        assert_eq!(cancelled.unit, "1");
    }

    #[test]
    fn division_by_zero_is_empty() {
        assert!(q(1, "m").divide(&q(0, "s")).is_none());
    }

    #[test]
    fn display_forms() {
        assert_eq!(q(10, "mg").to_string(), "10 'mg'");
        assert_eq!(
            Quantity::calendar(Decimal::ONE, CalendarUnit::Year).to_string(),
            "1 year"
        );
        assert_eq!(Quantity::unitless(Decimal::from(4)).to_string(), "4");
    }
}
