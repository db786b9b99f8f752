//! The polymorphic value model
//!
//! [`FhirPathValue`] is a sealed enum over the System types plus a dyn-trait
//! escape hatch ([`Element`]) for tree nodes supplied by an external data
//! model. Operators never match on concrete external types; everything they
//! need flows through the capability surface: children, conversions,
//! equality, equivalence and type information.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value as JsonValue;

use super::quantity::{CalendarUnit, Quantity};
use super::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use super::types::{TypeInfo, TypeSpecifier};

/// Capability set every externally-supplied tree node provides.
///
/// The evaluator relies only on this surface; nothing about a concrete data
/// model schema is baked in. Implementations must be cheap to clone behind
/// the `Arc` the enum carries.
pub trait Element: fmt::Debug + Send + Sync {
    /// Child elements by field name, or all children when `name` is `None`
    fn children(&self, name: Option<&str>) -> Vec<FhirPathValue>;

    /// The node's self-described type
    fn type_specifier(&self) -> TypeSpecifier;

    /// The node's payload as a System value, when it is a primitive
    fn system_value(&self) -> Option<FhirPathValue>;

    /// True when the node carries a primitive value (FHIR `hasValue()`)
    fn has_value(&self) -> bool {
        self.system_value().is_some()
    }

    /// JSON serialization of the node
    fn to_json(&self) -> JsonValue;
}

/// A FHIRPath value
#[derive(Debug, Clone)]
pub enum FhirPathValue {
    /// Boolean value
    Boolean(bool),
    /// String value
    String(String),
    /// Integer value (signed 32-bit)
    Integer(i32),
    /// Long value (signed 64-bit)
    Long(i64),
    /// Decimal value
    Decimal(Decimal),
    /// Quantity value (decimal plus unit)
    Quantity(Quantity),
    /// Date with precision
    Date(PrecisionDate),
    /// Time with precision
    Time(PrecisionTime),
    /// DateTime with precision and timezone flag
    DateTime(PrecisionDateTime),
    /// A type specifier (right-hand side of `is`/`as`, argument of `ofType`)
    TypeSpecifier(TypeSpecifier),
    /// Type information produced by `type()`
    TypeInfoObject(Box<TypeInfo>),
    /// Externally-supplied tree node
    Node(Arc<dyn Element>),
}

impl FhirPathValue {
    /// Wrap a decimal, normalizing trailing zeros away
    pub fn decimal(value: Decimal) -> Self {
        Self::Decimal(value.normalize())
    }

    /// Wrap an external element
    pub fn node(element: Arc<dyn Element>) -> Self {
        Self::Node(element)
    }

    /// Human-readable kind for error messages
    pub fn type_name(&self) -> String {
        self.type_specifier().to_string()
    }

    /// The value's self-describing type
    pub fn type_specifier(&self) -> TypeSpecifier {
        match self {
            Self::Boolean(_) => TypeSpecifier::system("Boolean"),
            Self::String(_) => TypeSpecifier::system("String"),
            Self::Integer(_) => TypeSpecifier::system("Integer"),
            Self::Long(_) => TypeSpecifier::system("Long"),
            Self::Decimal(_) => TypeSpecifier::system("Decimal"),
            Self::Quantity(_) => TypeSpecifier::system("Quantity"),
            Self::Date(_) => TypeSpecifier::system("Date"),
            Self::Time(_) => TypeSpecifier::system("Time"),
            Self::DateTime(_) => TypeSpecifier::system("DateTime"),
            Self::TypeSpecifier(_) => TypeSpecifier::system("TypeSpecifier"),
            Self::TypeInfoObject(_) => TypeSpecifier::system("TypeInfo"),
            Self::Node(node) => node.type_specifier(),
        }
    }

    /// Reduce an external primitive node to its System payload; other values
    /// pass through unchanged.
    pub fn unwrap_system(&self) -> FhirPathValue {
        match self {
            Self::Node(node) => node.system_value().unwrap_or_else(|| self.clone()),
            other => other.clone(),
        }
    }

    /// Child elements by name (or all). Non-node values have no children,
    /// except type-info objects which expose `namespace` and `name`.
    pub fn children(&self, name: Option<&str>) -> Vec<FhirPathValue> {
        match self {
            Self::Node(node) => node.children(name),
            Self::TypeInfoObject(info) => {
                let spec = info.specifier();
                let mut out = Vec::new();
                if let Some(spec) = spec {
                    if name.is_none() || name == Some("namespace") {
                        out.push(Self::String(spec.namespace.clone()));
                    }
                    if name.is_none() || name == Some("name") {
                        out.push(Self::String(spec.name.clone()));
                    }
                }
                out
            }
            _ => Vec::new(),
        }
    }

    /// Boolean conversion. Implicit conversion accepts Booleans only;
    /// explicit conversion additionally maps the specified string and
    /// numeric spellings.
    pub fn to_boolean(&self, explicit: bool) -> Option<bool> {
        match self.unwrap_system() {
            Self::Boolean(b) => Some(b),
            Self::String(s) if explicit => match s.to_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
                "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
                _ => None,
            },
            Self::Integer(1) | Self::Long(1) if explicit => Some(true),
            Self::Integer(0) | Self::Long(0) if explicit => Some(false),
            Self::Decimal(d) if explicit && d == Decimal::ONE => Some(true),
            Self::Decimal(d) if explicit && d.is_zero() => Some(false),
            _ => None,
        }
    }

    /// Integer conversion
    pub fn to_integer(&self, explicit: bool) -> Option<i32> {
        match self.unwrap_system() {
            Self::Integer(i) => Some(i),
            Self::Long(l) if explicit => l.to_i32(),
            Self::Boolean(b) if explicit => Some(if b { 1 } else { 0 }),
            Self::String(s) if explicit => s.parse::<i32>().ok(),
            _ => None,
        }
    }

    /// Long conversion; integers widen implicitly
    pub fn to_long(&self, explicit: bool) -> Option<i64> {
        match self.unwrap_system() {
            Self::Long(l) => Some(l),
            Self::Integer(i) => Some(i as i64),
            Self::Boolean(b) if explicit => Some(if b { 1 } else { 0 }),
            Self::String(s) if explicit => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Decimal conversion; integers and longs widen implicitly
    pub fn to_decimal(&self, explicit: bool) -> Option<Decimal> {
        match self.unwrap_system() {
            Self::Decimal(d) => Some(d),
            Self::Integer(i) => Some(Decimal::from(i)),
            Self::Long(l) => Some(Decimal::from(l)),
            Self::Boolean(b) if explicit => Some(if b { Decimal::ONE } else { Decimal::ZERO }),
            Self::String(s) if explicit => Decimal::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// Quantity conversion; bare numbers become unitless quantities
    pub fn to_quantity(&self, explicit: bool) -> Option<Quantity> {
        match self.unwrap_system() {
            Self::Quantity(q) => Some(q),
            Self::Integer(i) => Some(Quantity::unitless(Decimal::from(i))),
            Self::Long(l) => Some(Quantity::unitless(Decimal::from(l))),
            Self::Decimal(d) => Some(Quantity::unitless(d)),
            Self::Boolean(b) if explicit => {
                Some(Quantity::unitless(if b { Decimal::ONE } else { Decimal::ZERO }))
            }
            Self::String(s) if explicit => parse_quantity_string(&s),
            _ => None,
        }
    }

    /// Date conversion; a DateTime truncates to its date component
    pub fn to_date(&self, explicit: bool) -> Option<PrecisionDate> {
        match self.unwrap_system() {
            Self::Date(d) => Some(d),
            Self::DateTime(dt) if explicit => Some(dt.date()),
            Self::String(s) if explicit => PrecisionDate::parse(s.trim_start_matches('@')),
            _ => None,
        }
    }

    /// DateTime conversion; a Date widens implicitly (floating, same
    /// precision)
    pub fn to_date_time(&self, explicit: bool) -> Option<PrecisionDateTime> {
        match self.unwrap_system() {
            Self::DateTime(dt) => Some(dt),
            Self::Date(d) => PrecisionDateTime::parse(&d.to_string()),
            Self::String(s) if explicit => {
                PrecisionDateTime::parse(s.trim_start_matches('@'))
            }
            _ => None,
        }
    }

    /// Time conversion
    pub fn to_time(&self, explicit: bool) -> Option<PrecisionTime> {
        match self.unwrap_system() {
            Self::Time(t) => Some(t),
            Self::String(s) if explicit => {
                PrecisionTime::parse(s.trim_start_matches("@T").trim_start_matches('T'))
            }
            _ => None,
        }
    }

    /// String conversion. Implicitly only strings (and string-valued nodes)
    /// convert; explicitly every primitive renders its literal form.
    pub fn to_string_value(&self, explicit: bool) -> Option<String> {
        match self.unwrap_system() {
            Self::String(s) => Some(s),
            _ if !explicit => None,
            Self::Boolean(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Long(l) => Some(l.to_string()),
            Self::Decimal(d) => Some(d.to_string()),
            Self::Quantity(q) => Some(q.to_string()),
            Self::Date(d) => Some(d.to_string()),
            Self::Time(t) => Some(t.to_string()),
            Self::DateTime(dt) => Some(dt.to_string()),
            Self::TypeSpecifier(spec) => Some(spec.to_string()),
            _ => None,
        }
    }

    /// Strict equality: `Some(true/false)` when known, `None` when the
    /// operands are not comparable (mixed precisions, mixed timezones,
    /// non-convertible units, unrelated types).
    pub fn equal(&self, other: &FhirPathValue) -> Option<bool> {
        use FhirPathValue::*;
        let left = self.unwrap_system();
        let right = other.unwrap_system();
        match (&left, &right) {
            (Boolean(a), Boolean(b)) => Some(a == b),
            (String(a), String(b)) => Some(a == b),
            (Integer(_) | Long(_) | Decimal(_), Integer(_) | Long(_) | Decimal(_)) => {
                // The numeric ladder makes the comparison exact.
                Some(left.to_decimal(false)? == right.to_decimal(false)?)
            }
            (Quantity(a), Quantity(b)) => a.equal(b),
            (Integer(_) | Long(_) | Decimal(_), Quantity(_))
            | (Quantity(_), Integer(_) | Long(_) | Decimal(_)) => {
                left.to_quantity(false)?.equal(&right.to_quantity(false)?)
            }
            (Date(a), Date(b)) => partial_eq(a.partial_compare(b)),
            (Time(a), Time(b)) => partial_eq(a.partial_compare(b)),
            (DateTime(_) | Date(_), DateTime(_) | Date(_)) => {
                let a = left.to_date_time(false)?;
                let b = right.to_date_time(false)?;
                partial_eq(a.partial_compare(&b))
            }
            (TypeSpecifier(a), TypeSpecifier(b)) => Some(a == b),
            (TypeInfoObject(a), TypeInfoObject(b)) => Some(a == b),
            (Node(a), Node(b)) => Some(a.to_json() == b.to_json()),
            _ => None,
        }
    }

    /// Relaxed equivalence: total (never unknown), strings compare
    /// case-insensitively with collapsed whitespace, decimals at the least
    /// precise operand's scale, temporals must match precision exactly.
    pub fn equivalent(&self, other: &FhirPathValue) -> bool {
        use FhirPathValue::*;
        let left = self.unwrap_system();
        let right = other.unwrap_system();
        match (&left, &right) {
            (Boolean(a), Boolean(b)) => a == b,
            (String(a), String(b)) => normalize_for_equivalence(a) == normalize_for_equivalence(b),
            (Integer(_) | Long(_) | Decimal(_), Integer(_) | Long(_) | Decimal(_)) => {
                match (left.to_decimal(false), right.to_decimal(false)) {
                    (Some(a), Some(b)) => {
                        let scale = a.scale().min(b.scale());
                        a.round_dp(scale) == b.round_dp(scale)
                    }
                    _ => false,
                }
            }
            (Quantity(_) | Integer(_) | Long(_) | Decimal(_), Quantity(_))
            | (Quantity(_), Integer(_) | Long(_) | Decimal(_)) => {
                match (left.to_quantity(false), right.to_quantity(false)) {
                    (Some(a), Some(b)) => a.equivalent(&b),
                    _ => false,
                }
            }
            (Date(a), Date(b)) => {
                a.precision == b.precision && a.partial_compare(b) == Some(std::cmp::Ordering::Equal)
            }
            (Time(a), Time(b)) => {
                a.precision == b.precision && a.partial_compare(b) == Some(std::cmp::Ordering::Equal)
            }
            (DateTime(a), DateTime(b)) => {
                a.precision == b.precision
                    && a.partial_compare(b) == Some(std::cmp::Ordering::Equal)
            }
            (TypeSpecifier(a), TypeSpecifier(b)) => a == b,
            (Node(a), Node(b)) => a.to_json() == b.to_json(),
            _ => false,
        }
    }

    /// JSON form of the value
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Integer(i) => JsonValue::Number((*i).into()),
            Self::Long(l) => JsonValue::Number((*l).into()),
            Self::Decimal(d) => match d.to_f64().and_then(serde_json::Number::from_f64) {
                Some(n) => JsonValue::Number(n),
                None => JsonValue::String(d.to_string()),
            },
            Self::Quantity(q) => serde_json::json!({
                "value": q.value.to_f64(),
                "unit": q.unit,
            }),
            Self::Date(d) => JsonValue::String(d.to_string()),
            Self::Time(t) => JsonValue::String(t.to_string()),
            Self::DateTime(dt) => JsonValue::String(dt.to_string()),
            Self::TypeSpecifier(spec) => JsonValue::String(spec.to_string()),
            Self::TypeInfoObject(info) => serde_json::to_value(info).unwrap_or(JsonValue::Null),
            Self::Node(node) => node.to_json(),
        }
    }
}

impl PartialEq for FhirPathValue {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other) == Some(true)
    }
}

fn partial_eq(ordering: Option<std::cmp::Ordering>) -> Option<bool> {
    ordering.map(|o| o == std::cmp::Ordering::Equal)
}

fn normalize_for_equivalence(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse `"<number>"`, `"<number> '<ucum>'"` or `"<number> <calendar-word>"`
/// into a quantity. Unquoted UCUM abbreviations are not calendar words.
pub fn parse_quantity_string(s: &str) -> Option<Quantity> {
    let trimmed = s.trim();
    if let Ok(value) = Decimal::from_str(trimmed) {
        return Some(Quantity::unitless(value));
    }
    let mut parts = trimmed.split_whitespace();
    let number = parts.next()?;
    let unit = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let value = Decimal::from_str(number).ok()?;
    if unit.len() >= 2 && unit.starts_with('\'') && unit.ends_with('\'') {
        return Some(Quantity::new(value, &unit[1..unit.len() - 1]));
    }
    CalendarUnit::from_calendar_word(unit).map(|cal| Quantity::calendar(value, cal))
}

impl fmt::Display for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Long(l) => write!(f, "{l}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Quantity(q) => write!(f, "{q}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::TypeSpecifier(spec) => write!(f, "{spec}"),
            Self::TypeInfoObject(info) => match info.specifier() {
                Some(spec) => write!(f, "{spec}"),
                None => f.write_str("(anonymous type)"),
            },
            Self::Node(node) => match node.system_value() {
                Some(value) => write!(f, "{value}"),
                None => write!(f, "{}", node.to_json()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_equality_crosses_the_ladder() {
        let one = FhirPathValue::Integer(1);
        let one_long = FhirPathValue::Long(1);
        let one_decimal = FhirPathValue::Decimal(Decimal::new(10, 1));
        assert_eq!(one.equal(&one_long), Some(true));
        assert_eq!(one.equal(&one_decimal), Some(true));
        assert_eq!(one_long.equal(&FhirPathValue::Long(2)), Some(false));
    }

    #[test]
    fn string_number_equality_is_unknown() {
        let s = FhirPathValue::String("1".into());
        let n = FhirPathValue::Integer(1);
        assert_eq!(s.equal(&n), None);
        assert_eq!(n.equal(&s), None);
    }

    #[test]
    fn equivalence_normalizes_strings() {
        let a = FhirPathValue::String("Hello   World".into());
        let b = FhirPathValue::String("hello world".into());
        assert!(a.equivalent(&b));
        assert_eq!(a.equal(&b), Some(false));
    }

    #[test]
    fn equivalence_rounds_decimals() {
        let a = FhirPathValue::Decimal(Decimal::from_str("1.58").unwrap());
        let b = FhirPathValue::Decimal(Decimal::from_str("1.6").unwrap());
        assert!(a.equivalent(&b));
        assert_eq!(a.equal(&b), Some(false));
    }

    #[test]
    fn date_precision_mismatch_is_unknown_for_equality() {
        let year = FhirPathValue::Date(PrecisionDate::parse("2020").unwrap());
        let month = FhirPathValue::Date(PrecisionDate::parse("2020-05").unwrap());
        assert_eq!(year.equal(&month), None);
        assert!(!year.equivalent(&month));
    }

    #[test]
    fn boolean_string_conversion() {
        let yes = FhirPathValue::String("Y".into());
        assert_eq!(yes.to_boolean(true), Some(true));
        assert_eq!(yes.to_boolean(false), None);
        assert_eq!(FhirPathValue::String("maybe".into()).to_boolean(true), None);
    }

    #[test]
    fn quantity_string_parsing() {
        let q = parse_quantity_string("10 'mg'").unwrap();
        assert_eq!(q.unit, "mg");
        let cal = parse_quantity_string("4 days").unwrap();
        assert_eq!(cal.calendar_unit, Some(CalendarUnit::Day));
        assert!(parse_quantity_string("4 wk").is_none());
        let bare = parse_quantity_string("1.5").unwrap();
        assert_eq!(bare.unit, "1");
    }

    #[test]
    fn date_widens_to_datetime_for_equality() {
        let date = FhirPathValue::Date(PrecisionDate::parse("2020-05-10").unwrap());
        let datetime = FhirPathValue::DateTime(PrecisionDateTime::parse("2020-05-10").unwrap());
        assert_eq!(date.equal(&datetime), Some(true));
    }
}
