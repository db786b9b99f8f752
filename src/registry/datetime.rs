//! Temporal functions: the frozen-now trio, component extraction,
//! precision and boundary functions, duration/difference and quantity
//! comparability

use chrono::Timelike;
use rust_decimal::Decimal;

use crate::core::collection::Collection;
use crate::core::decimal;
use crate::core::error::{FhirPathError, Result};
use crate::core::quantity::{CalendarUnit, Quantity};
use crate::core::temporal::{
    PrecisionDate, PrecisionDateTime, PrecisionTime, TemporalPrecision, difference_between,
    duration_between,
};
use crate::core::value::FhirPathValue;
use crate::register_function;

use super::{FunctionCategory, FunctionContext, FunctionRegistry};

fn optional(value: Option<FhirPathValue>) -> Collection {
    match value {
        Some(value) => Collection::single(value),
        None => Collection::empty(),
    }
}

/// A datetime-like singleton input, widened from Date when needed
fn datetime_input(cx: &FunctionContext<'_>) -> Result<Option<PrecisionDateTime>> {
    Ok(cx
        .input_singleton()?
        .map(FhirPathValue::unwrap_system)
        .and_then(|v| v.to_date_time(true)))
}

impl FunctionRegistry {
    pub(crate) fn register_datetime_functions(&mut self) {
        register_function!(
            self,
            eager "now",
            category: FunctionCategory::DateTime,
            description: "The evaluation instant as a zoned DateTime",
            arity: 0..=0,
            implementation: |cx| {
                Ok(Collection::single(FhirPathValue::DateTime(
                    PrecisionDateTime::new(cx.ctx.now, TemporalPrecision::Millisecond, true),
                )))
            }
        );

        register_function!(
            self,
            eager "today",
            category: FunctionCategory::DateTime,
            description: "The evaluation instant's date",
            arity: 0..=0,
            implementation: |cx| {
                Ok(Collection::single(FhirPathValue::Date(PrecisionDate::new(
                    cx.ctx.now.date_naive(),
                    TemporalPrecision::Day,
                ))))
            }
        );

        register_function!(
            self,
            eager "timeOfDay",
            category: FunctionCategory::DateTime,
            description: "The evaluation instant's time of day",
            arity: 0..=0,
            implementation: |cx| {
                Ok(Collection::single(FhirPathValue::Time(PrecisionTime::new(
                    cx.ctx.now.time(),
                    TemporalPrecision::Millisecond,
                ))))
            }
        );

        self.register_component("yearOf", TemporalPrecision::Year);
        self.register_component("monthOf", TemporalPrecision::Month);
        self.register_component("dayOf", TemporalPrecision::Day);
        self.register_component("hourOf", TemporalPrecision::Hour);
        self.register_component("minuteOf", TemporalPrecision::Minute);
        self.register_component("secondOf", TemporalPrecision::Second);
        self.register_component("millisecondOf", TemporalPrecision::Millisecond);

        register_function!(
            self,
            eager "timezoneOffsetOf",
            category: FunctionCategory::DateTime,
            description: "The timezone offset in hours; empty for floating datetimes",
            arity: 0..=0,
            implementation: |cx| {
                let Some(value) = cx.input_singleton()?.map(FhirPathValue::unwrap_system)
                else {
                    return Ok(Collection::empty());
                };
                let FhirPathValue::DateTime(dt) = value else {
                    return Ok(Collection::empty());
                };
                if !dt.has_timezone {
                    return Ok(Collection::empty());
                }
                let seconds = dt.datetime.offset().local_minus_utc();
                let hours = Decimal::from(seconds) / Decimal::from(3600);
                Ok(Collection::single(FhirPathValue::decimal(hours)))
            }
        );

        register_function!(
            self,
            eager "dateOf",
            category: FunctionCategory::DateTime,
            description: "The date component of a DateTime",
            arity: 0..=0,
            implementation: |cx| {
                let Some(value) = cx.input_singleton()?.map(FhirPathValue::unwrap_system)
                else {
                    return Ok(Collection::empty());
                };
                Ok(match value {
                    FhirPathValue::DateTime(dt) => {
                        Collection::single(FhirPathValue::Date(dt.date()))
                    }
                    FhirPathValue::Date(d) => Collection::single(FhirPathValue::Date(d)),
                    _ => Collection::empty(),
                })
            }
        );

        register_function!(
            self,
            eager "timeOf",
            category: FunctionCategory::DateTime,
            description: "The time component of a DateTime; empty below hour precision",
            arity: 0..=0,
            implementation: |cx| {
                let Some(value) = cx.input_singleton()?.map(FhirPathValue::unwrap_system)
                else {
                    return Ok(Collection::empty());
                };
                Ok(match value {
                    FhirPathValue::DateTime(dt) => optional(dt.time().map(FhirPathValue::Time)),
                    FhirPathValue::Time(t) => Collection::single(FhirPathValue::Time(t)),
                    _ => Collection::empty(),
                })
            }
        );

        register_function!(
            self,
            eager "precision",
            category: FunctionCategory::DateTime,
            description: "Significant digits of a Decimal, Date, DateTime or Time",
            arity: 0..=0,
            implementation: |cx| {
                let Some(value) = cx.input_singleton()?.map(FhirPathValue::unwrap_system)
                else {
                    return Ok(Collection::empty());
                };
                let digits = match value {
                    FhirPathValue::Decimal(d) => decimal::fraction_digits(&d) as i64,
                    FhirPathValue::Integer(_) | FhirPathValue::Long(_) => 0,
                    FhirPathValue::Date(d) => d.precision.date_digits(),
                    FhirPathValue::DateTime(dt) => dt.precision.date_time_digits(),
                    FhirPathValue::Time(t) => t.precision.time_digits(),
                    _ => return Ok(Collection::empty()),
                };
                Ok(Collection::single(FhirPathValue::Integer(digits as i32)))
            }
        );

        register_function!(
            self,
            eager "lowBoundary",
            category: FunctionCategory::DateTime,
            description: "The least value the input could denote, at the given precision",
            arity: 0..=1,
            implementation: |cx| boundary(cx, true)
        );

        register_function!(
            self,
            eager "highBoundary",
            category: FunctionCategory::DateTime,
            description: "The greatest value the input could denote, at the given precision",
            arity: 0..=1,
            implementation: |cx| boundary(cx, false)
        );

        register_function!(
            self,
            eager "duration",
            category: FunctionCategory::DateTime,
            description: "Whole calendar units elapsed from the input to the argument",
            arity: 2..=2,
            implementation: |cx| span_function(cx, duration_between)
        );

        register_function!(
            self,
            eager "difference",
            category: FunctionCategory::DateTime,
            description: "Calendar boundaries crossed from the input to the argument",
            arity: 2..=2,
            implementation: |cx| span_function(cx, difference_between)
        );

        register_function!(
            self,
            eager "comparable",
            category: FunctionCategory::DateTime,
            description: "True when the two quantities' units are mutually convertible",
            arity: 1..=1,
            implementation: |cx| {
                let Some(left) = cx.input_singleton()?.map(FhirPathValue::unwrap_system)
                else {
                    return Ok(Collection::empty());
                };
                let Some(right) = cx.singleton_arg(0)?.map(FhirPathValue::unwrap_system)
                else {
                    return Ok(Collection::empty());
                };
                let (Some(a), Some(b)) = (left.to_quantity(false), right.to_quantity(false))
                else {
                    return Ok(Collection::single(FhirPathValue::Boolean(false)));
                };
                Ok(Collection::single(FhirPathValue::Boolean(a.comparable(&b))))
            }
        );
    }

    /// yearOf/monthOf/…/millisecondOf share one extraction shape: empty
    /// when the input lacks the component's precision.
    fn register_component(&mut self, name: &'static str, level: TemporalPrecision) {
        let metadata = super::FunctionMetadata::new(
            name,
            FunctionCategory::DateTime,
            "Extract one calendar component of a temporal value",
            0,
            Some(0),
        );
        self.register_eager(metadata, move |cx| {
            use chrono::Datelike;
            let Some(value) = cx.input_singleton()?.map(FhirPathValue::unwrap_system) else {
                return Ok(Collection::empty());
            };
            let component = match &value {
                FhirPathValue::Date(d) => {
                    if d.precision < level || level > TemporalPrecision::Day {
                        None
                    } else {
                        Some(match level {
                            TemporalPrecision::Year => d.date.year(),
                            TemporalPrecision::Month => d.date.month() as i32,
                            _ => d.date.day() as i32,
                        })
                    }
                }
                FhirPathValue::DateTime(dt) => {
                    if dt.precision < level {
                        None
                    } else {
                        let inner = dt.datetime;
                        Some(match level {
                            TemporalPrecision::Year => inner.year(),
                            TemporalPrecision::Month => inner.month() as i32,
                            TemporalPrecision::Day => inner.day() as i32,
                            TemporalPrecision::Hour => inner.hour() as i32,
                            TemporalPrecision::Minute => inner.minute() as i32,
                            TemporalPrecision::Second => inner.second() as i32,
                            TemporalPrecision::Millisecond => {
                                (inner.nanosecond() / 1_000_000) as i32
                            }
                        })
                    }
                }
                FhirPathValue::Time(t) => {
                    if level < TemporalPrecision::Hour || t.precision < level {
                        None
                    } else {
                        Some(match level {
                            TemporalPrecision::Hour => t.time.hour() as i32,
                            TemporalPrecision::Minute => t.time.minute() as i32,
                            TemporalPrecision::Second => t.time.second() as i32,
                            _ => (t.time.nanosecond() / 1_000_000) as i32,
                        })
                    }
                }
                _ => None,
            };
            Ok(optional(component.map(FhirPathValue::Integer)))
        });
    }
}

fn boundary(cx: &mut FunctionContext<'_>, low: bool) -> Result<Collection> {
    let Some(value) = cx.input_singleton()?.map(FhirPathValue::unwrap_system) else {
        return Ok(Collection::empty());
    };
    let digits = match cx.arg(0) {
        None => None,
        Some(_) => match cx.integer_arg(0)? {
            Some(digits) => Some(digits as i64),
            None => return Ok(Collection::empty()),
        },
    };
    let result = match value {
        FhirPathValue::Decimal(_)
        | FhirPathValue::Integer(_)
        | FhirPathValue::Long(_) => {
            let d = value.to_decimal(false).expect("numeric");
            let digits = digits.unwrap_or(decimal::DEFAULT_BOUNDARY_DIGITS);
            let bounded = if low {
                decimal::low_boundary(&d, digits)
            } else {
                decimal::high_boundary(&d, digits)
            };
            bounded.map(FhirPathValue::decimal)
        }
        FhirPathValue::Quantity(q) => {
            let digits = digits.unwrap_or(decimal::DEFAULT_BOUNDARY_DIGITS);
            let bounded = if low {
                decimal::low_boundary(&q.value, digits)
            } else {
                decimal::high_boundary(&q.value, digits)
            };
            bounded.map(|value| {
                FhirPathValue::Quantity(Quantity {
                    value,
                    unit: q.unit.clone(),
                    calendar_unit: q.calendar_unit,
                })
            })
        }
        FhirPathValue::Date(d) => {
            let digits = digits.unwrap_or(8);
            let bounded = if low {
                d.low_boundary(digits)
            } else {
                d.high_boundary(digits)
            };
            bounded.map(FhirPathValue::Date)
        }
        FhirPathValue::DateTime(dt) => {
            let digits = digits.unwrap_or(17);
            let bounded = if low {
                dt.low_boundary(digits)
            } else {
                dt.high_boundary(digits)
            };
            bounded.map(FhirPathValue::DateTime)
        }
        FhirPathValue::Time(t) => {
            let digits = digits.unwrap_or(9);
            let bounded = if low {
                t.low_boundary(digits)
            } else {
                t.high_boundary(digits)
            };
            bounded.map(FhirPathValue::Time)
        }
        _ => None,
    };
    Ok(optional(result))
}

type SpanFn = fn(&PrecisionDateTime, &PrecisionDateTime, CalendarUnit) -> Option<i64>;

/// duration/difference: input is the start, first argument the end, second
/// the unit name.
fn span_function(cx: &mut FunctionContext<'_>, span: SpanFn) -> Result<Collection> {
    let Some(start) = datetime_input(cx)? else {
        return Ok(Collection::empty());
    };
    let Some(end) = cx
        .singleton_arg(0)?
        .map(FhirPathValue::unwrap_system)
        .and_then(|v| v.to_date_time(true))
    else {
        return Ok(Collection::empty());
    };
    let Some(unit_name) = cx.string_arg(1)? else {
        return Ok(Collection::empty());
    };
    let Some(unit) = CalendarUnit::from_name(&unit_name) else {
        return Err(FhirPathError::domain_error(format!(
            "'{unit_name}' is not a calendar unit"
        )));
    };
    Ok(optional(
        span(&start, &end, unit).and_then(|v| i32::try_from(v).ok().map(FhirPathValue::Integer)),
    ))
}
