//! Math functions over the numeric ladder
//!
//! All return empty on empty input. `sqrt` and `ln`/`log` of non-positive
//! values, and `power` with a negative base and fractional exponent, yield
//! empty rather than an error.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal::prelude::ToPrimitive;

use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::quantity::Quantity;
use crate::core::value::FhirPathValue;
use crate::register_function;

use super::{FunctionCategory, FunctionContext, FunctionRegistry};

/// The numeric payload a math function operates on
enum NumericInput {
    Integer(i64),
    Decimal(Decimal),
    Quantity(Quantity),
}

fn numeric_input(cx: &FunctionContext<'_>) -> Result<Option<NumericInput>> {
    let Some(value) = cx.input_singleton()? else {
        return Ok(None);
    };
    let value = value.unwrap_system();
    match value {
        FhirPathValue::Integer(i) => Ok(Some(NumericInput::Integer(i as i64))),
        FhirPathValue::Long(l) => Ok(Some(NumericInput::Integer(l))),
        FhirPathValue::Decimal(d) => Ok(Some(NumericInput::Decimal(d))),
        FhirPathValue::Quantity(q) => Ok(Some(NumericInput::Quantity(q))),
        other => Err(FhirPathError::type_error(format!(
            "{}() requires a numeric input, got {}",
            cx.name,
            other.type_name()
        ))),
    }
}

fn decimal_input(cx: &FunctionContext<'_>) -> Result<Option<Decimal>> {
    Ok(match numeric_input(cx)? {
        None => None,
        Some(NumericInput::Integer(i)) => Some(Decimal::from(i)),
        Some(NumericInput::Decimal(d)) => Some(d),
        Some(NumericInput::Quantity(q)) => Some(q.value),
    })
}

/// Integers come back as Integer/Long; everything else as Decimal.
fn integer_result(value: Decimal) -> FhirPathValue {
    if let Some(i) = value.to_i32() {
        FhirPathValue::Integer(i)
    } else if let Some(l) = value.to_i64() {
        FhirPathValue::Long(l)
    } else {
        FhirPathValue::decimal(value)
    }
}

fn optional(value: Option<FhirPathValue>) -> Collection {
    match value {
        Some(value) => Collection::single(value),
        None => Collection::empty(),
    }
}

impl FunctionRegistry {
    pub(crate) fn register_math_functions(&mut self) {
        register_function!(
            self,
            eager "abs",
            category: FunctionCategory::Math,
            description: "Absolute value; quantities keep their unit",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match numeric_input(cx)? {
                    None => Collection::empty(),
                    Some(NumericInput::Integer(i)) => {
                        optional(i.checked_abs().map(|v| integer_result(Decimal::from(v))))
                    }
                    Some(NumericInput::Decimal(d)) => {
                        Collection::single(FhirPathValue::Decimal(d.abs()))
                    }
                    Some(NumericInput::Quantity(q)) => {
                        Collection::single(FhirPathValue::Quantity(Quantity {
                            value: q.value.abs(),
                            unit: q.unit,
                            calendar_unit: q.calendar_unit,
                        }))
                    }
                })
            }
        );

        register_function!(
            self,
            eager "ceiling",
            category: FunctionCategory::Math,
            description: "Smallest integer greater than or equal to the input",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match decimal_input(cx)? {
                    None => Collection::empty(),
                    Some(d) => Collection::single(integer_result(d.ceil())),
                })
            }
        );

        register_function!(
            self,
            eager "floor",
            category: FunctionCategory::Math,
            description: "Largest integer less than or equal to the input",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match decimal_input(cx)? {
                    None => Collection::empty(),
                    Some(d) => Collection::single(integer_result(d.floor())),
                })
            }
        );

        register_function!(
            self,
            eager "truncate",
            category: FunctionCategory::Math,
            description: "The integer part of the input",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match decimal_input(cx)? {
                    None => Collection::empty(),
                    Some(d) => Collection::single(integer_result(d.trunc())),
                })
            }
        );

        register_function!(
            self,
            eager "round",
            category: FunctionCategory::Math,
            description: "The input rounded to the given number of decimal places",
            arity: 0..=1,
            implementation: |cx| {
                let Some(d) = decimal_input(cx)? else {
                    return Ok(Collection::empty());
                };
                let digits = match cx.arg(0) {
                    None => 0,
                    Some(_) => match cx.integer_arg(0)? {
                        Some(digits) if digits >= 0 => digits,
                        Some(digits) => {
                            return Err(FhirPathError::domain_error(format!(
                                "round() precision must not be negative, got {digits}"
                            )));
                        }
                        None => return Ok(Collection::empty()),
                    },
                };
                let rounded = d.round_dp_with_strategy(
                    digits.min(28) as u32,
                    rust_decimal::RoundingStrategy::MidpointAwayFromZero,
                );
                Ok(Collection::single(FhirPathValue::decimal(rounded)))
            }
        );

        register_function!(
            self,
            eager "exp",
            category: FunctionCategory::Math,
            description: "e raised to the input",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match decimal_input(cx)? {
                    None => Collection::empty(),
                    Some(d) => optional(d.checked_exp().map(FhirPathValue::decimal)),
                })
            }
        );

        register_function!(
            self,
            eager "ln",
            category: FunctionCategory::Math,
            description: "Natural logarithm; empty for non-positive input",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match decimal_input(cx)? {
                    None => Collection::empty(),
                    Some(d) => optional(d.checked_ln().map(FhirPathValue::decimal)),
                })
            }
        );

        register_function!(
            self,
            eager "log",
            category: FunctionCategory::Math,
            description: "Logarithm in the given base; empty outside the domain",
            arity: 1..=1,
            implementation: |cx| {
                let Some(d) = decimal_input(cx)? else {
                    return Ok(Collection::empty());
                };
                let Some(base) = cx.singleton_arg(0)?.and_then(|v| v.to_decimal(false)) else {
                    return Ok(Collection::empty());
                };
                let result = match (d.checked_ln(), base.checked_ln()) {
                    (Some(numerator), Some(denominator)) if !denominator.is_zero() => {
                        numerator.checked_div(denominator)
                    }
                    _ => None,
                };
                Ok(optional(result.map(FhirPathValue::decimal)))
            }
        );

        register_function!(
            self,
            eager "power",
            category: FunctionCategory::Math,
            description: "The input raised to the given exponent; empty when undefined",
            arity: 1..=1,
            implementation: |cx| {
                let input = numeric_input(cx)?;
                let Some(input) = input else {
                    return Ok(Collection::empty());
                };
                let Some(exponent) = cx.singleton_arg(0)? else {
                    return Ok(Collection::empty());
                };
                let exponent = exponent.unwrap_system();

                // Integer base with non-negative integer exponent stays integral.
                if let (NumericInput::Integer(base), Some(exp)) =
                    (&input, exponent.to_long(false))
                {
                    if exp >= 0 {
                        let result = u32::try_from(exp)
                            .ok()
                            .and_then(|exp| base.checked_pow(exp));
                        return Ok(optional(result.map(|v| integer_result(Decimal::from(v)))));
                    }
                }

                let base = match input {
                    NumericInput::Integer(i) => Decimal::from(i),
                    NumericInput::Decimal(d) => d,
                    NumericInput::Quantity(q) => q.value,
                };
                let Some(exp) = exponent.to_decimal(false) else {
                    return Err(FhirPathError::type_error(
                        "power() requires a numeric exponent",
                    ));
                };
                // Negative base with a fractional exponent has no real result.
                if base.is_sign_negative() && exp.fract() != Decimal::ZERO {
                    return Ok(Collection::empty());
                }
                Ok(optional(base.checked_powd(exp).map(FhirPathValue::decimal)))
            }
        );

        register_function!(
            self,
            eager "sqrt",
            category: FunctionCategory::Math,
            description: "Square root; empty for negative input",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match decimal_input(cx)? {
                    None => Collection::empty(),
                    Some(d) => optional(d.sqrt().map(FhirPathValue::decimal)),
                })
            }
        );
    }
}
