//! Operator semantics: the numeric promotion ladder, comparison, equality,
//! equivalence, membership and three-valued logic
//!
//! Overflow on the fixed-width integer types yields empty, never a wrapped
//! value. Division always promotes to decimal; `div` truncates toward zero
//! and `mod` keeps the dividend's sign.

use std::cmp::Ordering;

use crate::ast::BinaryOperator;
use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::quantity::Quantity;
use crate::core::value::FhirPathValue;
use crate::evaluator::context::EvaluationContext;

/// Evaluate an arithmetic operator (`*`, `/`, `div`, `mod`, `+`, `-`, `&`)
pub fn arithmetic(
    operator: BinaryOperator,
    left: &Collection,
    right: &Collection,
    _ctx: &EvaluationContext,
) -> Result<Collection> {
    if operator == BinaryOperator::Concatenate {
        return concatenate(left, right);
    }
    if left.is_empty() || right.is_empty() {
        return Ok(Collection::empty());
    }
    let lhs = singleton_operand(left, operator)?;
    let rhs = singleton_operand(right, operator)?;

    // Temporal ± quantity uses calendar arithmetic.
    if matches!(operator, BinaryOperator::Add | BinaryOperator::Subtract) {
        if let Some(result) = temporal_arithmetic(operator, &lhs, &rhs)? {
            return Ok(result);
        }
    }

    // String + String concatenates (unlike `&`, empties already propagated).
    if operator == BinaryOperator::Add {
        if let (FhirPathValue::String(a), FhirPathValue::String(b)) = (&lhs, &rhs) {
            return Ok(Collection::single(FhirPathValue::String(format!("{a}{b}"))));
        }
    }

    numeric_arithmetic(operator, &lhs, &rhs)
}

fn singleton_operand(collection: &Collection, operator: BinaryOperator) -> Result<FhirPathValue> {
    match collection.as_singleton() {
        Some(value) => Ok(value.unwrap_system()),
        None => Err(FhirPathError::singleton_error(format!(
            "operator '{operator}' requires singleton operands, got {} items",
            collection.len()
        ))),
    }
}

fn concatenate(left: &Collection, right: &Collection) -> Result<Collection> {
    let part = |c: &Collection| -> Result<String> {
        if c.is_empty() {
            return Ok(String::new());
        }
        let value = c.as_singleton().ok_or_else(|| {
            FhirPathError::singleton_error("operator '&' requires singleton operands")
        })?;
        value.to_string_value(false).ok_or_else(|| {
            FhirPathError::type_error(format!(
                "operator '&' requires string operands, got {}",
                value.type_name()
            ))
        })
    };
    Ok(Collection::single(FhirPathValue::String(format!(
        "{}{}",
        part(left)?,
        part(right)?
    ))))
}

/// Date/DateTime/Time plus or minus a calendar-unit quantity. Returns
/// `Ok(None)` when the operands are not a temporal/quantity pair.
fn temporal_arithmetic(
    operator: BinaryOperator,
    lhs: &FhirPathValue,
    rhs: &FhirPathValue,
) -> Result<Option<Collection>> {
    let temporal = matches!(
        lhs,
        FhirPathValue::Date(_) | FhirPathValue::DateTime(_) | FhirPathValue::Time(_)
    );
    if !temporal {
        return Ok(None);
    }
    let FhirPathValue::Quantity(quantity) = rhs else {
        return Err(FhirPathError::type_error(format!(
            "cannot apply '{operator}' to {} and {}",
            lhs.type_name(),
            rhs.type_name()
        )));
    };
    let Some(unit) = quantity.temporal_unit() else {
        return Err(FhirPathError::type_error(format!(
            "'{}' is not a calendar unit",
            quantity.unit
        )));
    };
    let value = if operator == BinaryOperator::Subtract {
        -quantity.value
    } else {
        quantity.value
    };
    let result = match lhs {
        FhirPathValue::Date(date) => date.add_quantity(value, unit).map(FhirPathValue::Date),
        FhirPathValue::DateTime(datetime) => datetime
            .add_quantity(value, unit)
            .map(FhirPathValue::DateTime),
        FhirPathValue::Time(time) => time.add_quantity(value, unit).map(FhirPathValue::Time),
        _ => unreachable!("guarded above"),
    };
    // Calendar overflow (out-of-range dates) yields empty.
    Ok(Some(match result {
        Some(value) => Collection::single(value),
        None => Collection::empty(),
    }))
}

/// The promotion ladder: Integer → Long → Decimal → Quantity. The operation
/// runs at the first rung both operands reach.
fn numeric_arithmetic(
    operator: BinaryOperator,
    lhs: &FhirPathValue,
    rhs: &FhirPathValue,
) -> Result<Collection> {
    use BinaryOperator::*;

    let incompatible = || {
        FhirPathError::type_error(format!(
            "cannot apply '{operator}' to {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))
    };

    // Division always promotes to decimal.
    let both_integers = matches!(lhs, FhirPathValue::Integer(_) | FhirPathValue::Long(_))
        && matches!(rhs, FhirPathValue::Integer(_) | FhirPathValue::Long(_));

    if both_integers && operator != Divide {
        let a = lhs.to_long(false).ok_or_else(incompatible)?;
        let b = rhs.to_long(false).ok_or_else(incompatible)?;
        let small = matches!(lhs, FhirPathValue::Integer(_))
            && matches!(rhs, FhirPathValue::Integer(_));
        let result = match operator {
            Multiply => a.checked_mul(b),
            Add => a.checked_add(b),
            Subtract => a.checked_sub(b),
            IntegerDivide => {
                if b == 0 {
                    return Ok(Collection::empty());
                }
                a.checked_div(b)
            }
            Modulo => {
                if b == 0 {
                    return Ok(Collection::empty());
                }
                a.checked_rem(b)
            }
            _ => return Err(incompatible()),
        };
        return Ok(match result {
            Some(value) if small => match i32::try_from(value) {
                Ok(v) => Collection::single(FhirPathValue::Integer(v)),
                // Overflow of the fixed-width type yields empty.
                Err(_) => Collection::empty(),
            },
            Some(value) => Collection::single(FhirPathValue::Long(value)),
            None => Collection::empty(),
        });
    }

    let quantity_involved =
        matches!(lhs, FhirPathValue::Quantity(_)) || matches!(rhs, FhirPathValue::Quantity(_));

    if quantity_involved {
        let a = lhs.to_quantity(false).ok_or_else(incompatible)?;
        let b = rhs.to_quantity(false).ok_or_else(incompatible)?;
        let result = match operator {
            Add => Some(Collection::single(FhirPathValue::Quantity(a.add(&b)?))),
            Subtract => Some(Collection::single(FhirPathValue::Quantity(a.subtract(&b)?))),
            Multiply => a
                .multiply(&b)
                .map(|q| Collection::single(FhirPathValue::Quantity(q))),
            Divide => a
                .divide(&b)
                .map(|q| Collection::single(FhirPathValue::Quantity(q))),
            _ => return Err(incompatible()),
        };
        return Ok(result.unwrap_or_else(Collection::empty));
    }

    // Decimal rung (also hosts integer division results).
    let a = lhs.to_decimal(false).ok_or_else(incompatible)?;
    let b = rhs.to_decimal(false).ok_or_else(incompatible)?;
    let result = match operator {
        Multiply => a.checked_mul(b),
        Divide => {
            if b.is_zero() {
                return Ok(Collection::empty());
            }
            a.checked_div(b)
        }
        Add => a.checked_add(b),
        Subtract => a.checked_sub(b),
        IntegerDivide => {
            if b.is_zero() {
                return Ok(Collection::empty());
            }
            a.checked_div(b).map(|q| q.trunc())
        }
        Modulo => {
            if b.is_zero() {
                return Ok(Collection::empty());
            }
            a.checked_rem(b)
        }
        _ => return Err(incompatible()),
    };
    Ok(match result {
        Some(value) if operator == IntegerDivide => {
            // div over decimals yields the truncated integer value.
            match value.try_into() {
                Ok(v) => Collection::single(FhirPathValue::Long(v)),
                Err(_) => Collection::single(FhirPathValue::decimal(value)),
            }
        }
        Some(value) => Collection::single(FhirPathValue::decimal(value)),
        None => Collection::empty(),
    })
}

/// Evaluate an inequality operator (`<`, `<=`, `>`, `>=`)
pub fn compare(
    operator: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> Result<Collection> {
    if left.is_empty() || right.is_empty() {
        return Ok(Collection::empty());
    }
    let lhs = singleton_operand(left, operator)?;
    let rhs = singleton_operand(right, operator)?;
    let ordering = order_values(&lhs, &rhs)?;
    Ok(match ordering {
        Some(ordering) => {
            let result = match operator {
                BinaryOperator::LessThan => ordering == Ordering::Less,
                BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
                BinaryOperator::GreaterThan => ordering == Ordering::Greater,
                BinaryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
                _ => unreachable!("compare only handles inequalities"),
            };
            Collection::single(FhirPathValue::Boolean(result))
        }
        // Shared precision agreed but one side carries more: unknown.
        None => Collection::empty(),
    })
}

/// Total/partial ordering across two values; `Ok(None)` is the three-valued
/// unknown, `Err` a genuine type error.
pub fn order_values(lhs: &FhirPathValue, rhs: &FhirPathValue) -> Result<Option<Ordering>> {
    use FhirPathValue::*;
    let incompatible = || {
        FhirPathError::type_error(format!(
            "cannot compare {} with {}",
            lhs.type_name(),
            rhs.type_name()
        ))
    };
    let lhs = lhs.unwrap_system();
    let rhs = rhs.unwrap_system();
    match (&lhs, &rhs) {
        (String(a), String(b)) => Ok(Some(a.cmp(b))),
        (Integer(_) | Long(_) | Decimal(_), Integer(_) | Long(_) | Decimal(_)) => {
            let a = lhs.to_decimal(false).ok_or_else(incompatible)?;
            let b = rhs.to_decimal(false).ok_or_else(incompatible)?;
            Ok(Some(a.cmp(&b)))
        }
        (Quantity(a), Quantity(b)) => match a.compare(b) {
            Some(ordering) => Ok(Some(ordering)),
            None => Err(FhirPathError::unit_error(a.unit.clone(), b.unit.clone())),
        },
        (Date(a), Date(b)) => Ok(a.partial_compare(b)),
        (Time(a), Time(b)) => Ok(a.partial_compare(b)),
        (DateTime(_) | Date(_), DateTime(_) | Date(_)) => {
            let a = lhs.to_date_time(false).ok_or_else(incompatible)?;
            let b = rhs.to_date_time(false).ok_or_else(incompatible)?;
            Ok(a.partial_compare(&b))
        }
        _ => Err(incompatible()),
    }
}

/// Evaluate `=` / `!=`: positional, length-sensitive, three-valued
pub fn equality(
    left: &Collection,
    right: &Collection,
    negate: bool,
) -> Result<Collection> {
    if left.is_empty() || right.is_empty() {
        return Ok(Collection::empty());
    }
    if (left.len() > 1 || right.len() > 1) && !(left.is_ordered() && right.is_ordered()) {
        return Err(FhirPathError::domain_error(
            "equality over unordered collections of more than one item",
        ));
    }
    let result = if left.len() != right.len() {
        Some(false)
    } else {
        let mut all_equal = Some(true);
        for (a, b) in left.iter().zip(right.iter()) {
            match a.equal(b) {
                Some(true) => {}
                Some(false) => {
                    all_equal = Some(false);
                    break;
                }
                None => {
                    all_equal = None;
                    break;
                }
            }
        }
        all_equal
    };
    Ok(match result {
        Some(value) => Collection::single(FhirPathValue::Boolean(value ^ negate)),
        None => Collection::empty(),
    })
}

/// Evaluate `~` / `!~`: element-wise, order-insensitive, never unknown
pub fn equivalence(left: &Collection, right: &Collection, negate: bool) -> Collection {
    let result = if left.is_empty() && right.is_empty() {
        true
    } else if left.len() != right.len() {
        false
    } else {
        let mut used = vec![false; right.len()];
        left.iter().all(|a| {
            right.iter().enumerate().any(|(i, b)| {
                if !used[i] && a.equivalent(b) {
                    used[i] = true;
                    true
                } else {
                    false
                }
            })
        })
    };
    Collection::single(FhirPathValue::Boolean(result ^ negate))
}

/// Evaluate `in` / `contains`
pub fn membership(
    operator: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> Result<Collection> {
    let (needle, haystack) = match operator {
        BinaryOperator::In => (left, right),
        _ => (right, left),
    };
    if needle.is_empty() {
        return Ok(Collection::empty());
    }
    if needle.len() > 1 {
        return Err(FhirPathError::singleton_error(format!(
            "operator '{operator}' requires a singleton, got {} items",
            needle.len()
        )));
    }
    let found = haystack.contains_value(needle.first().expect("checked non-empty"));
    Ok(Collection::single(FhirPathValue::Boolean(found)))
}

/// Reduce a collection to a three-valued boolean operand. The singleton
/// evaluation rule applies: a lone non-boolean item reads as `true`.
pub fn boolean_operand(collection: &Collection) -> Result<Option<bool>> {
    match collection.len() {
        0 => Ok(None),
        1 => {
            let value = collection.first().expect("singleton");
            Ok(Some(value.to_boolean(false).unwrap_or(true)))
        }
        n => Err(FhirPathError::singleton_error(format!(
            "boolean operator requires a singleton operand, got {n} items"
        ))),
    }
}

/// Kleene three-valued logic for `and`, `or`, `xor`, `implies`
pub fn logical(
    operator: BinaryOperator,
    left: Option<bool>,
    right: Option<bool>,
) -> Collection {
    use BinaryOperator::*;
    let result = match operator {
        And => match (left, right) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        Or => match (left, right) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        Xor => match (left, right) {
            (Some(a), Some(b)) => Some(a != b),
            _ => None,
        },
        Implies => match (left, right) {
            (Some(false), _) => Some(true),
            (_, Some(true)) => Some(true),
            (Some(true), Some(false)) => Some(false),
            _ => None,
        },
        _ => unreachable!("logical only handles and/or/xor/implies"),
    };
    match result {
        Some(value) => Collection::single(FhirPathValue::Boolean(value)),
        None => Collection::empty(),
    }
}

/// Unary minus over a singleton numeric collection
pub fn negate(collection: &Collection) -> Result<Collection> {
    if collection.is_empty() {
        return Ok(Collection::empty());
    }
    let value = collection
        .as_singleton()
        .ok_or_else(|| FhirPathError::singleton_error("unary '-' requires a singleton"))?
        .unwrap_system();
    let negated = match value {
        FhirPathValue::Integer(i) => i.checked_neg().map(FhirPathValue::Integer),
        FhirPathValue::Long(l) => l.checked_neg().map(FhirPathValue::Long),
        FhirPathValue::Decimal(d) => Some(FhirPathValue::Decimal(-d)),
        FhirPathValue::Quantity(q) => Some(FhirPathValue::Quantity(Quantity {
            value: -q.value,
            unit: q.unit,
            calendar_unit: q.calendar_unit,
        })),
        other => {
            return Err(FhirPathError::type_error(format!(
                "cannot negate {}",
                other.type_name()
            )));
        }
    };
    Ok(match negated {
        Some(value) => Collection::single(value),
        None => Collection::empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn ints(values: &[i32]) -> Collection {
        values
            .iter()
            .map(|v| FhirPathValue::Integer(*v))
            .collect()
    }

    fn single_bool(c: &Collection) -> Option<bool> {
        c.as_singleton().and_then(|v| v.to_boolean(false))
    }

    #[test]
    fn integer_overflow_yields_empty() {
        let ctx = EvaluationContext::new();
        let max = Collection::single(FhirPathValue::Integer(i32::MAX));
        let one = Collection::single(FhirPathValue::Integer(1));
        let sum = arithmetic(BinaryOperator::Add, &max, &one, &ctx).unwrap();
        assert!(sum.is_empty());
        // Longs have their own headroom.
        let max_long = Collection::single(FhirPathValue::Long(i32::MAX as i64));
        let sum = arithmetic(BinaryOperator::Add, &max_long, &one, &ctx).unwrap();
        assert_eq!(
            sum.as_singleton().unwrap().to_long(false),
            Some(i32::MAX as i64 + 1)
        );
    }

    #[test]
    fn division_promotes_to_decimal() {
        let ctx = EvaluationContext::new();
        let result = arithmetic(BinaryOperator::Divide, &ints(&[1]), &ints(&[2]), &ctx).unwrap();
        assert!(matches!(
            result.as_singleton(),
            Some(FhirPathValue::Decimal(d)) if *d == Decimal::new(5, 1)
        ));
    }

    #[test]
    fn div_truncates_toward_zero_and_mod_keeps_sign() {
        let ctx = EvaluationContext::new();
        let result =
            arithmetic(BinaryOperator::IntegerDivide, &ints(&[-7]), &ints(&[2]), &ctx).unwrap();
        assert_eq!(result.as_singleton().unwrap().to_integer(false), Some(-3));
        let result = arithmetic(BinaryOperator::Modulo, &ints(&[-7]), &ints(&[2]), &ctx).unwrap();
        assert_eq!(result.as_singleton().unwrap().to_integer(false), Some(-1));
        // Division by zero is empty, not an error.
        let result =
            arithmetic(BinaryOperator::IntegerDivide, &ints(&[1]), &ints(&[0]), &ctx).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn concatenation_reads_empty_as_blank() {
        let ctx = EvaluationContext::new();
        let name = Collection::single(FhirPathValue::String("Duck".into()));
        let result =
            arithmetic(BinaryOperator::Concatenate, &name, &Collection::empty(), &ctx).unwrap();
        assert_eq!(
            result.as_singleton().unwrap().to_string_value(false).as_deref(),
            Some("Duck")
        );
        // `+` propagates the empty instead.
        let result = arithmetic(BinaryOperator::Add, &name, &Collection::empty(), &ctx).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn equality_is_three_valued() {
        let empty = Collection::empty();
        let one = ints(&[1]);
        assert!(equality(&one, &empty, false).unwrap().is_empty());
        assert_eq!(
            single_bool(&equality(&one, &ints(&[1]), false).unwrap()),
            Some(true)
        );
        assert_eq!(
            single_bool(&equality(&one, &ints(&[2]), false).unwrap()),
            Some(false)
        );
        assert_eq!(
            single_bool(&equality(&one, &ints(&[1, 2]), false).unwrap()),
            Some(false)
        );
    }

    #[test]
    fn equality_on_unordered_collections_errors() {
        let left = Collection::with_ordering(ints(&[1, 2]).into_vec(), false);
        let right = ints(&[1, 2]);
        assert!(equality(&left, &right, false).is_err());
    }

    #[test]
    fn equivalence_ignores_order_and_handles_empty() {
        let empty = Collection::empty();
        assert_eq!(single_bool(&equivalence(&empty, &empty, false)), Some(true));
        assert_eq!(
            single_bool(&equivalence(&ints(&[1, 2]), &ints(&[2, 1]), false)),
            Some(true)
        );
        assert_eq!(
            single_bool(&equivalence(&ints(&[1]), &empty, false)),
            Some(false)
        );
    }

    #[test]
    fn kleene_tables() {
        use BinaryOperator::*;
        // and
        assert_eq!(single_bool(&logical(And, None, Some(false))), Some(false));
        assert!(logical(And, None, Some(true)).is_empty());
        // or
        assert_eq!(single_bool(&logical(Or, None, Some(true))), Some(true));
        assert!(logical(Or, None, Some(false)).is_empty());
        // xor
        assert!(logical(Xor, None, Some(true)).is_empty());
        assert_eq!(
            single_bool(&logical(Xor, Some(true), Some(false))),
            Some(true)
        );
        // implies
        assert_eq!(single_bool(&logical(Implies, Some(false), None)), Some(true));
        assert_eq!(single_bool(&logical(Implies, None, Some(true))), Some(true));
        assert!(logical(Implies, Some(true), None).is_empty());
    }

    #[test]
    fn membership_rules() {
        let one = ints(&[1]);
        let set = ints(&[1, 2, 3]);
        assert_eq!(
            single_bool(&membership(BinaryOperator::In, &one, &set).unwrap()),
            Some(true)
        );
        assert_eq!(
            single_bool(&membership(BinaryOperator::Contains, &set, &one).unwrap()),
            Some(true)
        );
        assert!(membership(BinaryOperator::In, &Collection::empty(), &set)
            .unwrap()
            .is_empty());
        assert_eq!(
            single_bool(&membership(BinaryOperator::In, &one, &Collection::empty()).unwrap()),
            Some(false)
        );
    }

    #[test]
    fn string_ordering() {
        let a = Collection::single(FhirPathValue::String("apple".into()));
        let b = Collection::single(FhirPathValue::String("pear".into()));
        let result = compare(BinaryOperator::LessThan, &a, &b).unwrap();
        assert_eq!(single_bool(&result), Some(true));
    }

    #[test]
    fn incompatible_comparison_errors() {
        let s = Collection::single(FhirPathValue::String("1".into()));
        let n = ints(&[1]);
        assert!(compare(BinaryOperator::LessThan, &s, &n).is_err());
    }
}
