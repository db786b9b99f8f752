//! Public evaluation entry points

use rust_decimal::Decimal;

use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::value::FhirPathValue;
use crate::parser::Expression;

use super::context::EvaluationContext;
use super::operators::boolean_operand;
use super::walker::Evaluator;

/// Evaluate a parsed expression against a root value.
///
/// The root is also bound to `%context` (and `%resource`/`%rootResource`),
/// and the evaluation instant is frozen so `now()`, `today()` and
/// `timeOfDay()` agree for the whole run. The context itself is not
/// modified; every evaluation works on its own clone.
pub fn evaluate(
    ctx: &EvaluationContext,
    root: FhirPathValue,
    expression: &Expression,
) -> Result<Collection> {
    evaluate_collection(ctx, Collection::single(root), expression)
}

/// Evaluate against a root collection (usually a single resource)
pub fn evaluate_collection(
    ctx: &EvaluationContext,
    root: Collection,
    expression: &Expression,
) -> Result<Collection> {
    let mut ready = ctx.begin_evaluation(&root);
    let evaluator = Evaluator::new(&root);
    evaluator.evaluate(expression.root(), &root, &mut ready)
}

/// Extract a boolean from a result collection.
///
/// Empty is `None`; more than one item is an error. A lone item that is not
/// convertible to Boolean still reads as `true` — the singleton evaluation
/// rule for boolean contexts.
pub fn singleton_boolean(collection: &Collection) -> Result<Option<bool>> {
    boolean_operand(collection)
}

/// Extract a string from a result collection (implicit conversion)
pub fn singleton_string(collection: &Collection) -> Result<Option<String>> {
    singleton_with(collection, "String", |v| v.to_string_value(false))
}

/// Extract an integer from a result collection (implicit conversion)
pub fn singleton_integer(collection: &Collection) -> Result<Option<i32>> {
    singleton_with(collection, "Integer", |v| v.to_integer(false))
}

/// Extract a long from a result collection (implicit conversion)
pub fn singleton_long(collection: &Collection) -> Result<Option<i64>> {
    singleton_with(collection, "Long", |v| v.to_long(false))
}

/// Extract a decimal from a result collection (implicit conversion)
pub fn singleton_decimal(collection: &Collection) -> Result<Option<Decimal>> {
    singleton_with(collection, "Decimal", |v| v.to_decimal(false))
}

fn singleton_with<T>(
    collection: &Collection,
    expected: &str,
    convert: impl Fn(&FhirPathValue) -> Option<T>,
) -> Result<Option<T>> {
    match collection.len() {
        0 => Ok(None),
        1 => {
            let value = collection.first().expect("singleton");
            convert(value).map(Some).ok_or_else(|| {
                FhirPathError::type_error(format!(
                    "expected a singleton {expected}, got {}",
                    value.type_name()
                ))
            })
        }
        n => Err(FhirPathError::singleton_error(format!(
            "expected at most one item, got {n}"
        ))),
    }
}
