//! Stable multi-key sort
//!
//! `sort()` is wired through its own AST node because each key carries a
//! parser-recorded direction. With no keys the items sort by natural order;
//! an incomparable pair is an error. Empty key values sort first for every
//! key, in both directions.

use std::cmp::Ordering;

use crate::ast::{SortDirection, SortKey};
use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::value::FhirPathValue;
use crate::evaluator::context::{EvaluationContext, FunctionScope};
use crate::evaluator::operators::order_values;
use crate::evaluator::walker::Evaluator;

/// Sort `input` by `keys` (natural order when empty)
pub fn sort_collection(
    evaluator: &Evaluator<'_>,
    input: &Collection,
    keys: &[SortKey],
    ctx: &mut EvaluationContext,
) -> Result<Collection> {
    if input.len() <= 1 {
        return Ok(input.clone().reordered(true));
    }

    // Evaluate every key for every item up front; sorting comparators
    // cannot carry errors.
    let mut decorated: Vec<(Vec<Option<FhirPathValue>>, FhirPathValue)> =
        Vec::with_capacity(input.len());
    for (index, item) in input.iter().enumerate() {
        ctx.cancellation.check()?;
        let mut item_keys = Vec::with_capacity(keys.len().max(1));
        if keys.is_empty() {
            item_keys.push(Some(item.clone()));
        } else {
            for key in keys {
                let scope = FunctionScope {
                    this: Collection::single(item.clone()),
                    index: i32::try_from(index).ok(),
                    total: None,
                };
                let mut child = ctx.scoped(scope);
                let value =
                    evaluator.evaluate(&key.expression, &Collection::single(item.clone()), &mut child)?;
                item_keys.push(match value.len() {
                    0 => None,
                    1 => value.first().cloned(),
                    n => {
                        return Err(FhirPathError::singleton_error(format!(
                            "sort() key produced {n} items for one element"
                        )));
                    }
                });
            }
        }
        decorated.push((item_keys, item.clone()));
    }

    let directions: Vec<SortDirection> = if keys.is_empty() {
        vec![SortDirection::Ascending]
    } else {
        keys.iter().map(|k| k.direction).collect()
    };

    let mut failure: Option<FhirPathError> = None;
    decorated.sort_by(|(a_keys, _), (b_keys, _)| {
        for (i, direction) in directions.iter().enumerate() {
            let ordering = match (&a_keys[i], &b_keys[i]) {
                // Empties sort first regardless of direction.
                (None, None) => Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => match order_values(a, b) {
                    Ok(Some(ordering)) => ordering,
                    Ok(None) => {
                        if failure.is_none() {
                            failure = Some(FhirPathError::type_error(
                                "sort() keys are not mutually comparable",
                            ));
                        }
                        Ordering::Equal
                    }
                    Err(error) => {
                        if failure.is_none() {
                            failure = Some(error);
                        }
                        Ordering::Equal
                    }
                },
            };
            let ordering = match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    if let Some(error) = failure {
        return Err(error);
    }

    Ok(Collection::from_values(
        decorated.into_iter().map(|(_, item)| item).collect(),
    ))
}
