//! Filtering and projection: where, select, repeat, repeatAll

use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::value::FhirPathValue;
use crate::register_function;

use super::existence::criteria_is_true;
use super::{FunctionCategory, FunctionRegistry, LazyFunctionContext};

impl FunctionRegistry {
    pub(crate) fn register_filtering_functions(&mut self) {
        register_function!(
            self,
            lazy "where",
            category: FunctionCategory::FilteringProjection,
            description: "Items for which the criteria evaluates to true",
            arity: 1..=1,
            implementation: |cx| {
                let criteria = cx.argument(0).expect("arity checked").clone();
                let mut kept = Vec::new();
                for (index, item) in cx.input.iter().enumerate() {
                    let scope = cx.item_scope(item, index);
                    let focus = scope.this.clone();
                    let result = cx.evaluate_scoped(&criteria, &focus, Some(scope))?;
                    if criteria_is_true(&result)? {
                        kept.push(item.clone());
                    }
                }
                Ok(Collection::with_ordering(kept, cx.input.is_ordered()))
            }
        );

        register_function!(
            self,
            lazy "select",
            category: FunctionCategory::FilteringProjection,
            description: "Flattened projection of an expression over each item",
            arity: 1..=1,
            implementation: |cx| {
                let projection = cx.argument(0).expect("arity checked").clone();
                let mut out = Vec::new();
                // The result keeps meaningful order only when the input and
                // every per-item projection do.
                let mut ordered = cx.input.is_ordered();
                for (index, item) in cx.input.iter().enumerate() {
                    let scope = cx.item_scope(item, index);
                    let focus = scope.this.clone();
                    let projected = cx.evaluate_scoped(&projection, &focus, Some(scope))?;
                    ordered &= projected.is_ordered();
                    out.extend(projected.into_vec());
                }
                Ok(Collection::with_ordering(out, ordered))
            }
        );

        register_function!(
            self,
            lazy "repeat",
            category: FunctionCategory::FilteringProjection,
            description: "Transitive closure of a projection, deduplicated",
            arity: 1..=1,
            implementation: |cx| repeat_impl(cx, true)
        );

        register_function!(
            self,
            lazy "repeatAll",
            category: FunctionCategory::FilteringProjection,
            description: "Transitive closure of a projection, keeping duplicates",
            arity: 1..=1,
            implementation: |cx| repeat_impl(cx, false)
        );
    }
}

/// Shared driver for repeat/repeatAll. With `distinct`, newly produced items
/// already seen are dropped and iteration stops when nothing new appears;
/// without it, iteration stops when a pass produces no items at all. Both
/// are capped to guard against pathological graphs.
fn repeat_impl(cx: &mut LazyFunctionContext<'_>, distinct: bool) -> Result<Collection> {
    let projection = cx.argument(0).expect("arity checked").clone();
    let mut result: Vec<FhirPathValue> = Vec::new();
    let mut frontier: Vec<FhirPathValue> = cx.input.iter().cloned().collect();
    let limit = cx.ctx.iteration_limit;

    while !frontier.is_empty() {
        cx.ctx.cancellation.check()?;
        let mut next = Vec::new();
        for (index, item) in frontier.iter().enumerate() {
            let scope = cx.item_scope(item, index);
            let focus = scope.this.clone();
            let projected = cx.evaluate_scoped(&projection, &focus, Some(scope))?;
            for value in projected.into_vec() {
                if distinct {
                    let seen = result.iter().any(|v| v.equal(&value) == Some(true))
                        || next.iter().any(|v: &FhirPathValue| v.equal(&value) == Some(true));
                    if seen {
                        continue;
                    }
                }
                next.push(value);
            }
        }
        result.extend(next.iter().cloned());
        if result.len() > limit {
            return Err(FhirPathError::domain_error(format!(
                "{}() exceeded the iteration limit of {limit} items",
                cx.name
            )));
        }
        frontier = next;
    }
    Ok(Collection::with_ordering(result, cx.input.is_ordered()))
}
