//! Subsetting: single, first, last, tail, skip, take, intersect, exclude,
//! distinct, isDistinct, subsetOf, supersetOf

use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::value::FhirPathValue;
use crate::register_function;

use super::{FunctionCategory, FunctionContext, FunctionRegistry};

/// first/last/tail/skip/take are meaningless without a meaningful order.
fn require_ordered(cx: &FunctionContext<'_>) -> Result<()> {
    if cx.input.len() > 1 && !cx.input.is_ordered() {
        return Err(FhirPathError::domain_error(format!(
            "{}() requires an ordered collection",
            cx.name
        )));
    }
    Ok(())
}

impl FunctionRegistry {
    pub(crate) fn register_subsetting_functions(&mut self) {
        register_function!(
            self,
            eager "single",
            category: FunctionCategory::Subsetting,
            description: "The lone item of a singleton collection; errors on more",
            arity: 0..=0,
            implementation: |cx| {
                match cx.input.len() {
                    0 => Ok(Collection::empty()),
                    1 => Ok(cx.input.clone()),
                    n => Err(FhirPathError::singleton_error(format!(
                        "single() requires at most one item, got {n}"
                    ))),
                }
            }
        );

        register_function!(
            self,
            eager "first",
            category: FunctionCategory::Subsetting,
            description: "The first item of an ordered collection",
            arity: 0..=0,
            implementation: |cx| {
                require_ordered(cx)?;
                Ok(match cx.input.first() {
                    Some(value) => Collection::single(value.clone()),
                    None => Collection::empty(),
                })
            }
        );

        register_function!(
            self,
            eager "last",
            category: FunctionCategory::Subsetting,
            description: "The last item of an ordered collection",
            arity: 0..=0,
            implementation: |cx| {
                require_ordered(cx)?;
                Ok(match cx.input.last() {
                    Some(value) => Collection::single(value.clone()),
                    None => Collection::empty(),
                })
            }
        );

        register_function!(
            self,
            eager "tail",
            category: FunctionCategory::Subsetting,
            description: "Everything but the first item",
            arity: 0..=0,
            implementation: |cx| {
                require_ordered(cx)?;
                Ok(Collection::from_values(
                    cx.input.iter().skip(1).cloned().collect(),
                ))
            }
        );

        register_function!(
            self,
            eager "skip",
            category: FunctionCategory::Subsetting,
            description: "Everything after the first num items",
            arity: 1..=1,
            implementation: |cx| {
                require_ordered(cx)?;
                let Some(count) = cx.integer_arg(0)? else {
                    return Ok(Collection::empty());
                };
                let count = count.max(0) as usize;
                Ok(Collection::from_values(
                    cx.input.iter().skip(count).cloned().collect(),
                ))
            }
        );

        register_function!(
            self,
            eager "take",
            category: FunctionCategory::Subsetting,
            description: "The first num items; negative num yields empty",
            arity: 1..=1,
            implementation: |cx| {
                require_ordered(cx)?;
                let Some(count) = cx.integer_arg(0)? else {
                    return Ok(Collection::empty());
                };
                if count <= 0 {
                    return Ok(Collection::empty());
                }
                Ok(Collection::from_values(
                    cx.input.iter().take(count as usize).cloned().collect(),
                ))
            }
        );

        register_function!(
            self,
            eager "intersect",
            category: FunctionCategory::Subsetting,
            description: "Deduplicated items present in both collections",
            arity: 1..=1,
            implementation: |cx| {
                let other = cx.arg(0).cloned().unwrap_or_default();
                let mut out: Vec<FhirPathValue> = Vec::new();
                for item in cx.input.iter() {
                    if other.contains_value(item)
                        && !out.iter().any(|v| v.equal(item) == Some(true))
                    {
                        out.push(item.clone());
                    }
                }
                Ok(Collection::with_ordering(out, false))
            }
        );

        register_function!(
            self,
            eager "exclude",
            category: FunctionCategory::Subsetting,
            description: "Items not present in the other collection, order and duplicates kept",
            arity: 1..=1,
            implementation: |cx| {
                let other = cx.arg(0).cloned().unwrap_or_default();
                let out: Vec<FhirPathValue> = cx
                    .input
                    .iter()
                    .filter(|item| !other.contains_value(item))
                    .cloned()
                    .collect();
                Ok(Collection::with_ordering(out, cx.input.is_ordered()))
            }
        );

        register_function!(
            self,
            eager "distinct",
            category: FunctionCategory::Subsetting,
            description: "Deduplicated items; the result order is not meaningful",
            arity: 0..=0,
            implementation: |cx| {
                let mut out: Vec<FhirPathValue> = Vec::new();
                for item in cx.input.iter() {
                    if !out.iter().any(|v| v.equal(item) == Some(true)) {
                        out.push(item.clone());
                    }
                }
                Ok(Collection::with_ordering(out, false))
            }
        );

        register_function!(
            self,
            eager "isDistinct",
            category: FunctionCategory::Subsetting,
            description: "True when the input contains no duplicate items",
            arity: 0..=0,
            implementation: |cx| {
                let mut distinct = true;
                'outer: for (i, a) in cx.input.iter().enumerate() {
                    for b in cx.input.iter().skip(i + 1) {
                        if a.equal(b) == Some(true) {
                            distinct = false;
                            break 'outer;
                        }
                    }
                }
                Ok(Collection::single(FhirPathValue::Boolean(distinct)))
            }
        );

        register_function!(
            self,
            eager "subsetOf",
            category: FunctionCategory::Subsetting,
            description: "True when every input item appears in the argument",
            arity: 1..=1,
            implementation: |cx| {
                let other = cx.arg(0).cloned().unwrap_or_default();
                let result = cx.input.iter().all(|item| other.contains_value(item));
                Ok(Collection::single(FhirPathValue::Boolean(result)))
            }
        );

        register_function!(
            self,
            eager "supersetOf",
            category: FunctionCategory::Subsetting,
            description: "True when every argument item appears in the input",
            arity: 1..=1,
            implementation: |cx| {
                let other = cx.arg(0).cloned().unwrap_or_default();
                let result = other.iter().all(|item| cx.input.contains_value(item));
                Ok(Collection::single(FhirPathValue::Boolean(result)))
            }
        );
    }
}
