//! Combining: union, combine, coalesce

use crate::core::collection::Collection;
use crate::evaluator::walker::union_collections;
use crate::register_function;

use super::{FunctionCategory, FunctionRegistry};

impl FunctionRegistry {
    pub(crate) fn register_combining_functions(&mut self) {
        register_function!(
            self,
            eager "union",
            category: FunctionCategory::Combining,
            description: "Deduplicating merge of the input and the argument",
            arity: 1..=1,
            implementation: |cx| {
                let other = cx.arg(0).cloned().unwrap_or_default();
                Ok(union_collections(cx.input, &other))
            }
        );

        register_function!(
            self,
            eager "combine",
            category: FunctionCategory::Combining,
            description: "Merge without deduplication",
            arity: 1..=1,
            implementation: |cx| {
                let other = cx.arg(0).cloned().unwrap_or_default();
                let mut values = cx.input.iter().cloned().collect::<Vec<_>>();
                values.extend(other.iter().cloned());
                Ok(Collection::with_ordering(
                    values,
                    cx.input.is_ordered() && other.is_ordered(),
                ))
            }
        );

        register_function!(
            self,
            lazy "coalesce",
            category: FunctionCategory::Combining,
            description: "The first non-empty argument, evaluated left to right",
            arity: 0..,
            implementation: |cx| {
                for index in 0..cx.arguments.len() {
                    let value = cx.evaluate_arg(index, cx.input, None)?;
                    if !value.is_empty() {
                        return Ok(value);
                    }
                }
                Ok(Collection::empty())
            }
        );
    }
}
