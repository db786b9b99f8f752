//! Existence functions: empty, exists, all, allTrue/anyTrue/allFalse/anyFalse,
//! count, not

use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::value::FhirPathValue;
use crate::evaluator::operators::boolean_operand;
use crate::register_function;

use super::{FunctionCategory, FunctionContext, FunctionRegistry};

/// True when the criteria result reads as `true` under the singleton rule
pub(crate) fn criteria_is_true(result: &Collection) -> Result<bool> {
    Ok(boolean_operand(result)? == Some(true))
}

impl FunctionRegistry {
    pub(crate) fn register_existence_functions(&mut self) {
        register_function!(
            self,
            eager "empty",
            category: FunctionCategory::Existence,
            description: "True when the input collection has no items",
            arity: 0..=0,
            implementation: |cx| {
                Ok(Collection::single(FhirPathValue::Boolean(cx.input.is_empty())))
            }
        );

        register_function!(
            self,
            lazy "exists",
            category: FunctionCategory::Existence,
            description: "True when the input has any item (matching the criteria, if given)",
            arity: 0..=1,
            implementation: |cx| {
                let Some(criteria) = cx.argument(0).cloned() else {
                    return Ok(Collection::single(FhirPathValue::Boolean(!cx.input.is_empty())));
                };
                for (index, item) in cx.input.iter().enumerate() {
                    let scope = cx.item_scope(item, index);
                    let result = cx.evaluate_scoped(&criteria, &scope.this.clone(), Some(scope))?;
                    if criteria_is_true(&result)? {
                        return Ok(Collection::single(FhirPathValue::Boolean(true)));
                    }
                }
                Ok(Collection::single(FhirPathValue::Boolean(false)))
            }
        );

        register_function!(
            self,
            lazy "all",
            category: FunctionCategory::Existence,
            description: "True when the criteria holds for every item; true on empty input",
            arity: 1..=1,
            implementation: |cx| {
                let criteria = cx.argument(0).expect("arity checked").clone();
                for (index, item) in cx.input.iter().enumerate() {
                    let scope = cx.item_scope(item, index);
                    let result = cx.evaluate_scoped(&criteria, &scope.this.clone(), Some(scope))?;
                    if !criteria_is_true(&result)? {
                        return Ok(Collection::single(FhirPathValue::Boolean(false)));
                    }
                }
                Ok(Collection::single(FhirPathValue::Boolean(true)))
            }
        );

        self.register_boolean_fold("allTrue", |b| b, true);
        self.register_boolean_fold("anyTrue", |b| b, false);
        self.register_boolean_fold("allFalse", |b| !b, true);
        self.register_boolean_fold("anyFalse", |b| !b, false);

        register_function!(
            self,
            eager "count",
            category: FunctionCategory::Existence,
            description: "Number of items in the input collection",
            arity: 0..=0,
            implementation: |cx| {
                let count = i32::try_from(cx.input.len()).unwrap_or(i32::MAX);
                Ok(Collection::single(FhirPathValue::Integer(count)))
            }
        );

        register_function!(
            self,
            eager "not",
            category: FunctionCategory::Existence,
            description: "Boolean negation; empty on non-boolean singletons",
            arity: 0..=0,
            implementation: not_function
        );
    }

    /// allTrue/anyTrue/allFalse/anyFalse share one fold shape: `test` maps
    /// each boolean item, `all` picks between for-all and there-exists.
    fn register_boolean_fold(
        &mut self,
        name: &'static str,
        test: fn(bool) -> bool,
        all: bool,
    ) {
        let metadata = super::FunctionMetadata::new(
            name,
            FunctionCategory::Existence,
            "Boolean fold over a collection of booleans",
            0,
            Some(0),
        );
        self.register_eager(metadata, move |cx| {
            for item in cx.input.iter() {
                let value = item.to_boolean(false).ok_or_else(|| {
                    FhirPathError::type_error(format!(
                        "{}() requires boolean items, got {}",
                        cx.name,
                        item.type_name()
                    ))
                })?;
                if all != test(value) {
                    return Ok(Collection::single(FhirPathValue::Boolean(!all)));
                }
            }
            Ok(Collection::single(FhirPathValue::Boolean(all)))
        });
    }
}

fn not_function(cx: &mut FunctionContext<'_>) -> Result<Collection> {
    if cx.input.is_empty() {
        return Ok(Collection::empty());
    }
    if cx.input.len() > 1 {
        return Err(FhirPathError::singleton_error(
            "not() requires a singleton input",
        ));
    }
    // A singleton that does not convert to Boolean yields empty rather than
    // an error or a coerced true.
    Ok(match cx.input.first().and_then(|v| v.to_boolean(false)) {
        Some(value) => Collection::single(FhirPathValue::Boolean(!value)),
        None => Collection::empty(),
    })
}
