//! Utility functions: trace, aggregate, iif, defineVariable

use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::evaluator::context::FunctionScope;
use crate::evaluator::operators::boolean_operand;
use crate::register_function;

use super::{FunctionCategory, FunctionRegistry};

impl FunctionRegistry {
    pub(crate) fn register_utility_functions(&mut self) {
        register_function!(
            self,
            lazy "trace",
            category: FunctionCategory::Utility,
            description: "Log the input (or a projection of it) and pass the input through",
            arity: 1..=2,
            implementation: |cx| {
                let name = cx.evaluate_arg(0, cx.input, None)?;
                let name = name
                    .as_singleton()
                    .and_then(|v| v.to_string_value(false))
                    .ok_or_else(|| {
                        FhirPathError::type_error("trace() requires a string name")
                    })?;
                let traced = match cx.argument(1) {
                    Some(projection) => {
                        let mut out = Vec::new();
                        for (index, item) in cx.input.iter().enumerate() {
                            let scope = cx.item_scope(item, index);
                            let focus = scope.this.clone();
                            out.extend(
                                cx.evaluate_scoped(projection, &focus, Some(scope))?.into_vec(),
                            );
                        }
                        Collection::from_values(out)
                    }
                    None => cx.input.clone(),
                };
                cx.ctx.tracer.trace(&name, &traced);
                Ok(cx.input.clone())
            }
        );

        register_function!(
            self,
            lazy "aggregate",
            category: FunctionCategory::Utility,
            description: "Fold an expression over the input with $total and $this bound",
            arity: 1..=2,
            implementation: |cx| {
                let aggregator = cx.argument(0).expect("arity checked").clone();
                let mut total = match cx.argument(1) {
                    Some(_) => cx.evaluate_arg(1, cx.input, None)?,
                    None => Collection::empty(),
                };
                for (index, item) in cx.input.iter().enumerate() {
                    cx.ctx.cancellation.check()?;
                    let scope = FunctionScope {
                        this: Collection::single(item.clone()),
                        index: i32::try_from(index).ok(),
                        total: Some(total),
                    };
                    let focus = scope.this.clone();
                    total = cx.evaluate_scoped(&aggregator, &focus, Some(scope))?;
                }
                Ok(total)
            }
        );

        register_function!(
            self,
            lazy "iif",
            category: FunctionCategory::Utility,
            description: "Conditional: only the selected branch is evaluated",
            arity: 2..=3,
            implementation: |cx| {
                let criterion = cx.evaluate_arg(0, cx.input, None)?;
                // The singleton rule applies: any lone non-boolean reads true.
                let truthy = boolean_operand(&criterion)?;
                if truthy == Some(true) {
                    cx.evaluate_arg(1, cx.input, None)
                } else {
                    match cx.argument(2) {
                        Some(_) => cx.evaluate_arg(2, cx.input, None),
                        None => Ok(Collection::empty()),
                    }
                }
            }
        );

        register_function!(
            self,
            lazy "defineVariable",
            category: FunctionCategory::Utility,
            description: "Bind %name for the rest of the enclosing chain",
            arity: 1..=2,
            implementation: |cx| {
                let name = cx.evaluate_arg(0, cx.input, None)?;
                let name = name
                    .as_singleton()
                    .and_then(|v| v.to_string_value(false))
                    .ok_or_else(|| {
                        FhirPathError::type_error("defineVariable() requires a string name")
                    })?;
                let value = match cx.argument(1) {
                    Some(_) => cx.evaluate_arg(1, cx.input, None)?,
                    None => cx.input.clone(),
                };
                cx.ctx.define_variable(&name, value)?;
                Ok(cx.input.clone())
            }
        );
    }
}
