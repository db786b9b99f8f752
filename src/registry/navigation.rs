//! Tree navigation: children, descendants

use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::value::FhirPathValue;
use crate::register_function;

use super::{FunctionCategory, FunctionRegistry};

impl FunctionRegistry {
    pub(crate) fn register_navigation_functions(&mut self) {
        register_function!(
            self,
            eager "children",
            category: FunctionCategory::TreeNavigation,
            description: "Immediate children of every item; the order is not meaningful",
            arity: 0..=0,
            implementation: |cx| {
                let mut out = Vec::new();
                for item in cx.input.iter() {
                    out.extend(item.children(None));
                }
                Ok(Collection::with_ordering(out, false))
            }
        );

        register_function!(
            self,
            eager "descendants",
            category: FunctionCategory::TreeNavigation,
            description: "Transitive closure of children(); does not include the input itself",
            arity: 0..=0,
            implementation: |cx| {
                let limit = cx.ctx.iteration_limit;
                let mut out: Vec<FhirPathValue> = Vec::new();
                let mut frontier: Vec<FhirPathValue> =
                    cx.input.iter().flat_map(|item| item.children(None)).collect();
                while !frontier.is_empty() {
                    cx.ctx.cancellation.check()?;
                    let mut next = Vec::new();
                    for item in frontier {
                        // Nodes already visited are skipped so cyclic host
                        // data cannot loop forever.
                        if out.iter().any(|seen| seen.equal(&item) == Some(true)) {
                            continue;
                        }
                        next.extend(item.children(None));
                        out.push(item);
                    }
                    if out.len() > limit {
                        return Err(FhirPathError::domain_error(format!(
                            "descendants() exceeded the iteration limit of {limit} items"
                        )));
                    }
                    frontier = next;
                }
                Ok(Collection::with_ordering(out, false))
            }
        );
    }
}
