//! FHIR-specific helpers: extension, hasValue, getValue
//!
//! These consume only the `Element` capability surface: extensions are the
//! `extension` children with a matching `url`, and primitive values come
//! from the node's system payload.

use crate::core::collection::Collection;
use crate::core::error::Result;
use crate::core::value::FhirPathValue;
use crate::register_function;

use super::{FunctionCategory, FunctionRegistry};

impl FunctionRegistry {
    pub(crate) fn register_fhir_functions(&mut self) {
        register_function!(
            self,
            eager "extension",
            category: FunctionCategory::Fhir,
            description: "Extensions of the input with the given url",
            arity: 1..=1,
            implementation: |cx| {
                let Some(url) = cx.string_arg(0)? else {
                    return Ok(Collection::empty());
                };
                let mut out = Vec::new();
                for item in cx.input.iter() {
                    for extension in item.children(Some("extension")) {
                        let matches = extension
                            .children(Some("url"))
                            .first()
                            .and_then(|u| u.to_string_value(false))
                            .is_some_and(|u| u == url);
                        if matches {
                            out.push(extension);
                        }
                    }
                }
                Ok(Collection::with_ordering(out, cx.input.is_ordered()))
            }
        );

        register_function!(
            self,
            eager "hasValue",
            category: FunctionCategory::Fhir,
            description: "True when the input is a single primitive carrying a value",
            arity: 0..=0,
            implementation: |cx| {
                let result = match cx.input.as_singleton() {
                    Some(FhirPathValue::Node(node)) => node.has_value(),
                    Some(_) => true,
                    None => false,
                };
                Ok(Collection::single(FhirPathValue::Boolean(result)))
            }
        );

        register_function!(
            self,
            eager "getValue",
            category: FunctionCategory::Fhir,
            description: "The system value of a single primitive, else empty",
            arity: 0..=0,
            implementation: |cx| {
                Ok(match cx.input.as_singleton() {
                    Some(FhirPathValue::Node(node)) => match node.system_value() {
                        Some(value) => Collection::single(value),
                        None => Collection::empty(),
                    },
                    Some(value) => Collection::single(value.clone()),
                    None => Collection::empty(),
                })
            }
        );
    }
}
