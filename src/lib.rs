//! A FHIRPath 2.0 expression evaluator (with selected 3.0 extensions).
//!
//! Parse once, evaluate many times:
//!
//! ```
//! use fhirpath_engine::{EvaluationContext, Expression, evaluate};
//! use fhirpath_engine::model::JsonElement;
//! use fhirpath_engine::core::TypeRegistry;
//!
//! let expr = Expression::parse("Patient.name.where(family = 'Duck').given").unwrap();
//! let ctx = EvaluationContext::new();
//! let patient = JsonElement::resource_value(
//!     serde_json::json!({
//!         "resourceType": "Patient",
//!         "name": [
//!             {"given": ["Donald"], "family": "Duck"},
//!             {"given": ["Peter"], "family": "Griffin"}
//!         ]
//!     }),
//!     TypeRegistry::standard(),
//! );
//! let result = evaluate(&ctx, patient, &expr).unwrap();
//! assert_eq!(result.len(), 1);
//! ```
//!
//! The expression tree is immutable and shareable across threads; each
//! evaluation clones the context, freezes its `now()` instant and leaves no
//! state behind. Three-valued logic runs everywhere: operations FHIRPath
//! defines as unknown return the empty collection rather than erroring.

pub mod ast;
pub mod core;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod registry;

pub use crate::core::{
    CancellationToken, Collection, FhirPathError, FhirPathValue, Result, TypeRegistry,
};
pub use crate::evaluator::{
    EvaluationContext, evaluate, evaluate_collection, singleton_boolean, singleton_decimal,
    singleton_integer, singleton_long, singleton_string,
};
pub use crate::parser::{Expression, parse};
pub use crate::registry::FunctionRegistry;
