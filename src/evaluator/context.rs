//! Evaluation context
//!
//! The context is immutable-by-cloning: every scoped construct (union
//! branches, function parameters, iterator bodies) works on a clone, so
//! variable bindings cannot leak sideways. Within one chain the context is
//! threaded mutably so `defineVariable()` is visible downstream.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use rustc_hash::FxHashMap;

use crate::core::cancellation::CancellationToken;
use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::trace::{LogTracer, Tracer};
use crate::core::types::{TypeInfo, TypeRegistry};
use crate::core::value::FhirPathValue;
use crate::registry::FunctionRegistry;

/// Default decimal significant-digit precision (spec minimum is 18
/// fractional digits; the backend caps the effective precision at 28).
pub const DEFAULT_DECIMAL_PRECISION: u32 = 34;

/// Default ceiling on `repeat`/`repeatAll`/`descendants` expansion
pub const DEFAULT_ITERATION_LIMIT: usize = 100_000;

/// Variable names seeded by the engine that user code may not rebind
pub const RESERVED_VARIABLES: &[&str] =
    &["context", "resource", "rootResource", "ucum", "loinc", "sct"];

/// Implicit bindings available inside iterator-style functions
#[derive(Debug, Clone)]
pub struct FunctionScope {
    /// The current item (`$this`)
    pub this: Collection,
    /// The current iteration index (`$index`), when the function iterates
    pub index: Option<i32>,
    /// The running aggregate total (`$total`), inside `aggregate()`
    pub total: Option<Collection>,
}

/// Everything an evaluation needs besides the expression and the root.
///
/// Build one with the `with_*` options, then pass it to
/// [`evaluate`](crate::evaluator::evaluate). A context can be reused across
/// evaluations; each run re-freezes the `now()` instant.
#[derive(Clone)]
pub struct EvaluationContext {
    pub(crate) variables: FxHashMap<String, Collection>,
    pub(crate) function_scope: Option<FunctionScope>,
    /// Known types, extensible per release
    pub types: Arc<TypeRegistry>,
    /// Namespace tried before `System` for unqualified type names
    pub default_namespace: String,
    /// Sink for `trace()`
    pub tracer: Arc<dyn Tracer>,
    /// Significant digits for decimal arithmetic
    pub decimal_precision: u32,
    /// Frozen evaluation instant shared by `now()`/`today()`/`timeOfDay()`
    pub now: DateTime<FixedOffset>,
    /// Cancellation handle checked between node evaluations
    pub cancellation: CancellationToken,
    /// Function registry (built-ins plus host extensions)
    pub functions: Arc<FunctionRegistry>,
    /// Ceiling on iterative expansion (`repeat`, `descendants`)
    pub iteration_limit: usize,
}

impl EvaluationContext {
    /// A context with the standard registries and defaults
    pub fn new() -> Self {
        let mut variables = FxHashMap::default();
        variables.insert(
            "ucum".to_string(),
            Collection::single(FhirPathValue::String("http://unitsofmeasure.org".into())),
        );
        variables.insert(
            "loinc".to_string(),
            Collection::single(FhirPathValue::String("http://loinc.org".into())),
        );
        variables.insert(
            "sct".to_string(),
            Collection::single(FhirPathValue::String("http://snomed.info/sct".into())),
        );
        Self {
            variables,
            function_scope: None,
            types: TypeRegistry::standard(),
            default_namespace: "FHIR".to_string(),
            tracer: Arc::new(LogTracer),
            decimal_precision: DEFAULT_DECIMAL_PRECISION,
            now: Utc::now().fixed_offset(),
            cancellation: CancellationToken::new(),
            functions: FunctionRegistry::standard(),
            iteration_limit: DEFAULT_ITERATION_LIMIT,
        }
    }

    /// Set the decimal significant-digit precision
    pub fn with_decimal_precision(mut self, precision: u32) -> Self {
        self.decimal_precision = precision;
        self
    }

    /// Set the default namespace for unqualified type names
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    /// Extend the type registry with release-specific types
    pub fn with_types(mut self, types: impl IntoIterator<Item = TypeInfo>) -> Self {
        let mut registry = (*self.types).clone();
        for info in types {
            registry.register(info);
        }
        self.types = Arc::new(registry);
        self
    }

    /// Redirect `trace()` output
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Extend the function registry; a name colliding with a built-in
    /// replaces it.
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        let mut merged = (*self.functions).clone();
        merged.merge(functions);
        self.functions = Arc::new(merged);
        self
    }

    /// Bind an environment variable (`%name`). Reserved names are refused.
    pub fn with_env(mut self, name: impl Into<String>, value: Collection) -> Result<Self> {
        let name = name.into();
        if RESERVED_VARIABLES.contains(&name.as_str()) {
            return Err(FhirPathError::domain_error(format!(
                "variable '%{name}' is reserved"
            )));
        }
        self.variables.insert(name, value);
        Ok(self)
    }

    /// Install a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Cap iterative expansion (`repeat`, `repeatAll`, `descendants`)
    pub fn with_iteration_limit(mut self, limit: usize) -> Self {
        self.iteration_limit = limit;
        self
    }

    /// Look up `%name`
    pub fn variable(&self, name: &str) -> Option<&Collection> {
        self.variables.get(name)
    }

    /// Bind a variable from `defineVariable()`. Errors when the name is
    /// reserved or already bound in the current frame.
    pub fn define_variable(&mut self, name: &str, value: Collection) -> Result<()> {
        if RESERVED_VARIABLES.contains(&name) {
            return Err(FhirPathError::domain_error(format!(
                "variable '%{name}' is reserved"
            )));
        }
        if self.variables.contains_key(name) {
            return Err(FhirPathError::domain_error(format!(
                "variable '%{name}' is already defined"
            )));
        }
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    /// The current function scope, if inside an iterator function
    pub fn function_scope(&self) -> Option<&FunctionScope> {
        self.function_scope.as_ref()
    }

    /// Clone with a different function scope (used by iterator functions)
    pub fn scoped(&self, scope: FunctionScope) -> Self {
        let mut child = self.clone();
        child.function_scope = Some(scope);
        child
    }

    /// Freeze the evaluation instant and seed the root-derived system
    /// variables; called once per `evaluate()`.
    pub(crate) fn begin_evaluation(&self, root: &Collection) -> Self {
        let mut ready = self.clone();
        ready.now = Utc::now().fixed_offset();
        for name in ["context", "resource", "rootResource"] {
            ready.variables.insert(name.to_string(), root.clone());
        }
        ready
    }

    /// The frozen instant rendered the way `now()` returns it
    pub fn now_string(&self) -> String {
        self.now.to_rfc3339_opts(SecondsFormat::Millis, false)
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_variables_are_refused() {
        let ctx = EvaluationContext::new();
        assert!(ctx.with_env("context", Collection::empty()).is_err());

        let mut ctx = EvaluationContext::new();
        assert!(ctx.define_variable("ucum", Collection::empty()).is_err());
    }

    #[test]
    fn redefinition_is_refused() {
        let mut ctx = EvaluationContext::new();
        ctx.define_variable("x", Collection::empty()).unwrap();
        assert!(ctx.define_variable("x", Collection::empty()).is_err());
    }

    #[test]
    fn system_variables_are_seeded() {
        let ctx = EvaluationContext::new();
        let ucum = ctx.variable("ucum").unwrap();
        assert_eq!(
            ucum.first().unwrap().to_string_value(false).as_deref(),
            Some("http://unitsofmeasure.org")
        );
    }

    #[test]
    fn scoped_clone_does_not_leak_bindings() {
        let ctx = EvaluationContext::new();
        let mut child = ctx.clone();
        child.define_variable("x", Collection::empty()).unwrap();
        assert!(ctx.variable("x").is_none());
    }
}
