//! Function registry: name → implementation for the built-in library
//!
//! Functions come in two shapes. *Eager* functions receive their arguments
//! already evaluated (each in a fresh variable frame, against the function's
//! input). *Lazy* functions receive the raw argument expressions plus the
//! evaluator callback, so iterator-style functions can bind `$this`/`$index`
//! per element and conditional functions can skip branches entirely.

pub mod combining;
pub mod conversion;
pub mod datetime;
pub mod existence;
pub mod fhir;
pub mod filtering;
pub mod math;
pub mod navigation;
pub mod sorting;
pub mod strings;
pub mod subsetting;
pub mod types;
pub mod utility;

use std::sync::Arc;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::ast::ExpressionNode;
use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::value::FhirPathValue;
use crate::evaluator::context::{EvaluationContext, FunctionScope};
use crate::evaluator::walker::Evaluator;

/// Function categories, for introspection and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCategory {
    /// empty, exists, all, allTrue, …
    Existence,
    /// where, select, repeat, ofType
    FilteringProjection,
    /// first, last, tail, skip, take, …
    Subsetting,
    /// union, combine, coalesce
    Combining,
    /// toString, toInteger, convertsToX, …
    Conversion,
    /// indexOf, substring, matches, …
    StringManipulation,
    /// abs, ceiling, sqrt, …
    Math,
    /// children, descendants
    TreeNavigation,
    /// now, yearOf, lowBoundary, duration, …
    DateTime,
    /// type, is, as, ofType
    Types,
    /// trace, iif, defineVariable, aggregate, …
    Utility,
    /// extension, hasValue, getValue
    Fhir,
}

/// Metadata describing one registered function
#[derive(Debug, Clone)]
pub struct FunctionMetadata {
    /// Function name as written in expressions
    pub name: String,
    /// Category for grouping
    pub category: FunctionCategory,
    /// One-line description
    pub description: String,
    /// Minimum number of arguments
    pub min_params: usize,
    /// Maximum number of arguments; `None` means unbounded
    pub max_params: Option<usize>,
}

impl FunctionMetadata {
    /// Create metadata
    pub fn new(
        name: &str,
        category: FunctionCategory,
        description: &str,
        min_params: usize,
        max_params: Option<usize>,
    ) -> Self {
        Self {
            name: name.to_string(),
            category,
            description: description.to_string(),
            min_params,
            max_params,
        }
    }

    /// Validate an argument count against the declared arity
    pub fn check_arity(&self, actual: usize) -> Result<()> {
        let ok = actual >= self.min_params && self.max_params.is_none_or(|max| actual <= max);
        if ok {
            return Ok(());
        }
        let expected = match (self.min_params, self.max_params) {
            (min, Some(max)) if min == max => format!("{min}"),
            (min, Some(max)) => format!("{min} to {max}"),
            (min, None) => format!("at least {min}"),
        };
        Err(FhirPathError::arity_error(&self.name, expected, actual))
    }
}

/// Invocation context for eager functions: arguments are already evaluated.
pub struct FunctionContext<'a> {
    /// The invoked function's name
    pub name: &'a str,
    /// The input collection the function operates on
    pub input: &'a Collection,
    /// Evaluated argument collections
    pub arguments: &'a [Collection],
    /// The evaluation context
    pub ctx: &'a mut EvaluationContext,
    /// The tree walker, for functions that re-enter evaluation
    pub evaluator: &'a Evaluator<'a>,
}

impl FunctionContext<'_> {
    /// Argument collection at `index`, when supplied
    pub fn arg(&self, index: usize) -> Option<&Collection> {
        self.arguments.get(index)
    }

    /// Singleton argument value: `None` when absent or empty, error when
    /// the argument has more than one item.
    pub fn singleton_arg(&self, index: usize) -> Result<Option<&FhirPathValue>> {
        match self.arg(index) {
            None => Ok(None),
            Some(c) if c.is_empty() => Ok(None),
            Some(c) => match c.as_singleton() {
                Some(value) => Ok(Some(value)),
                None => Err(FhirPathError::singleton_error(format!(
                    "argument {} of {}() must be a single value",
                    index + 1,
                    self.name
                ))),
            },
        }
    }

    /// Singleton string argument (implicit conversion)
    pub fn string_arg(&self, index: usize) -> Result<Option<String>> {
        match self.singleton_arg(index)? {
            None => Ok(None),
            Some(value) => value.to_string_value(false).map(Some).ok_or_else(|| {
                FhirPathError::type_error(format!(
                    "argument {} of {}() must be a string, got {}",
                    index + 1,
                    self.name,
                    value.type_name()
                ))
            }),
        }
    }

    /// Singleton integer argument (implicit conversion)
    pub fn integer_arg(&self, index: usize) -> Result<Option<i32>> {
        match self.singleton_arg(index)? {
            None => Ok(None),
            Some(value) => value.to_integer(false).map(Some).ok_or_else(|| {
                FhirPathError::type_error(format!(
                    "argument {} of {}() must be an integer, got {}",
                    index + 1,
                    self.name,
                    value.type_name()
                ))
            }),
        }
    }

    /// The input as a singleton: `None` when empty, error when many
    pub fn input_singleton(&self) -> Result<Option<&FhirPathValue>> {
        match self.input.len() {
            0 => Ok(None),
            1 => Ok(self.input.first()),
            n => Err(FhirPathError::singleton_error(format!(
                "{}() requires a singleton input, got {n} items",
                self.name
            ))),
        }
    }

    /// The input as a singleton string (implicit conversion); `None` when
    /// empty or not string-like, so string functions propagate empty.
    pub fn input_string(&self) -> Result<Option<String>> {
        Ok(self
            .input_singleton()?
            .and_then(|v| v.to_string_value(false)))
    }
}

/// Invocation context for lazy functions: raw argument expressions plus the
/// evaluator callback.
pub struct LazyFunctionContext<'a> {
    /// The invoked function's name
    pub name: &'a str,
    /// The input collection the function operates on
    pub input: &'a Collection,
    /// Unevaluated argument expressions
    pub arguments: &'a [ExpressionNode],
    /// The evaluation context
    pub ctx: &'a mut EvaluationContext,
    /// The tree walker
    pub evaluator: &'a Evaluator<'a>,
}

impl LazyFunctionContext<'_> {
    /// Argument expression at `index`, when supplied
    pub fn argument(&self, index: usize) -> Option<&ExpressionNode> {
        self.arguments.get(index)
    }

    /// Evaluate an expression against `focus` in a freshly cloned frame.
    /// `scope` replaces the function scope (for `$this`/`$index`/`$total`);
    /// `None` keeps the caller's scope.
    pub fn evaluate_scoped(
        &self,
        node: &ExpressionNode,
        focus: &Collection,
        scope: Option<FunctionScope>,
    ) -> Result<Collection> {
        let mut child = match scope {
            Some(scope) => self.ctx.scoped(scope),
            None => self.ctx.clone(),
        };
        self.evaluator.evaluate(node, focus, &mut child)
    }

    /// Evaluate argument `index` against `focus`; absent arguments are empty
    pub fn evaluate_arg(
        &self,
        index: usize,
        focus: &Collection,
        scope: Option<FunctionScope>,
    ) -> Result<Collection> {
        match self.argument(index) {
            Some(node) => self.evaluate_scoped(node, focus, scope),
            None => Ok(Collection::empty()),
        }
    }

    /// The per-item scope iterator functions bind: `$this` = the item,
    /// `$index` = its position.
    pub fn item_scope(&self, item: &FhirPathValue, index: usize) -> FunctionScope {
        FunctionScope {
            this: Collection::single(item.clone()),
            index: i32::try_from(index).ok(),
            total: None,
        }
    }
}

/// A function implementation
#[derive(Clone)]
pub enum FunctionImpl {
    /// Arguments evaluated before the call
    Eager(EagerFn),
    /// Receives raw argument expressions
    Lazy(LazyFn),
}

/// Eager implementation signature
pub type EagerFn =
    Arc<dyn for<'c, 'a> Fn(&'c mut FunctionContext<'a>) -> Result<Collection> + Send + Sync>;

/// Lazy implementation signature
pub type LazyFn =
    Arc<dyn for<'c, 'a> Fn(&'c mut LazyFunctionContext<'a>) -> Result<Collection> + Send + Sync>;

/// A registered function
#[derive(Clone)]
pub struct FunctionEntry {
    /// The function's metadata
    pub metadata: FunctionMetadata,
    /// Its implementation
    pub implementation: FunctionImpl,
}

/// Registry of functions by name
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, FunctionEntry>,
}

impl FunctionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every built-in function, built once per process
    pub fn standard() -> Arc<Self> {
        static STANDARD: Lazy<Arc<FunctionRegistry>> = Lazy::new(|| {
            let mut registry = FunctionRegistry::new();
            registry.register_existence_functions();
            registry.register_filtering_functions();
            registry.register_subsetting_functions();
            registry.register_combining_functions();
            registry.register_conversion_functions();
            registry.register_string_functions();
            registry.register_math_functions();
            registry.register_navigation_functions();
            registry.register_datetime_functions();
            registry.register_type_functions();
            registry.register_utility_functions();
            registry.register_fhir_functions();
            Arc::new(registry)
        });
        STANDARD.clone()
    }

    /// Register an eager function; a colliding name replaces the previous
    /// registration.
    pub fn register_eager<F>(&mut self, metadata: FunctionMetadata, function: F)
    where
        F: for<'c, 'a> Fn(&'c mut FunctionContext<'a>) -> Result<Collection>
            + Send
            + Sync
            + 'static,
    {
        let name = metadata.name.clone();
        self.functions.insert(
            name,
            FunctionEntry {
                metadata,
                implementation: FunctionImpl::Eager(Arc::new(function)),
            },
        );
    }

    /// Register a lazy function
    pub fn register_lazy<F>(&mut self, metadata: FunctionMetadata, function: F)
    where
        F: for<'c, 'a> Fn(&'c mut LazyFunctionContext<'a>) -> Result<Collection>
            + Send
            + Sync
            + 'static,
    {
        let name = metadata.name.clone();
        self.functions.insert(
            name,
            FunctionEntry {
                metadata,
                implementation: FunctionImpl::Lazy(Arc::new(function)),
            },
        );
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(name)
    }

    /// True when `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// All registered names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Absorb every function from `other`, replacing collisions
    pub fn merge(&mut self, other: FunctionRegistry) {
        self.functions.extend(other.functions);
    }
}

/// Registration shorthand used by the category modules
#[macro_export]
macro_rules! register_function {
    (
        $registry:expr,
        eager $name:literal,
        category: $category:expr,
        description: $desc:literal,
        arity: $min:literal ..= $max:literal,
        implementation: $impl:expr
    ) => {
        $registry.register_eager(
            $crate::registry::FunctionMetadata::new($name, $category, $desc, $min, Some($max)),
            $impl,
        )
    };
    (
        $registry:expr,
        lazy $name:literal,
        category: $category:expr,
        description: $desc:literal,
        arity: $min:literal ..= $max:literal,
        implementation: $impl:expr
    ) => {
        $registry.register_lazy(
            $crate::registry::FunctionMetadata::new($name, $category, $desc, $min, Some($max)),
            $impl,
        )
    };
    (
        $registry:expr,
        lazy $name:literal,
        category: $category:expr,
        description: $desc:literal,
        arity: $min:literal ..,
        implementation: $impl:expr
    ) => {
        $registry.register_lazy(
            $crate::registry::FunctionMetadata::new($name, $category, $desc, $min, None),
            $impl,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_messages() {
        let meta = FunctionMetadata::new("substring", FunctionCategory::StringManipulation, "", 1, Some(2));
        assert!(meta.check_arity(1).is_ok());
        assert!(meta.check_arity(2).is_ok());
        let err = meta.check_arity(3).unwrap_err();
        assert!(err.to_string().contains("1 to 2"));
    }

    #[test]
    fn standard_registry_is_complete() {
        let registry = FunctionRegistry::standard();
        for name in [
            "empty", "exists", "all", "allTrue", "anyTrue", "allFalse", "anyFalse", "not",
            "count", "where", "select", "repeat", "repeatAll", "ofType", "single", "first",
            "last", "tail", "skip", "take", "intersect", "exclude", "distinct", "isDistinct",
            "union", "combine", "coalesce", "subsetOf", "supersetOf", "indexOf", "lastIndexOf",
            "substring", "startsWith", "endsWith", "contains", "upper", "lower", "replace",
            "matches", "matchesFull", "replaceMatches", "length", "toChars", "trim", "split",
            "join", "encode", "decode", "escape", "unescape", "abs", "ceiling", "floor",
            "truncate", "round", "exp", "ln", "log", "power", "sqrt", "toBoolean",
            "convertsToBoolean", "toInteger", "convertsToInteger", "toLong", "convertsToLong",
            "toDate", "convertsToDate", "toDateTime", "convertsToDateTime", "toTime",
            "convertsToTime", "toDecimal", "convertsToDecimal", "toQuantity",
            "convertsToQuantity", "toString", "convertsToString", "children", "descendants",
            "trace", "aggregate", "now", "timeOfDay", "today", "iif", "defineVariable",
            "yearOf", "monthOf", "dayOf", "hourOf", "minuteOf", "secondOf", "millisecondOf",
            "timezoneOffsetOf", "dateOf", "timeOf", "comparable", "precision", "lowBoundary",
            "highBoundary", "duration", "difference", "type", "is", "as", "extension",
            "hasValue", "getValue",
        ] {
            assert!(registry.contains(name), "missing built-in '{name}'");
        }
    }

    #[test]
    fn merge_replaces_collisions() {
        let mut base = FunctionRegistry::new();
        base.register_eager(
            FunctionMetadata::new("f", FunctionCategory::Utility, "old", 0, Some(0)),
            |cx| Ok(cx.input.clone()),
        );
        let mut overlay = FunctionRegistry::new();
        overlay.register_eager(
            FunctionMetadata::new("f", FunctionCategory::Utility, "new", 0, Some(0)),
            |cx| Ok(cx.input.clone()),
        );
        base.merge(overlay);
        assert_eq!(base.get("f").unwrap().metadata.description, "new");
    }
}
