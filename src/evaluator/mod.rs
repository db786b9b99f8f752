//! Expression evaluation: context, walking rules, operator semantics

pub mod context;
pub mod engine;
pub mod operators;
pub mod walker;

pub use context::{EvaluationContext, FunctionScope};
pub use engine::{
    evaluate, evaluate_collection, singleton_boolean, singleton_decimal, singleton_integer,
    singleton_long, singleton_string,
};
pub use walker::Evaluator;
