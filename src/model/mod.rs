//! Reference data model implementations of the `Element` contract

pub mod json;

pub use json::JsonElement;
