//! Expression parsing
//!
//! `parse()` turns an expression string into an immutable [`Expression`]
//! that can be evaluated any number of times, from any thread. Parse errors
//! carry the 1-based line and column of the offending token.

pub mod pratt;
pub mod tokenizer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::ExpressionNode;
use crate::core::error::{FhirPathError, Result};

/// A parsed expression: the original text plus its syntax tree.
///
/// Parsing never panics on user input; malformed expressions produce a
/// [`FhirPathError::ParseError`]. The tree is a value — evaluation does not
/// mutate it and holders can share it freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    text: String,
    root: ExpressionNode,
}

impl Expression {
    /// Parse `text` into an expression
    pub fn parse(text: &str) -> Result<Self> {
        let root = pratt::parse(text)?;
        Ok(Self {
            text: text.to_string(),
            root,
        })
    }

    /// The original expression text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The root of the syntax tree
    pub fn root(&self) -> &ExpressionNode {
        &self.root
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Expression {
    type Err = FhirPathError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse an expression string
pub fn parse(text: &str) -> Result<Expression> {
    Expression::parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_preserves_source_text() {
        let text = "Patient.name.where(  family='Duck' ).given";
        let expr = Expression::parse(text).unwrap();
        assert_eq!(expr.to_string(), text);
    }

    #[test]
    fn from_str_round_trip() {
        let expr: Expression = "1 + 2".parse().unwrap();
        let reparsed = Expression::parse(&expr.to_string()).unwrap();
        assert_eq!(expr.root(), reparsed.root());
    }
}
