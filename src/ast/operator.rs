//! Binary and unary operators with their precedence table

use std::fmt;

use serde::{Deserialize, Serialize};

/// Binary operators of the expression grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`), always decimal-valued
    Divide,
    /// Integer division (`div`), truncating toward zero
    IntegerDivide,
    /// Remainder (`mod`), same sign as the dividend
    Modulo,
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// String concatenation (`&`), empty operands read as `""`
    Concatenate,
    /// Union (`|`), deduplicating
    Union,
    /// Less than (`<`)
    LessThan,
    /// Less than or equal (`<=`)
    LessThanOrEqual,
    /// Greater than (`>`)
    GreaterThan,
    /// Greater than or equal (`>=`)
    GreaterThanOrEqual,
    /// Equality (`=`)
    Equal,
    /// Inequality (`!=`)
    NotEqual,
    /// Equivalence (`~`)
    Equivalent,
    /// Non-equivalence (`!~`)
    NotEquivalent,
    /// Membership (`in`)
    In,
    /// Containership (`contains`)
    Contains,
    /// Logical conjunction (`and`)
    And,
    /// Logical disjunction (`or`)
    Or,
    /// Exclusive disjunction (`xor`)
    Xor,
    /// Implication (`implies`)
    Implies,
}

impl BinaryOperator {
    /// Left binding power. Higher binds tighter; every operator is
    /// left-associative. The ladder is, strongest first: multiplicative,
    /// additive, type (`is`/`as`, handled separately), union, inequality,
    /// equality, membership, `and`, `or`/`xor`, `implies`.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Multiply | Self::Divide | Self::IntegerDivide | Self::Modulo => 10,
            Self::Add | Self::Subtract | Self::Concatenate => 9,
            // `is`/`as` sit at 8 in the parser.
            Self::Union => 7,
            Self::LessThan
            | Self::LessThanOrEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual => 6,
            Self::Equal | Self::NotEqual | Self::Equivalent | Self::NotEquivalent => 5,
            Self::In | Self::Contains => 4,
            Self::And => 3,
            Self::Or | Self::Xor => 2,
            Self::Implies => 1,
        }
    }

    /// The operator's source spelling
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::IntegerDivide => "div",
            Self::Modulo => "mod",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Concatenate => "&",
            Self::Union => "|",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Equivalent => "~",
            Self::NotEquivalent => "!~",
            Self::In => "in",
            Self::Contains => "contains",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Implies => "implies",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary polarity operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Identity (`+x`)
    Plus,
    /// Negation (`-x`), evaluated as `-1 * x`
    Minus,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
        }
    }
}

/// The `is`/`as` type operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeOperator {
    /// Type test (`is`)
    Is,
    /// Type cast (`as`)
    As,
}

impl fmt::Display for TypeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Is => f.write_str("is"),
            Self::As => f.write_str("as"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_ladder_matches_grammar() {
        assert!(BinaryOperator::Multiply.precedence() > BinaryOperator::Add.precedence());
        assert!(BinaryOperator::Add.precedence() > BinaryOperator::Union.precedence());
        assert!(BinaryOperator::Union.precedence() > BinaryOperator::LessThan.precedence());
        assert!(BinaryOperator::LessThan.precedence() > BinaryOperator::Equal.precedence());
        assert!(BinaryOperator::Equal.precedence() > BinaryOperator::In.precedence());
        assert!(BinaryOperator::In.precedence() > BinaryOperator::And.precedence());
        assert!(BinaryOperator::And.precedence() > BinaryOperator::Or.precedence());
        assert_eq!(BinaryOperator::Or.precedence(), BinaryOperator::Xor.precedence());
        assert!(BinaryOperator::Or.precedence() > BinaryOperator::Implies.precedence());
    }
}
