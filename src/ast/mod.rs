//! Abstract syntax tree for parsed expressions
//!
//! The tree is an immutable value: evaluation never mutates it, and a parsed
//! expression can be shared across threads and evaluated concurrently.

pub mod operator;

pub use operator::{BinaryOperator, TypeOperator, UnaryOperator};

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::quantity::CalendarUnit;
use crate::core::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use crate::core::types::TypeSpecifier;

/// A literal value as written in the source expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// The null literal `{}`
    Empty,
    /// Boolean literal
    Boolean(bool),
    /// String literal (escapes already processed)
    String(String),
    /// Integer literal
    Integer(i32),
    /// Long literal (`123L`)
    Long(i64),
    /// Decimal literal
    Decimal(Decimal),
    /// Date literal (`@2020-01-31`)
    Date(PrecisionDate),
    /// DateTime literal (`@2020-01-31T08:30:00Z`)
    DateTime(PrecisionDateTime),
    /// Time literal (`@T08:30`)
    Time(PrecisionTime),
    /// Quantity literal (`2 'kg'`, `1 year`)
    Quantity {
        /// Numeric value
        value: Decimal,
        /// Quoted UCUM unit, when present
        unit: Option<String>,
        /// Calendar word, when the unit was written unquoted
        calendar_unit: Option<CalendarUnit>,
    },
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("{}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "'{}'", escape_string(s)),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Long(l) => write!(f, "{l}L"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Date(d) => write!(f, "@{d}"),
            Self::DateTime(dt) => write!(f, "@{dt}"),
            Self::Time(t) => write!(f, "@T{t}"),
            Self::Quantity {
                value,
                unit,
                calendar_unit,
            } => match (unit, calendar_unit) {
                (Some(u), _) => write!(f, "{value} '{u}'"),
                (None, Some(cal)) => write!(f, "{value} {cal}"),
                (None, None) => write!(f, "{value}"),
            },
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            _ => out.push(ch),
        }
    }
    out
}

/// Sort direction for one sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending (the default)
    #[default]
    Ascending,
    /// Descending (`desc` suffix or legacy `-key`)
    Descending,
}

/// One key of a `sort()` invocation with its direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    /// Key expression, evaluated per element with `$this` bound
    pub expression: ExpressionNode,
    /// Direction recorded by the parser
    pub direction: SortDirection,
}

/// A node of the expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionNode {
    /// Literal value
    Literal(LiteralValue),

    /// Bare identifier: member access on the input, or a type-specifier
    /// check at the root (`Patient.name`)
    Identifier(String),

    /// External constant reference (`%context`, `%'vs-name'`)
    ExternalConstant(String),

    /// `$this` inside iterator functions
    This,
    /// `$index` inside iterator functions
    Index,
    /// `$total` inside `aggregate`
    Total,

    /// Member access (`object.member`)
    MemberAccess {
        /// The navigated object
        object: Box<ExpressionNode>,
        /// Member name
        member: String,
    },

    /// Function invocation without an explicit object; operates on the
    /// evaluation input (`count()` at the root, `where(...)` after `.`
    /// is a MethodCall)
    FunctionCall {
        /// Function name
        name: String,
        /// Argument expressions
        arguments: Vec<ExpressionNode>,
    },

    /// Function invocation on an object (`Patient.name.first()`)
    MethodCall {
        /// The object the method runs against
        object: Box<ExpressionNode>,
        /// Function name
        method: String,
        /// Argument expressions
        arguments: Vec<ExpressionNode>,
    },

    /// Indexer (`collection[index]`)
    IndexAccess {
        /// The indexed object
        object: Box<ExpressionNode>,
        /// Index expression, must evaluate to a singleton integer
        index: Box<ExpressionNode>,
    },

    /// Unary polarity (`-x`, `+x`)
    Polarity {
        /// The operator
        operator: UnaryOperator,
        /// The operand
        operand: Box<ExpressionNode>,
    },

    /// Binary operation
    BinaryOperation {
        /// Left operand
        left: Box<ExpressionNode>,
        /// The operator
        operator: BinaryOperator,
        /// Right operand
        right: Box<ExpressionNode>,
    },

    /// Type test or cast (`value is Quantity`, `value as string`)
    TypeOperation {
        /// The tested/cast operand
        operand: Box<ExpressionNode>,
        /// `is` or `as`
        operator: TypeOperator,
        /// The named type, possibly unqualified
        type_specifier: TypeSpecifier,
    },

    /// `sort(...)` invocation; the parser records per-key directions
    Sort {
        /// The sorted object; `None` when invoked bare at the root
        object: Option<Box<ExpressionNode>>,
        /// Sort keys in priority order; empty means natural order
        keys: Vec<SortKey>,
    },

    /// Parenthesized subexpression
    Parenthesized(Box<ExpressionNode>),
}

impl ExpressionNode {
    /// Create an identifier node
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    /// Create a literal node
    pub fn literal(value: LiteralValue) -> Self {
        Self::Literal(value)
    }

    /// Create a member access node
    pub fn member(object: ExpressionNode, member: impl Into<String>) -> Self {
        Self::MemberAccess {
            object: Box::new(object),
            member: member.into(),
        }
    }

    /// Create a method call node
    pub fn method(
        object: ExpressionNode,
        method: impl Into<String>,
        arguments: Vec<ExpressionNode>,
    ) -> Self {
        Self::MethodCall {
            object: Box::new(object),
            method: method.into(),
            arguments,
        }
    }

    /// Create a binary operation node
    pub fn binary(left: ExpressionNode, operator: BinaryOperator, right: ExpressionNode) -> Self {
        Self::BinaryOperation {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Identifier(name) => f.write_str(name),
            Self::ExternalConstant(name) => write!(f, "%{name}"),
            Self::This => f.write_str("$this"),
            Self::Index => f.write_str("$index"),
            Self::Total => f.write_str("$total"),
            Self::MemberAccess { object, member } => write!(f, "{object}.{member}"),
            Self::FunctionCall { name, arguments } => {
                write!(f, "{name}(")?;
                write_arguments(f, arguments)?;
                f.write_str(")")
            }
            Self::MethodCall {
                object,
                method,
                arguments,
            } => {
                write!(f, "{object}.{method}(")?;
                write_arguments(f, arguments)?;
                f.write_str(")")
            }
            Self::IndexAccess { object, index } => write!(f, "{object}[{index}]"),
            Self::Polarity { operator, operand } => write!(f, "{operator}{operand}"),
            Self::BinaryOperation {
                left,
                operator,
                right,
            } => write!(f, "{left} {operator} {right}"),
            Self::TypeOperation {
                operand,
                operator,
                type_specifier,
            } => write!(f, "{operand} {operator} {type_specifier}"),
            Self::Sort { object, keys } => {
                if let Some(object) = object {
                    write!(f, "{object}.")?;
                }
                f.write_str("sort(")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", key.expression)?;
                    if key.direction == SortDirection::Descending {
                        f.write_str(" desc")?;
                    }
                }
                f.write_str(")")
            }
            Self::Parenthesized(inner) => write!(f, "({inner})"),
        }
    }
}

fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[ExpressionNode]) -> fmt::Result {
    for (i, arg) in arguments.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        let expr = ExpressionNode::method(
            ExpressionNode::member(ExpressionNode::identifier("Patient"), "name"),
            "where",
            vec![ExpressionNode::binary(
                ExpressionNode::identifier("family"),
                BinaryOperator::Equal,
                ExpressionNode::literal(LiteralValue::String("Duck".into())),
            )],
        );
        assert_eq!(expr.to_string(), "Patient.name.where(family = 'Duck')");
    }

    #[test]
    fn literal_display_escapes() {
        let lit = LiteralValue::String("it's\n".into());
        assert_eq!(lit.to_string(), "'it\\'s\\n'");
    }

    #[test]
    fn sort_display_includes_direction() {
        let expr = ExpressionNode::Sort {
            object: Some(Box::new(ExpressionNode::identifier("name"))),
            keys: vec![SortKey {
                expression: ExpressionNode::identifier("family"),
                direction: SortDirection::Descending,
            }],
        };
        assert_eq!(expr.to_string(), "name.sort(family desc)");
    }
}
