//! Pratt parser over the token stream
//!
//! Binding powers implement the grammar's precedence ladder: invocation and
//! indexing bind tightest, then unary polarity, multiplicative, additive,
//! type (`is`/`as`), union, inequality, equality, membership, `and`,
//! `or`/`xor`, and `implies` loosest. `sort` invocations are recognized
//! specially so each key's `asc`/`desc` direction lands in the AST.

use crate::ast::{
    BinaryOperator, ExpressionNode, LiteralValue, SortDirection, SortKey, TypeOperator,
    UnaryOperator,
};
use crate::core::error::{FhirPathError, Result};
use crate::core::quantity::CalendarUnit;
use crate::core::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use crate::core::types::TypeSpecifier;

use super::tokenizer::{Spanned, Token, tokenize};

const TYPE_OPERATOR_PRECEDENCE: u8 = 8;

/// Parse `input` into an expression tree
pub fn parse(input: &str) -> Result<ExpressionNode> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
    };
    let expression = parser.parse_expression(0)?;
    if let Some(extra) = parser.peek() {
        return Err(parser.error_at(
            extra.start,
            format!("unexpected trailing input '{}'", describe(&extra.token)),
        ));
    }
    Ok(expression)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Identifier(name) => name.clone(),
        Token::String(_) => "string literal".to_string(),
        other => format!("{other:?}"),
    }
}

struct Parser<'input> {
    input: &'input str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'input> Parser<'input> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> FhirPathError {
        FhirPathError::parse_error(self.input, offset, message)
    }

    fn error_here(&self, message: impl Into<String>) -> FhirPathError {
        let offset = self
            .peek()
            .map(|s| s.start)
            .unwrap_or_else(|| self.input.len());
        self.error_at(offset, message)
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        match self.peek_token() {
            Some(token) if token == expected => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error_here(format!("expected {what}"))),
        }
    }

    fn parse_expression(&mut self, min_precedence: u8) -> Result<ExpressionNode> {
        let mut left = self.parse_unary()?;

        loop {
            let Some(token) = self.peek_token() else { break };

            // is / as take a type specifier, not a general expression.
            if matches!(token, Token::Is | Token::As) {
                if TYPE_OPERATOR_PRECEDENCE < min_precedence {
                    break;
                }
                let operator = if matches!(token, Token::Is) {
                    TypeOperator::Is
                } else {
                    TypeOperator::As
                };
                self.pos += 1;
                let type_specifier = self.parse_type_specifier()?;
                left = ExpressionNode::TypeOperation {
                    operand: Box::new(left),
                    operator,
                    type_specifier,
                };
                continue;
            }

            let Some(operator) = binary_operator(token) else { break };
            let precedence = operator.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            // Left associativity: the right side must bind strictly tighter.
            let right = self.parse_expression(precedence + 1)?;
            left = ExpressionNode::BinaryOperation {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExpressionNode> {
        match self.peek_token() {
            Some(Token::Plus) => {
                self.pos += 1;
                // Polarity binds tighter than any binary operator but looser
                // than invocation, so the operand is another unary.
                let operand = self.parse_unary()?;
                Ok(ExpressionNode::Polarity {
                    operator: UnaryOperator::Plus,
                    operand: Box::new(operand),
                })
            }
            Some(Token::Minus) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                Ok(ExpressionNode::Polarity {
                    operator: UnaryOperator::Minus,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    /// Primary expression followed by any chain of `.member`, `.method()`
    /// and `[index]` postfix operators.
    fn parse_postfix(&mut self) -> Result<ExpressionNode> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek_token() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = self.expect_member_name()?;
                    if self.peek_token() == Some(&Token::LeftParen) {
                        if name == "sort" {
                            let keys = self.parse_sort_arguments()?;
                            node = ExpressionNode::Sort {
                                object: Some(Box::new(node)),
                                keys,
                            };
                        } else {
                            let arguments = self.parse_arguments()?;
                            node = ExpressionNode::MethodCall {
                                object: Box::new(node),
                                method: name,
                                arguments,
                            };
                        }
                    } else {
                        node = ExpressionNode::MemberAccess {
                            object: Box::new(node),
                            member: name,
                        };
                    }
                }
                Some(Token::LeftBracket) => {
                    self.pos += 1;
                    let index = self.parse_expression(0)?;
                    self.expect(&Token::RightBracket, "']' after index")?;
                    node = ExpressionNode::IndexAccess {
                        object: Box::new(node),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn expect_member_name(&mut self) -> Result<String> {
        match self.peek_token() {
            Some(token) => match token.as_identifier_text() {
                Some(name) => {
                    let name = name.to_string();
                    self.pos += 1;
                    Ok(name)
                }
                None => Err(self.error_here("expected member name after '.'")),
            },
            None => Err(self.error_here("expected member name after '.'")),
        }
    }

    fn parse_primary(&mut self) -> Result<ExpressionNode> {
        let Some(spanned) = self.advance() else {
            return Err(self.error_here("unexpected end of expression"));
        };
        match spanned.token {
            Token::True => Ok(ExpressionNode::Literal(LiteralValue::Boolean(true))),
            Token::False => Ok(ExpressionNode::Literal(LiteralValue::Boolean(false))),
            Token::String(value) => Ok(ExpressionNode::Literal(LiteralValue::String(value))),
            Token::Integer(value) => Ok(self.number_literal(
                rust_decimal::Decimal::from(value),
                LiteralValue::Integer(value),
            )),
            Token::Long(value) => Ok(ExpressionNode::Literal(LiteralValue::Long(value))),
            Token::Decimal(value) => {
                Ok(self.number_literal(value, LiteralValue::Decimal(value)))
            }
            Token::Date(body) => match PrecisionDate::parse(&body) {
                Some(date) => Ok(ExpressionNode::Literal(LiteralValue::Date(date))),
                None => Err(self.error_at(spanned.start, format!("invalid date literal '@{body}'"))),
            },
            Token::DateTime(body) => match PrecisionDateTime::parse(&body) {
                Some(datetime) => Ok(ExpressionNode::Literal(LiteralValue::DateTime(datetime))),
                None => Err(self.error_at(
                    spanned.start,
                    format!("invalid datetime literal '@{body}'"),
                )),
            },
            Token::Time(body) => match PrecisionTime::parse(&body) {
                Some(time) => Ok(ExpressionNode::Literal(LiteralValue::Time(time))),
                None => {
                    Err(self.error_at(spanned.start, format!("invalid time literal '@T{body}'")))
                }
            },
            Token::LeftBrace => {
                self.expect(&Token::RightBrace, "'}' (only the empty collection '{}' is a literal)")?;
                Ok(ExpressionNode::Literal(LiteralValue::Empty))
            }
            Token::Percent => self.parse_external_constant(),
            Token::DollarThis => Ok(ExpressionNode::This),
            Token::DollarIndex => Ok(ExpressionNode::Index),
            Token::DollarTotal => Ok(ExpressionNode::Total),
            Token::LeftParen => {
                let inner = self.parse_expression(0)?;
                self.expect(&Token::RightParen, "')'")?;
                Ok(ExpressionNode::Parenthesized(Box::new(inner)))
            }
            Token::Identifier(name) => {
                if self.peek_token() == Some(&Token::LeftParen) {
                    if name == "sort" {
                        let keys = self.parse_sort_arguments()?;
                        Ok(ExpressionNode::Sort { object: None, keys })
                    } else {
                        let arguments = self.parse_arguments()?;
                        Ok(ExpressionNode::FunctionCall { name, arguments })
                    }
                } else {
                    Ok(ExpressionNode::Identifier(name))
                }
            }
            other => Err(self.error_at(
                spanned.start,
                format!("unexpected '{}'", describe(&other)),
            )),
        }
    }

    /// A number may begin a quantity literal: `4 days` or `10 'mg'`.
    fn number_literal(
        &mut self,
        value: rust_decimal::Decimal,
        plain: LiteralValue,
    ) -> ExpressionNode {
        let unit = match self.peek_token() {
            Some(Token::String(unit)) => Some((Some(unit.clone()), None)),
            Some(Token::Identifier(word)) => {
                CalendarUnit::from_calendar_word(word).map(|cal| (None, Some(cal)))
            }
            _ => None,
        };
        match unit {
            Some((unit, calendar_unit)) => {
                self.pos += 1;
                ExpressionNode::Literal(LiteralValue::Quantity {
                    value,
                    unit,
                    calendar_unit,
                })
            }
            None => ExpressionNode::Literal(plain),
        }
    }

    fn parse_external_constant(&mut self) -> Result<ExpressionNode> {
        match self.advance().map(|s| s.token) {
            Some(Token::Identifier(name)) => Ok(ExpressionNode::ExternalConstant(name)),
            Some(Token::String(name)) => Ok(ExpressionNode::ExternalConstant(name)),
            _ => Err(self.error_here("expected constant name after '%'")),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<ExpressionNode>> {
        self.expect(&Token::LeftParen, "'('")?;
        let mut arguments = Vec::new();
        if self.peek_token() == Some(&Token::RightParen) {
            self.pos += 1;
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_expression(0)?);
            match self.peek_token() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RightParen) => {
                    self.pos += 1;
                    return Ok(arguments);
                }
                _ => return Err(self.error_here("expected ',' or ')' in argument list")),
            }
        }
    }

    /// Sort arguments allow an `asc`/`desc` suffix per key and the legacy
    /// `-key` shorthand for descending.
    fn parse_sort_arguments(&mut self) -> Result<Vec<SortKey>> {
        self.expect(&Token::LeftParen, "'('")?;
        let mut keys = Vec::new();
        if self.peek_token() == Some(&Token::RightParen) {
            self.pos += 1;
            return Ok(keys);
        }
        loop {
            let mut direction = SortDirection::Ascending;
            if self.peek_token() == Some(&Token::Minus) {
                self.pos += 1;
                direction = SortDirection::Descending;
            }
            let expression = self.parse_expression(0)?;
            let suffix = match self.peek_token() {
                Some(Token::Identifier(word)) if word == "asc" || word == "desc" => {
                    Some(word == "desc")
                }
                _ => None,
            };
            if let Some(descending) = suffix {
                self.pos += 1;
                if descending {
                    direction = SortDirection::Descending;
                }
            }
            keys.push(SortKey {
                expression,
                direction,
            });
            match self.peek_token() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RightParen) => {
                    self.pos += 1;
                    return Ok(keys);
                }
                _ => return Err(self.error_here("expected ',' or ')' in sort key list")),
            }
        }
    }

    /// A type specifier: a possibly dot-qualified identifier.
    fn parse_type_specifier(&mut self) -> Result<TypeSpecifier> {
        let first = match self.peek_token().and_then(Token::as_identifier_text) {
            Some(name) => {
                let name = name.to_string();
                self.pos += 1;
                name
            }
            None => return Err(self.error_here("expected type name")),
        };
        if self.peek_token() == Some(&Token::Dot) {
            // Only consume the dot when a second identifier follows; the
            // qualified form is Namespace.Name.
            if let Some(Token::Identifier(_)) =
                self.tokens.get(self.pos + 1).map(|s| &s.token)
            {
                self.pos += 1;
                if let Some(Token::Identifier(name)) = self.peek_token().cloned() {
                    self.pos += 1;
                    return Ok(TypeSpecifier::new(first, name));
                }
            }
        }
        Ok(TypeSpecifier::parse(&first))
    }
}

fn binary_operator(token: &Token) -> Option<BinaryOperator> {
    Some(match token {
        Token::Star => BinaryOperator::Multiply,
        Token::Slash => BinaryOperator::Divide,
        Token::Div => BinaryOperator::IntegerDivide,
        Token::Mod => BinaryOperator::Modulo,
        Token::Plus => BinaryOperator::Add,
        Token::Minus => BinaryOperator::Subtract,
        Token::Ampersand => BinaryOperator::Concatenate,
        Token::Pipe => BinaryOperator::Union,
        Token::LessThan => BinaryOperator::LessThan,
        Token::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
        Token::GreaterThan => BinaryOperator::GreaterThan,
        Token::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
        Token::Equal => BinaryOperator::Equal,
        Token::NotEqual => BinaryOperator::NotEqual,
        Token::Equivalent => BinaryOperator::Equivalent,
        Token::NotEquivalent => BinaryOperator::NotEquivalent,
        Token::In => BinaryOperator::In,
        Token::Contains => BinaryOperator::Contains,
        Token::And => BinaryOperator::And,
        Token::Or => BinaryOperator::Or,
        Token::Xor => BinaryOperator::Xor,
        Token::Implies => BinaryOperator::Implies,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_chain() {
        let ast = parse("Patient.name.given").unwrap();
        assert_eq!(ast.to_string(), "Patient.name.given");
        assert!(matches!(ast, ExpressionNode::MemberAccess { .. }));
    }

    #[test]
    fn precedence_shapes_the_tree() {
        let ast = parse("1 + 2 * 3").unwrap();
        let ExpressionNode::BinaryOperation {
            operator, right, ..
        } = ast
        else {
            panic!("expected binary operation");
        };
        assert_eq!(operator, BinaryOperator::Add);
        assert!(matches!(
            *right,
            ExpressionNode::BinaryOperation {
                operator: BinaryOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn implies_binds_loosest() {
        let ast = parse("a or b implies c").unwrap();
        let ExpressionNode::BinaryOperation { operator, .. } = ast else {
            panic!("expected binary operation");
        };
        assert_eq!(operator, BinaryOperator::Implies);
    }

    #[test]
    fn union_binds_tighter_than_comparison() {
        let ast = parse("a | b = c").unwrap();
        let ExpressionNode::BinaryOperation { operator, .. } = ast else {
            panic!("expected binary operation");
        };
        assert_eq!(operator, BinaryOperator::Equal);
    }

    #[test]
    fn method_call_with_criteria() {
        let ast = parse("Patient.name.where(family = 'Duck').given").unwrap();
        assert_eq!(
            ast.to_string(),
            "Patient.name.where(family = 'Duck').given"
        );
    }

    #[test]
    fn type_operation() {
        let ast = parse("Observation.issued is instant").unwrap();
        let ExpressionNode::TypeOperation {
            operator,
            type_specifier,
            ..
        } = ast
        else {
            panic!("expected type operation");
        };
        assert_eq!(operator, TypeOperator::Is);
        assert!(type_specifier.is_unqualified());
        assert_eq!(type_specifier.name, "instant");

        let ast = parse("value as System.Quantity").unwrap();
        let ExpressionNode::TypeOperation { type_specifier, .. } = ast else {
            panic!("expected type operation");
        };
        assert_eq!(type_specifier.namespace, "System");
    }

    #[test]
    fn quantity_literals() {
        let ast = parse("2 'kg' + 500 'g'").unwrap();
        assert_eq!(ast.to_string(), "2 'kg' + 500 'g'");

        let ast = parse("@2020-01-31 + 1 month").unwrap();
        let ExpressionNode::BinaryOperation { right, .. } = ast else {
            panic!("expected binary operation");
        };
        assert!(matches!(
            *right,
            ExpressionNode::Literal(LiteralValue::Quantity {
                calendar_unit: Some(CalendarUnit::Month),
                ..
            })
        ));
    }

    #[test]
    fn empty_literal_and_braces() {
        assert!(matches!(
            parse("{}").unwrap(),
            ExpressionNode::Literal(LiteralValue::Empty)
        ));
        assert!(parse("{1, 2}").is_err());
    }

    #[test]
    fn sort_directions() {
        let ast = parse("name.sort(family desc, given)").unwrap();
        let ExpressionNode::Sort { keys, .. } = ast else {
            panic!("expected sort node");
        };
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].direction, SortDirection::Descending);
        assert_eq!(keys[1].direction, SortDirection::Ascending);

        // Legacy shorthand.
        let ast = parse("name.sort(-family)").unwrap();
        let ExpressionNode::Sort { keys, .. } = ast else {
            panic!("expected sort node");
        };
        assert_eq!(keys[0].direction, SortDirection::Descending);
    }

    #[test]
    fn keywords_as_member_names() {
        let ast = parse("ValueSet.expansion.contains").unwrap();
        assert_eq!(ast.to_string(), "ValueSet.expansion.contains");
    }

    #[test]
    fn external_constants() {
        assert!(matches!(
            parse("%context").unwrap(),
            ExpressionNode::ExternalConstant(name) if name == "context"
        ));
        assert!(matches!(
            parse("%'vs-name'").unwrap(),
            ExpressionNode::ExternalConstant(name) if name == "vs-name"
        ));
    }

    #[test]
    fn errors_carry_positions() {
        let err = parse("1 +").unwrap_err();
        assert!(matches!(err, FhirPathError::ParseError { .. }));
        let err = parse("Patient..name").unwrap_err();
        let FhirPathError::ParseError { position, .. } = err else {
            panic!("expected parse error");
        };
        assert_eq!(position.column, 9);
    }

    #[test]
    fn unary_polarity() {
        let ast = parse("-5 + 3").unwrap();
        let ExpressionNode::BinaryOperation { left, .. } = ast else {
            panic!("expected binary operation");
        };
        assert!(matches!(*left, ExpressionNode::Polarity { .. }));
    }
}
