//! AST walking rules
//!
//! Every node evaluates against a focus collection and yields a collection
//! whose orderedness flag reflects the operation. The context is threaded
//! mutably along a chain so `defineVariable()` is visible downstream, and
//! cloned at every scope boundary (union branches, function parameters,
//! iterator bodies) so bindings cannot escape sideways.

use crate::ast::{BinaryOperator, ExpressionNode, LiteralValue, TypeOperator, UnaryOperator};
use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::quantity::Quantity;
use crate::core::types::TypeSpecifier;
use crate::core::value::FhirPathValue;

use super::context::EvaluationContext;
use super::operators;

/// Tree walker bound to one evaluation's root collection
pub struct Evaluator<'r> {
    /// The evaluation root; also bound to `%context`
    pub root: &'r Collection,
}

impl<'r> Evaluator<'r> {
    /// Create a walker for `root`
    pub fn new(root: &'r Collection) -> Self {
        Self { root }
    }

    /// Evaluate `node` against `input`
    pub fn evaluate(
        &self,
        node: &ExpressionNode,
        input: &Collection,
        ctx: &mut EvaluationContext,
    ) -> Result<Collection> {
        ctx.cancellation.check()?;
        match node {
            ExpressionNode::Literal(literal) => Ok(literal_collection(literal)),
            ExpressionNode::Identifier(name) => self.evaluate_identifier(name, input, ctx),
            ExpressionNode::ExternalConstant(name) => match ctx.variable(name) {
                Some(value) => Ok(value.clone()),
                None => Err(FhirPathError::UndefinedVariable(name.clone())),
            },
            ExpressionNode::This => match ctx.function_scope() {
                Some(scope) => Ok(scope.this.clone()),
                None => Err(FhirPathError::domain_error(
                    "$this is only available inside iterator functions",
                )),
            },
            ExpressionNode::Index => match ctx.function_scope().and_then(|s| s.index) {
                Some(index) => Ok(Collection::single(FhirPathValue::Integer(index))),
                None => Err(FhirPathError::domain_error(
                    "$index is only available inside iterator functions",
                )),
            },
            ExpressionNode::Total => match ctx.function_scope().and_then(|s| s.total.clone()) {
                Some(total) => Ok(total),
                None => Err(FhirPathError::domain_error(
                    "$total is only available inside aggregate()",
                )),
            },
            ExpressionNode::MemberAccess { object, member } => {
                let object = self.evaluate(object, input, ctx)?;
                Ok(navigate(&object, member))
            }
            ExpressionNode::FunctionCall { name, arguments } => {
                self.invoke(name, arguments, input, ctx)
            }
            ExpressionNode::MethodCall {
                object,
                method,
                arguments,
            } => {
                let object = self.evaluate(object, input, ctx)?;
                self.invoke(method, arguments, &object, ctx)
            }
            ExpressionNode::IndexAccess { object, index } => {
                let object = self.evaluate(object, input, ctx)?;
                if !object.is_ordered() && object.len() > 1 {
                    return Err(FhirPathError::domain_error(
                        "indexer requires an ordered collection",
                    ));
                }
                let index = self.evaluate(index, input, ctx)?;
                if index.is_empty() {
                    return Ok(Collection::empty());
                }
                let index = index
                    .as_singleton()
                    .and_then(|v| v.to_integer(false))
                    .ok_or_else(|| {
                        FhirPathError::type_error("indexer requires a singleton integer index")
                    })?;
                Ok(match usize::try_from(index).ok().and_then(|i| object.get(i)) {
                    Some(value) => Collection::single(value.clone()),
                    None => Collection::empty(),
                })
            }
            ExpressionNode::Polarity { operator, operand } => {
                let operand = self.evaluate(operand, input, ctx)?;
                match operator {
                    UnaryOperator::Plus => Ok(operand),
                    UnaryOperator::Minus => operators::negate(&operand),
                }
            }
            ExpressionNode::BinaryOperation {
                left,
                operator,
                right,
            } => self.evaluate_binary(*operator, left, right, input, ctx),
            ExpressionNode::TypeOperation {
                operand,
                operator,
                type_specifier,
            } => self.evaluate_type_operation(operand, *operator, type_specifier, input, ctx),
            ExpressionNode::Sort { object, keys } => {
                let focus = match object {
                    Some(object) => self.evaluate(object, input, ctx)?,
                    None => input.clone(),
                };
                crate::registry::sorting::sort_collection(self, &focus, keys, ctx)
            }
            ExpressionNode::Parenthesized(inner) => self.evaluate(inner, input, ctx),
        }
    }

    fn evaluate_identifier(
        &self,
        name: &str,
        input: &Collection,
        ctx: &mut EvaluationContext,
    ) -> Result<Collection> {
        let children = navigate(input, name);
        if !children.is_empty() {
            return Ok(children);
        }
        // Root invocation only: a bare name may be a type specifier check
        // against the evaluation root (`Patient.name` on a Patient). Types
        // absent from the registry still match their own name exactly.
        if input.shares_storage(self.root) {
            let resolved = ctx
                .types
                .resolve(&TypeSpecifier::parse(name), &ctx.default_namespace);
            let matching: Vec<FhirPathValue> = input
                .iter()
                .filter(|value| {
                    let value_type = value.type_specifier();
                    match &resolved {
                        Some(target) => ctx.types.sub_type_of(target, &value_type),
                        None => value_type.name == name,
                    }
                })
                .cloned()
                .collect();
            return Ok(Collection::with_ordering(matching, input.is_ordered()));
        }
        Ok(Collection::empty())
    }

    fn evaluate_binary(
        &self,
        operator: BinaryOperator,
        left_node: &ExpressionNode,
        right_node: &ExpressionNode,
        input: &Collection,
        ctx: &mut EvaluationContext,
    ) -> Result<Collection> {
        use BinaryOperator::*;
        match operator {
            Union => {
                // Each branch runs in an isolated variable frame.
                let mut left_ctx = ctx.clone();
                let left = self.evaluate(left_node, input, &mut left_ctx)?;
                let mut right_ctx = ctx.clone();
                let right = self.evaluate(right_node, input, &mut right_ctx)?;
                Ok(union_collections(&left, &right))
            }
            And | Or | Xor | Implies => {
                let left = self.evaluate(left_node, input, ctx)?;
                let right = self.evaluate(right_node, input, ctx)?;
                Ok(operators::logical(
                    operator,
                    operators::boolean_operand(&left)?,
                    operators::boolean_operand(&right)?,
                ))
            }
            Equal | NotEqual => {
                let left = self.evaluate(left_node, input, ctx)?;
                let right = self.evaluate(right_node, input, ctx)?;
                operators::equality(&left, &right, operator == NotEqual)
            }
            Equivalent | NotEquivalent => {
                let left = self.evaluate(left_node, input, ctx)?;
                let right = self.evaluate(right_node, input, ctx)?;
                Ok(operators::equivalence(
                    &left,
                    &right,
                    operator == NotEquivalent,
                ))
            }
            LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
                let left = self.evaluate(left_node, input, ctx)?;
                let right = self.evaluate(right_node, input, ctx)?;
                operators::compare(operator, &left, &right)
            }
            In | Contains => {
                let left = self.evaluate(left_node, input, ctx)?;
                let right = self.evaluate(right_node, input, ctx)?;
                operators::membership(operator, &left, &right)
            }
            _ => {
                let left = self.evaluate(left_node, input, ctx)?;
                let right = self.evaluate(right_node, input, ctx)?;
                operators::arithmetic(operator, &left, &right, ctx)
            }
        }
    }

    fn evaluate_type_operation(
        &self,
        operand_node: &ExpressionNode,
        operator: TypeOperator,
        type_specifier: &TypeSpecifier,
        input: &Collection,
        ctx: &mut EvaluationContext,
    ) -> Result<Collection> {
        let operand = self.evaluate(operand_node, input, ctx)?;
        if operand.is_empty() {
            return Ok(Collection::empty());
        }
        if operand.len() > 1 {
            return Err(FhirPathError::singleton_error(format!(
                "'{operator}' requires a singleton operand, got {} items",
                operand.len()
            )));
        }
        let resolved = resolve_type(type_specifier, ctx)?;
        let value = operand.first().expect("singleton");
        let matches = ctx.types.sub_type_of(&resolved, &value.type_specifier());
        Ok(match operator {
            TypeOperator::Is => Collection::single(FhirPathValue::Boolean(matches)),
            TypeOperator::As => {
                if matches {
                    Collection::single(value.clone())
                } else {
                    Collection::empty()
                }
            }
        })
    }

    /// Resolve a function by name and dispatch to its implementation
    pub fn invoke(
        &self,
        name: &str,
        arguments: &[ExpressionNode],
        input: &Collection,
        ctx: &mut EvaluationContext,
    ) -> Result<Collection> {
        let functions = ctx.functions.clone();
        let Some(entry) = functions.get(name) else {
            return Err(FhirPathError::type_error(format!(
                "unknown function '{name}'"
            )));
        };
        entry.metadata.check_arity(arguments.len())?;
        match &entry.implementation {
            crate::registry::FunctionImpl::Eager(function) => {
                let mut evaluated = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    // Fresh frame per parameter.
                    let mut child = ctx.clone();
                    evaluated.push(self.evaluate(argument, input, &mut child)?);
                }
                let mut cx = crate::registry::FunctionContext {
                    name,
                    input,
                    arguments: &evaluated,
                    ctx,
                    evaluator: self,
                };
                function(&mut cx)
            }
            crate::registry::FunctionImpl::Lazy(function) => {
                let mut cx = crate::registry::LazyFunctionContext {
                    name,
                    input,
                    arguments,
                    ctx,
                    evaluator: self,
                };
                function(&mut cx)
            }
        }
    }
}

/// Flatten `children(name)` over the input collection
pub fn navigate(input: &Collection, name: &str) -> Collection {
    let mut out = Vec::new();
    for item in input.iter() {
        out.extend(item.children(Some(name)));
    }
    Collection::with_ordering(out, input.is_ordered())
}

/// Deduplicating union; ordered iff both sides are ordered
pub fn union_collections(left: &Collection, right: &Collection) -> Collection {
    let mut out: Vec<FhirPathValue> = Vec::with_capacity(left.len() + right.len());
    for value in left.iter().chain(right.iter()) {
        if !out.iter().any(|seen| seen.equal(value) == Some(true)) {
            out.push(value.clone());
        }
    }
    Collection::with_ordering(out, left.is_ordered() && right.is_ordered())
}

fn literal_collection(literal: &LiteralValue) -> Collection {
    match literal {
        LiteralValue::Empty => Collection::empty(),
        LiteralValue::Boolean(b) => Collection::single(FhirPathValue::Boolean(*b)),
        LiteralValue::String(s) => Collection::single(FhirPathValue::String(s.clone())),
        LiteralValue::Integer(i) => Collection::single(FhirPathValue::Integer(*i)),
        LiteralValue::Long(l) => Collection::single(FhirPathValue::Long(*l)),
        LiteralValue::Decimal(d) => Collection::single(FhirPathValue::Decimal(*d)),
        LiteralValue::Date(d) => Collection::single(FhirPathValue::Date(*d)),
        LiteralValue::DateTime(dt) => Collection::single(FhirPathValue::DateTime(*dt)),
        LiteralValue::Time(t) => Collection::single(FhirPathValue::Time(*t)),
        LiteralValue::Quantity {
            value,
            unit,
            calendar_unit,
        } => {
            let quantity = match (unit, calendar_unit) {
                (Some(unit), _) => Quantity::new(*value, unit.clone()),
                (None, Some(cal)) => Quantity::calendar(*value, *cal),
                (None, None) => Quantity::unitless(*value),
            };
            Collection::single(FhirPathValue::Quantity(quantity))
        }
    }
}

/// Resolve a possibly-unqualified type name against the context
pub fn resolve_type(
    specifier: &TypeSpecifier,
    ctx: &EvaluationContext,
) -> Result<TypeSpecifier> {
    ctx.types
        .resolve(specifier, &ctx.default_namespace)
        .ok_or_else(|| FhirPathError::type_error(format!("unknown type '{specifier}'")))
}
