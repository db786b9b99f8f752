//! Type functions: type, is, as, ofType
//!
//! The function forms mirror the `is`/`as` operators; their argument is a
//! type name written as an expression (`value.is(System.Integer)`), turned
//! back into a specifier before resolution.

use crate::ast::ExpressionNode;
use crate::core::collection::Collection;
use crate::core::error::{FhirPathError, Result};
use crate::core::types::{TypeInfo, TypeSpecifier};
use crate::core::value::FhirPathValue;
use crate::evaluator::walker::resolve_type;
use crate::register_function;

use super::{FunctionCategory, FunctionRegistry, LazyFunctionContext};

/// Read a type-name argument back out of its expression form
pub(crate) fn type_argument(cx: &LazyFunctionContext<'_>, index: usize) -> Result<TypeSpecifier> {
    let Some(node) = cx.argument(index) else {
        return Err(FhirPathError::arity_error(cx.name, "a type name", index));
    };
    expression_as_type(node).ok_or_else(|| {
        FhirPathError::type_error(format!(
            "argument of {}() must be a type name, got '{node}'",
            cx.name
        ))
    })
}

fn expression_as_type(node: &ExpressionNode) -> Option<TypeSpecifier> {
    match node {
        ExpressionNode::Identifier(name) => Some(TypeSpecifier::parse(name)),
        ExpressionNode::MemberAccess { object, member } => match object.as_ref() {
            ExpressionNode::Identifier(namespace) => {
                Some(TypeSpecifier::new(namespace.clone(), member.clone()))
            }
            _ => None,
        },
        _ => None,
    }
}

impl FunctionRegistry {
    pub(crate) fn register_type_functions(&mut self) {
        register_function!(
            self,
            eager "type",
            category: FunctionCategory::Types,
            description: "Self-describing type information for every item",
            arity: 0..=0,
            implementation: |cx| {
                let mut out = Vec::with_capacity(cx.input.len());
                for item in cx.input.iter() {
                    let spec = item.type_specifier();
                    let info = cx
                        .ctx
                        .types
                        .get(&spec)
                        .cloned()
                        .unwrap_or_else(|| TypeInfo::simple(
                            spec.namespace.clone(),
                            spec.name.clone(),
                            None,
                        ));
                    out.push(FhirPathValue::TypeInfoObject(Box::new(info)));
                }
                Ok(Collection::with_ordering(out, cx.input.is_ordered()))
            }
        );

        register_function!(
            self,
            lazy "is",
            category: FunctionCategory::Types,
            description: "True when the singleton input is of the named type",
            arity: 1..=1,
            implementation: |cx| {
                if cx.input.is_empty() {
                    return Ok(Collection::empty());
                }
                let Some(value) = cx.input.as_singleton() else {
                    return Err(FhirPathError::singleton_error(
                        "is() requires a singleton input",
                    ));
                };
                let specifier = type_argument(cx, 0)?;
                let resolved = resolve_type(&specifier, cx.ctx)?;
                let matches = cx.ctx.types.sub_type_of(&resolved, &value.type_specifier());
                Ok(Collection::single(FhirPathValue::Boolean(matches)))
            }
        );

        register_function!(
            self,
            lazy "as",
            category: FunctionCategory::Types,
            description: "The singleton input when it is of the named type, else empty",
            arity: 1..=1,
            implementation: |cx| {
                if cx.input.is_empty() {
                    return Ok(Collection::empty());
                }
                let Some(value) = cx.input.as_singleton() else {
                    return Err(FhirPathError::singleton_error(
                        "as() requires a singleton input",
                    ));
                };
                let specifier = type_argument(cx, 0)?;
                let resolved = resolve_type(&specifier, cx.ctx)?;
                Ok(
                    if cx.ctx.types.sub_type_of(&resolved, &value.type_specifier()) {
                        Collection::single(value.clone())
                    } else {
                        Collection::empty()
                    },
                )
            }
        );

        register_function!(
            self,
            lazy "ofType",
            category: FunctionCategory::Types,
            description: "Items of the named type (or a subtype)",
            arity: 1..=1,
            implementation: |cx| {
                let specifier = type_argument(cx, 0)?;
                let resolved = resolve_type(&specifier, cx.ctx)?;
                let kept: Vec<FhirPathValue> = cx
                    .input
                    .iter()
                    .filter(|item| cx.ctx.types.sub_type_of(&resolved, &item.type_specifier()))
                    .cloned()
                    .collect();
                Ok(Collection::with_ordering(kept, cx.input.is_ordered()))
            }
        );
    }
}
