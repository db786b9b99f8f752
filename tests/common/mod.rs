//! Shared fixtures for the integration suites

use std::sync::Arc;

use serde_json::json;

use fhirpath_engine::core::types::{ClassInfoElement, TypeInfo, TypeSpecifier};
use fhirpath_engine::core::{Collection, FhirPathValue, Result, TypeRegistry};
use fhirpath_engine::model::JsonElement;
use fhirpath_engine::{EvaluationContext, Expression, evaluate};

/// The standard registry extended with the resource types the fixtures use
pub fn test_types() -> Arc<TypeRegistry> {
    let mut registry = (*TypeRegistry::standard()).clone();
    registry.register(TypeInfo::class(
        "FHIR",
        "HumanName",
        Some(TypeSpecifier::fhir("Element")),
        vec![
            ClassInfoElement::new("use", TypeSpecifier::fhir("code"), false),
            ClassInfoElement::new("family", TypeSpecifier::fhir("string"), false),
            ClassInfoElement::new("given", TypeSpecifier::fhir("string"), true),
        ],
    ));
    registry.register(TypeInfo::class(
        "FHIR",
        "Patient",
        Some(TypeSpecifier::fhir("DomainResource")),
        vec![
            ClassInfoElement::new("active", TypeSpecifier::fhir("boolean"), false),
            ClassInfoElement::new("birthDate", TypeSpecifier::fhir("date"), false),
            ClassInfoElement::new("name", TypeSpecifier::fhir("HumanName"), true),
        ],
    ));
    registry.register(TypeInfo::class(
        "FHIR",
        "Observation",
        Some(TypeSpecifier::fhir("DomainResource")),
        vec![
            ClassInfoElement::new("status", TypeSpecifier::fhir("code"), false),
            ClassInfoElement::new("issued", TypeSpecifier::fhir("instant"), false),
            ClassInfoElement::new("valueQuantity", TypeSpecifier::fhir("Quantity"), false),
        ],
    ));
    Arc::new(registry)
}

/// A Patient with two names (Donald Duck, Peter Griffin)
pub fn patient() -> FhirPathValue {
    JsonElement::resource_value(
        json!({
            "resourceType": "Patient",
            "active": true,
            "birthDate": "1970-03-15",
            "name": [
                {"use": "official", "given": ["Donald"], "family": "Duck"},
                {"use": "nickname", "given": ["Peter"], "family": "Griffin"}
            ]
        }),
        test_types(),
    )
}

/// An Observation with an instant-typed `issued` and a mass quantity
pub fn observation() -> FhirPathValue {
    JsonElement::resource_value(
        json!({
            "resourceType": "Observation",
            "status": "final",
            "issued": "2015-02-07T13:28:17.239+02:00",
            "valueQuantity": {
                "value": 72.5,
                "unit": "kg",
                "system": "http://unitsofmeasure.org",
                "code": "kg"
            }
        }),
        test_types(),
    )
}

/// A context whose type registry matches the fixture resources
pub fn test_context() -> EvaluationContext {
    let mut ctx = EvaluationContext::new();
    ctx.types = test_types();
    ctx
}

/// Evaluate `expression` against `root` with the fixture context
pub fn eval(expression: &str, root: FhirPathValue) -> Result<Collection> {
    let expression = Expression::parse(expression)?;
    evaluate(&test_context(), root, &expression)
}

/// Evaluate against an empty anonymous resource
pub fn eval_unrooted(expression: &str) -> Result<Collection> {
    eval(expression, blank())
}

/// An empty resource for expressions that ignore their input
pub fn blank() -> FhirPathValue {
    JsonElement::resource_value(json!({}), test_types())
}

/// Expect a single boolean result
pub fn eval_bool(expression: &str, root: FhirPathValue) -> bool {
    let result = eval(expression, root).unwrap_or_else(|e| panic!("{expression}: {e}"));
    assert_eq!(result.len(), 1, "{expression}: expected a singleton");
    result
        .first()
        .unwrap()
        .to_boolean(false)
        .unwrap_or_else(|| panic!("{expression}: expected a boolean"))
}

/// Expect the string items of the result
pub fn eval_strings(expression: &str, root: FhirPathValue) -> Vec<String> {
    eval(expression, root)
        .unwrap_or_else(|e| panic!("{expression}: {e}"))
        .iter()
        .map(|v| {
            v.to_string_value(false)
                .unwrap_or_else(|| panic!("{expression}: non-string item"))
        })
        .collect()
}

/// Expect an empty result
pub fn assert_empty(expression: &str, root: FhirPathValue) {
    let result = eval(expression, root).unwrap_or_else(|e| panic!("{expression}: {e}"));
    assert!(
        result.is_empty(),
        "{expression}: expected empty, got {:?}",
        result.to_json_value()
    );
}
