//! JSON-backed `Element` implementation
//!
//! The evaluator consumes tree nodes only through the `Element` capability
//! trait; this module provides the implementation used by the CLI and the
//! test suites: a JSON tree paired with a type registry, so navigation can
//! stamp each child with its declared FHIR type (`Observation.issued` is an
//! `instant`, not just a string).

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value as JsonValue;

use crate::core::quantity::Quantity;
use crate::core::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use crate::core::types::{FHIR_NAMESPACE, TypeRegistry, TypeSpecifier};
use crate::core::value::{Element, FhirPathValue};

/// A node of a JSON resource tree with its declared type
#[derive(Debug, Clone)]
pub struct JsonElement {
    value: Arc<JsonValue>,
    type_specifier: TypeSpecifier,
    types: Arc<TypeRegistry>,
}

impl JsonElement {
    /// Wrap a resource root. The type comes from `resourceType` when
    /// present.
    pub fn resource(value: JsonValue, types: Arc<TypeRegistry>) -> Arc<Self> {
        let type_specifier = value
            .get("resourceType")
            .and_then(JsonValue::as_str)
            .map(TypeSpecifier::fhir)
            .unwrap_or_else(|| TypeSpecifier::fhir("Element"));
        Arc::new(Self {
            value: Arc::new(value),
            type_specifier,
            types,
        })
    }

    /// Wrap a resource root as a value, ready for `evaluate()`
    pub fn resource_value(value: JsonValue, types: Arc<TypeRegistry>) -> FhirPathValue {
        FhirPathValue::Node(Self::resource(value, types))
    }

    fn child(&self, value: &JsonValue, type_specifier: TypeSpecifier) -> FhirPathValue {
        FhirPathValue::Node(Arc::new(Self {
            value: Arc::new(value.clone()),
            type_specifier,
            types: self.types.clone(),
        }))
    }

    /// The declared type of `field`, from the registry when known, guessed
    /// from the JSON shape otherwise.
    fn field_type(&self, field: &str, value: &JsonValue) -> TypeSpecifier {
        if let Some(element) = self.types.element_type(&self.type_specifier, field) {
            return element.element_type.clone();
        }
        infer_type(value)
    }
}

fn infer_type(value: &JsonValue) -> TypeSpecifier {
    match value {
        JsonValue::Bool(_) => TypeSpecifier::fhir("boolean"),
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => TypeSpecifier::fhir("integer"),
        JsonValue::Number(_) => TypeSpecifier::fhir("decimal"),
        JsonValue::String(_) => TypeSpecifier::fhir("string"),
        JsonValue::Object(map) => match map.get("resourceType").and_then(JsonValue::as_str) {
            Some(resource_type) => TypeSpecifier::fhir(resource_type),
            None => TypeSpecifier::fhir("Element"),
        },
        _ => TypeSpecifier::fhir("Element"),
    }
}

impl Element for JsonElement {
    fn children(&self, name: Option<&str>) -> Vec<FhirPathValue> {
        let JsonValue::Object(map) = self.value.as_ref() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (field, value) in map {
            if field == "resourceType" || field.starts_with('_') {
                continue;
            }
            if let Some(wanted) = name {
                if field != wanted {
                    continue;
                }
            }
            let field_type = self.field_type(field, value);
            match value {
                JsonValue::Array(items) => {
                    for item in items {
                        out.push(self.child(item, field_type.clone()));
                    }
                }
                other => out.push(self.child(other, field_type.clone())),
            }
        }
        out
    }

    fn type_specifier(&self) -> TypeSpecifier {
        self.type_specifier.clone()
    }

    fn system_value(&self) -> Option<FhirPathValue> {
        match self.value.as_ref() {
            JsonValue::Bool(b) => Some(FhirPathValue::Boolean(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if self.type_specifier.namespace == FHIR_NAMESPACE
                        && self.type_specifier.name == "integer64"
                    {
                        return Some(FhirPathValue::Long(i));
                    }
                    return match i32::try_from(i) {
                        Ok(v) => Some(FhirPathValue::Integer(v)),
                        Err(_) => Some(FhirPathValue::Long(i)),
                    };
                }
                n.as_f64()
                    .and_then(Decimal::from_f64)
                    .map(|d| FhirPathValue::decimal(d))
            }
            JsonValue::String(s) => Some(typed_string_value(&self.type_specifier, s, &self.types)),
            JsonValue::Object(map) => {
                // A UCUM-coded Quantity element reads as a System.Quantity.
                let value = map.get("value").and_then(JsonValue::as_f64)?;
                let unit = map
                    .get("code")
                    .or_else(|| map.get("unit"))
                    .and_then(JsonValue::as_str)?;
                let value = Decimal::from_f64(value)?;
                Some(FhirPathValue::Quantity(Quantity::new(value, unit)))
            }
            _ => None,
        }
    }

    fn to_json(&self) -> JsonValue {
        self.value.as_ref().clone()
    }
}

/// Map a JSON string to the System value its declared FHIR type implies
fn typed_string_value(
    type_specifier: &TypeSpecifier,
    text: &str,
    types: &TypeRegistry,
) -> FhirPathValue {
    let system = |name: &str| {
        types.sub_type_of(&TypeSpecifier::system(name), type_specifier)
    };
    if system("DateTime") {
        if let Some(datetime) = PrecisionDateTime::parse(text) {
            return FhirPathValue::DateTime(datetime);
        }
    } else if system("Date") {
        if let Some(date) = PrecisionDate::parse(text) {
            return FhirPathValue::Date(date);
        }
    } else if system("Time") {
        if let Some(time) = PrecisionTime::parse(text) {
            return FhirPathValue::Time(time);
        }
    } else if system("Decimal") {
        if let Ok(decimal) = text.parse::<Decimal>() {
            return FhirPathValue::decimal(decimal);
        }
    }
    FhirPathValue::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient() -> FhirPathValue {
        JsonElement::resource_value(
            json!({
                "resourceType": "Patient",
                "active": true,
                "name": [
                    {"given": ["Donald"], "family": "Duck"},
                    {"given": ["Peter"], "family": "Griffin"}
                ]
            }),
            TypeRegistry::standard(),
        )
    }

    #[test]
    fn navigation_flattens_arrays() {
        let patient = patient();
        let names = patient.children(Some("name"));
        assert_eq!(names.len(), 2);
        let families: Vec<String> = names
            .iter()
            .flat_map(|n| n.children(Some("family")))
            .filter_map(|f| f.to_string_value(false))
            .collect();
        assert_eq!(families, vec!["Duck", "Griffin"]);
    }

    #[test]
    fn primitives_surface_system_values() {
        let patient = patient();
        let active = patient.children(Some("active"));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].to_boolean(false), Some(true));
    }

    #[test]
    fn declared_types_win_over_inference() {
        let mut registry = (*TypeRegistry::standard()).clone();
        registry.register(crate::core::types::TypeInfo::class(
            FHIR_NAMESPACE,
            "Observation",
            Some(TypeSpecifier::fhir("DomainResource")),
            vec![crate::core::types::ClassInfoElement::new(
                "issued",
                TypeSpecifier::fhir("instant"),
                false,
            )],
        ));
        let observation = JsonElement::resource_value(
            json!({
                "resourceType": "Observation",
                "issued": "2015-02-07T13:28:17.239+02:00"
            }),
            Arc::new(registry),
        );
        let issued = observation.children(Some("issued"));
        assert_eq!(issued.len(), 1);
        assert_eq!(
            issued[0].type_specifier(),
            TypeSpecifier::fhir("instant")
        );
        assert!(matches!(
            issued[0].unwrap_system(),
            FhirPathValue::DateTime(_)
        ));
    }

    #[test]
    fn quantity_elements_read_as_quantities() {
        let observation = JsonElement::resource_value(
            json!({
                "resourceType": "Observation",
                "valueQuantity": {
                    "value": 185.0,
                    "unit": "lbs",
                    "system": "http://unitsofmeasure.org",
                    "code": "[lb_av]"
                }
            }),
            TypeRegistry::standard(),
        );
        let quantity = observation.children(Some("valueQuantity"));
        let FhirPathValue::Quantity(q) = quantity[0].unwrap_system() else {
            panic!("expected a quantity");
        };
        assert_eq!(q.unit, "[lb_av]");
    }
}
