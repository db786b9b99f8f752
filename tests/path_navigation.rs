//! Path navigation, the root type-specifier rule, indexing, tree
//! functions and variable definition

mod common;

use common::{assert_empty, blank, eval, eval_bool, eval_strings, observation, patient};
use fhirpath_engine::FhirPathError;

#[test]
fn filtered_navigation_returns_the_matching_given() {
    let given = eval_strings("Patient.name.where(family = 'Duck').given", patient());
    assert_eq!(given, vec!["Donald"]);
}

#[test]
fn root_resource_type_acts_as_type_check() {
    // The Patient prefix matches the root's type and passes it through.
    assert_eq!(
        eval_strings("Patient.name.given", patient()),
        vec!["Donald", "Peter"]
    );
    // A different resource type filters the root away entirely.
    assert_empty("Observation.issued", patient());
}

#[test]
fn unknown_member_is_empty_not_an_error() {
    assert_empty("Patient.nothingHere", patient());
    assert_empty("Patient.name.nothingHere.further", patient());
}

#[test]
fn issued_is_an_instant() {
    assert!(eval_bool("Observation.issued is instant", observation()));
    assert!(eval_bool("Observation.issued is dateTime", observation()));
    assert!(eval_bool("Observation.issued is System.DateTime", observation()));
    assert!(!eval_bool("Observation.issued is date", observation()));
}

#[test]
fn iif_coerces_non_boolean_singletons_to_true() {
    assert_eq!(
        eval_strings("iif(Observation.issued, 'yes', 'no')", observation()),
        vec!["yes"]
    );
    assert_eq!(
        eval_strings("iif(Observation.nothing, 'yes', 'no')", observation()),
        vec!["no"]
    );
}

#[test]
fn indexer_selects_one_element() {
    assert_eq!(
        eval_strings("Patient.name[0].family", patient()),
        vec!["Duck"]
    );
    assert_eq!(
        eval_strings("Patient.name[1].family", patient()),
        vec!["Griffin"]
    );
    assert_empty("Patient.name[5]", patient());
    assert_empty("Patient.name[-1]", patient());
}

#[test]
fn type_cast_keeps_or_drops_the_value() {
    assert_eq!(
        eval("Observation.issued as instant", observation())
            .unwrap()
            .len(),
        1
    );
    assert_empty("Observation.issued as boolean", observation());
    // is/as on empty input stay empty.
    assert_empty("Observation.nothing is instant", observation());
}

#[test]
fn is_and_as_agree() {
    for type_name in ["instant", "dateTime", "boolean", "string"] {
        let is = eval_bool(
            &format!("Observation.issued is {type_name}"),
            observation(),
        );
        let as_len = eval(
            &format!("Observation.issued as {type_name}"),
            observation(),
        )
        .unwrap()
        .len();
        assert_eq!(is, as_len == 1, "is/as disagree for {type_name}");
    }
}

#[test]
fn children_and_descendants() {
    let children = eval("Patient.name[0].children()", patient()).unwrap();
    assert_eq!(children.len(), 3); // use, family, one given

    let descendants = eval("Patient.descendants()", patient()).unwrap();
    // Two name elements plus their three fields each.
    assert_eq!(descendants.len(), 10);
}

#[test]
fn external_constants_resolve_or_error() {
    assert_eq!(
        eval_strings("%ucum", blank()),
        vec!["http://unitsofmeasure.org"]
    );
    assert!(eval_bool("%context = %resource", patient()));
    let error = eval("%missing", blank()).unwrap_err();
    assert!(matches!(error, FhirPathError::UndefinedVariable(name) if name == "missing"));
}

#[test]
fn define_variable_flows_down_the_chain() {
    assert_eq!(
        eval_strings(
            "defineVariable('family', Patient.name.first().family).select(%family)",
            patient()
        ),
        vec!["Duck"]
    );
    // Rebinding is refused.
    assert!(
        eval(
            "defineVariable('x', 1).defineVariable('x', 2)",
            patient()
        )
        .is_err()
    );
    // Bindings do not leak out of union branches.
    assert!(
        eval(
            "(defineVariable('y', 1).select(%y)) | %y",
            patient()
        )
        .is_err()
    );
}

#[test]
fn this_outside_iterators_is_an_error() {
    assert!(eval("$this", patient()).is_err());
    assert!(eval("$index", patient()).is_err());
    // Inside iterators they are bound.
    assert!(eval_bool("Patient.name.all($index < 2)", patient()));
    assert_eq!(
        eval_strings("Patient.name.given.select($this)", patient()),
        vec!["Donald", "Peter"]
    );
}

#[test]
fn extension_and_value_helpers() {
    let with_extension = fhirpath_engine::model::JsonElement::resource_value(
        serde_json::json!({
            "resourceType": "Patient",
            "extension": [
                {"url": "http://example.org/weight", "valueDecimal": 70.5},
                {"url": "http://example.org/other", "valueString": "x"}
            ]
        }),
        common::test_types(),
    );
    let result = eval(
        "Patient.extension('http://example.org/weight').children()",
        with_extension.clone(),
    )
    .unwrap();
    // url plus valueDecimal
    assert_eq!(result.len(), 2);

    assert!(eval_bool("Patient.active.hasValue()", patient()));
    assert!(!eval_bool("Patient.name.first().hasValue()", patient()));
    assert_eq!(
        eval_strings("Patient.name.first().family.getValue()", patient()),
        vec!["Duck"]
    );
}
