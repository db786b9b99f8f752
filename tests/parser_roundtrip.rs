//! Parser round-trips and failure reporting

mod common;

use common::{eval, patient, test_context};
use fhirpath_engine::{Expression, FhirPathError, evaluate};

#[test]
fn display_returns_the_source_text() {
    let text = "Patient.name.where( family = 'Duck' ).given";
    let expression = Expression::parse(text).unwrap();
    assert_eq!(expression.to_string(), text);
    assert_eq!(expression.text(), text);
}

#[test]
fn reparsing_the_display_form_evaluates_identically() {
    let expressions = [
        "Patient.name.where(family = 'Duck').given",
        "1 + 2 * 3 - 4",
        "(1 | 2) = (1 | 2)",
        "Patient.name.sort(family desc, given).family",
        "@2020-01-31 + 1 month",
        "2 'kg' + 500 'g'",
        "Patient.name.given.select($this.length())",
        "iif(Patient.active, 'yes', 'no')",
        "{} | 1",
    ];
    for text in expressions {
        let first = Expression::parse(text).unwrap();
        let reparsed = Expression::parse(&first.to_string()).unwrap();
        let a = evaluate(&test_context(), patient(), &first).unwrap();
        let b = evaluate(&test_context(), patient(), &reparsed).unwrap();
        assert_eq!(
            a.to_json_value(),
            b.to_json_value(),
            "round-trip changed semantics for {text}"
        );
    }
}

#[test]
fn ast_display_also_reparses() {
    let expressions = [
        "Patient.name.given",
        "1 + 2 * 3",
        "name.sort(family desc)",
        "value is System.Quantity",
        "%ucum & 'x'",
    ];
    for text in expressions {
        let expression = Expression::parse(text).unwrap();
        let rendered = expression.root().to_string();
        let reparsed = Expression::parse(&rendered)
            .unwrap_or_else(|e| panic!("cannot reparse '{rendered}': {e}"));
        assert_eq!(
            expression.root(),
            reparsed.root(),
            "AST display of '{text}' reparses differently"
        );
    }
}

#[test]
fn parse_errors_report_line_and_column() {
    let error = Expression::parse("1 +\n  * 2").unwrap_err();
    let FhirPathError::ParseError { position, .. } = error else {
        panic!("expected a parse error");
    };
    assert_eq!(position.line, 2);
    assert_eq!(position.column, 3);
}

#[test]
fn malformed_expressions_fail_without_panicking() {
    for text in [
        "",
        "1 +",
        "Patient..name",
        "where(",
        "'unterminated",
        "@20",
        "1 ** 2",
        "$unknown",
        "{1, 2}",
        "name.",
        "f(x,)",
        "a is",
    ] {
        assert!(
            Expression::parse(text).is_err(),
            "expected a parse error for '{text}'"
        );
    }
}

#[test]
fn comments_are_ignored() {
    let result = eval(
        "Patient.name // pick names\n  .family /* both */",
        patient(),
    )
    .unwrap();
    assert_eq!(result.len(), 2);
}

#[test]
fn long_and_decimal_literals_keep_their_types() {
    assert!(matches!(
        eval("42L.type().name", patient()).unwrap().to_json_value(),
        serde_json::Value::String(name) if name == "Long"
    ));
    assert!(matches!(
        eval("42.type().name", patient()).unwrap().to_json_value(),
        serde_json::Value::String(name) if name == "Integer"
    ));
    assert!(matches!(
        eval("42.0.type().name", patient()).unwrap().to_json_value(),
        serde_json::Value::String(name) if name == "Decimal"
    ));
}
