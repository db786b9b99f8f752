//! Quantity semantics: UCUM conversion, calendar-literal equality,
//! comparability and composite units

mod common;

use common::{assert_empty, blank, eval, eval_bool, observation};

fn check(expression: &str) -> bool {
    eval_bool(expression, blank())
}

#[test]
fn addition_converts_to_the_left_unit() {
    assert!(check("2 'kg' + 500 'g' = 2.5 'kg'"));
    assert!(check("(2 'kg' + 500 'g').toString() = '2.5 \\'kg\\''"));
    assert!(check("1 'm' - 10 'cm' = 0.9 'm'"));
}

#[test]
fn incompatible_units_error_on_addition() {
    assert!(eval("1 'm' + 1 'kg'", blank()).is_err());
}

#[test]
fn calendar_literal_equality_rules() {
    // A calendar year is not a definite duration: unknown against UCUM 'a'.
    assert!(check("(1 year = 1 'a').empty()"));
    assert!(check("1 'a' = 1 'a'"));
    assert!(check("1 year = 1 year"));
    assert!(check("(1 month = 1 'mo').empty()"));
    // Fixed-length calendar units equate to their UCUM codes.
    assert!(check("1 day = 1 'd'"));
    assert!(check("7 days = 1 week"));
    // Equivalence bridges the variable-length units.
    assert!(check("1 year ~ 1 'a'"));
}

#[test]
fn comparability() {
    assert!(check("1 'm'.comparable(100 'cm')"));
    assert!(check("1 'm'.comparable(1 'kg') = false"));
    assert!(check("1 'm' = 100 'cm'"));
    assert!(check("1 'm' < 150 'cm'"));
}

#[test]
fn unitless_quantities_mix_with_numbers() {
    assert!(check("2 '1' = 2"));
    assert!(check("1.5 'kg' > 1 'kg'"));
}

#[test]
fn composite_units_from_multiplication_and_division() {
    assert!(check("(2 'm' * 3 's').toString() = '6 \\'m.s\\''"));
    assert!(check("(6 'm' / 2 's').toString() = '3 \\'m/s\\''"));
    assert!(check("(6 'm' / 2 'm').toString() = '3'"));
    assert_empty("1 'm' / 0 's'", blank());
}

#[test]
fn quantity_boundaries_keep_units() {
    assert!(check("(1.587 'kg').lowBoundary(8) = 1.5865 'kg'"));
    assert!(check("(1.587 'kg').highBoundary(8) = 1.5875 'kg'"));
}

#[test]
fn resource_quantities_compare_with_literals() {
    assert!(eval_bool(
        "Observation.valueQuantity = 72.5 'kg'",
        observation()
    ));
    assert!(eval_bool(
        "Observation.valueQuantity = 72500 'g'",
        observation()
    ));
    assert!(eval_bool(
        "Observation.valueQuantity.comparable(1 '[lb_av]')",
        observation()
    ));
}

#[test]
fn negative_quantities() {
    assert!(check("-(1 'kg') + 2 'kg' = 1 'kg'"));
    assert!(check("(0 'kg' - 500 'g') = -0.5 'kg'"));
}
