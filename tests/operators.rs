//! Operator semantics: three-valued logic, equality, equivalence,
//! membership, arithmetic and union

mod common;

use common::{assert_empty, blank, eval, eval_bool, eval_strings, eval_unrooted, patient};

fn unrooted_bool(expression: &str) -> bool {
    eval_bool(expression, blank())
}

#[test]
fn empty_and_true_is_empty() {
    assert!(unrooted_bool("({} and true).empty()"));
    assert!(unrooted_bool("({} and false) = false"));
}

#[test]
fn kleene_corners() {
    assert!(unrooted_bool("({} or true)"));
    assert!(unrooted_bool("({} or false).empty()"));
    assert!(unrooted_bool("({} xor true).empty()"));
    assert!(unrooted_bool("(false implies {})"));
    assert!(unrooted_bool("({} implies true)"));
    assert!(unrooted_bool("(true implies {}).empty()"));
}

#[test]
fn singleton_rule_in_boolean_context() {
    // A lone non-boolean operand reads as true.
    assert!(unrooted_bool("('abc' and true)"));
    assert!(unrooted_bool("(1 and true)"));
}

#[test]
fn equality_is_three_valued_and_length_sensitive() {
    assert!(unrooted_bool("(1 = {}).empty()"));
    assert!(unrooted_bool("1 = 1"));
    assert!(unrooted_bool("1 != 2"));
    assert!(unrooted_bool("(1 | 2) = (1 | 2)"));
    assert!(!eval_bool("Patient.name.given = 'Donald'", patient()));
    // Numbers and strings are never silently equal, in either direction.
    assert!(unrooted_bool("('1' = 1).empty()"));
    assert!(unrooted_bool("(1 = '1').empty()"));
}

#[test]
fn equivalence_is_total() {
    assert!(unrooted_bool("{} ~ {}"));
    assert!(unrooted_bool("'Hello World' ~ 'hello   world'"));
    assert!(unrooted_bool("1.58 ~ 1.6"));
    assert!(unrooted_bool("'a' !~ 'b'"));
    assert!(unrooted_bool("({} ~ 1) = false"));
}

#[test]
fn membership_operators() {
    assert!(unrooted_bool("1 in (1 | 2 | 3)"));
    assert!(unrooted_bool("(1 | 2 | 3) contains 2"));
    assert!(unrooted_bool("(4 in (1 | 2 | 3)) = false"));
    assert!(unrooted_bool("({} in (1 | 2)).empty()"));
    assert!(eval_bool("'Donald' in Patient.name.given", patient()));
}

#[test]
fn arithmetic_ladder() {
    assert!(unrooted_bool("1 + 2 * 3 = 7"));
    assert!(unrooted_bool("1 / 2 = 0.5"));
    assert!(unrooted_bool("7 div 2 = 3"));
    assert!(unrooted_bool("-7 div 2 = -3"));
    assert!(unrooted_bool("-7 mod 2 = -1"));
    assert!(unrooted_bool("1.2 + 1.8 = 3.0"));
    assert!(unrooted_bool("2L + 1 = 3L"));
    assert_empty("1 div 0", blank());
    assert_empty("1 mod 0", blank());
}

#[test]
fn string_addition_and_concatenation() {
    assert_eq!(eval_strings("'ab' + 'c'", blank()), vec!["abc"]);
    assert_empty("'ab' + {}", blank());
    assert_eq!(eval_strings("'ab' & {}", blank()), vec!["ab"]);
    assert_eq!(
        eval_strings(
            "Patient.name.first().given.first() & ' ' & Patient.name.first().family",
            patient()
        ),
        vec!["Donald Duck"]
    );
}

#[test]
fn polarity() {
    assert!(unrooted_bool("-5 + 3 = -2"));
    assert!(unrooted_bool("+5 = 5"));
    assert!(unrooted_bool("-(2.5) < 0"));
}

#[test]
fn union_deduplicates_and_isolates_frames() {
    assert!(unrooted_bool("(1 | 2 | 1).count() = 2"));
    assert!(unrooted_bool("(1 | 1 | 1).count() = 1"));
    assert_eq!(
        eval_strings("Patient.name.given | Patient.name.family", patient()),
        vec!["Donald", "Peter", "Duck", "Griffin"]
    );
}

#[test]
fn comparison_operators() {
    assert!(unrooted_bool("1 < 2"));
    assert!(unrooted_bool("2 <= 2"));
    assert!(unrooted_bool("'apple' < 'pear'"));
    assert!(unrooted_bool("3.5 > 3"));
    assert!(unrooted_bool("({} < 1).empty()"));
    assert!(eval("1 < 'a'", blank()).is_err());
}

#[test]
fn implies_precedence_is_loosest() {
    assert!(unrooted_bool("1 = 1 implies 2 = 2"));
    assert!(unrooted_bool("(false and true implies false) = true"));
}

#[test]
fn unknown_function_is_an_error() {
    assert!(eval("Patient.name.fooBar()", patient()).is_err());
}

#[test]
fn determinism_byte_equal_results() {
    let expression = "Patient.name.given | Patient.name.family";
    let a = eval(expression, patient()).unwrap().to_json_value();
    let b = eval(expression, patient()).unwrap().to_json_value();
    assert_eq!(
        serde_json::to_vec(&a).unwrap(),
        serde_json::to_vec(&b).unwrap()
    );
}

#[test]
fn results_from_eval_unrooted_match_blank_root() {
    assert_eq!(
        eval_unrooted("1 + 1").unwrap().to_json_value(),
        serde_json::json!(2)
    );
}
