//! Temporal semantics: calendar arithmetic, partial-precision comparison,
//! boundaries, duration/difference and the frozen evaluation instant

mod common;

use common::{assert_empty, blank, eval, eval_bool, eval_strings, patient};

fn check(expression: &str) -> bool {
    eval_bool(expression, blank())
}

#[test]
fn month_addition_clamps_to_month_end() {
    assert!(check("@2020-01-31 + 1 month = @2020-02-29"));
    assert!(check("@2021-01-31 + 1 month = @2021-02-28"));
    assert!(check("@2020-01-31 + 2 months = @2020-03-31"));
}

#[test]
fn calendar_subtraction_uses_date_arithmetic() {
    assert!(check("@2020-03-01 - 1 day = @2020-02-29"));
    assert!(check("@2020-03-31T12:00:00Z - 1 month = @2020-02-29T12:00:00Z"));
    assert!(check("@2020-01-01 - 1 year = @2019-01-01"));
}

#[test]
fn fractional_calendar_units_truncate() {
    assert!(check("@2020-01-01 + 1.9 months = @2020-02-01"));
    assert!(check("@2020-01-01T00:00:00.000Z + 1.5 seconds = @2020-01-01T00:00:01.500Z"));
}

#[test]
fn time_arithmetic_wraps_modulo_24_hours() {
    assert!(check("@T23:30 + 1 hour = @T00:30"));
    assert!(check("@T00:30 - 1 hour = @T23:30"));
}

#[test]
fn partial_precision_comparison_is_unknown() {
    assert!(check("(@2020 = @2020-05).empty()"));
    assert!(check("@2020 < @2021"));
    assert!(check("@2020-05 = @2020-05"));
    assert!(check("(@2020-05-10 < @2020-05).empty()"));
}

#[test]
fn timezone_mismatch_is_not_comparable() {
    assert!(check("(@2020-01-01T10:00:00Z = @2020-01-01T10:00:00).empty()"));
    assert!(check("@2020-01-01T12:00:00Z = @2020-01-01T14:00:00+02:00"));
}

#[test]
fn decimal_boundaries() {
    assert!(check("1.587.lowBoundary(8) = 1.5865"));
    assert!(check("1.587.highBoundary(8) = 1.5875"));
    assert!(check("1.587.lowBoundary() <= 1.587"));
    assert!(check("1.587.highBoundary() >= 1.587"));
    assert!(check("1.lowBoundary(31).exists()"));
    assert_empty("1.5.lowBoundary(-1)", blank());
    assert_empty("1.5.lowBoundary(32)", blank());
}

#[test]
fn date_boundaries_span_the_implied_interval() {
    assert!(check("@2014.lowBoundary(8) = @2014-01-01"));
    assert!(check("@2014.highBoundary(8) = @2014-12-31"));
    assert!(check("@2014-05.lowBoundary(8) = @2014-05-01"));
    assert!(check("@2014-05.highBoundary(8) = @2014-05-31"));
}

#[test]
fn floating_datetime_boundaries_get_extreme_offsets() {
    assert_eq!(
        eval_strings(
            "@2014-01-01T10.lowBoundary(17).toString()",
            blank()
        ),
        vec!["2014-01-01T10:00:00.000+14:00"]
    );
    assert_eq!(
        eval_strings(
            "@2014-01-01T10.highBoundary(17).toString()",
            blank()
        ),
        vec!["2014-01-01T10:59:59.999-12:00"]
    );
}

#[test]
fn duration_counts_whole_units() {
    assert!(check("@2020-03-15.duration(@2025-03-14, 'year') = 4"));
    assert!(check("@2020-03-15.duration(@2025-03-15, 'year') = 5"));
    assert!(check("@2020-01-31.duration(@2020-03-01, 'month') = 1"));
}

#[test]
fn difference_counts_boundary_crossings() {
    assert!(check("@2020-12-31.difference(@2021-01-01, 'year') = 1"));
    assert!(check("@2020-12-31.duration(@2021-01-01, 'year') = 0"));
    assert!(check(
        "@2020-01-01T23:59:00Z.difference(@2020-01-02T00:01:00Z, 'hour') = 1"
    ));
}

#[test]
fn duration_requires_operand_precision() {
    assert_empty("@2020.duration(@2025-03-15, 'month')", blank());
    assert_empty("@2020-05.difference(@2025-03-15, 'day')", blank());
}

#[test]
fn component_extraction() {
    assert!(check("@2020-05-10.yearOf() = 2020"));
    assert!(check("@2020-05-10.monthOf() = 5"));
    assert!(check("@2020-05-10.dayOf() = 10"));
    assert!(check("@2020-05-10T14:30:15.250Z.hourOf() = 14"));
    assert!(check("@2020-05-10T14:30:15.250Z.millisecondOf() = 250"));
    assert!(check("@2020-05-10T14:30:00+02:00.timezoneOffsetOf() = 2.0"));
    assert!(check("@T14:30.minuteOf() = 30"));
    // Components the value does not carry are empty.
    assert_empty("@2020.monthOf()", blank());
    assert_empty("@2020-05-10T14:30.timezoneOffsetOf()", blank());
}

#[test]
fn date_and_time_projections() {
    assert!(check("@2020-05-10T14:30:00Z.dateOf() = @2020-05-10"));
    assert!(check("@2020-05-10T14:30:00Z.timeOf() = @T14:30:00"));
    assert_empty("@2020-05-10.timeOf()", blank());
}

#[test]
fn precision_reports_significant_digits() {
    assert!(check("1.58.precision() = 2"));
    assert!(check("@2014.precision() = 4"));
    assert!(check("@2014-05-10.precision() = 8"));
    assert!(check("@T10:30.precision() = 4"));
    assert!(check("@2014-01-05T10:30:00.000Z.precision() = 17"));
}

#[test]
fn now_is_frozen_per_evaluation() {
    assert!(check("now() = now()"));
    assert!(check("today() = today()"));
    assert!(check("timeOfDay() = timeOfDay()"));
    assert!(check("now().dateOf() = today()"));
}

#[test]
fn birth_date_is_typed() {
    assert!(eval_bool("Patient.birthDate is date", patient()));
    assert!(eval_bool("Patient.birthDate < today()", patient()));
}

#[test]
fn datetime_quantity_roundtrip() {
    let result = eval("(@2020-01-31T10:00:00Z + 1 month).toString()", blank()).unwrap();
    assert_eq!(result.to_json_value(), serde_json::json!("2020-02-29T10:00:00+00:00"));
}
