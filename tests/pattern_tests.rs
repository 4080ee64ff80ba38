use chrono::{NaiveDate, Weekday};
use practice_scheduler::{
    PatternError, PatternFields, RecurrenceKind, RecurrencePattern, RecurrenceRule, validate,
};
use serde_json::json;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fields(value: serde_json::Value) -> PatternFields {
    serde_json::from_value(value).expect("pattern fields")
}

#[test]
fn accepts_one_valid_pattern_of_each_type() {
    let valid = [
        json!({"type": "Daily", "interval": 1}),
        json!({"type": "Weekly", "interval": 2, "weekdays": [1, 3]}),
        json!({"type": "Monthly", "interval": 1, "dayOfMonth": 15}),
        json!({"type": "Quarterly", "dayOfMonth": 31}),
        json!({"type": "Annually", "monthOfYear": 4, "dayOfMonth": 15}),
        json!({"type": "Custom", "customOffsetDays": -5}),
        json!({"type": "Custom", "customOffsetDays": 0}),
    ];
    for value in valid {
        assert!(validate(&fields(value.clone())), "expected valid: {value}");
    }
}

#[test]
fn rejects_patterns_missing_or_out_of_range_fields() {
    let invalid = [
        json!({"type": "Daily"}),
        json!({"type": "Daily", "interval": 0}),
        json!({"type": "Weekly", "interval": 1}),
        json!({"type": "Weekly", "interval": 1, "weekdays": []}),
        json!({"type": "Weekly", "interval": 1, "weekdays": [7]}),
        json!({"type": "Weekly", "interval": 0, "weekdays": [1]}),
        json!({"type": "Monthly", "interval": 1}),
        json!({"type": "Monthly", "interval": 1, "dayOfMonth": 32}),
        json!({"type": "Monthly", "interval": 1, "dayOfMonth": 0}),
        json!({"type": "Quarterly"}),
        json!({"type": "Annually", "monthOfYear": 13, "dayOfMonth": 1}),
        json!({"type": "Annually", "dayOfMonth": 1}),
        json!({"type": "Custom"}),
        json!({"type": "Fortnightly", "interval": 1}),
    ];
    for value in invalid {
        assert!(!validate(&fields(value.clone())), "expected invalid: {value}");
    }
}

#[test]
fn type_names_are_case_insensitive() {
    assert!(validate(&fields(json!({"type": "monthly", "interval": 1, "dayOfMonth": 1}))));
    assert!(validate(&fields(json!({"type": "QUARTERLY", "dayOfMonth": 1}))));
    assert_eq!("annual".parse::<RecurrenceKind>(), Ok(RecurrenceKind::Annually));
}

#[test]
fn conversion_names_the_failing_field() {
    let err = RecurrencePattern::try_from(fields(json!({"type": "Monthly", "interval": 1})))
        .unwrap_err();
    assert!(matches!(err, PatternError::MissingField { field: "dayOfMonth", .. }));

    let err = RecurrencePattern::try_from(fields(json!({"type": "Annually", "monthOfYear": 0, "dayOfMonth": 3})))
        .unwrap_err();
    assert!(matches!(err, PatternError::OutOfRange { field: "monthOfYear", .. }));

    let err = RecurrencePattern::try_from(fields(json!({"type": "Hourly"}))).unwrap_err();
    assert!(matches!(err, PatternError::UnknownType(_)));
}

#[test]
fn unrelated_fields_are_ignored() {
    let pattern = RecurrencePattern::try_from(fields(json!({
        "type": "Daily",
        "interval": 3,
        "dayOfMonth": 99,
        "weekdays": [42]
    })))
    .expect("daily pattern");
    assert_eq!(pattern.rule, RecurrenceRule::Daily { interval: 3 });
}

#[test]
fn weekdays_are_sorted_and_deduplicated() {
    let pattern = RecurrencePattern::try_from(fields(json!({
        "type": "Weekly",
        "interval": 1,
        "weekdays": [5, 1, 5, 0]
    })))
    .unwrap();
    assert_eq!(
        pattern.rule,
        RecurrenceRule::Weekly {
            interval: 1,
            weekdays: vec![Weekday::Sun, Weekday::Mon, Weekday::Fri],
        }
    );
}

#[test]
fn pattern_serializes_in_wire_shape() {
    let pattern = RecurrencePattern::monthly(1, 15)
        .unwrap()
        .with_end_date(d(2025, 12, 31));
    let value = serde_json::to_value(&pattern).unwrap();
    assert_eq!(value["type"], json!("Monthly"));
    assert_eq!(value["interval"], json!(1));
    assert_eq!(value["dayOfMonth"], json!(15));
    assert_eq!(value["endDate"], json!("2025-12-31"));

    let back: RecurrencePattern = serde_json::from_value(value).unwrap();
    assert_eq!(back, pattern);
}

#[test]
fn deserializing_an_invalid_pattern_fails() {
    let result: Result<RecurrencePattern, _> =
        serde_json::from_value(json!({"type": "Weekly", "interval": 1, "weekdays": []}));
    assert!(result.is_err());
}

#[test]
fn constructors_check_their_arguments() {
    assert!(RecurrencePattern::daily(0).is_err());
    assert!(RecurrencePattern::weekly(1, Vec::new()).is_err());
    assert!(RecurrencePattern::quarterly(32).is_err());
    assert!(RecurrencePattern::annually(12, 31).is_ok());
    assert!(RecurrencePattern::custom(-10).is_ok());
}
