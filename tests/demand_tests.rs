use chrono::NaiveDate;
use polars::prelude::AnyValue;
use practice_scheduler::{
    DemandError, DemandForecaster, OccurrencePolicy, RecurrencePattern, RecurringTask,
    SkillDemand, SkillMapping, SkillSource, SkillSourceError, StaticSkillSource, YearMonth,
    build_demand_matrix, calculate_monthly_demand_by_skill,
};
use std::time::Duration;
use uuid::Uuid;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn ym(y: i32, m: u32) -> YearMonth {
    YearMonth::new(y, m).unwrap()
}

fn monthly_task(name: &str, hours: f64, skills: &[&str]) -> RecurringTask {
    RecurringTask::new(
        Uuid::new_v4(),
        name,
        hours,
        RecurrencePattern::monthly(1, 15).unwrap(),
    )
    .with_skills(skills.iter().copied())
}

fn hours_for(demand: &[SkillDemand], skill: &str) -> f64 {
    demand
        .iter()
        .find(|item| item.skill == skill)
        .map(|item| item.hours)
        .unwrap_or(0.0)
}

#[test]
fn full_hours_go_to_every_required_skill() {
    let tasks = vec![monthly_task("VAT return", 10.0, &["A", "B"])];
    let demand = calculate_monthly_demand_by_skill(&tasks, d(2025, 1, 1), d(2025, 1, 31)).unwrap();
    assert_eq!(
        demand,
        vec![
            SkillDemand {
                skill: "A".into(),
                hours: 10.0
            },
            SkillDemand {
                skill: "B".into(),
                hours: 10.0
            },
        ]
    );
}

#[test]
fn hours_accumulate_per_occurrence() {
    let tasks = vec![
        monthly_task("Payroll", 4.0, &["Payroll"]),
        monthly_task("Bookkeeping", 2.5, &["Bookkeeping", "Payroll"]),
    ];
    let demand = calculate_monthly_demand_by_skill(&tasks, d(2025, 1, 1), d(2025, 3, 31)).unwrap();
    assert_eq!(hours_for(&demand, "Payroll"), 3.0 * 4.0 + 3.0 * 2.5);
    assert_eq!(hours_for(&demand, "Bookkeeping"), 3.0 * 2.5);
}

#[test]
fn output_follows_first_encounter_order() {
    let tasks = vec![
        monthly_task("one", 1.0, &["Tax", "Audit"]),
        monthly_task("two", 1.0, &["Advisory", "Tax"]),
    ];
    let demand = calculate_monthly_demand_by_skill(&tasks, d(2025, 1, 1), d(2025, 1, 31)).unwrap();
    let skills: Vec<&str> = demand.iter().map(|item| item.skill.as_str()).collect();
    assert_eq!(skills, vec!["Tax", "Audit", "Advisory"]);
}

#[test]
fn skills_merge_by_exact_name_only() {
    let tasks = vec![
        monthly_task("one", 1.0, &["tax"]),
        monthly_task("two", 1.0, &["Tax"]),
    ];
    let demand = calculate_monthly_demand_by_skill(&tasks, d(2025, 1, 1), d(2025, 1, 31)).unwrap();
    assert_eq!(demand.len(), 2);
}

#[test]
fn aggregation_is_deterministic() {
    let tasks: Vec<RecurringTask> = (0..50)
        .map(|i| {
            let skills = [format!("S{}", i % 7), format!("S{}", (i * 3) % 11)];
            RecurringTask::new(
                Uuid::new_v4(),
                format!("task {i}"),
                f64::from(i % 5 + 1),
                RecurrencePattern::daily(i % 9 + 1).unwrap(),
            )
            .with_skills(skills)
        })
        .collect();
    let first = calculate_monthly_demand_by_skill(&tasks, d(2025, 1, 1), d(2025, 6, 30)).unwrap();
    for _ in 0..5 {
        let again =
            calculate_monthly_demand_by_skill(&tasks, d(2025, 1, 1), d(2025, 6, 30)).unwrap();
        assert_eq!(again, first);
    }
}

#[test]
fn long_negative_custom_offset_still_adds_demand() {
    let task = RecurringTask::new(
        Uuid::new_v4(),
        "Year-end prep",
        2.0,
        RecurrencePattern::custom(-40).unwrap(),
    )
    .with_skills(["Accounts"]);
    let demand = calculate_monthly_demand_by_skill(&[task], d(2025, 1, 1), d(2025, 12, 31)).unwrap();
    assert_eq!(hours_for(&demand, "Accounts"), 24.0);
}

#[test]
fn inactive_tasks_are_ignored() {
    let mut inactive = monthly_task("dormant", 8.0, &["Tax"]);
    inactive.deactivate();
    let tasks = vec![inactive, monthly_task("live", 3.0, &["Audit"])];
    let demand = calculate_monthly_demand_by_skill(&tasks, d(2025, 1, 1), d(2025, 1, 31)).unwrap();
    assert_eq!(hours_for(&demand, "Tax"), 0.0);
    assert_eq!(hours_for(&demand, "Audit"), 3.0);
}

#[test]
fn inverted_range_is_rejected() {
    let tasks = vec![monthly_task("VAT return", 10.0, &["A"])];
    let err = calculate_monthly_demand_by_skill(&tasks, d(2025, 2, 1), d(2025, 1, 1)).unwrap_err();
    assert_eq!(
        err,
        DemandError::InvalidRange {
            start: d(2025, 2, 1),
            end: d(2025, 1, 1)
        }
    );
}

#[test]
fn matrix_splits_hours_by_month() {
    let tasks = vec![
        monthly_task("monthly", 2.0, &["Tax"]),
        RecurringTask::new(
            Uuid::new_v4(),
            "quarterly",
            5.0,
            RecurrencePattern::quarterly(10).unwrap(),
        )
        .with_skills(["Tax"]),
    ];
    let matrix =
        build_demand_matrix(&tasks, d(2025, 1, 1), d(2025, 4, 30), OccurrencePolicy::default())
            .unwrap();
    assert_eq!(
        matrix.months(),
        &[ym(2025, 1), ym(2025, 2), ym(2025, 3), ym(2025, 4)]
    );
    // Quarterly dates fall on Jan 10 and Apr 10.
    assert_eq!(matrix.hours("Tax", ym(2025, 1)), 7.0);
    assert_eq!(matrix.hours("Tax", ym(2025, 2)), 2.0);
    assert_eq!(matrix.hours("Tax", ym(2025, 4)), 7.0);
    assert_eq!(matrix.skill_total("Tax"), 18.0);
    assert_eq!(matrix.total_hours(), 18.0);

    let rows = matrix.rows();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3].month, ym(2025, 4));
}

#[test]
fn matrix_renders_as_dataframe() {
    let tasks = vec![monthly_task("VAT return", 10.0, &["A", "B"])];
    let matrix =
        build_demand_matrix(&tasks, d(2025, 1, 1), d(2025, 2, 28), OccurrencePolicy::default())
            .unwrap();
    let df = matrix.to_dataframe().unwrap();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(names, vec!["skill", "2025-01", "2025-02", "total"]);
    assert_eq!(df.height(), 2);
    let total = df.column("total").unwrap().get(0).unwrap();
    assert_eq!(total, AnyValue::Float64(20.0));
}

#[test]
fn year_month_uses_dashed_text_form() {
    assert_eq!(ym(2025, 3).to_string(), "2025-03");
    assert_eq!("2024-12".parse::<YearMonth>(), Ok(ym(2024, 12)));
    assert_eq!(ym(2024, 12).succ(), ym(2025, 1));
    assert!("2024-13".parse::<YearMonth>().is_err());
    assert_eq!(serde_json::to_value(ym(2025, 1)).unwrap(), serde_json::json!("2025-01"));
}

#[test]
fn forecaster_resolves_skill_references() {
    let source = StaticSkillSource::new(vec![
        SkillMapping::new("SK-1", "Tax"),
        SkillMapping::new("SK-2", "Audit"),
    ]);
    let mut forecaster = DemandForecaster::new(source, Duration::from_secs(60));
    let tasks = vec![
        monthly_task("one", 4.0, &["SK-1", "Tax"]),
        monthly_task("two", 1.0, &["SK-2", "Unmapped"]),
    ];
    let demand = forecaster
        .monthly_demand_by_skill(&tasks, d(2025, 1, 1), d(2025, 1, 31))
        .unwrap();
    // Both references of task one resolve to Tax, which is counted once.
    assert_eq!(hours_for(&demand, "Tax"), 4.0);
    assert_eq!(hours_for(&demand, "Audit"), 1.0);
    assert_eq!(hours_for(&demand, "Unmapped"), 1.0);
    assert_eq!(forecaster.cache().len(), 2);
}

struct BrokenSource;

impl SkillSource for BrokenSource {
    fn load_skills(&self) -> Result<Vec<SkillMapping>, SkillSourceError> {
        Err(SkillSourceError("directory offline".into()))
    }
}

#[test]
fn forecaster_falls_back_to_raw_references_when_source_fails() {
    let mut forecaster = DemandForecaster::new(BrokenSource, Duration::from_secs(60));
    let tasks = vec![monthly_task("one", 4.0, &["SK-1"])];
    let demand = forecaster
        .monthly_demand_by_skill(&tasks, d(2025, 1, 1), d(2025, 1, 31))
        .unwrap();
    assert_eq!(hours_for(&demand, "SK-1"), 4.0);
    assert!(forecaster.refresh_skills().is_err());
}
