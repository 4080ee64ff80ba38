use chrono::NaiveDate;
use practice_scheduler::{
    Priority, RecurrencePattern, RecurringTask, TaskInstance, TaskStatus,
};
use serde_json::json;
use uuid::Uuid;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn instantiate_copies_work_fields() {
    let template = Uuid::new_v4();
    let mut task = RecurringTask::new(
        Uuid::new_v4(),
        "Management accounts",
        5.0,
        RecurrencePattern::monthly(1, 10).unwrap(),
    )
    .with_skills(["Accounts", "Advisory"])
    .with_template(template);
    task.priority = Priority::Urgent;
    task.category = Some("Reporting".into());
    task.description = Some("Monthly pack".into());

    let instance = task.instantiate(d(2025, 6, 10));
    assert_ne!(instance.id, task.id);
    assert_eq!(instance.recurring_task_id, Some(task.id));
    assert_eq!(instance.template_id, Some(template));
    assert_eq!(instance.client_id, task.client_id);
    assert_eq!(instance.due_date, d(2025, 6, 10));
    assert_eq!(instance.estimated_hours, 5.0);
    assert_eq!(instance.required_skills, task.required_skills);
    assert_eq!(instance.priority, Priority::Urgent);
    assert_eq!(instance.category.as_deref(), Some("Reporting"));
    assert_eq!(instance.description.as_deref(), Some("Monthly pack"));
    assert_eq!(instance.status, TaskStatus::Unscheduled);
    assert!(!instance.is_ad_hoc());
}

#[test]
fn new_instances_are_ad_hoc() {
    let instance = TaskInstance::new(Uuid::new_v4(), "Probate query", d(2025, 2, 3));
    assert!(instance.is_ad_hoc());
    assert_eq!(instance.status, TaskStatus::Unscheduled);
}

#[test]
fn recurring_task_uses_camel_case_json() {
    let task = RecurringTask::new(
        Uuid::new_v4(),
        "Payroll",
        2.0,
        RecurrencePattern::weekly(1, vec![chrono::Weekday::Fri]).unwrap(),
    )
    .with_skills(["Payroll"]);
    let value = serde_json::to_value(&task).unwrap();
    assert_eq!(value["estimatedHours"], json!(2.0));
    assert_eq!(value["requiredSkills"], json!(["Payroll"]));
    assert_eq!(value["isActive"], json!(true));
    assert_eq!(value["recurrencePattern"]["weekdays"], json!([5]));
    assert!(value.get("lastGeneratedDate").is_none());
}

#[test]
fn missing_optional_fields_take_defaults() {
    let client = Uuid::new_v4();
    let task: RecurringTask = serde_json::from_value(json!({
        "clientId": client,
        "name": "Self assessment",
        "estimatedHours": 3.0,
        "recurrencePattern": {"type": "annually", "monthOfYear": 1, "dayOfMonth": 31}
    }))
    .unwrap();
    assert_eq!(task.client_id, client);
    assert!(task.is_active);
    assert_eq!(task.priority, Priority::Medium);
    assert_eq!(task.template_id, Uuid::nil());
    assert!(task.required_skills.is_empty());
}

#[test]
fn priority_and_status_parse_loosely() {
    assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
    assert_eq!("in_progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
    assert_eq!("canceled".parse::<TaskStatus>(), Ok(TaskStatus::Cancelled));
    assert!("someday".parse::<Priority>().is_err());
    assert_eq!(TaskStatus::InProgress.to_string(), "InProgress");
}
