use chrono::NaiveDate;
use practice_scheduler::calculations::generation::instances_for_task;
use practice_scheduler::{
    BatchItemKind, GenerationError, InMemoryTaskStore, OccurrencePolicy, PersistenceError,
    RecurrencePattern, RecurringTask, TaskInstance, TaskStatus, TaskStore,
    generate_task_instances, persistence::PersistenceResult,
};
use uuid::Uuid;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn monthly_task(name: &str, day: u32) -> RecurringTask {
    RecurringTask::new(
        Uuid::new_v4(),
        name,
        3.5,
        RecurrencePattern::monthly(1, day).unwrap(),
    )
    .with_skills(["Bookkeeping"])
}

fn store_with(tasks: Vec<RecurringTask>) -> InMemoryTaskStore {
    let store = InMemoryTaskStore::new();
    for task in tasks {
        store.insert_recurring_task(task).unwrap();
    }
    store
}

#[test]
fn inverted_range_fails_without_creating_instances() {
    let store = store_with(vec![monthly_task("Payroll", 15)]);
    let result = generate_task_instances(
        &store,
        d(2025, 2, 1),
        d(2025, 1, 1),
        14,
        OccurrencePolicy::default(),
    );
    assert_eq!(
        result.unwrap_err(),
        GenerationError::InvalidDateRange {
            from: d(2025, 2, 1),
            to: d(2025, 1, 1)
        }
    );
    assert!(store.task_instances().unwrap().is_empty());
}

#[test]
fn negative_lead_time_is_rejected() {
    let store = store_with(vec![monthly_task("Payroll", 15)]);
    let result = generate_task_instances(
        &store,
        d(2025, 1, 1),
        d(2025, 1, 31),
        -1,
        OccurrencePolicy::default(),
    );
    assert_eq!(result.unwrap_err(), GenerationError::NegativeLeadTime(-1));
}

#[test]
fn generates_instance_and_records_last_generated_date() {
    let task = monthly_task("Payroll", 15);
    let task_id = task.id;
    let store = store_with(vec![task]);

    let report = generate_task_instances(
        &store,
        d(2025, 1, 1),
        d(2025, 1, 31),
        14,
        OccurrencePolicy::default(),
    )
    .unwrap();
    assert_eq!(report.generated.len(), 1);
    assert!(report.errors.is_empty());

    let instance = &report.generated[0];
    assert_eq!(instance.due_date, d(2025, 1, 15));
    assert_eq!(instance.recurring_task_id, Some(task_id));
    assert_eq!(instance.name, "Payroll");
    assert_eq!(instance.estimated_hours, 3.5);
    assert_eq!(instance.required_skills, vec!["Bookkeeping".to_string()]);
    assert_eq!(instance.status, TaskStatus::Unscheduled);

    let stored = store.find_recurring_task(task_id).unwrap().unwrap();
    assert_eq!(stored.last_generated_date, Some(d(2025, 1, 15)));
    assert_eq!(instances_for_task(&store, task_id).unwrap().len(), 1);
}

#[test]
fn second_run_continues_after_last_generated_date() {
    let store = store_with(vec![monthly_task("Payroll", 15)]);
    let policy = OccurrencePolicy::default();

    generate_task_instances(&store, d(2025, 1, 1), d(2025, 1, 31), 14, policy).unwrap();
    let again = generate_task_instances(&store, d(2025, 1, 1), d(2025, 1, 31), 14, policy).unwrap();
    assert!(again.generated.is_empty());
    assert_eq!(again.skipped, 1);

    let february = generate_task_instances(&store, d(2025, 2, 1), d(2025, 2, 28), 14, policy).unwrap();
    assert_eq!(february.generated.len(), 1);
    assert_eq!(february.generated[0].due_date, d(2025, 2, 15));
    assert_eq!(store.task_instances().unwrap().len(), 2);
}

#[test]
fn lead_time_pulls_occurrences_into_the_window() {
    let policy = OccurrencePolicy::default();

    let store = store_with(vec![monthly_task("Accounts", 20)]);
    let without_lead = generate_task_instances(&store, d(2025, 1, 1), d(2025, 1, 10), 0, policy).unwrap();
    assert!(without_lead.generated.is_empty());

    let with_lead = generate_task_instances(&store, d(2025, 1, 1), d(2025, 1, 10), 14, policy).unwrap();
    assert_eq!(with_lead.generated.len(), 1);
    assert_eq!(with_lead.generated[0].due_date, d(2025, 1, 20));
}

#[test]
fn inactive_tasks_are_not_generated() {
    let mut task = monthly_task("Dormant", 15);
    task.deactivate();
    let store = store_with(vec![task]);
    let report = generate_task_instances(
        &store,
        d(2025, 1, 1),
        d(2025, 1, 31),
        14,
        OccurrencePolicy::default(),
    )
    .unwrap();
    assert!(report.generated.is_empty());
    assert_eq!(report.skipped, 0);
}

/// Store that refuses instances for one recurring task.
struct RefusingStore {
    inner: InMemoryTaskStore,
    refused: Uuid,
}

impl TaskStore for RefusingStore {
    fn recurring_tasks(&self) -> PersistenceResult<Vec<RecurringTask>> {
        self.inner.recurring_tasks()
    }

    fn find_recurring_task(&self, id: Uuid) -> PersistenceResult<Option<RecurringTask>> {
        self.inner.find_recurring_task(id)
    }

    fn insert_recurring_task(&self, task: RecurringTask) -> PersistenceResult<RecurringTask> {
        self.inner.insert_recurring_task(task)
    }

    fn update_recurring_task(&self, task: &RecurringTask) -> PersistenceResult<()> {
        self.inner.update_recurring_task(task)
    }

    fn task_instances(&self) -> PersistenceResult<Vec<TaskInstance>> {
        self.inner.task_instances()
    }

    fn find_task_instance(&self, id: Uuid) -> PersistenceResult<Option<TaskInstance>> {
        self.inner.find_task_instance(id)
    }

    fn insert_task_instance(&self, instance: TaskInstance) -> PersistenceResult<TaskInstance> {
        if instance.recurring_task_id == Some(self.refused) {
            return Err(PersistenceError::InvalidData("write rejected".into()));
        }
        self.inner.insert_task_instance(instance)
    }

    fn delete_task_instance(&self, id: Uuid) -> PersistenceResult<bool> {
        self.inner.delete_task_instance(id)
    }
}

#[test]
fn failing_task_does_not_stop_the_batch() {
    let good = monthly_task("Payroll", 15);
    let bad = monthly_task("VAT", 20);
    let bad_id = bad.id;
    let store = RefusingStore {
        inner: store_with(vec![bad, good]),
        refused: bad_id,
    };

    let report = generate_task_instances(
        &store,
        d(2025, 1, 1),
        d(2025, 1, 31),
        14,
        OccurrencePolicy::default(),
    )
    .unwrap();
    assert_eq!(report.generated.len(), 1);
    assert_eq!(report.generated[0].name, "Payroll");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].item_id, bad_id);
    assert_eq!(report.errors[0].kind, BatchItemKind::RecurringTask);
    assert_eq!(report.to_cli_summary(), "generated=1, skipped=0, errors=1");

    let untouched = store.find_recurring_task(bad_id).unwrap().unwrap();
    assert_eq!(untouched.last_generated_date, None);
}

fn run(store: &InMemoryTaskStore, from: NaiveDate, to: NaiveDate, lead: i64) -> Vec<NaiveDate> {
    generate_task_instances(store, from, to, lead, OccurrencePolicy::default())
        .unwrap()
        .generated
        .iter()
        .map(|instance| instance.due_date)
        .collect()
}

#[test]
fn month_end_custom_task_is_generated_once_per_due_date() {
    let task = RecurringTask::new(
        Uuid::new_v4(),
        "Month-end close",
        2.0,
        RecurrencePattern::custom(0).unwrap(),
    );
    let store = store_with(vec![task]);

    assert_eq!(run(&store, d(2025, 1, 17), d(2025, 1, 17), 14), vec![d(2025, 1, 31)]);
    assert!(run(&store, d(2025, 1, 17), d(2025, 1, 17), 14).is_empty());
    assert!(run(&store, d(2025, 1, 17), d(2025, 1, 17), 14).is_empty());
    assert_eq!(store.task_instances().unwrap().len(), 1);

    assert_eq!(run(&store, d(2025, 2, 1), d(2025, 2, 28), 14), vec![d(2025, 2, 28)]);
}

#[test]
fn legacy_annual_task_is_not_duplicated_on_rerun() {
    let task = RecurringTask::new(
        Uuid::new_v4(),
        "Corporation tax",
        6.0,
        RecurrencePattern::annually(3, 15).unwrap(),
    );
    let store = store_with(vec![task]);

    for _ in 0..3 {
        run(&store, d(2025, 3, 1), d(2025, 3, 1), 14);
    }
    let dues: Vec<NaiveDate> = store
        .task_instances()
        .unwrap()
        .iter()
        .map(|instance| instance.due_date)
        .collect();
    assert_eq!(dues, vec![d(2025, 3, 15)]);
}

#[test]
fn stale_last_generated_date_catches_up_to_the_window() {
    let mut task = monthly_task("Payroll", 15);
    task.last_generated_date = Some(d(2024, 6, 15));
    let task_id = task.id;
    let store = store_with(vec![task]);

    let report = generate_task_instances(
        &store,
        d(2025, 1, 1),
        d(2025, 1, 31),
        14,
        OccurrencePolicy::default(),
    )
    .unwrap();
    assert_eq!(report.skipped, 0);
    assert_eq!(report.generated.len(), 1);
    assert_eq!(report.generated[0].due_date, d(2025, 1, 15));
    let stored = store.find_recurring_task(task_id).unwrap().unwrap();
    assert_eq!(stored.last_generated_date, Some(d(2025, 1, 15)));
}

#[test]
fn interval_keeps_its_phase_across_windows() {
    let mut task = RecurringTask::new(
        Uuid::new_v4(),
        "Bi-monthly review",
        1.0,
        RecurrencePattern::monthly(2, 15).unwrap(),
    );
    task.last_generated_date = Some(d(2025, 1, 15));
    let store = store_with(vec![task]);

    assert!(run(&store, d(2025, 2, 1), d(2025, 2, 28), 14).is_empty());
    assert_eq!(run(&store, d(2025, 3, 1), d(2025, 3, 31), 14), vec![d(2025, 3, 15)]);
}

#[test]
fn unrepresentable_lead_time_is_reported_as_out_of_range() {
    let store = store_with(vec![monthly_task("Payroll", 15)]);
    let result = generate_task_instances(
        &store,
        d(2025, 1, 1),
        d(2025, 1, 31),
        i64::MAX,
        OccurrencePolicy::default(),
    );
    assert_eq!(result.unwrap_err(), GenerationError::LeadTimeOutOfRange(i64::MAX));
    assert!(store.task_instances().unwrap().is_empty());
}
