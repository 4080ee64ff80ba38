pub mod calculations;
pub mod config;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod persistence;
pub mod recurrence;
pub mod skill_cache;
pub mod task;
pub(crate) mod task_validation;

pub use calculations::bulk_copy::{CopyReport, copy_tasks};
pub use calculations::demand::{
    DemandError, DemandForecaster, DemandMatrix, SkillDemand, SkillMonthlyDemand, YearMonth,
    build_demand_matrix, calculate_monthly_demand_by_skill,
};
pub use calculations::generation::{GenerationError, GenerationReport, generate_task_instances};
pub use calculations::next_occurrence::{
    AnnualRule, DayOverflow, OccurrenceError, OccurrencePolicy, next_occurrence,
    next_occurrence_from_fields, next_occurrence_with, occurrences_between,
};
pub use calculations::{BatchError, BatchItemKind};
pub use config::{ConfigError, PlannerConfig};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteTaskStore;
pub use persistence::{
    InMemoryTaskStore, PersistenceError, TaskStore, load_recurring_tasks_from_csv,
    load_store_from_json, save_recurring_tasks_to_csv, save_store_to_json,
    validate_recurring_tasks, validate_task_instances,
};
pub use recurrence::{
    PatternError, PatternFields, RecurrenceKind, RecurrencePattern, RecurrenceRule, validate,
};
pub use skill_cache::{SkillMapping, SkillMappingCache, SkillSource, SkillSourceError, StaticSkillSource};
pub use task::{Priority, RecurringTask, TaskInstance, TaskStatus};
