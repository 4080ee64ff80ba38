use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    CopyReport, DemandError, DemandForecaster, GenerationError, GenerationReport, OccurrenceError,
    PatternFields, PersistenceError, PlannerConfig, RecurrencePattern, RecurringTask, SkillDemand,
    SkillMonthlyDemand, StaticSkillSource, TaskInstance, TaskStore, copy_tasks,
    generate_task_instances, next_occurrence_from_fields,
};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn TaskStore + Send + Sync>,
    forecaster: Arc<Mutex<DemandForecaster<StaticSkillSource>>>,
    config: Arc<PlannerConfig>,
}

impl AppState {
    pub fn new<S>(store: S, skills: StaticSkillSource, config: PlannerConfig) -> Self
    where
        S: TaskStore + Send + Sync + 'static,
    {
        let forecaster = DemandForecaster::new(skills, config.skill_cache_ttl())
            .with_policy(config.occurrence_policy);
        Self {
            store: Arc::new(store),
            forecaster: Arc::new(Mutex::new(forecaster)),
            config: Arc::new(config),
        }
    }

    pub fn with_shared(
        store: Arc<dyn TaskStore + Send + Sync>,
        forecaster: Arc<Mutex<DemandForecaster<StaticSkillSource>>>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            store,
            forecaster,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::NotFound(_) => ApiError::NotFound(value.to_string()),
            PersistenceError::Conflict(_) => ApiError::Conflict(value.to_string()),
            PersistenceError::InvalidData(_) => ApiError::Invalid(value.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DemandError> for ApiError {
    fn from(value: DemandError) -> Self {
        ApiError::Invalid(value.to_string())
    }
}

impl From<GenerationError> for ApiError {
    fn from(value: GenerationError) -> Self {
        match value {
            GenerationError::Store(message) => ApiError::Internal(message),
            other => ApiError::Invalid(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextOccurrenceRequest {
    pattern: PatternFields,
    from_date: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NextOccurrenceResponse {
    next_occurrence: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct DemandQuery {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    from_date: NaiveDate,
    to_date: NaiveDate,
    #[serde(default)]
    lead_time_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyRequest {
    #[serde(default)]
    recurring_task_ids: Vec<Uuid>,
    #[serde(default)]
    task_instance_ids: Vec<Uuid>,
    target_client_id: Uuid,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/recurring-tasks",
            get(list_recurring_tasks).post(create_recurring_task),
        )
        .route(
            "/recurring-tasks/:id",
            get(get_recurring_task).put(update_recurring_task),
        )
        .route(
            "/recurring-tasks/:id/deactivate",
            post(deactivate_recurring_task),
        )
        .route(
            "/task-instances",
            get(list_task_instances).post(create_task_instance),
        )
        .route("/task-instances/:id", delete(delete_task_instance))
        .route("/patterns/validate", post(validate_pattern))
        .route("/patterns/next-occurrence", post(next_occurrence))
        .route("/demand", get(demand_by_skill))
        .route("/demand/matrix", get(demand_matrix))
        .route("/generate", post(generate))
        .route("/copy", post(copy))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "practice scheduler HTTP API listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_recurring_tasks(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecurringTask>>, ApiError> {
    Ok(Json(state.store.recurring_tasks()?))
}

async fn get_recurring_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<RecurringTask>, ApiError> {
    state
        .store
        .find_recurring_task(task_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("recurring task {task_id} not found")))
}

async fn create_recurring_task(
    State(state): State<AppState>,
    Json(task): Json<RecurringTask>,
) -> Result<(StatusCode, Json<RecurringTask>), ApiError> {
    let created = state.store.insert_recurring_task(task)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_recurring_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(mut task): Json<RecurringTask>,
) -> Result<Json<RecurringTask>, ApiError> {
    if task.id != task_id {
        return Err(ApiError::invalid(
            "task id in payload does not match path parameter",
        ));
    }
    task.touch();
    state.store.update_recurring_task(&task)?;
    Ok(Json(task))
}

async fn deactivate_recurring_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.store.deactivate_recurring_task(task_id)? {
        return Err(ApiError::not_found(format!(
            "recurring task {task_id} not found"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_task_instances(
    State(state): State<AppState>,
) -> Result<Json<Vec<TaskInstance>>, ApiError> {
    Ok(Json(state.store.task_instances()?))
}

async fn create_task_instance(
    State(state): State<AppState>,
    Json(instance): Json<TaskInstance>,
) -> Result<(StatusCode, Json<TaskInstance>), ApiError> {
    let created = state.store.insert_task_instance(instance)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_task_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.store.delete_task_instance(instance_id)? {
        return Err(ApiError::not_found(format!(
            "task instance {instance_id} not found"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn validate_pattern(Json(fields): Json<PatternFields>) -> Json<ValidationResponse> {
    let response = match RecurrencePattern::try_from(fields) {
        Ok(_) => ValidationResponse {
            valid: true,
            error: None,
        },
        Err(err) => ValidationResponse {
            valid: false,
            error: Some(err.to_string()),
        },
    };
    Json(response)
}

async fn next_occurrence(
    State(state): State<AppState>,
    Json(request): Json<NextOccurrenceRequest>,
) -> Result<Json<NextOccurrenceResponse>, ApiError> {
    let next = next_occurrence_from_fields(
        &request.pattern,
        request.from_date,
        state.config.occurrence_policy,
    )
    .map_err(|err| match err {
        OccurrenceError::InvalidPattern(_) => ApiError::invalid(err.to_string()),
        other => ApiError::Internal(other.to_string()),
    })?;
    Ok(Json(NextOccurrenceResponse {
        next_occurrence: next,
    }))
}

async fn demand_by_skill(
    State(state): State<AppState>,
    Query(query): Query<DemandQuery>,
) -> Result<Json<Vec<SkillDemand>>, ApiError> {
    let tasks = state.store.recurring_tasks()?;
    let demand = state
        .forecaster
        .lock()
        .monthly_demand_by_skill(&tasks, query.start, query.end)?;
    Ok(Json(demand))
}

async fn demand_matrix(
    State(state): State<AppState>,
    Query(query): Query<DemandQuery>,
) -> Result<Json<Vec<SkillMonthlyDemand>>, ApiError> {
    let tasks = state.store.recurring_tasks()?;
    let matrix = state
        .forecaster
        .lock()
        .demand_matrix(&tasks, query.start, query.end)?;
    Ok(Json(matrix.rows()))
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerationReport>, ApiError> {
    let lead_time_days = request
        .lead_time_days
        .unwrap_or(state.config.lead_time_days);
    let report = generate_task_instances(
        state.store.as_ref(),
        request.from_date,
        request.to_date,
        lead_time_days,
        state.config.occurrence_policy,
    )?;
    Ok(Json(report))
}

async fn copy(
    State(state): State<AppState>,
    Json(request): Json<CopyRequest>,
) -> Json<CopyReport> {
    Json(copy_tasks(
        state.store.as_ref(),
        &request.recurring_task_ids,
        &request.task_instance_ids,
        request.target_client_id,
    ))
}
