//! Workflow HTTP route handlers.
//!
//! - POST   /api/workflows                  - Create workflow (draft)
//! - GET    /api/workflows                  - List workflows
//! - GET    /api/workflows/{id}             - Get workflow
//! - PUT    /api/workflows/{id}             - Update workflow (bumps version)
//! - DELETE /api/workflows/{id}             - Delete workflow
//! - POST   /api/workflows/{id}/activate    - Activate
//! - POST   /api/workflows/{id}/deactivate  - Deactivate
//! - POST   /api/workflows/{id}/run         - Run now (live)
//! - POST   /api/workflows/{id}/trigger     - App-event trigger ingestion
//! - POST   /api/workflows/{id}/test        - Test run (not persisted)
//! - GET    /api/workflows/{id}/runs        - Run history
//! - GET    /api/runs/{run_id}              - Get one run
//! - POST   /api/runs/{run_id}/cancel       - Cancel a live run
//! - POST   /api/schedule/to-cron           - Local schedule -> UTC cron
//! - POST   /api/schedule/from-cron         - UTC cron -> local schedule

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use trellis_engine::schedule::{self, LocalSchedule};
use trellis_engine::RunMode;
use trellis_protocols::error::DefinitionError;
use trellis_protocols::event::{NotificationType, StreamEvent};
use trellis_protocols::types::{Trigger, WorkflowDefinition, WorkflowRun, WorkflowStep};

use crate::sse::events_handler;
use crate::state::AppState;

/// Build the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/workflows", post(create_workflow).get(list_workflows))
        .route(
            "/api/workflows/{id}",
            get(get_workflow)
                .put(update_workflow)
                .delete(delete_workflow),
        )
        .route("/api/workflows/{id}/activate", post(activate_workflow))
        .route("/api/workflows/{id}/deactivate", post(deactivate_workflow))
        .route("/api/workflows/{id}/run", post(run_workflow))
        .route("/api/workflows/{id}/trigger", post(trigger_workflow))
        .route("/api/workflows/{id}/test", post(test_workflow))
        .route("/api/workflows/{id}/runs", get(list_runs))
        .route("/api/runs/{run_id}", get(get_run))
        .route("/api/runs/{run_id}/cancel", post(cancel_run))
        .route("/api/schedule/to-cron", post(schedule_to_cron))
        .route("/api/schedule/from-cron", post(schedule_from_cron))
        .route("/api/workflows/events", get(events_handler))
        .with_state(state)
}

/// Request to create a workflow.
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub trigger: Trigger,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

/// Request to update a workflow. Omitted fields keep their value.
#[derive(Debug, Deserialize)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub trigger: Option<Trigger>,
    pub steps: Option<Vec<WorkflowStep>>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowListResponse {
    pub count: usize,
    pub workflows: Vec<WorkflowDefinition>,
}

#[derive(Debug, Serialize)]
pub struct RunListResponse {
    pub count: usize,
    pub runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
pub struct RunHistoryQuery {
    #[serde(default = "default_run_limit")]
    pub limit: usize,
}

fn default_run_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct ScheduleTranslationRequest {
    #[serde(flatten)]
    pub schedule: LocalSchedule,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CronTranslationRequest {
    pub cron: String,
    pub timezone: Option<String>,
}

fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": message.into() }))
}

/// Create a new workflow in draft state.
///
/// POST /api/workflows
pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateWorkflowRequest>,
) -> impl IntoResponse {
    let id = request
        .id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!("creating workflow {} ({})", id, request.name);

    let mut definition = WorkflowDefinition::new(id, request.name, request.trigger)
        .with_steps(request.steps);
    definition.description = request.description;

    if let Err(e) = definition.validate() {
        return (StatusCode::UNPROCESSABLE_ENTITY, error_body(e.to_string())).into_response();
    }

    if let Err(e) = state.workflow_store.save(&definition).await {
        error!("failed to save workflow: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response();
    }

    state
        .notifier
        .publish(StreamEvent::status(&definition.id, NotificationType::Created));
    (StatusCode::CREATED, Json(definition)).into_response()
}

/// List all workflows.
///
/// GET /api/workflows
pub async fn list_workflows(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.workflow_store.load_all().await {
        Ok(workflows) => Json(WorkflowListResponse {
            count: workflows.len(),
            workflows,
        })
        .into_response(),
        Err(e) => {
            error!("failed to list workflows: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response()
        }
    }
}

/// Get one workflow.
///
/// GET /api/workflows/{id}
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.workflow_store.load(&id).await {
        Ok(Some(definition)) => Json(definition).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, error_body("workflow not found")).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response(),
    }
}

/// Update a workflow. Changing steps or trigger bumps the version.
///
/// PUT /api/workflows/{id}
pub async fn update_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateWorkflowRequest>,
) -> impl IntoResponse {
    let mut definition = match state.workflow_store.load(&id).await {
        Ok(Some(definition)) => definition,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, error_body("workflow not found")).into_response()
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
                .into_response()
        }
    };

    if let Some(name) = request.name {
        definition.name = name;
    }
    if let Some(description) = request.description {
        definition.description = Some(description);
    }
    let versioned_change = request.trigger.is_some() || request.steps.is_some();
    if let Some(trigger) = request.trigger {
        definition.trigger = trigger;
    }
    if let Some(steps) = request.steps {
        definition.steps = steps;
    }

    if let Err(e) = definition.validate() {
        return (StatusCode::UNPROCESSABLE_ENTITY, error_body(e.to_string())).into_response();
    }
    if versioned_change {
        definition.touch();
        info!("workflow {} updated to version {}", id, definition.version);
    }

    if let Err(e) = state.workflow_store.save(&definition).await {
        error!("failed to save workflow {}: {}", id, e);
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response();
    }

    state
        .notifier
        .publish(StreamEvent::status(&id, NotificationType::Updated));
    Json(definition).into_response()
}

/// Delete a workflow. Run history is retained.
///
/// DELETE /api/workflows/{id}
pub async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.workflow_store.delete(&id).await {
        Ok(true) => {
            info!("workflow {} deleted", id);
            state
                .notifier
                .publish(StreamEvent::status(&id, NotificationType::Deleted));
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, error_body("workflow not found")).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response(),
    }
}

/// Validate trigger configuration for activation.
async fn check_activation(
    state: &AppState,
    definition: &WorkflowDefinition,
) -> Result<(), (StatusCode, String)> {
    definition
        .validate_for_activation()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    match &definition.trigger {
        Trigger::Schedule { cron } => schedule::validate_cron(cron)
            .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
        Trigger::App { app_slug, .. } => {
            if state.connections.is_connected(app_slug).await {
                Ok(())
            } else {
                let e = DefinitionError::IntegrationNotConnected(app_slug.clone());
                Err((StatusCode::CONFLICT, e.to_string()))
            }
        }
        Trigger::Manual => Ok(()),
    }
}

/// Activate a workflow so it becomes eligible for automatic triggering.
///
/// POST /api/workflows/{id}/activate
pub async fn activate_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut definition = match state.workflow_store.load(&id).await {
        Ok(Some(definition)) => definition,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, error_body("workflow not found")).into_response()
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
                .into_response()
        }
    };

    if let Err((status, message)) = check_activation(&state, &definition).await {
        warn!("refusing to activate workflow {}: {}", id, message);
        return (status, error_body(message)).into_response();
    }

    definition.is_active = true;
    definition.is_draft = false;
    if let Err(e) = state.workflow_store.save(&definition).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response();
    }

    info!("workflow {} activated", id);
    state
        .notifier
        .publish(StreamEvent::status(&id, NotificationType::Activated));
    Json(definition).into_response()
}

/// Deactivate a workflow; it drops out of the scheduler's due-set on the
/// next tick.
///
/// POST /api/workflows/{id}/deactivate
pub async fn deactivate_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut definition = match state.workflow_store.load(&id).await {
        Ok(Some(definition)) => definition,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, error_body("workflow not found")).into_response()
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
                .into_response()
        }
    };

    definition.is_active = false;
    if let Err(e) = state.workflow_store.save(&definition).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response();
    }

    info!("workflow {} deactivated", id);
    state
        .notifier
        .publish(StreamEvent::status(&id, NotificationType::Deactivated));
    Json(definition).into_response()
}

/// Start a live run now and return the finished run record.
///
/// POST /api/workflows/{id}/run
pub async fn run_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let definition = match state.workflow_store.load(&id).await {
        Ok(Some(definition)) => definition,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, error_body("workflow not found")).into_response()
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
                .into_response()
        }
    };

    // Manual runs share the overlap ledger with scheduled runs.
    let Some(token) = state.ledger.begin(&id) else {
        return (
            StatusCode::CONFLICT,
            error_body("workflow already has a live run"),
        )
            .into_response();
    };

    let result = state
        .engine
        .execute(&definition, RunMode::Live, None, token)
        .await;
    state.ledger.finish(&id);

    match result {
        Ok(run) => Json(run).into_response(),
        Err(e) => {
            error!("manual run of workflow {} could not execute: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response()
        }
    }
}

/// App-event trigger ingestion: the integration layer posts the trigger's
/// output here to start a live run.
///
/// POST /api/workflows/{id}/trigger
pub async fn trigger_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let definition = match state.workflow_store.load(&id).await {
        Ok(Some(definition)) => definition,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, error_body("workflow not found")).into_response()
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
                .into_response()
        }
    };

    if !definition.is_active {
        return (
            StatusCode::CONFLICT,
            error_body("workflow is not active"),
        )
            .into_response();
    }
    let Trigger::App {
        pass_trigger_output,
        ..
    } = &definition.trigger
    else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            error_body("workflow does not have an app trigger"),
        )
            .into_response();
    };
    let trigger_output = pass_trigger_output.then_some(payload);

    let Some(token) = state.ledger.begin(&id) else {
        return (
            StatusCode::CONFLICT,
            error_body("workflow already has a live run"),
        )
            .into_response();
    };

    let result = state
        .engine
        .execute(&definition, RunMode::Live, trigger_output, token)
        .await;
    state.ledger.finish(&id);

    match result {
        Ok(run) => Json(run).into_response(),
        Err(e) => {
            error!("triggered run of workflow {} could not execute: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response()
        }
    }
}

/// Run a workflow in test mode: ad hoc, results surfaced directly, nothing
/// persisted as history.
///
/// POST /api/workflows/{id}/test
pub async fn test_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let definition = match state.workflow_store.load(&id).await {
        Ok(Some(definition)) => definition,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, error_body("workflow not found")).into_response()
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
                .into_response()
        }
    };

    // A test run cannot synthesize trigger output, so a trigger configured
    // to forward it into the first step requires the integration to be
    // connected.
    if let Trigger::App {
        app_slug,
        pass_trigger_output: true,
        ..
    } = &definition.trigger
    {
        if !state.connections.is_connected(app_slug).await {
            return (
                StatusCode::CONFLICT,
                error_body(format!(
                    "cannot test: integration {app_slug} is not connected and the trigger forwards its output"
                )),
            )
                .into_response();
        }
    }

    match state
        .engine
        .execute(
            &definition,
            RunMode::Test,
            None,
            CancellationToken::new(),
        )
        .await
    {
        Ok(run) => Json(run).into_response(),
        Err(e) => {
            error!("test run of workflow {} could not execute: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response()
        }
    }
}

/// Run history for a workflow, newest first.
///
/// GET /api/workflows/{id}/runs
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RunHistoryQuery>,
) -> impl IntoResponse {
    match state.run_store.list_for_workflow(&id, query.limit).await {
        Ok(runs) => Json(RunListResponse {
            count: runs.len(),
            runs,
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response(),
    }
}

/// Get one run record.
///
/// GET /api/runs/{run_id}
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.run_store.load(&run_id).await {
        Ok(Some(run)) => Json(run).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, error_body("run not found")).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response(),
    }
}

/// Request cancellation of a live run. The engine honors it between steps.
///
/// POST /api/runs/{run_id}/cancel
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> impl IntoResponse {
    let run = match state.run_store.load(&run_id).await {
        Ok(Some(run)) => run,
        Ok(None) => return (StatusCode::NOT_FOUND, error_body("run not found")).into_response(),
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
                .into_response()
        }
    };

    if state.ledger.cancel(&run.workflow_id) {
        info!("cancellation requested for run {}", run_id);
        Json(serde_json::json!({ "status": "cancelling" })).into_response()
    } else {
        (
            StatusCode::CONFLICT,
            error_body("run is not currently executing"),
        )
            .into_response()
    }
}

/// Translate a local schedule to a UTC cron expression.
///
/// POST /api/schedule/to-cron
pub async fn schedule_to_cron(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScheduleTranslationRequest>,
) -> impl IntoResponse {
    let timezone = request
        .timezone
        .unwrap_or_else(|| state.default_timezone.clone());
    match schedule::to_cron(&request.schedule, &timezone) {
        Ok(cron) => Json(serde_json::json!({ "cron": cron })).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, error_body(e.to_string())).into_response(),
    }
}

/// Interpret a UTC cron expression in the caller's timezone. Fails soft.
///
/// POST /api/schedule/from-cron
pub async fn schedule_from_cron(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CronTranslationRequest>,
) -> impl IntoResponse {
    let timezone = request
        .timezone
        .unwrap_or_else(|| state.default_timezone.clone());
    Json(schedule::from_cron(&request.cron, &timezone)).into_response()
}
