use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use trellis_engine::{
    ExecutionEngine, MemoryRunStore, MemoryWorkflowStore, MockStepInvoker, RunLedger,
};
use trellis_notify::NotifierHub;
use trellis_protocols::event::NotificationType;
use trellis_protocols::store::{RunStore, WorkflowStore};
use trellis_protocols::types::{RunStatus, Trigger, WorkflowStep};

use crate::state::{AppState, StaticConnections};

use super::*;

struct Fixture {
    state: Arc<AppState>,
    invoker: Arc<MockStepInvoker>,
}

fn fixture_with_connections(connections: StaticConnections) -> Fixture {
    let invoker = Arc::new(MockStepInvoker::new());
    let run_store = Arc::new(MemoryRunStore::new());
    let notifier = NotifierHub::new();
    let engine = Arc::new(
        ExecutionEngine::new(invoker.clone())
            .with_run_store(run_store.clone())
            .with_observer(Arc::new(notifier.clone())),
    );
    let state = Arc::new(AppState::new(
        Arc::new(MemoryWorkflowStore::new()),
        run_store,
        engine,
        Arc::new(RunLedger::new()),
        notifier,
        Arc::new(connections),
    ));
    Fixture { state, invoker }
}

fn fixture() -> Fixture {
    fixture_with_connections(StaticConnections::none())
}

fn create_request(id: &str, trigger: Trigger) -> CreateWorkflowRequest {
    CreateWorkflowRequest {
        id: Some(id.to_string()),
        name: "Test Workflow".to_string(),
        description: None,
        trigger,
        steps: vec![WorkflowStep::new("s1", "Step", "agent", "do it")],
    }
}

#[tokio::test]
async fn test_create_workflow_persists_draft_and_notifies() {
    let f = fixture();
    let mut subscription = f.state.notifier.subscribe("ui");

    let response = create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);

    let stored = f.state.workflow_store.load("wf-1").await.unwrap().unwrap();
    assert!(stored.is_draft);
    assert!(!stored.is_active);

    let event = subscription.receiver.recv().await.unwrap();
    assert_eq!(event.notification_type, Some(NotificationType::Created));
    assert_eq!(event.workflow_id.as_deref(), Some("wf-1"));
}

#[tokio::test]
async fn test_create_rejects_dangling_edges() {
    let f = fixture();
    let mut request = create_request("wf-bad", Trigger::Manual);
    request.steps = vec![WorkflowStep::new("s1", "Step", "agent", "do it").on_success("ghost")];

    let response = create_workflow(State(f.state.clone()), Json(request))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(f.state.workflow_store.load("wf-bad").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_steps_bumps_version() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await;

    let response = update_workflow(
        State(f.state.clone()),
        Path("wf-1".to_string()),
        Json(UpdateWorkflowRequest {
            name: None,
            description: None,
            trigger: None,
            steps: Some(vec![
                WorkflowStep::new("s1", "Step", "agent", "do it"),
                WorkflowStep::new("s2", "Another", "agent", "do more"),
            ]),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = f.state.workflow_store.load("wf-1").await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.steps.len(), 2);
}

#[tokio::test]
async fn test_rename_does_not_bump_version() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await;

    update_workflow(
        State(f.state.clone()),
        Path("wf-1".to_string()),
        Json(UpdateWorkflowRequest {
            name: Some("Renamed".to_string()),
            description: None,
            trigger: None,
            steps: None,
        }),
    )
    .await;

    let stored = f.state.workflow_store.load("wf-1").await.unwrap().unwrap();
    assert_eq!(stored.name, "Renamed");
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn test_activate_validates_cron() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request(
            "wf-bad-cron",
            Trigger::Schedule {
                cron: "nope".to_string(),
            },
        )),
    )
    .await;

    let response = activate_workflow(State(f.state.clone()), Path("wf-bad-cron".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    create_workflow(
        State(f.state.clone()),
        Json(create_request(
            "wf-good-cron",
            Trigger::Schedule {
                cron: "0 9 * * *".to_string(),
            },
        )),
    )
    .await;

    let response = activate_workflow(State(f.state.clone()), Path("wf-good-cron".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = f
        .state
        .workflow_store
        .load("wf-good-cron")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_active);
    assert!(!stored.is_draft);
}

#[tokio::test]
async fn test_activate_app_trigger_requires_connection() {
    let app_trigger = || Trigger::App {
        app_slug: "github".to_string(),
        trigger_key: "issue_opened".to_string(),
        trigger_config: serde_json::Value::Null,
        parameters: serde_json::Value::Null,
        pass_trigger_output: false,
    };

    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-app", app_trigger())),
    )
    .await;
    let response = activate_workflow(State(f.state.clone()), Path("wf-app".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let f = fixture_with_connections(StaticConnections::with(["github"]));
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-app", app_trigger())),
    )
    .await;
    let response = activate_workflow(State(f.state.clone()), Path("wf-app".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_deactivate_notifies() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await;
    activate_workflow(State(f.state.clone()), Path("wf-1".to_string())).await;

    let mut subscription = f.state.notifier.subscribe("ui");
    let response = deactivate_workflow(State(f.state.clone()), Path("wf-1".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let event = subscription.receiver.recv().await.unwrap();
    assert_eq!(event.notification_type, Some(NotificationType::Deactivated));
}

#[tokio::test]
async fn test_manual_run_executes_and_persists() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await;

    let response = run_workflow(State(f.state.clone()), Path("wf-1".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(f.invoker.invocations().await.len(), 1);

    let runs = f.state.run_store.list_for_workflow("wf-1", 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    // The slot is free again for the next start.
    assert!(!f.state.ledger.is_running("wf-1"));
}

#[tokio::test]
async fn test_manual_run_conflicts_with_live_run() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await;

    // Simulate a scheduled run still holding the slot.
    let _slot = f.state.ledger.begin("wf-1").unwrap();
    let response = run_workflow(State(f.state.clone()), Path("wf-1".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(f.invoker.invocations().await.is_empty());
}

#[tokio::test]
async fn test_test_run_not_persisted() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await;

    let response = test_workflow(State(f.state.clone()), Path("wf-1".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(f.invoker.invocations().await.len(), 1);

    let runs = f.state.run_store.list_for_workflow("wf-1", 10).await.unwrap();
    assert!(runs.is_empty());
}

#[tokio::test]
async fn test_test_run_blocked_when_trigger_forwards_disconnected_output() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request(
            "wf-app",
            Trigger::App {
                app_slug: "github".to_string(),
                trigger_key: "issue_opened".to_string(),
                trigger_config: serde_json::Value::Null,
                parameters: serde_json::Value::Null,
                pass_trigger_output: true,
            },
        )),
    )
    .await;

    let response = test_workflow(State(f.state.clone()), Path("wf-app".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(f.invoker.invocations().await.is_empty());
}

#[tokio::test]
async fn test_app_trigger_forwards_output_to_first_step() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request(
            "wf-app",
            Trigger::App {
                app_slug: "github".to_string(),
                trigger_key: "issue_opened".to_string(),
                trigger_config: serde_json::Value::Null,
                parameters: serde_json::Value::Null,
                pass_trigger_output: true,
            },
        )),
    )
    .await;

    // Not active yet: the event is rejected.
    let response = trigger_workflow(
        State(f.state.clone()),
        Path("wf-app".to_string()),
        Json(serde_json::json!({"issue": 42})),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Activate (connection present) and deliver the event.
    let f = fixture_with_connections(StaticConnections::with(["github"]));
    create_workflow(
        State(f.state.clone()),
        Json(create_request(
            "wf-app",
            Trigger::App {
                app_slug: "github".to_string(),
                trigger_key: "issue_opened".to_string(),
                trigger_config: serde_json::Value::Null,
                parameters: serde_json::Value::Null,
                pass_trigger_output: true,
            },
        )),
    )
    .await;
    activate_workflow(State(f.state.clone()), Path("wf-app".to_string())).await;

    let response = trigger_workflow(
        State(f.state.clone()),
        Path("wf-app".to_string()),
        Json(serde_json::json!({"issue": 42})),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let invocations = f.invoker.invocations().await;
    assert_eq!(invocations.len(), 1);
    assert_eq!(
        invocations[0].context["trigger"]["issue"],
        serde_json::json!(42)
    );
}

#[tokio::test]
async fn test_cancel_run_paths() {
    let f = fixture();

    // Unknown run.
    let response = cancel_run(State(f.state.clone()), Path(Uuid::new_v4()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // A finished run is not cancellable.
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await;
    run_workflow(State(f.state.clone()), Path("wf-1".to_string())).await;
    let runs = f.state.run_store.list_for_workflow("wf-1", 1).await.unwrap();

    let response = cancel_run(State(f.state.clone()), Path(runs[0].id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_workflow_keeps_history() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await;
    run_workflow(State(f.state.clone()), Path("wf-1".to_string())).await;

    let response = delete_workflow(State(f.state.clone()), Path("wf-1".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(f.state.workflow_store.load("wf-1").await.unwrap().is_none());

    // Past execution records survive the delete.
    let runs = f.state.run_store.list_for_workflow("wf-1", 10).await.unwrap();
    assert_eq!(runs.len(), 1);
}

#[tokio::test]
async fn test_schedule_translation_endpoints() {
    let f = fixture();

    let response = schedule_to_cron(
        State(f.state.clone()),
        Json(ScheduleTranslationRequest {
            schedule: trellis_engine::LocalSchedule::weekly("00:00", vec![7]),
            timezone: Some("UTC".to_string()),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let response = schedule_from_cron(
        State(f.state.clone()),
        Json(CronTranslationRequest {
            cron: "garbage".to_string(),
            timezone: None,
        }),
    )
    .await
    .into_response();
    // Fails soft with the default schedule.
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_run_history_query_limit() {
    let f = fixture();
    create_workflow(
        State(f.state.clone()),
        Json(create_request("wf-1", Trigger::Manual)),
    )
    .await;
    for _ in 0..3 {
        run_workflow(State(f.state.clone()), Path("wf-1".to_string())).await;
    }

    let response = list_runs(
        State(f.state.clone()),
        Path("wf-1".to_string()),
        Query(RunHistoryQuery { limit: 2 }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let runs = f.state.run_store.list_for_workflow("wf-1", 2).await.unwrap();
    assert_eq!(runs.len(), 2);
}
