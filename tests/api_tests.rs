//! Exercises the HTTP query/signal surface against an in-memory durable
//! store, the way a worker process serves it (§4.5).

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use sera::config::Config;
use sera::state::WorkerState;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();

    let state = WorkerState::new(config).await.expect("failed to build worker state");
    sera::api::router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn organize_then_status_round_trips_a_workflow_id() {
    let app = spawn_app().await;

    let organize_body = json!({
        "sourceSeriesDir": "/tmp/does-not-need-to-exist-yet",
        "dryRun": true,
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/workflows")
                .header("content-type", "application/json")
                .body(Body::from(organize_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = body_json(response).await;
    let workflow_id = parsed["workflowId"].as_str().expect("workflowId present").to_string();
    assert!(!workflow_id.is_empty());

    let response = app
        .clone()
        .oneshot(Request::builder().uri(format!("/workflows/{workflow_id}/progress")).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let progress = body_json(response).await;
    assert_eq!(progress["stage"], "copying");
    assert_eq!(progress["totalFolders"], 0);
}

#[tokio::test]
async fn status_for_unknown_workflow_is_not_found() {
    let app = spawn_app().await;

    let response = app
        .oneshot(Request::builder().uri("/workflows/does-not-exist/progress").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disc_progress_for_unknown_disc_is_not_found() {
    let app = spawn_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/workflows/does-not-exist/discs/Disc%2001/progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn finalize_signal_is_accepted_for_a_known_workflow() {
    let app = spawn_app().await;

    let organize_body = json!({ "sourceSeriesDir": "/tmp/another-run", "dryRun": true });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/workflows")
                .header("content-type", "application/json")
                .body(Body::from(organize_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let parsed = body_json(response).await;
    let workflow_id = parsed["workflowId"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/workflows/{workflow_id}/finalize"))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "approved": true }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
