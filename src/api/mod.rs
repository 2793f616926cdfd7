//! HTTP query/signal surface (§4.5): the three queries (library progress,
//! staging tree, disc progress) and three signals (finalize, review
//! decision, detection confirmation) a human operator or CLI client uses to
//! drive a running workflow.

mod error;
mod types;

pub use error::ApiError;
pub use types::*;

use crate::constants::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::domain::{DetectionConfirmation, FinalizeDecision, ReviewDecision};
use crate::state::WorkerState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

/// Builds the axum router a `worker` process serves.
#[must_use]
pub fn router(state: WorkerState) -> Router {
    Router::new()
        .route("/workflows", post(organize))
        .route("/workflows/{id}/progress", get(get_progress))
        .route("/workflows/{id}/staging-tree", get(get_staging_tree))
        .route("/workflows/{id}/discs/{folder}/progress", get(get_disc_progress))
        .route("/workflows/{id}/finalize", post(finalize))
        .route("/workflows/{id}/reviews/{review_item_id}", post(review_decision))
        .route("/workflows/{id}/discs/{folder}/detection", post(detection_confirmation))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_metrics(State(state): State<WorkerState>) -> String {
    state.metrics_handle.as_ref().map_or_else(
        || "metrics not enabled\n".to_string(),
        metrics_exporter_prometheus::PrometheusHandle::render,
    )
}

async fn organize(
    State(state): State<WorkerState>,
    Json(req): Json<OrganizeRequest>,
) -> Result<Json<OrganizeResponse>, ApiError> {
    let workflow_id = state
        .enqueue_library_run(
            req.source_series_dir,
            req.dry_run,
            req.confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
        )
        .await?;
    Ok(Json(OrganizeResponse { workflow_id }))
}

async fn get_progress(
    State(state): State<WorkerState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<crate::domain::OrganizeLibraryProgress>, ApiError> {
    state
        .get_progress(&workflow_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("unknown workflow {workflow_id}")))
}

async fn get_staging_tree(
    State(state): State<WorkerState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<Vec<crate::domain::TreeNode>>, ApiError> {
    let progress = state
        .get_progress(&workflow_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown workflow {workflow_id}")))?;
    Ok(Json(progress.staging_tree.unwrap_or_default()))
}

async fn get_disc_progress(
    State(state): State<WorkerState>,
    Path((workflow_id, folder)): Path<(String, String)>,
) -> Result<Json<crate::domain::ProcessFolderProgress>, ApiError> {
    state
        .get_disc_progress(&workflow_id, &folder)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("unknown disc {folder} in workflow {workflow_id}")))
}

async fn finalize(
    State(state): State<WorkerState>,
    Path(workflow_id): Path<String>,
    Json(req): Json<FinalizeRequest>,
) -> Result<(), ApiError> {
    state
        .store
        .emit_signal(&workflow_id, "finalize", &FinalizeDecision { approved: req.approved })
        .await?;
    Ok(())
}

async fn review_decision(
    State(state): State<WorkerState>,
    Path((workflow_id, review_item_id)): Path<(String, String)>,
    Json(req): Json<ReviewDecisionRequest>,
) -> Result<(), ApiError> {
    let decision = ReviewDecision {
        review_item_id: review_item_id.clone(),
        approved: req.approved,
        corrected_season: req.corrected_season,
        corrected_episode: req.corrected_episode,
    };
    state
        .store
        .emit_signal(&workflow_id, &crate::coordinator::review_signal_key(&review_item_id), &decision)
        .await?;
    Ok(())
}

async fn detection_confirmation(
    State(state): State<WorkerState>,
    Path((workflow_id, folder)): Path<(String, String)>,
    Json(req): Json<DetectionConfirmationRequest>,
) -> Result<(), ApiError> {
    let confirmation = DetectionConfirmation {
        confirmed: req.confirmed,
        added_paths: req.added_paths,
        removed_paths: req.removed_paths,
    };
    state
        .store
        .emit_signal(&workflow_id, &crate::coordinator::detection_signal_key(&folder), &confirmation)
        .await?;
    Ok(())
}
