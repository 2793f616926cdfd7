//! CLI command implementations.
//!
//! `worker` hosts the durable coordinators and the HTTP query/signal
//! surface; every other command is a thin `reqwest` client against that
//! surface, so an operator can run `sera review ...` from any shell on the
//! same host without embedding a durable-store connection in the CLI
//! itself.

use crate::api;
use crate::config::Config;
use crate::domain::ProcessFolderProgress;
use crate::durable::DurableStore;
use crate::state::WorkerState;
use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::json;
use std::path::PathBuf;

fn base_url(config: &Config) -> String {
    format!("http://127.0.0.1:{}", config.general.http_port)
}

pub async fn cmd_worker(
    config: Config,
    metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> Result<()> {
    let state = WorkerState::new(config.clone()).await?.with_metrics_handle(metrics_handle);
    state.resume_incomplete_runs().await?;

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.general.http_port))
        .await
        .with_context(|| format!("binding http port {}", config.general.http_port))?;

    tracing::info!(port = config.general.http_port, "worker listening");

    tokio::select! {
        result = axum::serve(listener, app) => result.context("http server exited"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}

pub async fn cmd_organize(
    config: &Config,
    path: PathBuf,
    dry_run: bool,
    confidence_threshold: Option<f32>,
) -> Result<()> {
    let body = json!({
        "sourceSeriesDir": path,
        "dryRun": dry_run,
        "confidenceThreshold": confidence_threshold,
    });

    let response = Client::new()
        .post(format!("{}/workflows", base_url(config)))
        .json(&body)
        .send()
        .await
        .context("contacting worker")?
        .error_for_status()
        .context("worker rejected organize request")?;

    let parsed: api::OrganizeResponse = response.json().await?;
    println!("workflow {}", parsed.workflow_id);
    Ok(())
}

/// Prints a workflow's stage and per-disc statuses read straight from the
/// durable store, without contacting a running worker. A worker persists
/// both fields on every transition, so this is accurate even if no worker
/// process is currently up (§E: "no HTTP round trip needed when run
/// in-process against the same store").
pub async fn cmd_status(config: &Config, workflow_id: &str) -> Result<()> {
    let store = DurableStore::new(&config.general.database_path).await?;

    let stage = store
        .get_workflow_stage(workflow_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("unknown workflow {workflow_id}"))?;
    let disc_statuses = store.list_disc_statuses(workflow_id).await?;
    let error = store.get_workflow_error(workflow_id).await?;

    println!("workflow {workflow_id}: {stage:?}");
    if let Some(error) = error {
        println!("error: {error}");
    }
    for (folder, status) in disc_statuses {
        println!("  {folder}: {status:?}");
    }
    Ok(())
}

async fn finalize(config: &Config, workflow_id: &str, approved: bool) -> Result<()> {
    let response = Client::new()
        .post(format!("{}/workflows/{workflow_id}/finalize", base_url(config)))
        .json(&json!({ "approved": approved }))
        .send()
        .await
        .context("contacting worker")?;

    if !response.status().is_success() {
        bail!("worker rejected finalize signal: {}", response.status());
    }
    Ok(())
}

pub async fn cmd_approve(config: &Config, workflow_id: &str) -> Result<()> {
    finalize(config, workflow_id, true).await
}

pub async fn cmd_reject(config: &Config, workflow_id: &str) -> Result<()> {
    finalize(config, workflow_id, false).await
}

pub async fn cmd_review(
    config: &Config,
    workflow_id: &str,
    review_item_id: &str,
    approved: bool,
    season: Option<i32>,
    episode: Option<i32>,
) -> Result<()> {
    let body = json!({
        "approved": approved,
        "correctedSeason": season,
        "correctedEpisode": episode,
    });

    let response = Client::new()
        .post(format!("{}/workflows/{workflow_id}/reviews/{review_item_id}", base_url(config)))
        .json(&body)
        .send()
        .await
        .context("contacting worker")?;

    if !response.status().is_success() {
        bail!("worker rejected review decision: {}", response.status());
    }
    Ok(())
}

pub async fn cmd_confirm_detection(
    config: &Config,
    workflow_id: &str,
    folder: &str,
    confirmed: bool,
    add: Vec<String>,
    remove: Vec<String>,
) -> Result<()> {
    let body = json!({
        "confirmed": confirmed,
        "addedPaths": add,
        "removedPaths": remove,
    });

    let response = Client::new()
        .post(format!("{}/workflows/{workflow_id}/discs/{folder}/detection", base_url(config)))
        .json(&body)
        .send()
        .await
        .context("contacting worker")?;

    if !response.status().is_success() {
        bail!("worker rejected detection confirmation: {}", response.status());
    }
    Ok(())
}

/// Reads a single disc's progress directly, mostly useful while debugging a
/// stuck folder.
async fn fetch_disc_progress(config: &Config, workflow_id: &str, folder: &str) -> Result<ProcessFolderProgress> {
    let response = Client::new()
        .get(format!("{}/workflows/{workflow_id}/discs/{folder}/progress", base_url(config)))
        .send()
        .await
        .context("contacting worker")?
        .error_for_status()?;
    Ok(response.json().await?)
}

pub async fn cmd_disc_status(config: &Config, workflow_id: &str, folder: &str) -> Result<()> {
    let progress = fetch_disc_progress(config, workflow_id, folder).await?;
    println!("{}", serde_json::to_string_pretty(&progress)?);
    Ok(())
}
