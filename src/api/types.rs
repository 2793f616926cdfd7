//! Wire DTOs for the query/signal surface (§4.5).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizeRequest {
    pub source_series_dir: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    pub confidence_threshold: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizeResponse {
    pub workflow_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecisionRequest {
    pub approved: bool,
    pub corrected_season: Option<i32>,
    pub corrected_episode: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfirmationRequest {
    pub confirmed: bool,
    #[serde(default)]
    pub added_paths: Vec<String>,
    #[serde(default)]
    pub removed_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
}
