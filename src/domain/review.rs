//! Human-in-the-loop review types (§3, §4.3, §4.5).

use super::matching::EpisodeMatch;
use serde::{Deserialize, Serialize};

/// A pending episode assignment awaiting manual confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub suggested_season: i32,
    pub suggested_episode: i32,
    pub confidence: f32,
    pub reasoning: String,
    pub dialogue_snippet: String,
    pub available_seasons: Vec<i32>,
    pub available_episodes: Vec<i32>,
}

impl ReviewItem {
    /// Builds a review item id as `"<folder>-<file>"`, per §3.
    #[must_use]
    pub fn make_id(folder_name: &str, file_name: &str) -> String {
        format!("{folder_name}-{file_name}")
    }

    #[must_use]
    pub fn from_match(
        folder_name: &str,
        m: &EpisodeMatch,
        dialogue: &str,
        available_seasons: Vec<i32>,
        available_episodes: Vec<i32>,
    ) -> Self {
        const SNIPPET_LEN: usize = 500;
        let snippet: String = dialogue.chars().take(SNIPPET_LEN).collect();
        Self {
            id: Self::make_id(folder_name, &m.file_name),
            file_name: m.file_name.clone(),
            file_path: m.file_path.to_string_lossy().to_string(),
            suggested_season: m.season_number,
            suggested_episode: m.episode_number,
            confidence: m.confidence,
            reasoning: m.reasoning.clone(),
            dialogue_snippet: snippet,
            available_seasons,
            available_episodes,
        }
    }
}

/// An operator's decision on a `ReviewItem`.
///
/// Per §3: a decision is not "settled" until `approved == true`; a
/// rejecting decision is discarded so the operator may resubmit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    pub review_item_id: String,
    pub approved: bool,
    pub corrected_season: Option<i32>,
    pub corrected_episode: Option<i32>,
}

/// An operator's confirmation (or correction) of an episode-cluster
/// detection, per §3 and §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfirmation {
    pub confirmed: bool,
    #[serde(default)]
    pub added_paths: Vec<String>,
    #[serde(default)]
    pub removed_paths: Vec<String>,
}

/// An operator's approval (or rejection) of the staged, finalize-ready
/// layout, per §3 and Stage 5.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeDecision {
    pub approved: bool,
}
