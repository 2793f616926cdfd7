//! LLM episode-matching results (§3 "Episode match").

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMatch {
    pub file_name: String,
    pub file_path: PathBuf,
    pub season_number: i32,
    pub episode_number: i32,
    pub episode_title: String,
    pub confidence: f32,
    pub reasoning: String,
}

impl EpisodeMatch {
    #[must_use]
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}
