//! Episode-cluster detection results (§3 "Detection result", §4.2).

use super::source_file::SourceFile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub episodes: Vec<SourceFile>,
    pub non_episodes: Vec<SourceFile>,
    pub confidence: Confidence,
    pub cluster_median: Option<u64>,
    pub cluster_range: Option<(u64, u64)>,
}

impl DetectionResult {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            episodes: Vec::new(),
            non_episodes: Vec::new(),
            confidence: Confidence::Low,
            cluster_median: None,
            cluster_range: None,
        }
    }

    #[must_use]
    pub fn total_files(&self) -> usize {
        self.episodes.len() + self.non_episodes.len()
    }
}
