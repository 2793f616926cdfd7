//! Progress snapshots exposed by the query surface (§3, §4.5, §9).
//!
//! These are wire DTOs: value-copied snapshots of coordinator state, never
//! mutated by a reader, serialized `camelCase` because this is the one
//! boundary spec.md describes in wire terms (§9: "the string form is only a
//! wire representation for the query surface").

use super::review::ReviewItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Copying,
    FetchingMetadata,
    ProcessingFolders,
    Structuring,
    AwaitingFinalize,
    Finalizing,
    Completed,
    Failed,
    Canceled,
}

impl Stage {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderStatus {
    Pending,
    Scanning,
    Extracting,
    Matching,
    Renaming,
    AwaitingDetectionReview,
    AwaitingReview,
    Completed,
    Failed,
}

impl FolderStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub const fn is_awaiting_human(self) -> bool {
        matches!(self, Self::AwaitingDetectionReview | Self::AwaitingReview)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyProgress {
    pub total_files: Option<u64>,
    pub total_bytes: Option<u64>,
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub current_files: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuringProgress {
    pub files_structured: u64,
    pub current_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataStatus {
    Searching,
    Found,
    Traversing,
    FetchingEpisodes,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonSummary {
    pub season_number: i32,
    pub title: String,
    pub episode_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSummary {
    pub status: MetadataStatus,
    pub seasons: Vec<SeasonSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizeLibraryProgress {
    pub stage: Stage,
    pub copy_progress: Option<CopyProgress>,
    pub metadata_summary: Option<MetadataSummary>,
    pub structuring_progress: Option<StructuringProgress>,
    pub output_progress: Option<CopyProgress>,
    pub total_folders: u32,
    pub folders_completed: u32,
    pub folders_failed: u32,
    pub folders_in_progress: u32,
    pub folders_pending_review: u32,
    pub folder_statuses: HashMap<String, FolderStatus>,
    pub expected_core_episode_count: i32,
    pub resolved_core_episode_count: i32,
    pub unresolved_core_episode_count: i32,
    pub can_finalize: bool,
    pub awaiting_final_approval: bool,
    pub staging_tree: Option<Vec<TreeNode>>,
}

impl OrganizeLibraryProgress {
    /// Derives `foldersInProgress` the way §4.5 specifies: total minus
    /// terminal, pre-start, and awaiting-human folders.
    #[must_use]
    pub fn folders_in_progress(total: u32, statuses: &HashMap<String, FolderStatus>) -> u32 {
        let excluded = statuses
            .values()
            .filter(|s| s.is_terminal() || s.is_awaiting_human() || matches!(s, FolderStatus::Pending))
            .count();
        total.saturating_sub(u32::try_from(excluded).unwrap_or(total))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFolderProgress {
    pub folder_name: String,
    pub status: FolderStatus,
    pub total_video_files: Option<u32>,
    pub detected_episode_count: Option<u32>,
    pub detection_confidence: Option<super::detection::Confidence>,
    pub total_episode_files: Option<u32>,
    pub subtitles_extracted: u32,
    pub current_file: Option<String>,
    pub matches_found: Option<u32>,
    pub total_to_match: Option<u32>,
    pub episodes_copied: u32,
    pub total_episodes_to_copy: Option<u32>,
    pub pending_reviews: Vec<ReviewItem>,
}

/// A node in the staging-tree snapshot captured at the end of Stage 4.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", rename_all_fields = "camelCase")]
pub enum TreeNode {
    #[serde(rename = "directory")]
    Directory {
        name: String,
        relative_path: String,
        children: Vec<TreeNode>,
    },
    #[serde(rename = "file")]
    File {
        name: String,
        relative_path: String,
        size: u64,
    },
}

impl TreeNode {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Directory { name, .. } | Self::File { name, .. } => name,
        }
    }

    fn sort_key(&self) -> (u8, String) {
        let kind = match self {
            Self::Directory { .. } => 0,
            Self::File { .. } => 1,
        };
        (kind, self.name().to_lowercase())
    }

    /// Sorts a tree's children directories-before-files, alphabetically
    /// within each group, per §4.4.
    pub fn sort_recursive(nodes: &mut [Self]) {
        nodes.sort_by_key(Self::sort_key);
        for node in nodes {
            if let Self::Directory { children, .. } = node {
                Self::sort_recursive(children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folders_in_progress_excludes_terminal_and_pending_and_human() {
        let mut statuses = HashMap::new();
        statuses.insert("a".to_string(), FolderStatus::Completed);
        statuses.insert("b".to_string(), FolderStatus::Pending);
        statuses.insert("c".to_string(), FolderStatus::AwaitingReview);
        statuses.insert("d".to_string(), FolderStatus::Matching);
        assert_eq!(OrganizeLibraryProgress::folders_in_progress(4, &statuses), 1);
    }

    #[test]
    fn tree_sorts_directories_before_files_alphabetically() {
        let mut nodes = vec![
            TreeNode::File { name: "b.mkv".into(), relative_path: "b.mkv".into(), size: 1 },
            TreeNode::Directory { name: "Season 01".into(), relative_path: "Season 01".into(), children: vec![] },
            TreeNode::File { name: "a.mkv".into(), relative_path: "a.mkv".into(), size: 1 },
        ];
        TreeNode::sort_recursive(&mut nodes);
        let names: Vec<_> = nodes.iter().map(TreeNode::name).collect();
        assert_eq!(names, vec!["Season 01", "a.mkv", "b.mkv"]);
    }
}
