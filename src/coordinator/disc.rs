//! Disc coordinator (§4.3): a state machine per disc subfolder that drives
//! detection, subtitle extraction, LLM matching, renaming, and human review
//! for a single folder of a library run.

use crate::clients::{EpisodeMatcher, SubtitleExtractor, SubtitleInput};
use crate::copy::{CopyEngine, NullSink};
use crate::detect;
use crate::domain::{
    Confidence, DetectionConfirmation, DiscError, EpisodeMatch, FolderStatus, ProcessFolderProgress,
    RenamedFile, ReviewDecision, ReviewItem, SeriesMetadata, SourceFile,
};
use crate::durable::DurableStore;
use crate::naming;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct DiscInput {
    pub workflow_id: String,
    pub folder_path: PathBuf,
    pub folder_name: String,
    pub series_root: PathBuf,
    pub show_name: String,
    pub series_metadata: SeriesMetadata,
    pub dry_run: bool,
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct ProcessFolderResult {
    pub folder_name: String,
    pub status: FolderStatus,
    pub renamed_files: Vec<RenamedFile>,
    pub episode_original_paths: Vec<PathBuf>,
    pub unprocessed_files: Vec<PathBuf>,
    pub error: Option<String>,
}

pub struct DiscCoordinator {
    store: Arc<DurableStore>,
    copy_engine: CopyEngine,
    subtitle_extractor: Arc<dyn SubtitleExtractor>,
    matcher: Arc<dyn EpisodeMatcher>,
}

impl DiscCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<DurableStore>,
        copy_engine: CopyEngine,
        subtitle_extractor: Arc<dyn SubtitleExtractor>,
        matcher: Arc<dyn EpisodeMatcher>,
    ) -> Self {
        Self { store, copy_engine, subtitle_extractor, matcher }
    }

    /// Drives one disc folder from `scanning` to a terminal status. Never
    /// propagates an error: any failure inside the state machine is caught
    /// and reported as a `failed` result so sibling discs keep running
    /// (§4.3 failure semantics).
    pub async fn run(&self, input: DiscInput, progress: Arc<Mutex<ProcessFolderProgress>>) -> ProcessFolderResult {
        match self.run_inner(&input, &progress).await {
            Ok(result) => result,
            Err(err) => {
                warn!(folder = %input.folder_name, error = %err, "disc coordinator failed");
                let _ = self
                    .store
                    .update_disc_status(&input.workflow_id, &input.folder_name, FolderStatus::Failed, Some(&err.to_string()))
                    .await;
                progress.lock().await.status = FolderStatus::Failed;
                ProcessFolderResult {
                    folder_name: input.folder_name.clone(),
                    status: FolderStatus::Failed,
                    renamed_files: Vec::new(),
                    episode_original_paths: Vec::new(),
                    unprocessed_files: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn set_status(&self, input: &DiscInput, status: FolderStatus, progress: &Arc<Mutex<ProcessFolderProgress>>) {
        let _ = self.store.update_disc_status(&input.workflow_id, &input.folder_name, status, None).await;
        progress.lock().await.status = status;
    }

    async fn run_inner(
        &self,
        input: &DiscInput,
        progress: &Arc<Mutex<ProcessFolderProgress>>,
    ) -> Result<ProcessFolderResult, DiscError> {
        self.set_status(input, FolderStatus::Scanning, progress).await;

        let detection = detect::detect(&input.folder_path).map_err(|e| DiscError::Other(e.to_string()))?;
        if detection.total_files() == 0 {
            self.set_status(input, FolderStatus::Completed, progress).await;
            return Ok(ProcessFolderResult {
                folder_name: input.folder_name.clone(),
                status: FolderStatus::Completed,
                renamed_files: Vec::new(),
                episode_original_paths: Vec::new(),
                unprocessed_files: Vec::new(),
                error: None,
            });
        }

        {
            let mut guard = progress.lock().await;
            guard.total_video_files = Some(u32::try_from(detection.total_files()).unwrap_or(u32::MAX));
            guard.detected_episode_count = Some(u32::try_from(detection.episodes.len()).unwrap_or(u32::MAX));
            guard.detection_confidence = Some(detection.confidence);
        }

        let (episodes, non_episodes) = if detection.confidence == Confidence::High {
            (detection.episodes, detection.non_episodes)
        } else {
            self.set_status(input, FolderStatus::AwaitingDetectionReview, progress).await;
            let confirmation: DetectionConfirmation = self
                .store
                .await_signal(&input.workflow_id, &detection_signal_key(&input.folder_name))
                .await
                .map_err(|e| DiscError::Other(e.to_string()))?;
            apply_detection_confirmation(detection.episodes, detection.non_episodes, &confirmation)
        };

        self.set_status(input, FolderStatus::Extracting, progress).await;
        progress.lock().await.total_episode_files = Some(u32::try_from(episodes.len()).unwrap_or(u32::MAX));

        let subtitles_dir = input.series_root.join("_subtitles").join(&input.folder_name);
        let mut subtitle_inputs = Vec::new();

        for file in &episodes {
            progress.lock().await.current_file = Some(file.name.clone());

            let extraction = self
                .store
                .with_retry(|| async {
                    self.subtitle_extractor.extract(&file.absolute_path, &file.name, &subtitles_dir).await.map_err(anyhow::Error::from)
                })
                .await;

            match extraction {
                Ok(Some(extracted)) => {
                    subtitle_inputs.push(SubtitleInput {
                        file_name: file.name.clone(),
                        file_path: file.absolute_path.clone(),
                        content: extracted.content,
                    });
                    progress.lock().await.subtitles_extracted += 1;
                }
                Ok(None) => {
                    info!(file = %file.name, "no subtitle stream found, tolerated");
                }
                Err(err) => {
                    warn!(file = %file.name, error = %err, "subtitle extraction failed for one file, tolerated");
                }
            }
        }

        if subtitle_inputs.is_empty() {
            return Err(DiscError::NoSubtitles);
        }

        self.set_status(input, FolderStatus::Matching, progress).await;
        progress.lock().await.total_to_match = Some(u32::try_from(subtitle_inputs.len()).unwrap_or(u32::MAX));

        let matches = self
            .store
            .with_retry(|| async { self.matcher.match_episodes(&subtitle_inputs, &input.series_metadata).await.map_err(anyhow::Error::from) })
            .await
            .map_err(|e| DiscError::Other(e.to_string()))?;
        progress.lock().await.matches_found = Some(u32::try_from(matches.len()).unwrap_or(u32::MAX));

        self.set_status(input, FolderStatus::Renaming, progress).await;
        progress.lock().await.total_episodes_to_copy = Some(u32::try_from(matches.len()).unwrap_or(u32::MAX));

        let mut renamed_files = Vec::new();
        let mut low_confidence = Vec::new();

        for m in matches {
            if m.is_confident(input.confidence_threshold) {
                let renamed = self.rename_and_copy(input, &m).await?;
                renamed_files.push(renamed);
                progress.lock().await.episodes_copied += 1;
            } else {
                low_confidence.push(m);
            }
        }

        if !low_confidence.is_empty() {
            self.set_status(input, FolderStatus::AwaitingReview, progress).await;

            let available_seasons: Vec<i32> = input.series_metadata.seasons.iter().map(|s| s.season_number).collect();

            for m in &low_confidence {
                let available_episodes = input
                    .series_metadata
                    .season(m.season_number)
                    .map(|s| s.episodes.iter().map(|e| e.number).collect())
                    .unwrap_or_default();
                let dialogue = subtitle_inputs
                    .iter()
                    .find(|s| s.file_name == m.file_name)
                    .map_or("", |s| s.content.as_str());
                let item =
                    ReviewItem::from_match(&input.folder_name, m, dialogue, available_seasons.clone(), available_episodes);
                progress.lock().await.pending_reviews.push(item);
            }

            for m in low_confidence {
                let item_id = ReviewItem::make_id(&input.folder_name, &m.file_name);
                let approved_match = loop {
                    let decision: ReviewDecision = self
                        .store
                        .await_signal(&input.workflow_id, &review_signal_key(&item_id))
                        .await
                        .map_err(|e| DiscError::Other(e.to_string()))?;

                    if decision.approved {
                        let season = decision.corrected_season.unwrap_or(m.season_number);
                        let episode = decision.corrected_episode.unwrap_or(m.episode_number);
                        let title = input.series_metadata.episode_title(season, episode);
                        break EpisodeMatch {
                            season_number: season,
                            episode_number: episode,
                            episode_title: title,
                            confidence: 1.0,
                            reasoning: "user-approved".to_string(),
                            ..m
                        };
                    }
                    // rejected: the decision is discarded, the operator may resubmit.
                };

                let renamed = self.rename_and_copy(input, &approved_match).await?;
                renamed_files.push(renamed);
                progress.lock().await.episodes_copied += 1;
                progress.lock().await.pending_reviews.retain(|r| r.id != item_id);
            }
        }

        self.set_status(input, FolderStatus::Completed, progress).await;

        let unprocessed_files: Vec<PathBuf> = non_episodes.iter().map(|f| f.absolute_path.clone()).collect();

        Ok(ProcessFolderResult {
            folder_name: input.folder_name.clone(),
            status: FolderStatus::Completed,
            renamed_files,
            episode_original_paths: episodes.iter().map(|f| f.absolute_path.clone()).collect(),
            unprocessed_files,
            error: None,
        })
    }

    /// Copies a matched episode file into
    /// `<series_root>/_episodes/Season <ss>/<Plex name>`. Idempotent: an
    /// existing destination is left untouched (§4.3 "Renaming").
    async fn rename_and_copy(&self, input: &DiscInput, m: &EpisodeMatch) -> Result<RenamedFile, DiscError> {
        let extension = Path::new(&m.file_name).extension().and_then(|e| e.to_str()).unwrap_or("mkv");
        let file_name = naming::plex_file_name(&input.show_name, m.season_number, m.episode_number, Some(&m.episode_title), extension);

        let season_dir = format!("Season {:02}", m.season_number);
        let dest_dir = input.series_root.join("_episodes").join(&season_dir);
        let dest_path = dest_dir.join(&file_name);

        let original_relative_path =
            m.file_path.strip_prefix(&input.folder_path).unwrap_or(&m.file_path).to_path_buf();

        if !dest_path.exists() && !input.dry_run {
            let mut source_file = SourceFile::new(&m.file_path, &input.folder_path)
                .map_err(|e| DiscError::Other(e.to_string()))?;
            source_file.path_relative_to_enum_root = PathBuf::from(&file_name);

            self.copy_engine
                .copy(&[source_file], &dest_dir, Arc::new(NullSink), false)
                .await?;
        }

        Ok(RenamedFile {
            original_path: m.file_path.clone(),
            original_relative_path,
            new_path: dest_path,
            new_file_name: file_name,
            season_number: m.season_number,
            episode_number: m.episode_number,
        })
    }
}

fn apply_detection_confirmation(
    mut episodes: Vec<SourceFile>,
    mut non_episodes: Vec<SourceFile>,
    confirmation: &DetectionConfirmation,
) -> (Vec<SourceFile>, Vec<SourceFile>) {
    for added in &confirmation.added_paths {
        if let Some(pos) = non_episodes.iter().position(|f| f.absolute_path.to_string_lossy() == *added) {
            episodes.push(non_episodes.remove(pos));
        }
    }
    for removed in &confirmation.removed_paths {
        if let Some(pos) = episodes.iter().position(|f| f.absolute_path.to_string_lossy() == *removed) {
            non_episodes.push(episodes.remove(pos));
        }
    }
    (episodes, non_episodes)
}

pub fn detection_signal_key(folder_name: &str) -> String {
    format!("detection_confirmation:{folder_name}")
}

pub fn review_signal_key(review_item_id: &str) -> String {
    format!("review_decision:{review_item_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::SubtitleInput;
    use crate::domain::{EpisodeEntry, Season, SubtitleError};
    use crate::durable::DurableStore;
    use tempfile::tempdir;

    struct FakeSubtitleExtractor;

    #[async_trait::async_trait]
    impl SubtitleExtractor for FakeSubtitleExtractor {
        async fn extract(
            &self,
            _media_path: &Path,
            media_name: &str,
            _target_subtitles_dir: &Path,
        ) -> Result<Option<crate::clients::ExtractedSubtitle>, SubtitleError> {
            Ok(Some(crate::clients::ExtractedSubtitle {
                file_path: PathBuf::from(media_name),
                file_name: media_name.to_string(),
                content: format!("dialogue for {media_name}"),
                source: crate::clients::SubtitleSource::Embedded,
                language: None,
            }))
        }
    }

    /// Assigns episodes in file-name order: `episode 01.mkv` -> S1E1, etc.
    struct FakeMatcher;

    #[async_trait::async_trait]
    impl EpisodeMatcher for FakeMatcher {
        async fn match_episodes(
            &self,
            subtitles: &[SubtitleInput],
            _metadata: &SeriesMetadata,
        ) -> Result<Vec<EpisodeMatch>, crate::domain::MatcherError> {
            let mut sorted: Vec<&SubtitleInput> = subtitles.iter().collect();
            sorted.sort_by(|a, b| a.file_name.cmp(&b.file_name));
            Ok(sorted
                .into_iter()
                .enumerate()
                .map(|(i, s)| EpisodeMatch {
                    file_name: s.file_name.clone(),
                    file_path: s.file_path.clone(),
                    season_number: 1,
                    episode_number: i32::try_from(i + 1).unwrap(),
                    episode_title: format!("Episode {}", i + 1),
                    confidence: 0.95,
                    reasoning: "clear title card match".to_string(),
                })
                .collect())
        }
    }

    fn sample_metadata() -> SeriesMetadata {
        SeriesMetadata {
            source_title: "Sample Show".to_string(),
            seasons: vec![Season {
                season_number: 1,
                catalogue_id: 1,
                title_romaji: "Sample Show".to_string(),
                title_english: Some("Sample Show".to_string()),
                episode_count: 6,
                episodes: (1..=6)
                    .map(|n| EpisodeEntry { number: n, title: Some(format!("Episode {n}")), description: None })
                    .collect(),
            }],
        }
    }

    #[tokio::test]
    async fn happy_path_renames_confident_matches_into_season_folder() {
        let root = tempdir().unwrap();
        let disc_dir = root.path().join("Disc 01");
        std::fs::create_dir_all(&disc_dir).unwrap();
        for i in 1..=6 {
            std::fs::write(disc_dir.join(format!("episode {i:02}.mkv")), vec![0u8; 10 * 1024 * 1024]).unwrap();
        }

        let store = Arc::new(DurableStore::new("sqlite::memory:").await.unwrap());
        store.create_workflow_run("wf-1", "organize_library", root.path().to_str().unwrap()).await.unwrap();
        store.create_disc_run("wf-1", "Disc 01").await.unwrap();

        let coordinator = DiscCoordinator::new(
            Arc::clone(&store),
            CopyEngine::new(),
            Arc::new(FakeSubtitleExtractor),
            Arc::new(FakeMatcher),
        );

        let input = DiscInput {
            workflow_id: "wf-1".to_string(),
            folder_path: disc_dir,
            folder_name: "Disc 01".to_string(),
            series_root: root.path().to_path_buf(),
            show_name: "Sample Show".to_string(),
            series_metadata: sample_metadata(),
            dry_run: false,
            confidence_threshold: 0.85,
        };

        let progress = Arc::new(Mutex::new(ProcessFolderProgress {
            folder_name: "Disc 01".to_string(),
            status: FolderStatus::Pending,
            total_video_files: None,
            detected_episode_count: None,
            detection_confidence: None,
            total_episode_files: None,
            subtitles_extracted: 0,
            current_file: None,
            matches_found: None,
            total_to_match: None,
            episodes_copied: 0,
            total_episodes_to_copy: None,
            pending_reviews: Vec::new(),
        }));

        let result = coordinator.run(input, progress).await;

        assert_eq!(result.status, FolderStatus::Completed);
        assert!(result.error.is_none());
        assert_eq!(result.renamed_files.len(), 6);
        assert!(result.unprocessed_files.is_empty());

        for renamed in &result.renamed_files {
            assert!(renamed.new_path.exists(), "expected {:?} to exist", renamed.new_path);
            assert!(renamed.new_path.to_string_lossy().contains("Season 01"));
        }
    }
}
