//! Library coordinator (§4.4): the six-stage pipeline that drives a single
//! series directory from an input mount to its canonical output layout.

use crate::clients::{AnimeCatalogueClient, EpisodeMatcher, SubtitleExtractor};
use crate::config::Config;
use crate::coordinator::disc::{DiscCoordinator, DiscInput, ProcessFolderResult};
use crate::copy::{verify, CopyEngine, ProgressSink};
use crate::domain::{
    CopyProgress, EpisodeEntry, LibraryError, MetadataStatus, MetadataSummary,
    OrganizeLibraryProgress, ProcessFolderProgress, Season, SeriesMetadata, SourceFile, Stage,
    StructuringProgress, TreeNode,
};
use crate::durable::DurableStore;
use crate::naming;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

/// Live per-disc progress, keyed by `"<workflow_id>:<folder_name>"`, so the
/// C5 disc-level `getProgress` query can read a running disc's state
/// without the library coordinator holding a live reference to it (§9).
pub type DiscProgressTable = Arc<Mutex<HashMap<String, Arc<Mutex<ProcessFolderProgress>>>>>;

pub fn disc_progress_key(workflow_id: &str, folder_name: &str) -> String {
    format!("{workflow_id}:{folder_name}")
}

pub struct LibraryInput {
    pub workflow_id: String,
    pub source_series_dir: PathBuf,
    pub dry_run: bool,
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct OrganizeLibraryResult {
    pub workflow_id: String,
    pub stage: Stage,
    pub folders_completed: u32,
    pub folders_failed: u32,
    pub folders_pending_review: u32,
    pub folder_results: Vec<ProcessFolderResult>,
    pub error: Option<String>,
}

pub struct LibraryCoordinator {
    store: Arc<DurableStore>,
    config: Config,
    copy_engine: CopyEngine,
    catalogue: Arc<dyn AnimeCatalogueClient>,
    disc_coordinator: Arc<DiscCoordinator>,
    disc_progress: DiscProgressTable,
}

impl LibraryCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<DurableStore>,
        config: Config,
        copy_engine: CopyEngine,
        catalogue: Arc<dyn AnimeCatalogueClient>,
        subtitle_extractor: Arc<dyn SubtitleExtractor>,
        matcher: Arc<dyn EpisodeMatcher>,
        disc_progress: DiscProgressTable,
    ) -> Self {
        let disc_coordinator =
            Arc::new(DiscCoordinator::new(Arc::clone(&store), copy_engine.clone(), subtitle_extractor, matcher));
        Self { store, config, copy_engine, catalogue, disc_coordinator, disc_progress }
    }

    /// Drives `input` from `copying` to a terminal stage. Never propagates
    /// an error: any failure is caught and projected into the returned
    /// result (§7 "errors project into the result, never throw across the
    /// signal surface").
    pub async fn run(
        &self,
        input: LibraryInput,
        progress: Arc<Mutex<OrganizeLibraryProgress>>,
    ) -> OrganizeLibraryResult {
        match self.run_inner(&input, &progress).await {
            Ok(result) => result,
            Err(err) => {
                warn!(workflow_id = %input.workflow_id, error = %err, "library coordinator failed");
                let _ = self.store.fail_workflow(&input.workflow_id, &err.to_string()).await;
                progress.lock().await.stage = Stage::Failed;

                let guard = progress.lock().await;
                OrganizeLibraryResult {
                    workflow_id: input.workflow_id.clone(),
                    stage: Stage::Failed,
                    folders_completed: guard.folders_completed,
                    folders_failed: guard.folders_failed,
                    folders_pending_review: guard.folders_pending_review,
                    folder_results: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn set_stage(&self, input: &LibraryInput, stage: Stage, progress: &Arc<Mutex<OrganizeLibraryProgress>>) {
        let _ = self.store.update_workflow_stage(&input.workflow_id, stage).await;
        progress.lock().await.stage = stage;

        let labels = [("stage", format!("{stage:?}"))];
        metrics::counter!("library_stage_transitions_total", &labels).increment(1);
    }

    async fn run_inner(
        &self,
        input: &LibraryInput,
        progress: &Arc<Mutex<OrganizeLibraryProgress>>,
    ) -> Result<OrganizeLibraryResult, LibraryError> {
        let series_name = input
            .source_series_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "series".to_string());

        let processing_dir =
            Path::new(&self.config.media.processing_root).join(&input.workflow_id).join(&series_name);

        // -- Stage 1: Copying ------------------------------------------------
        self.set_stage(input, Stage::Copying, progress).await;

        let source_files = enumerate_tree(&input.source_series_dir)
            .await
            .map_err(|e| LibraryError::Other(e.to_string()))?;
        let total_bytes = source_files.iter().map(|f| f.size_bytes).sum();

        {
            let mut guard = progress.lock().await;
            guard.copy_progress = Some(CopyProgress {
                total_files: Some(u64::try_from(source_files.len()).unwrap_or(u64::MAX)),
                total_bytes: Some(total_bytes),
                ..CopyProgress::default()
            });
        }

        let copy_sink = Arc::new(LibraryProgressSink { progress: Arc::clone(progress), target: ProgressField::Copy });
        self.copy_engine.copy(&source_files, &processing_dir, copy_sink, input.dry_run).await?;

        // -- Stage 2: Fetching metadata ---------------------------------------
        self.set_stage(input, Stage::FetchingMetadata, progress).await;
        let series_metadata = self
            .store
            .run_checkpointed(&input.workflow_id, "fetch_metadata", || async {
                self.fetch_metadata(&series_name, progress).await.map_err(anyhow::Error::from)
            })
            .await
            .map_err(|e| LibraryError::Other(e.to_string()))?;
        progress.lock().await.expected_core_episode_count = series_metadata.total_episodes();

        let show_name = series_metadata.show_name(&series_name);
        let clean_show_name = naming::clean_show_name(&show_name);

        // -- Stage 3: Processing folders ---------------------------------------
        self.set_stage(input, Stage::ProcessingFolders, progress).await;
        let folder_results =
            self.process_folders(input, &processing_dir, &series_name, &show_name, &series_metadata, progress).await?;

        let folders_failed = folder_results.iter().filter(|r| r.status == crate::domain::FolderStatus::Failed).count();
        let total_renamed: usize = folder_results.iter().map(|r| r.renamed_files.len()).sum();

        // -- Stage 4: Structuring ---------------------------------------------
        self.set_stage(input, Stage::Structuring, progress).await;
        let structured_dir =
            self.structure_locally(&processing_dir, &clean_show_name, &folder_results, progress).await?;

        let staging_dir = Path::new(&self.config.media.staging_root).join(&input.workflow_id).join(&clean_show_name);
        let structured_files = enumerate_tree(&structured_dir).await.map_err(|e| LibraryError::Other(e.to_string()))?;
        let output_sink =
            Arc::new(LibraryProgressSink { progress: Arc::clone(progress), target: ProgressField::Output });
        self.copy_engine.copy(&structured_files, &staging_dir, output_sink, input.dry_run).await?;

        let staging_tree = build_tree(&staging_dir).await.unwrap_or_default();
        progress.lock().await.staging_tree = Some(staging_tree);

        // -- Stage 5: Awaiting finalize -----------------------------------------
        self.set_stage(input, Stage::AwaitingFinalize, progress).await;
        let can_finalize = folders_failed == 0 && total_renamed > 0;

        {
            let mut guard = progress.lock().await;
            guard.can_finalize = can_finalize;
            guard.awaiting_final_approval = true;
        }

        loop {
            let decision: crate::domain::FinalizeDecision = self
                .store
                .await_signal(&input.workflow_id, "finalize")
                .await
                .map_err(|e| LibraryError::Other(e.to_string()))?;

            if !decision.approved {
                return Err(LibraryError::Rejected);
            }
            if can_finalize {
                break;
            }
            warn!(workflow_id = %input.workflow_id, "finalize approved but canFinalize is false, waiting again");
        }

        progress.lock().await.awaiting_final_approval = false;

        // -- Stage 6: Finalizing ---------------------------------------------
        self.set_stage(input, Stage::Finalizing, progress).await;
        let output_dir = Path::new(&self.config.media.output_root).join(&clean_show_name);

        if !input.dry_run {
            tokio::fs::create_dir_all(&output_dir).await.map_err(|e| LibraryError::Other(e.to_string()))?;
            let staging_files =
                enumerate_tree(&staging_dir).await.map_err(|e| LibraryError::Other(e.to_string()))?;
            self.copy_engine
                .copy(&staging_files, &output_dir, Arc::new(crate::copy::NullSink), input.dry_run)
                .await?;

            let report = verify(&staging_dir, &output_dir).await.map_err(|e| LibraryError::Other(e.to_string()))?;
            if !report.verified {
                return Err(LibraryError::IntegrityFailed(report.missing.len()));
            }

            let processing_run_dir = Path::new(&self.config.media.processing_root).join(&input.workflow_id);
            let staging_run_dir = Path::new(&self.config.media.staging_root).join(&input.workflow_id);
            if let Err(err) = tokio::fs::remove_dir_all(&staging_run_dir).await {
                warn!(error = %err, "failed to clean up staging sandbox");
            }
            if let Err(err) = tokio::fs::remove_dir_all(&processing_run_dir).await {
                warn!(error = %err, "failed to clean up processing sandbox");
            }
        }

        self.set_stage(input, Stage::Completed, progress).await;
        info!(workflow_id = %input.workflow_id, "library run completed");

        let guard = progress.lock().await;
        Ok(OrganizeLibraryResult {
            workflow_id: input.workflow_id.clone(),
            stage: Stage::Completed,
            folders_completed: guard.folders_completed,
            folders_failed: guard.folders_failed,
            folders_pending_review: guard.folders_pending_review,
            folder_results,
            error: None,
        })
    }

    async fn fetch_metadata(
        &self,
        series_name: &str,
        progress: &Arc<Mutex<OrganizeLibraryProgress>>,
    ) -> Result<SeriesMetadata, LibraryError> {
        progress.lock().await.metadata_summary =
            Some(MetadataSummary { status: MetadataStatus::Searching, seasons: Vec::new() });

        let cleaned_name = naming::clean_folder_name_for_search(series_name);
        let search_result = self
            .store
            .with_retry(|| async { self.catalogue.search_anime_by_name(&cleaned_name).await.map_err(anyhow::Error::from) })
            .await
            .map_err(|e| LibraryError::Other(e.to_string()))?
            .ok_or(LibraryError::CatalogueMiss)?;

        progress.lock().await.metadata_summary =
            Some(MetadataSummary { status: MetadataStatus::Found, seasons: Vec::new() });
        progress.lock().await.metadata_summary.as_mut().unwrap().status = MetadataStatus::Traversing;

        let minimal_entries = self
            .store
            .with_retry(|| async { self.catalogue.discover_all_seasons(search_result.id).await.map_err(anyhow::Error::from) })
            .await
            .map_err(|e| LibraryError::Other(e.to_string()))?;

        if minimal_entries.is_empty() {
            return Err(LibraryError::CatalogueMiss);
        }

        progress.lock().await.metadata_summary.as_mut().unwrap().status = MetadataStatus::FetchingEpisodes;

        let mut seasons = Vec::new();
        for (index, entry) in minimal_entries.iter().enumerate() {
            let season_number = i32::try_from(index + 1).unwrap_or(i32::MAX);
            let expected_count = entry.episode_count.unwrap_or(0);
            let episode_entries: Vec<EpisodeEntry> = self
                .store
                .with_retry(|| async {
                    self.catalogue.fetch_season_episodes(entry.id, expected_count).await.map_err(anyhow::Error::from)
                })
                .await
                .map_err(|e| LibraryError::Other(e.to_string()))?;

            let title = entry.title_english.clone().unwrap_or_else(|| entry.title_romaji.clone());

            {
                let mut guard = progress.lock().await;
                if let Some(summary) = guard.metadata_summary.as_mut() {
                    summary.seasons.push(crate::domain::SeasonSummary {
                        season_number,
                        title: title.clone(),
                        episode_count: expected_count,
                    });
                }
            }

            seasons.push(Season {
                season_number,
                catalogue_id: entry.id,
                title_romaji: entry.title_romaji.clone(),
                title_english: entry.title_english.clone(),
                episode_count: expected_count,
                episodes: episode_entries,
            });
        }

        progress.lock().await.metadata_summary.as_mut().unwrap().status = MetadataStatus::Complete;

        Ok(SeriesMetadata { source_title: search_result.title_romaji, seasons })
    }

    async fn process_folders(
        &self,
        input: &LibraryInput,
        processing_dir: &Path,
        series_name: &str,
        show_name: &str,
        series_metadata: &SeriesMetadata,
        progress: &Arc<Mutex<OrganizeLibraryProgress>>,
    ) -> Result<Vec<ProcessFolderResult>, LibraryError> {
        let disc_folders = find_disc_folders(processing_dir, series_name).await.map_err(|e| LibraryError::Other(e.to_string()))?;

        {
            let mut guard = progress.lock().await;
            guard.total_folders = u32::try_from(disc_folders.len()).unwrap_or(u32::MAX);
            for (name, _) in &disc_folders {
                guard.folder_statuses.insert(name.clone(), crate::domain::FolderStatus::Pending);
            }
        }

        for (name, _) in &disc_folders {
            let _ = self.store.create_disc_run(&input.workflow_id, name).await;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.temporal.max_concurrent_workflow_tasks));
        let mut tasks = tokio::task::JoinSet::new();

        for (name, path) in disc_folders {
            let permit = Arc::clone(&semaphore);
            let coordinator = Arc::clone(&self.disc_coordinator);
            let disc_input = DiscInput {
                workflow_id: input.workflow_id.clone(),
                folder_path: path,
                folder_name: name.clone(),
                series_root: processing_dir.to_path_buf(),
                show_name: show_name.to_string(),
                series_metadata: series_metadata.clone(),
                dry_run: input.dry_run,
                confidence_threshold: input.confidence_threshold,
            };
            let disc_progress = Arc::new(Mutex::new(ProcessFolderProgress {
                folder_name: name,
                status: crate::domain::FolderStatus::Pending,
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

            self.disc_progress
                .lock()
                .await
                .insert(disc_progress_key(&input.workflow_id, &disc_input.folder_name), Arc::clone(&disc_progress));

            tasks.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("disc semaphore is never closed");
                coordinator.run(disc_input, disc_progress).await
            });
        }

        let mut folder_results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.expect("disc coordinator task panicked");

            let mut guard = progress.lock().await;
            guard.folder_statuses.insert(result.folder_name.clone(), result.status);
            match result.status {
                crate::domain::FolderStatus::Completed => guard.folders_completed += 1,
                crate::domain::FolderStatus::Failed => guard.folders_failed += 1,
                _ => {}
            }
            let outcome_labels = [("outcome", format!("{:?}", result.status))];
            metrics::counter!("disc_outcomes_total", &outcome_labels).increment(1);
            guard.resolved_core_episode_count += i32::try_from(result.renamed_files.len()).unwrap_or(0);
            guard.folders_in_progress =
                OrganizeLibraryProgress::folders_in_progress(guard.total_folders, &guard.folder_statuses);
            drop(guard);

            folder_results.push(result);
        }

        let mut guard = progress.lock().await;
        guard.unresolved_core_episode_count =
            (guard.expected_core_episode_count - guard.resolved_core_episode_count).max(0);
        drop(guard);

        Ok(folder_results)
    }

    /// Moves renamed episodes from `_episodes/` and copies extras into
    /// `_structured/<CleanShowName>/`, per §4.4 Stage 4.
    async fn structure_locally(
        &self,
        processing_dir: &Path,
        clean_show_name: &str,
        folder_results: &[ProcessFolderResult],
        progress: &Arc<Mutex<OrganizeLibraryProgress>>,
    ) -> Result<PathBuf, LibraryError> {
        let structured_dir = processing_dir.join("_structured").join(clean_show_name);
        let mut files_structured = 0u64;

        for result in folder_results {
            for renamed in &result.renamed_files {
                {
                    let mut guard = progress.lock().await;
                    guard.structuring_progress = Some(StructuringProgress {
                        files_structured,
                        current_file: Some(renamed.new_file_name.clone()),
                    });
                }

                let season_dir = format!("Season {:02}", renamed.season_number);
                let dest = structured_dir.join(season_dir).join(&renamed.new_file_name);
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| LibraryError::Other(e.to_string()))?;
                }
                if !dest.exists() && renamed.new_path.exists() {
                    tokio::fs::rename(&renamed.new_path, &dest).await.map_err(|e| LibraryError::Other(e.to_string()))?;
                }
                files_structured += 1;
            }

            for extra in &result.unprocessed_files {
                let relative = extra.strip_prefix(processing_dir).unwrap_or(extra);
                let dest = structured_dir.join("Extras").join(relative);

                {
                    let mut guard = progress.lock().await;
                    guard.structuring_progress = Some(StructuringProgress {
                        files_structured,
                        current_file: extra.file_name().map(|n| n.to_string_lossy().to_string()),
                    });
                }

                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| LibraryError::Other(e.to_string()))?;
                }
                if !dest.exists() && extra.exists() {
                    tokio::fs::copy(extra, &dest).await.map_err(|e| LibraryError::Other(e.to_string()))?;
                }
                files_structured += 1;
            }
        }

        progress.lock().await.structuring_progress =
            Some(StructuringProgress { files_structured, current_file: None });

        Ok(structured_dir)
    }
}

#[derive(Clone, Copy)]
enum ProgressField {
    Copy,
    Output,
}

struct LibraryProgressSink {
    progress: Arc<Mutex<OrganizeLibraryProgress>>,
    target: ProgressField,
}

#[async_trait::async_trait]
impl ProgressSink for LibraryProgressSink {
    async fn on_progress(&self, update: CopyProgress) {
        let mut guard = self.progress.lock().await;
        match self.target {
            ProgressField::Copy => guard.copy_progress = Some(update),
            ProgressField::Output => guard.output_progress = Some(update),
        }
    }
}

/// Lists immediate subdirectories of `<processing_dir>` that don't begin
/// with `_`, each treated as a disc. If there are none, the series
/// directory itself is the single disc (§4.4 "Processing folders", §8
/// boundary behaviour "single flat directory").
async fn find_disc_folders(processing_dir: &Path, series_name: &str) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(processing_dir).await?;
    let mut folders = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('_') {
            continue;
        }
        folders.push((name, entry.path()));
    }

    if folders.is_empty() {
        folders.push((series_name.to_string(), processing_dir.to_path_buf()));
    }

    Ok(folders)
}

async fn enumerate_tree(root: &Path) -> std::io::Result<Vec<SourceFile>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_str().is_some_and(|n| n.starts_with('_')))
        {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(SourceFile::new(entry.path(), &root)?);
            }
        }
        Ok(files)
    })
    .await
    .expect("enumerate worker thread panicked")
}

async fn build_tree(root: &Path) -> std::io::Result<Vec<TreeNode>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut nodes = build_tree_sync(&root, &root)?;
        TreeNode::sort_recursive(&mut nodes);
        Ok(nodes)
    })
    .await
    .expect("tree-build worker thread panicked")
}

fn build_tree_sync(dir: &Path, root: &Path) -> std::io::Result<Vec<TreeNode>> {
    let mut nodes = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().to_string();

        if entry.file_type()?.is_dir() {
            nodes.push(TreeNode::Directory { name, relative_path, children: build_tree_sync(&path, root)? });
        } else {
            let size = entry.metadata()?.len();
            nodes.push(TreeNode::File { name, relative_path, size });
        }
    }
    Ok(nodes)
}
