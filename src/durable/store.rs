//! `DurableStore`: a SQLite-backed durable execution host.
//!
//! There is no external workflow engine here; this struct plays that role
//! directly. It gives the library and disc coordinators three primitives a
//! real durable-execution host would provide: checkpointed steps that are
//! never re-run after a crash ([`DurableStore::run_checkpointed`]), a
//! generic retry-with-backoff wrapper for flaky activities
//! ([`DurableStore::with_retry`]), and a way to block a coordinator on a
//! human signal without busy-looping the CPU
//! ([`DurableStore::await_signal`]).

use crate::constants::durability::{CONDITION_POLL_INTERVAL, RETRY_ATTEMPTS, RETRY_INITIAL_BACKOFF};
use crate::domain::{FolderStatus, Stage};
use crate::durable::entities::{checkpoint, disc_run, signal, workflow_run};
use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct DurableStore {
    conn: DatabaseConnection,
}

impl DurableStore {
    /// Opens (and migrates) the database at `db_url`, e.g.
    /// `sqlite:data/sera.db`.
    pub async fn new(db_url: &str) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if let Some(path_str) = db_url.strip_prefix("sqlite:")
            && path_str != ":memory:"
        {
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str).context("creating sqlite database file")?;
            }
        }

        let mut options = ConnectOptions::new(db_url.to_string());
        options
            .max_connections(5)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let conn = Database::connect(options).await?;
        crate::durable::migrator::Migrator::up(&conn, None).await?;

        info!("durable store opened and migrated");

        Ok(Self { conn })
    }

    // -- workflow runs ----------------------------------------------------

    pub async fn create_workflow_run(&self, workflow_id: &str, kind: &str, root_path: &str) -> Result<()> {
        let now = now_rfc3339();
        let model = workflow_run::ActiveModel {
            id: Set(workflow_id.to_string()),
            kind: Set(kind.to_string()),
            root_path: Set(root_path.to_string()),
            stage: Set(stage_to_str(Stage::Copying)),
            error: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };
        model.insert(&self.conn).await?;
        Ok(())
    }

    pub async fn update_workflow_stage(&self, workflow_id: &str, stage: Stage) -> Result<()> {
        let Some(existing) = workflow_run::Entity::find_by_id(workflow_id.to_string())
            .one(&self.conn)
            .await?
        else {
            anyhow::bail!("unknown workflow run {workflow_id}");
        };
        let mut active: workflow_run::ActiveModel = existing.into();
        active.stage = Set(stage_to_str(stage));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn fail_workflow(&self, workflow_id: &str, error: &str) -> Result<()> {
        let Some(existing) = workflow_run::Entity::find_by_id(workflow_id.to_string())
            .one(&self.conn)
            .await?
        else {
            anyhow::bail!("unknown workflow run {workflow_id}");
        };
        let mut active: workflow_run::ActiveModel = existing.into();
        active.stage = Set(stage_to_str(Stage::Failed));
        active.error = Set(Some(error.to_string()));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn get_workflow_stage(&self, workflow_id: &str) -> Result<Option<Stage>> {
        let row = workflow_run::Entity::find_by_id(workflow_id.to_string()).one(&self.conn).await?;
        Ok(row.map(|r| str_to_stage(&r.stage)))
    }

    pub async fn get_workflow_error(&self, workflow_id: &str) -> Result<Option<String>> {
        let row = workflow_run::Entity::find_by_id(workflow_id.to_string()).one(&self.conn).await?;
        Ok(row.and_then(|r| r.error))
    }

    // -- disc runs ----------------------------------------------------------

    pub async fn create_disc_run(&self, workflow_id: &str, folder_name: &str) -> Result<()> {
        let now = now_rfc3339();
        let model = disc_run::ActiveModel {
            id: Set(disc_run_id(workflow_id, folder_name)),
            workflow_id: Set(workflow_id.to_string()),
            folder_name: Set(folder_name.to_string()),
            status: Set(folder_status_to_str(FolderStatus::Pending)),
            error: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };
        model.insert(&self.conn).await?;
        Ok(())
    }

    pub async fn update_disc_status(
        &self,
        workflow_id: &str,
        folder_name: &str,
        status: FolderStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let id = disc_run_id(workflow_id, folder_name);
        let Some(existing) = disc_run::Entity::find_by_id(id).one(&self.conn).await? else {
            anyhow::bail!("unknown disc run {workflow_id}/{folder_name}");
        };
        let mut active: disc_run::ActiveModel = existing.into();
        active.status = Set(folder_status_to_str(status));
        active.error = Set(error.map(ToString::to_string));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn get_disc_status(&self, workflow_id: &str, folder_name: &str) -> Result<Option<FolderStatus>> {
        let id = disc_run_id(workflow_id, folder_name);
        let row = disc_run::Entity::find_by_id(id).one(&self.conn).await?;
        Ok(row.map(|r| str_to_folder_status(&r.status)))
    }

    pub async fn list_disc_statuses(&self, workflow_id: &str) -> Result<std::collections::HashMap<String, FolderStatus>> {
        let rows = disc_run::Entity::find()
            .filter(disc_run::Column::WorkflowId.eq(workflow_id))
            .all(&self.conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.folder_name, str_to_folder_status(&r.status)))
            .collect())
    }

    // -- checkpoints ----------------------------------------------------------

    async fn get_checkpoint<T: DeserializeOwned>(&self, workflow_id: &str, key: &str) -> Result<Option<T>> {
        let row = checkpoint::Entity::find()
            .filter(checkpoint::Column::WorkflowId.eq(workflow_id))
            .filter(checkpoint::Column::CheckpointKey.eq(key))
            .one(&self.conn)
            .await?;
        row.map(|r| serde_json::from_str(&r.payload_json).context("decoding checkpoint payload"))
            .transpose()
    }

    async fn put_checkpoint<T: Serialize>(&self, workflow_id: &str, key: &str, value: &T) -> Result<()> {
        let payload_json = serde_json::to_string(value)?;
        let model = checkpoint::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            workflow_id: Set(workflow_id.to_string()),
            checkpoint_key: Set(key.to_string()),
            payload_json: Set(payload_json),
            created_at: Set(now_rfc3339()),
        };
        model.insert(&self.conn).await?;
        Ok(())
    }

    /// Runs `f` and persists its result under `(workflow_id, checkpoint_key)`
    /// unless a checkpoint already exists, in which case the stored result
    /// is returned without re-running `f`. This is what makes a crash
    /// between two stages safe: on restart, every already-completed step
    /// replays from its checkpoint instead of redoing the work.
    ///
    /// # Errors
    /// Propagates errors from `f`, from checkpoint lookup, and from
    /// persisting the result.
    pub async fn run_checkpointed<T, F, Fut>(&self, workflow_id: &str, checkpoint_key: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(existing) = self.get_checkpoint(workflow_id, checkpoint_key).await? {
            debug!(workflow_id, checkpoint_key, "replaying checkpointed step");
            return Ok(existing);
        }

        let result = f().await?;
        self.put_checkpoint(workflow_id, checkpoint_key, &result).await?;
        Ok(result)
    }

    // -- signals ----------------------------------------------------------

    pub async fn emit_signal<T: Serialize>(&self, workflow_id: &str, signal_type: &str, payload: &T) -> Result<()> {
        let payload_json = serde_json::to_string(payload)?;
        let model = signal::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            workflow_id: Set(workflow_id.to_string()),
            signal_type: Set(signal_type.to_string()),
            payload_json: Set(payload_json),
            consumed: Set(false),
            created_at: Set(now_rfc3339()),
        };
        model.insert(&self.conn).await?;
        Ok(())
    }

    async fn take_signal<T: DeserializeOwned>(&self, workflow_id: &str, signal_type: &str) -> Result<Option<T>> {
        let Some(row) = signal::Entity::find()
            .filter(signal::Column::WorkflowId.eq(workflow_id))
            .filter(signal::Column::SignalType.eq(signal_type))
            .filter(signal::Column::Consumed.eq(false))
            .order_by_asc(signal::Column::Id)
            .one(&self.conn)
            .await?
        else {
            return Ok(None);
        };

        let payload = serde_json::from_str(&row.payload_json).context("decoding signal payload")?;

        let mut active: signal::ActiveModel = row.into();
        active.consumed = Set(true);
        active.update(&self.conn).await?;

        Ok(Some(payload))
    }

    /// Blocks the calling coordinator until a signal of `signal_type` is
    /// emitted for `workflow_id`, polling the store every
    /// [`CONDITION_POLL_INTERVAL`]. The equivalent of a `condition(predicate)`
    /// wait against a real durable-execution host.
    pub async fn await_signal<T: DeserializeOwned>(&self, workflow_id: &str, signal_type: &str) -> Result<T> {
        loop {
            if let Some(value) = self.take_signal(workflow_id, signal_type).await? {
                return Ok(value);
            }
            tokio::time::sleep(CONDITION_POLL_INTERVAL).await;
        }
    }

    /// Retries `f` up to [`RETRY_ATTEMPTS`] times with doubling backoff
    /// starting at [`RETRY_INITIAL_BACKOFF`], matching the activity retry
    /// policy described for copy/catalogue/matcher activities.
    ///
    /// # Errors
    /// Returns the last error once attempts are exhausted.
    pub async fn with_retry<T, F, Fut>(&self, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = RETRY_INITIAL_BACKOFF;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < RETRY_ATTEMPTS => {
                    warn!(attempt, error = %err, "activity failed, retrying after backoff");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn disc_run_id(workflow_id: &str, folder_name: &str) -> String {
    format!("{workflow_id}:{folder_name}")
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn stage_to_str(stage: Stage) -> String {
    serde_json::to_value(stage)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn str_to_stage(value: &str) -> Stage {
    serde_json::from_value(serde_json::Value::String(value.to_string())).unwrap_or(Stage::Failed)
}

fn folder_status_to_str(status: FolderStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn str_to_folder_status(value: &str) -> FolderStatus {
    serde_json::from_value(serde_json::Value::String(value.to_string())).unwrap_or(FolderStatus::Failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        value: u32,
    }

    async fn memory_store() -> DurableStore {
        DurableStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn workflow_stage_round_trips() {
        let store = memory_store().await;
        store.create_workflow_run("wf-1", "organize_library", "/media/in").await.unwrap();
        assert_eq!(store.get_workflow_stage("wf-1").await.unwrap(), Some(Stage::Copying));

        store.update_workflow_stage("wf-1", Stage::Structuring).await.unwrap();
        assert_eq!(store.get_workflow_stage("wf-1").await.unwrap(), Some(Stage::Structuring));
    }

    #[tokio::test]
    async fn checkpointed_step_runs_once() {
        let store = memory_store().await;
        store.create_workflow_run("wf-1", "organize_library", "/media/in").await.unwrap();

        let mut calls = 0;
        let first = store
            .run_checkpointed("wf-1", "fetch", || async {
                calls += 1;
                Ok(Payload { value: 42 })
            })
            .await
            .unwrap();
        assert_eq!(first, Payload { value: 42 });

        let second = store
            .run_checkpointed("wf-1", "fetch", || async {
                calls += 1;
                Ok(Payload { value: 99 })
            })
            .await
            .unwrap();

        assert_eq!(second, Payload { value: 42 });
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn signal_round_trips_and_is_consumed_once() {
        let store = memory_store().await;
        store.create_workflow_run("wf-1", "organize_library", "/media/in").await.unwrap();

        store.emit_signal("wf-1", "finalize_decision", &Payload { value: 7 }).await.unwrap();

        let received: Payload = store.await_signal("wf-1", "finalize_decision").await.unwrap();
        assert_eq!(received, Payload { value: 7 });

        assert!(store.take_signal::<Payload>("wf-1", "finalize_decision").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn disc_status_round_trips() {
        let store = memory_store().await;
        store.create_workflow_run("wf-1", "organize_library", "/media/in").await.unwrap();
        store.create_disc_run("wf-1", "Disc 1").await.unwrap();

        assert_eq!(store.get_disc_status("wf-1", "Disc 1").await.unwrap(), Some(FolderStatus::Pending));

        store.update_disc_status("wf-1", "Disc 1", FolderStatus::Matching, None).await.unwrap();
        assert_eq!(store.get_disc_status("wf-1", "Disc 1").await.unwrap(), Some(FolderStatus::Matching));
    }
}
