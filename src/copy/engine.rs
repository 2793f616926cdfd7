//! `CopyEngine`: bounded-concurrency file copy with heartbeats and
//! post-copy integrity verification (§4.1).

use crate::constants::concurrency::COPY_CONCURRENCY;
use crate::constants::durability::COPY_HEARTBEAT;
use crate::domain::{CopyError, CopyProgress, SourceFile};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

/// Receives incremental updates as the engine copies files.
///
/// Implementations are expected to be cheap to call frequently; the engine
/// invokes this on every launch, every heartbeat, and every completion.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_progress(&self, progress: CopyProgress);
}

/// A sink that discards every update; used by callers that only care about
/// the final result (e.g. tests, dry runs).
pub struct NullSink;

#[async_trait::async_trait]
impl ProgressSink for NullSink {
    async fn on_progress(&self, _progress: CopyProgress) {}
}

struct SharedProgress {
    total_files: Option<u64>,
    total_bytes: Option<u64>,
    files_copied: u64,
    bytes_copied: u64,
    current_files: HashSet<String>,
}

impl SharedProgress {
    fn snapshot(&self) -> CopyProgress {
        CopyProgress {
            total_files: self.total_files,
            total_bytes: self.total_bytes,
            files_copied: self.files_copied,
            bytes_copied: self.bytes_copied,
            current_files: self.current_files.iter().cloned().collect(),
        }
    }
}

/// Copies a batch of files from one root to another with bounded
/// concurrency, per-file heartbeats, and a byte-length integrity pass.
#[derive(Debug, Clone, Default)]
pub struct CopyEngine {
    concurrency: usize,
}

impl CopyEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self { concurrency: COPY_CONCURRENCY }
    }

    #[must_use]
    pub const fn with_concurrency(concurrency: usize) -> Self {
        Self { concurrency }
    }

    /// Copies `files` (relative to `source_root`) into `dest_root`,
    /// preserving their relative paths. A `dry_run` returns immediately
    /// without touching the filesystem. A destination that already exists
    /// with the same byte length is left untouched and counted as copied,
    /// so retrying a crashed batch never redoes completed transfers.
    ///
    /// # Errors
    /// Returns the first [`CopyError`] encountered; the rest of the batch is
    /// abandoned. Retrying is safe because every destination write is a
    /// by-path overwrite.
    pub async fn copy(
        &self,
        files: &[SourceFile],
        dest_root: &Path,
        progress_sink: Arc<dyn ProgressSink>,
        dry_run: bool,
    ) -> Result<(), CopyError> {
        if dry_run || files.is_empty() {
            return Ok(());
        }

        let total_bytes = files.iter().map(|f| f.size_bytes).sum();
        let shared = Arc::new(Mutex::new(SharedProgress {
            total_files: Some(u64::try_from(files.len()).unwrap_or(u64::MAX)),
            total_bytes: Some(total_bytes),
            files_copied: 0,
            bytes_copied: 0,
            current_files: HashSet::new(),
        }));

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = tokio::task::JoinSet::new();

        for file in files.iter().cloned() {
            let permit = Arc::clone(&semaphore);
            let shared = Arc::clone(&shared);
            let sink = Arc::clone(&progress_sink);
            let dest_root = dest_root.to_path_buf();

            tasks.spawn(async move {
                let _permit = permit
                    .acquire_owned()
                    .await
                    .expect("copy semaphore is never closed");
                copy_one_file(&file, &dest_root, &shared, sink.as_ref()).await
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.expect("copy task panicked");
            if let Err(err) = result {
                warn!(error = %err, "copy failed, abandoning remaining batch");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        Ok(())
    }
}

async fn copy_one_file(
    file: &SourceFile,
    dest_root: &Path,
    shared: &Arc<Mutex<SharedProgress>>,
    sink: &dyn ProgressSink,
) -> Result<(), CopyError> {
    let dest_path = dest_root.join(&file.path_relative_to_enum_root);

    {
        let mut guard = shared.lock().await;
        guard.current_files.insert(file.name.clone());
        sink.on_progress(guard.snapshot()).await;
    }

    if let Some(parent) = dest_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|cause| CopyError::Io {
                source_path: file.absolute_path.display().to_string(),
                dest_path: dest_path.display().to_string(),
                cause,
            })?;
    }

    let already_copied = tokio::fs::metadata(&dest_path)
        .await
        .is_ok_and(|m| m.len() == file.size_bytes);

    if already_copied {
        let mut guard = shared.lock().await;
        guard.current_files.remove(&file.name);
        guard.files_copied += 1;
        guard.bytes_copied += file.size_bytes;
        sink.on_progress(guard.snapshot()).await;
        metrics::counter!("copy_files_total", &[("outcome", "skipped")]).increment(1);
        return Ok(());
    }

    let heartbeat = {
        let file_name = file.name.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(COPY_HEARTBEAT).await;
                debug!(file = %file_name, "copy heartbeat");
            }
        })
    };

    let copy_result = tokio::fs::copy(&file.absolute_path, &dest_path).await;
    heartbeat.abort();

    copy_result.map_err(|cause| CopyError::Io {
        source_path: file.absolute_path.display().to_string(),
        dest_path: dest_path.display().to_string(),
        cause,
    })?;

    let mut guard = shared.lock().await;
    guard.current_files.remove(&file.name);
    guard.files_copied += 1;
    guard.bytes_copied += file.size_bytes;
    sink.on_progress(guard.snapshot()).await;

    metrics::counter!("copy_files_total", &[("outcome", "copied")]).increment(1);
    metrics::counter!("copy_bytes_total").increment(file.size_bytes);

    Ok(())
}

/// Result of [`verify`]: whether every source file has a byte-identical
/// counterpart at the same relative path under the output root.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub verified: bool,
    pub missing: Vec<PathBuf>,
}

/// Walks `source_root` and, for each file, requires an output file at the
/// same relative path with an identical byte length. Not a cryptographic
/// check; the purpose is to catch truncated copies, not tampering (§4.1).
///
/// # Errors
/// Returns an error if `source_root` cannot be walked.
pub async fn verify(source_root: &Path, output_root: &Path) -> std::io::Result<IntegrityReport> {
    let source_root = source_root.to_path_buf();
    let output_root = output_root.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut missing = Vec::new();

        for entry in walkdir::WalkDir::new(&source_root)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&source_root).unwrap_or(entry.path());
            let output_path = output_root.join(relative);

            let source_len = entry.metadata().map(|m| m.len()).unwrap_or_default();
            let matches = std::fs::metadata(&output_path)
                .map(|m| m.len() == source_len)
                .unwrap_or(false);

            if !matches {
                missing.push(relative.to_path_buf());
            }
        }

        Ok(IntegrityReport { verified: missing.is_empty(), missing })
    })
    .await
    .expect("verify worker thread panicked")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_source(dir: &Path, relative: &str, contents: &[u8]) -> SourceFile {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        SourceFile::new(&path, dir).unwrap()
    }

    #[tokio::test]
    async fn copies_files_and_reports_progress() {
        let source_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();

        let files = vec![
            make_source(source_dir.path(), "a.mkv", b"hello"),
            make_source(source_dir.path(), "Season 01/b.mkv", b"world!!"),
        ];

        let engine = CopyEngine::new();
        engine
            .copy(&files, dest_dir.path(), Arc::new(NullSink), false)
            .await
            .unwrap();

        assert!(dest_dir.path().join("a.mkv").exists());
        assert!(dest_dir.path().join("Season 01/b.mkv").exists());
    }

    #[tokio::test]
    async fn skips_destination_that_already_matches() {
        let source_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();

        let file = make_source(source_dir.path(), "a.mkv", b"hello");
        std::fs::write(dest_dir.path().join("a.mkv"), b"hello").unwrap();
        // Touch the source after the destination so a naive mtime check
        // would re-copy; only the byte length is compared.
        std::fs::write(source_dir.path().join("a.mkv"), b"hello").unwrap();

        let engine = CopyEngine::new();
        engine
            .copy(&[file], dest_dir.path(), Arc::new(NullSink), false)
            .await
            .unwrap();

        assert_eq!(std::fs::read(dest_dir.path().join("a.mkv")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn dry_run_performs_no_io() {
        let source_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let files = vec![make_source(source_dir.path(), "a.mkv", b"hello")];

        let engine = CopyEngine::new();
        engine
            .copy(&files, dest_dir.path(), Arc::new(NullSink), true)
            .await
            .unwrap();

        assert!(!dest_dir.path().join("a.mkv").exists());
    }

    #[tokio::test]
    async fn verify_detects_missing_and_truncated_files() {
        let source_dir = tempdir().unwrap();
        let output_dir = tempdir().unwrap();

        make_source(source_dir.path(), "a.mkv", b"0123456789");
        make_source(output_dir.path(), "a.mkv", b"012"); // truncated

        let report = verify(source_dir.path(), output_dir.path()).await.unwrap();
        assert!(!report.verified);
        assert_eq!(report.missing, vec![PathBuf::from("a.mkv")]);
    }

    #[tokio::test]
    async fn verify_passes_when_sizes_match() {
        let source_dir = tempdir().unwrap();
        let output_dir = tempdir().unwrap();

        make_source(source_dir.path(), "a.mkv", b"same size");
        make_source(output_dir.path(), "a.mkv", b"same size");

        let report = verify(source_dir.path(), output_dir.path()).await.unwrap();
        assert!(report.verified);
        assert!(report.missing.is_empty());
    }
}
