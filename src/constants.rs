//! Application-wide constants.
//!
//! Centralizes magic values used across multiple modules.

/// Video file extensions recognized by the episode-cluster detector and the
/// disc/library scanners (§4.2).
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "webm", "m4v", "mov", "wmv", "flv"];

/// Default copy engine concurrency (§5) used when a caller builds a
/// [`crate::copy::CopyEngine`] without an explicit bound, e.g. in tests and
/// the disc coordinator's own rename-copy step. The worker process itself
/// sizes both the copy engine and the disc fan-out from
/// `TemporalConfig::max_concurrent_activities`/`max_concurrent_workflow_tasks`
/// instead (§B).
pub mod concurrency {
    pub const COPY_CONCURRENCY: usize = 4;
}

/// Copy-activity heartbeat / retry policy (§5).
pub mod durability {
    use std::time::Duration;

    /// How often an in-flight copy emits a liveness beacon.
    pub const COPY_HEARTBEAT: Duration = Duration::from_secs(30);

    /// Default activity retry attempts.
    pub const RETRY_ATTEMPTS: u32 = 3;

    /// Initial backoff before the first retry; doubles on each subsequent
    /// attempt.
    pub const RETRY_INITIAL_BACKOFF: Duration = Duration::from_secs(5);

    /// Poll interval used by `condition(predicate)`-style waits.
    pub const CONDITION_POLL_INTERVAL: Duration = Duration::from_millis(500);
}

/// LLM matcher input limits (§6).
pub mod llm {
    /// Total subtitle text passed to the matcher, capped by proportional
    /// per-file truncation.
    pub const MAX_SUBTITLE_CHARS: usize = 500_000;
}

/// Quality tokens stripped during folder-name search cleaning (§4.4).
pub const QUALITY_TOKENS: &[&str] = &[
    "1080p", "720p", "480p", "2160p", "4k", "x264", "x265", "hevc", "avc", "flac", "aac", "bd",
    "bluray", "bdrip", "web-dl", "webrip",
];

/// Filesystem characters stripped by the `CleanShowName` rule (§4.4).
pub const CLEAN_SHOW_NAME_FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Default `confidence_threshold` below which an LLM episode match is
/// routed to human review (§4.3, §8 scenario 3).
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.85;
