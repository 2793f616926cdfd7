//! Process-scoped immutable configuration snapshot, loaded once at startup
//! from the environment (§6, SPEC_FULL.md §B).

use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub temporal: TemporalConfig,
    pub media: MediaRoots,
    pub llm: LlmConfig,
    pub general: GeneralConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    pub address: String,
    pub namespace: String,
    pub task_queue: String,
    pub max_concurrent_activities: usize,
    pub max_concurrent_workflow_tasks: usize,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            address: "localhost:7233".to_string(),
            namespace: "default".to_string(),
            task_queue: "SERA".to_string(),
            max_concurrent_activities: 10,
            max_concurrent_workflow_tasks: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRoots {
    pub input_root: String,
    pub processing_root: String,
    pub staging_root: String,
    pub output_root: String,
}

impl Default for MediaRoots {
    fn default() -> Self {
        Self {
            input_root: "/mnt/media/input".to_string(),
            processing_root: "/mnt/media/processing".to_string(),
            staging_root: "/mnt/media/staging".to_string(),
            output_root: "/mnt/media/output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub anthropic_model: String,
    pub anthropic_api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            anthropic_model: "claude-3-5-haiku-latest".to_string(),
            anthropic_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub database_path: String,
    pub log_level: String,
    pub http_port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/sera.db".to_string(),
            log_level: "info".to_string(),
            http_port: 7789,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics_enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temporal: TemporalConfig::default(),
            media: MediaRoots::default(),
            llm: LlmConfig::default(),
            general: GeneralConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from the process environment, falling back to
    /// the documented defaults (§6) for anything unset.
    pub fn load() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            temporal: TemporalConfig {
                address: env_or_default("TEMPORAL_ADDRESS", &defaults.temporal.address),
                namespace: env_or_default("TEMPORAL_NAMESPACE", &defaults.temporal.namespace),
                task_queue: env_or_default("TEMPORAL_TASK_QUEUE", &defaults.temporal.task_queue),
                max_concurrent_activities: env_parsed_or_default(
                    "MAX_CONCURRENT_ACTIVITIES",
                    defaults.temporal.max_concurrent_activities,
                ),
                max_concurrent_workflow_tasks: env_parsed_or_default(
                    "MAX_CONCURRENT_WORKFLOW_TASKS",
                    defaults.temporal.max_concurrent_workflow_tasks,
                ),
            },
            media: MediaRoots {
                input_root: env_or_default("MEDIA_INPUT_ROOT", &defaults.media.input_root),
                processing_root: env_or_default(
                    "MEDIA_PROCESSING_ROOT",
                    &defaults.media.processing_root,
                ),
                staging_root: env_or_default("MEDIA_STAGING_ROOT", &defaults.media.staging_root),
                output_root: env_or_default("MEDIA_OUTPUT_ROOT", &defaults.media.output_root),
            },
            llm: LlmConfig {
                anthropic_model: env_or_default("ANTHROPIC_MODEL", &defaults.llm.anthropic_model),
                anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            },
            general: GeneralConfig {
                database_path: env_or_default("DATABASE_PATH", &defaults.general.database_path),
                log_level: env_or_default("LOG_LEVEL", &defaults.general.log_level),
                http_port: env_parsed_or_default("HTTP_PORT", defaults.general.http_port),
            },
            observability: ObservabilityConfig {
                metrics_enabled: env_parsed_or_default(
                    "METRICS_ENABLED",
                    defaults.observability.metrics_enabled,
                ),
            },
        };

        info!(
            task_queue = %config.temporal.task_queue,
            max_activities = config.temporal.max_concurrent_activities,
            max_workflow_tasks = config.temporal.max_concurrent_workflow_tasks,
            "resolved configuration"
        );

        Ok(config)
    }

    /// Validates cross-field invariants not expressible via defaults alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.temporal.task_queue.trim().is_empty() {
            anyhow::bail!("TEMPORAL_TASK_QUEUE cannot be empty");
        }
        if self.temporal.max_concurrent_activities == 0 {
            anyhow::bail!("MAX_CONCURRENT_ACTIVITIES must be > 0");
        }
        if self.temporal.max_concurrent_workflow_tasks == 0 {
            anyhow::bail!("MAX_CONCURRENT_WORKFLOW_TASKS must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.temporal.address, "localhost:7233");
        assert_eq!(config.temporal.namespace, "default");
        assert_eq!(config.temporal.task_queue, "SERA");
        assert_eq!(config.llm.anthropic_model, "claude-3-5-haiku-latest");
        assert_eq!(config.media.input_root, "/mnt/media/input");
    }

    #[test]
    fn rejects_empty_task_queue() {
        let mut config = Config::default();
        config.temporal.task_queue.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.temporal.max_concurrent_activities = 0;
        assert!(config.validate().is_err());
    }
}
