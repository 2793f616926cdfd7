//! Subtitle extractor: shells out to `ffmpeg` to pull the first subtitle
//! stream out of a media file and reduce it to plain dialogue text (§6).

use crate::domain::SubtitleError;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleSource {
    Embedded,
    External,
}

#[derive(Debug, Clone)]
pub struct ExtractedSubtitle {
    pub file_path: PathBuf,
    pub file_name: String,
    pub content: String,
    pub source: SubtitleSource,
    pub language: Option<String>,
}

/// Extracts a plain-text subtitle transcript for one media file.
#[async_trait::async_trait]
pub trait SubtitleExtractor: Send + Sync {
    async fn extract(
        &self,
        media_path: &Path,
        media_name: &str,
        target_subtitles_dir: &Path,
    ) -> Result<Option<ExtractedSubtitle>, SubtitleError>;
}

/// Extracts embedded subtitle streams with `ffmpeg`. Idempotent: if
/// `<target_subtitles_dir>/<basename>.txt` already exists its content is
/// returned verbatim without re-invoking `ffmpeg`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegSubtitleExtractor;

#[async_trait::async_trait]
impl SubtitleExtractor for FfmpegSubtitleExtractor {
    async fn extract(
        &self,
        media_path: &Path,
        media_name: &str,
        target_subtitles_dir: &Path,
    ) -> Result<Option<ExtractedSubtitle>, SubtitleError> {
        let basename = Path::new(media_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| media_name.to_string());
        let cache_path = target_subtitles_dir.join(format!("{basename}.txt"));

        if let Ok(cached) = tokio::fs::read_to_string(&cache_path).await {
            debug!(media_name, "subtitle cache hit");
            return Ok(Some(ExtractedSubtitle {
                file_path: cache_path,
                file_name: format!("{basename}.txt"),
                content: cached,
                source: SubtitleSource::Embedded,
                language: None,
            }));
        }

        tokio::fs::create_dir_all(target_subtitles_dir)
            .await
            .map_err(|e| SubtitleError::Extraction(e.to_string()))?;

        let srt_path = target_subtitles_dir.join(format!("{basename}.srt"));

        let output = Command::new("ffmpeg")
            .args(["-y", "-i"])
            .arg(media_path)
            .args(["-map", "0:s:0?", "-f", "srt"])
            .arg(&srt_path)
            .output()
            .await
            .map_err(|e| SubtitleError::Extraction(format!("spawning ffmpeg: {e}")))?;

        if !output.status.success() || !srt_path.exists() {
            warn!(media_name, "ffmpeg produced no subtitle stream");
            return Ok(None);
        }

        let srt_text = tokio::fs::read_to_string(&srt_path)
            .await
            .map_err(|e| SubtitleError::Extraction(e.to_string()))?;
        let content = strip_srt_markup(&srt_text);

        if content.trim().is_empty() {
            return Err(SubtitleError::Empty(media_name.to_string()));
        }

        tokio::fs::write(&cache_path, &content)
            .await
            .map_err(|e| SubtitleError::Extraction(e.to_string()))?;

        Ok(Some(ExtractedSubtitle {
            file_path: cache_path,
            file_name: format!("{basename}.txt"),
            content,
            source: SubtitleSource::Embedded,
            language: None,
        }))
    }
}

/// Strips SRT cue numbers and timestamp lines, leaving bare dialogue text,
/// one line per cue, duplicate-consecutive lines collapsed (burned-in
/// subtitle extraction tends to repeat a line across several cues).
fn strip_srt_markup(srt: &str) -> String {
    let mut lines = Vec::new();
    let mut last: Option<&str> = None;

    for line in srt.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if trimmed.contains("-->") {
            continue;
        }
        if last != Some(trimmed) {
            lines.push(trimmed.to_string());
        }
        last = Some(trimmed);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_cue_numbers_and_timestamps() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nHello there\n\n2\n00:00:02,500 --> 00:00:03,000\nHello there\n\n3\n00:00:04,000 --> 00:00:05,000\nGoodbye\n";
        assert_eq!(strip_srt_markup(srt), "Hello there\nGoodbye");
    }
}
