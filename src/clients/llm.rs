//! LLM matcher: a structured-output prompt call that assigns each disc's
//! subtitle transcripts to `(season, episode)` slots (§6).

use crate::constants::llm::MAX_SUBTITLE_CHARS;
use crate::domain::{EpisodeMatch, MatcherError, SeriesMetadata};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;

const ANTHROPIC_API: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct SubtitleInput {
    pub file_name: String,
    pub file_path: PathBuf,
    pub content: String,
}

/// `matchEpisodes(subtitles, metadata) -> { matches: EpisodeMatch[] }` (§6).
#[async_trait::async_trait]
pub trait EpisodeMatcher: Send + Sync {
    async fn match_episodes(
        &self,
        subtitles: &[SubtitleInput],
        metadata: &SeriesMetadata,
    ) -> Result<Vec<EpisodeMatch>, MatcherError>;
}

#[derive(Clone)]
pub struct AnthropicEpisodeMatcher {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicEpisodeMatcher {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self { client: Client::new(), api_key, model }
    }
}

/// Caps total subtitle text at [`MAX_SUBTITLE_CHARS`] by truncating each
/// file's content proportionally to its share of the total.
fn truncate_proportionally(subtitles: &[SubtitleInput]) -> Vec<(String, String)> {
    let total: usize = subtitles.iter().map(|s| s.content.chars().count()).sum();

    if total <= MAX_SUBTITLE_CHARS {
        return subtitles.iter().map(|s| (s.file_name.clone(), s.content.clone())).collect();
    }

    let scale = MAX_SUBTITLE_CHARS as f64 / total as f64;

    subtitles
        .iter()
        .map(|s| {
            let keep = (s.content.chars().count() as f64 * scale) as usize;
            let truncated: String = s.content.chars().take(keep).collect();
            (s.file_name.clone(), truncated)
        })
        .collect()
}

fn build_prompt(subtitles: &[(String, String)], metadata: &SeriesMetadata) -> String {
    let seasons_desc: Vec<String> = metadata
        .seasons
        .iter()
        .map(|s| format!("Season {}: {} ({} episodes)", s.season_number, s.title_romaji, s.episode_count))
        .collect();

    let files_desc: Vec<String> = subtitles
        .iter()
        .map(|(name, content)| format!("### {name}\n{content}"))
        .collect();

    format!(
        "Series: {}\n\nSeasons:\n{}\n\nFor each of the following files, identify the (season, episode) \
         slot its subtitle transcript belongs to, a confidence between 0 and 1, and a short reasoning.\n\n{}",
        metadata.source_title,
        seasons_desc.join("\n"),
        files_desc.join("\n\n"),
    )
}

fn matches_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "matches": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "file_name": { "type": "string" },
                        "season_number": { "type": "integer" },
                        "episode_number": { "type": "integer" },
                        "episode_title": { "type": "string" },
                        "confidence": { "type": "number" },
                        "reasoning": { "type": "string" },
                    },
                    "required": ["file_name", "season_number", "episode_number", "confidence", "reasoning"],
                },
            },
        },
        "required": ["matches"],
    })
}

#[derive(Deserialize)]
struct ToolMatch {
    file_name: String,
    season_number: i32,
    episode_number: i32,
    #[serde(default)]
    episode_title: String,
    confidence: f32,
    reasoning: String,
}

#[derive(Deserialize)]
struct ToolInput {
    matches: Vec<ToolMatch>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse { input: serde_json::Value },
    #[serde(other)]
    Other,
}

#[async_trait::async_trait]
impl EpisodeMatcher for AnthropicEpisodeMatcher {
    async fn match_episodes(
        &self,
        subtitles: &[SubtitleInput],
        metadata: &SeriesMetadata,
    ) -> Result<Vec<EpisodeMatch>, MatcherError> {
        let truncated = truncate_proportionally(subtitles);
        let prompt = build_prompt(&truncated, metadata);

        let body = json!({
            "model": self.model,
            "max_tokens": 4096,
            "messages": [{ "role": "user", "content": prompt }],
            "tools": [{
                "name": "submit_matches",
                "description": "Submit the (season, episode) assignment for every subtitle file.",
                "input_schema": matches_schema(),
            }],
            "tool_choice": { "type": "tool", "name": "submit_matches" },
        });

        let response = self
            .client
            .post(ANTHROPIC_API)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| MatcherError::Request(e.to_string()))?
            .json::<MessagesResponse>()
            .await
            .map_err(|e| MatcherError::Request(e.to_string()))?;

        let tool_input = response
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::ToolUse { input } => Some(input),
                ContentBlock::Other => None,
            })
            .ok_or_else(|| MatcherError::InvalidResponse("no tool_use block in response".to_string()))?;

        let parsed: ToolInput = serde_json::from_value(tool_input)
            .map_err(|e| MatcherError::InvalidResponse(e.to_string()))?;

        let file_paths: std::collections::HashMap<&str, &PathBuf> =
            subtitles.iter().map(|s| (s.file_name.as_str(), &s.file_path)).collect();

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| EpisodeMatch {
                file_path: file_paths.get(m.file_name.as_str()).map_or_else(PathBuf::new, |p| (*p).clone()),
                file_name: m.file_name,
                season_number: m.season_number,
                episode_number: m.episode_number,
                episode_title: m.episode_title,
                confidence: m.confidence,
                reasoning: m.reasoning,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(name: &str, content: &str) -> SubtitleInput {
        SubtitleInput { file_name: name.to_string(), file_path: PathBuf::from(name), content: content.to_string() }
    }

    #[test]
    fn keeps_content_under_the_cap_untouched() {
        let subtitles = vec![sub("a.txt", "hello world")];
        let result = truncate_proportionally(&subtitles);
        assert_eq!(result[0].1, "hello world");
    }

    #[test]
    fn truncates_proportionally_when_over_cap() {
        let big = "x".repeat(MAX_SUBTITLE_CHARS + 100);
        let subtitles = vec![sub("a.txt", &big), sub("b.txt", &big)];
        let result = truncate_proportionally(&subtitles);
        let total: usize = result.iter().map(|(_, c)| c.chars().count()).sum();
        assert!(total <= MAX_SUBTITLE_CHARS);
    }
}
