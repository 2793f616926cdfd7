//! Anime catalogue client: a GraphQL-speaking HTTP client against AniList,
//! with prequel/sequel traversal to assemble a series' full season list (§6).

use crate::domain::{CatalogueError, EpisodeEntry};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

const ANILIST_API: &str = "https://graphql.anilist.co";

#[derive(Debug, Clone)]
pub struct AnimeSearchResult {
    pub id: i32,
    pub title_romaji: String,
    pub title_english: Option<String>,
    pub format: String,
}

#[derive(Debug, Clone)]
pub struct MinimalAnimeEntry {
    pub id: i32,
    pub title_romaji: String,
    pub title_english: Option<String>,
    pub episode_count: Option<i32>,
}

/// Three activities exposed to the library coordinator (§6): a name search,
/// a prequel/sequel traversal that assembles every season of a series, and
/// a per-season episode list fetch.
#[async_trait::async_trait]
pub trait AnimeCatalogueClient: Send + Sync {
    async fn search_anime_by_name(
        &self,
        cleaned_name: &str,
    ) -> Result<Option<AnimeSearchResult>, CatalogueError>;

    async fn discover_all_seasons(
        &self,
        first_id: i32,
    ) -> Result<Vec<MinimalAnimeEntry>, CatalogueError>;

    async fn fetch_season_episodes(
        &self,
        id: i32,
        expected_count: i32,
    ) -> Result<Vec<EpisodeEntry>, CatalogueError>;
}

#[derive(Clone)]
pub struct AnilistCatalogueClient {
    client: Client,
}

impl Default for AnilistCatalogueClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AnilistCatalogueClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent("sera/1.0")
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn graphql<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: impl Serialize,
    ) -> Result<T, CatalogueError> {
        #[derive(Serialize)]
        struct Request<'a, V> {
            query: &'a str,
            variables: V,
        }

        self.client
            .post(ANILIST_API)
            .json(&Request { query, variables })
            .send()
            .await
            .map_err(|e| CatalogueError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| CatalogueError::Request(e.to_string()))
    }

    async fn fetch_relation_id(&self, id: i32, relation: &str) -> Result<Option<i32>, CatalogueError> {
        #[derive(Serialize)]
        struct Vars {
            id: i32,
        }
        #[derive(Deserialize)]
        struct Response {
            data: Option<Data>,
        }
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "Media")]
            media: Option<MediaRelations>,
        }
        #[derive(Deserialize)]
        struct MediaRelations {
            relations: Relations,
        }
        #[derive(Deserialize)]
        struct Relations {
            edges: Vec<RelationEdge>,
        }
        #[derive(Deserialize)]
        struct RelationEdge {
            #[serde(rename = "relationType")]
            relation_type: String,
            node: RelationNode,
        }
        #[derive(Deserialize)]
        struct RelationNode {
            id: i32,
            format: Option<String>,
        }

        let query = r"
            query ($id: Int) {
                Media(id: $id, type: ANIME) {
                    relations {
                        edges {
                            relationType(version: 2)
                            node { id format }
                        }
                    }
                }
            }
        ";

        let response: Response = self.graphql(query, Vars { id }).await?;
        let edges = response
            .data
            .and_then(|d| d.media)
            .map(|m| m.relations.edges)
            .unwrap_or_default();

        Ok(edges
            .into_iter()
            .find(|e| e.relation_type == relation && e.node.format.as_deref() == Some("TV"))
            .map(|e| e.node.id))
    }

    async fn fetch_minimal_entry(&self, id: i32) -> Result<Option<MinimalAnimeEntry>, CatalogueError> {
        #[derive(Serialize)]
        struct Vars {
            id: i32,
        }
        #[derive(Deserialize)]
        struct Response {
            data: Option<Data>,
        }
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "Media")]
            media: Option<Media>,
        }
        #[derive(Deserialize)]
        struct Media {
            id: i32,
            title: Title,
            format: Option<String>,
            episodes: Option<i32>,
        }
        #[derive(Deserialize)]
        struct Title {
            romaji: Option<String>,
            english: Option<String>,
        }

        let query = r"
            query ($id: Int) {
                Media(id: $id, type: ANIME) {
                    id
                    title { romaji english }
                    format
                    episodes
                }
            }
        ";

        let response: Response = self.graphql(query, Vars { id }).await?;
        let Some(media) = response.data.and_then(|d| d.media) else {
            return Ok(None);
        };

        if media.format.as_deref() != Some("TV") {
            return Ok(None);
        }

        Ok(Some(MinimalAnimeEntry {
            id: media.id,
            title_romaji: media.title.romaji.unwrap_or_default(),
            title_english: media.title.english,
            episode_count: media.episodes,
        }))
    }
}

#[async_trait::async_trait]
impl AnimeCatalogueClient for AnilistCatalogueClient {
    async fn search_anime_by_name(
        &self,
        cleaned_name: &str,
    ) -> Result<Option<AnimeSearchResult>, CatalogueError> {
        #[derive(Serialize)]
        struct Vars<'a> {
            search: &'a str,
        }
        #[derive(Deserialize)]
        struct Response {
            data: Option<Data>,
        }
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "Page")]
            page: Page,
        }
        #[derive(Deserialize)]
        struct Page {
            media: Vec<Media>,
        }
        #[derive(Deserialize)]
        struct Media {
            id: i32,
            title: Title,
            format: Option<String>,
        }
        #[derive(Deserialize)]
        struct Title {
            romaji: Option<String>,
            english: Option<String>,
        }

        let query = r"
            query ($search: String) {
                Page(page: 1, perPage: 5) {
                    media(search: $search, type: ANIME) {
                        id
                        title { romaji english }
                        format
                    }
                }
            }
        ";

        let response: Response = self.graphql(query, Vars { search: cleaned_name }).await?;
        let media = response.data.map(|d| d.page.media).unwrap_or_default();

        Ok(media.into_iter().next().map(|m| AnimeSearchResult {
            id: m.id,
            title_romaji: m.title.romaji.unwrap_or_default(),
            title_english: m.title.english,
            format: m.format.unwrap_or_else(|| "UNKNOWN".to_string()),
        }))
    }

    async fn discover_all_seasons(
        &self,
        first_id: i32,
    ) -> Result<Vec<MinimalAnimeEntry>, CatalogueError> {
        let mut visited = HashSet::new();
        let mut current = first_id;

        loop {
            if !visited.insert(current) {
                break;
            }
            match self.fetch_relation_id(current, "PREQUEL").await? {
                Some(prequel_id) => current = prequel_id,
                None => break,
            }
        }

        let root_id = current;
        debug!(first_id, root_id, "resolved series root for sequel walk");

        let mut seasons = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(root_id);

        while let Some(id) = cursor {
            if !visited.insert(id) {
                break;
            }

            if let Some(entry) = self.fetch_minimal_entry(id).await? {
                seasons.push(entry);
            }

            cursor = self.fetch_relation_id(id, "SEQUEL").await?;
        }

        if seasons.is_empty() {
            return Err(CatalogueError::NotFound(first_id.to_string()));
        }

        Ok(seasons)
    }

    async fn fetch_season_episodes(
        &self,
        id: i32,
        expected_count: i32,
    ) -> Result<Vec<EpisodeEntry>, CatalogueError> {
        #[derive(Serialize)]
        struct Vars {
            id: i32,
        }
        #[derive(Deserialize)]
        struct Response {
            data: Option<Data>,
        }
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "Media")]
            media: Option<Media>,
        }
        #[derive(Deserialize)]
        struct Media {
            #[serde(rename = "streamingEpisodes")]
            streaming_episodes: Vec<StreamingEpisode>,
        }
        #[derive(Deserialize)]
        struct StreamingEpisode {
            title: Option<String>,
        }

        let query = r"
            query ($id: Int) {
                Media(id: $id, type: ANIME) {
                    streamingEpisodes { title }
                }
            }
        ";

        let response: Response = self.graphql(query, Vars { id }).await?;
        let streaming = response
            .data
            .and_then(|d| d.media)
            .map(|m| m.streaming_episodes)
            .unwrap_or_default();

        let mut by_number = std::collections::HashMap::new();
        for episode in streaming {
            let Some(title) = episode.title else { continue };
            if let Some((number, rest)) = split_episode_title(&title) {
                by_number.insert(number, rest);
            }
        }

        let episodes = (1..=expected_count)
            .map(|number| EpisodeEntry {
                number,
                title: by_number.get(&number).cloned().flatten(),
                description: None,
            })
            .collect();

        Ok(episodes)
    }
}

fn episode_title_pattern() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?i)^Episode\s+(\d+)\s*[-:]?\s*(.*)$").expect("valid literal regex")
    })
}

fn split_episode_title(title: &str) -> Option<(i32, Option<String>)> {
    let caps = episode_title_pattern().captures(title)?;
    let number: i32 = caps[1].parse().ok()?;
    let rest = caps[2].trim();
    Some((number, if rest.is_empty() { None } else { Some(rest.to_string()) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_numbered_titles_with_trailing_text() {
        assert_eq!(
            split_episode_title("Episode 3 - The Reckoning"),
            Some((3, Some("The Reckoning".to_string())))
        );
    }

    #[test]
    fn splits_bare_numbered_titles() {
        assert_eq!(split_episode_title("Episode 12"), Some((12, None)));
    }

    #[test]
    fn rejects_unrelated_titles() {
        assert_eq!(split_episode_title("Special OVA"), None);
    }
}
