//! Catalogue-shaped series metadata (§3 "Series metadata").

use serde::{Deserialize, Serialize};

/// A single catalogue episode entry within a season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeEntry {
    pub number: i32,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// One season of a series, as resolved from the catalogue's prequel/sequel chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub season_number: i32,
    pub catalogue_id: i32,
    pub title_romaji: String,
    pub title_english: Option<String>,
    pub episode_count: i32,
    pub episodes: Vec<EpisodeEntry>,
}

impl Season {
    #[must_use]
    pub fn find_episode(&self, number: i32) -> Option<&EpisodeEntry> {
        self.episodes.iter().find(|e| e.number == number)
    }
}

/// The full ordered season list for a series (§3 invariants: dense season
/// numbers from 1, `total_episodes = sum(season.episode_count)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub source_title: String,
    pub seasons: Vec<Season>,
}

impl SeriesMetadata {
    /// Total episode count across every season.
    #[must_use]
    pub fn total_episodes(&self) -> i32 {
        self.seasons.iter().map(|s| s.episode_count).sum()
    }

    /// Whether season numbers are dense from 1, per the §3 invariant.
    #[must_use]
    pub fn has_dense_season_numbers(&self) -> bool {
        self.seasons
            .iter()
            .map(|s| s.season_number)
            .eq(1..=i32::try_from(self.seasons.len()).unwrap_or(0))
    }

    #[must_use]
    pub fn season(&self, number: i32) -> Option<&Season> {
        self.seasons.iter().find(|s| s.season_number == number)
    }

    /// Whether `(season_number, episode_number)` points at a real catalogue
    /// entry, per the Episode match invariant in §3.
    #[must_use]
    pub fn contains(&self, season_number: i32, episode_number: i32) -> bool {
        self.season(season_number)
            .is_some_and(|s| s.find_episode(episode_number).is_some())
    }

    /// Resolves the show's display name: first season's English title, else
    /// romaji, else the caller-supplied fallback (the source directory
    /// basename per §4.4 "Show-name resolution").
    #[must_use]
    pub fn show_name(&self, fallback: &str) -> String {
        self.seasons.first().map_or_else(
            || fallback.to_string(),
            |s| s.title_english.clone().unwrap_or_else(|| s.title_romaji.clone()),
        )
    }

    /// Looks up an episode's title, falling back to `"Episode N"` per the
    /// disc coordinator's review-approval path in §4.3.
    #[must_use]
    pub fn episode_title(&self, season_number: i32, episode_number: i32) -> String {
        self.season(season_number)
            .and_then(|s| s.find_episode(episode_number))
            .and_then(|e| e.title.clone())
            .unwrap_or_else(|| format!("Episode {episode_number}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(seasons: Vec<i32>) -> SeriesMetadata {
        SeriesMetadata {
            source_title: "Test".to_string(),
            seasons: seasons
                .into_iter()
                .map(|n| Season {
                    season_number: n,
                    catalogue_id: n,
                    title_romaji: format!("Season {n}"),
                    title_english: None,
                    episode_count: 12,
                    episodes: (1..=12)
                        .map(|e| EpisodeEntry {
                            number: e,
                            title: Some(format!("Ep {e}")),
                            description: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn dense_season_numbers() {
        assert!(series(vec![1, 2, 3]).has_dense_season_numbers());
        assert!(!series(vec![1, 3]).has_dense_season_numbers());
    }

    #[test]
    fn total_episodes_sums_seasons() {
        assert_eq!(series(vec![1, 2]).total_episodes(), 24);
    }

    #[test]
    fn episode_title_falls_back() {
        let s = series(vec![1]);
        assert_eq!(s.episode_title(1, 1), "Ep 1");
        assert_eq!(s.episode_title(1, 99), "Episode 99");
    }
}
