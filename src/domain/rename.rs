//! Renamed-file records (§3 "Renamed file").

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamedFile {
    pub original_path: PathBuf,
    pub original_relative_path: PathBuf,
    pub new_path: PathBuf,
    pub new_file_name: String,
    pub season_number: i32,
    pub episode_number: i32,
}

/// Parses `S<ss>E<ee>` back out of a Plex-style basename, per the
/// round-trip-naming testable property in §8.
#[must_use]
pub fn parse_season_episode(basename: &str) -> Option<(i32, i32)> {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"S(\d{2,})E(\d{2,})").expect("valid literal regex")
    });
    let caps = re.captures(basename)?;
    let season = caps.get(1)?.as_str().parse().ok()?;
    let episode = caps.get(2)?.as_str().parse().ok()?;
    Some((season, episode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_season_episode() {
        let name = "Cowboy Bebop - S01E05 - Ballad of Fallen Angels.mkv";
        assert_eq!(parse_season_episode(name), Some((1, 5)));
    }

    #[test]
    fn missing_pattern_returns_none() {
        assert_eq!(parse_season_episode("menu.mkv"), None);
    }
}
