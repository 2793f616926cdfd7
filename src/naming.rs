//! Filename and path naming rules (§3 "Renamed file", §4.4).

use crate::constants::{CLEAN_SHOW_NAME_FORBIDDEN, QUALITY_TOKENS};
use regex::Regex;
use std::sync::OnceLock;

/// Removes characters that are invalid in filesystem names and collapses
/// whitespace, per the `RenamedFile.new_file_name` invariant in §3.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.replace(CLEAN_SHOW_NAME_FORBIDDEN, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the Plex-style basename `<Show> - S<ss>E<ee>[ - <Title>].<ext>`.
#[must_use]
pub fn plex_file_name(
    show_name: &str,
    season: i32,
    episode: i32,
    title: Option<&str>,
    extension: &str,
) -> String {
    let safe_show = sanitize_filename(show_name);
    let mut base = format!("{safe_show} - S{season:02}E{episode:02}");
    if let Some(title) = title {
        let safe_title = sanitize_filename(title);
        if !safe_title.is_empty() {
            base.push_str(&format!(" - {safe_title}"));
        }
    }
    format!("{base}.{extension}")
}

/// Applies the `CleanShowName` rule from §4.4: strip forbidden characters,
/// collapse whitespace runs, trim.
#[must_use]
pub fn clean_show_name(name: &str) -> String {
    sanitize_filename(name).trim().to_string()
}

fn bracket_and_paren_groups() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)").expect("valid literal regex"))
}

fn season_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^S(\d{1,2})$").expect("valid literal regex"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid literal regex"))
}

/// Cleans a disc folder name before sending it to the catalogue search
/// activity, per §4.4 "Folder-name search cleaning":
/// - remove `[...]` and `(...)` groups
/// - remove quality tokens
/// - rewrite `S<digits>` to `Season <digits>`
/// - replace `_`, `.`, `-` runs with spaces
/// - collapse whitespace
///
/// Quality-token and season-digit recognition happen on `.`/`_`/whitespace-
/// delimited tokens (not hyphen-delimited), since several quality tokens
/// (`WEB-DL`) are themselves hyphenated; any hyphen surviving inside a kept
/// token is then turned into a space, matching the spec's final
/// separator-collapsing step.
#[must_use]
pub fn clean_folder_name_for_search(name: &str) -> String {
    let no_groups = bracket_and_paren_groups().replace_all(name, " ");

    let tokens: Vec<String> = no_groups
        .split(|c: char| c == '.' || c == '_' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .flat_map(|token| -> Vec<String> {
            if let Some(caps) = season_token().captures(token) {
                vec!["Season".to_string(), caps[1].to_string()]
            } else if QUALITY_TOKENS.contains(&token.to_lowercase().as_str()) {
                vec![]
            } else {
                vec![token.replace('-', " ")]
            }
        })
        .collect();

    whitespace_runs()
        .replace_all(&tokens.join(" "), " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plex_naming_with_title() {
        let name = plex_file_name("Cowboy Bebop", 1, 5, Some("Ballad of Fallen Angels"), "mkv");
        assert_eq!(name, "Cowboy Bebop - S01E05 - Ballad of Fallen Angels.mkv");
    }

    #[test]
    fn plex_naming_without_title() {
        let name = plex_file_name("Cowboy Bebop", 1, 5, None, "mkv");
        assert_eq!(name, "Cowboy Bebop - S01E05.mkv");
    }

    #[test]
    fn sanitize_strips_forbidden_characters() {
        assert_eq!(sanitize_filename("A: B / C?"), "A B C");
    }

    #[test]
    fn clean_show_name_collapses_whitespace() {
        assert_eq!(clean_show_name("  Attack   on : Titan  "), "Attack on Titan");
    }

    #[test]
    fn search_cleaning_strips_groups_and_quality_tokens() {
        let cleaned = clean_folder_name_for_search("[SubGroup] My.Show.S02.1080p.BluRay.x265");
        assert_eq!(cleaned, "My Show Season 02");
    }

    #[test]
    fn search_cleaning_rewrites_season_digits() {
        assert_eq!(clean_folder_name_for_search("Show_S3_WEB-DL"), "Show Season 3");
    }
}
