//! Episode cluster detector: a file-size histogram heuristic that separates
//! episodes from extras inside a disc folder (§4.2).

use crate::constants::VIDEO_EXTENSIONS;
use crate::domain::{Confidence, DetectionResult, SourceFile};
use std::path::Path;

/// Walks `folder` recursively, skipping any subdirectory whose name begins
/// with `_` (reserved working dirs), and classifies the video files it
/// finds into episodes and non-episodes by size clustering.
///
/// # Errors
/// Returns an error if `folder` cannot be walked.
pub fn detect(folder: &Path) -> std::io::Result<DetectionResult> {
    let mut video_files = Vec::new();

    for entry in walkdir::WalkDir::new(folder)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with('_'))
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let is_video = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()));

        if is_video {
            video_files.push(SourceFile::new(entry.path(), folder)?);
        }
    }

    Ok(classify(video_files))
}

fn classify(mut video_files: Vec<SourceFile>) -> DetectionResult {
    let n = video_files.len();

    if n == 0 {
        return DetectionResult::empty();
    }

    if n <= 2 {
        let confidence = if n == 1 { Confidence::Medium } else { Confidence::Low };
        return DetectionResult {
            episodes: video_files,
            non_episodes: Vec::new(),
            confidence,
            cluster_median: None,
            cluster_range: None,
        };
    }

    video_files.sort_by_key(|f| f.size_bytes);
    let sizes: Vec<u64> = video_files.iter().map(|f| f.size_bytes).collect();
    let min = sizes[0];
    let max = *sizes.last().expect("non-empty");

    const MIN_BIN_WIDTH: u64 = 50 * 1024 * 1024;
    let bin_width = MIN_BIN_WIDTH.max((max - min) / 20);

    let bin_of = |size: u64| -> u64 {
        if bin_width == 0 {
            0
        } else {
            (size - min) / bin_width
        }
    };

    let mut bins: std::collections::BTreeMap<u64, Vec<u64>> = std::collections::BTreeMap::new();
    for &size in &sizes {
        bins.entry(bin_of(size)).or_default().push(size);
    }

    let best_bin = bins
        .iter()
        .max_by(|a, b| {
            a.1.len()
                .cmp(&b.1.len())
                .then_with(|| b.0.cmp(a.0)) // ties -> smaller bin index wins
        })
        .map(|(_, sizes)| sizes.clone())
        .unwrap_or_default();

    let median = median_of(&best_bin);
    let lower = (median as f64 * 0.8) as u64;
    let upper = (median as f64 * 1.2) as u64;

    let (episodes, non_episodes): (Vec<_>, Vec<_>) =
        video_files.into_iter().partition(|f| (lower..=upper).contains(&f.size_bytes));

    let confidence = if episodes.len() >= 6 && episodes.len() as f64 / n as f64 > 0.6 {
        Confidence::High
    } else if episodes.len() >= 3 {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    DetectionResult {
        episodes,
        non_episodes,
        confidence,
        cluster_median: Some(median),
        cluster_range: Some((lower, upper)),
    }
}

fn median_of(sizes: &[u64]) -> u64 {
    let mut sorted = sizes.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, size: usize) {
        std::fs::write(dir.join(name), vec![0u8; size]).unwrap();
    }

    #[test]
    fn empty_folder_is_low_confidence() {
        let dir = tempdir().unwrap();
        let result = detect(dir.path()).unwrap();
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.total_files(), 0);
    }

    #[test]
    fn single_file_is_medium_confidence_episode() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "ep.mkv", 100);
        let result = detect(dir.path()).unwrap();
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.episodes.len(), 1);
    }

    #[test]
    fn clusters_similarly_sized_files_as_episodes() {
        let dir = tempdir().unwrap();
        let episode_size = 300 * 1024 * 1024;
        for i in 0..8 {
            write_file(dir.path(), &format!("ep{i}.mkv"), episode_size);
        }
        write_file(dir.path(), "trailer.mkv", 20 * 1024 * 1024);
        write_file(dir.path(), "menu.mkv", 5 * 1024 * 1024);

        let result = detect(dir.path()).unwrap();
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.episodes.len(), 8);
        assert_eq!(result.non_episodes.len(), 2);
    }

    #[test]
    fn ignores_reserved_working_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("_working")).unwrap();
        write_file(&dir.path().join("_working"), "hidden.mkv", 100);
        write_file(dir.path(), "ep.mkv", 100);

        let result = detect(dir.path()).unwrap();
        assert_eq!(result.total_files(), 1);
    }
}
