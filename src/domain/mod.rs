pub mod detection;
pub mod errors;
pub mod matching;
pub mod progress;
pub mod rename;
pub mod review;
pub mod series;
pub mod source_file;

pub use detection::{Confidence, DetectionResult};
pub use errors::{CatalogueError, CopyError, DiscError, LibraryError, MatcherError, SubtitleError};
pub use matching::EpisodeMatch;
pub use progress::{
    CopyProgress, FolderStatus, MetadataStatus, MetadataSummary, OrganizeLibraryProgress,
    ProcessFolderProgress, SeasonSummary, Stage, StructuringProgress, TreeNode,
};
pub use rename::RenamedFile;
pub use review::{DetectionConfirmation, FinalizeDecision, ReviewDecision, ReviewItem};
pub use series::{EpisodeEntry, Season, SeriesMetadata};
pub use source_file::SourceFile;
