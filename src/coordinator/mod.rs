//! The two coordinators that drive the pipeline: one per disc, one per
//! library run (§4.3, §4.4).

pub mod disc;
pub mod library;

pub use disc::{detection_signal_key, review_signal_key, DiscCoordinator, DiscInput, ProcessFolderResult};
pub use library::{
    disc_progress_key, DiscProgressTable, LibraryCoordinator, LibraryInput, OrganizeLibraryResult,
};
