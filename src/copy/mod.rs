//! Parallel copy engine with bounded concurrency and integrity verification
//! (§4.1).

mod engine;

pub use engine::{verify, CopyEngine, IntegrityReport, NullSink, ProgressSink};
