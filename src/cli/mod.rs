//! Command-line surface (SPEC_FULL.md §E).
//!
//! Mirrors the query/signal surface in §4.5: `organize` enqueues a library
//! run, `status` reads its progress, and `approve`/`reject`/`review`/
//! `confirm-detection` emit the three signal types a human operator sends.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::{
    cmd_approve, cmd_confirm_detection, cmd_disc_status, cmd_organize, cmd_reject, cmd_review, cmd_status, cmd_worker,
};

#[derive(Parser)]
#[command(name = "sera", version, about = "Durable anime library organizer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Runs the worker process that hosts coordinators and the query/signal API.
    #[command(alias = "run")]
    Worker,

    /// Enqueues a new library run over `path`.
    Organize {
        path: PathBuf,

        /// Scans and reports planned actions without copying or moving anything.
        #[arg(long)]
        dry_run: bool,

        /// Confidence below which an episode match is routed to human review.
        #[arg(long)]
        confidence_threshold: Option<f32>,
    },

    /// Prints the current progress snapshot for a workflow.
    Status { workflow_id: String },

    /// Approves the staged layout, letting a workflow proceed to Stage 6.
    Approve { workflow_id: String },

    /// Rejects the staged layout, failing the workflow.
    Reject { workflow_id: String },

    /// Resolves one pending episode-match review item.
    Review {
        workflow_id: String,
        review_item_id: String,

        #[arg(long, conflicts_with = "reject")]
        approve: bool,

        #[arg(long, conflicts_with = "approve")]
        reject: bool,

        #[arg(long)]
        season: Option<i32>,

        #[arg(long)]
        episode: Option<i32>,
    },

    /// Prints a single disc's live progress snapshot, useful while debugging
    /// a stuck folder.
    DiscStatus { workflow_id: String, folder: String },

    /// Confirms or corrects a disc's episode-cluster detection.
    ConfirmDetection {
        workflow_id: String,
        folder: String,

        #[arg(long, conflicts_with = "reject")]
        confirm: bool,

        #[arg(long)]
        reject: bool,

        #[arg(long = "add")]
        add: Vec<String>,

        #[arg(long = "remove")]
        remove: Vec<String>,
    },
}
