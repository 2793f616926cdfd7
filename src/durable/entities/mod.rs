pub mod checkpoint;
pub mod disc_run;
pub mod signal;
pub mod workflow_run;
