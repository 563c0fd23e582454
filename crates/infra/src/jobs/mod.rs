//! Scheduled pin dispatch.
//!
//! ## Design
//!
//! - A run is a single sequential pass over at most `batch_size` due entries
//! - Each entry's outcome is isolated: it becomes persisted state plus one
//!   `DispatchResult`, never an error for the whole run
//! - Only one run executes at a time per process
//!
//! ## Components
//!
//! - `DispatchJob`: selection, credential refresh, create, outcome recording
//! - `DispatchRunner`: optional in-process timer that triggers the job
//! - `DispatchPolicy`: retry ceiling, batch size, per-call timeout

pub mod dispatch;
pub mod runner;
pub mod types;

pub use dispatch::DispatchJob;
pub use runner::{DispatchRunner, DispatchRunnerHandle};
pub use types::{BATCH_SIZE, DispatchFailure, DispatchPolicy, JobError, MAX_RETRIES};
