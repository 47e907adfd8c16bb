//! Batch worker for the reframing engine.
//!
//! Reads a manifest of clips cut from one long-form source, reframes each clip
//! to 9:16 in turn, and writes a JSON report next to the outputs.

pub mod batch;
pub mod config;
pub mod error;
pub mod logging;

pub use batch::BatchRunner;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::ClipLogger;
