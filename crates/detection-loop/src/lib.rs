//! Detection Loop for Continuous Occupancy Monitoring
//!
//! Pulls frames from a bound source on a background task, runs the occupancy
//! pipeline, publishes one event per cycle and paces itself between cycles.
//! Also serves single-frame requests through the same pipeline.

mod config;
mod publisher;
mod runner;

pub use config::{LoopConfig, CYCLE_PACING, DEFAULT_READ_TIMEOUT};
pub use publisher::{BroadcastPublisher, Publisher};
pub use runner::{DetectionLoop, LoopState, LoopStatus, StartOutcome};

use occupancy::OccupancyError;
use std::time::Duration;
use thiserror::Error;

/// Detection loop errors
#[derive(Debug, Error)]
pub enum LoopError {
    /// Start requested with no source bound
    #[error("No video loaded")]
    NoSource,

    /// Start requested with an empty region list
    #[error("No parking spaces defined")]
    NoRegions,

    /// The source failed for a reason other than end of stream
    #[error("Frame read failed: {0}")]
    SourceRead(String),

    /// The source did not deliver a frame in time
    #[error("Frame read timed out after {0:?}")]
    SourceTimeout(Duration),

    #[error(transparent)]
    Occupancy(#[from] OccupancyError),

    #[error("Processing task failed: {0}")]
    Task(String),
}

impl LoopError {
    /// Rejected before any state change
    pub fn is_precondition(&self) -> bool {
        matches!(self, LoopError::NoSource | LoopError::NoRegions)
    }
}
