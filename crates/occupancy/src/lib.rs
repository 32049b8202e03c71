//! Parking Space Occupancy Engine
//!
//! Classifies fixed regions of a frame as free or occupied:
//! - Preprocessing to a binary edge-density map
//! - Per-region foreground pixel counting against a threshold
//! - Annotation of the classified frame for viewers
//! - Packaging of the result as a `DetectionEvent`

pub mod annotate;
pub mod classifier;
pub mod config;
mod draw;
pub mod event;
mod kernel;
pub mod pipeline;
pub mod preprocess;
pub mod region;
mod text;

pub use annotate::FrameAnnotator;
pub use classifier::{Classification, OutlineStyle, SpaceClassifier, SpaceResult};
pub use config::{OccupancyConfig, DEFAULT_FREE_THRESHOLD, DEFAULT_REGION_HEIGHT, DEFAULT_REGION_WIDTH};
pub use event::DetectionEvent;
pub use pipeline::{OccupancyPipeline, PipelineOutput};
pub use preprocess::{preprocess, BinaryMap};
pub use region::Region;

use frame_source::SourceError;
use thiserror::Error;

/// Occupancy engine error types
#[derive(Error, Debug)]
pub enum OccupancyError {
    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("Frame encode failed: {0}")]
    Encode(String),
}

impl From<SourceError> for OccupancyError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Encode(msg) => OccupancyError::Encode(msg),
            other => OccupancyError::Decode(other.to_string()),
        }
    }
}
