//! Frame Sources for the Parking Monitor
//!
//! Provides the decoded frame type and the sources the detection loop pulls from:
//! - Still images (a single uploaded picture, looped forever)
//! - Image sequences (a directory of numbered frames)
//! - Motion-JPEG clips (concatenated JPEG images)
//! - In-memory clips (tests and synthetic footage)
//! - Container video through FFmpeg (`ffmpeg` feature)

pub mod frame;
pub mod source;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use frame::VideoFrame;
pub use source::{open_source, FrameSource, ImageSequenceSource, MemorySource, MjpegSource, StillImageSource};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;

use thiserror::Error;

/// Frame source error types
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open source: {0}")]
    Open(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Failed to encode frame: {0}")]
    Encode(String),

    #[error("Frame read failed: {0}")]
    Read(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
