//! Occupancy engine configuration

use serde::{Deserialize, Serialize};

/// Width of every parking space region (pixels)
pub const DEFAULT_REGION_WIDTH: u32 = 107;

/// Height of every parking space region (pixels)
pub const DEFAULT_REGION_HEIGHT: u32 = 48;

/// A region is free when fewer foreground pixels than this fall inside it.
///
/// Calibrated for the demo camera at its native resolution; recalibrate for
/// other cameras or frame sizes.
pub const DEFAULT_FREE_THRESHOLD: u32 = 900;

/// Occupancy engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyConfig {
    /// Region width shared by all spaces
    pub region_width: u32,

    /// Region height shared by all spaces
    pub region_height: u32,

    /// Foreground pixel count below which a space is free
    pub free_threshold: u32,

    /// JPEG quality of the published annotated frame (1-100)
    pub jpeg_quality: u8,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            region_width: DEFAULT_REGION_WIDTH,
            region_height: DEFAULT_REGION_HEIGHT,
            free_threshold: DEFAULT_FREE_THRESHOLD,
            jpeg_quality: 90,
        }
    }
}
