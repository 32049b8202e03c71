//! Per-space occupancy classification

use serde::Serialize;
use tracing::trace;

use crate::preprocess::BinaryMap;
use crate::region::Region;
use crate::OccupancyConfig;

/// Outline used when drawing a classified space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutlineStyle {
    /// RGB colour
    pub color: [u8; 3],
    /// Line thickness (pixels)
    pub thickness: u32,
}

impl OutlineStyle {
    /// Free spaces: green, thick
    pub const FREE: OutlineStyle = OutlineStyle {
        color: [0, 255, 0],
        thickness: 5,
    };

    /// Occupied spaces: red, thin
    pub const OCCUPIED: OutlineStyle = OutlineStyle {
        color: [255, 0, 0],
        thickness: 2,
    };
}

/// Classification of a single space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpaceResult {
    pub region: Region,
    /// Foreground pixels inside the region
    pub signal: u32,
    pub free: bool,
}

impl SpaceResult {
    pub fn style(&self) -> OutlineStyle {
        if self.free {
            OutlineStyle::FREE
        } else {
            OutlineStyle::OCCUPIED
        }
    }
}

/// Classification of every space in one frame, in region list order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub spaces: Vec<SpaceResult>,
    pub free_count: usize,
    pub total_count: usize,
}

impl Classification {
    pub fn occupied_count(&self) -> usize {
        self.total_count - self.free_count
    }
}

/// Threshold classifier over a binary map
#[derive(Debug, Clone)]
pub struct SpaceClassifier {
    region_width: u32,
    region_height: u32,
    free_threshold: u32,
}

impl SpaceClassifier {
    pub fn new(config: &OccupancyConfig) -> Self {
        Self {
            region_width: config.region_width,
            region_height: config.region_height,
            free_threshold: config.free_threshold,
        }
    }

    /// Foreground pixel count of one region, clipped to the map
    pub fn signal(&self, map: &BinaryMap, region: &Region) -> u32 {
        map.count_nonzero(region.x, region.y, self.region_width, self.region_height)
    }

    /// Classify every region; a space is free iff its signal is below the threshold
    pub fn classify(&self, map: &BinaryMap, regions: &[Region]) -> Classification {
        let spaces: Vec<SpaceResult> = regions
            .iter()
            .map(|region| {
                let signal = self.signal(map, region);
                trace!("Space at ({}, {}) signal={}", region.x, region.y, signal);
                SpaceResult {
                    region: *region,
                    signal,
                    free: signal < self.free_threshold,
                }
            })
            .collect();

        let free_count = spaces.iter().filter(|s| s.free).count();
        Classification {
            free_count,
            total_count: regions.len(),
            spaces,
        }
    }
}
