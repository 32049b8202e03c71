//! Parking space regions

use serde::{Deserialize, Serialize};

/// Top-left origin of one parking space.
///
/// Width and height are shared by every region and live in
/// [`OccupancyConfig`](crate::OccupancyConfig). Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Region {
    pub x: i32,
    pub y: i32,
}

impl Region {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Region {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Region> for (i32, i32) {
    fn from(region: Region) -> Self {
        (region.x, region.y)
    }
}
