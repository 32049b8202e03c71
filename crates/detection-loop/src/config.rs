//! Detection loop configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum delay between published events
pub const CYCLE_PACING: Duration = Duration::from_millis(100);

/// Longest wait for a single frame before the source is abandoned
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Detection loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Delay after each cycle (milliseconds)
    pub pacing_ms: u64,

    /// Frame read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Rewind to the first frame at end of stream
    pub looping: bool,

    /// Capacity of the event channel per viewer
    pub channel_capacity: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            pacing_ms: CYCLE_PACING.as_millis() as u64,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            looping: true,
            channel_capacity: 16,
        }
    }
}

impl LoopConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}
