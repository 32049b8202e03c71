//! Rate Limiting Middleware using GCRA Algorithm
//!
//! Limits the single-frame endpoint per client IP using tower_governor.
//! Uses the Generic Cell Rate Algorithm (GCRA), so no background
//! processes are needed.

use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;

/// Governor config with X-RateLimit-* headers enabled
pub type FrameGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Seconds to replenish one request
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 1,
            burst_size: 10,
        }
    }
}

/// Build the governor config, `None` if the parameters are rejected (zero values).
///
/// Requires the service to be served with
/// `into_make_service_with_connect_info::<SocketAddr>()` for IP extraction.
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<FrameGovernorConfig>> {
    GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
}

/// Layer for the limited routes
pub fn governor_layer(
    config: &RateLimitConfig,
) -> Option<GovernorLayer<PeerIpKeyExtractor, StateInformationMiddleware>> {
    create_governor_config(config).map(|config| GovernorLayer { config })
}
