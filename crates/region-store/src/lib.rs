//! Region Store
//!
//! Ordered, index-addressed list of parking space regions shared between the
//! HTTP layer and the detection loop, saved to disk on every mutation.

mod store;

pub use store::RegionStore;

use thiserror::Error;

/// Region store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid index {index} (have {len} spaces)")]
    InvalidIndex { index: usize, len: usize },
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Lock error: {0}")]
    Lock(String),
}
