//! Region Store Implementation

use crate::StoreError;
use occupancy::Region;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Shared list of parking space regions
pub struct RegionStore {
    /// Regions in insertion order
    regions: Mutex<Vec<Region>>,
    /// Backing file, `None` for an in-memory store
    path: Option<PathBuf>,
}

impl RegionStore {
    /// Create a store without persistence
    pub fn in_memory() -> Self {
        Self::with_regions(Vec::new())
    }

    /// Create an in-memory store seeded with regions
    pub fn with_regions(regions: Vec<Region>) -> Self {
        Self {
            regions: Mutex::new(regions),
            path: None,
        }
    }

    /// Load the region list from `path`.
    ///
    /// A missing or unreadable file starts an empty list; it is created on the
    /// first mutation.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let regions = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<Region>>(&bytes) {
                Ok(regions) => {
                    info!("Loaded {} parking spaces from {}", regions.len(), path.display());
                    regions
                }
                Err(e) => {
                    warn!("Ignoring unreadable region file {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(e) => {
                info!("No region file at {} ({}), starting empty", path.display(), e);
                Vec::new()
            }
        };

        Self {
            regions: Mutex::new(regions),
            path: Some(path),
        }
    }

    fn read(&self) -> MutexGuard<'_, Vec<Region>> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Region>>, StoreError> {
        self.regions
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    /// Append a region, returning the new total
    pub fn add(&self, region: Region) -> Result<usize, StoreError> {
        let mut regions = self.lock()?;
        regions.push(region);

        if let Err(e) = self.save(&regions) {
            regions.pop();
            return Err(e);
        }

        debug!("Added parking space ({}, {})", region.x, region.y);
        Ok(regions.len())
    }

    /// Remove the region at `index`
    pub fn remove(&self, index: usize) -> Result<Region, StoreError> {
        let mut regions = self.lock()?;
        if index >= regions.len() {
            return Err(StoreError::InvalidIndex {
                index,
                len: regions.len(),
            });
        }
        let removed = regions.remove(index);

        if let Err(e) = self.save(&regions) {
            regions.insert(index, removed);
            return Err(e);
        }

        debug!("Removed parking space {} ({}, {})", index, removed.x, removed.y);
        Ok(removed)
    }

    /// Copy of the current list.
    ///
    /// Mutations restore the list before releasing the lock, so a poisoned
    /// lock still guards a consistent list.
    pub fn snapshot(&self) -> Vec<Region> {
        self.read().clone()
    }

    /// Number of regions
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the list next to the target and rename it into place
    fn save(&self, regions: &[Region]) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_vec(regions)
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| StoreError::Persistence(format!("{}: {}", path.display(), e)))
    }
}

impl Default for RegionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
