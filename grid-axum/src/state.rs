use std::sync::Arc;

use grid_blob::GridAdapter;

/// Shared per-router state: the adapter built once at startup
pub struct GridAxumState {
    pub blobs: Arc<GridAdapter>,
}

impl Clone for GridAxumState {
    fn clone(&self) -> Self {
        Self {
            blobs: Arc::clone(&self.blobs),
        }
    }
}

impl GridAxumState {
    pub fn new(blobs: GridAdapter) -> Self {
        Self {
            blobs: Arc::new(blobs),
        }
    }
}
