use std::sync::Arc;

use crate::{db::SnapshotStore, services::ListLoader};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub loader: ListLoader,
    pub snapshots: Arc<dyn SnapshotStore>,
}

impl AppState {
    pub fn new(loader: ListLoader, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self { loader, snapshots }
    }
}
