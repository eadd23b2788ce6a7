pub mod memory;

use std::sync::Arc;

use shared_config::AppConfig;

pub use memory::{SchedulingStore, StoreError};

/// Shared state threaded through every router. Services are constructed
/// per-request from this; the store itself is the only long-lived object.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<SchedulingStore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(SchedulingStore::new()),
        }
    }
}
