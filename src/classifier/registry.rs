//! Hot-swappable holder for the active classifier model.

use arc_swap::ArcSwapOption;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::ensemble::ModelSnapshot;

/// Readers take a cheap `Arc` clone of the current snapshot; a retrain
/// publishes a new one without blocking them.
pub struct ModelRegistry {
    current: ArcSwapOption<ModelSnapshot>,
    version: AtomicU64,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            version: AtomicU64::new(0),
        }
    }

    /// Load a persisted model. A missing or unreadable file leaves the
    /// registry empty and the pipeline runs rules-only.
    pub fn load_from_path(path: &Path) -> Self {
        let registry = Self::new();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No persisted model, running rules-only");
            return registry;
        }
        match ModelSnapshot::load(path) {
            Ok(snapshot) => {
                let version = registry.publish(snapshot);
                tracing::info!(path = %path.display(), version, "Loaded classifier model");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load model, running rules-only");
            }
        }
        registry
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn current(&self) -> Option<Arc<ModelSnapshot>> {
        self.current.load_full()
    }

    /// Atomically replace the active model. Returns its new version.
    pub fn publish(&self, mut snapshot: ModelSnapshot) -> u64 {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        snapshot.version = version;
        self.current.store(Some(Arc::new(snapshot)));
        version
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
