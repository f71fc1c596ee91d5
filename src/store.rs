//! Hot-swappable policy snapshot
//!
//! `PolicyStore` holds the current [`PolicySet`] behind an `ArcSwap`.
//! Readers load a snapshot without locking and keep it for the whole
//! exchange; a reload publishes a new snapshot and never mutates the old.

use crate::config::FilterConfig;
use crate::error::Result;
use crate::policy::{Policy, PolicyProvider, PolicySet};
use crate::types::Direction;
use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Policy provider backed by an atomically replaceable snapshot
pub struct PolicyStore {
    current: ArcSwap<PolicySet>,
    /// Bumped on every publish
    generation: AtomicU64,
}

impl PolicyStore {
    pub fn new(set: PolicySet) -> Self {
        Self {
            current: ArcSwap::from_pointee(set),
            generation: AtomicU64::new(1),
        }
    }

    /// Compile a config and wrap it in a store
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        Ok(Self::new(config.compile()?))
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<PolicySet> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replace the snapshot; in-flight exchanges keep the old one
    pub fn publish(&self, set: PolicySet) {
        let hosts = set.len();
        self.current.store(Arc::new(set));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(generation, hosts, "Masking policy snapshot published");
    }

    /// Load, compile and publish a config file
    ///
    /// On any error the current snapshot stays in place.
    pub fn reload_from(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let set = FilterConfig::load(path)
            .and_then(|config| config.compile())
            .map_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Policy reload rejected");
                e
            })?;
        self.publish(set);
        Ok(())
    }
}

impl PolicyProvider for PolicyStore {
    fn resolve(&self, host: &str, direction: Direction) -> Result<Option<Arc<Policy>>> {
        self.current.load().resolve(host, direction)
    }
}
