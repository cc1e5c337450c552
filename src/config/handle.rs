//! Live, swappable configuration.

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use crate::config::schema::GatewayConfig;

/// Shared handle to the current configuration.
///
/// Readers call [`ConfigHandle::load`] at the moment they need a value instead of
/// copying settings at startup, so a reload is observed by the very next request.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<ArcSwap<GatewayConfig>>,
}

impl ConfigHandle {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Snapshot of the current configuration.
    pub fn load(&self) -> Guard<Arc<GatewayConfig>> {
        self.inner.load()
    }

    /// Atomically replace the configuration.
    pub fn store(&self, config: GatewayConfig) {
        self.inner.store(Arc::new(config));
    }

    /// Copy the current configuration, apply `f`, and swap the result in.
    pub fn update(&self, f: impl Fn(&mut GatewayConfig)) {
        self.inner.rcu(|current| {
            let mut next = GatewayConfig::clone(current);
            f(&mut next);
            next
        });
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(GatewayConfig::default())
    }
}

impl std::fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConfigHandle").field(&**self.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_is_visible_to_clones() {
        let handle = ConfigHandle::default();
        let reader = handle.clone();

        handle.update(|config| config.idempotency.cache.prefix = "prefix:".into());

        assert_eq!(reader.load().idempotency.cache.prefix, "prefix:");
    }
}
