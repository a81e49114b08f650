// # Memory Config Cache
//
// In-memory implementation of ConfigWriter.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - The daemon starts from an empty configuration until the next `set`
//
// ## When to Use
//
// - Testing environments
// - Embedding where another system owns configuration persistence

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::ConfigTree;
use crate::traits::ConfigWriter;

/// In-memory config cache
///
/// Clones share the same storage. [`set_failing`](Self::set_failing) makes
/// subsequent writes fail, which is how tests exercise the "persisted state
/// diverges from live state" path.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigCache {
    inner: Arc<RwLock<Option<ConfigTree>>>,
    failing: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last successfully written configuration
    pub async fn stored(&self) -> Option<ConfigTree> {
        self.inner.read().await.clone()
    }

    /// Number of write attempts, failed ones included
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigWriter for MemoryConfigCache {
    async fn write_config(&self, config: &ConfigTree) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::config_cache("memory cache is set to fail"));
        }
        *self.inner.write().await = Some(config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_roundtrip_and_failure() {
        let cache = MemoryConfigCache::new();
        assert!(cache.stored().await.is_none());

        cache.write_config(&ConfigTree::empty()).await.unwrap();
        assert_eq!(cache.stored().await, Some(ConfigTree::empty()));

        cache.set_failing(true);
        let tree = ConfigTree::from_json(r#"{"a": 1}"#).unwrap();
        assert!(cache.write_config(&tree).await.is_err());
        assert_eq!(cache.stored().await, Some(ConfigTree::empty()));
        assert_eq!(cache.write_count(), 2);
    }
}
