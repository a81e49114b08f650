// # Config Writer Trait
//
// Persists the last accepted configuration so it can be restored on
// restart. The live pipeline never depends on a write succeeding.

use async_trait::async_trait;

use crate::config::ConfigTree;

/// Trait for configuration persistence
#[async_trait]
pub trait ConfigWriter: Send + Sync {
    /// Persist `config`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The configuration is durable
    /// - `Err(Error)`: Persistence failed; in-memory state is unaffected
    async fn write_config(&self, config: &ConfigTree) -> Result<(), crate::Error>;
}
