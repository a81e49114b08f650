//! Desired-state aggregator actor
//!
//! Joins the config store's derived map and the prefix registry's map into
//! one [`DesiredState`] snapshot. Updates from both inputs are handled one
//! at a time by a single task, so snapshots are published strictly in
//! sequence and each carries the latest value of the slot that did not
//! change.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::prefix_registry::PrefixMap;
use super::subscribers::Subscribers;
use crate::config::ConfigDerivedMap;

/// Composite of everything the reconciler needs
///
/// Either slot is `None` until its source publishes for the first time.
/// Snapshots are immutable; an update produces a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    /// Source → target → policy
    pub config: Option<Arc<ConfigDerivedMap>>,
    /// Source → delegated prefix
    pub known_prefixes: Option<Arc<PrefixMap>>,
}

impl DesiredState {
    /// Copy of `self` with the config slot replaced
    pub fn with_config(&self, config: Arc<ConfigDerivedMap>) -> Self {
        Self {
            config: Some(config),
            known_prefixes: self.known_prefixes.clone(),
        }
    }

    /// Copy of `self` with the known-prefixes slot replaced
    pub fn with_known_prefixes(&self, known_prefixes: Arc<PrefixMap>) -> Self {
        Self {
            config: self.config.clone(),
            known_prefixes: Some(known_prefixes),
        }
    }
}

/// The aggregator before it is spawned
pub struct Aggregator {
    current: Arc<DesiredState>,
    subscribers: Subscribers<Arc<DesiredState>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            current: Arc::new(DesiredState::default()),
            subscribers: Subscribers::new(),
        }
    }

    /// Register a queue receiving every snapshot
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Arc<DesiredState>> {
        self.subscribers.subscribe()
    }

    /// Start the actor; it stops once both inputs are closed
    pub fn spawn(
        self,
        config_rx: mpsc::UnboundedReceiver<Arc<ConfigDerivedMap>>,
        prefixes_rx: mpsc::UnboundedReceiver<Arc<PrefixMap>>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(config_rx, prefixes_rx))
    }

    async fn run(
        mut self,
        mut config_rx: mpsc::UnboundedReceiver<Arc<ConfigDerivedMap>>,
        mut prefixes_rx: mpsc::UnboundedReceiver<Arc<PrefixMap>>,
    ) {
        let mut config_open = true;
        let mut prefixes_open = true;

        while config_open || prefixes_open {
            tokio::select! {
                update = config_rx.recv(), if config_open => match update {
                    Some(config) => self.update(self.current.with_config(config)),
                    None => config_open = false,
                },
                update = prefixes_rx.recv(), if prefixes_open => match update {
                    Some(prefixes) => self.update(self.current.with_known_prefixes(prefixes)),
                    None => prefixes_open = false,
                },
            }
        }

        debug!("aggregator stopped");
    }

    fn update(&mut self, next: DesiredState) {
        debug!("desired state updated to: {:?}", next);
        self.current = Arc::new(next);
        self.subscribers.publish(Arc::clone(&self.current));
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AddressPolicy;
    use std::collections::BTreeMap;

    fn config(subnet_id: u16) -> Arc<ConfigDerivedMap> {
        let mut targets = BTreeMap::new();
        targets.insert("eth1".to_string(), AddressPolicy::Eui64 { subnet_id });
        let mut config = ConfigDerivedMap::new();
        config.insert("eth0".to_string(), targets);
        Arc::new(config)
    }

    fn prefixes(prefix: &str) -> Arc<PrefixMap> {
        let mut map = PrefixMap::new();
        map.insert("eth0".to_string(), prefix.to_string());
        Arc::new(map)
    }

    #[tokio::test]
    async fn test_each_update_carries_other_slot() {
        let (config_tx, config_rx) = mpsc::unbounded_channel();
        let (prefixes_tx, prefixes_rx) = mpsc::unbounded_channel();
        let mut aggregator = Aggregator::new();
        let mut rx = aggregator.subscribe();
        let task = aggregator.spawn(config_rx, prefixes_rx);

        config_tx.send(config(1)).unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.config, Some(config(1)));
        assert_eq!(first.known_prefixes, None);

        prefixes_tx.send(prefixes("2001:db8::/56")).unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(second.config, Some(config(1)));
        assert_eq!(second.known_prefixes, Some(prefixes("2001:db8::/56")));

        config_tx.send(config(2)).unwrap();
        let third = rx.recv().await.unwrap();
        assert_eq!(third.config, Some(config(2)));
        assert_eq!(third.known_prefixes, Some(prefixes("2001:db8::/56")));

        // Earlier snapshots are untouched
        assert_eq!(first.known_prefixes, None);

        drop(config_tx);
        drop(prefixes_tx);
        task.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
