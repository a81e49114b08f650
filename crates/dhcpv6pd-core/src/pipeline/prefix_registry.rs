//! Prefix registry actor
//!
//! Tracks which prefix is currently delegated on each source interface.
//! Absence of a key means "no prefix". The registry does no diffing of its
//! own: it applies associate/dissociate in submission order and publishes
//! the whole resulting map.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::subscribers::Subscribers;
use crate::error::{Error, Result};

const COMPONENT: &str = "prefix registry";

/// Source interface → currently delegated prefix (CIDR text)
pub type PrefixMap = BTreeMap<String, String>;

enum RegistryCommand {
    Assign { interface: String, prefix: String },
    Remove { interface: String },
    Current(oneshot::Sender<PrefixMap>),
}

/// The prefix registry before it is spawned
pub struct PrefixRegistry {
    prefixes: PrefixMap,
    subscribers: Subscribers<Arc<PrefixMap>>,
}

impl PrefixRegistry {
    pub fn new() -> Self {
        Self {
            prefixes: PrefixMap::new(),
            subscribers: Subscribers::new(),
        }
    }

    /// Register a queue receiving the map after every mutation
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Arc<PrefixMap>> {
        self.subscribers.subscribe()
    }

    pub fn spawn(self) -> (PrefixRegistryHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (PrefixRegistryHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RegistryCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                RegistryCommand::Assign { interface, prefix } => {
                    self.prefixes.insert(interface, prefix);
                }
                RegistryCommand::Remove { interface } => {
                    self.prefixes.remove(&interface);
                }
                RegistryCommand::Current(reply) => {
                    let _ = reply.send(self.prefixes.clone());
                    continue;
                }
            }

            debug!("known-prefixes updated to {:?}", self.prefixes);
            self.subscribers.publish(Arc::new(self.prefixes.clone()));
        }

        debug!("{} stopped", COMPONENT);
    }
}

impl Default for PrefixRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running prefix registry
///
/// `assign` and `remove` only enqueue; they never wait for the mutation.
#[derive(Clone)]
pub struct PrefixRegistryHandle {
    tx: mpsc::UnboundedSender<RegistryCommand>,
}

impl PrefixRegistryHandle {
    /// Record `prefix` as delegated on `interface`, replacing any previous one
    pub fn assign(&self, interface: impl Into<String>, prefix: impl Into<String>) -> Result<()> {
        self.send(RegistryCommand::Assign {
            interface: interface.into(),
            prefix: prefix.into(),
        })
    }

    /// Forget the prefix of `interface`; the map is unchanged if it has none
    pub fn remove(&self, interface: impl Into<String>) -> Result<()> {
        self.send(RegistryCommand::Remove {
            interface: interface.into(),
        })
    }

    /// Snapshot of the map after all previously enqueued mutations
    pub async fn current(&self) -> Result<PrefixMap> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Current(reply))?;
        rx.await.map_err(|_| Error::channel_closed(COMPONENT))
    }

    fn send(&self, command: RegistryCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| Error::channel_closed(COMPONENT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assign_overwrites_and_remove_deletes() {
        let mut registry = PrefixRegistry::new();
        let mut rx = registry.subscribe();
        let (handle, _task) = registry.spawn();

        handle.assign("eth0", "2001:db8:1::/56").unwrap();
        handle.assign("eth0", "2001:db8:2::/56").unwrap();
        handle.assign("eth2", "2001:db8:3::/56").unwrap();
        handle.remove("eth2").unwrap();

        assert_eq!(rx.recv().await.unwrap()["eth0"], "2001:db8:1::/56");
        assert_eq!(rx.recv().await.unwrap()["eth0"], "2001:db8:2::/56");
        assert_eq!(rx.recv().await.unwrap().len(), 2);
        let last = rx.recv().await.unwrap();
        assert_eq!(last.len(), 1);
        assert!(!last.contains_key("eth2"));

        assert_eq!(handle.current().await.unwrap(), *last);
    }

    #[tokio::test]
    async fn test_every_mutation_publishes() {
        let mut registry = PrefixRegistry::new();
        let mut rx = registry.subscribe();
        let (handle, _task) = registry.spawn();

        handle.assign("eth0", "2001:db8::/56").unwrap();
        handle.assign("eth0", "2001:db8::/56").unwrap();
        handle.remove("eth9").unwrap();

        // current() is processed after the mutations above
        let current = handle.current().await.unwrap();

        let mut published = Vec::new();
        while let Ok(map) = rx.try_recv() {
            published.push(map);
        }
        assert_eq!(published.len(), 3);
        assert!(published.iter().all(|map| **map == current));
    }
}
