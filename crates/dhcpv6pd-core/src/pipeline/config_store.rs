//! Config store actor
//!
//! Holds the last accepted [`ConfigTree`]. Every replacement (and the
//! initial tree at startup) recomputes the [`ConfigDerivedMap`] and
//! publishes it downstream. The tree itself never leaves the actor except
//! as a clone.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::subscribers::Subscribers;
use crate::config::{ConfigDerivedMap, ConfigTree};
use crate::error::{Error, Result};

const COMPONENT: &str = "config store";

enum ConfigCommand {
    Replace {
        tree: ConfigTree,
        done: oneshot::Sender<()>,
    },
    Current(oneshot::Sender<ConfigTree>),
}

/// The config store before it is spawned
pub struct ConfigStore {
    tree: ConfigTree,
    subscribers: Subscribers<Arc<ConfigDerivedMap>>,
}

impl ConfigStore {
    pub fn new(initial: ConfigTree) -> Self {
        Self {
            tree: initial,
            subscribers: Subscribers::new(),
        }
    }

    /// Register a queue receiving every derived map
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Arc<ConfigDerivedMap>> {
        self.subscribers.subscribe()
    }

    /// Start the actor; the initial tree is published first
    pub fn spawn(self) -> (ConfigStoreHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (ConfigStoreHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ConfigCommand>) {
        self.publish();

        while let Some(command) = rx.recv().await {
            match command {
                ConfigCommand::Replace { tree, done } => {
                    self.tree = tree;
                    self.publish();
                    let _ = done.send(());
                }
                ConfigCommand::Current(reply) => {
                    let _ = reply.send(self.tree.clone());
                }
            }
        }

        debug!("{} stopped", COMPONENT);
    }

    fn publish(&mut self) {
        let derived = self.tree.derive();
        debug!("config updated to: {:?}", derived);
        self.subscribers.publish(Arc::new(derived));
    }
}

/// Handle to a running config store
#[derive(Clone)]
pub struct ConfigStoreHandle {
    tx: mpsc::UnboundedSender<ConfigCommand>,
}

impl ConfigStoreHandle {
    /// Swap in `tree`; returns once the new derived map has been published
    pub async fn replace(&self, tree: ConfigTree) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(ConfigCommand::Replace { tree, done })
            .map_err(|_| Error::channel_closed(COMPONENT))?;
        rx.await.map_err(|_| Error::channel_closed(COMPONENT))
    }

    /// The tree currently held
    pub async fn current(&self) -> Result<ConfigTree> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ConfigCommand::Current(reply))
            .map_err(|_| Error::channel_closed(COMPONENT))?;
        rx.await.map_err(|_| Error::channel_closed(COMPONENT))
    }
}
