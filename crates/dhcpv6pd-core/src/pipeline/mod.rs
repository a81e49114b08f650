//! Reconciliation pipeline
//!
//! Four sequential actors connected by one-way queues:
//!
//! ```text
//! ┌──────────────┐  ConfigDerivedMap
//! │ ConfigStore  │─────────────────┐
//! └──────────────┘                 ▼
//!                          ┌──────────────┐  DesiredState  ┌────────────┐    ┌───────────────┐
//!                          │  Aggregator  │───────────────►│ Reconciler │───►│ BatchExecutor │
//!                          └──────────────┘                └────────────┘    └───────────────┘
//! ┌────────────────┐  PrefixMap    ▲
//! │ PrefixRegistry │───────────────┘
//! └────────────────┘
//! ```
//!
//! Each actor owns its state and handles one message at a time, including
//! publishing to its subscribers. Publishing only enqueues. Within one
//! input (e.g. all registry mutations) order is preserved; config changes
//! and prefix events may interleave either way.
//!
//! [`Dhcpv6Pd`] wires the actors together and exposes the inbound
//! operations.

mod aggregator;
mod config_store;
mod prefix_registry;
mod reconciler;
mod subscribers;

pub use aggregator::{Aggregator, DesiredState};
pub use config_store::{ConfigStore, ConfigStoreHandle};
pub use prefix_registry::{PrefixMap, PrefixRegistry, PrefixRegistryHandle};
pub use reconciler::{AddressMap, AddressPlan, Reconciler, ReconcilerEvent, address_map, diff};

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{ConfigTree, PipelineSettings};
use crate::error::Result;
use crate::traits::{BatchExecutor, ConfigWriter, InterfaceLookup, Notification, PrefixEvent};

/// The running DHCPv6-PD pipeline
///
/// ## Lifecycle
///
/// 1. Create with [`Dhcpv6Pd::spawn()`]; the initial configuration is
///    published immediately
/// 2. Feed prefix notifications and configuration updates
/// 3. Stop with [`Dhcpv6Pd::shutdown()`]
pub struct Dhcpv6Pd {
    config: Config,
    state: State,
    registry: PrefixRegistryHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl Dhcpv6Pd {
    /// Start all pipeline actors
    ///
    /// # Parameters
    ///
    /// - `initial`: Configuration to start from (typically the cached tree)
    /// - `writer`: Persistence for configuration updates
    /// - `lookup`: Hardware address lookup for target interfaces
    /// - `executor`: Applies address batches to the host
    /// - `settings`: Pipeline settings
    ///
    /// # Returns
    ///
    /// A tuple of (pipeline, event_receiver) where event_receiver yields reconciler events
    pub fn spawn(
        initial: ConfigTree,
        writer: Arc<dyn ConfigWriter>,
        lookup: Arc<dyn InterfaceLookup>,
        executor: Arc<dyn BatchExecutor>,
        settings: PipelineSettings,
    ) -> Result<(Self, mpsc::Receiver<ReconcilerEvent>)> {
        settings.validate()?;

        let mut store = ConfigStore::new(initial);
        let config_rx = store.subscribe();

        let mut registry = PrefixRegistry::new();
        let prefixes_rx = registry.subscribe();

        let mut aggregator = Aggregator::new();
        let snapshots_rx = aggregator.subscribe();

        let (reconciler, event_rx) = Reconciler::new(lookup, executor, &settings);

        // Downstream first so nothing published at startup is missed
        let reconciler_task = reconciler.spawn(snapshots_rx);
        let aggregator_task = aggregator.spawn(config_rx, prefixes_rx);
        let (registry, registry_task) = registry.spawn();
        let (store, store_task) = store.spawn();

        info!("DHCPv6-PD pipeline started");

        let pipeline = Self {
            config: Config { store, writer },
            state: State,
            registry,
            tasks: vec![store_task, registry_task, aggregator_task, reconciler_task],
        };
        Ok((pipeline, event_rx))
    }

    /// Configuration surface
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// State surface
    pub fn state(&self) -> &State {
        &self.state
    }

    /// `prefix-assigned`: record the interface's delegated prefix
    pub fn handle_prefix_assigned(&self, event: PrefixEvent) -> Result<()> {
        debug!("prefix-assigned {} {}", event.interface, event.prefix);
        self.registry.assign(event.interface, event.prefix)
    }

    /// `prefix-removed`: forget the interface's prefix
    ///
    /// The event's prefix does not have to match the recorded one.
    pub fn handle_prefix_removed(&self, event: PrefixEvent) -> Result<()> {
        debug!("prefix-removed {} {}", event.interface, event.prefix);
        self.registry.remove(event.interface)
    }

    /// Route a notification to its handler
    pub fn dispatch(&self, notification: Notification) -> Result<()> {
        match notification {
            Notification::PrefixAssigned(event) => self.handle_prefix_assigned(event),
            Notification::PrefixRemoved(event) => self.handle_prefix_removed(event),
        }
    }

    /// Current prefix map, after every notification dispatched so far
    pub async fn known_prefixes(&self) -> Result<PrefixMap> {
        self.registry.current().await
    }

    /// Stop the pipeline
    ///
    /// Inputs are closed and every actor drains its queue before exiting.
    /// Waits for clones of [`Config`] handed out elsewhere to be dropped.
    pub async fn shutdown(self) {
        let Self {
            config,
            state: _,
            registry,
            tasks,
        } = self;
        drop(config);
        drop(registry);

        for task in tasks {
            if let Err(e) = task.await {
                debug!("pipeline task ended abnormally: {}", e);
            }
        }
        info!("DHCPv6-PD pipeline stopped");
    }
}

/// Configuration surface: get, set and validate the [`ConfigTree`]
#[derive(Clone)]
pub struct Config {
    store: ConfigStoreHandle,
    writer: Arc<dyn ConfigWriter>,
}

impl Config {
    /// The configuration currently in effect
    pub async fn get(&self) -> Result<ConfigTree> {
        self.store.current().await
    }

    /// Replace the configuration and persist it
    ///
    /// The live configuration is updated before the write is attempted, so
    /// a write error leaves the pipeline running on `tree` while the cache
    /// still holds the previous one.
    pub async fn set(&self, tree: ConfigTree) -> Result<()> {
        self.store.replace(tree.clone()).await?;
        self.writer.write_config(&tree).await
    }

    /// Check a tree before `set`; currently accepts everything
    pub fn validate(&self, tree: &ConfigTree) -> Result<()> {
        tree.validate()
    }
}

/// State surface
#[derive(Debug, Clone, Copy, Default)]
pub struct State;

impl State {
    /// Operational state document (currently always empty)
    pub fn get(&self) -> Value {
        Value::Object(Map::new())
    }
}
