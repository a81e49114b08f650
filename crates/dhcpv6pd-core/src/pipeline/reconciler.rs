//! Reconciler (system updater)
//!
//! The only component with side effects on the host. For every snapshot
//! transition `old → new` it:
//!
//! 1. Projects both snapshots to an [`AddressMap`]
//! 2. Diffs them into an [`AddressPlan`]
//! 3. Submits the removals, then the additions, as two batches
//!
//! ```text
//!  DesiredState(old) ──► AddressMap(old) ──┐
//!                                          ├──► diff ──► remove batch ──► add batch
//!  DesiredState(new) ──► AddressMap(new) ──┘
//! ```
//!
//! Batch failures are logged and reported as [`ReconcilerEvent::BatchFailed`].
//! Nothing is retried or rolled back: the next snapshot transition converges
//! again.

use ipnet::Ipv6Net;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::aggregator::DesiredState;
use crate::address::synthesize;
use crate::config::PipelineSettings;
use crate::error::Error;
use crate::traits::{AddressAction, AddressOp, BatchExecutor, InterfaceLookup};

/// Source interface → (target interface → synthesized address)
pub type AddressMap = BTreeMap<String, BTreeMap<String, Ipv6Net>>;

/// Events emitted by the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilerEvent {
    /// A snapshot transition was processed (batches may have failed)
    Reconciled {
        removed: Vec<AddressOp>,
        added: Vec<AddressOp>,
    },

    /// A batch failed or timed out
    BatchFailed {
        action: AddressAction,
        error: String,
    },
}

/// Operations needed to move from one address map to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressPlan {
    /// Addresses to delete, applied first
    pub remove: Vec<AddressOp>,
    /// Addresses to add, applied after the removals
    pub add: Vec<AddressOp>,
}

impl AddressPlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Project a snapshot to the addresses it calls for
///
/// Only source interfaces with both a configuration and a known prefix
/// contribute. Entries that fail synthesis are logged and left out.
pub fn address_map(state: &DesiredState, lookup: &dyn InterfaceLookup) -> AddressMap {
    project(state, lookup, true)
}

/// `address_map`, logging failures at debug level unless `report` is set
///
/// The previous snapshot is projected again on every transition; its
/// failures were already reported when it was new.
fn project(state: &DesiredState, lookup: &dyn InterfaceLookup, report: bool) -> AddressMap {
    let mut addresses = AddressMap::new();

    let (Some(config), Some(prefixes)) = (&state.config, &state.known_prefixes) else {
        return addresses;
    };

    for (source, targets) in config.iter() {
        let Some(prefix) = prefixes.get(source) else {
            continue;
        };

        let mut synthesized = BTreeMap::new();
        for (target, policy) in targets {
            match synthesize(target, policy, prefix, lookup) {
                Ok(address) => {
                    synthesized.insert(target.clone(), address);
                }
                Err(e) if report => warn!(
                    "failed to calculate address for {} from {} prefix {}: {}",
                    target, source, prefix, e
                ),
                Err(e) => debug!(
                    "no previous address for {} from {} prefix {}: {}",
                    target, source, prefix, e
                ),
            }
        }

        if !synthesized.is_empty() {
            addresses.insert(source.clone(), synthesized);
        }
    }

    addresses
}

/// Diff two address maps
///
/// A `(source, target)` pair whose address is unchanged produces nothing.
pub fn diff(old: &AddressMap, new: &AddressMap) -> AddressPlan {
    AddressPlan {
        remove: changed_entries(AddressAction::Del, old, new),
        add: changed_entries(AddressAction::Add, new, old),
    }
}

/// Entries of `from` that are missing or different in `against`
fn changed_entries(
    action: AddressAction,
    from: &AddressMap,
    against: &AddressMap,
) -> Vec<AddressOp> {
    let mut ops = Vec::new();
    for (source, targets) in from {
        let other = against.get(source);
        for (target, address) in targets {
            if other.and_then(|other| other.get(target)) != Some(address) {
                ops.push(AddressOp {
                    action,
                    address: *address,
                    device: target.clone(),
                });
            }
        }
    }
    ops
}

/// The reconciler before it is spawned
pub struct Reconciler {
    lookup: Arc<dyn InterfaceLookup>,
    executor: Arc<dyn BatchExecutor>,
    batch_timeout: Duration,
    previous: Arc<DesiredState>,
    event_tx: mpsc::Sender<ReconcilerEvent>,
}

impl Reconciler {
    /// Create a reconciler starting from the empty snapshot
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver)
    pub fn new(
        lookup: Arc<dyn InterfaceLookup>,
        executor: Arc<dyn BatchExecutor>,
        settings: &PipelineSettings,
    ) -> (Self, mpsc::Receiver<ReconcilerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(settings.event_channel_capacity);
        let reconciler = Self {
            lookup,
            executor,
            batch_timeout: Duration::from_secs(settings.batch_timeout_secs),
            previous: Arc::new(DesiredState::default()),
            event_tx,
        };
        (reconciler, event_rx)
    }

    /// Start the actor; it stops once `snapshots` is closed
    pub fn spawn(
        mut self,
        mut snapshots: mpsc::UnboundedReceiver<Arc<DesiredState>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(next) = snapshots.recv().await {
                self.reconcile(next).await;
            }
            debug!("reconciler stopped");
        })
    }

    /// Move the system from the previous snapshot to `next`
    ///
    /// `next` becomes the previous snapshot whatever the executor reports.
    pub async fn reconcile(&mut self, next: Arc<DesiredState>) -> AddressPlan {
        debug!("updating system from: {:?} to: {:?}", self.previous, next);

        let old_addresses = project(&self.previous, self.lookup.as_ref(), false);
        let new_addresses = project(&next, self.lookup.as_ref(), true);
        debug!(
            "computing differences between new: {:?} old: {:?}",
            new_addresses, old_addresses
        );
        let plan = diff(&old_addresses, &new_addresses);

        self.submit(AddressAction::Del, &plan.remove).await;
        self.submit(AddressAction::Add, &plan.add).await;

        self.previous = next;
        self.emit_event(ReconcilerEvent::Reconciled {
            removed: plan.remove.clone(),
            added: plan.add.clone(),
        });
        plan
    }

    async fn submit(&self, action: AddressAction, batch: &[AddressOp]) {
        if batch.is_empty() {
            return;
        }

        let verb = match action {
            AddressAction::Add => "adding",
            AddressAction::Del => "removing",
        };
        for op in batch {
            info!("{} {} on {}", verb, op.address, op.device);
        }

        let result = tokio::time::timeout(self.batch_timeout, self.executor.execute(batch)).await;
        let failure = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(_) => Error::timeout(format!(
                "{} did not finish within {:?}",
                self.executor.executor_name(),
                self.batch_timeout
            )),
        };

        error!("error while {} addresses: {}", verb, failure);
        self.emit_event(ReconcilerEvent::BatchFailed {
            action,
            error: failure.to_string(),
        });
    }

    fn emit_event(&self, event: ReconcilerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Reconciler event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
