//! Test doubles and common utilities for pipeline contract tests
//!
//! These doubles stand in for the host: they record what the pipeline asks
//! for without touching any network stack.

#![allow(dead_code)]

use dhcpv6pd_core::config::{DHCPV6PD_KEY, INTERFACES_KEY};
use dhcpv6pd_core::error::{Error, Result};
use dhcpv6pd_core::pipeline::ReconcilerEvent;
use dhcpv6pd_core::traits::{AddressAction, AddressOp, BatchExecutor};
use dhcpv6pd_core::{
    ConfigTree, Dhcpv6Pd, MemoryConfigCache, PipelineSettings, StaticInterfaceLookup,
};
use ipnet::Ipv6Net;
use serde_json::{Value, json};
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long a test waits for an expected event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// A BatchExecutor that records every batch it receives
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    batches: Arc<Mutex<Vec<Vec<AddressOp>>>>,
    failing: Arc<AtomicBool>,
    delay: Arc<Mutex<Option<Duration>>>,
    calls: Arc<AtomicUsize>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following batch fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every following batch take `delay` before returning
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// All batches received so far, in submission order
    pub fn batches(&self) -> Vec<Vec<AddressOp>> {
        self.batches.lock().unwrap().clone()
    }

    /// Number of execute() calls, including failed ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BatchExecutor for RecordingExecutor {
    async fn execute(&self, batch: &[AddressOp]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(batch.to_vec());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::executor("RTNETLINK answers: Operation not permitted"));
        }
        Ok(())
    }

    fn executor_name(&self) -> &'static str {
        "recording"
    }
}

/// Lookup knowing eth1 and eth2 with predictable MACs, and a MAC-less lo
pub fn test_lookup() -> StaticInterfaceLookup {
    let mut lookup = StaticInterfaceLookup::new()
        .with_interface("eth1", "02:00:00:00:00:01".parse().unwrap())
        .with_interface("eth2", "02:00:00:00:00:02".parse().unwrap());
    lookup.insert_without_address("lo");
    lookup
}

/// A target entry of a source interface
pub fn eui64_target(name: &str, sla_id: u16) -> Value {
    json!({"name": name, "address-type": "eui64", "sla-id": sla_id})
}

/// A configuration with one dataplane source and the given targets
pub fn config_tree(source: &str, targets: Vec<Value>) -> ConfigTree {
    ConfigTree::new(json!({
        INTERFACES_KEY: {
            "vyatta-interfaces-dataplane-v1:dataplane": [
                {
                    "tagnode": source,
                    "ipv6": {
                        DHCPV6PD_KEY: {
                            "target-interface": targets
                        }
                    }
                }
            ]
        }
    }))
}

/// Build a /64 address op for comparisons
pub fn op(action: AddressAction, addr: &str, device: &str) -> AddressOp {
    let address = Ipv6Net::new(addr.parse::<Ipv6Addr>().unwrap(), 64).unwrap();
    match action {
        AddressAction::Add => AddressOp::add(address, device),
        AddressAction::Del => AddressOp::del(address, device),
    }
}

/// Settings with a short batch timeout
pub fn test_settings(batch_timeout_secs: u64) -> PipelineSettings {
    PipelineSettings {
        batch_timeout_secs,
        event_channel_capacity: 100,
    }
}

/// Spawn a pipeline on `initial` with the test lookup
///
/// The startup `Reconciled` event for the initial configuration is consumed
/// before returning.
pub async fn spawn_pipeline(
    initial: ConfigTree,
    executor: &RecordingExecutor,
    writer: &MemoryConfigCache,
) -> (Dhcpv6Pd, mpsc::Receiver<ReconcilerEvent>) {
    spawn_pipeline_with(initial, executor, writer, test_settings(5)).await
}

pub async fn spawn_pipeline_with(
    initial: ConfigTree,
    executor: &RecordingExecutor,
    writer: &MemoryConfigCache,
    settings: PipelineSettings,
) -> (Dhcpv6Pd, mpsc::Receiver<ReconcilerEvent>) {
    let (pd, mut events) = Dhcpv6Pd::spawn(
        initial,
        Arc::new(writer.clone()),
        Arc::new(test_lookup()),
        Arc::new(executor.clone()),
        settings,
    )
    .expect("pipeline starts");

    match next_event(&mut events).await {
        ReconcilerEvent::Reconciled { removed, added } => {
            assert!(removed.is_empty() && added.is_empty(), "startup plan must be empty");
        }
        other => panic!("unexpected startup event {:?}", other),
    }

    (pd, events)
}

/// Next event, failing the test if none arrives in time
pub async fn next_event(events: &mut mpsc::Receiver<ReconcilerEvent>) -> ReconcilerEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("event arrives in time")
        .expect("event channel open")
}

/// Next `Reconciled` event with a non-empty plan
///
/// Other events are collected into `skipped`.
pub async fn next_change(
    events: &mut mpsc::Receiver<ReconcilerEvent>,
    skipped: &mut Vec<ReconcilerEvent>,
) -> (Vec<AddressOp>, Vec<AddressOp>) {
    loop {
        match next_event(events).await {
            ReconcilerEvent::Reconciled { removed, added }
                if !(removed.is_empty() && added.is_empty()) =>
            {
                return (removed, added);
            }
            other => skipped.push(other),
        }
    }
}

/// Wait until every queued notification has passed through the reconciler
///
/// Asks the registry for its map (so all mutations are applied), then
/// drains reconciler events until none arrives for a short while.
pub async fn settle(
    pd: &Dhcpv6Pd,
    events: &mut mpsc::Receiver<ReconcilerEvent>,
) -> Vec<ReconcilerEvent> {
    pd.known_prefixes().await.expect("registry running");
    let mut seen = Vec::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(200), events.recv()).await
    {
        seen.push(event);
    }
    seen
}
