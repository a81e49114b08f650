//! Architectural Contract Test: Reconciliation
//!
//! This test verifies that the addresses requested from the executor are
//! exactly the difference between consecutive desired states.
//!
//! Constraints verified:
//! - Removals are submitted before additions, as separate batches
//! - Unchanged addresses are never re-submitted
//! - Entries that cannot be synthesized are skipped, not fatal
//!
//! If this test fails, someone has added:
//! - Full re-application of the desired state on every change
//! - Add-before-remove ordering
//! - Whole-batch failure on one bad entry

mod common;

use common::*;
use dhcpv6pd_core::traits::{AddressAction, PrefixEvent};
use dhcpv6pd_core::{ConfigTree, MemoryConfigCache};
use serde_json::json;

#[tokio::test]
async fn assigned_prefix_yields_eui64_address_on_target() {
    let executor = RecordingExecutor::new();
    let writer = MemoryConfigCache::new();
    let tree = config_tree("eth0", vec![eui64_target("eth1", 0)]);
    let (pd, mut events) = spawn_pipeline(tree, &executor, &writer).await;

    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8::/64"))
        .unwrap();

    let (removed, added) = next_change(&mut events, &mut Vec::new()).await;
    assert!(removed.is_empty());
    assert_eq!(
        added,
        vec![op(AddressAction::Add, "2001:db8::ff:fe00:1", "eth1")]
    );
    assert_eq!(added[0].to_string(), "address add 2001:db8::ff:fe00:1/64 dev eth1");
    assert_eq!(executor.batches(), vec![added]);

    pd.shutdown().await;
}

#[tokio::test]
async fn removed_prefix_deletes_addresses() {
    let executor = RecordingExecutor::new();
    let writer = MemoryConfigCache::new();
    let tree = config_tree("eth0", vec![eui64_target("eth1", 1), eui64_target("eth2", 2)]);
    let (pd, mut events) = spawn_pipeline(tree, &executor, &writer).await;

    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8:1::/56"))
        .unwrap();
    let (_, added) = next_change(&mut events, &mut Vec::new()).await;
    assert_eq!(added.len(), 2);

    // The prefix in a removal does not have to match the recorded one
    pd.handle_prefix_removed(PrefixEvent::new("eth0", "2001:db8:ffff::/56"))
        .unwrap();
    let (removed, added) = next_change(&mut events, &mut Vec::new()).await;
    assert!(added.is_empty());
    assert_eq!(
        removed,
        vec![
            op(AddressAction::Del, "2001:db8:1:1:0:ff:fe00:1", "eth1"),
            op(AddressAction::Del, "2001:db8:1:2:0:ff:fe00:2", "eth2"),
        ]
    );

    assert!(pd.known_prefixes().await.unwrap().is_empty());
    pd.shutdown().await;
}

#[tokio::test]
async fn reassignment_removes_before_adding() {
    let executor = RecordingExecutor::new();
    let writer = MemoryConfigCache::new();
    let tree = config_tree("eth0", vec![eui64_target("eth1", 1)]);
    let (pd, mut events) = spawn_pipeline(tree, &executor, &writer).await;

    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8:1::/56"))
        .unwrap();
    next_change(&mut events, &mut Vec::new()).await;

    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8:2::/56"))
        .unwrap();
    let (removed, added) = next_change(&mut events, &mut Vec::new()).await;
    assert_eq!(removed, vec![op(AddressAction::Del, "2001:db8:1:1::ff:fe00:1", "eth1")]);
    assert_eq!(added, vec![op(AddressAction::Add, "2001:db8:2:1::ff:fe00:1", "eth1")]);

    // add(1), then del(1) and add(2) as two separate batches, in that order
    let batches = executor.batches();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[1], removed);
    assert_eq!(batches[2], added);

    pd.shutdown().await;
}

#[tokio::test]
async fn repeated_assignment_submits_nothing() {
    let executor = RecordingExecutor::new();
    let writer = MemoryConfigCache::new();
    let tree = config_tree("eth0", vec![eui64_target("eth1", 0)]);
    let (pd, mut events) = spawn_pipeline(tree.clone(), &executor, &writer).await;

    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8::/64"))
        .unwrap();
    next_change(&mut events, &mut Vec::new()).await;
    assert_eq!(executor.call_count(), 1);

    // Same prefix again, a removal of an unknown source, and an identical config
    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8::/64"))
        .unwrap();
    pd.handle_prefix_removed(PrefixEvent::new("eth7", "2001:db8:7::/64"))
        .unwrap();
    pd.config().set(tree).await.unwrap();

    // Each of the three still publishes a snapshot, with nothing to change
    let settled = settle(&pd, &mut events).await;
    assert_eq!(settled.len(), 3);
    for event in settled {
        assert_eq!(
            event,
            dhcpv6pd_core::ReconcilerEvent::Reconciled {
                removed: vec![],
                added: vec![]
            }
        );
    }
    assert_eq!(executor.call_count(), 1);

    pd.shutdown().await;
}

#[tokio::test]
async fn unusable_targets_are_skipped_individually() {
    let executor = RecordingExecutor::new();
    let writer = MemoryConfigCache::new();
    let tree = config_tree(
        "eth0",
        vec![
            json!({"name": "eth1", "address-type": "slaac"}),
            json!({"name": "eth3", "address-type": "template", "template": "::1"}),
            eui64_target("eth9", 3),
            eui64_target("lo", 4),
            eui64_target("eth2", 5),
        ],
    );
    let (pd, mut events) = spawn_pipeline(tree, &executor, &writer).await;

    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8:1::/56"))
        .unwrap();

    let (removed, added) = next_change(&mut events, &mut Vec::new()).await;
    assert!(removed.is_empty());
    assert_eq!(added, vec![op(AddressAction::Add, "2001:db8:1:5:0:ff:fe00:2", "eth2")]);

    pd.shutdown().await;
}

#[tokio::test]
async fn prefix_for_unconfigured_source_is_ignored() {
    let executor = RecordingExecutor::new();
    let writer = MemoryConfigCache::new();
    let (pd, mut events) = spawn_pipeline(ConfigTree::empty(), &executor, &writer).await;

    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8::/64"))
        .unwrap();
    pd.handle_prefix_assigned(PrefixEvent::new("eth5", "not-a-prefix"))
        .unwrap();
    settle(&pd, &mut events).await;

    assert_eq!(executor.call_count(), 0);
    assert_eq!(pd.known_prefixes().await.unwrap().len(), 2);

    pd.shutdown().await;
}
