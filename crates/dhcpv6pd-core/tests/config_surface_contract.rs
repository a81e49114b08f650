//! Architectural Contract Test: Configuration Surface
//!
//! Constraints verified:
//! - `set` takes effect in the pipeline before persistence is attempted
//! - A persistence failure is returned to the caller but not rolled back
//! - Configuration changes alone can move addresses between targets

mod common;

use common::*;
use dhcpv6pd_core::traits::{AddressAction, PrefixEvent};
use dhcpv6pd_core::{ConfigTree, MemoryConfigCache};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn get_returns_initial_then_latest_tree() {
    let executor = RecordingExecutor::new();
    let writer = MemoryConfigCache::new();
    let initial = config_tree("eth0", vec![eui64_target("eth1", 0)]);
    let (pd, _events) = spawn_pipeline(initial.clone(), &executor, &writer).await;

    assert_eq!(pd.config().get().await.unwrap(), initial);

    let next = config_tree("eth0", vec![eui64_target("eth2", 0)]);
    assert_ok!(pd.config().set(next.clone()).await);
    assert_eq!(pd.config().get().await.unwrap(), next);
    assert_eq!(writer.stored().await, Some(next));
    assert_eq!(writer.write_count(), 1);

    assert!(pd.config().validate(&ConfigTree::empty()).is_ok());
    assert!(pd.state().get().as_object().unwrap().is_empty());

    pd.shutdown().await;
}

#[tokio::test]
async fn failed_write_keeps_new_configuration_live() {
    let executor = RecordingExecutor::new();
    let writer = MemoryConfigCache::new();
    let (pd, mut events) = spawn_pipeline(ConfigTree::empty(), &executor, &writer).await;

    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8::/64"))
        .unwrap();

    writer.set_failing(true);
    let next = config_tree("eth0", vec![eui64_target("eth1", 0)]);
    assert_err!(pd.config().set(next.clone()).await, "write failure must be reported");

    // Live state moved on, persisted state did not
    assert_eq!(pd.config().get().await.unwrap(), next);
    assert_eq!(writer.stored().await, None);

    let (_, added) = next_change(&mut events, &mut Vec::new()).await;
    assert_eq!(added, vec![op(AddressAction::Add, "2001:db8::ff:fe00:1", "eth1")]);

    pd.shutdown().await;
}

#[tokio::test]
async fn retargeting_moves_address() {
    let executor = RecordingExecutor::new();
    let writer = MemoryConfigCache::new();
    let tree = config_tree("eth0", vec![eui64_target("eth1", 2)]);
    let (pd, mut events) = spawn_pipeline(tree, &executor, &writer).await;

    pd.handle_prefix_assigned(PrefixEvent::new("eth0", "2001:db8:1::/56"))
        .unwrap();
    next_change(&mut events, &mut Vec::new()).await;

    pd.config()
        .set(config_tree("eth0", vec![eui64_target("eth2", 2)]))
        .await
        .unwrap();

    let (removed, added) = next_change(&mut events, &mut Vec::new()).await;
    assert_eq!(removed, vec![op(AddressAction::Del, "2001:db8:1:2:0:ff:fe00:1", "eth1")]);
    assert_eq!(added, vec![op(AddressAction::Add, "2001:db8:1:2:0:ff:fe00:2", "eth2")]);

    // Dropping the whole configuration removes what is left
    pd.config().set(ConfigTree::empty()).await.unwrap();
    let (removed, added) = next_change(&mut events, &mut Vec::new()).await;
    assert!(added.is_empty());
    assert_eq!(removed, vec![op(AddressAction::Del, "2001:db8:1:2:0:ff:fe00:2", "eth2")]);

    pd.shutdown().await;
}
