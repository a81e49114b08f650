// # Batch Executor Trait
//
// Applies an ordered list of address operations to the network stack.
//
// ## Implementations
//
// - `ip -force -batch -` (Linux): `dhcpv6pd-linux` crate
// - Recording fakes in tests
//
// ## Protocol
//
// One call per batch. Each operation renders as one `ip` batch line:
//
// ```text
// address del 2001:db8:1:1:0:ff:fe00:1/64 dev eth1
// address add 2001:db8:2:1:0:ff:fe00:1/64 dev eth1
// ```
//
// The reconciler never submits an empty batch.

use async_trait::async_trait;
use ipnet::Ipv6Net;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an address is added or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressAction {
    Add,
    Del,
}

impl AddressAction {
    /// Keyword used on the `ip` command line
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressAction::Add => "add",
            AddressAction::Del => "del",
        }
    }
}

impl fmt::Display for AddressAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single address operation on one device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressOp {
    /// Add or remove
    pub action: AddressAction,
    /// Address with prefix length
    pub address: Ipv6Net,
    /// Target device name
    pub device: String,
}

impl AddressOp {
    pub fn add(address: Ipv6Net, device: impl Into<String>) -> Self {
        Self {
            action: AddressAction::Add,
            address,
            device: device.into(),
        }
    }

    pub fn del(address: Ipv6Net, device: impl Into<String>) -> Self {
        Self {
            action: AddressAction::Del,
            address,
            device: device.into(),
        }
    }
}

/// Renders the `ip -batch` line for this operation
impl fmt::Display for AddressOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "address {} {} dev {}", self.action, self.address, self.device)
    }
}

/// Trait for batch executor implementations
///
/// # Trust Level: Semi-Trusted
///
/// Executors perform side effects on the host and nothing else.
///
/// ## Allowed Capabilities
/// - ✅ Spawn external commands or talk to the kernel
///
/// ## Forbidden Capabilities
/// - ❌ Retry failed batches (convergence is driven by the next snapshot)
/// - ❌ Reorder operations within a batch
/// - ❌ Decide which addresses should exist (owned by the reconciler)
///
/// A failed batch may have been partially applied.
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    /// Apply `batch` in order
    ///
    /// # Parameters
    ///
    /// - `batch`: Non-empty ordered list of operations
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Every operation was applied
    /// - `Err(Error)`: The batch failed, possibly after partial application
    async fn execute(&self, batch: &[AddressOp]) -> Result<(), crate::Error>;

    /// Name used in logs
    fn executor_name(&self) -> &'static str;
}
