// # dhcpv6pd-core
//
// Core library for the DHCPv6 prefix delegation address manager.
//
// ## Architecture Overview
//
// A DHCPv6 client delegates a prefix to an upstream ("source") interface.
// This library keeps addresses derived from that prefix configured on
// downstream ("target") interfaces:
// - **ConfigTree**: Which targets want addresses from which source, and how
// - **PrefixRegistry**: Which prefix each source currently holds
// - **Aggregator**: Joins both into one desired-state snapshot
// - **Reconciler**: Diffs consecutive snapshots and drives a BatchExecutor
// - **Dhcpv6Pd**: Wires the pipeline together and exposes its inbound operations
//
// ## Design Principles
//
// 1. **Actors**: Every stateful component is a task draining its own queue
// 2. **Snapshots**: Published state is immutable and shared by reference
// 3. **Seams**: Host side effects go through traits (see `traits`)
// 4. **Convergence**: Failures are logged and reported, never retried

pub mod address;
pub mod cache;
pub mod config;
pub mod error;
pub mod leases;
pub mod lookup;
pub mod pipeline;
pub mod traits;

// Re-export core types for convenience
pub use address::{MacAddress, SynthesisError, parse_prefix, synthesize};
pub use cache::{FileConfigCache, MemoryConfigCache};
pub use config::{AddressPolicy, ConfigDerivedMap, ConfigTree, PipelineSettings};
pub use error::{Error, Result};
pub use leases::{LeasedPrefix, scan_lease_dir};
pub use lookup::StaticInterfaceLookup;
pub use pipeline::{Config, Dhcpv6Pd, PrefixMap, ReconcilerEvent, State};
pub use traits::{
    BatchExecutor, ConfigWriter, Emitter, InterfaceLookup, Notification, NotificationSource,
    PrefixEvent,
};
