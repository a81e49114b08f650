//! Collaborator traits for the DHCPv6-PD system
//!
//! The reconciliation core touches the outside world only through these
//! interfaces:
//!
//! - [`BatchExecutor`]: Apply address add/remove batches to the network stack
//! - [`InterfaceLookup`]: Resolve an interface's hardware address
//! - [`ConfigWriter`]: Persist the last accepted configuration
//! - [`NotificationSource`] / [`Emitter`]: Receive and send prefix notifications

pub mod batch_executor;
pub mod config_writer;
pub mod interface_lookup;
pub mod notification;

pub use batch_executor::{AddressAction, AddressOp, BatchExecutor};
pub use config_writer::ConfigWriter;
pub use interface_lookup::InterfaceLookup;
pub use notification::{
    Emitter, Notification, NotificationSource, PrefixEvent, emit_prefix_assigned,
    emit_prefix_removed,
};
