// # Linux Adapters
//
// This crate provides the host-facing implementations of the
// `dhcpv6pd-core` collaborator traits on Linux:
//
// - **IpBatchExecutor**: `BatchExecutor` over `ip -force -batch -`
// - **SysfsInterfaceLookup**: `InterfaceLookup` over `/sys/class/net`
// - **UnixSocketNotificationSource** / **UnixSocketEmitter**: notification
//   transport over a Unix stream socket
//
// ## Platform Support
//
// Everything here assumes Linux paths and iproute2. The socket transport
// also works on other Unix systems, which keeps the tests portable.

pub mod executor;
pub mod socket;
pub mod sysfs;

pub use executor::{DEFAULT_IP_BINARY, IpBatchExecutor};
pub use socket::{DEFAULT_SOCKET_PATH, UnixSocketEmitter, UnixSocketNotificationSource};
pub use sysfs::{DEFAULT_SYSFS_NET, SysfsInterfaceLookup};
