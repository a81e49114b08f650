// # Interface Lookup Trait
//
// Resolves the hardware (MAC) address of a network interface by name.
//
// ## Implementations
//
// - sysfs (Linux): `dhcpv6pd-linux` crate
// - Static table: [`crate::lookup::StaticInterfaceLookup`]

use crate::address::{MacAddress, SynthesisError};

/// Trait for hardware address lookups
///
/// Lookups are synchronous: the address synthesizer calls them inline while
/// computing an address map. Implementations are not assumed to be safe for
/// concurrent use against the same interface beyond what the platform
/// offers.
pub trait InterfaceLookup: Send + Sync {
    /// Hardware address of `interface`
    ///
    /// # Returns
    ///
    /// - `Ok(MacAddress)`: The interface's 6-byte hardware address
    /// - `Err(SynthesisError::UnknownInterface)`: No such interface
    /// - `Err(SynthesisError::NoHardwareAddress)`: The interface has no usable address
    /// - `Err(SynthesisError::UnsupportedHardwareAddress)`: The address is not a MAC
    fn hardware_address(&self, interface: &str) -> Result<MacAddress, SynthesisError>;
}
