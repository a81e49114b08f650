// # Static Interface Lookup
//
// Table-driven implementation of InterfaceLookup.
//
// ## When to Use
//
// - Testing environments
// - Embedding the pipeline where interface data comes from elsewhere

use std::collections::HashMap;

use crate::address::{MacAddress, SynthesisError};
use crate::traits::InterfaceLookup;

/// In-memory interface table
///
/// An interface inserted with [`insert_without_address`](Self::insert_without_address)
/// exists but reports no hardware address, like a loopback or tunnel device.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaceLookup {
    interfaces: HashMap<String, Option<MacAddress>>,
}

impl StaticInterfaceLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an interface with a hardware address
    pub fn insert(&mut self, interface: impl Into<String>, mac: MacAddress) {
        self.interfaces.insert(interface.into(), Some(mac));
    }

    /// Add an interface without a hardware address
    pub fn insert_without_address(&mut self, interface: impl Into<String>) {
        self.interfaces.insert(interface.into(), None);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_interface(mut self, interface: impl Into<String>, mac: MacAddress) -> Self {
        self.insert(interface, mac);
        self
    }
}

impl InterfaceLookup for StaticInterfaceLookup {
    fn hardware_address(&self, interface: &str) -> Result<MacAddress, SynthesisError> {
        match self.interfaces.get(interface) {
            None => Err(SynthesisError::UnknownInterface(interface.to_string())),
            Some(None) => Err(SynthesisError::NoHardwareAddress(interface.to_string())),
            Some(Some(mac)) if mac.is_zero() => {
                Err(SynthesisError::NoHardwareAddress(interface.to_string()))
            }
            Some(Some(mac)) => Ok(*mac),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_lookup() {
        let lookup = StaticInterfaceLookup::new()
            .with_interface("eth0", MacAddress::new([0x52, 0x54, 0, 0, 0, 1]))
            .with_interface("tun0", MacAddress::new([0; 6]));

        assert_eq!(
            lookup.hardware_address("eth0"),
            Ok(MacAddress::new([0x52, 0x54, 0, 0, 0, 1]))
        );
        assert_eq!(
            lookup.hardware_address("tun0"),
            Err(SynthesisError::NoHardwareAddress("tun0".to_string()))
        );
        assert_eq!(
            lookup.hardware_address("eth9"),
            Err(SynthesisError::UnknownInterface("eth9".to_string()))
        );
    }
}
