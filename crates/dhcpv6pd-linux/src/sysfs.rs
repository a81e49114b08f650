// # sysfs Interface Lookup
//
// Reads hardware addresses from `/sys/class/net/<interface>/address`.

use dhcpv6pd_core::traits::InterfaceLookup;
use dhcpv6pd_core::{MacAddress, SynthesisError};
use std::path::PathBuf;

/// Default sysfs network class directory
pub const DEFAULT_SYSFS_NET: &str = "/sys/class/net";

/// Interface lookup over sysfs
#[derive(Debug, Clone)]
pub struct SysfsInterfaceLookup {
    root: PathBuf,
}

impl SysfsInterfaceLookup {
    /// Look interfaces up under `root` instead of `/sys/class/net`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for SysfsInterfaceLookup {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_NET)
    }
}

impl InterfaceLookup for SysfsInterfaceLookup {
    fn hardware_address(&self, interface: &str) -> Result<MacAddress, SynthesisError> {
        // Names like "../x" must not escape the class directory
        if matches!(interface, "" | "." | "..") || interface.contains('/') {
            return Err(SynthesisError::UnknownInterface(interface.to_string()));
        }

        let dir = self.root.join(interface);
        if !dir.is_dir() {
            return Err(SynthesisError::UnknownInterface(interface.to_string()));
        }

        let text = std::fs::read_to_string(dir.join("address"))
            .map_err(|_| SynthesisError::NoHardwareAddress(interface.to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::NoHardwareAddress(interface.to_string()));
        }

        let mac: MacAddress = text
            .parse()
            .map_err(|_| SynthesisError::UnsupportedHardwareAddress(interface.to_string()))?;
        if mac.is_zero() {
            return Err(SynthesisError::NoHardwareAddress(interface.to_string()));
        }
        Ok(mac)
    }
}
