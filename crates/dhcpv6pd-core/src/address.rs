// # Address Synthesis
//
// Pure derivation of a host address from a delegated prefix, a
// target-interface policy and the target interface's hardware address.
//
// ## EUI-64 Layout
//
// ```text
//  0                   63 64                                 127
// ┌──────────────┬────────┬──────────────────────────────────────┐
// │ prefix bits  │ subnet │ mac[0..3]^0x02:00  ff fe  mac[3..6]    │
// └──────────────┴────────┴──────────────────────────────────────┘
// ```
//
// The subnet id fills the low 16 bits of the upper half. Bits already
// covered by the delegated prefix win over the subnet id, so a /64
// delegation ignores the subnet id entirely and a /56 keeps only its
// low 8 bits.
//
// The interface identifier is the modified EUI-64 of RFC 4291 appendix A:
// `0xFF, 0xFE` inserted at the midpoint of the MAC and the
// universal/local bit complemented.

use ipnet::{Ipv6Net, PrefixLenError};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;
use thiserror::Error;

use crate::config::AddressPolicy;
use crate::traits::InterfaceLookup;

/// Length of every synthesized address
pub const SYNTHESIZED_PREFIX_LEN: u8 = 64;

/// Why a single address could not be synthesized
///
/// None of these are fatal: the reconciler logs them and skips the entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The delegated prefix is not a valid IPv6 CIDR
    #[error("invalid IPv6 prefix '{0}'")]
    InvalidPrefix(String),

    /// The delegated prefix is too narrow to host a /64
    #[error("prefix {prefix} is too long for eui64 ({len} > 64)")]
    PrefixTooLong {
        /// The offending prefix
        prefix: String,
        /// Its mask length
        len: u8,
    },

    /// The target interface does not exist
    #[error("unknown interface '{0}'")]
    UnknownInterface(String),

    /// The target interface exists but has no hardware address
    #[error("interface '{0}' has no hardware address")]
    NoHardwareAddress(String),

    /// The hardware address is not a 6-byte MAC
    #[error("unsupported hardware address '{0}'")]
    UnsupportedHardwareAddress(String),

    /// Template policies are not implemented
    #[error("template address policy is not implemented")]
    TemplateUnimplemented,
}

/// A 6-byte Ethernet hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// All-zero addresses are what loopback and tunnel devices report
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Modified EUI-64 interface identifier
    pub fn interface_identifier(&self) -> [u8; 8] {
        let m = self.0;
        [m[0] ^ 0x02, m[1], m[2], 0xff, 0xfe, m[3], m[4], m[5]]
    }
}

impl FromStr for MacAddress {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || SynthesisError::UnsupportedHardwareAddress(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split([':', '-']);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(unsupported)?;
            if part.len() != 2 {
                return Err(unsupported());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| unsupported())?;
        }
        if parts.next().is_some() {
            return Err(unsupported());
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Parse a delegated prefix in CIDR form, clearing host bits
pub fn parse_prefix(prefix: &str) -> Result<Ipv6Net, SynthesisError> {
    prefix
        .parse::<Ipv6Net>()
        .map(|network| network.trunc())
        .map_err(|_| SynthesisError::InvalidPrefix(prefix.to_string()))
}

/// Synthesize the address `target` should carry for `prefix` under `policy`
///
/// # Parameters
///
/// - `target`: Target interface name
/// - `policy`: Address derivation policy configured for the target
/// - `prefix`: Delegated prefix in CIDR form, as received
/// - `lookup`: Hardware address lookup for the target interface
///
/// # Returns
///
/// - `Ok(Ipv6Net)`: The host address with a /64 prefix length
/// - `Err(SynthesisError)`: Why no address can be derived
pub fn synthesize(
    target: &str,
    policy: &AddressPolicy,
    prefix: &str,
    lookup: &dyn InterfaceLookup,
) -> Result<Ipv6Net, SynthesisError> {
    let network = parse_prefix(prefix)?;

    match policy {
        AddressPolicy::Eui64 { subnet_id } => {
            if network.prefix_len() > SYNTHESIZED_PREFIX_LEN {
                return Err(SynthesisError::PrefixTooLong {
                    prefix: prefix.to_string(),
                    len: network.prefix_len(),
                });
            }
            let mac = lookup.hardware_address(target)?;
            eui64_address(&network, *subnet_id, &mac)
                .map_err(|_| SynthesisError::InvalidPrefix(prefix.to_string()))
        }
        AddressPolicy::Template { .. } => Err(SynthesisError::TemplateUnimplemented),
    }
}

/// Combine a network (mask length <= 64), a subnet id and a MAC
pub fn eui64_address(
    network: &Ipv6Net,
    subnet_id: u16,
    mac: &MacAddress,
) -> Result<Ipv6Net, PrefixLenError> {
    let upper_mask = (u128::from(network.netmask()) >> 64) as u64;
    let network_hi = (u128::from(network.network()) >> 64) as u64;
    let hi = (network_hi & upper_mask) | (u64::from(subnet_id) & !upper_mask);
    let lo = u64::from_be_bytes(mac.interface_identifier());

    let addr = Ipv6Addr::from((u128::from(hi) << 64) | u128::from(lo));
    Ipv6Net::new(addr, SYNTHESIZED_PREFIX_LEN)
}
