//! Configuration types for the DHCPv6-PD system
//!
//! Two kinds of configuration live here:
//!
//! - [`ConfigTree`]: the operator's interface configuration, an RFC 7951
//!   JSON document replaced wholesale on every update, and its typed
//!   projection [`ConfigDerivedMap`].
//! - [`PipelineSettings`]: runtime knobs for the reconciliation pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Top-level container of all configured interfaces
pub const INTERFACES_KEY: &str = "vyatta-interfaces-v1:interfaces";

/// Container holding the prefix-delegation targets of a source interface
pub const DHCPV6PD_KEY: &str = "vyatta-dhcpv6pd-v1:dhcpv6pd";

/// Source interface → (target interface → policy)
pub type ConfigDerivedMap = BTreeMap<String, BTreeMap<String, AddressPolicy>>;

/// How a target interface derives its address from a delegated prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "address_type", rename_all = "snake_case")]
pub enum AddressPolicy {
    /// Modified EUI-64 host part under the given subnet id
    Eui64 {
        /// SLA / subnet identifier
        subnet_id: u16,
    },

    /// Address template (not implemented, never yields an address)
    Template {
        /// Template pattern
        pattern: String,
    },
}

/// The full interface configuration document
///
/// Owned by the config store and replaced wholesale; never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree(Value);

impl ConfigTree {
    /// Wrap a JSON document
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// An empty document
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Parse a document from JSON text
    pub fn from_json(text: &str) -> Result<Self, crate::Error> {
        Ok(Self(serde_json::from_str(text)?))
    }

    /// Borrow the underlying document
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Validate the tree
    ///
    /// Every tree is accepted at this layer. Semantic problems are reported
    /// per entry by [`ConfigTree::derive`].
    pub fn validate(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Compute the source → target → policy map
    ///
    /// Unknown interface types and unusable policies are dropped with a
    /// warning.
    pub fn derive(&self) -> ConfigDerivedMap {
        let mut derived = ConfigDerivedMap::new();

        let Some(types) = self.0.get(INTERFACES_KEY).and_then(Value::as_object) else {
            return derived;
        };

        for (iface_type, entries) in types {
            let Some(list_key) = interface_list_key(iface_type) else {
                warn!("unknown interface type {}", iface_type);
                continue;
            };

            for entry in entries.as_array().into_iter().flatten() {
                let Some(entry) = entry.as_object() else {
                    continue;
                };
                let Some(source) = member(entry, list_key).and_then(Value::as_str) else {
                    warn!("{} entry without {}, skipping", iface_type, list_key);
                    continue;
                };
                derived.insert(source.to_string(), target_policies(source, entry));
            }
        }

        derived
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::empty()
    }
}

/// List key of each supported interface type
fn interface_list_key(iface_type: &str) -> Option<&'static str> {
    match iface_type {
        "vyatta-interfaces-dataplane-v1:dataplane" => Some("tagnode"),
        _ => None,
    }
}

/// Drop the YANG module qualifier of a member name
fn strip_module(key: &str) -> &str {
    key.split_once(':').map_or(key, |(_, name)| name)
}

/// Look up a member by its unqualified name
fn member<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(key, _)| strip_module(key) == name)
        .map(|(_, value)| value)
}

fn target_policies(source: &str, entry: &Map<String, Value>) -> BTreeMap<String, AddressPolicy> {
    let targets = member(entry, "ipv6")
        .and_then(Value::as_object)
        .and_then(|ipv6| ipv6.get(DHCPV6PD_KEY).or_else(|| member(ipv6, "dhcpv6pd")))
        .and_then(Value::as_object)
        .and_then(|pd| member(pd, "target-interface"))
        .and_then(Value::as_array);

    let mut policies = BTreeMap::new();
    for target in targets.into_iter().flatten() {
        let Some(target) = target.as_object() else {
            continue;
        };
        let Some(name) = member(target, "name").and_then(Value::as_str) else {
            warn!("target interface of {} without a name, skipping", source);
            continue;
        };
        match parse_policy(target) {
            Ok(policy) => {
                policies.insert(name.to_string(), policy);
            }
            Err(reason) => warn!("skipping target {} of {}: {}", name, source, reason),
        }
    }
    policies
}

fn parse_policy(target: &Map<String, Value>) -> Result<AddressPolicy, String> {
    let address_type = member(target, "address-type")
        .and_then(Value::as_str)
        .map(strip_module);

    match address_type {
        Some("eui64") => {
            let subnet_id = match member(target, "sla-id") {
                None => 0,
                Some(Value::Number(n)) => n.as_u64().ok_or(format!("invalid sla-id {}", n))?,
                Some(Value::String(s)) => s.parse().map_err(|_| format!("invalid sla-id {}", s))?,
                Some(other) => return Err(format!("invalid sla-id {}", other)),
            };
            let subnet_id = u16::try_from(subnet_id)
                .map_err(|_| format!("sla-id {} does not fit in 16 bits", subnet_id))?;
            Ok(AddressPolicy::Eui64 { subnet_id })
        }
        Some("template") => {
            let pattern = member(target, "template")
                .or_else(|| member(target, "pattern"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(AddressPolicy::Template {
                pattern: pattern.to_string(),
            })
        }
        Some(other) => Err(format!("unsupported address-type {}", other)),
        None => Err("missing address-type".to_string()),
    }
}

/// Reconciliation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Upper bound on a single batch executor invocation (in seconds)
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,

    /// Capacity of the reconciler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl PipelineSettings {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.batch_timeout_secs == 0 {
            return Err(crate::Error::config("batch timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_timeout_secs: default_batch_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_batch_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}
