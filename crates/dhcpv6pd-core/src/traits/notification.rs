// # Notification Traits
//
// Prefix-delegation facts arrive as `prefix-assigned` / `prefix-removed`
// notifications, each carrying an interface name and a prefix. A DHCPv6
// client hook (or the startup lease scan) emits them; the daemon receives
// them and feeds the prefix registry.
//
// ## Wire Format
//
// ```json
// {"notification": "prefix-assigned", "interface": "eth0", "prefix": "2001:db8:1::/56"}
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Payload shared by both notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixEvent {
    /// Interface the prefix was delegated on
    pub interface: String,
    /// Delegated prefix in CIDR form
    pub prefix: String,
}

impl PrefixEvent {
    pub fn new(interface: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            prefix: prefix.into(),
        }
    }
}

/// A prefix-delegation notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notification", rename_all = "kebab-case")]
pub enum Notification {
    /// A prefix was delegated (or renewed) on an interface
    PrefixAssigned(PrefixEvent),
    /// The interface's prefix went away; the prefix field is informational
    PrefixRemoved(PrefixEvent),
}

impl Notification {
    /// Notification name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Notification::PrefixAssigned(_) => "prefix-assigned",
            Notification::PrefixRemoved(_) => "prefix-removed",
        }
    }

    pub fn event(&self) -> &PrefixEvent {
        match self {
            Notification::PrefixAssigned(event) | Notification::PrefixRemoved(event) => event,
        }
    }
}

/// Trait for inbound notification transports
///
/// Sources are observers: they decode notifications and hand them on. They
/// never touch pipeline state.
pub trait NotificationSource: Send + Sync {
    /// Stream of received notifications
    ///
    /// The stream ends only when the transport shuts down. Dropping it
    /// releases the transport's resources.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Notification> + Send + 'static>>;
}

/// Trait for outbound notification transports
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Send one notification
    async fn emit(&self, notification: &Notification) -> Result<(), crate::Error>;
}

/// Emit `prefix-assigned(interface, prefix)`
pub async fn emit_prefix_assigned(
    emitter: &dyn Emitter,
    interface: &str,
    prefix: &str,
) -> Result<(), crate::Error> {
    emitter
        .emit(&Notification::PrefixAssigned(PrefixEvent::new(interface, prefix)))
        .await
}

/// Emit `prefix-removed(interface, prefix)`
pub async fn emit_prefix_removed(
    emitter: &dyn Emitter,
    interface: &str,
    prefix: &str,
) -> Result<(), crate::Error> {
    emitter
        .emit(&Notification::PrefixRemoved(PrefixEvent::new(interface, prefix)))
        .await
}
