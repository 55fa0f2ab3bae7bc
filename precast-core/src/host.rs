//! The contract this engine expects from whatever proxy embeds it.
//!
//! Grounded on `backbone-lib`'s `BackEndArchitecture` trait: a narrow set
//! of callbacks the transport layer drives, with the heavy lifting left to
//! the implementor. Here the "transport layer" is an external intercepting
//! proxy instead of a relay server, so the trait is a hook-registration
//! surface rather than a connection lifecycle.

use precast_protocol::{HookOrder, PacketRole, PacketVersion, QueuedPacket};

/// A registered hook, returned so the host can unregister it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(pub u64);

/// Why a hook subscription was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeError {
    /// The host's packet format for this role is a version the engine
    /// doesn't know how to read; rather than panic or silently misparse,
    /// subscription fails and the engine degrades to passing that role
    /// through unexamined.
    UnsupportedVersion { role: PacketRole, found: PacketVersion },
}

/// The registry of packet hooks the engine needs from its host, and the
/// one outbound action it needs back: enqueuing a packet for the host to
/// actually put on the wire.
///
/// Implementations live entirely on the host side; this crate only ever
/// holds a `&dyn HostHooks` or generic `H: HostHooks` bound, never an
/// implementation of its own, since the proxy integration is out of scope
/// here.
pub trait HostHooks {
    /// Registers interest in a packet role at a given hook order and
    /// access level, for a given wire version. Returns a `Subscription`
    /// the engine can later pass to `unsubscribe`.
    fn subscribe(
        &mut self,
        role: PacketRole,
        order: HookOrder,
        version: PacketVersion,
    ) -> Result<Subscription, SubscribeError>;

    fn unsubscribe(&mut self, subscription: Subscription);

    /// Hands a locally-synthesized packet to the host for transmission.
    fn emit(&mut self, packet: QueuedPacket);

    /// The character class of the local player, used to scope catalog and
    /// support-table lookups. `None` before login completes.
    fn local_class(&self) -> Option<String>;
}
