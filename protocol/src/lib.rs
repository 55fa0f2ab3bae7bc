//! The wire-level contract between the skill latency-compensation core and
//! the host proxy it is embedded in.
//!
//! This crate deliberately knows nothing about framing, encryption, or the
//! concrete byte layout of any packet - that remains the host's job. What it
//! fixes is the *shape* of the boundary: which packets exist (by semantic
//! role), how a hook declares its ordering and read/modify intent, and the
//! handful of plain data envelopes (skill ids, queued packets) that cross
//! from core to host and back.

use serde::{Deserialize, Serialize};

/// A skill identifier, packed as `base * 10_000 + level * 100 + sub`.
///
/// The packing keeps a skill id totally ordered and cheap to use as a map
/// key while still letting callers recover the three logical components
/// whenever a rule needs to reason about "the base skill" or "a redirect
/// within 10,000 of the original" (see the decision engine's redirect loop).
/// Backed by `u64`: `base` alone ranges up to `2^24`, so `base * 10_000`
/// already exceeds `u32::MAX` before `level`/`sub` are even folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkillId(pub u64);

impl SkillId {
    /// Builds a skill id from its three logical components.
    ///
    /// `base` may range up to `2^24`, `level` and `sub` are expected to stay
    /// within `0..=99` but are not validated here - the catalog is the
    /// authority on which combinations actually exist.
    pub const fn from_triple(base: u32, level: u32, sub: u32) -> Self {
        SkillId(base as u64 * 10_000 + level as u64 * 100 + sub as u64)
    }

    /// The `base` component (the skill family, ignoring level/sub-skill).
    pub const fn base(self) -> u32 {
        (self.0 / 10_000) as u32
    }

    /// The `level` component.
    pub const fn level(self) -> u32 {
        ((self.0 / 100) % 100) as u32
    }

    /// The `sub` component (sub-skill / stage variant).
    pub const fn sub(self) -> u32 {
        (self.0 % 100) as u32
    }

    /// Absolute distance between two skill ids, used by the redirect loop to
    /// decide whether a jump should be treated as "nearby" (same family) or
    /// delegated recursively.
    pub fn distance(self, other: SkillId) -> u64 {
        self.0.abs_diff(other.0)
    }
}

/// The semantic role of a packet crossing the host <-> core boundary.
///
/// Named by role rather than by wire opcode: the host proxy maps its own
/// opcode/version table onto these roles when it registers hooks, so the
/// core never has to know the concrete wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketRole {
    Login,
    SpawnMe,
    LoadTopo,
    ReturnToLobby,
    RequestGameStatPing,
    ResponseGameStatPong,
    StartCooltimeSkill,
    DecreaseCooltimeSkill,
    CrestMessage,
    AbnormalityBegin,
    AbnormalityEnd,
    PlayerStatUpdate,
    ActionStage,
    ActionEnd,
    InstantMove,
    InstantDash,
    InstanceArrow,
    StartUserProjectile,
    HitUserProjectile,
    StartInstanceSkill,
    StartCombatTargetedSkill,
    ConnectSkillArrow,
    SkillCategory,
    CannotStartSkill,
    SystemMessage,
    EachSkillResult,
    SpawnUser,
    SpawnNpc,
    DespawnUser,
    DespawnNpc,
    UserLocation,
    NpcLocation,
    CreatureRotate,
    CreatureChangeHp,
    ChangeRelation,
}

/// Whether a hook may only observe a packet, or may also rewrite/drop it.
///
/// Mirrors the host's "returning false drops / returning a payload rewrites"
/// contract - declared up front so the host can refuse to
/// register a `Modify` hook after another `Modify` hook already claimed the
/// same role, if it wants to enforce single-writer semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookAccess {
    /// The hook only observes; it cannot drop or rewrite the packet.
    Read,
    /// The hook may return `false` to drop the packet, or a rewritten
    /// payload to replace it before the client/server sees it.
    Modify,
}

/// Relative install order for a hook on a given [`PacketRole`].
///
/// Lower values run first. The host proxy is the one actually enforcing
/// ordering between unrelated plugins; this newtype just gives the core a
/// documented, totally-ordered value to register with instead of a bare
/// `i32` scattered through call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HookOrder(pub i32);

impl HookOrder {
    /// Run before most other plugins (observe raw server/client intent).
    pub const EARLY: HookOrder = HookOrder(-100);
    /// Default priority for hooks with no particular ordering requirement.
    pub const NORMAL: HookOrder = HookOrder(0);
    /// Run after most other plugins (observe the final, possibly-rewritten packet).
    pub const LATE: HookOrder = HookOrder(100);
}

/// The protocol version a hook was registered against.
///
/// Registration fails gracefully when the host's actual packet version
/// doesn't match: the mismatched hook is skipped and a warning logged, the
/// rest of the session continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketVersion(pub u16);

/// A skill-cast packet held by the queue until its cooldown clears.
///
/// `payload` is opaque to the core: it is whatever bytes the host proxy
/// needs to eventually re-emit the original client request, untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedPacket {
    /// The skill this cast packet is for.
    pub skill_id: SkillId,
    /// Opaque payload bytes, passed through unexamined.
    pub payload: Vec<u8>,
    /// Semantic role of the packet (always a cast-request role in practice).
    pub packet_kind: PacketRole,
    /// Protocol version the payload was captured under.
    pub packet_version: PacketVersion,
    /// Monotonic timestamp (ms) after which this packet must be discarded.
    pub expires_at: u64,
    /// Monotonic timestamp (ms) at which the packet becomes eligible to send.
    pub send_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_id_round_trips_triple() {
        for base in [0u32, 1, 42, (1u32 << 24) - 1] {
            for level in [0u32, 1, 50, 99] {
                for sub in [0u32, 1, 50, 99] {
                    let id = SkillId::from_triple(base, level, sub);
                    assert_eq!(id.base(), base);
                    assert_eq!(id.level(), level);
                    assert_eq!(id.sub(), sub);
                }
            }
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let a = SkillId(170_100);
        let b = SkillId(180_200);
        assert_eq!(a.distance(b), b.distance(a));
    }

    #[test]
    fn hook_order_orders_by_value() {
        assert!(HookOrder::EARLY < HookOrder::NORMAL);
        assert!(HookOrder::NORMAL < HookOrder::LATE);
    }
}
