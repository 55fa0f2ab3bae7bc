//! Component C - cooldown tracking with ping compensation.
//!
//! The server tells us when a cooldown *started* and how long it lasts; the
//! engine rewrites the end time to account for the round trip so the local
//! player can recast the instant the server will actually accept it, not
//! the instant our own (late) view of the world says it's ready.

use std::collections::HashMap;

use precast_protocol::SkillId;

/// One live cooldown entry.
#[derive(Debug, Clone, Copy)]
pub struct CooldownEntry {
    pub issued_at: u64,
    pub duration_ms: u64,
    /// Ping/jitter-compensated end timestamp; this is what callers check
    /// against, not `issued_at + duration_ms`.
    pub ends_at: u64,
}

impl CooldownEntry {
    pub fn is_active(&self, now_ms: u64) -> bool {
        now_ms < self.ends_at
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.ends_at.saturating_sub(now_ms)
    }
}

/// Skill types excluded from the "{base}-0" group-cooldown key: these fire
/// cooldowns that are genuinely per-sub rather than shared across a skill's
/// levels.
pub(crate) fn group_key(skill_id: SkillId, type_is_projectile: bool, type_is_drain: bool, type_is_moving_skill: bool, type_is_lockon: bool) -> SkillId {
    if type_is_projectile || type_is_drain || type_is_moving_skill || type_is_lockon {
        skill_id
    } else {
        SkillId::from_triple(skill_id.base(), 0, 0)
    }
}

/// The compensation formula:
/// `ends = issue_time + duration - max(0, ping - jitter - 5)`.
pub fn compensated_end(issued_at: u64, duration_ms: u64, ping_ms: u64, jitter_ms: u64) -> u64 {
    let slack = ping_ms.saturating_sub(jitter_ms).saturating_sub(5);
    issued_at + duration_ms - slack.min(duration_ms)
}

#[derive(Default)]
pub struct CooldownTracker {
    entries: HashMap<SkillId, CooldownEntry>,
    reset_listeners_fired: Vec<SkillId>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on_cooldown(&self, key: SkillId, now_ms: u64) -> bool {
        self.entries.get(&key).is_some_and(|e| e.is_active(now_ms))
    }

    /// Same check as [`is_on_cooldown`](Self::is_on_cooldown), but computes
    /// the `{base}-0` group key itself rather than making every caller do it.
    pub fn is_on_cooldown_for(
        &self,
        skill_id: SkillId,
        is_projectile: bool,
        is_drain: bool,
        is_moving_skill: bool,
        is_lockon: bool,
        now_ms: u64,
    ) -> bool {
        let key = group_key(skill_id, is_projectile, is_drain, is_moving_skill, is_lockon);
        self.is_on_cooldown(key, now_ms)
    }

    pub fn get(&self, key: SkillId) -> Option<CooldownEntry> {
        self.entries.get(&key).copied()
    }

    /// Applies a `StartCooltimeSkill` packet, grouping by `{base}-0` unless
    /// the skill is a projectile/drain/movingSkill/lockon type that keeps
    /// its own independent cooldown.
    pub fn start(
        &mut self,
        skill_id: SkillId,
        duration_ms: u64,
        issued_at: u64,
        ping_ms: u64,
        jitter_ms: u64,
        is_projectile: bool,
        is_drain: bool,
        is_moving_skill: bool,
        is_lockon: bool,
    ) -> SkillId {
        let key = group_key(skill_id, is_projectile, is_drain, is_moving_skill, is_lockon);
        let ends_at = compensated_end(issued_at, duration_ms, ping_ms, jitter_ms);
        self.entries.insert(
            key,
            CooldownEntry {
                issued_at,
                duration_ms,
                ends_at,
            },
        );
        key
    }

    /// Applies a `DecreaseCooltimeSkill` packet: shrinks the remaining
    /// duration of an already-tracked entry without restamping `issued_at`.
    pub fn decrease(&mut self, key: SkillId, decrease_ms: u64, ping_ms: u64, jitter_ms: u64) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.duration_ms = entry.duration_ms.saturating_sub(decrease_ms);
            entry.ends_at = compensated_end(entry.issued_at, entry.duration_ms, ping_ms, jitter_ms);
        }
    }

    /// A type-6 `CrestMessage` clears a cooldown outright (used by the
    /// warrior 0xD2 exception threaded through from `effects.rs`).
    pub fn reset(&mut self, key: SkillId) {
        if self.entries.remove(&key).is_some() {
            self.reset_listeners_fired.push(key);
        }
    }

    /// Drains the keys that were reset since the last call, mirroring an
    /// `on("reset")` event subscription without requiring a callback type.
    pub fn take_reset_events(&mut self) -> Vec<SkillId> {
        std::mem::take(&mut self.reset_listeners_fired)
    }
}
