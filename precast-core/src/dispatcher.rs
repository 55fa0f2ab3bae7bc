//! Component I - the dispatcher.
//!
//! Turns a [`TransitionDescriptor`] into the concrete packets the host
//! should emit locally, ahead of the server's own confirmation. This is
//! also where the Gunner projectile-id reconciliation and the
//! `catchBack`/`shortTel` destination math live, since both only make
//! sense once a transition has already been decided.

use std::collections::HashMap;

use precast_protocol::{PacketRole, PacketVersion, QueuedPacket, SkillId};

use crate::catalog::{Catalog, SkillType};
use crate::decision_engine::TransitionDescriptor;

/// A fake projectile id the engine predicted locally, pending
/// reconciliation against the server's own `StartUserProjectile`.
#[derive(Debug, Clone)]
struct PendingProjectile {
    fake_id: u32,
    skill_id: SkillId,
    /// Hits buffered against the fake id before the real id arrived.
    buffered_hits: Vec<u32>,
}

/// Gunner-class projectile reconciliation: the client predicts a
/// `StartUserProjectile` locally (so hit feedback feels instant) under a
/// fake id, then remaps to the server's real id once it arrives and
/// replays any hits that came in against the fake id in the meantime.
#[derive(Default)]
pub struct ProjectileReconciler {
    pending: HashMap<u32, PendingProjectile>,
    next_fake_id: u32,
}

impl ProjectileReconciler {
    pub fn new() -> Self {
        ProjectileReconciler {
            pending: HashMap::new(),
            next_fake_id: 1,
        }
    }

    /// Predicts a projectile locally and returns the fake id assigned to
    /// it; the real `StartUserProjectile` for this cast must be suppressed
    /// by the host until [`reconcile`] resolves it.
    pub fn predict(&mut self, skill_id: SkillId) -> u32 {
        let fake_id = self.next_fake_id;
        self.next_fake_id = self.next_fake_id.wrapping_add(1).max(1);
        self.pending.insert(
            fake_id,
            PendingProjectile {
                fake_id,
                skill_id,
                buffered_hits: Vec::new(),
            },
        );
        fake_id
    }

    /// Buffers a hit that arrived against a fake id before the real
    /// projectile id showed up.
    pub fn buffer_hit(&mut self, fake_id: u32, hit_target: u32) {
        if let Some(entry) = self.pending.get_mut(&fake_id) {
            entry.buffered_hits.push(hit_target);
        }
    }

    /// Resolves the oldest pending prediction for `skill_id` against the
    /// server's real id, returning any buffered hits that should now be
    /// replayed against the real id.
    pub fn reconcile(&mut self, skill_id: SkillId, _real_id: u32) -> Option<Vec<u32>> {
        let fake_id = self
            .pending
            .iter()
            .find(|(_, entry)| entry.skill_id == skill_id)
            .map(|(id, _)| *id)?;
        self.pending.remove(&fake_id).map(|entry| entry.buffered_hits)
    }

    pub fn is_real_start_suppressed(&self, skill_id: SkillId) -> bool {
        self.pending.values().any(|entry| entry.skill_id == skill_id)
    }
}

fn packet_version() -> PacketVersion {
    PacketVersion(1)
}

fn make_packet(skill_id: SkillId, kind: PacketRole, send_at: u64, expires_at: u64) -> QueuedPacket {
    QueuedPacket {
        skill_id,
        payload: Vec::new(),
        packet_kind: kind,
        packet_version: packet_version(),
        expires_at,
        send_at,
    }
}

/// `catchBack`/`shortTel` destination: the skill's declared per-stage
/// distance, pointed back toward the player's facing direction rather than
/// forward.
pub fn catch_back_destination(distance: f32, direction_modifier: f32) -> (f32, f32) {
    let angle = direction_modifier + std::f32::consts::PI;
    (distance * angle.cos(), distance * angle.sin())
}

/// Whether a real `InstantMove`/`InstantDash`/`InstanceArrow` packet from
/// the server should be suppressed because the local cooldown-compensated
/// prediction already played it out.
pub fn should_block_real_movement_packet(catalog: &Catalog, skill_id: SkillId, now_ms: u64, predicted_ends_at: Option<u64>) -> bool {
    let Some(record) = catalog.get(skill_id) else {
        return false;
    };
    if !matches!(record.skill_type, SkillType::Dash | SkillType::CatchBack | SkillType::ShortTel) {
        return false;
    }
    predicted_ends_at.is_some_and(|ends| now_ms < ends)
}

/// Turns a resolved transition into the packets the host should emit
/// locally. `now_ms` anchors `send_at`/`expires_at` scheduling; a
/// transition's own `time_ms` offset shifts `send_at` earlier (negative) or
/// later (positive) relative to `now_ms`, per the decision engine's
/// `_calculateTime` contract.
pub fn dispatch(transition: &TransitionDescriptor, now_ms: u64, expire_after_ms: u64) -> Vec<QueuedPacket> {
    let expires_at = now_ms + expire_after_ms;
    let send_at = |time_ms: i64| (now_ms as i64 + time_ms).max(0) as u64;
    match transition {
        TransitionDescriptor::Begin { skill_id, time_ms, .. } => {
            vec![make_packet(*skill_id, PacketRole::ActionStage, send_at(*time_ms), expires_at)]
        }
        TransitionDescriptor::Chain { next, time_ms, .. }
        | TransitionDescriptor::FrontCancel { next, time_ms, .. }
        | TransitionDescriptor::RearCancel { next, time_ms, .. }
        | TransitionDescriptor::ImmediateNext { next, time_ms, .. }
        | TransitionDescriptor::ConnectSkill { next, time_ms, .. }
        | TransitionDescriptor::SuperCancel { next, time_ms, .. }
        | TransitionDescriptor::KeepCharge { next, time_ms, .. }
        | TransitionDescriptor::BlockCast { next, time_ms }
        | TransitionDescriptor::LockonEscape { next, time_ms }
        | TransitionDescriptor::KnockdownEscape { next, time_ms }
        | TransitionDescriptor::DrainContinuation { next, time_ms }
        | TransitionDescriptor::ArrowGrant { skill_id: next, time_ms } => {
            vec![make_packet(*next, PacketRole::ActionStage, send_at(*time_ms), expires_at)]
        }
        TransitionDescriptor::DashRedirect { next, time_ms } => {
            vec![make_packet(*next, PacketRole::InstantDash, send_at(*time_ms), expires_at)]
        }
        TransitionDescriptor::LockOn { chain: Some(next), time_ms, .. } => {
            vec![make_packet(*next, PacketRole::ActionStage, send_at(*time_ms), expires_at)]
        }
        TransitionDescriptor::LockOn { chain: None, .. }
        | TransitionDescriptor::SelfCancel { .. }
        | TransitionDescriptor::FutureAction { .. }
        | TransitionDescriptor::Refused(_)
        | TransitionDescriptor::PassThrough => Vec::new(),
    }
}
