//! Wires every component into one owning struct, the way `backbone-lib`'s
//! `MiddleLayer` owns a connection's state for its lifetime - except here
//! the lifetime is a character login, not a socket, and there is no
//! `update(delta_time)` frame tick: every method is called from a packet
//! hook or a host-supplied timer. This engine is event-driven, not
//! frame-driven.

use std::collections::{HashMap, HashSet};

use precast_protocol::SkillId;

use crate::action_tracker::{ActionTracker, WiggleRoomMode};
use crate::arrow::ArrowGrantTable;
use crate::catalog::{Catalog, SkillType, SupportTable};
use crate::cc_gate::{self, CcFamily};
use crate::clock::Clock;
use crate::config::ProxyConfig;
use crate::cooldown::CooldownTracker;
use crate::decision_engine::{self, DecisionContext, JobClass, TransitionDescriptor};
use crate::dispatcher::{self, ProjectileReconciler};
use crate::effects::EffectsView;
use crate::network_monitor::NetworkMonitor;
use crate::queue::PacketQueue;

/// How long a faked packet a transition emits stays eligible to send before
/// it's dropped as stale; generous relative to the sub-200ms windows the
/// decision engine itself reasons about.
const PACKET_EXPIRY_MS: u64 = 2_000;

fn job_class_from_name(class_name: &str) -> JobClass {
    match class_name {
        "warrior" => JobClass::Warrior,
        "lancer" => JobClass::Lancer,
        "brawler" => JobClass::Brawler,
        "ninja" => JobClass::Ninja,
        "berserker" => JobClass::Berserker,
        "sorcerer" => JobClass::Sorcerer,
        _ => JobClass::Other,
    }
}

/// Every per-character-login component, owned together so clearing a
/// session on logout/class-change is a single replace rather than N
/// scattered resets.
pub struct PrecastSession {
    pub config: ProxyConfig,
    pub catalog: Catalog,
    pub network: NetworkMonitor,
    pub cooldowns: CooldownTracker,
    pub actions: ActionTracker,
    pub effects: EffectsView,
    pub queue: PacketQueue,
    pub projectiles: ProjectileReconciler,
    pub arrows: ArrowGrantTable,
    job: JobClass,
    /// `(abnormality id, family)` pairs currently denying casts, classified
    /// by the abnormality catalog data the host feeds in - kept as a set
    /// here rather than re-derived per cast so `cc_gate::check` stays a pure
    /// predicate over already-classified state. The value is the
    /// abnormality's status flag bits (§3 `AbnormalityState.status`), which
    /// `cc_gate::check` consults for the stun family's bit-16 exception.
    cc_active: HashMap<(u32, CcFamily), u32>,
    /// Skill bases with an active "connect-next" abnormality (type value
    /// 334 in the source data), switching a request to the record's
    /// `connect_next_skill` before resolution.
    connect_next_bases: HashSet<u32>,
    /// Skill categories currently under a "category override" abnormality
    /// (type 239, method 3), forcing a `sub = 30` re-lookup for any request
    /// whose record declares an overlapping category.
    category_override_categories: HashSet<u32>,
    mid_animation_sequence: bool,
}

impl PrecastSession {
    pub fn new(
        config: ProxyConfig,
        class_name: String,
        skills: HashMap<SkillId, crate::catalog::SkillRecord>,
        support: SupportTable,
        is_warrior: bool,
    ) -> Self {
        let wiggle_room_mode: WiggleRoomMode = config.wiggle_room_mode.into();
        let job = job_class_from_name(&class_name);
        PrecastSession {
            config,
            catalog: Catalog::new(class_name, skills, support),
            network: NetworkMonitor::new(),
            cooldowns: CooldownTracker::new(),
            actions: ActionTracker::new(wiggle_room_mode),
            effects: EffectsView::new(is_warrior),
            queue: PacketQueue::default(),
            projectiles: ProjectileReconciler::new(),
            arrows: ArrowGrantTable::new(),
            job,
            cc_active: HashMap::new(),
            connect_next_bases: HashSet::new(),
            category_override_categories: HashSet::new(),
            mid_animation_sequence: false,
        }
    }

    /// Whether the engine should do anything at all for this packet -
    /// the single "is the plugin on" gate every hook checks first.
    pub fn is_active(&self) -> bool {
        self.config.enabled
    }

    /// Runs the low-frequency housekeeping a host-supplied periodic timer
    /// should drive: ping requests and jitter-entry sweeping. Returns
    /// `true` if a `RequestGameStatPing` should be sent this call.
    pub fn on_timer_tick(&mut self, clock: &dyn Clock) -> bool {
        self.arrows.sweep(clock.now_ms());
        crate::network_monitor::tick(&mut self.network, clock)
    }

    /// Drains packets whose scheduled send time has arrived, to be handed
    /// to `HostHooks::emit` by the caller. Returns `None` if the queue's
    /// throttle interval hasn't elapsed yet.
    pub fn drain_due_packets(&mut self, now_ms: u64) -> Option<Vec<precast_protocol::QueuedPacket>> {
        if !self.queue.should_tick(now_ms) {
            return None;
        }
        Some(self.queue.drain_ready(now_ms))
    }

    pub fn set_cc_abnormality(&mut self, abnormality_id: u32, family: CcFamily, status: u32) {
        self.cc_active.insert((abnormality_id, family), status);
    }

    pub fn clear_cc_abnormality(&mut self, abnormality_id: u32, family: CcFamily) {
        self.cc_active.remove(&(abnormality_id, family));
    }

    pub fn set_mid_animation_sequence(&mut self, value: bool) {
        self.mid_animation_sequence = value;
    }

    pub fn set_connect_next(&mut self, base: u32) {
        self.connect_next_bases.insert(base);
    }

    pub fn clear_connect_next(&mut self, base: u32) {
        self.connect_next_bases.remove(&base);
    }

    pub fn set_category_override(&mut self, categories: &[u32]) {
        self.category_override_categories.extend(categories.iter().copied());
    }

    pub fn clear_category_override(&mut self, categories: &[u32]) {
        for category in categories {
            self.category_override_categories.remove(category);
        }
    }

    /// Builds a [`DecisionContext`] from the session's own live state and
    /// resolves it, without applying the result - the read half of the
    /// request/decision/dispatch pipeline, split out so a caller can inspect
    /// a `Refused` transition before deciding whether to touch any state.
    #[allow(clippy::too_many_arguments)]
    pub fn request_cast(
        &self,
        requested: SkillId,
        now_ms: u64,
        press: bool,
        is_moving: bool,
        has_resource: bool,
        has_weapon: bool,
        defence_succeeded: bool,
        defence_time_ms: Option<u64>,
        knocked_down: bool,
        airborne: bool,
        by_grant: bool,
    ) -> TransitionDescriptor {
        let active_abnormalities = self.effects.active_begin_times();
        let record = self.catalog.get(requested);
        let applied = record.map(|r| self.effects.applied_effects(r)).unwrap_or_default();

        let is_projectile = record.is_some_and(|r| r.skill_type == SkillType::Projectile);
        let is_drain = record.is_some_and(|r| r.skill_type == SkillType::Drain);
        let is_moving_skill = record.is_some_and(|r| r.skill_type == SkillType::MovingSkill);
        let is_lockon = record.is_some_and(|r| r.skill_type == SkillType::Lockon);
        let on_cooldown = self
            .cooldowns
            .is_on_cooldown_for(requested, is_projectile, is_drain, is_moving_skill, is_lockon, now_ms);

        let is_movement_skill = record.is_some_and(|r| r.type_id == 27);
        let cc_denial = cc_gate::check(&self.cc_active, is_movement_skill, self.mid_animation_sequence);
        let feared = self.cc_active.keys().any(|&(_, family)| family == CcFamily::Fear);

        let connect_next_active = self.connect_next_bases.contains(&requested.base());
        let category_override_active = record
            .is_some_and(|r| r.categories.iter().any(|c| self.category_override_categories.contains(c)));

        let arrow_grant = self.arrows.get(requested, now_ms);

        let wiggle_room_mode: WiggleRoomMode = self.config.wiggle_room_mode.into();
        let wiggle_plus80 = wiggle_room_mode == WiggleRoomMode::JitterPlus80;

        let ctx = DecisionContext {
            requested,
            action: self.actions.state(),
            speed: self.effects.speed(),
            now_ms,
            jitter_ms: self.network.jitter_ms() as i64,
            wiggle_plus80,
            on_cooldown,
            is_supported: self.catalog.is_supported(requested),
            cc_denial,
            has_resource,
            has_weapon,
            is_moving,
            defence_succeeded,
            defence_time_ms,
            config_blocked: self.config.block,
            by_grant,
            press,
            job: self.job,
            knocked_down,
            airborne,
            feared,
            active_abnormalities: &active_abnormalities,
            arrow_grant,
            connect_next_active,
            category_override_active,
            transform: applied.transform,
        };

        decision_engine::resolve(&self.catalog, &ctx)
    }

    /// Applies a resolved transition back into the session: updates the
    /// action tracker's in-progress state and enqueues whatever faked
    /// packets the dispatcher derives from it. Every invariant the action
    /// tracker and queue hold is restored before this returns, per a single
    /// cast request being handled start to finish inside one call.
    pub fn apply_transition(&mut self, transition: &TransitionDescriptor, now_ms: u64) {
        let speed = self.effects.speed();
        match transition {
            TransitionDescriptor::Begin { skill_id, predicted_end, .. } => {
                self.actions.begin(*skill_id, speed, now_ms, *predicted_end);
            }
            TransitionDescriptor::Chain { next, predicted_end, .. }
            | TransitionDescriptor::FrontCancel { next, predicted_end, .. }
            | TransitionDescriptor::RearCancel { next, predicted_end, .. }
            | TransitionDescriptor::ImmediateNext { next, predicted_end, .. }
            | TransitionDescriptor::ConnectSkill { next, predicted_end, .. }
            | TransitionDescriptor::SuperCancel { next, predicted_end, .. } => {
                self.actions.begin(*next, speed, now_ms, *predicted_end);
            }
            TransitionDescriptor::KeepCharge { next, carried_stage, predicted_end, .. } => {
                self.actions.begin(*next, speed, now_ms, *predicted_end);
                self.actions.set_kept_moving_charge(*carried_stage);
            }
            TransitionDescriptor::DrainContinuation { next, .. } => {
                self.actions.begin(*next, speed, now_ms, None);
            }
            TransitionDescriptor::LockOn { chain: Some(next), .. } => {
                self.actions.begin(*next, speed, now_ms, None);
            }
            TransitionDescriptor::LockOn { chain: None, .. } => {}
            TransitionDescriptor::DashRedirect { next, .. }
            | TransitionDescriptor::BlockCast { next, .. }
            | TransitionDescriptor::LockonEscape { next, .. }
            | TransitionDescriptor::KnockdownEscape { next, .. } => {
                self.actions.begin(*next, speed, now_ms, None);
            }
            TransitionDescriptor::ArrowGrant { skill_id, .. } => {
                self.actions.begin(*skill_id, speed, now_ms, None);
            }
            TransitionDescriptor::SelfCancel { .. } | TransitionDescriptor::FutureAction { .. } => {
                self.actions.end_action();
            }
            TransitionDescriptor::Refused(_) | TransitionDescriptor::PassThrough => {}
        }

        for packet in dispatcher::dispatch(transition, now_ms, PACKET_EXPIRY_MS) {
            self.queue.enqueue(packet);
        }
    }

    /// Convenience wrapper running the full request -> decision -> dispatch
    /// pipeline for one cast attempt in a single call.
    #[allow(clippy::too_many_arguments)]
    pub fn cast(
        &mut self,
        requested: SkillId,
        now_ms: u64,
        press: bool,
        is_moving: bool,
        has_resource: bool,
        has_weapon: bool,
        defence_succeeded: bool,
        defence_time_ms: Option<u64>,
        knocked_down: bool,
        airborne: bool,
        by_grant: bool,
    ) -> TransitionDescriptor {
        let transition = self.request_cast(
            requested,
            now_ms,
            press,
            is_moving,
            has_resource,
            has_weapon,
            defence_succeeded,
            defence_time_ms,
            knocked_down,
            airborne,
            by_grant,
        );
        self.apply_transition(&transition, now_ms);
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn disabled_config_reports_inactive() {
        let mut config = ProxyConfig::default();
        config.enabled = false;
        let session = PrecastSession::new(config, "warrior".to_string(), HashMap::new(), HashMap::new(), false);
        assert!(!session.is_active());
    }

    #[test]
    fn timer_tick_requests_ping_on_first_call() {
        let config = ProxyConfig::default();
        let mut session = PrecastSession::new(config, "warrior".to_string(), HashMap::new(), HashMap::new(), false);
        let clock = ManualClock::new(0);
        assert!(session.on_timer_tick(&clock));
    }

    fn scalar_skill(skill_type: SkillType) -> crate::catalog::SkillRecord {
        use crate::catalog::{AnimLength, CancelWindows};
        use std::collections::{HashMap as StdHashMap, HashSet as StdHashSet};
        crate::catalog::SkillRecord {
            skill_type,
            type_id: 1,
            anim_length: AnimLength::Scalar(1_000.0),
            should_not_use_length: false,
            cancels: CancelWindows::default(),
            chains: StdHashMap::new(),
            connect_skills: StdHashMap::new(),
            abnormality_redirect: Vec::new(),
            abnormality_redirect_to_me: StdHashSet::new(),
            abnormality_apply: Vec::new(),
            abnormality_consume_stage: Vec::new(),
            abnormality_consume_end: Vec::new(),
            apply_cooldown: None,
            categories: Vec::new(),
            pending_type: 0,
            keep_moving_charge: false,
            kept_moving_charge: false,
            can_cast_during_block: false,
            only_after_defence_success: false,
            hold_if_not_moving: false,
            no_need_weapon: false,
            fixed_speed: false,
            lockon: false,
            next_skill: None,
            connect_next_skill: None,
            over_charge_connect_skill: None,
            dash_redirect: None,
            dash_redirect_fail: None,
            arrow_chain: false,
            resource_usage_st: 0.0,
            anim_seq: Vec::new(),
            distance: Vec::new(),
            use_dest: Vec::new(),
            direction_modifier: Vec::new(),
        }
    }

    #[test]
    fn cast_begins_a_fresh_action_and_enqueues_a_packet() {
        let mut skills = HashMap::new();
        let skill = SkillId(10_000);
        skills.insert(skill, scalar_skill(SkillType::Normal));
        let mut session = PrecastSession::new(ProxyConfig::default(), "warrior".to_string(), skills, HashMap::new(), true);

        let transition = session.cast(skill, 0, true, true, true, true, true, None, false, false, false);
        assert!(matches!(transition, TransitionDescriptor::Begin { skill_id, .. } if skill_id == skill));
        assert!(session.actions.state().in_action);
        assert_eq!(session.queue.len(), 1);
    }

    #[test]
    fn cc_denial_refuses_cast_before_decision_engine_runs() {
        let mut skills = HashMap::new();
        let skill = SkillId(10_000);
        skills.insert(skill, scalar_skill(SkillType::Normal));
        let mut session = PrecastSession::new(ProxyConfig::default(), "warrior".to_string(), skills, HashMap::new(), true);
        session.set_cc_abnormality(1, CcFamily::Stun, 0);

        let transition = session.cast(skill, 0, true, true, true, true, true, None, false, false, false);
        assert!(matches!(
            transition,
            TransitionDescriptor::Refused(crate::decision_engine::CastRefusal::CrowdControlled(_))
        ));
        assert!(session.queue.is_empty());
    }

    #[test]
    fn arrow_grant_shortcuts_a_by_grant_cast() {
        let mut skills = HashMap::new();
        let original = SkillId(10_000);
        let arrow_skill = SkillId(10_001);
        skills.insert(original, scalar_skill(SkillType::Normal));
        skills.insert(arrow_skill, scalar_skill(SkillType::Normal));
        let mut session = PrecastSession::new(ProxyConfig::default(), "warrior".to_string(), skills, HashMap::new(), true);
        session.arrows.grant(original, arrow_skill, 0);

        let transition = session.cast(original, 50, true, true, true, true, true, None, false, false, true);
        assert!(matches!(transition, TransitionDescriptor::ArrowGrant { skill_id, .. } if skill_id == arrow_skill));
    }
}
