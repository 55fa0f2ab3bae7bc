//! Component E - abnormality (buff/debuff) tracking and the speed model
//! it feeds into animation-length math.

use std::collections::HashMap;

use precast_protocol::SkillId;

use crate::catalog::SkillRecord;

/// The two abnormality opcodes this engine reacts to.
const ABNORMALITY_APPLY_TYPE: u8 = 0xD1;
const ABNORMALITY_REMOVE_TYPE: u8 = 0xD2;
const ABNORMALITY_APPLY_METHOD: u8 = 3;
const ABNORMALITY_REMOVE_METHOD: u8 = 0;

/// One typed sub-effect an abnormality carries, per §3's
/// `AbnormalityEffects[{type, method, value}]`. The engine only cares about
/// a handful of effect types; everything else is carried opaquely and
/// ignored by `applied_effects`' tagged match, per §9's "exhaustive enums
/// with default = ignore" design note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbnormalityEffect {
    pub effect_type: u16,
    pub method: u8,
    pub value: f32,
}

/// Effect-type tags `applied_effects` understands. Unrecognized types are
/// carried on the instance but contribute nothing to the composed bundle.
const EFFECT_STAMINA_COST: u16 = 1;
const EFFECT_ABNORM_SPEED: u16 = 2;
const EFFECT_PASSIVE_SPEED: u16 = 3;
const EFFECT_CHARGE_SPEED: u16 = 4;
const EFFECT_NOCT: u16 = 5;
const EFFECT_DISTANCE: u16 = 6;
const EFFECT_SCALE: u16 = 7;
const EFFECT_TRANSFORM: u16 = 8;

/// A single active abnormality instance on the local player.
#[derive(Debug, Clone)]
pub struct AbnormalityInstance {
    pub abnormality_id: u32,
    /// Monotonic ms timestamp this abnormality was applied at.
    pub applied_at: u64,
    pub effects: Vec<AbnormalityEffect>,
}

/// `getAppliedEffects(skillId)`'s composed result (§4.E): the resource cost,
/// speed multipliers, distance, and effect-scale a skill actually plays out
/// with once every currently-active abnormality it's affected by has been
/// folded in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AppliedEffects {
    pub stamina: f32,
    pub abnorm_speed: f32,
    pub passive_speed: f32,
    pub charge_speed: f32,
    pub noct: f32,
    pub dist: f32,
    pub effect_scale: f32,
    /// A transform-redirect target, if some active abnormality carries one.
    pub transform: Option<SkillId>,
}

/// Animation speed, split into the server-declared value and the value the
/// engine actually uses for its own length math, after any injected
/// attack-speed modifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedState {
    /// The multiplier the server's stat stream reports.
    pub reported: f32,
    /// The multiplier the engine uses, after any injected modifier.
    pub real: f32,
}

impl Default for SpeedState {
    fn default() -> Self {
        SpeedState {
            reported: 1.0,
            real: 1.0,
        }
    }
}

/// Tracks abnormalities applied to the local player and the speed modifier
/// they imply, clearing at logout/class change same as the catalog.
#[derive(Default)]
pub struct EffectsView {
    active: HashMap<u32, AbnormalityInstance>,
    injected_modifier: Option<f32>,
    speed: SpeedState,
    warrior_class: bool,
}

impl EffectsView {
    pub fn new(warrior_class: bool) -> Self {
        EffectsView {
            active: HashMap::new(),
            injected_modifier: None,
            speed: SpeedState::default(),
            warrior_class,
        }
    }

    /// Applies or removes an abnormality on a `PlayerStatUpdate`-class
    /// packet, keyed by the 0xD1/method-3 apply and 0xD2/method-0 remove
    /// opcode pairing.
    ///
    /// Returns `true` if this call changed the active set.
    pub fn observe_category_packet(
        &mut self,
        abnormality_id: u32,
        packet_type: u8,
        method: u8,
        now_ms: u64,
    ) -> bool {
        match (packet_type, method) {
            (ABNORMALITY_APPLY_TYPE, ABNORMALITY_APPLY_METHOD) => {
                self.active.insert(
                    abnormality_id,
                    AbnormalityInstance {
                        abnormality_id,
                        applied_at: now_ms,
                        effects: Vec::new(),
                    },
                );
                true
            }
            (ABNORMALITY_REMOVE_TYPE, ABNORMALITY_REMOVE_METHOD) => {
                // Warriors alone keep a 0xD2 exception: the type-6 crest
                // message resets their related cooldown group instead of
                // clearing the abnormality here (cooldown.rs handles that).
                if self.warrior_class && self.is_warrior_exempt(abnormality_id) {
                    return false;
                }
                self.active.remove(&abnormality_id).is_some()
            }
            _ => false,
        }
    }

    /// Warrior-only abnormalities that a 0xD2/method-0 packet must not clear
    /// here because a dedicated crest-message reset already owns them.
    fn is_warrior_exempt(&self, abnormality_id: u32) -> bool {
        matches!(abnormality_id, 909745)
    }

    pub fn is_category_enabled(&self, abnormality_id: u32) -> bool {
        self.active.contains_key(&abnormality_id)
    }

    pub fn active_instances(&self) -> impl Iterator<Item = &AbnormalityInstance> {
        self.active.values()
    }

    /// `(abnormality id -> begin time)` for every currently active
    /// abnormality, the shape the decision engine's redirect loop and
    /// chain-capture logic consume directly.
    pub fn active_begin_times(&self) -> HashMap<u32, u64> {
        self.active.iter().map(|(&id, inst)| (id, inst.applied_at)).collect()
    }

    /// Full `AbnormalityBegin`/`AbnormalityEnd` tracking, distinct from the
    /// narrower 0xD1/0xD2 category toggle above: this is what feeds
    /// `active_begin_times` and `applied_effects`.
    pub fn begin_abnormality(&mut self, abnormality_id: u32, now_ms: u64, effects: Vec<AbnormalityEffect>) {
        self.active.insert(
            abnormality_id,
            AbnormalityInstance {
                abnormality_id,
                applied_at: now_ms,
                effects,
            },
        );
    }

    /// Tears down an abnormality on `AbnormalityEnd`. Returns `true` if it
    /// was actually active. If the abnormality injected an attack-speed
    /// modifier, that modifier is torn down too - the "end or ping timeout,
    /// whichever is earlier" teardown (§4.E) the rest is handled by the
    /// session's own timeout bookkeeping.
    pub fn end_abnormality(&mut self, abnormality_id: u32) -> bool {
        let existed = self.active.remove(&abnormality_id).is_some();
        if existed && self.active.values().all(|inst| !has_attack_speed_effect(inst)) {
            self.clear_speed_modifier();
        }
        existed
    }

    /// Composes `getAppliedEffects(skillId)` (§4.E): folds every active
    /// abnormality this skill's `abnormalityApply` list names into one
    /// resource/speed/distance/transform bundle. Abnormalities not named by
    /// the skill's own `abnormalityApply` list don't contribute - this
    /// mirrors the source's per-skill effect-bundle application rather than
    /// a blanket "every active abnormality affects every skill" model.
    pub fn applied_effects(&self, record: &SkillRecord) -> AppliedEffects {
        let mut bundle = AppliedEffects::default();
        for &abnormality_id in &record.abnormality_apply {
            let Some(instance) = self.active.get(&abnormality_id) else {
                continue;
            };
            for effect in &instance.effects {
                match effect.effect_type {
                    EFFECT_STAMINA_COST => bundle.stamina += effect.value,
                    EFFECT_ABNORM_SPEED => bundle.abnorm_speed += effect.value,
                    EFFECT_PASSIVE_SPEED => bundle.passive_speed += effect.value,
                    EFFECT_CHARGE_SPEED => bundle.charge_speed += effect.value,
                    EFFECT_NOCT => bundle.noct += effect.value,
                    EFFECT_DISTANCE => bundle.dist += effect.value,
                    EFFECT_SCALE => bundle.effect_scale += effect.value,
                    EFFECT_TRANSFORM if bundle.transform.is_none() => {
                        bundle.transform = Some(SkillId(effect.value as u64));
                    }
                    _ => {}
                }
            }
        }
        bundle
    }

    /// Injects an attack-speed modifier (e.g. a `movingCharge` keep-charge
    /// state) on top of the server-reported speed.
    pub fn inject_speed_modifier(&mut self, modifier: f32) {
        self.injected_modifier = Some(modifier);
        self.recompute_speed();
    }

    /// Tears down any injected modifier - called on abnormality end or when
    /// the ping-measurement stream times out and the engine can no longer
    /// trust its own compensation math.
    pub fn clear_speed_modifier(&mut self) {
        self.injected_modifier = None;
        self.recompute_speed();
    }

    pub fn set_reported_speed(&mut self, reported: f32) {
        self.speed.reported = reported;
        self.recompute_speed();
    }

    pub fn speed(&self) -> SpeedState {
        self.speed
    }

    fn recompute_speed(&mut self) {
        self.speed.real = match self.injected_modifier {
            Some(modifier) => self.speed.reported * modifier,
            None => self.speed.reported,
        };
    }
}

fn has_attack_speed_effect(instance: &AbnormalityInstance) -> bool {
    instance.effects.iter().any(|e| e.effect_type == EFFECT_ABNORM_SPEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_then_query_enabled() {
        let mut view = EffectsView::new(false);
        assert!(view.observe_category_packet(10_001, ABNORMALITY_APPLY_TYPE, ABNORMALITY_APPLY_METHOD, 100));
        assert!(view.is_category_enabled(10_001));
    }

    #[test]
    fn remove_clears_for_non_warrior() {
        let mut view = EffectsView::new(false);
        view.observe_category_packet(10_001, ABNORMALITY_APPLY_TYPE, ABNORMALITY_APPLY_METHOD, 100);
        assert!(view.observe_category_packet(10_001, ABNORMALITY_REMOVE_TYPE, ABNORMALITY_REMOVE_METHOD, 200));
        assert!(!view.is_category_enabled(10_001));
    }

    #[test]
    fn warrior_exempt_abnormality_survives_remove_packet() {
        let mut view = EffectsView::new(true);
        view.observe_category_packet(909_745, ABNORMALITY_APPLY_TYPE, ABNORMALITY_APPLY_METHOD, 100);
        assert!(!view.observe_category_packet(909_745, ABNORMALITY_REMOVE_TYPE, ABNORMALITY_REMOVE_METHOD, 200));
        assert!(view.is_category_enabled(909_745));
    }

    #[test]
    fn injected_modifier_multiplies_reported_speed() {
        let mut view = EffectsView::new(false);
        view.set_reported_speed(1.2);
        view.inject_speed_modifier(1.5);
        assert!((view.speed().real - 1.8).abs() < 1e-6);
        view.clear_speed_modifier();
        assert!((view.speed().real - 1.2).abs() < 1e-6);
    }

    fn record_with_apply(ids: Vec<u32>) -> SkillRecord {
        use crate::catalog::{AnimLength, CancelWindows, SkillType};
        use std::collections::{HashMap as StdHashMap, HashSet as StdHashSet};
        SkillRecord {
            skill_type: SkillType::Normal,
            type_id: 1,
            anim_length: AnimLength::Scalar(1000.0),
            should_not_use_length: false,
            cancels: CancelWindows::default(),
            chains: StdHashMap::new(),
            connect_skills: StdHashMap::new(),
            abnormality_redirect: Vec::new(),
            abnormality_redirect_to_me: StdHashSet::new(),
            abnormality_apply: ids,
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
    fn begin_abnormality_feeds_active_begin_times() {
        let mut view = EffectsView::new(false);
        view.begin_abnormality(5000, 123, Vec::new());
        assert_eq!(view.active_begin_times().get(&5000), Some(&123));
    }

    #[test]
    fn end_abnormality_removes_entry_and_reports_whether_it_existed() {
        let mut view = EffectsView::new(false);
        view.begin_abnormality(5000, 123, Vec::new());
        assert!(view.end_abnormality(5000));
        assert!(!view.end_abnormality(5000));
    }

    #[test]
    fn applied_effects_only_folds_abnormalities_the_skill_declares() {
        let mut view = EffectsView::new(false);
        view.begin_abnormality(
            1,
            0,
            vec![AbnormalityEffect { effect_type: EFFECT_STAMINA_COST, method: 0, value: 5.0 }],
        );
        view.begin_abnormality(
            2,
            0,
            vec![AbnormalityEffect { effect_type: EFFECT_STAMINA_COST, method: 0, value: 100.0 }],
        );
        let record = record_with_apply(vec![1]);
        let bundle = view.applied_effects(&record);
        assert_eq!(bundle.stamina, 5.0);
    }

    #[test]
    fn applied_effects_composes_transform_target() {
        let mut view = EffectsView::new(false);
        view.begin_abnormality(
            1,
            0,
            vec![AbnormalityEffect { effect_type: EFFECT_TRANSFORM, method: 0, value: 90131.0 }],
        );
        let record = record_with_apply(vec![1]);
        let bundle = view.applied_effects(&record);
        assert_eq!(bundle.transform, Some(SkillId(90_131)));
    }

    #[test]
    fn ending_the_abnormality_that_injected_attack_speed_clears_the_modifier() {
        let mut view = EffectsView::new(false);
        view.set_reported_speed(1.0);
        view.begin_abnormality(7, 0, vec![AbnormalityEffect { effect_type: EFFECT_ABNORM_SPEED, method: 0, value: 1.3 }]);
        view.inject_speed_modifier(1.3);
        assert!((view.speed().real - 1.3).abs() < 1e-6);
        view.end_abnormality(7);
        assert!((view.speed().real - 1.0).abs() < 1e-6);
    }
}
