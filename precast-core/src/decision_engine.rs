//! Component G - the skill decision engine.
//!
//! This is the heart of the compensation system: given a requested skill
//! cast and the full local state (catalog record, cooldowns, current
//! action, active effects, network conditions), it decides what the client
//! should actually do *right now*, ahead of the server's own answer
//! arriving over the wire. Every branch here exists because the client
//! would otherwise wait out a full round trip before reacting to its own
//! input.
//!
//! The resolution order below follows a fixed sequence of checks: the first
//! one that matches wins, and nothing after it re-examines a case an
//! earlier check already claimed.

use std::collections::HashMap;

use precast_protocol::SkillId;

use crate::action_tracker::ActionState;
use crate::catalog::{Catalog, SkillRecord, SkillType};
use crate::cc_gate::CcDenial;
use crate::effects::SpeedState;

/// The player's class, insofar as the decision engine needs to special-case
/// it. Everything else about class (stat formulas, itemization, ...) is out
/// of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobClass {
    Warrior,
    Lancer,
    Brawler,
    Ninja,
    Berserker,
    Sorcerer,
    Other,
}

/// Why a cast attempt was refused, carrying the server-convention refusal
/// code so the host can forward a denial without inventing its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastRefusal {
    /// Skill type is `nocasting`.
    NoCasting,
    /// Not currently in an action and no fallback applies.
    NoAction,
    /// Requested skill can't be resolved against the current charge state.
    InvalidChargeRelease,
    /// The current skill is `notimeline`; nothing to cancel out of.
    CurrentIsNoTimeline,
    /// Catalog lookup failed entirely.
    Failed,
    NotSupportedForClass,
    CategoryDisabled,
    OnCooldown,
    NoWeapon,
    InsufficientResource,
    InvalidPress,
    SorcererSpecial,
    DefenceNotSucceeded,
    InvalidMovingCharge,
    InSpecialActionNonMovement,
    TypeMismatch,
    CrowdControlled(CcDenial),
    BlockedByConfig,
}

impl CastRefusal {
    /// The server-convention negative refusal code a `canCast` companion
    /// predicate would return for the same denial.
    pub fn code(self) -> i32 {
        match self {
            CastRefusal::NoCasting => -4,
            CastRefusal::NoAction => -1,
            CastRefusal::InvalidChargeRelease => -2,
            CastRefusal::CurrentIsNoTimeline => -6,
            CastRefusal::Failed => -5,
            CastRefusal::CategoryDisabled => -11,
            CastRefusal::OnCooldown => -12,
            CastRefusal::NoWeapon => -13,
            CastRefusal::InsufficientResource => -14,
            CastRefusal::InvalidPress => -15,
            CastRefusal::SorcererSpecial => -16,
            CastRefusal::DefenceNotSucceeded => -17,
            CastRefusal::InvalidMovingCharge => -18,
            CastRefusal::InSpecialActionNonMovement => -7,
            CastRefusal::TypeMismatch => -27,
            CastRefusal::CrowdControlled(denial) => denial.code(),
            // Not part of the server's own refusal-code space; these two
            // are purely local gates (class table / operator config), so
            // they get locally-reserved codes that never collide with the
            // server's vocabulary.
            CastRefusal::NotSupportedForClass => -9001,
            CastRefusal::BlockedByConfig => -9002,
        }
    }
}

/// A redirect captured while walking a skill record's `abnormalityRedirect`
/// table; the decision engine needs the originating abnormality's
/// `beginTime` later to line up a chain's `time` offset against when the
/// abnormality actually started, not when the cast was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedAbnormality {
    pub abnormality_id: u32,
    pub begin_time_ms: u64,
}

/// The decision engine's output: what the local client should do about a
/// cast request, ahead of the server's own answer.
///
/// `time_ms` is the signed offset (ms, relative to "now") at which the
/// faked packet(s) implementing this transition should actually be
/// emitted, computed by `calculate_time`. A `Refused` transition carries no
/// timing information - nothing is emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionDescriptor {
    /// Refuse the cast outright; no local state changes, no packet emitted.
    Refused(CastRefusal),
    /// Begin a brand new action from stage 0.
    Begin { skill_id: SkillId, time_ms: i64, predicted_end: Option<u64> },
    /// Chain into a follow-up skill after the current one's pending window,
    /// or via an abnormality-captured chain.
    Chain { next: SkillId, time_ms: i64, predicted_end: Option<u64>, captured: Option<CapturedAbnormality> },
    /// Cancel during the front window and immediately start the requested
    /// skill (typeId 25 only).
    FrontCancel { next: SkillId, time_ms: i64, predicted_end: Option<u64> },
    /// Cancel during the rear window; `code` distinguishes the two
    /// rear-cancel admission sub-cases the compatibility predicate allows.
    RearCancel { next: SkillId, time_ms: i64, code: i32, predicted_end: Option<u64> },
    /// Play out the current action's defined next-skill transition.
    ImmediateNext { next: SkillId, time_ms: i64, code: i32, predicted_end: Option<u64> },
    /// `connect`-type follow-up that replaces the current skill id with a
    /// higher-level variant of itself.
    ConnectSkill { next: SkillId, time_ms: i64, predicted_end: Option<u64> },
    /// A super-armor/override action that ignores ordinary cancel windows.
    SuperCancel { next: SkillId, time_ms: i64, predicted_end: Option<u64> },
    /// Release a held `movingCharge`, optionally carrying its charged stage
    /// forward into the release skill.
    KeepCharge { next: SkillId, time_ms: i64, carried_stage: Option<u32>, predicted_end: Option<u64> },
    /// `drain`-type skill continuing into its declared `nextSkill` without a
    /// new animation.
    DrainContinuation { next: SkillId, time_ms: i64 },
    /// A `lockon`-type skill waiting on its target-acquisition window, or
    /// chaining into a same-base lockon follow-up.
    LockOn { target_pending: bool, chain: Option<SkillId>, time_ms: i64 },
    /// The current dash's redirect target, chosen on dash start
    /// (`dashRedirect`) or on dash failure (`dashRedirectFail`).
    DashRedirect { next: SkillId, time_ms: i64 },
    /// Warrior/Lancer/Brawler-only cast-during-block admission.
    BlockCast { next: SkillId, time_ms: i64 },
    /// Escape a lockon's own action into a different-base skill.
    LockonEscape { next: SkillId, time_ms: i64 },
    /// Escape a knockdown/airborne state into a movement skill.
    KnockdownEscape { next: SkillId, time_ms: i64 },
    /// Self-cancel on key-up: stop the current action with no new one
    /// starting.
    SelfCancel { time_ms: i64, code: i32 },
    /// The current action's total animation length has already elapsed;
    /// retroactively treat it as over.
    FutureAction { time_ms: i64 },
    /// Grant-only shortcut: an unexpired arrow-chain entry resolves to a
    /// different skill id with no animation restart.
    ArrowGrant { skill_id: SkillId, time_ms: i64 },
    /// No local transition; let the packet through unmodified and wait for
    /// the server's own answer.
    PassThrough,
}

/// The inputs the decision engine needs to resolve one cast request. All
/// fields are borrowed snapshots from the owning session; the engine itself
/// holds no state of its own, and runs once per cast request rather than
/// once per frame.
pub struct DecisionContext<'a> {
    pub requested: SkillId,
    pub action: &'a ActionState,
    pub speed: SpeedState,
    pub now_ms: u64,
    pub jitter_ms: i64,
    pub wiggle_plus80: bool,
    pub on_cooldown: bool,
    pub is_supported: bool,
    pub cc_denial: Option<CcDenial>,
    pub has_resource: bool,
    pub has_weapon: bool,
    pub is_moving: bool,
    pub defence_succeeded: bool,
    pub defence_time_ms: Option<u64>,
    pub config_blocked: bool,
    pub by_grant: bool,
    pub press: bool,
    pub job: JobClass,
    pub knocked_down: bool,
    pub airborne: bool,
    pub feared: bool,
    /// `abnormality id -> beginTime`, currently active on the local player.
    pub active_abnormalities: &'a HashMap<u32, u64>,
    /// `derived skill id -> (original skill id, expiry)` for grant shortcuts.
    pub arrow_grant: Option<(SkillId, u64)>,
    /// Whether an abnormality of type value 334 matching the record's base
    /// id is currently active.
    pub connect_next_active: bool,
    /// Whether an abnormality with (categories overlap, type 239, method 3)
    /// is currently active.
    pub category_override_active: bool,
    /// `effects.getAppliedEffects(requested).transform`, if any - an active
    /// abnormality substituting a fixed alternate skill id for whatever was
    /// requested (step 1 of resolution order).
    pub transform: Option<SkillId>,
}

/// Hardcoded class-specific skill substitutions applied before the catalog
/// is even consulted (§4.G step 1). Currently just the one documented Ninja
/// case; kept as its own function rather than folded into `resolve` so a
/// future addition doesn't have to be threaded through the main resolution
/// sequence.
fn apply_hardcoded_class_rules(requested: SkillId, job: JobClass, active: &HashMap<u32, u64>) -> SkillId {
    const NINJA_PASSIVITY_ABNORMALITY: u32 = 32065;
    const NINJA_SKILL_A: u64 = 90100;
    const NINJA_SKILL_B: u64 = 90130;
    const NINJA_TRANSFORMED: u64 = 90131;

    if job == JobClass::Ninja
        && matches!(requested.0, NINJA_SKILL_A | NINJA_SKILL_B)
        && active.contains_key(&NINJA_PASSIVITY_ABNORMALITY)
    {
        return SkillId(NINJA_TRANSFORMED);
    }
    requested
}

/// Step 1 of resolution order in full: the hardcoded class rule above, then
/// an `appliedEffects.transform` substitution if one is present.
fn pre_transform(ctx: &DecisionContext) -> SkillId {
    let after_class_rule = apply_hardcoded_class_rules(ctx.requested, ctx.job, ctx.active_abnormalities);
    ctx.transform.unwrap_or(after_class_rule)
}

/// Cancel-window predicates, evaluated against elapsed stage time.
pub fn is_in_pending_time(record: &SkillRecord, elapsed_ms: i64) -> bool {
    match (record.cancels.pending_start, record.cancels.pending_end) {
        (Some(start), end) if start >= 0 => elapsed_ms >= start && end.is_none_or(|e| e < 0 || elapsed_ms <= e),
        _ => false,
    }
}

pub fn can_front_cancel(record: &SkillRecord, elapsed_ms: i64) -> bool {
    match record.cancels.front {
        Some(front) if front >= 0 => elapsed_ms >= front,
        _ => false,
    }
}

pub fn can_rear_cancel(record: &SkillRecord, elapsed_ms: i64) -> bool {
    match record.cancels.rear_start {
        Some(start) if start >= 0 => {
            elapsed_ms >= start
                && record.cancels.rear_end.is_none_or(|end| end < 0 || elapsed_ms <= end)
        }
        _ => false,
    }
}

/// Picks whichever anchor (the cancel
/// window's own offset, or the cumulative animation length up to `stage`)
/// is closer to the wiggle-adjusted elapsed time, and converts the gap into
/// a speed-scaled offset the dispatcher should delay (positive) or
/// pre-empt (negative) the faked packet by.
#[allow(clippy::too_many_arguments)]
pub fn calculate_time(
    catalog: &Catalog,
    anchor_ms: i64,
    elapsed_ms: i64,
    speed_real: f32,
    skill_id: SkillId,
    stage: usize,
    use_wiggle: bool,
    jitter_ms: i64,
    wiggle_plus80: bool,
) -> i64 {
    if elapsed_ms <= 0 {
        return 0;
    }
    let wiggle = if use_wiggle {
        if wiggle_plus80 { jitter_ms + 80 } else { jitter_ms }
    } else {
        0
    };
    let speed = if speed_real <= 0.0 { 1.0 } else { speed_real };
    let target = elapsed_ms - wiggle;

    if (anchor_ms - target).abs() < 10 {
        let t = (((elapsed_ms - anchor_ms - wiggle) as f32) / speed).floor() as i64 - 1;
        return t.max(0);
    }

    let anim_length = catalog.prefix_sum_to_stage(skill_id, stage) as i64;
    let (closer, other) = if (anchor_ms - target).abs() <= (anim_length - target).abs() {
        (anchor_ms, anim_length)
    } else {
        (anim_length, anchor_ms)
    };

    let t = (((elapsed_ms - closer - wiggle) as f32) / speed).floor() as i64 - 1;
    if t >= 0 {
        return t;
    }
    let t2 = (((elapsed_ms - other - wiggle) as f32) / speed).floor() as i64 - 1;
    t2.max(0)
}

/// The abnormality redirect loop: repeatedly substitutes the
/// requested skill id for an `abnormalityRedirect` target while the
/// relevant abnormality is active, terminating in at most
/// `|abnormalityRedirect(skill)| + 1` iterations, or delegating recursively
/// once a jump exceeds 10,000 (`SkillId::distance`).
pub fn resolve_abnormality_redirect(
    catalog: &Catalog,
    requested: SkillId,
    active: &HashMap<u32, u64>,
    job: JobClass,
) -> (SkillId, Option<CapturedAbnormality>) {
    const FAR_JUMP_THRESHOLD: u64 = 10_000;

    let Some(record) = catalog.get(requested) else {
        return (requested, None);
    };

    for &(abnormality_id, alt) in &record.abnormality_redirect {
        let Some(&begin_time_ms) = active.get(&abnormality_id) else {
            continue;
        };
        if catalog.get(alt).is_none() {
            continue;
        }

        if requested.distance(alt) > FAR_JUMP_THRESHOLD {
            // Delegate recursively with the new id rather than looping here.
            let (final_id, inner_captured) = resolve_abnormality_redirect(catalog, alt, active, job);
            let captured = inner_captured.or(Some(CapturedAbnormality { abnormality_id, begin_time_ms }));
            return (final_id, captured);
        }

        let mut captured = Some(CapturedAbnormality { abnormality_id, begin_time_ms });
        if matches!(job, JobClass::Ninja | JobClass::Berserker) {
            if let Some(alt_record) = catalog.get(alt) {
                if alt_record.type_id == 28 {
                    captured = None;
                }
            }
        }

        // Continue walking from the new id, but never re-capture an
        // abnormality once one has already been captured further up the chain.
        let (final_id, inner_captured) = resolve_abnormality_redirect(catalog, alt, active, job);
        return (final_id, inner_captured.or(captured));
    }

    (requested, None)
}

/// The `canCast` companion predicate: everything that can refuse a cast
/// before the decision engine even considers what kind of transition to
/// produce. Ordered cheapest/most-decisive checks first.
pub fn can_cast(ctx: &DecisionContext, record: &SkillRecord) -> Result<(), CastRefusal> {
    if ctx.config_blocked {
        return Err(CastRefusal::BlockedByConfig);
    }
    if !ctx.is_supported {
        return Err(CastRefusal::NotSupportedForClass);
    }
    if record.skill_type == SkillType::NoCasting {
        return Err(CastRefusal::NoCasting);
    }
    if let Some(denial) = ctx.cc_denial {
        return Err(CastRefusal::CrowdControlled(denial));
    }
    if ctx.action.in_special_action && record.type_id != 27 {
        return Err(CastRefusal::InSpecialActionNonMovement);
    }
    if ctx.on_cooldown {
        return Err(CastRefusal::OnCooldown);
    }
    if !ctx.has_resource {
        return Err(CastRefusal::InsufficientResource);
    }
    if !ctx.has_weapon && !record.no_need_weapon {
        return Err(CastRefusal::NoWeapon);
    }
    if record.hold_if_not_moving && !ctx.is_moving {
        return Err(CastRefusal::InvalidMovingCharge);
    }
    if record.only_after_defence_success && !ctx.defence_succeeded {
        return Err(CastRefusal::DefenceNotSucceeded);
    }
    if ctx.job == JobClass::Sorcerer && record.skill_type == SkillType::NoTimeline && !ctx.action.in_action {
        return Err(CastRefusal::SorcererSpecial);
    }
    Ok(())
}

fn elapsed_stage_ms(action: &ActionState, now_ms: u64, speed_real: f32, jitter_ms: i64, wiggle_plus80: bool) -> i64 {
    let wiggle = if wiggle_plus80 { jitter_ms + 80 } else { jitter_ms };
    let raw = now_ms.saturating_sub(action.started_at) as f32;
    (raw * speed_real) as i64 + wiggle
}

fn predicted_end(catalog: &Catalog, skill_id: SkillId, stage: usize, speed: &SpeedState, now_ms: u64, time_ms: i64) -> Option<u64> {
    catalog
        .anim_length(skill_id, stage, speed, 0.0)
        .map(|len| (now_ms as i64 + time_ms + len as i64).max(0) as u64)
}

/// Resolves one cast request into a `TransitionDescriptor`.
///
/// This runs as a fixed, ordered sequence of checks: the first one that
/// applies wins outright, and nothing after it is consulted for this call.
///
/// 1. Pre-transform: hardcoded class rules, then an `appliedEffects.transform`
///    substitution, ahead of anything else.
/// 1b. The abnormality redirect loop runs next; the rest of resolution
///    proceeds against the redirected id (and any captured abnormality).
/// 2. Catalog lookup failure bails out with `Refused(Failed)`.
/// 3. The arrow-grant shortcut, for a grant-issued cast with a live entry.
/// 4. `canCast` refusals: crowd control, cooldown, resource, support,
///    config gating, special-action state, Sorcerer-only restrictions.
/// 5. Not currently in an action: a kept-charge resume, or a plain `Begin`.
/// 6. `movingCharge` keep/release handling.
/// 7. The `onlyAfterDefenceSuccess` chain, with its block-race check.
/// 8. Front cancel on typeId 25, self-cancel on typeId 41 at key-up,
///    the pending-type-1 immediate shortcuts.
/// 9. Chain table / connect-skill / abnormality-captured chain, self-cancel
///    on typeId 3/46 at key-up, drain continuation, lockon chain, super.
/// 10. The remaining pending-type immediate combinations, both dash
///     redirects, rear cancel, block-cast, lockon escape, knockdown escape.
/// 11. Future-action retroactive close-out, once the current action's full
///     length has already elapsed.
/// 12. `PassThrough`, the default when nothing above matched.
pub fn resolve(catalog: &Catalog, ctx: &DecisionContext) -> TransitionDescriptor {
    let pre_transformed = pre_transform(ctx);
    let (mut redirected_id, captured) = resolve_abnormality_redirect(catalog, pre_transformed, ctx.active_abnormalities, ctx.job);

    let Some(mut record) = catalog.get(redirected_id) else {
        catalog.log_missing_once(redirected_id);
        return TransitionDescriptor::Refused(CastRefusal::Failed);
    };

    // connect-next - an active abnormality (type value 334) matching
    // the record's base id switches the request to its declared follow-up.
    if ctx.connect_next_active {
        if let Some(next) = record.connect_next_skill {
            if let Some(next_record) = catalog.get(next) {
                redirected_id = next;
                record = next_record;
            }
        }
    }

    // category override - an active abnormality (categories
    // overlap, type 239, method 3) forces `sub = 30` and a re-lookup.
    if ctx.category_override_active {
        let overridden = SkillId::from_triple(redirected_id.base(), redirected_id.level(), 30);
        if let Some(overridden_record) = catalog.get(overridden) {
            redirected_id = overridden;
            record = overridden_record;
        }
    }

    // arrow-grant shortcut. Only applies to a grant-issued cast
    // (not a manual key-press) and only while the entry hasn't expired.
    if ctx.by_grant {
        if let Some((arrow_skill, expires_at)) = ctx.arrow_grant {
            let already_casting_it = ctx.action.in_action && ctx.action.skill_id == Some(arrow_skill);
            if ctx.now_ms < expires_at && !already_casting_it {
                return TransitionDescriptor::ArrowGrant {
                    skill_id: arrow_skill,
                    time_ms: ctx.jitter_ms - 1,
                };
            }
        }
    }

    if let Err(refusal) = can_cast(ctx, record) {
        return TransitionDescriptor::Refused(refusal);
    }

    if record.skill_type == SkillType::Drain && ctx.action.skill_id == Some(redirected_id) {
        if let Some(next) = record.next_skill {
            return TransitionDescriptor::DrainContinuation { next, time_ms: ctx.jitter_ms - 1 };
        }
    }

    if record.skill_type == SkillType::Lockon {
        if ctx.action.in_action {
            if let Some(current) = ctx.action.skill_id.and_then(|id| catalog.get(id)) {
                if current.lockon && current.type_id == 36 && current.categories.first() == record.categories.first() {
                    return TransitionDescriptor::LockOn {
                        target_pending: false,
                        chain: Some(redirected_id),
                        time_ms: ctx.jitter_ms - 1,
                    };
                }
            }
        }
        return TransitionDescriptor::LockOn {
            target_pending: !ctx.action.in_action,
            chain: None,
            time_ms: ctx.jitter_ms - 1,
        };
    }

    // `notimeline` shortcut.
    if record.skill_type == SkillType::NoTimeline {
        return TransitionDescriptor::Begin {
            skill_id: redirected_id,
            time_ms: ctx.jitter_ms,
            predicted_end: None,
        };
    }

    if !ctx.action.in_action {
        // a kept moving-charge stage resumes into a new
        // `movingCharge` request without restarting the animation.
        if let Some(stage) = ctx.action.kept_moving_charge {
            if record.skill_type == SkillType::MovingCharge {
                return TransitionDescriptor::KeepCharge {
                    next: redirected_id,
                    time_ms: 0,
                    carried_stage: Some(stage),
                    predicted_end: predicted_end(catalog, redirected_id, stage as usize, &ctx.speed, ctx.now_ms, 0),
                };
            }
        }
        let end = predicted_end(catalog, redirected_id, 0, &ctx.speed, ctx.now_ms, 0);
        return TransitionDescriptor::Begin {
            skill_id: redirected_id,
            time_ms: 0,
            predicted_end: end,
        };
    }

    let elapsed = elapsed_stage_ms(ctx.action, ctx.now_ms, ctx.speed.real, ctx.jitter_ms, ctx.wiggle_plus80);
    let Some(current) = ctx.action.skill_id.and_then(|id| catalog.get(id)) else {
        return TransitionDescriptor::PassThrough;
    };

    // keep-charge - the in-progress action is itself a
    // `movingCharge` and the new request wants to keep charging it further.
    if record.keep_moving_charge && current.skill_type == SkillType::MovingCharge {
        return TransitionDescriptor::KeepCharge {
            next: redirected_id,
            time_ms: ctx.jitter_ms - 1,
            carried_stage: None,
            predicted_end: None,
        };
    }

    // releasing a moving charge on key-up resolves to whatever
    // skill that stage's `(duration, next-skill)` pair names.
    if current.skill_type == SkillType::MovingCharge && !ctx.press {
        if let crate::catalog::AnimLength::MovingCharge(stages) = &current.anim_length {
            if let Some(entry) = stages.get(ctx.action.stage as usize) {
                let stage_start = catalog.prefix_sum_to_stage(ctx.action.skill_id.unwrap(), ctx.action.stage as usize) as i64;
                let stage_end = stage_start + entry.duration_ms as i64;
                let time_ms = if (elapsed - stage_start).abs() <= 30 {
                    0
                } else if (elapsed - stage_end).abs() <= 30 {
                    (stage_end - elapsed).max(0)
                } else {
                    calculate_time(catalog, stage_start, elapsed, ctx.speed.real, ctx.action.skill_id.unwrap(), ctx.action.stage as usize, true, ctx.jitter_ms, ctx.wiggle_plus80)
                };
                return TransitionDescriptor::KeepCharge {
                    next: entry.next_skill,
                    time_ms,
                    carried_stage: Some(ctx.action.stage),
                    predicted_end: None,
                };
            }
        }
    }

    // `onlyAfterDefenceSuccess` - a chain gated on a recent
    // successful block, with a race check against a newer server stage.
    if record.only_after_defence_success {
        if let Some(block_time) = ctx.defence_time_ms {
            if ctx.action.server_stage as u64 > block_time {
                return TransitionDescriptor::Refused(CastRefusal::DefenceNotSucceeded);
            }
            let time_ms = (block_time as i64) - (ctx.action.stage as i64) - 1;
            return TransitionDescriptor::Chain {
                next: redirected_id,
                time_ms,
                predicted_end: None,
                captured: None,
            };
        }
    }

    let in_pending = is_in_pending_time(current, elapsed);

    // front cancel, typeId 25 only.
    if current.type_id == 25 && can_front_cancel(current, elapsed) {
        let time_ms = calculate_time(
            catalog,
            current.cancels.front.unwrap_or(0),
            elapsed,
            ctx.speed.real,
            ctx.action.skill_id.unwrap(),
            ctx.action.stage as usize,
            true,
            ctx.jitter_ms,
            ctx.wiggle_plus80,
        );
        return TransitionDescriptor::FrontCancel {
            next: redirected_id,
            time_ms,
            predicted_end: None,
        };
    }

    // self-cancel on typeId 41, key-up.
    if current.type_id == 41 && !ctx.press {
        return TransitionDescriptor::SelfCancel { time_ms: ctx.jitter_ms - 1, code: 51 };
    }

    const IMMEDIATE_TYPE_IDS: [u32; 8] = [6, 9, 22, 24, 29, 38, 41, 42];
    // immediate pending-type-1 shortcut for a fixed new-skill
    // typeId set, only while no abnormality redirect was captured.
    if IMMEDIATE_TYPE_IDS.contains(&record.type_id) && record.pending_type == 1 && in_pending && captured.is_none() {
        return TransitionDescriptor::ImmediateNext { next: redirected_id, time_ms: 0, code: 1, predicted_end: None };
    }
    // current typeId 31 + pendingType 1.
    if current.type_id == 31 && record.pending_type == 1 {
        return TransitionDescriptor::ImmediateNext { next: redirected_id, time_ms: 0, code: 3, predicted_end: None };
    }

    // `connect`-type current skill: a `connectSkills` hit replaces the
    // current skill id with the leveled-up variant it names, rather than
    // just chaining into the raw requested id.
    if current.skill_type == SkillType::Connect {
        let key = (redirected_id.base(), redirected_id.sub());
        if let Some(&level) = current.connect_skills.get(&key) {
            let next = SkillId::from_triple(redirected_id.base(), level, redirected_id.sub());
            let end = predicted_end(catalog, next, 0, &ctx.speed, ctx.now_ms, 0);
            return TransitionDescriptor::ConnectSkill { next, time_ms: 0, predicted_end: end };
        }
    }

    // chain table / connect-skills / abnormality-captured chain.
    let chain_available = current
        .chains
        .get(&redirected_id.base())
        .is_some_and(|subs| subs.contains(&redirected_id.sub()));
    if chain_available {
        let mut time_ms = calculate_time(
            catalog,
            current.cancels.pending_start.unwrap_or(0),
            elapsed,
            ctx.speed.real,
            ctx.action.skill_id.unwrap(),
            ctx.action.stage as usize,
            true,
            ctx.jitter_ms,
            ctx.wiggle_plus80,
        );
        if let Some(cap) = captured {
            time_ms = ctx.now_ms as i64 - cap.begin_time_ms as i64;
            if record.abnormality_redirect_to_me.contains(&cap.abnormality_id) {
                time_ms = time_ms.max(0);
            }
        }
        return TransitionDescriptor::Chain {
            next: redirected_id,
            time_ms,
            predicted_end: None,
            captured,
        };
    }

    // self-cancel on typeId 3/46, key-up.
    if matches!(current.type_id, 3 | 46) && !ctx.press {
        let code = if current.type_id == 46 { 51 } else { 10 };
        return TransitionDescriptor::SelfCancel { time_ms: ctx.jitter_ms - 1, code };
    }

    // lockon chain, same base.
    if current.lockon && redirected_id.base() == ctx.action.skill_id.unwrap().base() {
        return TransitionDescriptor::LockonEscape { next: redirected_id, time_ms: ctx.jitter_ms - 1 };
    }

    // super (pendingType 3).
    if record.pending_type == 3 {
        return TransitionDescriptor::SuperCancel { next: redirected_id, time_ms: ctx.jitter_ms - 1, predicted_end: None };
    }

    // typeId 25 + press + pendingType 1.
    if current.type_id == 25 && ctx.press && record.pending_type == 1 {
        return TransitionDescriptor::ImmediateNext { next: redirected_id, time_ms: 0, code: 2, predicted_end: None };
    }
    // typeId 31 + pendingType 1 (new-skill side).
    if record.type_id == 31 && record.pending_type == 1 {
        return TransitionDescriptor::ImmediateNext { next: redirected_id, time_ms: 0, code: 4, predicted_end: None };
    }
    // typeId 30 current, pendingType 0, rear-cancel open.
    if current.type_id == 30 && current.pending_type == 0 && can_rear_cancel(current, elapsed) {
        return TransitionDescriptor::ImmediateNext { next: redirected_id, time_ms: 0, code: 5, predicted_end: None };
    }
    // typeId 30 current + pendingType 1 new.
    if current.type_id == 30 && record.pending_type == 1 {
        return TransitionDescriptor::ImmediateNext { next: redirected_id, time_ms: 0, code: 6, predicted_end: None };
    }

    // dash redirect, chosen as soon as the requested skill matches
    // the dash's declared redirect target, ahead of the rear-cancel check.
    if current.type_id == 29 {
        if let Some(target) = current.dash_redirect {
            if redirected_id == target {
                return TransitionDescriptor::DashRedirect { next: target, time_ms: -1 };
            }
        }
    }

    // rear cancel, under the documented typeId exclusions.
    const REAR_EXCLUDED_NEW_TYPE_IDS: [u32; 2] = [9, 28];
    const REAR_EXCLUDED_CURRENT_TYPE_IDS: [u32; 3] = [25, 30, 31];
    let lancer_exception = current.type_id == 26 || redirected_id.base() == 2;
    let rear_compatible = !REAR_EXCLUDED_NEW_TYPE_IDS.contains(&record.type_id)
        && (!REAR_EXCLUDED_CURRENT_TYPE_IDS.contains(&current.type_id) || (ctx.job == JobClass::Lancer && lancer_exception));
    if record.pending_type == 2 && rear_compatible && can_rear_cancel(current, elapsed) {
        let dash_concurrent = current.type_id == 29 && current.dash_redirect.is_some();
        let time_ms = if dash_concurrent {
            -1
        } else {
            calculate_time(
                catalog,
                current.cancels.rear_start.unwrap_or(0),
                elapsed,
                ctx.speed.real,
                ctx.action.skill_id.unwrap(),
                ctx.action.stage as usize,
                true,
                ctx.jitter_ms,
                ctx.wiggle_plus80,
            )
        };
        let code = if in_pending { 1 } else { 2 };
        return TransitionDescriptor::RearCancel { next: redirected_id, time_ms, code, predicted_end: None };
    }

    // block-cast, three melee jobs only.
    if matches!(ctx.job, JobClass::Warrior | JobClass::Lancer | JobClass::Brawler)
        && record.can_cast_during_block
        && matches!(current.type_id, 3 | 41 | 46)
        && can_rear_cancel(current, elapsed)
    {
        let time_ms = calculate_time(
            catalog,
            current.cancels.rear_start.unwrap_or(0),
            elapsed,
            ctx.speed.real,
            ctx.action.skill_id.unwrap(),
            ctx.action.stage as usize,
            true,
            ctx.jitter_ms,
            ctx.wiggle_plus80,
        );
        return TransitionDescriptor::BlockCast { next: redirected_id, time_ms };
    }

    // dash redirect, late (failure path).
    if current.type_id == 29 {
        if let Some(target) = current.dash_redirect_fail {
            if redirected_id == target {
                return TransitionDescriptor::DashRedirect { next: target, time_ms: -1 };
            }
        }
    }

    // lockon escape - current has lockon, typeId 30, different base.
    if current.lockon && current.type_id == 30 && redirected_id.base() != ctx.action.skill_id.unwrap().base() {
        return TransitionDescriptor::LockonEscape { next: redirected_id, time_ms: ctx.jitter_ms - 1 };
    }

    // knockdown escape - new skill is movement (typeId 27).
    if record.type_id == 27 && (ctx.knocked_down || ctx.airborne) {
        return TransitionDescriptor::KnockdownEscape { next: redirected_id, time_ms: ctx.jitter_ms - 1 };
    }

    // the current action's full length has already elapsed -
    // retroactively close it out with a negative offset.
    if !current.should_not_use_length && current.type_id != 29 {
        let total = catalog.prefix_sum_to_stage(ctx.action.skill_id.unwrap(), current.stage_count());
        if elapsed as f32 >= total {
            let t = calculate_time(
                catalog,
                total as i64,
                elapsed,
                ctx.speed.real,
                ctx.action.skill_id.unwrap(),
                current.stage_count(),
                true,
                ctx.jitter_ms,
                ctx.wiggle_plus80,
            ) - 5;
            if t < 0 {
                return TransitionDescriptor::FutureAction { time_ms: t };
            }
        }
    }

    TransitionDescriptor::PassThrough
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AnimLength, CancelWindows};
    use std::collections::{HashMap as StdHashMap, HashSet};

    fn base_record(skill_type: SkillType) -> SkillRecord {
        SkillRecord {
            skill_type,
            type_id: 1,
            anim_length: AnimLength::Scalar(1000.0),
            should_not_use_length: false,
            cancels: CancelWindows::default(),
            chains: StdHashMap::new(),
            connect_skills: StdHashMap::new(),
            abnormality_redirect: Vec::new(),
            abnormality_redirect_to_me: HashSet::new(),
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

    fn empty_abnormalities() -> HashMap<u32, u64> {
        HashMap::new()
    }

    fn base_ctx<'a>(requested: SkillId, action: &'a ActionState, abnormalities: &'a HashMap<u32, u64>) -> DecisionContext<'a> {
        DecisionContext {
            requested,
            action,
            speed: SpeedState::default(),
            now_ms: 0,
            jitter_ms: 11,
            wiggle_plus80: false,
            on_cooldown: false,
            is_supported: true,
            cc_denial: None,
            has_resource: true,
            has_weapon: true,
            is_moving: true,
            defence_succeeded: true,
            defence_time_ms: None,
            config_blocked: false,
            by_grant: false,
            press: true,
            job: JobClass::Other,
            knocked_down: false,
            airborne: false,
            feared: false,
            active_abnormalities: abnormalities,
            arrow_grant: None,
            connect_next_active: false,
            category_override_active: false,
            transform: None,
        }
    }

    #[test]
    fn can_cast_refuses_on_cooldown() {
        let record = base_record(SkillType::Normal);
        let action = ActionState::default();
        let abns = empty_abnormalities();
        let mut ctx = base_ctx(SkillId(1), &action, &abns);
        ctx.on_cooldown = true;
        assert_eq!(can_cast(&ctx, &record), Err(CastRefusal::OnCooldown));
    }

    #[test]
    fn refusal_codes_match_server_convention() {
        assert_eq!(CastRefusal::NoCasting.code(), -4);
        assert_eq!(CastRefusal::NoAction.code(), -1);
        assert_eq!(CastRefusal::OnCooldown.code(), -12);
        assert_eq!(CastRefusal::InsufficientResource.code(), -14);
        assert_eq!(CastRefusal::TypeMismatch.code(), -27);
    }

    #[test]
    fn begin_when_not_in_action() {
        let mut records = StdHashMap::new();
        let requested = SkillId(10_000);
        records.insert(requested, base_record(SkillType::Normal));
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());
        let action = ActionState::default();
        let abns = empty_abnormalities();
        let ctx = base_ctx(requested, &action, &abns);
        match resolve(&catalog, &ctx) {
            TransitionDescriptor::Begin { skill_id, .. } => assert_eq!(skill_id, requested),
            other => panic!("expected Begin, got {other:?}"),
        }
    }

    #[test]
    fn chain_table_match_produces_chain_transition() {
        let mut records = StdHashMap::new();
        let current_id = SkillId::from_triple(1, 0, 0);
        let next_id = SkillId::from_triple(2, 0, 0);
        let mut current_record = base_record(SkillType::Normal);
        current_record.chains.entry(2).or_default().insert(0);
        current_record.cancels.pending_start = Some(300);
        current_record.cancels.pending_end = Some(800);
        records.insert(current_id, current_record);
        records.insert(next_id, base_record(SkillType::Normal));
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let mut action = ActionState::default();
        action.in_action = true;
        action.skill_id = Some(current_id);
        action.started_at = 0;

        let abns = empty_abnormalities();
        let mut ctx = base_ctx(next_id, &action, &abns);
        ctx.now_ms = 500;
        match resolve(&catalog, &ctx) {
            TransitionDescriptor::Chain { next, time_ms, .. } => {
                assert_eq!(next, next_id);
                // elapsed = 500 + jitter(11); anchor = pending_start(300)
                // t = floor((511 - 300 - 11)/1) - 1 = 199
                assert_eq!(time_ms, 199);
            }
            other => panic!("expected Chain, got {other:?}"),
        }
    }

    #[test]
    fn rear_cancel_window_applies_with_pending_type_2() {
        let mut records = StdHashMap::new();
        let current_id = SkillId::from_triple(1, 0, 0);
        let next_id = SkillId::from_triple(9, 0, 0);
        let mut current_record = base_record(SkillType::Normal);
        current_record.type_id = 11;
        current_record.cancels.rear_start = Some(300);
        current_record.cancels.rear_end = Some(900);
        records.insert(current_id, current_record);
        let mut next_record = base_record(SkillType::Normal);
        next_record.type_id = 6;
        next_record.pending_type = 2;
        records.insert(next_id, next_record);
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let mut action = ActionState::default();
        action.in_action = true;
        action.skill_id = Some(current_id);
        action.started_at = 0;

        let abns = empty_abnormalities();
        let mut ctx = base_ctx(next_id, &action, &abns);
        ctx.now_ms = 500;
        match resolve(&catalog, &ctx) {
            TransitionDescriptor::RearCancel { next, .. } => assert_eq!(next, next_id),
            other => panic!("expected RearCancel, got {other:?}"),
        }
    }

    #[test]
    fn no_matching_window_falls_through() {
        let mut records = StdHashMap::new();
        let current_id = SkillId::from_triple(1, 0, 0);
        let next_id = SkillId::from_triple(9, 0, 0);
        records.insert(current_id, base_record(SkillType::Normal));
        records.insert(next_id, base_record(SkillType::Normal));
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let mut action = ActionState::default();
        action.in_action = true;
        action.skill_id = Some(current_id);
        action.started_at = 0;

        let abns = empty_abnormalities();
        let mut ctx = base_ctx(next_id, &action, &abns);
        ctx.now_ms = 500;
        assert_eq!(resolve(&catalog, &ctx), TransitionDescriptor::PassThrough);
    }

    #[test]
    fn abnormality_redirect_substitutes_skill_and_captures_begin_time() {
        let mut records = StdHashMap::new();
        let original = SkillId::from_triple(90, 1, 0);
        let alt = SkillId::from_triple(91, 1, 0);
        let mut original_record = base_record(SkillType::Normal);
        original_record.abnormality_redirect.push((5000, alt));
        records.insert(original, original_record);
        records.insert(alt, base_record(SkillType::Normal));
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let mut abns = HashMap::new();
        abns.insert(5000, 120u64);
        let (resolved, captured) = resolve_abnormality_redirect(&catalog, original, &abns, JobClass::Other);
        assert_eq!(resolved, alt);
        assert_eq!(captured.unwrap().begin_time_ms, 120);
    }

    #[test]
    fn far_redirect_jump_delegates_recursively() {
        let mut records = StdHashMap::new();
        let original = SkillId(1);
        let far = SkillId(20_000);
        let mut original_record = base_record(SkillType::Normal);
        original_record.abnormality_redirect.push((7, far));
        records.insert(original, original_record);
        records.insert(far, base_record(SkillType::Normal));
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let mut abns = HashMap::new();
        abns.insert(7, 50u64);
        let (resolved, captured) = resolve_abnormality_redirect(&catalog, original, &abns, JobClass::Other);
        assert_eq!(resolved, far);
        assert_eq!(captured.unwrap().abnormality_id, 7);
    }

    #[test]
    fn ninja_typeid_28_redirect_discards_capture() {
        let mut records = StdHashMap::new();
        let original = SkillId::from_triple(90, 1, 0);
        let alt = SkillId::from_triple(91, 1, 0);
        let mut original_record = base_record(SkillType::Normal);
        original_record.abnormality_redirect.push((5000, alt));
        records.insert(original, original_record);
        let mut alt_record = base_record(SkillType::Normal);
        alt_record.type_id = 28;
        records.insert(alt, alt_record);
        let catalog = Catalog::new("ninja".to_string(), records, StdHashMap::new());

        let mut abns = HashMap::new();
        abns.insert(5000, 120u64);
        let (resolved, captured) = resolve_abnormality_redirect(&catalog, original, &abns, JobClass::Ninja);
        assert_eq!(resolved, alt);
        assert!(captured.is_none());
    }

    #[test]
    fn calculate_time_returns_zero_for_nonpositive_elapsed() {
        let catalog = Catalog::new("warrior".to_string(), StdHashMap::new(), StdHashMap::new());
        assert_eq!(calculate_time(&catalog, 100, 0, 1.0, SkillId(1), 0, true, 11, false), 0);
        assert_eq!(calculate_time(&catalog, 100, -5, 1.0, SkillId(1), 0, true, 11, false), 0);
    }

    #[test]
    fn calculate_time_near_anchor_uses_direct_formula() {
        let catalog = Catalog::new("warrior".to_string(), StdHashMap::new(), StdHashMap::new());
        // elapsed - wiggle = 500 - 11 = 489, anchor = 490 -> within 10
        let t = calculate_time(&catalog, 490, 500, 1.0, SkillId(1), 0, true, 11, false);
        // floor((500 - 490 - 11)/1) - 1 = floor(-1) - 1 = -1 -1 = -2 -> clamped to 0
        assert_eq!(t, 0);
    }

    #[test]
    fn front_cancel_matches_type_id_25_only() {
        let mut records = StdHashMap::new();
        let current_id = SkillId::from_triple(1, 0, 0);
        let next_id = SkillId::from_triple(9, 0, 0);
        let mut current_record = base_record(SkillType::Normal);
        current_record.type_id = 25;
        current_record.cancels.front = Some(100);
        records.insert(current_id, current_record);
        records.insert(next_id, base_record(SkillType::Normal));
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let mut action = ActionState::default();
        action.in_action = true;
        action.skill_id = Some(current_id);
        action.started_at = 0;

        let abns = empty_abnormalities();
        let mut ctx = base_ctx(next_id, &action, &abns);
        ctx.now_ms = 500;
        match resolve(&catalog, &ctx) {
            TransitionDescriptor::FrontCancel { next, .. } => assert_eq!(next, next_id),
            other => panic!("expected FrontCancel, got {other:?}"),
        }
    }

    #[test]
    fn drain_continuation_returns_declared_next_skill() {
        let mut records = StdHashMap::new();
        let current_id = SkillId::from_triple(1, 0, 0);
        let next_id = SkillId::from_triple(1, 1, 0);
        let mut current_record = base_record(SkillType::Drain);
        current_record.next_skill = Some(next_id);
        records.insert(current_id, current_record);
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let mut action = ActionState::default();
        action.in_action = true;
        action.skill_id = Some(current_id);
        action.started_at = 0;

        let abns = empty_abnormalities();
        let ctx = base_ctx(current_id, &action, &abns);
        match resolve(&catalog, &ctx) {
            TransitionDescriptor::DrainContinuation { next, .. } => assert_eq!(next, next_id),
            other => panic!("expected DrainContinuation, got {other:?}"),
        }
    }

    #[test]
    fn knockdown_escape_allows_movement_skill_through() {
        let mut records = StdHashMap::new();
        let current_id = SkillId::from_triple(1, 0, 0);
        let next_id = SkillId::from_triple(9, 0, 0);
        records.insert(current_id, base_record(SkillType::Normal));
        let mut next_record = base_record(SkillType::Normal);
        next_record.type_id = 27;
        records.insert(next_id, next_record);
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let mut action = ActionState::default();
        action.in_action = true;
        action.skill_id = Some(current_id);
        action.started_at = 0;

        let abns = empty_abnormalities();
        let mut ctx = base_ctx(next_id, &action, &abns);
        ctx.now_ms = 500;
        ctx.knocked_down = true;
        match resolve(&catalog, &ctx) {
            TransitionDescriptor::KnockdownEscape { next, .. } => assert_eq!(next, next_id),
            other => panic!("expected KnockdownEscape, got {other:?}"),
        }
    }

    #[test]
    fn connect_type_current_skill_levels_up_via_connect_skills_map() {
        let mut records = StdHashMap::new();
        let current_id = SkillId::from_triple(1, 0, 0);
        let requested = SkillId::from_triple(2, 0, 5);
        let leveled_next = SkillId::from_triple(2, 3, 5);
        let mut current_record = base_record(SkillType::Connect);
        current_record.connect_skills.insert((2, 5), 3);
        records.insert(current_id, current_record);
        records.insert(leveled_next, base_record(SkillType::Normal));
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let mut action = ActionState::default();
        action.in_action = true;
        action.skill_id = Some(current_id);
        action.started_at = 0;

        let abns = empty_abnormalities();
        let mut ctx = base_ctx(requested, &action, &abns);
        ctx.now_ms = 100;
        match resolve(&catalog, &ctx) {
            TransitionDescriptor::ConnectSkill { next, .. } => assert_eq!(next, leveled_next),
            other => panic!("expected ConnectSkill, got {other:?}"),
        }
    }

    #[test]
    fn connect_next_active_switches_request_before_resolution() {
        let mut records = StdHashMap::new();
        let original = SkillId::from_triple(50, 0, 0);
        let follow_up = SkillId::from_triple(51, 0, 0);
        let mut original_record = base_record(SkillType::Normal);
        original_record.connect_next_skill = Some(follow_up);
        records.insert(original, original_record);
        records.insert(follow_up, base_record(SkillType::Normal));
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let action = ActionState::default();
        let abns = empty_abnormalities();
        let mut ctx = base_ctx(original, &action, &abns);
        ctx.connect_next_active = true;
        match resolve(&catalog, &ctx) {
            TransitionDescriptor::Begin { skill_id, .. } => assert_eq!(skill_id, follow_up),
            other => panic!("expected Begin on follow_up, got {other:?}"),
        }
    }

    #[test]
    fn category_override_redirects_to_sub_30_variant() {
        let mut records = StdHashMap::new();
        let original = SkillId::from_triple(60, 2, 0);
        let overridden = SkillId::from_triple(60, 2, 30);
        records.insert(original, base_record(SkillType::Normal));
        records.insert(overridden, base_record(SkillType::Normal));
        let catalog = Catalog::new("warrior".to_string(), records, StdHashMap::new());

        let action = ActionState::default();
        let abns = empty_abnormalities();
        let mut ctx = base_ctx(original, &action, &abns);
        ctx.category_override_active = true;
        match resolve(&catalog, &ctx) {
            TransitionDescriptor::Begin { skill_id, .. } => assert_eq!(skill_id, overridden),
            other => panic!("expected Begin on overridden sub=30 variant, got {other:?}"),
        }
    }
}
