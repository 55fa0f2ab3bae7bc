//! Component A - the Skill Catalog: a read-only lookup of per-skill metadata
//! loaded once per character class and cleared on logout/class change.

use std::collections::{HashMap, HashSet, VecDeque};

use precast_protocol::SkillId;
use serde::{Deserialize, Serialize};

use crate::effects::SpeedState;

/// One of the fixed skill-behavior families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkillType {
    Normal,
    Dash,
    CatchBack,
    ShortTel,
    MovingCharge,
    MovingSkill,
    ShootingMovingSkill,
    MovingDefence,
    Connect,
    Drain,
    Projectile,
    NoTimeline,
    NoCasting,
    Lockon,
}

/// One stage of a `movingCharge` skill: how long the stage lasts at
/// `speed.real == 1.0`, and which skill id releasing the charge at this
/// stage resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingChargeStage {
    pub duration_ms: f32,
    pub next_skill: SkillId,
}

/// The per-stage animation length of a skill, shaped according to the
/// skill's [`SkillType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnimLength {
    /// A single scalar length shared by every stage.
    Scalar(f32),
    /// One length per stage.
    Sequence(Vec<f32>),
    /// `movingCharge` only: per-stage (duration, release target) pairs.
    MovingCharge(Vec<MovingChargeStage>),
}

/// A sentinel-aware ms offset: `None` stands for the source's "none" marker.
pub type CancelOffset = Option<i64>;

/// The cancel windows declared by a skill record's `cancels` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelWindows {
    pub front: CancelOffset,
    pub pending_start: CancelOffset,
    pub pending_end: CancelOffset,
    pub rear_start: CancelOffset,
    pub rear_end: CancelOffset,
}

/// Per-stage movement segment, as declared by a skill record's `animSeq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimSegment {
    pub distance: f32,
    pub direction: f32,
}

/// Immutable per-skill metadata as loaded from a class table file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillRecord {
    pub skill_type: SkillType,
    pub type_id: u32,
    pub anim_length: AnimLength,
    #[serde(default)]
    pub should_not_use_length: bool,
    #[serde(default)]
    pub cancels: CancelWindows,
    /// follow-up base -> acceptable subs
    #[serde(default)]
    pub chains: HashMap<u32, HashSet<u32>>,
    /// "base-sub" -> level, for `connect`-type skills.
    #[serde(default)]
    pub connect_skills: HashMap<(u32, u32), u32>,
    /// ordered (abnormality id -> alternate skill)
    #[serde(default)]
    pub abnormality_redirect: Vec<(u32, SkillId)>,
    #[serde(default)]
    pub abnormality_redirect_to_me: HashSet<u32>,
    #[serde(default)]
    pub abnormality_apply: Vec<u32>,
    #[serde(default)]
    pub abnormality_consume_stage: Vec<u32>,
    #[serde(default)]
    pub abnormality_consume_end: Vec<u32>,
    #[serde(default)]
    pub apply_cooldown: Option<Vec<SkillId>>,
    #[serde(default)]
    pub categories: Vec<u32>,
    /// 0..=3, consulted by the decision engine's cancel-window resolution.
    #[serde(default)]
    pub pending_type: u8,
    #[serde(default)]
    pub keep_moving_charge: bool,
    #[serde(default)]
    pub kept_moving_charge: bool,
    #[serde(default)]
    pub can_cast_during_block: bool,
    #[serde(default)]
    pub only_after_defence_success: bool,
    #[serde(default)]
    pub hold_if_not_moving: bool,
    #[serde(default)]
    pub no_need_weapon: bool,
    #[serde(default)]
    pub fixed_speed: bool,
    #[serde(default)]
    pub lockon: bool,
    #[serde(default)]
    pub next_skill: Option<SkillId>,
    #[serde(default)]
    pub connect_next_skill: Option<SkillId>,
    #[serde(default)]
    pub over_charge_connect_skill: Option<SkillId>,
    #[serde(default)]
    pub dash_redirect: Option<SkillId>,
    #[serde(default)]
    pub dash_redirect_fail: Option<SkillId>,
    #[serde(default)]
    pub arrow_chain: bool,
    #[serde(default)]
    pub resource_usage_st: f32,
    #[serde(default)]
    pub anim_seq: Vec<AnimSegment>,
    #[serde(default)]
    pub distance: Vec<f32>,
    #[serde(default)]
    pub use_dest: Vec<bool>,
    #[serde(default)]
    pub direction_modifier: Vec<f32>,
}

impl SkillRecord {
    /// Number of animation stages this record declares.
    pub fn stage_count(&self) -> usize {
        match &self.anim_length {
            AnimLength::Scalar(_) => 1,
            AnimLength::Sequence(v) => v.len(),
            AnimLength::MovingCharge(v) => v.len(),
        }
    }
}

/// Per-class override table for `isSupported`, as loaded from `skills.json`:
/// className -> base -> sub -> supported.
pub type SupportTable = HashMap<String, HashMap<u32, HashMap<u32, bool>>>;

const ANIM_CACHE_CAP: usize = 100;
const ANIM_CACHE_EVICT_FRACTION: usize = 10;

/// Bounded, insertion-order LRU of per-skill prefix-sum animation lengths
/// at `speed.real == 1.0`. Capped around 100 entries.
#[derive(Default)]
struct PrefixSumCache {
    order: VecDeque<SkillId>,
    sums: HashMap<SkillId, Vec<f32>>,
}

impl PrefixSumCache {
    fn get_or_insert(&mut self, skill_id: SkillId, record: &SkillRecord) -> &[f32] {
        if !self.sums.contains_key(&skill_id) {
            let sums = Self::compute_prefix_sums(record);
            self.insert(skill_id, sums);
        }
        self.sums.get(&skill_id).expect("just inserted")
    }

    fn insert(&mut self, skill_id: SkillId, sums: Vec<f32>) {
        if self.sums.len() >= ANIM_CACHE_CAP {
            let evict_count = (ANIM_CACHE_CAP / ANIM_CACHE_EVICT_FRACTION).max(1);
            for _ in 0..evict_count {
                if let Some(oldest) = self.order.pop_front() {
                    self.sums.remove(&oldest);
                } else {
                    break;
                }
            }
        }
        self.order.push_back(skill_id);
        self.sums.insert(skill_id, sums);
    }

    fn compute_prefix_sums(record: &SkillRecord) -> Vec<f32> {
        let per_stage: Vec<f32> = match &record.anim_length {
            AnimLength::Scalar(v) => vec![*v],
            AnimLength::Sequence(v) => v.clone(),
            AnimLength::MovingCharge(v) => v.iter().map(|s| s.duration_ms).collect(),
        };
        let mut running = 0.0;
        per_stage
            .into_iter()
            .map(|v| {
                running += v;
                running
            })
            .collect()
    }
}

/// The read-only, class-scoped skill catalog.
///
/// Loaded once per character class on login; cleared on logout/class change
/// by constructing a fresh `Catalog`.
pub struct Catalog {
    class_name: String,
    records: HashMap<SkillId, SkillRecord>,
    support: SupportTable,
    anim_cache: std::sync::Mutex<PrefixSumCache>,
    missing_logged: std::sync::Mutex<HashSet<SkillId>>,
}

impl Catalog {
    pub fn new(class_name: String, records: HashMap<SkillId, SkillRecord>, support: SupportTable) -> Self {
        Catalog {
            class_name,
            records,
            support,
            anim_cache: std::sync::Mutex::new(PrefixSumCache::default()),
            missing_logged: std::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Looks up a skill's immutable record, if the catalog knows it.
    pub fn get(&self, skill_id: SkillId) -> Option<&SkillRecord> {
        self.records.get(&skill_id)
    }

    /// Whether this skill is enabled for the current class, per `skills.json`.
    /// Defaults to `true` when no override entry exists - `isSupported`
    /// fails the transition, not the process, when data is simply absent.
    pub fn is_supported(&self, skill_id: SkillId) -> bool {
        self.support
            .get(&self.class_name)
            .and_then(|bases| bases.get(&skill_id.base()))
            .and_then(|subs| subs.get(&skill_id.sub()))
            .copied()
            .unwrap_or(true)
    }

    pub fn stage_count(&self, skill_id: SkillId) -> Option<usize> {
        self.get(skill_id).map(SkillRecord::stage_count)
    }

    /// Logs the "CRITICAL failed to find skill info" message exactly once
    /// per missing skill id.
    pub fn log_missing_once(&self, skill_id: SkillId) {
        let mut logged = self.missing_logged.lock().expect("lock poisoned");
        if logged.insert(skill_id) {
            tracing::error!(skill_id = skill_id.0, "CRITICAL failed to find skill info");
        }
    }

    /// Animation length of a given stage at the given speed.
    ///
    /// `loc_to_dest` is only consulted for `dash` skills. Returns `None` for
    /// the "unknown" sentinel (`shouldNotUseLength` at the final stage).
    pub fn anim_length(
        &self,
        skill_id: SkillId,
        stage: usize,
        speed: &SpeedState,
        loc_to_dest: f32,
    ) -> Option<f32> {
        let record = self.get(skill_id)?;
        if speed.real <= 0.0 {
            return Some(0.0);
        }

        match record.skill_type {
            SkillType::Dash => {
                let base = match &record.anim_length {
                    AnimLength::Scalar(v) => *v,
                    AnimLength::Sequence(v) => *v.first().unwrap_or(&0.0),
                    AnimLength::MovingCharge(v) => v.first().map(|s| s.duration_ms).unwrap_or(0.0),
                };
                if base <= 0.0 {
                    return Some(0.0);
                }
                Some((loc_to_dest + 25.0) * 1000.0 / base / speed.real)
            }
            SkillType::MovingCharge => match &record.anim_length {
                AnimLength::MovingCharge(stages) => {
                    stages.get(stage).map(|s| s.duration_ms / speed.real)
                }
                _ => None,
            },
            _ => {
                if record.should_not_use_length {
                    let last = record.stage_count().saturating_sub(1);
                    if stage != last {
                        return self.stage_raw_length(record, stage).map(|v| v / speed.real);
                    }
                    return None; // "unknown" sentinel
                }
                self.stage_raw_length(record, stage).map(|v| v / speed.real)
            }
        }
    }

    fn stage_raw_length(&self, record: &SkillRecord, stage: usize) -> Option<f32> {
        match &record.anim_length {
            AnimLength::Scalar(v) => Some(*v),
            AnimLength::Sequence(v) => v.get(stage).copied(),
            AnimLength::MovingCharge(v) => v.get(stage).map(|s| s.duration_ms),
        }
    }

    /// Cumulative animation length for stages `0..stage` at `speed == 1.0`,
    /// served from the bounded LRU.
    pub fn prefix_sum_to_stage(&self, skill_id: SkillId, stage: usize) -> f32 {
        let Some(record) = self.get(skill_id) else {
            return 0.0;
        };
        let mut cache = self.anim_cache.lock().expect("lock poisoned");
        let sums = cache.get_or_insert(skill_id, record);
        if stage == 0 {
            0.0
        } else {
            sums.get(stage - 1).copied().unwrap_or_else(|| sums.last().copied().unwrap_or(0.0))
        }
    }
}
