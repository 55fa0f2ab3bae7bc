//! Component D - the local player's in-progress action state.

use precast_protocol::SkillId;

use crate::effects::SpeedState;

/// Whichever build variant is in effect for `elapsedTime`'s wiggle room;
/// one shipped build adds a flat 80ms on top of jitter and one doesn't -
/// both exist in the wild, so the engine takes it as a config knob rather
/// than picking a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WiggleRoomMode {
    JitterOnly,
    JitterPlus80,
}

/// Snapshot of what the local player is doing right now.
#[derive(Debug, Clone)]
pub struct ActionState {
    pub in_action: bool,
    pub in_special_action: bool,
    /// The server's own view of whether we're acting, as last reported -
    /// used to detect desync between client prediction and server truth.
    pub server_in_action: bool,
    pub skill_id: Option<SkillId>,
    pub stage: u32,
    pub server_stage: u32,
    pub speed: SpeedState,
    pub started_at: u64,
    /// Stage index carried over from a released `movingCharge` skill.
    pub kept_moving_charge: Option<u32>,
    /// Predicted end timestamp of the current stage.
    pub end: Option<u64>,
}

impl Default for ActionState {
    fn default() -> Self {
        ActionState {
            in_action: false,
            in_special_action: false,
            server_in_action: false,
            skill_id: None,
            stage: 0,
            server_stage: 0,
            speed: SpeedState::default(),
            started_at: 0,
            kept_moving_charge: None,
            end: None,
        }
    }
}

pub struct ActionTracker {
    state: ActionState,
    wiggle_room_mode: WiggleRoomMode,
}

impl ActionTracker {
    pub fn new(wiggle_room_mode: WiggleRoomMode) -> Self {
        ActionTracker {
            state: ActionState::default(),
            wiggle_room_mode,
        }
    }

    pub fn state(&self) -> &ActionState {
        &self.state
    }

    pub fn begin(&mut self, skill_id: SkillId, speed: SpeedState, started_at: u64, stage_end: Option<u64>) {
        self.state = ActionState {
            in_action: true,
            in_special_action: false,
            server_in_action: true,
            skill_id: Some(skill_id),
            stage: 0,
            server_stage: 0,
            speed,
            started_at,
            kept_moving_charge: None,
            end: stage_end,
        };
    }

    pub fn advance_stage(&mut self, stage: u32, stage_end: Option<u64>) {
        self.state.stage = stage;
        self.state.end = stage_end;
    }

    pub fn observe_server_stage(&mut self, server_stage: u32) {
        self.state.server_stage = server_stage;
    }

    pub fn end_action(&mut self) {
        self.state.in_action = false;
        self.state.in_special_action = false;
        self.state.server_in_action = false;
        self.state.skill_id = None;
        self.state.end = None;
    }

    pub fn set_kept_moving_charge(&mut self, stage: Option<u32>) {
        self.state.kept_moving_charge = stage;
    }

    /// Wall-time elapsed since the current stage began, scaled by the
    /// action's speed multiplier and padded with the configured wiggle room
    /// so a slightly-early server message doesn't read as "still mid
    /// previous stage" (§4.D: `elapsedTime = (now - startTime) * speed.real
    /// + wiggleRoom`).
    pub fn elapsed_time(&self, now_ms: u64, speed_real: f32, jitter_ms: u64) -> u64 {
        let wiggle = match self.wiggle_room_mode {
            WiggleRoomMode::JitterOnly => jitter_ms,
            WiggleRoomMode::JitterPlus80 => jitter_ms + 80,
        };
        let raw = now_ms.saturating_sub(self.state.started_at) as f32 * speed_real;
        raw as u64 + wiggle
    }

    /// Whether the current stage's predicted end has passed, given the
    /// elapsed-time wiggle room.
    pub fn stage_elapsed(&self, now_ms: u64, speed_real: f32, jitter_ms: u64) -> bool {
        match self.state.end {
            None => false,
            Some(end) => self.state.started_at + self.elapsed_time(now_ms, speed_real, jitter_ms) >= end,
        }
    }
}
