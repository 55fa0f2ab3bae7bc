//! Component B - ping and jitter measurement.
//!
//! Ping is sampled on an 8-second cadence via `RequestGameStatPing`/
//! `ResponseGameStatPong`; jitter is inferred by comparing faked (client-
//! predicted) vs real stage/end arrival timestamps per skill id.

use std::collections::{HashMap, VecDeque};

use precast_protocol::SkillId;

use crate::clock::Clock;

const PING_INTERVAL_MS: u64 = 8_000;
const PING_MIN_VALID_MS: u64 = 0;
const PING_MAX_VALID_MS: u64 = 800;
const PING_SAMPLE_WINDOW: usize = 22;
const DEFAULT_PING_MS: u64 = 88;

const JITTER_MIN_VALID_MS: i64 = 0;
const JITTER_MAX_VALID_MS: i64 = 220;
const DEFAULT_JITTER_MS: u64 = 11;

const JITTER_ENTRY_TTL_MS: u64 = 33_000;
const JITTER_SWEEP_INTERVAL_MS: u64 = 5 * 60_000;
const JITTER_SWEEP_MAX_ENTRIES: usize = 11;

struct FakedArrival {
    stage: HashMap<u32, u64>,
    end: HashMap<u32, u64>,
    recorded_at: u64,
}

/// Tracks ping/jitter and exposes the two compensation inputs every other
/// component (cooldown, action tracker, decision engine) reads.
pub struct NetworkMonitor {
    ping_samples: VecDeque<u64>,
    ping_ms: u64,
    jitter_ms: u64,
    last_ping_request_at: Option<u64>,
    pending_ping_sent_at: Option<u64>,
    faked_arrivals: HashMap<SkillId, FakedArrival>,
    last_jitter_sweep_at: u64,
    /// Valid jitter samples collected since the previous measurement cycle;
    /// folded into `jitter_ms` as their minimum the next time `sweep` runs a
    /// new cycle, retaining the old value if none landed.
    jitter_cycle_samples: Vec<i64>,
    last_jitter_cycle_at: u64,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        NetworkMonitor {
            ping_samples: VecDeque::with_capacity(PING_SAMPLE_WINDOW),
            ping_ms: DEFAULT_PING_MS,
            jitter_ms: DEFAULT_JITTER_MS,
            last_ping_request_at: None,
            pending_ping_sent_at: None,
            faked_arrivals: HashMap::new(),
            last_jitter_sweep_at: 0,
            jitter_cycle_samples: Vec::new(),
            last_jitter_cycle_at: 0,
        }
    }
}

impl NetworkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current compensation ping: the minimum of the last 22 valid samples,
    /// or the default when no sample has ever landed.
    pub fn ping_ms(&self) -> u64 {
        self.ping_ms
    }

    pub fn jitter_ms(&self) -> u64 {
        self.jitter_ms
    }

    /// Whether the 8-second cadence says it's time to send another
    /// `RequestGameStatPing`.
    pub fn should_request_ping(&self, now_ms: u64) -> bool {
        match self.last_ping_request_at {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= PING_INTERVAL_MS,
        }
    }

    pub fn record_ping_request_sent(&mut self, now_ms: u64) {
        self.last_ping_request_at = Some(now_ms);
        self.pending_ping_sent_at = Some(now_ms);
    }

    /// Feeds a `ResponseGameStatPong`; `[0, 800]` ms samples are kept, others
    /// discarded without affecting the running minimum.
    pub fn record_pong(&mut self, now_ms: u64) {
        let Some(sent_at) = self.pending_ping_sent_at.take() else {
            return;
        };
        let sample = now_ms.saturating_sub(sent_at);
        if sample < PING_MIN_VALID_MS || sample > PING_MAX_VALID_MS {
            return;
        }
        if self.ping_samples.len() == PING_SAMPLE_WINDOW {
            self.ping_samples.pop_front();
        }
        self.ping_samples.push_back(sample);
        self.ping_ms = self.ping_samples.iter().copied().min().unwrap_or(DEFAULT_PING_MS);
    }

    /// Records the client-predicted ("faked") arrival time of a stage/end
    /// event for a given skill, to be diffed against the real arrival later.
    pub fn record_faked_stage(&mut self, skill_id: SkillId, stage: u32, now_ms: u64) {
        let entry = self.faked_arrivals.entry(skill_id).or_insert_with(|| FakedArrival {
            stage: HashMap::new(),
            end: HashMap::new(),
            recorded_at: now_ms,
        });
        entry.stage.insert(stage, now_ms);
        entry.recorded_at = now_ms;
    }

    pub fn record_faked_end(&mut self, skill_id: SkillId, now_ms: u64) {
        let entry = self.faked_arrivals.entry(skill_id).or_insert_with(|| FakedArrival {
            stage: HashMap::new(),
            end: HashMap::new(),
            recorded_at: now_ms,
        });
        entry.end.insert(0, now_ms);
        entry.recorded_at = now_ms;
    }

    /// Diffs a real `ActionStage` arrival against its faked counterpart,
    /// net of the current ping estimate, and files the result as a sample
    /// for the next jitter measurement cycle if it lands in range.
    pub fn observe_real_stage(&mut self, skill_id: SkillId, stage: u32, now_ms: u64) {
        if let Some(faked_at) = self.faked_arrivals.get(&skill_id).and_then(|f| f.stage.get(&stage)) {
            self.record_jitter_sample(now_ms as i64 - *faked_at as i64 - self.ping_ms as i64);
        }
    }

    pub fn observe_real_end(&mut self, skill_id: SkillId, now_ms: u64) {
        if let Some(faked_at) = self.faked_arrivals.get(&skill_id).and_then(|f| f.end.get(&0)) {
            self.record_jitter_sample(now_ms as i64 - *faked_at as i64 - self.ping_ms as i64);
        }
    }

    fn record_jitter_sample(&mut self, sample_ms: i64) {
        if sample_ms < JITTER_MIN_VALID_MS || sample_ms > JITTER_MAX_VALID_MS {
            return;
        }
        self.jitter_cycle_samples.push(sample_ms);
    }

    /// Closes out the current 8s measurement cycle if it has elapsed: the
    /// new jitter is the minimum of samples collected since the previous
    /// cycle, or the previous jitter if none were valid.
    fn cycle_jitter(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.last_jitter_cycle_at) < PING_INTERVAL_MS {
            return;
        }
        self.last_jitter_cycle_at = now_ms;
        if let Some(min) = self.jitter_cycle_samples.drain(..).min() {
            self.jitter_ms = min as u64;
        }
    }

    /// Drops faked-arrival bookkeeping older than 5 minutes, at most once
    /// per 33s and at most 11 skill ids per sweep.
    pub fn sweep(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.last_jitter_sweep_at) < JITTER_SWEEP_INTERVAL_MS {
            return;
        }
        self.last_jitter_sweep_at = now_ms;
        let stale: Vec<SkillId> = self
            .faked_arrivals
            .iter()
            .filter(|(_, entry)| now_ms.saturating_sub(entry.recorded_at) >= JITTER_ENTRY_TTL_MS)
            .map(|(id, _)| *id)
            .take(JITTER_SWEEP_MAX_ENTRIES)
            .collect();
        for id in stale {
            self.faked_arrivals.remove(&id);
        }
    }
}

pub fn tick(monitor: &mut NetworkMonitor, clock: &dyn Clock) -> bool {
    let now = clock.now_ms();
    monitor.sweep(now);
    monitor.cycle_jitter(now);
    monitor.should_request_ping(now)
}
