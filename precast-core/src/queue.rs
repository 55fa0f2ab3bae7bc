//! Component H - the outgoing packet queue.
//!
//! Decisions made by the decision engine don't always translate into a
//! packet the host can emit this tick: a `Chain` transition that lands
//! mid-cooldown-compensation still needs to go out at a specific instant
//! relative to the server's own timing. This queue holds those packets
//! until their `send_at` arrives.

use std::collections::VecDeque;

use precast_protocol::QueuedPacket;

const DEFAULT_CAPACITY: usize = 50;
const DEFAULT_THROTTLE_MS: u64 = 8;

/// A bounded FIFO of scheduled packets. When full, new packets are dropped
/// rather than evicting the oldest entry - an in-flight packet that's
/// closer to firing is more valuable than one that just arrived. Chosen
/// over a more conventional drop-oldest policy to match observed behavior.
pub struct PacketQueue {
    entries: VecDeque<QueuedPacket>,
    capacity: usize,
    throttle_ms: u64,
    last_tick_at: u64,
}

impl Default for PacketQueue {
    fn default() -> Self {
        PacketQueue {
            entries: VecDeque::new(),
            capacity: DEFAULT_CAPACITY,
            throttle_ms: DEFAULT_THROTTLE_MS,
            last_tick_at: 0,
        }
    }
}

pub enum EnqueueResult {
    Accepted,
    DroppedQueueFull,
}

impl PacketQueue {
    pub fn new(capacity: usize, throttle_ms: u64) -> Self {
        PacketQueue {
            entries: VecDeque::new(),
            capacity,
            throttle_ms,
            last_tick_at: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn enqueue(&mut self, packet: QueuedPacket) -> EnqueueResult {
        if self.entries.len() >= self.capacity {
            return EnqueueResult::DroppedQueueFull;
        }
        self.entries.push_back(packet);
        EnqueueResult::Accepted
    }

    /// Whether the background scheduler's throttle interval has elapsed
    /// since the last tick.
    pub fn should_tick(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_tick_at) >= self.throttle_ms
    }

    /// Pops every packet whose `send_at` has arrived and whose `expires_at`
    /// hasn't already passed, dropping expired ones silently. Call only
    /// when [`should_tick`] is `true`.
    pub fn drain_ready(&mut self, now_ms: u64) -> Vec<QueuedPacket> {
        self.last_tick_at = now_ms;
        let mut ready = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.entries.len());
        for packet in self.entries.drain(..) {
            if packet.expires_at <= now_ms {
                continue;
            }
            if packet.send_at <= now_ms {
                ready.push(packet);
            } else {
                remaining.push_back(packet);
            }
        }
        self.entries = remaining;
        ready
    }
}
