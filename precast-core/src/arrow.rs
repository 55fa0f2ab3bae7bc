//! `ConnectSkillArrow` grant table (§3): a short-lived substitution recorded
//! when the server hands out an arrow-chain grant, consulted by the decision
//! engine's arrow-grant shortcut (resolution order step 3). An entry older
//! than 200ms is never selected, per the same invariant that governs the
//! cooldown and jitter windows elsewhere in this crate.

use std::collections::HashMap;

use precast_protocol::SkillId;

const ARROW_GRANT_TTL_MS: u64 = 200;

/// `original skill id -> (arrow skill id, expires_at)`, keyed by whatever
/// the player actually pressed rather than the arrow id itself, since that's
/// what the decision engine looks the grant up by.
#[derive(Default)]
pub struct ArrowGrantTable {
    entries: HashMap<SkillId, (SkillId, u64)>,
}

impl ArrowGrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a grant issued at `issued_at`: a by-grant cast of `original`
    /// resolves to `arrow_skill` until the entry expires.
    pub fn grant(&mut self, original: SkillId, arrow_skill: SkillId, issued_at: u64) {
        self.entries.insert(original, (arrow_skill, issued_at + ARROW_GRANT_TTL_MS));
    }

    /// The live grant for `original`, if one exists and hasn't expired.
    pub fn get(&self, original: SkillId, now_ms: u64) -> Option<(SkillId, u64)> {
        self.entries
            .get(&original)
            .filter(|&&(_, expires_at)| now_ms < expires_at)
            .copied()
    }

    pub fn clear(&mut self, original: SkillId) {
        self.entries.remove(&original);
    }

    /// Drops every expired entry; cheap enough to run on every timer tick.
    pub fn sweep(&mut self, now_ms: u64) {
        self.entries.retain(|_, &mut (_, expires_at)| now_ms < expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_is_visible_before_expiry() {
        let mut table = ArrowGrantTable::new();
        let original = SkillId(10_000);
        let arrow = SkillId(10_001);
        table.grant(original, arrow, 0);
        assert_eq!(table.get(original, 199), Some((arrow, 200)));
    }

    #[test]
    fn grant_older_than_200ms_is_never_selected() {
        let mut table = ArrowGrantTable::new();
        let original = SkillId(10_000);
        let arrow = SkillId(10_001);
        table.grant(original, arrow, 0);
        assert_eq!(table.get(original, 200), None);
        assert_eq!(table.get(original, 500), None);
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let mut table = ArrowGrantTable::new();
        table.grant(SkillId(1), SkillId(2), 0);
        table.sweep(1_000);
        assert_eq!(table.get(SkillId(1), 1_000), None);
        assert!(table.entries.is_empty());
    }
}
