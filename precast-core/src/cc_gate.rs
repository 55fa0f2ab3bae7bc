//! Component F - the crowd-control gate: a pure predicate over active
//! abnormalities that denies a cast before the decision engine ever runs.

use std::collections::HashMap;

/// Status flag bit that, when set on a stun abnormality, lifts the denial
/// (spec §4.F: "any active abnormality effect of type 211 (stun) applies
/// and the abnormality's status flag bit 16 is clear" -> denies).
const STUN_STATUS_BIT_16: u32 = 1 << 16;

/// Denial codes returned to the host when a CC effect blocks casting.
/// Negative values mirror the server's own refusal-code convention so the
/// host can forward them to the client unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcDenial {
    Stun,
    Sleep,
    Root,
    Feared,
    Pushing,
    AnimationSequence,
    KnockdownNonMovement,
}

impl CcDenial {
    pub fn code(self) -> i32 {
        match self {
            CcDenial::Stun => -1211,
            CcDenial::Sleep => -1232,
            CcDenial::Root => -1274,
            CcDenial::Feared => -21,
            CcDenial::Pushing => -23,
            CcDenial::AnimationSequence => -24,
            CcDenial::KnockdownNonMovement => -22,
        }
    }
}

/// Abnormality ids that are exempt from CC-gating entirely, regardless of
/// which family they otherwise belong to.
const WHITELISTED_ABNORMALITIES: [u32; 3] = [10_133_020, 10_133_021, 909_745];

fn is_whitelisted(abnormality_id: u32) -> bool {
    WHITELISTED_ABNORMALITIES.contains(&abnormality_id)
}

/// The CC-effect family an abnormality id belongs to, as classified by the
/// abnormality catalog data (kept outside this module; callers pass in the
/// already-classified sets so this stays a pure predicate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CcFamily {
    Stun,
    Sleep,
    Root,
    Fear,
    Push,
    Knockdown,
}

/// Whether the given abnormality ids, under their classified families,
/// deny casting - and which denial code applies.
///
/// `active` maps `(abnormality id, family)` to that abnormality's status
/// flag bits (§3 `AbnormalityState.status`); stun consults bit 16 there.
/// `is_movement_skill` carries the other two family-specific exceptions:
/// root and knockdown both deny non-movement casts but let movement skills
/// through. `is_mid_animation_sequence` covers the separate "already mid a
/// locked animation sequence" denial, independent of any abnormality.
pub fn check(
    active: &HashMap<(u32, CcFamily), u32>,
    is_movement_skill: bool,
    is_mid_animation_sequence: bool,
) -> Option<CcDenial> {
    if is_mid_animation_sequence {
        return Some(CcDenial::AnimationSequence);
    }
    for (&(abnormality_id, family), &status) in active {
        if is_whitelisted(abnormality_id) {
            continue;
        }
        let denial = match family {
            CcFamily::Stun if status & STUN_STATUS_BIT_16 == 0 => Some(CcDenial::Stun),
            CcFamily::Stun => None,
            CcFamily::Sleep => Some(CcDenial::Sleep),
            CcFamily::Root if !is_movement_skill => Some(CcDenial::Root),
            CcFamily::Root => None,
            CcFamily::Fear => Some(CcDenial::Feared),
            CcFamily::Push => Some(CcDenial::Pushing),
            CcFamily::Knockdown if !is_movement_skill => Some(CcDenial::KnockdownNonMovement),
            CcFamily::Knockdown => None,
        };
        if denial.is_some() {
            return denial;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stun_denies_cast_when_status_bit_16_clear() {
        let mut active = HashMap::new();
        active.insert((1, CcFamily::Stun), 0u32);
        assert_eq!(check(&active, false, false), Some(CcDenial::Stun));
    }

    #[test]
    fn stun_allows_cast_when_status_bit_16_set() {
        let mut active = HashMap::new();
        active.insert((1, CcFamily::Stun), STUN_STATUS_BIT_16);
        assert_eq!(check(&active, false, false), None);
    }

    #[test]
    fn whitelisted_abnormality_never_denies() {
        let mut active = HashMap::new();
        active.insert((10_133_020, CcFamily::Stun), 0u32);
        assert_eq!(check(&active, false, false), None);
    }

    #[test]
    fn knockdown_allows_movement_skills() {
        let mut active = HashMap::new();
        active.insert((1, CcFamily::Knockdown), 0u32);
        assert_eq!(check(&active, true, false), None);
        assert_eq!(check(&active, false, false), Some(CcDenial::KnockdownNonMovement));
    }

    #[test]
    fn root_allows_movement_skills() {
        let mut active = HashMap::new();
        active.insert((1, CcFamily::Root), 0u32);
        assert_eq!(check(&active, true, false), None);
        assert_eq!(check(&active, false, false), Some(CcDenial::Root));
    }

    #[test]
    fn animation_sequence_denies_regardless_of_abnormalities() {
        assert_eq!(check(&HashMap::new(), false, true), Some(CcDenial::AnimationSequence));
    }

    #[test]
    fn denial_codes_match_server_convention() {
        assert_eq!(CcDenial::Stun.code(), -1211);
        assert_eq!(CcDenial::Sleep.code(), -1232);
        assert_eq!(CcDenial::Root.code(), -1274);
        assert_eq!(CcDenial::Feared.code(), -21);
        assert_eq!(CcDenial::Pushing.code(), -23);
        assert_eq!(CcDenial::AnimationSequence.code(), -24);
        assert_eq!(CcDenial::KnockdownNonMovement.code(), -22);
    }
}
