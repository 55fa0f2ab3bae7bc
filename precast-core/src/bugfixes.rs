//! Targeted workarounds for known server/client quirks, kept separate from
//! the core decision path so they can be reviewed (and eventually deleted)
//! independently of it.

/// How long after a teleport-class skill (`shortTel`/`catchBack`) completes
/// the server still sends a stale `CannotStartSkill` for the *previous*
/// location. Suppressing it for this window avoids a confusing denial
/// flashing right after a successful teleport.
const CANNOT_START_SKILL_SUPPRESS_AFTER_TELEPORT_MS: u64 = 100;

pub fn should_suppress_cannot_start_skill(teleport_completed_at: Option<u64>, now_ms: u64) -> bool {
    match teleport_completed_at {
        Some(completed_at) => now_ms.saturating_sub(completed_at) < CANNOT_START_SKILL_SUPPRESS_AFTER_TELEPORT_MS,
        None => false,
    }
}

/// The classes whose stamina-cost `SystemMessage` text the server gets
/// wrong and which this engine rewrites locally before it reaches the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaminaMessageClass {
    Gunner,
    Brawler,
    Ninja,
    Valkyrie,
}

/// Rewrites a server stamina-shortfall message for the classes whose own
/// text is known to be wrong (wrong resource name or wrong threshold).
/// Other classes pass the server's message through unchanged.
pub fn rewrite_stamina_message(class: Option<StaminaMessageClass>, original: &str) -> String {
    match class {
        Some(StaminaMessageClass::Gunner) => original.replace("Stamina", "Focus"),
        Some(StaminaMessageClass::Brawler) => original.replace("Stamina", "Spirit"),
        Some(StaminaMessageClass::Ninja) => original.replace("Stamina", "Chakra"),
        Some(StaminaMessageClass::Valkyrie) => original.replace("Stamina", "Valor"),
        None => original.to_string(),
    }
}
