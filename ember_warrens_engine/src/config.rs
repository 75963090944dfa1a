// Data-driven engine configuration.
//
// All tunable behavior parameters live here in `EngineConfig`, loaded from
// JSON at startup. The engine never uses magic numbers — it reads from the
// config. This enables balance iteration without recompilation.
//
// Parameters are grouped by concern: `MoodParams` (perception and fear),
// `WakeParams` (the sleep/wake hysteresis), `DecisionParams` (caution and
// meander shaping), and `MoveParams` (cooldown jitter). Per-breed data
// (health, vision, moves) is not configuration — it lives in the breed
// registry, see `breed.rs`.
//
// See also: `mood.rs` and `monster.rs` which read these values every turn,
// `behavior.rs` for the decision routines shaped by `DecisionParams`.
//
// **Critical constraint: determinism.** Config values feed directly into
// behavior logic. Two runs with the same seed and different configs are
// different runs.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Parameter groups
// ---------------------------------------------------------------------------

/// Perception blending and fear bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoodParams {
    /// Fraction of last turn's alertness retained each turn (low-pass decay).
    pub alertness_retention: f32,
    /// Weight of the current awareness sample blended into alertness.
    pub alertness_gain: f32,
    /// Hearing acuity that counts as perfect. Breed `hearing` values are
    /// normalized against this before scaling the local noise level.
    pub hearing_max: f32,
    /// Base fear lost per turn before distance and health shaping.
    pub fear_decay_base: f32,
    /// Additional decay per tile of distance to the target, as a fraction
    /// of the base.
    pub fear_decay_distance_scale: f32,
    /// Uniform jitter range applied to a breed's frighten threshold when a
    /// monster spawns. `(low, high)` multipliers.
    pub frighten_jitter: (f32, f32),
    /// Chebyshev radius within which combat is witnessed.
    pub broadcast_radius: u32,
    /// Fear removed from a dealer per point of damage, normalized by the
    /// victim's max health.
    pub fear_dealt_scale: f32,
    /// Fear added to a victim per point of damage, normalized by its own
    /// max health.
    pub fear_taken_scale: f32,
    /// Fraction of the direct fear delta applied to witnesses.
    pub witness_scale: f32,
    /// Multiplier on fear gains for cowardly breeds.
    pub cowardly_multiplier: f32,
}

/// The asleep/awake hysteresis thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WakeParams {
    /// Notice level below which a sleeping monster never wakes.
    pub notice_floor: f32,
    /// Notice level above which a sleeping monster always wakes. Between
    /// floor and ceiling the wake chance ramps cubically.
    pub notice_ceiling: f32,
    /// Notice level below which an awake monster starts losing track of
    /// the target.
    pub sleep_notice_floor: f32,
    /// Consecutive low-notice turns before an awake monster dozes off.
    pub sleep_turns: u32,
    /// A frightened monster calms once fear drops to this fraction of its
    /// frighten threshold. Kept below 1 so the boundary does not flicker.
    pub calm_fraction: f32,
}

/// Caution scoring and meander shaping for awake monsters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionParams {
    /// Caution score above which a monster with ranged options keeps its
    /// distance instead of closing to melee.
    pub caution_threshold: f32,
    /// Added to the threshold while adjacent to the target, so a monster
    /// already trading blows tends to finish the fight hand-to-hand.
    pub caution_engaged_bonus: f32,
    /// Chance a chosen step is replaced by a 45-degree neighbor.
    pub meander_chance: f32,
    /// Meander chance for breeds with no vision at all.
    pub meander_chance_blind: f32,
    /// Meander chance when the chosen step would bring the monster
    /// adjacent to the target.
    pub meander_chance_poised: f32,
}

/// Cooldown mechanics and eligibility thresholds shared by every `Move`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoveParams {
    /// Uniform jitter range applied to a move's rate when its recharge
    /// counter resets. `(low, high)` multipliers, both >= 1 keeps the rate
    /// a lower bound.
    pub recharge_jitter: (f32, f32),
    /// A bolt is wasted point-blank; it needs at least this many tiles of
    /// distance to the target.
    pub bolt_min_range: u32,
    /// Health fraction below which taking a hit triggers a reflexive heal.
    pub heal_reflex_fraction: f32,
    /// Health fraction below which taking a hit triggers a reflexive
    /// teleport.
    pub teleport_reflex_fraction: f32,
}

// ---------------------------------------------------------------------------
// Top-level engine config
// ---------------------------------------------------------------------------

/// Top-level engine configuration. Loaded from JSON, never mutated at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub mood: MoodParams,
    pub wake: WakeParams,
    pub decision: DecisionParams,
    pub moves: MoveParams,
}

impl EngineConfig {
    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mood: MoodParams {
                alertness_retention: 0.75,
                alertness_gain: 0.2,
                hearing_max: 10.0,
                fear_decay_base: 2.0,
                fear_decay_distance_scale: 0.05,
                frighten_jitter: (0.8, 1.2),
                broadcast_radius: 10,
                fear_dealt_scale: 30.0,
                fear_taken_scale: 50.0,
                witness_scale: 0.5,
                cowardly_multiplier: 2.0,
            },
            wake: WakeParams {
                notice_floor: 0.1,
                notice_ceiling: 0.7,
                sleep_notice_floor: 0.05,
                sleep_turns: 20,
                calm_fraction: 0.5,
            },
            decision: DecisionParams {
                caution_threshold: 100.0,
                caution_engaged_bonus: 50.0,
                meander_chance: 0.2,
                meander_chance_blind: 0.75,
                meander_chance_poised: 0.02,
            },
            moves: MoveParams {
                recharge_jitter: (1.0, 1.3),
                bolt_min_range: 2,
                heal_reflex_fraction: 0.4,
                teleport_reflex_fraction: 0.3,
            },
        }
    }
}
