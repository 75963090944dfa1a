// The mood model: continuous perception and fear.
//
// Every turn, before the state machine runs, a monster blends what it
// currently senses into two scalars. `awareness` is instantaneous — the
// stronger of a vision term (lit target, line of sight, inside vision
// range) and a hearing term (local noise scaled by acuity). `alertness` is
// the same signal low-pass filtered across turns, so a monster stays
// twitchy for a while after the stimulus fades. The wake logic reads
// `notice`, the max of the two.
//
// `fear` moves differently: combat events push it in discrete jumps and a
// per-turn decay pulls it back toward zero. The decay grows with distance
// to the target and shrinks as health falls, so a cornered, wounded
// monster holds onto its panic. Breed flags reshape the jumps — cowards
// take them doubled, berserkers invert them into anger, and fearless
// breeds ignore them entirely.
//
// Combat broadcasts are synchronous: the embedder reports damage through
// `MonsterRoster`, which applies the direct effect and then fans out to
// `witnesses()` — every other monster within the broadcast radius with
// line of sight. The witness list is a pure function so the filter can be
// tested without staging a fight.
//
// See also: `monster.rs` for the fields updated here and the roster entry
// points, `behavior.rs` for the transitions driven by these values,
// `config.rs` for `MoodParams`.

use crate::behavior::TurnCtx;
use crate::breed::{Breed, BreedFlags};
use crate::config::MoodParams;
use crate::monster::Monster;
use crate::stage::Stage;
use crate::types::{MonsterId, Pos};
use std::collections::BTreeMap;

/// Per-turn mood update, run before the state machine.
pub fn update(monster: &mut Monster, breed: &Breed, ctx: &TurnCtx) {
    let params = &ctx.config.mood;
    let seen = vision_term(monster.pos, breed, ctx.stage, ctx.target.pos);
    let heard = hearing_term(monster.pos, breed, ctx.stage, params);
    monster.awareness = seen.max(heard).clamp(0.0, 1.0);
    monster.alertness = (params.alertness_retention * monster.alertness
        + params.alertness_gain * monster.awareness)
        .clamp(0.0, 1.0);

    let distance = monster.pos.chebyshev_distance(ctx.target.pos) as f32;
    let health_fraction = (monster.health / breed.max_health).clamp(0.0, 1.0);
    let decay = params.fear_decay_base
        * (1.0 + distance * params.fear_decay_distance_scale)
        * health_fraction;
    monster.fear = (monster.fear - decay).clamp(0.0, monster.frighten_threshold);
}

/// How clearly the target can be seen from `pos`: zero without line of
/// sight, with an unlit target, or beyond vision range; otherwise the
/// target tile's illumination faded linearly with distance.
pub fn vision_term(pos: Pos, breed: &Breed, stage: &Stage, target: Pos) -> f32 {
    if breed.vision == 0 {
        return 0.0;
    }
    let distance = pos.chebyshev_distance(target);
    if distance > breed.vision {
        return 0.0;
    }
    let illumination = stage.illumination_at(target);
    if illumination <= 0.0 {
        return 0.0;
    }
    if !stage.line_of_sight(pos, target) {
        return 0.0;
    }
    illumination * (breed.vision - distance) as f32 / breed.vision as f32
}

/// How loud the world is where the monster stands, scaled by its hearing
/// acuity normalized against `hearing_max`.
pub fn hearing_term(pos: Pos, breed: &Breed, stage: &Stage, params: &MoodParams) -> f32 {
    if params.hearing_max <= 0.0 {
        return 0.0;
    }
    (stage.noise_at(pos) * breed.hearing / params.hearing_max).clamp(0.0, 1.0)
}

/// Fear shed by a monster that just dealt `damage`, normalized by the
/// victim's max health. Landing a solid hit is emboldening.
pub fn dealt_damage_relief(damage: f32, target_max_health: f32, params: &MoodParams) -> f32 {
    if target_max_health <= 0.0 {
        return 0.0;
    }
    params.fear_dealt_scale * damage / target_max_health
}

/// Fear delta for a monster that just took `damage`. Positive frightens.
/// Cowards take the jump multiplied; berserkers invert it — pain enrages.
pub fn taken_damage_delta(breed: &Breed, damage: f32, params: &MoodParams) -> f32 {
    let mut delta = params.fear_taken_scale * damage / breed.max_health;
    if breed.flags.contains(BreedFlags::COWARDLY) {
        delta *= params.cowardly_multiplier;
    }
    if breed.flags.contains(BreedFlags::BERSERK) {
        delta = -delta;
    }
    delta
}

/// Fear delta for a witness watching a monster of `victim_breed` take a
/// hit with unsigned base magnitude `base`. Most onlookers are rattled;
/// berserkers are excited by any bloodshed, and protective breeds are
/// roused, not frightened, by their own kind getting hurt.
pub fn witness_taken_delta(witness: &Breed, victim_breed: &str, base: f32) -> f32 {
    if witness.flags.contains(BreedFlags::BERSERK)
        || (witness.flags.contains(BreedFlags::PROTECTIVE) && witness.name == victim_breed)
    {
        -base
    } else {
        base
    }
}

/// Every monster other than `subject` that can witness an event at `pos`:
/// within the Chebyshev broadcast radius, with line of sight. Pure filter
/// over the roster; the caller applies the fear deltas.
pub fn witnesses(
    stage: &Stage,
    monsters: &BTreeMap<MonsterId, Monster>,
    subject: MonsterId,
    pos: Pos,
    radius: u32,
) -> Vec<MonsterId> {
    monsters
        .values()
        .filter(|m| {
            m.id != subject
                && m.pos.chebyshev_distance(pos) <= radius
                && stage.line_of_sight(m.pos, pos)
        })
        .map(|m| m.id)
        .collect()
}
