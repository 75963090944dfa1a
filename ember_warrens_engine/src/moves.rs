// Moves — cooldown-gated special abilities attached to breeds.
//
// A `Move` is data (rate, range, damage weight) plus a `MoveKind` carrying
// per-kind parameters. The kind answers the three questions the decision
// loop asks: is this move worth using right now (`should_use`), is it
// worth using as a reflex to being hit (`should_use_on_damage`), and what
// concrete action does a use produce (`action`). There is no per-kind
// trait object; a tagged enum keeps moves serializable breed data.
//
// Cooldowns live on the monster, not the move: each monster keeps one
// recharge counter per move of its breed, decremented every turn it acts
// and reset with jitter when the move fires (see `monster.rs`).
//
// See also: `breed.rs` where moves are resolved from descriptors,
// `behavior.rs` for the decision step that scans them in breed order,
// `action.rs` for the `MoveEffect` payloads built here.
//
// **Critical constraint: determinism.** Candidate cells are gathered in
// compass/scan order and picked through the engine PRNG only.

use crate::action::{Action, MoveAction, MoveEffect};
use crate::behavior::TurnCtx;
use crate::breed::Breed;
use crate::config::MoveParams;
use crate::monster::{Monster, MonsterState};
use crate::prng::GameRng;
use crate::types::Pos;
use serde::{Deserialize, Serialize};

/// Per-kind parameters. The variant names double as the wire format in
/// breed JSON (`"kind": { "Bolt": { "damage": 12.0 } }`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MoveKind {
    /// Restore health, capped at the missing amount on use.
    Heal { amount: f32 },
    /// Temporary speed boost; resolution is the embedder's business.
    Haste { turns: u32, boost: f32 },
    /// Ranged attack at the target's tile.
    Bolt { damage: f32 },
    /// Blink to a random open cell within `distance`.
    Teleport { distance: u32 },
    /// Conjure another monster of the named breed in an adjacent cell.
    Spawn { breed: String },
}

/// A special ability. One value per breed, shared by every monster of it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub name: String,
    /// Cooldown length in turns. Always >= 1 after resolve.
    pub rate: u32,
    /// Reach in tiles for ranged moves; `None` for self-targeted ones.
    pub range: Option<u32>,
    /// Scoring weight for caution decisions. 0 for non-attacks.
    pub damage: f32,
    pub kind: MoveKind,
}

/// Serde descriptor form, resolved into a `Move` at registry build time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoveDef {
    pub name: String,
    pub rate: u32,
    #[serde(default)]
    pub range: Option<u32>,
    #[serde(default)]
    pub damage: f32,
    pub kind: MoveKind,
}

impl MoveDef {
    /// Resolve the descriptor. A rate of 0 would make the cooldown reset
    /// meaningless, so it clamps to 1.
    pub fn resolve(&self) -> Move {
        Move {
            name: self.name.clone(),
            rate: self.rate.max(1),
            range: self.range,
            damage: self.damage,
            kind: self.kind.clone(),
        }
    }
}

impl Move {
    pub fn is_ranged(&self) -> bool {
        self.range.is_some()
    }

    /// Damage normalized by cooldown, the caution score's view of a move.
    pub fn damage_per_turn(&self) -> f32 {
        self.damage / self.rate as f32
    }

    /// Situational eligibility, checked when the move is off cooldown.
    pub fn should_use(&self, monster: &Monster, breed: &Breed, ctx: &TurnCtx) -> bool {
        match &self.kind {
            MoveKind::Heal { .. } => monster.health < breed.max_health,
            // Worth hastening only while the target is actually perceived.
            MoveKind::Haste { .. } => monster.awareness > 0.0,
            MoveKind::Bolt { .. } => {
                let distance = monster.pos.chebyshev_distance(ctx.target.pos);
                let range = self.range.unwrap_or(0);
                distance >= ctx.config.moves.bolt_min_range
                    && distance <= range
                    && ctx.stage.line_of_sight(monster.pos, ctx.target.pos)
            }
            // Fleeing magic: for the frightened, including one forced to
            // turn and fight while its fear is still above the calm line.
            MoveKind::Teleport { .. } => {
                monster.state == MonsterState::Afraid
                    || monster.fear > monster.calm_threshold(&ctx.config.wake)
            }
            MoveKind::Spawn { .. } => ctx
                .stage
                .open_neighbors(monster.pos, breed.motility)
                .next()
                .is_some(),
        }
    }

    /// Reflexive eligibility, checked after the monster takes a hit.
    pub fn should_use_on_damage(
        &self,
        monster: &Monster,
        breed: &Breed,
        params: &MoveParams,
        _damage: f32,
    ) -> bool {
        let fraction = monster.health / breed.max_health;
        match &self.kind {
            MoveKind::Heal { .. } => fraction < params.heal_reflex_fraction,
            MoveKind::Teleport { .. } => fraction < params.teleport_reflex_fraction,
            _ => false,
        }
    }

    /// Build the concrete action for a use. `None` when the move turns out
    /// to have no valid resolution (no open cell to blink or spawn into);
    /// the decision loop then tries the next eligible move.
    pub fn action(
        &self,
        monster: &Monster,
        breed: &Breed,
        ctx: &TurnCtx,
        rng: &mut GameRng,
    ) -> Option<Action> {
        let effect = match &self.kind {
            MoveKind::Heal { amount } => MoveEffect::Heal {
                amount: amount.min(breed.max_health - monster.health),
            },
            MoveKind::Haste { turns, boost } => MoveEffect::Haste {
                turns: *turns,
                boost: *boost,
            },
            MoveKind::Bolt { damage } => MoveEffect::Bolt {
                damage: *damage,
                target: ctx.target.pos,
            },
            MoveKind::Teleport { distance } => {
                let to = pick_blink_destination(monster, breed, ctx, *distance, rng)?;
                MoveEffect::Teleport { to }
            }
            MoveKind::Spawn { breed: spawned } => {
                let cells: Vec<Pos> = ctx
                    .stage
                    .open_neighbors(monster.pos, breed.motility)
                    .collect();
                let at = *rng.pick(&cells)?;
                MoveEffect::Spawn {
                    breed: spawned.clone(),
                    at,
                }
            }
        };
        Some(Action::UseMove(MoveAction {
            name: self.name.clone(),
            effect,
        }))
    }
}

/// All open cells within the blink radius, scanned row-major, picked
/// uniformly. A blink is a jump, not a walk: no path is required.
fn pick_blink_destination(
    monster: &Monster,
    breed: &Breed,
    ctx: &TurnCtx,
    distance: u32,
    rng: &mut GameRng,
) -> Option<Pos> {
    let r = distance as i32;
    let mut cells: Vec<Pos> = Vec::new();
    for y in (monster.pos.y - r)..=(monster.pos.y + r) {
        for x in (monster.pos.x - r)..=(monster.pos.x + r) {
            let pos = Pos::new(x, y);
            if pos == monster.pos {
                continue;
            }
            if ctx.stage.can_enter(pos, breed.motility) && !ctx.stage.is_occupied(pos) {
                cells.push(pos);
            }
        }
    }
    rng.pick(&cells).copied()
}
