// The state machine and per-state decision routines.
//
// Monsters move through three states: Asleep, Awake, Afraid. Transitions
// are hysteretic on purpose: waking ramps up cubically with notice so a
// barely-heard footstep rarely wakes anything, falling asleep needs many
// consecutive quiet turns, and a frightened monster calms at a fraction of
// the fear that broke it. Without the gaps between those boundaries,
// monsters oscillate.
//
// Decisions are plain functions over an enum, not state objects:
// `evaluate_transition` runs first each turn and may flip the state, then
// `decide` dispatches to the state's routine and returns exactly one
// `Action`. The only mutation is to the monster's own mood and cooldown
// fields; the stage is read-only for the whole decision.
//
// The routines leans hard on `Flow::direction_to_best_where`: chasing is
// "step toward the nearest cell adjacent to the target", cover-seeking is
// "step toward the nearest cell the target cannot see", vantage-seeking is
// "step toward the nearest cell I can shoot from". The flow's lazy
// expansion keeps all three affordable on one turn.
//
// See also: `monster.rs` for `take_turn`, the per-turn entry point that
// calls into here, `moves.rs` for the move eligibility hooks, `mood.rs`
// for the fields the transitions read.
//
// **Critical constraint: determinism.** Every random choice draws from the
// engine PRNG passed down the call chain. The routines themselves never
// iterate a hash container.

use crate::action::{Action, BehaviorEvent};
use crate::breed::{Breed, BreedFlags};
use crate::flow::{FlowOptions, MotilityFlow};
use crate::monster::{Monster, MonsterState};
use crate::prng::GameRng;
use crate::stage::Stage;
use crate::types::{Direction, Pos};
use smallvec::SmallVec;

/// Everything a decision may look at this turn. The stage's occupancy
/// overlay is expected to cover the target's cell too, so pathing treats
/// it like any other occupied cell.
#[derive(Clone, Copy)]
pub struct TurnCtx<'a> {
    pub stage: &'a Stage,
    pub registry: &'a crate::breed::BreedRegistry,
    pub config: &'a crate::config::EngineConfig,
    /// The single externally designated target all monsters react to.
    pub target: Target,
}

/// The engine's view of the target: a position. Damage numbers arrive
/// through the roster's report entry points, not here.
#[derive(Clone, Copy, Debug)]
pub struct Target {
    pub pos: Pos,
}

/// One turn's verdict.
#[derive(Clone, Debug)]
pub struct Decision {
    pub action: Action,
    pub next_state: MonsterState,
    pub events: Vec<BehaviorEvent>,
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Chance a sleeping monster wakes at this notice level: zero below the
/// floor, certain above the ceiling, ramping with the cube of the
/// normalized position in between. The cube keeps faint stimuli faint.
pub fn wake_chance(notice: f32, wake: &crate::config::WakeParams) -> f32 {
    if notice < wake.notice_floor {
        return 0.0;
    }
    if notice >= wake.notice_ceiling {
        return 1.0;
    }
    let t = (notice - wake.notice_floor) / (wake.notice_ceiling - wake.notice_floor);
    t * t * t
}

/// Run the state machine for one turn, before the routine. Applies the
/// transition to the monster and reports the event, if any fired.
pub fn evaluate_transition(
    monster: &mut Monster,
    breed: &Breed,
    ctx: &TurnCtx,
    rng: &mut GameRng,
) -> Option<BehaviorEvent> {
    match monster.state {
        MonsterState::Asleep => {
            let chance = wake_chance(monster.notice(), &ctx.config.wake);
            if chance > 0.0 && rng.next_f32() < chance {
                monster.wake(breed, ctx.config, rng);
                Some(BehaviorEvent::WokeUp {
                    monster: monster.id,
                })
            } else {
                None
            }
        }
        MonsterState::Awake => {
            if monster.frighten_threshold > 0.0
                && monster.fear >= monster.frighten_threshold
                && !breed.flags.contains(BreedFlags::FEARLESS)
                && !breed.flags.contains(BreedFlags::IMMOBILE)
            {
                monster.state = MonsterState::Afraid;
                return Some(BehaviorEvent::BecameAfraid {
                    monster: monster.id,
                });
            }
            if monster.notice() < ctx.config.wake.sleep_notice_floor {
                monster.low_notice_turns += 1;
                if monster.low_notice_turns >= ctx.config.wake.sleep_turns {
                    monster.low_notice_turns = 0;
                    monster.state = MonsterState::Asleep;
                    return Some(BehaviorEvent::FellAsleep {
                        monster: monster.id,
                    });
                }
            } else {
                monster.low_notice_turns = 0;
            }
            None
        }
        MonsterState::Afraid => {
            if monster.fear <= monster.calm_threshold(&ctx.config.wake) {
                monster.state = MonsterState::Awake;
                Some(BehaviorEvent::CalmedDown {
                    monster: monster.id,
                })
            } else {
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Choose this turn's action for the monster's current state.
pub fn decide(
    monster: &mut Monster,
    breed: &Breed,
    ctx: &TurnCtx,
    rng: &mut GameRng,
) -> Decision {
    match monster.state {
        MonsterState::Asleep => Decision {
            action: Action::Rest,
            next_state: MonsterState::Asleep,
            events: Vec::new(),
        },
        MonsterState::Awake => {
            let (action, events) = awake_turn(monster, breed, ctx, rng);
            Decision {
                action,
                next_state: MonsterState::Awake,
                events,
            }
        }
        MonsterState::Afraid => afraid_turn(monster, breed, ctx, rng),
    }
}

// ---------------------------------------------------------------------------
// Awake
// ---------------------------------------------------------------------------

fn awake_turn(
    monster: &mut Monster,
    breed: &Breed,
    ctx: &TurnCtx,
    rng: &mut GameRng,
) -> (Action, Vec<BehaviorEvent>) {
    let mut events = Vec::new();

    // Get off burning ground before anything else. Rooted breeds cannot,
    // so for them the check is moot.
    if !breed.flags.contains(BreedFlags::IMMOBILE)
        && ctx.stage.tile(monster.pos).endangers(breed.motility)
    {
        if let Some(dir) = escape_hazard(monster, breed, ctx, rng) {
            return (Action::Step(dir), events);
        }
    }

    // An off-cooldown move preempts chasing.
    if let Some((action, event)) = try_moves(monster, breed, ctx, rng) {
        events.push(event);
        return (action, events);
    }

    if breed.flags.contains(BreedFlags::IMMOBILE) {
        if monster.pos.is_adjacent(ctx.target.pos) {
            return (
                Action::Melee {
                    target: ctx.target.pos,
                },
                events,
            );
        }
        return (Action::Rest, events);
    }

    let action = if prefers_vantage(monster, breed, ctx) {
        seek_vantage(monster, breed, ctx, rng)
            .unwrap_or_else(|| seek_melee(monster, breed, ctx, rng))
    } else {
        seek_melee(monster, breed, ctx, rng)
    };

    (meander(action, monster, breed, ctx, rng), events)
}

/// Step toward the nearest tile that does not hurt to stand on.
fn escape_hazard(
    monster: &Monster,
    breed: &Breed,
    ctx: &TurnCtx,
    rng: &mut GameRng,
) -> Option<Direction> {
    let mut flow = MotilityFlow::new(
        ctx.stage,
        monster.pos,
        breed.motility,
        FlowOptions {
            avoid_occupied: true,
            avoid_hazard: true,
            max_distance: None,
        },
    );
    // Hazard avoidance already prunes dangerous cells, so the nearest
    // reachable cell of any kind is the nearest safe one.
    flow.direction_to_best_where(rng, |_| true)
}

/// A uniformly random pick among the moves that are off cooldown and
/// situationally eligible this turn.
fn try_moves(
    monster: &mut Monster,
    breed: &Breed,
    ctx: &TurnCtx,
    rng: &mut GameRng,
) -> Option<(Action, BehaviorEvent)> {
    let mut eligible: SmallVec<[usize; 4]> = SmallVec::new();
    for index in 0..breed.moves.len() {
        if monster.recharges.get(index).copied().unwrap_or(1) > 0 {
            continue;
        }
        if breed.moves[index].should_use(monster, breed, ctx) {
            eligible.push(index);
        }
    }
    // A picked move may still fail to resolve (nowhere to blink or
    // spawn); drop it and draw again from the rest.
    while !eligible.is_empty() {
        let slot = rng.range_usize(0, eligible.len());
        let index = eligible.swap_remove(slot);
        let mv = &breed.moves[index];
        if let Some(action) = mv.action(monster, breed, ctx, rng) {
            monster.reset_recharge(index, breed, &ctx.config.moves, rng);
            let event = BehaviorEvent::UsedMove {
                monster: monster.id,
                name: mv.name.clone(),
            };
            return Some((action, event));
        }
    }
    None
}

/// The caution score weighs ranged strength, accumulated fear, and lost
/// health against a configured threshold. Adjacency raises the threshold:
/// a monster already trading blows tends to finish the job.
fn prefers_vantage(monster: &Monster, breed: &Breed, ctx: &TurnCtx) -> bool {
    let ranged = breed.ranged_damage();
    if ranged <= 0.0 {
        return false;
    }
    let melee = breed.melee_damage();
    let health_fraction = (monster.health / breed.max_health).clamp(0.0, 1.0);
    let score =
        100.0 * ranged / (ranged + melee) + monster.fear + 100.0 * (1.0 - health_fraction);
    let mut threshold = ctx.config.decision.caution_threshold;
    if monster.pos.is_adjacent(ctx.target.pos) {
        threshold += ctx.config.decision.caution_engaged_bonus;
    }
    score > threshold
}

/// Close to melee range: swing if adjacent, take the straight line if it
/// is open, otherwise path around through a bounded flow.
fn seek_melee(monster: &Monster, breed: &Breed, ctx: &TurnCtx, rng: &mut GameRng) -> Action {
    let target = ctx.target.pos;
    if monster.pos.is_adjacent(target) {
        return Action::Melee { target };
    }
    if let Some(dir) = straight_line_step(monster, breed, ctx) {
        return Action::Step(dir);
    }
    let mut flow = MotilityFlow::new(
        ctx.stage,
        monster.pos,
        breed.motility,
        FlowOptions {
            avoid_occupied: true,
            avoid_hazard: true,
            max_distance: Some(breed.tracking),
        },
    );
    match flow.direction_to_best_where(rng, |p| p.is_adjacent(target)) {
        Some(dir) => Action::Step(dir),
        // Out of tracking range or walled off: the trail is lost.
        None => Action::Rest,
    }
}

/// The first step of the Bresenham line to the target, provided every
/// intermediate cell is open and the whole line stays within tracking
/// range. The target's own cell is exempt from the openness check.
fn straight_line_step(monster: &Monster, breed: &Breed, ctx: &TurnCtx) -> Option<Direction> {
    let target = ctx.target.pos;
    if monster.pos.chebyshev_distance(target) > breed.tracking {
        return None;
    }
    let mut first = None;
    for pos in crate::stage::line(monster.pos, target) {
        if pos == target {
            break;
        }
        if !ctx.stage.can_enter(pos, breed.motility) || ctx.stage.is_occupied(pos) {
            return None;
        }
        if first.is_none() {
            first = Some(pos);
        }
    }
    monster.pos.direction_to(first?)
}

/// A vantage is a tile with line of sight to the target within the
/// shortest ranged move's reach, but not adjacent to it. The shortest
/// reach is the binding one: a tile inside it serves every ranged move
/// at once. Standing on a vantage already means staying put; the ranged
/// move itself fires on a later turn.
fn seek_vantage(
    monster: &Monster,
    breed: &Breed,
    ctx: &TurnCtx,
    rng: &mut GameRng,
) -> Option<Action> {
    let range = breed.shortest_ranged_range()?;
    let target = ctx.target.pos;
    let stage = ctx.stage;
    let qualifies = move |p: Pos| {
        p.chebyshev_distance(target) <= range
            && !p.is_adjacent(target)
            && stage.line_of_sight(p, target)
    };
    if qualifies(monster.pos) {
        return Some(Action::Rest);
    }
    let mut flow = MotilityFlow::new(
        stage,
        monster.pos,
        breed.motility,
        FlowOptions {
            avoid_occupied: true,
            avoid_hazard: true,
            max_distance: Some(range),
        },
    );
    flow.direction_to_best_where(rng, qualifies).map(Action::Step)
}

/// Chance-based wobble on a chosen step: swap it for an enterable 45
/// degree neighbor. Blind breeds wander hard; a step that would land next
/// to the target barely wanders at all.
fn meander(
    action: Action,
    monster: &Monster,
    breed: &Breed,
    ctx: &TurnCtx,
    rng: &mut GameRng,
) -> Action {
    let Action::Step(dir) = action else {
        return action;
    };
    let decision = &ctx.config.decision;
    let destination = monster.pos.step(dir);
    let chance = if breed.vision == 0 {
        decision.meander_chance_blind
    } else if destination.is_adjacent(ctx.target.pos) {
        decision.meander_chance_poised
    } else {
        decision.meander_chance
    };
    if !rng.random_bool(chance as f64) {
        return Action::Step(dir);
    }
    let open: Vec<Direction> = [dir.rotate_left_45(), dir.rotate_right_45()]
        .into_iter()
        .filter(|&candidate| {
            let cell = monster.pos.step(candidate);
            ctx.stage.can_enter(cell, breed.motility) && !ctx.stage.is_occupied(cell)
        })
        .collect();
    match rng.pick(&open) {
        Some(&wobble) => Action::Step(wobble),
        None => Action::Step(dir),
    }
}

// ---------------------------------------------------------------------------
// Afraid
// ---------------------------------------------------------------------------

fn afraid_turn(
    monster: &mut Monster,
    breed: &Breed,
    ctx: &TurnCtx,
    rng: &mut GameRng,
) -> Decision {
    let mut events = Vec::new();
    let target = ctx.target.pos;

    // Already hidden: stay put and let fear decay do its work.
    if !ctx.stage.line_of_sight(target, monster.pos) {
        return Decision {
            action: Action::Rest,
            next_state: MonsterState::Afraid,
            events,
        };
    }

    // Run for the nearest tile the target cannot see.
    let stage = ctx.stage;
    let mut flow = MotilityFlow::new(
        stage,
        monster.pos,
        breed.motility,
        FlowOptions {
            avoid_occupied: true,
            avoid_hazard: true,
            max_distance: Some(breed.tracking),
        },
    );
    if let Some(dir) = flow.direction_to_best_where(rng, |p| !stage.line_of_sight(target, p)) {
        return Decision {
            action: Action::Step(dir),
            next_state: MonsterState::Afraid,
            events,
        };
    }

    // No cover anywhere: at least widen the gap.
    let here = monster.pos.chebyshev_distance(target);
    let away: Vec<Direction> = Direction::ALL
        .into_iter()
        .filter(|&dir| {
            let cell = monster.pos.step(dir);
            ctx.stage.can_enter(cell, breed.motility)
                && !ctx.stage.is_occupied(cell)
                && cell.chebyshev_distance(target) > here
        })
        .collect();
    if let Some(&dir) = rng.pick(&away) {
        return Decision {
            action: Action::Step(dir),
            next_state: MonsterState::Afraid,
            events,
        };
    }

    // Cornered. Turn and fight this same turn.
    monster.state = MonsterState::Awake;
    events.push(BehaviorEvent::CalmedDown {
        monster: monster.id,
    });
    let (action, mut more) = awake_turn(monster, breed, ctx, rng);
    events.append(&mut more);
    Decision {
        action,
        next_state: MonsterState::Awake,
        events,
    }
}
