// ember_warrens_engine — the spatial-reasoning and behavior core.
//
// This crate holds everything a monster needs to reason about a dungeon it
// did not build: lazy shortest-path search over the tile grid, a persistent
// repairable reachability map for online grid edits, and the mood model and
// state machine that turn perception into one action per turn. It has zero
// rendering or scheduling dependencies and runs headless under test.
//
// Module overview:
// - `types.rs`:        Pos, Direction, Motility masks, deterministic entity IDs.
// - `stage.rs`:        Dense 2D tile grid + occupancy/noise overlays, Bresenham LOS.
// - `queue.rs`:        BucketQueue — FIFO-per-cost priority queue for grid search.
// - `flow.rs`:         Flow / MotilityFlow — lazy memoized Dijkstra from one origin.
// - `reachability.rs`: Persistent BFS distance map with fill()/undo_fill() repair.
// - `breed.rs`:        Breed data, flags, and the two-phase BreedRegistry.
// - `moves.rs`:        Move / MoveKind — cooldown-gated special abilities.
// - `mood.rs`:         Awareness/alertness/fear updates and combat fear broadcasts.
// - `behavior.rs`:     The Asleep/Awake/Afraid state machine and decision routines.
// - `monster.rs`:      Monster instances, take_turn, the savable MonsterRoster.
// - `action.rs`:       Action / MoveAction / BehaviorEvent — the output vocabulary.
// - `config.rs`:       EngineConfig — every behavior tunable, loaded from JSON.
// - `prng`:            Re-exported from `ember_warrens_prng` — xoshiro256++ PRNG.
//
// The embedding game loop owns the stage and the turn order. It calls
// `MonsterRoster::take_turn` once per monster, resolves the returned action
// itself, and reports damage back through the roster's report entry points.
//
// **Critical constraint: determinism.** The engine is a pure function of its
// inputs and a seeded PRNG: `(stage, monsters, target, rng) -> (action,
// events)`. All randomness comes from `GameRng`. No `HashMap` anywhere
// iteration order can influence behavior. Use `BTreeMap` for ordered
// collections.

pub mod action;
pub mod behavior;
pub mod breed;
pub mod config;
pub mod flow;
pub mod monster;
pub mod mood;
pub mod moves;
pub use ember_warrens_prng as prng;
pub mod queue;
pub mod reachability;
pub mod stage;
pub mod types;
