// Monster instances and the savable roster.
//
// A `Monster` is a thin bundle of mutable per-instance state — position,
// health, mood scalars, recharge counters — over an immutable `Breed`
// looked up by name in the registry each turn. All per-kind behavior lives
// in breed data; the engine has exactly one monster type.
//
// `take_turn` is the per-monster pipeline the scheduler drives: recharges
// tick down, mood updates from the senses, the state machine fires at most
// one transition, and the active state's routine picks one action. Damage
// flows back in through `MonsterRoster::report_damage_taken` /
// `report_damage_dealt`, which apply the direct fear effect and broadcast
// to witnesses synchronously — deferring the fan-out could drop fear
// adjustments when several hits land in one turn.
//
// The roster serializes with its RNG so a mid-simulation save resumes
// bit-identically. Recharge vectors are re-validated against the registry
// after load (`rebuild_transient_state`); a save written against an older
// breed file must not leave a counter vector disagreeing with the move
// list.
//
// See also: `behavior.rs` for the transition and decision logic invoked
// here, `mood.rs` for the perception update and fear arithmetic,
// `breed.rs` for the registry the roster resolves names against.
//
// **Critical constraint: determinism.** The roster iterates a `BTreeMap`
// and owns the only `GameRng` its monsters draw from.

use crate::action::{Action, BehaviorEvent};
use crate::behavior::{self, TurnCtx};
use crate::breed::{Breed, BreedFlags, BreedRegistry};
use crate::config::{EngineConfig, MoveParams, WakeParams};
use crate::mood;
use crate::prng::GameRng;
use crate::types::{MonsterId, Pos};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The three behavioral states. Exactly one is active per monster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonsterState {
    /// Resting and oblivious until notice or pain wakes it.
    #[default]
    Asleep,
    /// Actively engaging the target.
    Awake,
    /// Broken: seeking cover or distance until fear drains away.
    Afraid,
}

/// One monster's mutable state. Everything breed-shaped lives in the
/// registry; this is only what differs per instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Monster {
    pub id: MonsterId,
    /// Breed name, resolved against the registry every turn.
    pub breed: String,
    pub pos: Pos,
    pub health: f32,
    pub state: MonsterState,
    /// Instantaneous sensed signal, recomputed every turn.
    pub awareness: f32,
    /// Low-pass filtered awareness; lingers after the stimulus fades.
    pub alertness: f32,
    /// Accumulated combat fright in [0, frighten_threshold].
    pub fear: f32,
    /// This instance's jittered copy of the breed threshold. Zero for
    /// fearless breeds, whose fear never moves at all.
    pub frighten_threshold: f32,
    /// Consecutive near-silent turns while awake; dozes off at the limit.
    pub low_notice_turns: u32,
    /// Per-move recharge counters, parallel to the breed's move list.
    /// A move is usable only at zero.
    pub recharges: Vec<u32>,
}

/// What `take_turn` hands back to the scheduler.
#[derive(Clone, Debug)]
pub struct TurnOutput {
    pub action: Action,
    pub events: Vec<BehaviorEvent>,
}

/// What taking a hit produced: events for the log plus, possibly, a
/// reflexive move the scheduler may resolve immediately.
#[derive(Clone, Debug, Default)]
pub struct DamageResponse {
    pub events: Vec<BehaviorEvent>,
    pub reflex: Option<Action>,
}

impl Monster {
    /// Create a monster of `breed` at `pos`, asleep, at full health, with
    /// every move on a jittered-full cooldown so a fresh spawn cannot
    /// open with its strongest ability.
    pub fn spawn(
        id: MonsterId,
        breed: &Breed,
        pos: Pos,
        config: &EngineConfig,
        rng: &mut GameRng,
    ) -> Self {
        let frighten_threshold = if breed.flags.contains(BreedFlags::FEARLESS) {
            0.0
        } else {
            let (low, high) = config.mood.frighten_jitter;
            let jitter = if high > low { rng.range_f32(low, high) } else { low };
            breed.frighten_threshold * jitter
        };
        let mut monster = Self {
            id,
            breed: breed.name.clone(),
            pos,
            health: breed.max_health,
            state: MonsterState::Asleep,
            awareness: 0.0,
            alertness: 0.0,
            fear: 0.0,
            frighten_threshold,
            low_notice_turns: 0,
            recharges: vec![0; breed.moves.len()],
        };
        for index in 0..breed.moves.len() {
            monster.reset_recharge(index, breed, &config.moves, rng);
        }
        monster
    }

    /// The combined sensory signal driving wake-up decisions.
    pub fn notice(&self) -> f32 {
        self.awareness.max(self.alertness)
    }

    /// Fear level at which this monster stops being afraid. Kept below
    /// the frighten threshold so the boundary does not flicker.
    pub fn calm_threshold(&self, wake: &WakeParams) -> f32 {
        self.frighten_threshold * wake.calm_fraction
    }

    pub fn health_fraction(&self, breed: &Breed) -> f32 {
        (self.health / breed.max_health).clamp(0.0, 1.0)
    }

    /// Snap awake: full alertness, fresh cooldowns.
    pub fn wake(&mut self, breed: &Breed, config: &EngineConfig, rng: &mut GameRng) {
        self.state = MonsterState::Awake;
        self.alertness = 1.0;
        self.low_notice_turns = 0;
        for index in 0..breed.moves.len() {
            self.reset_recharge(index, breed, &config.moves, rng);
        }
    }

    /// The fear-break transition, shared by the victim path and the
    /// witness broadcast. Fear pinned at the threshold tips the monster
    /// into Afraid; a sleeper skips Awake entirely, picking up the same
    /// alertness snap and cooldown reset a wake would give it.
    pub fn frighten_break(
        &mut self,
        breed: &Breed,
        config: &EngineConfig,
        rng: &mut GameRng,
    ) -> Option<BehaviorEvent> {
        if self.state == MonsterState::Afraid
            || self.frighten_threshold <= 0.0
            || self.fear < self.frighten_threshold
            || breed.flags.contains(BreedFlags::FEARLESS)
            || breed.flags.contains(BreedFlags::IMMOBILE)
        {
            return None;
        }
        if self.state == MonsterState::Asleep {
            self.alertness = 1.0;
            self.low_notice_turns = 0;
            for index in 0..breed.moves.len() {
                self.reset_recharge(index, breed, &config.moves, rng);
            }
        }
        self.state = MonsterState::Afraid;
        Some(BehaviorEvent::BecameAfraid { monster: self.id })
    }

    /// Nudge fear by `delta`, clamped to this instance's band. A no-op
    /// for fearless breeds.
    pub fn adjust_fear(&mut self, delta: f32, breed: &Breed) {
        if breed.flags.contains(BreedFlags::FEARLESS) {
            return;
        }
        self.fear = (self.fear + delta).clamp(0.0, self.frighten_threshold);
    }

    /// True when the move at `index` is off cooldown.
    pub fn can_use(&self, index: usize) -> bool {
        self.recharges.get(index).copied() == Some(0)
    }

    /// Restart a move's cooldown at its rate scaled by a small random
    /// multiplier, so identical monsters drift out of lock-step.
    pub fn reset_recharge(
        &mut self,
        index: usize,
        breed: &Breed,
        params: &MoveParams,
        rng: &mut GameRng,
    ) {
        let Some(mv) = breed.moves.get(index) else {
            return;
        };
        let (low, high) = params.recharge_jitter;
        let scale = if high > low { rng.range_f32(low, high) } else { low };
        if let Some(counter) = self.recharges.get_mut(index) {
            *counter = ((mv.rate as f32 * scale).round() as u32).max(1);
        }
    }

    /// Tick every cooldown down one turn, saturating at ready.
    pub fn decrement_recharges(&mut self) {
        for counter in &mut self.recharges {
            *counter = counter.saturating_sub(1);
        }
    }

    /// The whole per-turn pipeline: cooldowns tick, mood updates, the
    /// state machine fires, the active state's routine picks one action.
    pub fn take_turn(&mut self, ctx: &TurnCtx, rng: &mut GameRng) -> TurnOutput {
        let Some(breed) = ctx.registry.breed(&self.breed) else {
            // A roster entry whose breed vanished from the registry can
            // only stand still.
            return TurnOutput {
                action: Action::Rest,
                events: Vec::new(),
            };
        };
        self.decrement_recharges();
        mood::update(self, breed, ctx);

        let mut events = Vec::new();
        if let Some(event) = behavior::evaluate_transition(self, breed, ctx, rng) {
            events.push(event);
        }
        let decision = behavior::decide(self, breed, ctx, rng);
        self.state = decision.next_state;
        events.extend(decision.events);
        TurnOutput {
            action: decision.action,
            events,
        }
    }

    /// React to taking a hit: the victim-side fear jump, the fear break
    /// if the jump pinned fear at the threshold, a forced wake for
    /// sleepers otherwise (pain needs no wake roll), and the first
    /// off-cooldown move whose reflex predicate passes, offered back to
    /// the scheduler.
    pub fn on_damaged(&mut self, damage: f32, ctx: &TurnCtx, rng: &mut GameRng) -> DamageResponse {
        let Some(breed) = ctx.registry.breed(&self.breed) else {
            return DamageResponse::default();
        };
        let mut events = Vec::new();
        self.adjust_fear(
            mood::taken_damage_delta(breed, damage, &ctx.config.mood),
            breed,
        );
        // The break check runs here, at the jump, not on the victim's next
        // turn: by then the per-turn decay has already pulled fear back
        // under the threshold it was clamped to. A sleeper pushed past its
        // threshold breaks directly, skipping Awake; one merely hurt wakes.
        if let Some(event) = self.frighten_break(breed, ctx.config, rng) {
            events.push(event);
        } else if self.state == MonsterState::Asleep {
            self.wake(breed, ctx.config, rng);
            events.push(BehaviorEvent::WokeUp { monster: self.id });
        }

        let mut reflex = None;
        for index in 0..breed.moves.len() {
            if !self.can_use(index) {
                continue;
            }
            let mv = &breed.moves[index];
            if !mv.should_use_on_damage(self, breed, &ctx.config.moves, damage) {
                continue;
            }
            if let Some(action) = mv.action(self, breed, ctx, rng) {
                self.reset_recharge(index, breed, &ctx.config.moves, rng);
                events.push(BehaviorEvent::UsedMove {
                    monster: self.id,
                    name: mv.name.clone(),
                });
                reflex = Some(action);
                break;
            }
        }
        DamageResponse { events, reflex }
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Every live monster plus the engine RNG, as one savable unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonsterRoster {
    monsters: BTreeMap<MonsterId, Monster>,
    rng: GameRng,
}

impl MonsterRoster {
    pub fn new(seed: u64) -> Self {
        Self {
            monsters: BTreeMap::new(),
            rng: GameRng::new(seed),
        }
    }

    /// Spawn a monster of `breed` at `pos` and return its id.
    pub fn spawn(&mut self, breed: &Breed, pos: Pos, config: &EngineConfig) -> MonsterId {
        let id = MonsterId::new(&mut self.rng);
        let monster = Monster::spawn(id, breed, pos, config, &mut self.rng);
        self.monsters.insert(id, monster);
        id
    }

    pub fn get(&self, id: MonsterId) -> Option<&Monster> {
        self.monsters.get(&id)
    }

    pub fn get_mut(&mut self, id: MonsterId) -> Option<&mut Monster> {
        self.monsters.get_mut(&id)
    }

    pub fn remove(&mut self, id: MonsterId) -> Option<Monster> {
        self.monsters.remove(&id)
    }

    /// Monsters in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Monster> {
        self.monsters.values()
    }

    /// Ids in iteration (BTreeMap) order; the scheduler's turn order.
    pub fn ids(&self) -> Vec<MonsterId> {
        self.monsters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.monsters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monsters.is_empty()
    }

    /// Run one monster's turn. `None` if the id is not in the roster.
    pub fn take_turn(&mut self, id: MonsterId, ctx: &TurnCtx) -> Option<TurnOutput> {
        let monster = self.monsters.get_mut(&id)?;
        Some(monster.take_turn(ctx, &mut self.rng))
    }

    /// Report that `dealer` landed `damage` on the target. The dealer is
    /// emboldened in proportion to the bite taken out of the target;
    /// witnesses by half as much. Returns the witness list.
    pub fn report_damage_dealt(
        &mut self,
        dealer: MonsterId,
        damage: f32,
        target_max_health: f32,
        ctx: &TurnCtx,
    ) -> Vec<MonsterId> {
        let Some(pos) = self.monsters.get(&dealer).map(|m| m.pos) else {
            return Vec::new();
        };
        let relief = mood::dealt_damage_relief(damage, target_max_health, &ctx.config.mood);
        if let Some(monster) = self.monsters.get_mut(&dealer) {
            if let Some(breed) = ctx.registry.breed(&monster.breed) {
                monster.adjust_fear(-relief, breed);
            }
        }
        let seen = mood::witnesses(
            ctx.stage,
            &self.monsters,
            dealer,
            pos,
            ctx.config.mood.broadcast_radius,
        );
        for id in &seen {
            if let Some(witness) = self.monsters.get_mut(id) {
                if let Some(breed) = ctx.registry.breed(&witness.breed) {
                    witness.adjust_fear(-relief * ctx.config.mood.witness_scale, breed);
                }
            }
        }
        seen
    }

    /// Report that `victim` took `damage`. Applies the victim's own fear
    /// jump and reflex (see `Monster::on_damaged`), then broadcasts a
    /// half-strength jump to every witness, shaped by their breed flags.
    /// A witness pushed to its threshold breaks on the spot; its
    /// `BecameAfraid` rides back in the response events.
    pub fn report_damage_taken(
        &mut self,
        victim: MonsterId,
        damage: f32,
        ctx: &TurnCtx,
    ) -> DamageResponse {
        let Some((pos, victim_breed, victim_max)) = self
            .monsters
            .get(&victim)
            .and_then(|m| ctx.registry.breed(&m.breed).map(|b| (m.pos, b.name.clone(), b.max_health)))
        else {
            return DamageResponse::default();
        };

        let mut response = DamageResponse::default();
        if let Some(monster) = self.monsters.get_mut(&victim) {
            response = monster.on_damaged(damage, ctx, &mut self.rng);
        }

        let base =
            ctx.config.mood.witness_scale * ctx.config.mood.fear_taken_scale * damage / victim_max;
        let seen = mood::witnesses(
            ctx.stage,
            &self.monsters,
            victim,
            pos,
            ctx.config.mood.broadcast_radius,
        );
        for id in &seen {
            if let Some(witness) = self.monsters.get_mut(id) {
                if let Some(breed) = ctx.registry.breed(&witness.breed) {
                    let delta = mood::witness_taken_delta(breed, &victim_breed, base);
                    witness.adjust_fear(delta, breed);
                    // A frightening broadcast breaks a witness the same
                    // way a direct hit breaks the victim; deferring to
                    // the witness's own turn would lose the break to the
                    // clamp-then-decay ordering.
                    if delta > 0.0 {
                        if let Some(event) =
                            witness.frighten_break(breed, ctx.config, &mut self.rng)
                        {
                            response.events.push(event);
                        }
                    }
                }
            }
        }
        response
    }

    /// Re-validate loaded monsters against the registry. Recharge vectors
    /// from saves written against an older breed file are resized to the
    /// current move list; new counters start at the move's full rate.
    pub fn rebuild_transient_state(&mut self, registry: &BreedRegistry) {
        for monster in self.monsters.values_mut() {
            let Some(breed) = registry.breed(&monster.breed) else {
                continue;
            };
            let known = monster.recharges.len().min(breed.moves.len());
            monster.recharges.truncate(known);
            for mv in breed.moves.iter().skip(known) {
                monster.recharges.push(mv.rate);
            }
            monster.health = monster.health.min(breed.max_health);
            monster.fear = monster.fear.clamp(0.0, monster.frighten_threshold);
        }
    }

    /// Serialize the roster (monsters plus RNG) to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a roster and re-validate it against the registry.
    pub fn from_json(json: &str, registry: &BreedRegistry) -> Result<Self, serde_json::Error> {
        let mut roster: MonsterRoster = serde_json::from_str(json)?;
        roster.rebuild_transient_state(registry);
        Ok(roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Target;
    use crate::stage::{Stage, Tile};

    fn registry() -> BreedRegistry {
        let json = r#"[
            {
                "name": "warren rat",
                "max_health": 8.0,
                "vision": 6,
                "hearing": 4.0,
                "tracking": 10,
                "motility": "WALK",
                "frighten_threshold": 25.0,
                "attacks": [{ "name": "bite", "damage": 3.0 }]
            },
            {
                "name": "cinder imp",
                "max_health": 20.0,
                "vision": 8,
                "hearing": 5.0,
                "tracking": 12,
                "motility": "WALK",
                "frighten_threshold": 40.0,
                "attacks": [{ "name": "scratch", "damage": 4.0 }],
                "moves": [
                    { "name": "fire bolt", "rate": 5, "range": 6, "damage": 10.0,
                      "kind": { "Bolt": { "damage": 10.0 } } },
                    { "name": "mend", "rate": 8,
                      "kind": { "Heal": { "amount": 6.0 } } }
                ]
            },
            {
                "name": "old gnawbone",
                "max_health": 30.0,
                "vision": 6,
                "hearing": 6.0,
                "tracking": 10,
                "motility": "WALK",
                "flags": "PROTECTIVE",
                "frighten_threshold": 50.0,
                "attacks": [{ "name": "crush", "damage": 8.0 }]
            },
            {
                "name": "ember hulk",
                "max_health": 45.0,
                "vision": 7,
                "hearing": 4.0,
                "tracking": 12,
                "motility": "WALK",
                "flags": "BERSERK",
                "frighten_threshold": 35.0,
                "attacks": [{ "name": "slam", "damage": 12.0 }]
            }
        ]"#;
        BreedRegistry::from_json(json).expect("test registry parses")
    }

    fn ctx<'a>(
        stage: &'a Stage,
        registry: &'a BreedRegistry,
        config: &'a EngineConfig,
        target: Pos,
    ) -> TurnCtx<'a> {
        TurnCtx {
            stage,
            registry,
            config,
            target: Target { pos: target },
        }
    }

    #[test]
    fn spawn_starts_asleep_at_full_health() {
        let registry = registry();
        let config = EngineConfig::default();
        let mut rng = GameRng::new(9);
        let breed = registry.breed("cinder imp").unwrap();
        let monster = Monster::spawn(MonsterId::new(&mut rng), breed, Pos::new(4, 4), &config, &mut rng);

        assert_eq!(monster.state, MonsterState::Asleep);
        assert_eq!(monster.health, 20.0);
        assert_eq!(monster.fear, 0.0);
        assert_eq!(monster.recharges.len(), 2);
        // Cooldowns start full: no opening alpha strike.
        assert!(monster.recharges.iter().all(|&c| c > 0));
        // Jittered threshold stays inside the configured band.
        let (low, high) = config.mood.frighten_jitter;
        assert!(monster.frighten_threshold >= 40.0 * low);
        assert!(monster.frighten_threshold <= 40.0 * high);
    }

    #[test]
    fn recharge_cycle_rate_jitter_and_decay() {
        let registry = registry();
        let config = EngineConfig::default();
        let breed = registry.breed("cinder imp").unwrap();
        let mut rng = GameRng::new(3);
        let mut monster =
            Monster::spawn(MonsterId::new(&mut rng), breed, Pos::new(4, 4), &config, &mut rng);

        monster.recharges[0] = 0;
        assert!(monster.can_use(0));
        monster.reset_recharge(0, breed, &config.moves, &mut rng);
        let counter = monster.recharges[0];
        // rate 5, jitter (1.0, 1.3): the reset lands in [5, 7].
        assert!((5..=7).contains(&counter), "got {counter}");
        assert!(!monster.can_use(0));

        for turn in 1..=counter {
            monster.decrement_recharges();
            assert_eq!(monster.can_use(0), turn == counter);
        }
        // Further turns saturate at ready rather than wrapping.
        monster.decrement_recharges();
        assert!(monster.can_use(0));
    }

    #[test]
    fn adjust_fear_clamps_and_fearless_ignores() {
        let registry = registry();
        let config = EngineConfig::default();
        let breed = registry.breed("warren rat").unwrap();
        let mut rng = GameRng::new(5);
        let mut rat =
            Monster::spawn(MonsterId::new(&mut rng), breed, Pos::new(2, 2), &config, &mut rng);

        rat.adjust_fear(1000.0, breed);
        assert_eq!(rat.fear, rat.frighten_threshold);
        rat.adjust_fear(-1000.0, breed);
        assert_eq!(rat.fear, 0.0);

        let mut fearless = breed.clone();
        fearless.flags |= BreedFlags::FEARLESS;
        rat.frighten_threshold = 0.0;
        rat.adjust_fear(50.0, &fearless);
        assert_eq!(rat.fear, 0.0);
    }

    #[test]
    fn sleeping_monster_sleeps_through_a_quiet_turn() {
        let stage = Stage::open(20, 20);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(7);
        let breed = registry.breed("warren rat").unwrap();
        // Far corner, no noise: nothing to notice.
        let id = roster.spawn(breed, Pos::new(2, 2), &config);

        let c = ctx(&stage, &registry, &config, Pos::new(17, 17));
        let output = roster.take_turn(id, &c).unwrap();
        assert_eq!(output.action, Action::Rest);
        assert!(output.events.is_empty());
        assert_eq!(roster.get(id).unwrap().state, MonsterState::Asleep);
    }

    #[test]
    fn visible_target_wakes_the_sleeper_within_a_few_turns() {
        let stage = Stage::open(20, 20);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(11);
        let breed = registry.breed("warren rat").unwrap();
        let id = roster.spawn(breed, Pos::new(4, 4), &config);

        // Target right next door, fully lit: awareness near the ceiling.
        let c = ctx(&stage, &registry, &config, Pos::new(6, 4));
        let mut woke = false;
        for _ in 0..20 {
            let output = roster.take_turn(id, &c).unwrap();
            if output
                .events
                .iter()
                .any(|e| matches!(e, BehaviorEvent::WokeUp { .. }))
            {
                woke = true;
                break;
            }
        }
        assert!(woke, "a plainly visible target must wake the monster");
        assert_eq!(roster.get(id).unwrap().state, MonsterState::Awake);
    }

    #[test]
    fn pain_wakes_a_sleeper_without_a_roll() {
        let stage = Stage::open(16, 16);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(13);
        let breed = registry.breed("warren rat").unwrap();
        let id = roster.spawn(breed, Pos::new(4, 4), &config);

        let c = ctx(&stage, &registry, &config, Pos::new(10, 10));
        let response = roster.report_damage_taken(id, 2.0, &c);
        assert!(response
            .events
            .iter()
            .any(|e| matches!(e, BehaviorEvent::WokeUp { .. })));
        let rat = roster.get(id).unwrap();
        assert_eq!(rat.state, MonsterState::Awake);
        assert!(rat.fear > 0.0, "the hit must register as fear");
        assert_eq!(rat.alertness, 1.0);
    }

    #[test]
    fn reflexive_heal_fires_below_the_threshold() {
        let stage = Stage::open(16, 16);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(17);
        let breed = registry.breed("cinder imp").unwrap();
        let id = roster.spawn(breed, Pos::new(4, 4), &config);

        let c = ctx(&stage, &registry, &config, Pos::new(10, 10));
        {
            let imp = roster.get_mut(id).unwrap();
            imp.state = MonsterState::Awake;
            imp.health = 6.0; // 30%, below the 40% heal reflex line
            imp.recharges[1] = 0; // mend is ready
        }
        let response = roster.report_damage_taken(id, 1.0, &c);
        match response.reflex {
            Some(Action::UseMove(use_move)) => assert_eq!(use_move.name, "mend"),
            other => panic!("expected a reflexive mend, got {other:?}"),
        }
        assert!(
            roster.get(id).unwrap().recharges[1] >= 8,
            "the reflex use must restart the cooldown"
        );

        // On cooldown again: the same hit produces no reflex.
        let response = roster.report_damage_taken(id, 1.0, &c);
        assert!(response.reflex.is_none());
    }

    #[test]
    fn dealt_damage_emboldens_dealer_and_witnesses() {
        let stage = Stage::open(16, 16);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(19);
        let breed = registry.breed("warren rat").unwrap();
        let dealer = roster.spawn(breed, Pos::new(4, 4), &config);
        let ally = roster.spawn(breed, Pos::new(6, 4), &config);

        for id in [dealer, ally] {
            let m = roster.get_mut(id).unwrap();
            m.fear = 20.0;
        }
        let c = ctx(&stage, &registry, &config, Pos::new(10, 10));
        let seen = roster.report_damage_dealt(dealer, 5.0, 20.0, &c);
        assert_eq!(seen, vec![ally]);

        let dealer_fear = roster.get(dealer).unwrap().fear;
        let ally_fear = roster.get(ally).unwrap().fear;
        // 30 * 5/20 = 7.5 off the dealer, half that off the witness.
        assert!((dealer_fear - 12.5).abs() < 1e-4, "got {dealer_fear}");
        assert!((ally_fear - 16.25).abs() < 1e-4, "got {ally_fear}");
    }

    #[test]
    fn taken_damage_broadcast_respects_witness_flags() {
        let stage = Stage::open(24, 24);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(23);
        let victim = roster.spawn(registry.breed("old gnawbone").unwrap(), Pos::new(8, 8), &config);
        let kin = roster.spawn(registry.breed("old gnawbone").unwrap(), Pos::new(10, 8), &config);
        let rat = roster.spawn(registry.breed("warren rat").unwrap(), Pos::new(8, 10), &config);
        let hulk = roster.spawn(registry.breed("ember hulk").unwrap(), Pos::new(6, 8), &config);

        for id in [kin, rat, hulk] {
            roster.get_mut(id).unwrap().fear = 10.0;
        }
        let c = ctx(&stage, &registry, &config, Pos::new(20, 20));
        roster.report_damage_taken(victim, 6.0, &c);

        // base = 0.5 * 50 * 6/30 = 5.
        let kin_fear = roster.get(kin).unwrap().fear;
        let rat_fear = roster.get(rat).unwrap().fear;
        let hulk_fear = roster.get(hulk).unwrap().fear;
        assert!((kin_fear - 5.0).abs() < 1e-4, "protective kin emboldened, got {kin_fear}");
        assert!((rat_fear - 15.0).abs() < 1e-4, "bystander frightened, got {rat_fear}");
        assert!((hulk_fear - 5.0).abs() < 1e-4, "berserker excited, got {hulk_fear}");
    }

    #[test]
    fn a_hit_past_the_threshold_breaks_the_victim_at_once() {
        let stage = Stage::open(16, 16);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(53);
        let rat = roster.spawn(registry.breed("warren rat").unwrap(), Pos::new(4, 4), &config);
        {
            let m = roster.get_mut(rat).unwrap();
            m.state = MonsterState::Awake;
            m.fear = m.frighten_threshold - 1.0;
        }

        // 50 * 2/8 = 12.5 of fear: well past the last point of nerve.
        let c = ctx(&stage, &registry, &config, Pos::new(6, 4));
        let response = roster.report_damage_taken(rat, 2.0, &c);
        assert!(response
            .events
            .iter()
            .any(|e| matches!(e, BehaviorEvent::BecameAfraid { .. })));
        assert_eq!(roster.get(rat).unwrap().state, MonsterState::Afraid);
    }

    #[test]
    fn a_broadcast_can_break_a_watching_monster() {
        let stage = Stage::open(24, 24);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(59);
        let victim = roster.spawn(registry.breed("old gnawbone").unwrap(), Pos::new(8, 8), &config);
        let rat = roster.spawn(registry.breed("warren rat").unwrap(), Pos::new(10, 8), &config);
        {
            let m = roster.get_mut(rat).unwrap();
            m.state = MonsterState::Awake;
            m.fear = m.frighten_threshold - 1.0;
        }

        // base = 0.5 * 50 * 12/30 = 10: pins the rat's fear at its
        // threshold, and the break must land now, not on the rat's own
        // turn when decay has already pulled fear back under it.
        let c = ctx(&stage, &registry, &config, Pos::new(20, 20));
        let response = roster.report_damage_taken(victim, 12.0, &c);
        assert!(response
            .events
            .iter()
            .any(|e| matches!(e, BehaviorEvent::BecameAfraid { monster } if *monster == rat)));
        let watcher = roster.get(rat).unwrap();
        assert_eq!(watcher.state, MonsterState::Afraid);
        assert_eq!(watcher.fear, watcher.frighten_threshold);
    }

    #[test]
    fn a_terrified_sleeper_breaks_without_waking_first() {
        let stage = Stage::open(16, 16);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(61);
        let imp = roster.spawn(registry.breed("cinder imp").unwrap(), Pos::new(4, 4), &config);
        {
            let m = roster.get_mut(imp).unwrap();
            m.fear = m.frighten_threshold - 1.0;
            m.recharges = vec![0, 0];
        }

        let c = ctx(&stage, &registry, &config, Pos::new(8, 4));
        let response = roster.report_damage_taken(imp, 2.0, &c);
        // Straight to Afraid, skipping Awake: no separate wake event, but
        // the cooldown reset of a wake still applies.
        assert!(response
            .events
            .iter()
            .any(|e| matches!(e, BehaviorEvent::BecameAfraid { .. })));
        assert!(!response
            .events
            .iter()
            .any(|e| matches!(e, BehaviorEvent::WokeUp { .. })));
        let broken = roster.get(imp).unwrap();
        assert_eq!(broken.state, MonsterState::Afraid);
        assert!(broken.recharges[0] >= 5 && broken.recharges[1] >= 8);
    }

    #[test]
    fn berserk_victim_gets_bolder_when_hurt() {
        let stage = Stage::open(16, 16);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(29);
        let hulk = roster.spawn(registry.breed("ember hulk").unwrap(), Pos::new(5, 5), &config);
        roster.get_mut(hulk).unwrap().fear = 20.0;
        roster.get_mut(hulk).unwrap().state = MonsterState::Awake;

        let c = ctx(&stage, &registry, &config, Pos::new(10, 10));
        roster.report_damage_taken(hulk, 9.0, &c);
        // 50 * 9/45 = 10, inverted.
        let fear = roster.get(hulk).unwrap().fear;
        assert!((fear - 10.0).abs() < 1e-4, "got {fear}");
    }

    #[test]
    fn roster_roundtrips_through_json() {
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(31);
        let rat = roster.spawn(registry.breed("warren rat").unwrap(), Pos::new(3, 3), &config);
        let imp = roster.spawn(registry.breed("cinder imp").unwrap(), Pos::new(7, 5), &config);
        roster.get_mut(rat).unwrap().fear = 12.0;
        roster.get_mut(imp).unwrap().state = MonsterState::Awake;

        let json = roster.to_json().unwrap();
        let restored = MonsterRoster::from_json(&json, &registry).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(rat).unwrap().fear, 12.0);
        assert_eq!(restored.get(imp).unwrap().state, MonsterState::Awake);
        assert_eq!(
            restored.get(imp).unwrap().recharges,
            roster.get(imp).unwrap().recharges
        );
    }

    #[test]
    fn restored_rng_continues_the_same_stream() {
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(37);
        roster.spawn(registry.breed("warren rat").unwrap(), Pos::new(3, 3), &config);

        let json = roster.to_json().unwrap();
        let mut restored = MonsterRoster::from_json(&json, &registry).unwrap();
        // Same next spawn on both sides: same id, same jittered threshold.
        let breed = registry.breed("cinder imp").unwrap();
        let a = roster.spawn(breed, Pos::new(5, 5), &config);
        let b = restored.spawn(breed, Pos::new(5, 5), &config);
        assert_eq!(a, b);
        assert_eq!(
            roster.get(a).unwrap().frighten_threshold,
            restored.get(b).unwrap().frighten_threshold
        );
    }

    #[test]
    fn rebuild_resizes_stale_recharge_vectors() {
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(41);
        let imp = roster.spawn(registry.breed("cinder imp").unwrap(), Pos::new(4, 4), &config);

        // A save written against a one-move version of the breed.
        roster.get_mut(imp).unwrap().recharges = vec![3];
        roster.rebuild_transient_state(&registry);
        let recharges = &roster.get(imp).unwrap().recharges;
        assert_eq!(recharges.len(), 2);
        assert_eq!(recharges[0], 3, "existing counters survive");
        assert_eq!(recharges[1], 8, "new counters start at the move's rate");
    }

    #[test]
    fn unknown_breed_rests_instead_of_panicking() {
        let stage = Stage::open(10, 10);
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(43);
        let id = roster.spawn(registry.breed("warren rat").unwrap(), Pos::new(3, 3), &config);
        roster.get_mut(id).unwrap().breed = "nobody home".into();

        let c = ctx(&stage, &registry, &config, Pos::new(6, 6));
        let output = roster.take_turn(id, &c).unwrap();
        assert_eq!(output.action, Action::Rest);
    }

    #[test]
    fn witness_out_of_sight_is_untouched() {
        let mut stage = Stage::open(24, 12);
        for y in 1..11 {
            stage.set_tile(Pos::new(12, y), Tile::wall());
        }
        let registry = registry();
        let config = EngineConfig::default();
        let mut roster = MonsterRoster::new(47);
        let victim = roster.spawn(registry.breed("warren rat").unwrap(), Pos::new(5, 5), &config);
        let hidden = roster.spawn(registry.breed("warren rat").unwrap(), Pos::new(18, 5), &config);

        let c = ctx(&stage, &registry, &config, Pos::new(20, 10));
        roster.report_damage_taken(victim, 2.0, &c);
        assert_eq!(roster.get(hidden).unwrap().fear, 0.0);
    }
}
