// Actions and behavior events — the engine's entire output vocabulary.
//
// A decision routine produces exactly one `Action` per turn. The engine
// never applies an action itself: the embedding game loop resolves damage,
// movement, and move effects, because only it knows about energy costs,
// animation, and the rest of the world. Everything here is plain data.
//
// `BehaviorEvent`s are fire-and-forget notifications (a monster woke up,
// calmed down, used a move) for the embedder's message log. They carry ids
// and names only; the engine never formats user-facing text.
//
// See also: `behavior.rs` where actions are chosen, `moves.rs` for the
// factories that build `MoveAction` payloads.

use crate::types::{Direction, MonsterId, Pos};
use serde::{Deserialize, Serialize};

/// What a monster wants to do with its turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Stand still. Also the fallback when nothing better exists.
    Rest,
    /// Step one tile in the given direction.
    Step(Direction),
    /// Melee attack. The engine pursues a single externally designated
    /// target; the position tells the embedder what was swung at.
    Melee { target: Pos },
    /// Use a special move; the payload carries the resolved effect.
    UseMove(MoveAction),
}

/// A resolved move use: which move, and the concrete effect with every
/// choice (destination, spawn cell) already made by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveAction {
    pub name: String,
    pub effect: MoveEffect,
}

/// Concrete move effects, numbers filled in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MoveEffect {
    Heal { amount: f32 },
    Haste { turns: u32, boost: f32 },
    Bolt { damage: f32, target: Pos },
    Teleport { to: Pos },
    Spawn { breed: String, at: Pos },
}

/// State-machine and move-use notifications for the embedder's log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BehaviorEvent {
    WokeUp { monster: MonsterId },
    FellAsleep { monster: MonsterId },
    BecameAfraid { monster: MonsterId },
    CalmedDown { monster: MonsterId },
    UsedMove { monster: MonsterId, name: String },
}

impl BehaviorEvent {
    /// The monster the event is about.
    pub fn monster(&self) -> MonsterId {
        match self {
            BehaviorEvent::WokeUp { monster }
            | BehaviorEvent::FellAsleep { monster }
            | BehaviorEvent::BecameAfraid { monster }
            | BehaviorEvent::CalmedDown { monster }
            | BehaviorEvent::UsedMove { monster, .. } => *monster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::GameRng;
    use crate::types::MonsterId;

    #[test]
    fn actions_roundtrip_through_json() {
        let actions = vec![
            Action::Rest,
            Action::Step(Direction::NorthEast),
            Action::Melee {
                target: Pos::new(4, 7),
            },
            Action::UseMove(MoveAction {
                name: "fire bolt".into(),
                effect: MoveEffect::Bolt {
                    damage: 12.0,
                    target: Pos::new(9, 2),
                },
            }),
        ];
        let json = serde_json::to_string(&actions).unwrap();
        let restored: Vec<Action> = serde_json::from_str(&json).unwrap();
        assert_eq!(actions, restored);
    }

    #[test]
    fn event_exposes_its_monster() {
        let mut rng = GameRng::new(7);
        let id = MonsterId::new(&mut rng);
        let event = BehaviorEvent::UsedMove {
            monster: id,
            name: "heal".into(),
        };
        assert_eq!(event.monster(), id);
    }
}
