// Breed data and registry — data-driven monster configuration.
//
// All behavioral differences between monster kinds (warren rats, cinder
// imps, broodmothers) are expressed as data in `Breed`. The engine uses a
// single `Monster` type and reads breed-specific values from the registry
// at runtime — no code branching per breed.
//
// Breeds load in two phases: descriptors (`BreedDef`) parse first, then
// `from_defs` resolves by-name cross-references. A spawn move may name a
// breed defined later in the list, so references cannot be checked until
// every name is known. Duplicates and dangling references fail the load.
//
// See also: `moves.rs` for the `Move`/`MoveDef` pair resolved here,
// `monster.rs` for the instances that point back at breeds by name,
// `config.rs` for what is tuning rather than breed data.
//
// **Critical constraint: determinism.** The registry is a `BTreeMap`, so
// saves and debug dumps iterate breeds in name order on every platform.

use crate::moves::{Move, MoveDef, MoveKind};
use crate::types::Motility;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

bitflags! {
    /// Innate temperament switches consumed by the mood and decision code.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct BreedFlags: u8 {
        /// Never accumulates fear, never becomes afraid.
        const FEARLESS   = 1 << 0;
        /// Rooted in place: attacks adjacent targets, never steps.
        const IMMOBILE   = 1 << 1;
        /// Pain enrages instead of frightening.
        const BERSERK    = 1 << 2;
        /// Emboldened, not frightened, by watching its own kind get hurt.
        const PROTECTIVE = 1 << 3;
        /// Fear gains hit twice as hard.
        const COWARDLY   = 1 << 4;
    }
}

// Flag masks serialize as their name form ("IMMOBILE | FEARLESS"), matching
// the hand-written breed JSON files.
impl Serialize for BreedFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut text = String::new();
        bitflags::parser::to_writer(self, &mut text).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for BreedFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        bitflags::parser::from_str(&text).map_err(serde::de::Error::custom)
    }
}

/// Melee attack descriptor. Damage is an average; the embedder rolls the
/// actual number when it resolves the hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub name: String,
    pub damage: f32,
}

/// Everything shared by monsters of one kind. One value per breed, held in
/// the registry; monsters refer to it by name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Breed {
    pub name: String,
    pub max_health: f32,
    /// Sight radius in tiles. 0 means blind.
    pub vision: u32,
    /// Hearing acuity, normalized against `MoodParams::hearing_max`.
    pub hearing: f32,
    /// How far the breed will pursue a target it cannot see directly.
    pub tracking: u32,
    pub motility: Motility,
    pub flags: BreedFlags,
    /// Base fear level at which a monster of this breed breaks. Each
    /// instance rolls its own jittered copy at spawn.
    pub frighten_threshold: f32,
    pub attacks: Vec<Attack>,
    pub moves: Vec<Move>,
}

impl Breed {
    /// Average damage across the melee attacks. 0 with none.
    pub fn melee_damage(&self) -> f32 {
        if self.attacks.is_empty() {
            return 0.0;
        }
        self.attacks.iter().map(|a| a.damage).sum::<f32>() / self.attacks.len() as f32
    }

    /// Best per-turn-normalized damage among ranged moves. 0 with none.
    pub fn ranged_damage(&self) -> f32 {
        self.moves
            .iter()
            .filter(|m| m.is_ranged())
            .map(Move::damage_per_turn)
            .fold(0.0, f32::max)
    }

    /// The tightest reach among the ranged moves. A tile inside it can be
    /// hit by every ranged move the breed carries, not just the longest
    /// one. `None` with no ranged moves.
    pub fn shortest_ranged_range(&self) -> Option<u32> {
        self.moves.iter().filter_map(|m| m.range).min()
    }
}

/// Serde descriptor form of a breed. Flags, attacks, and moves may be
/// omitted in JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BreedDef {
    pub name: String,
    pub max_health: f32,
    pub vision: u32,
    pub hearing: f32,
    pub tracking: u32,
    pub motility: Motility,
    #[serde(default)]
    pub flags: BreedFlags,
    pub frighten_threshold: f32,
    #[serde(default)]
    pub attacks: Vec<Attack>,
    #[serde(default)]
    pub moves: Vec<MoveDef>,
}

/// Why a breed list failed to load.
#[derive(Debug)]
pub enum RegistryError {
    /// Two breeds share a name; lookups would be ambiguous.
    DuplicateBreed(String),
    /// Something referred to a breed that does not exist.
    UnknownBreed { name: String, referenced_by: String },
    /// The JSON itself did not parse.
    Parse(serde_json::Error),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateBreed(name) => {
                write!(f, "duplicate breed name `{name}`")
            }
            RegistryError::UnknownBreed {
                name,
                referenced_by,
            } => {
                write!(f, "unknown breed `{name}` referenced by {referenced_by}")
            }
            RegistryError::Parse(err) => write!(f, "breed JSON failed to parse: {err}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err)
    }
}

/// All breeds, built once at startup and passed by reference from there on.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BreedRegistry {
    breeds: BTreeMap<String, Breed>,
}

impl BreedRegistry {
    /// Parse a JSON array of breed descriptors and resolve it.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let defs: Vec<BreedDef> = serde_json::from_str(json)?;
        Self::from_defs(defs)
    }

    /// Two-phase resolve: collect every name first so spawn moves may
    /// reference breeds defined later in the list.
    pub fn from_defs(defs: Vec<BreedDef>) -> Result<Self, RegistryError> {
        let mut names: BTreeSet<String> = BTreeSet::new();
        for def in &defs {
            if !names.insert(def.name.clone()) {
                return Err(RegistryError::DuplicateBreed(def.name.clone()));
            }
        }

        let mut breeds = BTreeMap::new();
        for def in defs {
            let moves: Vec<Move> = def.moves.iter().map(MoveDef::resolve).collect();
            for mv in &moves {
                if let MoveKind::Spawn { breed } = &mv.kind {
                    if !names.contains(breed) {
                        return Err(RegistryError::UnknownBreed {
                            name: breed.clone(),
                            referenced_by: format!(
                                "move `{}` of breed `{}`",
                                mv.name, def.name
                            ),
                        });
                    }
                }
            }
            let breed = Breed {
                name: def.name.clone(),
                max_health: def.max_health,
                vision: def.vision,
                hearing: def.hearing,
                tracking: def.tracking,
                motility: def.motility,
                flags: def.flags,
                frighten_threshold: def.frighten_threshold,
                attacks: def.attacks,
                moves,
            };
            breeds.insert(def.name, breed);
        }
        Ok(Self { breeds })
    }

    pub fn breed(&self, name: &str) -> Option<&Breed> {
        self.breeds.get(name)
    }

    /// Breeds in name order.
    pub fn breeds(&self) -> impl Iterator<Item = &Breed> {
        self.breeds.values()
    }

    pub fn len(&self) -> usize {
        self.breeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breeds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat_def(name: &str) -> BreedDef {
        BreedDef {
            name: name.into(),
            max_health: 8.0,
            vision: 6,
            hearing: 4.0,
            tracking: 10,
            motility: Motility::WALK,
            flags: BreedFlags::empty(),
            frighten_threshold: 25.0,
            attacks: vec![Attack {
                name: "bite".into(),
                damage: 3.0,
            }],
            moves: vec![],
        }
    }

    #[test]
    fn registry_resolves_forward_references() {
        // The broodmother spawns rats, but rats come later in the list.
        let json = r#"[
            {
                "name": "broodmother",
                "max_health": 40.0,
                "vision": 6,
                "hearing": 8.0,
                "tracking": 8,
                "motility": "WALK",
                "flags": "PROTECTIVE",
                "frighten_threshold": 60.0,
                "attacks": [{ "name": "crush", "damage": 9.0 }],
                "moves": [
                    { "name": "birth brood", "rate": 12,
                      "kind": { "Spawn": { "breed": "warren rat" } } }
                ]
            },
            {
                "name": "warren rat",
                "max_health": 8.0,
                "vision": 6,
                "hearing": 4.0,
                "tracking": 10,
                "motility": "WALK",
                "flags": "COWARDLY",
                "frighten_threshold": 25.0,
                "attacks": [{ "name": "bite", "damage": 3.0 }]
            }
        ]"#;
        let registry = BreedRegistry::from_json(json).expect("forward reference resolves");
        assert_eq!(registry.len(), 2);
        let mother = registry.breed("broodmother").unwrap();
        assert!(mother.flags.contains(BreedFlags::PROTECTIVE));
        assert_eq!(mother.moves.len(), 1);
        let rat = registry.breed("warren rat").unwrap();
        assert!(rat.flags.contains(BreedFlags::COWARDLY));
        assert!(rat.moves.is_empty());
    }

    #[test]
    fn flags_round_trip_in_name_form() {
        let flags = BreedFlags::IMMOBILE | BreedFlags::FEARLESS;
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#""FEARLESS | IMMOBILE""#);
        let restored: BreedFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, flags);
        let empty: BreedFlags =
            serde_json::from_str(&serde_json::to_string(&BreedFlags::empty()).unwrap()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn duplicate_breed_name_is_rejected() {
        let defs = vec![rat_def("warren rat"), rat_def("warren rat")];
        match BreedRegistry::from_defs(defs) {
            Err(RegistryError::DuplicateBreed(name)) => assert_eq!(name, "warren rat"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn dangling_spawn_reference_is_rejected() {
        let mut def = rat_def("lone spawner");
        def.moves.push(MoveDef {
            name: "summon".into(),
            rate: 10,
            range: None,
            damage: 0.0,
            kind: MoveKind::Spawn {
                breed: "nobody home".into(),
            },
        });
        match BreedRegistry::from_defs(vec![def]) {
            Err(RegistryError::UnknownBreed { name, .. }) => {
                assert_eq!(name, "nobody home")
            }
            other => panic!("expected unknown-breed error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = BreedRegistry::from_json("[{ not json").unwrap_err();
        assert!(matches!(err, RegistryError::Parse(_)));
        // The error chain keeps the serde detail.
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn breeds_iterate_in_name_order() {
        let defs = vec![rat_def("zephyr moth"), rat_def("ash crawler"), rat_def("mire toad")];
        let registry = BreedRegistry::from_defs(defs).unwrap();
        let names: Vec<&str> = registry.breeds().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["ash crawler", "mire toad", "zephyr moth"]);
    }

    #[test]
    fn damage_helpers_score_attacks_and_moves() {
        let mut def = rat_def("sharpshooter");
        def.attacks = vec![
            Attack {
                name: "claw".into(),
                damage: 4.0,
            },
            Attack {
                name: "bite".into(),
                damage: 8.0,
            },
        ];
        def.moves = vec![
            MoveDef {
                name: "weak dart".into(),
                rate: 2,
                range: Some(5),
                damage: 4.0,
                kind: MoveKind::Bolt { damage: 4.0 },
            },
            MoveDef {
                name: "heavy lance".into(),
                rate: 4,
                range: Some(8),
                damage: 16.0,
                kind: MoveKind::Bolt { damage: 16.0 },
            },
            MoveDef {
                name: "mend".into(),
                rate: 6,
                range: None,
                damage: 0.0,
                kind: MoveKind::Heal { amount: 5.0 },
            },
        ];
        let registry = BreedRegistry::from_defs(vec![def]).unwrap();
        let breed = registry.breed("sharpshooter").unwrap();
        assert_eq!(breed.melee_damage(), 6.0);
        assert_eq!(breed.ranged_damage(), 4.0);
        // The reach that serves both bolts is the dart's, not the lance's.
        assert_eq!(breed.shortest_ranged_range(), Some(5));
    }

    #[test]
    fn breed_without_attacks_scores_zero_melee() {
        let mut def = rat_def("drifting spore");
        def.attacks.clear();
        let registry = BreedRegistry::from_defs(vec![def]).unwrap();
        let breed = registry.breed("drifting spore").unwrap();
        assert_eq!(breed.melee_damage(), 0.0);
        assert_eq!(breed.ranged_damage(), 0.0);
        assert!(breed.shortest_ranged_range().is_none());
    }
}
