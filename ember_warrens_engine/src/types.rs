// Core types shared across the behavior engine.
//
// Defines grid coordinates (`Pos`), compass directions, movement capability
// masks (`Motility`), and strongly-typed entity identifiers (UUID v4
// wrappers). All types derive `Serialize` and `Deserialize` for save/load.
//
// **Critical constraint: determinism.** Entity IDs are generated from the
// engine's `GameRng` (see `ember_warrens_prng`). Do not use external UUID
// libraries or OS entropy.

use crate::prng::GameRng;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A position on the 2D tile grid. Each component is in tile units.
///
/// Screen-style coordinates:
/// - X: east  (positive) / west  (negative)
/// - Y: south (positive) / north (negative)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The position one step away in `dir`.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev (king-move) distance between two positions.
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.y - other.y).unsigned_abs())
    }

    /// Manhattan distance between two positions.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// True when `other` is one king move away (not equal).
    pub fn is_adjacent(self, other: Self) -> bool {
        self.chebyshev_distance(other) == 1
    }

    /// The compass direction most nearly pointing from `self` to `other`,
    /// or `None` when the positions coincide.
    pub fn direction_to(self, other: Self) -> Option<Direction> {
        Direction::from_delta((other.x - self.x).signum(), (other.y - self.y).signum())
    }

    /// All eight neighboring positions, in `Direction::ALL` order.
    pub fn neighbors(self) -> impl Iterator<Item = Pos> {
        Direction::ALL.into_iter().map(move |dir| self.step(dir))
    }

    /// The four cardinally adjacent positions, in `Direction::CARDINAL` order.
    pub fn cardinal_neighbors(self) -> impl Iterator<Item = Pos> {
        Direction::CARDINAL.into_iter().map(move |dir| self.step(dir))
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Compass directions
// ---------------------------------------------------------------------------

/// One of the eight compass directions, clockwise from north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// All eight directions, clockwise from north. The order is part of the
    /// deterministic contract: iteration over neighbors always follows it.
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// The four cardinal directions, clockwise from north.
    pub const CARDINAL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// The (dx, dy) tile offset of one step in this direction.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }

    /// The direction matching a unit offset, or `None` for (0, 0) or
    /// offsets outside the king-move ring.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        match (dx, dy) {
            (0, -1) => Some(Direction::North),
            (1, -1) => Some(Direction::NorthEast),
            (1, 0) => Some(Direction::East),
            (1, 1) => Some(Direction::SouthEast),
            (0, 1) => Some(Direction::South),
            (-1, 1) => Some(Direction::SouthWest),
            (-1, 0) => Some(Direction::West),
            (-1, -1) => Some(Direction::NorthWest),
            _ => None,
        }
    }

    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Direction::NorthEast
                | Direction::SouthEast
                | Direction::SouthWest
                | Direction::NorthWest
        )
    }

    /// The direction 180 degrees away.
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::NorthEast => Direction::SouthWest,
            Direction::East => Direction::West,
            Direction::SouthEast => Direction::NorthWest,
            Direction::South => Direction::North,
            Direction::SouthWest => Direction::NorthEast,
            Direction::West => Direction::East,
            Direction::NorthWest => Direction::SouthEast,
        }
    }

    /// The neighboring direction 45 degrees counterclockwise.
    pub const fn rotate_left_45(self) -> Direction {
        match self {
            Direction::North => Direction::NorthWest,
            Direction::NorthEast => Direction::North,
            Direction::East => Direction::NorthEast,
            Direction::SouthEast => Direction::East,
            Direction::South => Direction::SouthEast,
            Direction::SouthWest => Direction::South,
            Direction::West => Direction::SouthWest,
            Direction::NorthWest => Direction::West,
        }
    }

    /// The neighboring direction 45 degrees clockwise.
    pub const fn rotate_right_45(self) -> Direction {
        match self {
            Direction::North => Direction::NorthEast,
            Direction::NorthEast => Direction::East,
            Direction::East => Direction::SouthEast,
            Direction::SouthEast => Direction::South,
            Direction::South => Direction::SouthWest,
            Direction::SouthWest => Direction::West,
            Direction::West => Direction::NorthWest,
            Direction::NorthWest => Direction::North,
        }
    }
}

// ---------------------------------------------------------------------------
// Movement capability masks
// ---------------------------------------------------------------------------

bitflags! {
    /// Movement modes. A tile's mask lists the modes that may enter it; a
    /// breed's mask lists the modes it is capable of. Entry is permitted
    /// when the two masks overlap.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Motility: u8 {
        const WALK = 1 << 0;
        const FLY  = 1 << 1;
        const SWIM = 1 << 2;
        /// Can pass closed doors (tiles marked door-passable only).
        const DOOR = 1 << 3;
    }
}

impl Motility {
    /// The overlap test used everywhere passability is decided. An empty
    /// mask on either side never overlaps anything.
    pub fn allows(self, capability: Motility) -> bool {
        self.intersects(capability)
    }
}

// Masks serialize as their flag-name form ("WALK | FLY"), the same form
// the breed JSON files use, rather than raw bits.
impl Serialize for Motility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut text = String::new();
        bitflags::parser::to_writer(self, &mut text).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Motility {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        bitflags::parser::from_str(&text).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Entity IDs — deterministic UUID v4
// ---------------------------------------------------------------------------

/// A UUID v4, generated deterministically from the engine PRNG.
///
/// Layout follows RFC 4122: 128 bits with version nibble (bits 48–51) set
/// to `0100` and variant bits (bits 64–65) set to `10`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityUuid([u8; 16]);

impl EntityUuid {
    /// Generate a deterministic UUID v4 from the engine PRNG.
    pub fn new_v4(rng: &mut GameRng) -> Self {
        let mut bytes = rng.next_128_bits();
        // Set version nibble (byte 6, upper nibble) to 0100.
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        // Set variant bits (byte 8, upper 2 bits) to 10.
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }

    /// Parse a UUID from its 8-4-4-4-12 hex string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        let hex: String = s.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for i in 0..16 {
            bytes[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// Custom serde: serialize as the 8-4-4-4-12 hex string so EntityUuid can be
// used as a JSON map key (serde_json requires string keys).
impl Serialize for EntityUuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityUuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EntityUuid::from_str(&s).ok_or_else(|| serde::de::Error::custom("invalid UUID format"))
    }
}

impl fmt::Debug for EntityUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityUuid({})", self)
    }
}

impl fmt::Display for EntityUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Standard 8-4-4-4-12 hex representation.
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3],
            b[4], b[5],
            b[6], b[7],
            b[8], b[9],
            b[10], b[11], b[12], b[13], b[14], b[15],
        )
    }
}

// ---------------------------------------------------------------------------
// Strongly-typed entity ID wrappers
// ---------------------------------------------------------------------------

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub EntityUuid);

        impl $name {
            pub fn new(rng: &mut GameRng) -> Self {
                Self(EntityUuid::new_v4(rng))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

entity_id!(/// Unique identifier for a monster.
MonsterId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_v4_version_and_variant_bits() {
        let mut rng = GameRng::new(42);
        for _ in 0..1000 {
            let uuid = EntityUuid::new_v4(&mut rng);
            let bytes = uuid.as_bytes();
            // Version nibble (byte 6 upper) must be 0x4_.
            assert_eq!(bytes[6] >> 4, 4, "UUID version must be 4");
            // Variant bits (byte 8 upper 2) must be 0b10.
            assert_eq!(bytes[8] >> 6, 2, "UUID variant must be RFC 4122");
        }
    }

    #[test]
    fn uuid_determinism() {
        let mut rng_a = GameRng::new(42);
        let mut rng_b = GameRng::new(42);
        for _ in 0..100 {
            assert_eq!(
                EntityUuid::new_v4(&mut rng_a),
                EntityUuid::new_v4(&mut rng_b)
            );
        }
    }

    #[test]
    fn monster_id_determinism() {
        let mut rng_a = GameRng::new(99);
        let mut rng_b = GameRng::new(99);
        assert_eq!(MonsterId::new(&mut rng_a), MonsterId::new(&mut rng_b));
    }

    #[test]
    fn uuid_display_format() {
        let mut rng = GameRng::new(42);
        let uuid = EntityUuid::new_v4(&mut rng);
        let s = uuid.to_string();
        // 8-4-4-4-12 hex = 32 hex chars + 4 dashes = 36 chars
        assert_eq!(s.len(), 36);
        assert_eq!(&s[8..9], "-");
        assert_eq!(&s[13..14], "-");
        assert_eq!(&s[18..19], "-");
        assert_eq!(&s[23..24], "-");
    }

    #[test]
    fn uuid_serialization_roundtrip() {
        let mut rng = GameRng::new(42);
        let uuid = EntityUuid::new_v4(&mut rng);
        let json = serde_json::to_string(&uuid).unwrap();
        let restored: EntityUuid = serde_json::from_str(&json).unwrap();
        assert_eq!(uuid, restored);
    }

    #[test]
    fn pos_distances() {
        let a = Pos::new(0, 0);
        let b = Pos::new(3, 4);
        assert_eq!(a.chebyshev_distance(b), 4);
        assert_eq!(b.chebyshev_distance(a), 4);
        assert_eq!(a.manhattan_distance(b), 7);
    }

    #[test]
    fn pos_ordering() {
        // Verify Pos has a total order (needed for BTreeMap keys).
        let a = Pos::new(0, 0);
        let b = Pos::new(1, 0);
        assert!(a < b);
    }

    #[test]
    fn direction_deltas_are_unit_king_moves() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            assert!(dx.abs() <= 1 && dy.abs() <= 1, "{dir:?} delta too large");
            assert!(dx != 0 || dy != 0, "{dir:?} delta must not be zero");
            assert_eq!(Direction::from_delta(dx, dy), Some(dir));
        }
    }

    #[test]
    fn direction_opposite_is_involution() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            let (dx, dy) = dir.delta();
            let (ox, oy) = dir.opposite().delta();
            assert_eq!((dx, dy), (-ox, -oy), "{dir:?} opposite delta mismatch");
        }
    }

    #[test]
    fn direction_rotation_walks_the_ring() {
        for dir in Direction::ALL {
            assert_eq!(dir.rotate_left_45().rotate_right_45(), dir);
        }
        // Eight right turns come back around.
        let mut dir = Direction::North;
        for _ in 0..8 {
            dir = dir.rotate_right_45();
        }
        assert_eq!(dir, Direction::North);
    }

    #[test]
    fn pos_step_matches_direction_to() {
        let origin = Pos::new(5, 5);
        for dir in Direction::ALL {
            let stepped = origin.step(dir);
            assert_eq!(origin.direction_to(stepped), Some(dir));
        }
        assert_eq!(origin.direction_to(origin), None);
    }

    #[test]
    fn motility_overlap() {
        let tile = Motility::WALK | Motility::FLY;
        assert!(tile.allows(Motility::WALK));
        assert!(tile.allows(Motility::WALK | Motility::SWIM));
        assert!(!tile.allows(Motility::SWIM));
        assert!(!tile.allows(Motility::empty()), "empty mask enters nothing");
        assert!(!Motility::empty().allows(Motility::WALK));
    }

    #[test]
    fn motility_serializes_as_flag_names() {
        let mask = Motility::WALK | Motility::FLY;
        let json = serde_json::to_string(&mask).unwrap();
        assert_eq!(json, r#""WALK | FLY""#);
        let restored: Motility = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, mask);
        // Single flags and the empty mask survive too.
        let walk: Motility = serde_json::from_str(r#""WALK""#).unwrap();
        assert_eq!(walk, Motility::WALK);
        let none: Motility =
            serde_json::from_str(&serde_json::to_string(&Motility::empty()).unwrap()).unwrap();
        assert_eq!(none, Motility::empty());
    }

    #[test]
    fn motility_rejects_unknown_flag_names() {
        let parsed: Result<Motility, _> = serde_json::from_str(r#""WALK | BURROW""#);
        assert!(parsed.is_err());
    }
}
