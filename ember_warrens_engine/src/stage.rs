// Dense 2D tile grid for the dungeon stage.
//
// The stage is stored as a flat `Vec<Tile>` indexed by `x + y * width`,
// giving O(1) read/write access. Out-of-bounds reads return a solid wall;
// out-of-bounds writes are no-ops. Two parallel overlays share the same
// indexing: occupancy (which monster stands where) and ambient noise
// (written by the embedding game each turn, read by monster hearing).
//
// Also provides `line()` / `line_of_sight()`, a Bresenham tile walk used
// for vision checks, combat witness filtering, and the direct melee
// approach in `behavior.rs`. Intermediate opaque tiles block sight; the
// endpoints themselves never do (a monster standing in a doorway is still
// visible through it).
//
// The engine never builds or persists stages — the embedder owns the grid
// and passes it by reference into every decision call.
//
// See also: `flow.rs` and `reachability.rs` which search over the grid,
// `mood.rs` which reads illumination and noise for perception.
//
// **Critical constraint: determinism.** All tile iteration is index-ordered.
// No hash-keyed storage anywhere position order can leak into behavior.

use crate::types::{MonsterId, Motility, Pos};

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

/// One grid cell: which movement modes may enter, whether it harms
/// occupants, whether it blocks sight, and how brightly it is lit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    /// Movement modes permitted to enter this tile. Empty = solid.
    pub motility: Motility,
    /// Damages monsters standing on it (lava, acid pools, traps).
    pub hazard: bool,
    /// Blocks line of sight.
    pub opaque: bool,
    /// Light level in [0, 1]. Unlit tiles hide their occupants from
    /// vision-based detection.
    pub illumination: f32,
}

impl Tile {
    /// Ordinary lit floor: walkable and flyable.
    pub fn floor() -> Self {
        Self {
            motility: Motility::WALK | Motility::FLY,
            hazard: false,
            opaque: false,
            illumination: 1.0,
        }
    }

    /// Solid rock: enterable by nothing, blocks sight.
    pub fn wall() -> Self {
        Self {
            motility: Motility::empty(),
            hazard: false,
            opaque: true,
            illumination: 0.0,
        }
    }

    /// A closed door: only door-capable monsters pass, blocks sight.
    pub fn closed_door() -> Self {
        Self {
            motility: Motility::DOOR,
            hazard: false,
            opaque: true,
            illumination: 0.0,
        }
    }

    /// Open water: swimmers and flyers only.
    pub fn water() -> Self {
        Self {
            motility: Motility::SWIM | Motility::FLY,
            hazard: false,
            opaque: false,
            illumination: 1.0,
        }
    }

    /// True when a monster with `capability` may enter.
    pub fn can_enter(&self, capability: Motility) -> bool {
        self.motility.allows(capability)
    }

    /// True when standing here hurts a monster with `capability`. Flying
    /// or swimming over a hazard is safe when the tile admits that mode;
    /// a breed reduced to walking across it is exposed.
    pub fn endangers(&self, capability: Motility) -> bool {
        self.hazard
            && !(self.motility & capability).intersects(Motility::FLY | Motility::SWIM)
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Dense 2D tile grid plus occupancy and noise overlays.
#[derive(Clone, Debug, Default)]
pub struct Stage {
    /// Flat storage: index = x + y * width.
    tiles: Vec<Tile>,
    occupants: Vec<Option<MonsterId>>,
    noise: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl Stage {
    /// Create a stage with every tile set to `fill`.
    pub fn new(width: u32, height: u32, fill: Tile) -> Self {
        let total = (width as usize) * (height as usize);
        Self {
            tiles: vec![fill; total],
            occupants: vec![None; total],
            noise: vec![0.0; total],
            width,
            height,
        }
    }

    /// Create a stage of lit floor ringed by a one-tile wall border.
    /// The common test and benchmark fixture.
    pub fn open(width: u32, height: u32) -> Self {
        let mut stage = Self::new(width, height, Tile::floor());
        for x in 0..width as i32 {
            stage.set_tile(Pos::new(x, 0), Tile::wall());
            stage.set_tile(Pos::new(x, height as i32 - 1), Tile::wall());
        }
        for y in 0..height as i32 {
            stage.set_tile(Pos::new(0, y), Tile::wall());
            stage.set_tile(Pos::new(width as i32 - 1, y), Tile::wall());
        }
        stage
    }

    /// Check whether a position is within bounds.
    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Convert a position to a flat index. Returns `None` if out of bounds.
    fn index(&self, pos: Pos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.x as usize + pos.y as usize * self.width as usize)
        } else {
            None
        }
    }

    /// Read a tile. Returns a solid wall for out-of-bounds positions.
    pub fn tile(&self, pos: Pos) -> Tile {
        self.index(pos)
            .map(|i| self.tiles[i])
            .unwrap_or_else(Tile::wall)
    }

    /// Write a tile. No-op for out-of-bounds positions.
    pub fn set_tile(&mut self, pos: Pos, tile: Tile) {
        if let Some(i) = self.index(pos) {
            self.tiles[i] = tile;
        }
    }

    /// The monster standing on `pos`, if any.
    pub fn occupant(&self, pos: Pos) -> Option<MonsterId> {
        self.index(pos).and_then(|i| self.occupants[i])
    }

    pub fn is_occupied(&self, pos: Pos) -> bool {
        self.occupant(pos).is_some()
    }

    /// Record a monster on `pos`. No-op out of bounds.
    pub fn set_occupant(&mut self, pos: Pos, id: MonsterId) {
        if let Some(i) = self.index(pos) {
            self.occupants[i] = Some(id);
        }
    }

    /// Clear the occupant of `pos`. No-op out of bounds.
    pub fn clear_occupant(&mut self, pos: Pos) {
        if let Some(i) = self.index(pos) {
            self.occupants[i] = None;
        }
    }

    /// Ambient noise at `pos`. Out of bounds is silent.
    pub fn noise_at(&self, pos: Pos) -> f32 {
        self.index(pos).map(|i| self.noise[i]).unwrap_or(0.0)
    }

    /// Write the noise level at `pos`. No-op out of bounds.
    pub fn set_noise(&mut self, pos: Pos, level: f32) {
        if let Some(i) = self.index(pos) {
            self.noise[i] = level;
        }
    }

    /// Zero the whole noise overlay. The embedder calls this before
    /// re-propagating each turn's sounds.
    pub fn clear_noise(&mut self) {
        self.noise.fill(0.0);
    }

    pub fn illumination_at(&self, pos: Pos) -> f32 {
        self.tile(pos).illumination
    }

    /// True when a monster with `capability` may enter the tile at `pos`.
    pub fn can_enter(&self, pos: Pos, capability: Motility) -> bool {
        self.tile(pos).can_enter(capability)
    }

    /// Adjacent cells a monster with `capability` could step into right
    /// now: enterable and unoccupied. Yields in compass order.
    pub fn open_neighbors(
        &self,
        pos: Pos,
        capability: Motility,
    ) -> impl Iterator<Item = Pos> + '_ {
        pos.neighbors()
            .filter(move |&n| self.can_enter(n, capability) && !self.is_occupied(n))
    }

    /// Bresenham sight test: no opaque tile strictly between `from` and
    /// `to`. The endpoints themselves never block.
    pub fn line_of_sight(&self, from: Pos, to: Pos) -> bool {
        for pos in line(from, to) {
            if pos == to {
                return true;
            }
            if self.tile(pos).opaque {
                return false;
            }
        }
        // from == to yields an empty line.
        true
    }
}

// ---------------------------------------------------------------------------
// Bresenham lines
// ---------------------------------------------------------------------------

/// Walk the Bresenham line from `from` (exclusive) to `to` (inclusive).
/// Every yielded position is one king move from the previous one.
pub fn line(from: Pos, to: Pos) -> LineIter {
    LineIter {
        pos: from,
        target: to,
        dx: (to.x - from.x).abs(),
        dy: -(to.y - from.y).abs(),
        sx: if from.x < to.x { 1 } else { -1 },
        sy: if from.y < to.y { 1 } else { -1 },
        err: (to.x - from.x).abs() - (to.y - from.y).abs(),
    }
}

/// Iterator over the positions of a Bresenham line. See [`line`].
#[derive(Clone, Debug)]
pub struct LineIter {
    pos: Pos,
    target: Pos,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
}

impl Iterator for LineIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        if self.pos == self.target {
            return None;
        }
        let e2 = 2 * self.err;
        if e2 >= self.dy {
            self.err += self.dy;
            self.pos.x += self.sx;
        }
        if e2 <= self.dx {
            self.err += self.dx;
            self.pos.y += self.sy;
        }
        Some(self.pos)
    }
}
