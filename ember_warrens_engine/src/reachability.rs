// Persistent, repairable BFS reachability map.
//
// Answers "can the origin still reach this cell, and in how many steps?"
// while cells toggle between open and blocked. A full BFS runs once at
// construction; after that, `fill()` blocks one cell and repairs only the
// region whose shortest paths actually ran through it, and `undo_fill()`
// rolls the most recent fill back from a change log. Dungeon-editing code
// probing "would sealing this tile disconnect anything?" pays for the
// probe, not for the whole grid.
//
// Distances count cardinal steps only. Sentinels: `-1` unreachable, `-2`
// transiently unknown while a repair is in flight (never visible between
// calls).
//
// The map snapshots passability (motility overlap) at construction and
// owns a blocked overlay on top of it; grid edits flow through
// `fill`/`undo_fill` rather than through live stage reads, so the map
// never silently drifts out of sync with queries made between edits.
//
// See also: `queue.rs` for the bucket frontier reused by the repair flood,
// `flow.rs` for the one-shot search this structure amortizes.
//
// **Critical constraint: determinism.** Floods expand in cardinal order
// through a FIFO bucket queue. Hash sets appear only for membership tests
// whose iteration order is never observed.

use crate::queue::BucketQueue;
use crate::stage::Stage;
use crate::types::{Motility, Pos};
use rustc_hash::FxHashSet;

const UNKNOWN: i32 = -2;
const UNREACHABLE: i32 = -1;

/// BFS distance map from a fixed origin that survives cell blocking.
#[derive(Clone, Debug)]
pub struct Reachability {
    origin: Pos,
    width: u32,
    height: u32,
    /// Construction-time passability per cell (motility overlap).
    passable: Vec<bool>,
    /// Cells blocked by `fill` since construction.
    blocked: Vec<bool>,
    /// Cardinal-step distances, or a sentinel.
    distances: Vec<i32>,
    /// True between a `fill` and its matching `undo_fill`.
    armed: bool,
    /// The most recent fill's cell and its prior blocked bit.
    undo_filled: Option<(Pos, bool)>,
    /// Distances overwritten by the most recent fill, in write order.
    undo_distances: Vec<(Pos, i32)>,
}

impl Reachability {
    /// Build the map with a full BFS from `origin` over tiles a monster of
    /// the given `motility` may enter. The origin itself always gets
    /// distance zero, whatever its tile.
    pub fn new(stage: &Stage, origin: Pos, motility: Motility) -> Self {
        let width = stage.width;
        let height = stage.height;
        let total = (width as usize) * (height as usize);
        let mut passable = vec![false; total];
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let pos = Pos::new(x, y);
                passable[(x + y * width as i32) as usize] =
                    stage.tile(pos).can_enter(motility);
            }
        }
        let mut map = Self {
            origin,
            width,
            height,
            passable,
            blocked: vec![false; total],
            distances: vec![UNREACHABLE; total],
            armed: false,
            undo_filled: None,
            undo_distances: Vec::new(),
        };
        map.recompute();
        map
    }

    pub fn origin(&self) -> Pos {
        self.origin
    }

    /// True when the origin can reach `pos`.
    pub fn is_reachable(&self, pos: Pos) -> bool {
        self.index(pos)
            .is_some_and(|idx| self.distances[idx] >= 0)
    }

    /// Cardinal-step distance from the origin, or `None` if unreachable.
    pub fn distance(&self, pos: Pos) -> Option<u32> {
        let idx = self.index(pos)?;
        let d = self.distances[idx];
        if d >= 0 { Some(d as u32) } else { None }
    }

    /// Block `pos` and repair the distances it carried. The change is
    /// logged; the next `undo_fill` reverts it, and the next `fill`
    /// overwrites the log, making this fill permanent.
    pub fn fill(&mut self, pos: Pos) {
        self.armed = true;
        self.undo_filled = None;
        self.undo_distances.clear();

        let Some(idx) = self.index(pos) else {
            // Out of bounds: nothing to do, but the undo pairing stays
            // intact for callers that fill/undo unconditionally.
            return;
        };
        self.undo_filled = Some((pos, self.blocked[idx]));
        self.blocked[idx] = true;

        let filled_distance = self.distances[idx];
        self.undo_distances.push((pos, filled_distance));
        if filled_distance < 0 {
            // Already unreachable; bookkeeping only.
            return;
        }
        self.distances[idx] = UNREACHABLE;

        // Flood outward from the filled cell, collecting every cell whose
        // shortest paths all ran through it: a neighbor one step further
        // out joins unless some neighbor outside the affected set still
        // offers a distance one step shorter.
        let mut affected: Vec<Pos> = Vec::new();
        let mut affected_set: FxHashSet<Pos> = FxHashSet::default();
        affected_set.insert(pos);
        let mut flood: BucketQueue<Pos> = BucketQueue::new();
        flood.add(pos, filled_distance as usize);
        while let Some((p, d)) = flood.remove_next() {
            for q in p.cardinal_neighbors() {
                let Some(qi) = self.index(q) else { continue };
                if self.distances[qi] != d as i32 + 1 || affected_set.contains(&q) {
                    continue;
                }
                let has_other_parent = q.cardinal_neighbors().any(|r| {
                    self.index(r).is_some_and(|ri| {
                        self.distances[ri] == d as i32 && !affected_set.contains(&r)
                    })
                });
                if has_other_parent {
                    continue;
                }
                affected_set.insert(q);
                affected.push(q);
                flood.add(q, d + 1);
            }
        }

        // The border: intact cells touching the affected region. Their
        // distances survive and reseed the repair.
        let mut border: Vec<Pos> = Vec::new();
        let mut border_set: FxHashSet<Pos> = FxHashSet::default();
        for &a in &affected {
            for b in a.cardinal_neighbors() {
                let Some(bi) = self.index(b) else { continue };
                if self.distances[bi] >= 0
                    && !affected_set.contains(&b)
                    && border_set.insert(b)
                {
                    border.push(b);
                }
            }
        }

        if border.is_empty() {
            // The filled cell was the region's only way in. Everything
            // behind it is now unreachable.
            for &a in &affected {
                if let Some(ai) = self.index(a) {
                    self.undo_distances.push((a, self.distances[ai]));
                    self.distances[ai] = UNREACHABLE;
                }
            }
            return;
        }

        // Clear the affected region to unknown, then BFS forward from the
        // border into it. Cells the flood never reassigns have lost their
        // last path and become unreachable.
        for &a in &affected {
            if let Some(ai) = self.index(a) {
                self.undo_distances.push((a, self.distances[ai]));
                self.distances[ai] = UNKNOWN;
            }
        }
        let mut repair: BucketQueue<Pos> = BucketQueue::new();
        for &b in &border {
            if let Some(bi) = self.index(b) {
                repair.add(b, self.distances[bi] as usize);
            }
        }
        while let Some((p, d)) = repair.remove_next() {
            for q in p.cardinal_neighbors() {
                let Some(qi) = self.index(q) else { continue };
                if self.distances[qi] != UNKNOWN {
                    continue;
                }
                if !self.passable[qi] || self.blocked[qi] {
                    continue;
                }
                self.distances[qi] = d as i32 + 1;
                repair.add(q, d + 1);
            }
        }
        for &a in &affected {
            if let Some(ai) = self.index(a) {
                if self.distances[ai] == UNKNOWN {
                    self.distances[ai] = UNREACHABLE;
                }
            }
        }
    }

    /// Revert the most recent `fill`, restoring the map bit for bit.
    /// Exactly one level of undo exists; calling this twice without an
    /// intervening fill is a programming error.
    pub fn undo_fill(&mut self) {
        debug_assert!(self.armed, "undo_fill without a matching fill");
        self.armed = false;
        if let Some((pos, was_blocked)) = self.undo_filled.take() {
            if let Some(idx) = self.index(pos) {
                self.blocked[idx] = was_blocked;
            }
        }
        while let Some((pos, old)) = self.undo_distances.pop() {
            if let Some(idx) = self.index(pos) {
                self.distances[idx] = old;
            }
        }
    }

    fn index(&self, pos: Pos) -> Option<usize> {
        if pos.x >= 0
            && pos.y >= 0
            && (pos.x as u32) < self.width
            && (pos.y as u32) < self.height
        {
            Some(pos.x as usize + pos.y as usize * self.width as usize)
        } else {
            None
        }
    }

    /// Full construction-time BFS. Cardinal steps only.
    fn recompute(&mut self) {
        self.distances.fill(UNREACHABLE);
        let Some(oi) = self.index(self.origin) else {
            return;
        };
        self.distances[oi] = 0;
        let mut frontier: BucketQueue<Pos> = BucketQueue::new();
        frontier.add(self.origin, 0);
        while let Some((p, d)) = frontier.remove_next() {
            for q in p.cardinal_neighbors() {
                let Some(qi) = self.index(q) else { continue };
                if self.distances[qi] != UNREACHABLE {
                    continue;
                }
                if !self.passable[qi] || self.blocked[qi] {
                    continue;
                }
                self.distances[qi] = d as i32 + 1;
                frontier.add(q, d + 1);
            }
        }
    }
}
