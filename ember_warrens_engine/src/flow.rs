// Lazy, memoized single-source shortest-cost search ("flow").
//
// A `Flow` spreads outward from an origin cell, assigning each discovered
// cell the cost of the cheapest path back to the origin. Expansion is lazy:
// cells are processed only as far as queries demand, and everything already
// computed is memoized, so asking three questions of the same flow pays for
// the frontier once. A monster deciding where to step this turn usually
// touches a handful of cells, not the whole stage.
//
// Passability and step pricing live behind the single `FlowCost` hook.
// `MotilityFlow` is the everyday instantiation: unit step cost, enterability
// from the overlap of tile and monster motility masks, with optional
// occupied-cell and hazard avoidance and a bounding window.
//
// A flow borrows the stage for its whole lifetime. That is deliberate: the
// memoized costs describe one frozen snapshot of the grid, and the borrow
// checker stops anyone from editing tiles mid-decision.
//
// See also: `queue.rs` for the bucket frontier, `behavior.rs` for the
// decision routines that consume `direction_to_best_where`,
// `reachability.rs` for the persistent variant that survives grid edits.
//
// **Critical constraint: determinism.** Cells are expanded in
// `Direction::ALL` order and ties between equally cheap results are broken
// through the caller's `GameRng`, never through iteration order of a hash
// container.

use crate::prng::GameRng;
use crate::queue::BucketQueue;
use crate::stage::Stage;
use crate::types::{Direction, Motility, Pos};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Cell sentinel: not yet reached by the expansion.
const UNKNOWN: i32 = -2;
/// Cell sentinel: reached and found impassable or unreachable.
const UNREACHABLE: i32 = -1;

/// The one abstract hook of a flow: the cost to enter a cell, or `None`
/// when the cell cannot be entered at all.
pub trait FlowCost {
    /// Price of stepping into `pos` from a neighbor whose path cost is
    /// `parent_cost`. `diagonal` marks king moves off the cardinal axes.
    fn tile_cost(
        &self,
        stage: &Stage,
        parent_cost: u32,
        pos: Pos,
        diagonal: bool,
    ) -> Option<u32>;
}

/// Rectangular search window in stage coordinates.
#[derive(Clone, Copy, Debug)]
struct Window {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
}

impl Window {
    /// The whole stage.
    fn full(stage: &Stage) -> Self {
        Self {
            left: 0,
            top: 0,
            width: stage.width as i32,
            height: stage.height as i32,
        }
    }

    /// The square of Chebyshev radius `radius` around `center`, clamped to
    /// the stage bounds.
    fn around(stage: &Stage, center: Pos, radius: u32) -> Self {
        let r = radius as i32;
        let left = (center.x - r).max(0);
        let top = (center.y - r).max(0);
        let right = (center.x + r).min(stage.width as i32 - 1);
        let bottom = (center.y + r).min(stage.height as i32 - 1);
        Self {
            left,
            top,
            width: (right - left + 1).max(0),
            height: (bottom - top + 1).max(0),
        }
    }

    fn contains(&self, pos: Pos) -> bool {
        pos.x >= self.left
            && pos.y >= self.top
            && pos.x < self.left + self.width
            && pos.y < self.top + self.height
    }

    fn index(&self, pos: Pos) -> Option<usize> {
        if self.contains(pos) {
            Some(((pos.y - self.top) * self.width + (pos.x - self.left)) as usize)
        } else {
            None
        }
    }

    fn cell_count(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }
}

/// Lazy memoized Dijkstra from a single origin. See the module header.
pub struct Flow<'a, C: FlowCost> {
    stage: &'a Stage,
    cost: C,
    origin: Pos,
    window: Window,
    /// Per-window-cell path cost, or one of the sentinels above.
    cells: Vec<i32>,
    frontier: BucketQueue<Pos>,
    /// Cells in the order their cost was fixed. The origin is not included.
    found: Vec<Pos>,
}

impl<'a, C: FlowCost> Flow<'a, C> {
    /// Build a flow from `origin` using `cost` as the passability hook.
    /// `max_distance` bounds the search window (and therefore memory) to a
    /// square of that Chebyshev radius; `None` searches the whole stage.
    pub fn with_cost(stage: &'a Stage, origin: Pos, cost: C, max_distance: Option<u32>) -> Self {
        let window = match max_distance {
            Some(radius) => Window::around(stage, origin, radius),
            None => Window::full(stage),
        };
        let mut flow = Self {
            stage,
            cost,
            origin,
            window,
            cells: vec![UNKNOWN; window.cell_count()],
            frontier: BucketQueue::with_capacity(
                (window.width + window.height).max(0) as usize,
            ),
            found: Vec::new(),
        };
        // The origin is always settled at cost zero, even standing on a
        // tile the monster could not step into. An origin outside the
        // window leaves the flow empty.
        if let Some(idx) = flow.window.index(origin) {
            flow.cells[idx] = 0;
            flow.frontier.add(origin, 0);
        }
        flow
    }

    pub fn origin(&self) -> Pos {
        self.origin
    }

    /// The recorded state of `pos`: a cost, or a sentinel. Out-of-window
    /// positions read as unknown.
    fn cell(&self, pos: Pos) -> i32 {
        self.window.index(pos).map_or(UNKNOWN, |idx| self.cells[idx])
    }

    /// The cheapest path cost from the origin to `pos`, expanding the flow
    /// as far as needed. `None` if `pos` is unreachable or outside the
    /// search window.
    pub fn cost_at(&mut self, pos: Pos) -> Option<u32> {
        let idx = self.window.index(pos)?;
        while self.cells[idx] == UNKNOWN {
            if self.expand_next().is_none() {
                break;
            }
        }
        let cost = self.cells[idx];
        if cost >= 0 { Some(cost as u32) } else { None }
    }

    /// Every reachable cell except the origin, in non-decreasing cost
    /// order. The iterator is restartable: it replays memoized results
    /// first, then resumes expansion exactly where earlier queries stopped.
    pub fn reachable(&mut self) -> Reachable<'_, 'a, C> {
        Reachable {
            flow: self,
            index: 0,
        }
    }

    /// The nearest cell satisfying `predicate`. Among equally near
    /// candidates one is picked uniformly at random.
    pub fn best_where(
        &mut self,
        rng: &mut GameRng,
        predicate: impl Fn(Pos) -> bool,
    ) -> Option<Pos> {
        let best = self.find_all_best(&predicate);
        rng.pick(&best).copied()
    }

    /// The first step a monster at the origin should take toward the
    /// nearest cell satisfying `predicate`.
    ///
    /// All nearest candidates are found, every one of their optimal paths
    /// is walked back to the origin, and each distinct first-step direction
    /// lying on such a path is collected once; the result is picked
    /// uniformly from that list. A direction shared by many equally short
    /// paths therefore carries no extra weight over one covering a single
    /// path.
    pub fn direction_to_best_where(
        &mut self,
        rng: &mut GameRng,
        predicate: impl Fn(Pos) -> bool,
    ) -> Option<Direction> {
        let best = self.find_all_best(&predicate);
        if best.is_empty() {
            return None;
        }
        let directions = self.directions_to(&best);
        rng.pick(&directions).copied()
    }

    /// Pop and expand the next frontier cell, discovering its unknown
    /// neighbors. Returns the expanded cell, or `None` when the frontier
    /// is exhausted.
    fn expand_next(&mut self) -> Option<Pos> {
        let (pos, cost) = self.frontier.remove_next()?;
        for dir in Direction::ALL {
            let next = pos.step(dir);
            let Some(idx) = self.window.index(next) else {
                continue;
            };
            if self.cells[idx] != UNKNOWN {
                continue;
            }
            match self
                .cost
                .tile_cost(self.stage, cost as u32, next, dir.is_diagonal())
            {
                None => self.cells[idx] = UNREACHABLE,
                Some(enter) => {
                    let total = cost as u32 + enter;
                    self.cells[idx] = total as i32;
                    self.frontier.add(next, total as usize);
                    self.found.push(next);
                }
            }
        }
        Some(pos)
    }

    /// All cells satisfying `predicate` at the lowest satisfying cost.
    /// Expands only far enough to prove no cheaper candidate exists.
    fn find_all_best(&mut self, predicate: &impl Fn(Pos) -> bool) -> SmallVec<[Pos; 8]> {
        let mut best: SmallVec<[Pos; 8]> = SmallVec::new();
        let mut best_cost: Option<i32> = None;
        let mut index = 0;
        loop {
            while index >= self.found.len() {
                if self.expand_next().is_none() {
                    return best;
                }
            }
            let pos = self.found[index];
            index += 1;
            let cost = self.cell(pos);
            if let Some(found_cost) = best_cost {
                if cost > found_cost {
                    return best;
                }
            }
            if predicate(pos) {
                best_cost = Some(cost);
                best.push(pos);
            }
        }
    }

    /// Walk each target's optimal paths back to the origin, collecting the
    /// first-step direction whenever a walk touches an origin neighbor.
    fn directions_to(&self, targets: &[Pos]) -> SmallVec<[Direction; 8]> {
        let mut result: SmallVec<[Direction; 8]> = SmallVec::new();
        let mut walked: FxHashSet<Pos> = FxHashSet::default();
        let mut stack: Vec<Pos> = targets.to_vec();

        while let Some(pos) = stack.pop() {
            if !walked.insert(pos) {
                continue;
            }
            let pos_cost = self.cell(pos);
            for dir in Direction::ALL {
                let here = pos.step(dir);
                if here == self.origin {
                    // `dir` points from `pos` back at the origin, so the
                    // forward path leaves the origin the opposite way.
                    result.push(dir.opposite());
                } else {
                    let here_cost = self.cell(here);
                    if here_cost >= 0 && here_cost < pos_cost {
                        stack.push(here);
                    }
                }
            }
        }
        result
    }
}

/// Iterator over a flow's reachable cells. See [`Flow::reachable`].
pub struct Reachable<'f, 'a, C: FlowCost> {
    flow: &'f mut Flow<'a, C>,
    index: usize,
}

impl<C: FlowCost> Iterator for Reachable<'_, '_, C> {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        while self.index >= self.flow.found.len() {
            self.flow.expand_next()?;
        }
        let pos = self.flow.found[self.index];
        self.index += 1;
        Some(pos)
    }
}

// ---------------------------------------------------------------------------
// Motility flow — the concrete flow monsters use
// ---------------------------------------------------------------------------

/// Options for [`MotilityFlow::new`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FlowOptions {
    /// Treat occupied cells as impassable.
    pub avoid_occupied: bool,
    /// Treat tiles whose hazard endangers this motility as impassable.
    /// A flyer crossing lava is not avoiding anything.
    pub avoid_hazard: bool,
    /// Bound the search to a square window of this Chebyshev radius, and
    /// cap accumulated path cost at the same value.
    pub max_distance: Option<u32>,
}

/// Unit-cost passability from motility mask overlap.
#[derive(Clone, Copy, Debug)]
pub struct MotilityCost {
    motility: Motility,
    avoid_occupied: bool,
    avoid_hazard: bool,
    max_distance: Option<u32>,
}

impl FlowCost for MotilityCost {
    fn tile_cost(
        &self,
        stage: &Stage,
        parent_cost: u32,
        pos: Pos,
        _diagonal: bool,
    ) -> Option<u32> {
        // The window only bounds the search area; a winding path inside
        // it can still pile up cost, so the path length is capped here.
        if self.max_distance.is_some_and(|limit| parent_cost >= limit) {
            return None;
        }
        let tile = stage.tile(pos);
        if !tile.can_enter(self.motility) {
            return None;
        }
        if self.avoid_hazard && tile.endangers(self.motility) {
            return None;
        }
        if self.avoid_occupied && stage.is_occupied(pos) {
            return None;
        }
        Some(1)
    }
}

/// The everyday flow: every step costs one, passability is the motility
/// overlap, with optional occupied/hazard avoidance.
pub type MotilityFlow<'a> = Flow<'a, MotilityCost>;

impl<'a> MotilityFlow<'a> {
    pub fn new(stage: &'a Stage, origin: Pos, motility: Motility, options: FlowOptions) -> Self {
        Flow::with_cost(
            stage,
            origin,
            MotilityCost {
                motility,
                avoid_occupied: options.avoid_occupied,
                avoid_hazard: options.avoid_hazard,
                max_distance: options.max_distance,
            },
            options.max_distance,
        )
    }
}
