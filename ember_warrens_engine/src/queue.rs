// Bucket priority queue for small-integer path costs.
//
// Grid searches in this engine (see `flow.rs`, `reachability.rs`) expand
// frontiers whose costs are small integers that only ever grow. That makes a
// binary heap overkill: a `Vec` of FIFO buckets indexed by cost, plus a
// cursor remembering the lowest bucket that might still hold entries, pops
// in O(1) amortized. The cursor never rewinds between resets, so a full
// drain scans each bucket once — O(buckets + items) total.
//
// There is no decrease-key. A consumer that finds a cheaper cost for an
// element simply adds a duplicate at the new cost and skips the stale entry
// when it surfaces (its recorded cost no longer matches).
//
// See also: `flow.rs` for the lazy Dijkstra built on this queue,
// `reachability.rs` which reuses it for repair floods.
//
// **Critical constraint: determinism.** Equal-cost entries pop in insertion
// order (FIFO within a bucket). Tie-breaking never depends on memory layout.

use std::collections::VecDeque;

/// FIFO-per-cost priority queue. Buckets grow on demand as higher costs
/// are added.
#[derive(Clone, Debug, Default)]
pub struct BucketQueue<T> {
    buckets: Vec<VecDeque<T>>,
    /// Lowest bucket index that may be non-empty. Monotone between resets.
    cursor: usize,
    len: usize,
}

impl<T> BucketQueue<T> {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            cursor: 0,
            len: 0,
        }
    }

    /// Create a queue with buckets preallocated for costs in `0..=max_cost`.
    pub fn with_capacity(max_cost: usize) -> Self {
        let mut buckets = Vec::with_capacity(max_cost + 1);
        buckets.resize_with(max_cost + 1, VecDeque::new);
        Self {
            buckets,
            cursor: 0,
            len: 0,
        }
    }

    /// Empty every bucket and rewind the cursor, keeping allocations.
    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.cursor = 0;
        self.len = 0;
    }

    /// Push `value` at `cost`, behind earlier entries of the same cost.
    ///
    /// Costs must not regress below the last popped cost — the cursor has
    /// already moved past those buckets and the entry would never pop.
    pub fn add(&mut self, value: T, cost: usize) {
        debug_assert!(
            cost >= self.cursor,
            "bucket queue cost {cost} regressed below cursor {}",
            self.cursor
        );
        if cost >= self.buckets.len() {
            self.buckets.resize_with(cost + 1, VecDeque::new);
        }
        self.buckets[cost].push_back(value);
        self.len += 1;
    }

    /// Pop the lowest-cost entry, advancing the cursor past empty buckets.
    /// Returns the value and the cost it was stored at.
    pub fn remove_next(&mut self) -> Option<(T, usize)> {
        while self.cursor < self.buckets.len() {
            if let Some(value) = self.buckets[self.cursor].pop_front() {
                self.len -= 1;
                return Some((value, self.cursor));
            }
            self.cursor += 1;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
