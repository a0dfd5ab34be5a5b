//! Busy-interval timeline for one channel or one die.
//!
//! Grounded in `original_source/PAL2.h`'s `TimeSlot` / `ChFreeSlots` /
//! `DieFreeSlots`: rather than a flat sorted `Vec` of reservations (which
//! makes every insert an O(n) shift), intervals live in an arena
//! (`Vec<TimelineNode>`) linked in start-tick order via `prev`/`next`
//! `NodeId`s, with a `BTreeMap<u64, NodeId>` keyed by start tick so a probe
//! for "first candidate gap at or after tick T" is a single `range` lookup
//! instead of a linear scan. `flush` drops a prefix of fully-past intervals
//! without renumbering anything after it; freed arena slots go on a reuse
//! list instead.

use std::collections::BTreeMap;

/// Index into the arena. Stable for the node's lifetime; never reused while
/// the node is live, but recycled once the node is dropped by [`Timeline::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

#[derive(Debug, Clone, Copy)]
struct TimelineNode {
    start: u64,
    end: u64,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

/// An ordered set of non-overlapping `[start, end)` busy intervals.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    arena: Vec<Option<TimelineNode>>,
    free_arena_slots: Vec<NodeId>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    /// Every live node's start tick, for bisecting to the first candidate
    /// gap at or after a given tick.
    starts: BTreeMap<u64, NodeId>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, id: NodeId) -> &TimelineNode {
        self.arena[id.0 as usize]
            .as_ref()
            .expect("NodeId referenced a freed arena slot")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TimelineNode {
        self.arena[id.0 as usize]
            .as_mut()
            .expect("NodeId referenced a freed arena slot")
    }

    /// The earliest tick `>= earliest` at which an interval of length `len`
    /// fits without overlapping any existing busy interval.
    pub fn find_free_slot(&self, earliest: u64, len: u64) -> u64 {
        if len == 0 {
            return earliest;
        }

        // Predecessor: the last node whose start is <= earliest. If its
        // interval extends past `earliest`, the candidate must move past it.
        let mut candidate = earliest;
        let mut cursor = self
            .starts
            .range(..=earliest)
            .next_back()
            .map(|(_, id)| *id);

        if let Some(id) = cursor {
            let n = self.node(id);
            if candidate < n.end {
                candidate = n.end;
            }
        }

        // Walk forward from the node at or after the predecessor, closing
        // gaps until one is wide enough.
        cursor = match cursor {
            Some(id) => self.node(id).next,
            None => self.head,
        };

        loop {
            match cursor {
                None => return candidate,
                Some(id) => {
                    let n = self.node(id);
                    if candidate + len <= n.start {
                        return candidate;
                    }
                    candidate = n.end;
                    cursor = n.next;
                }
            }
        }
    }

    /// Reserve `[start, end)`. Caller must ensure the range does not overlap
    /// any existing interval (normally by using a `start` returned from
    /// [`Timeline::find_free_slot`]). Contiguous neighbors are merged so the
    /// arena doesn't accumulate a node per reservation indefinitely.
    pub fn insert(&mut self, start: u64, end: u64) {
        debug_assert!(start <= end);
        if start == end {
            return;
        }

        // Merge with an immediately-preceding node that ends exactly at `start`.
        let pred = self
            .starts
            .range(..start)
            .next_back()
            .map(|(_, id)| *id)
            .filter(|id| self.node(*id).end == start);

        // Merge with an immediately-following node that starts exactly at `end`.
        let succ = self
            .starts
            .range(end..)
            .next()
            .map(|(_, id)| *id)
            .filter(|id| self.node(*id).start == end);

        match (pred, succ) {
            (Some(p), Some(s)) => {
                // Absorb `s` into `p`, then unlink `s`.
                let s_end = self.node(s).end;
                let s_next = self.node(s).next;
                {
                    let pn = self.node_mut(p);
                    pn.end = s_end;
                    pn.next = s_next;
                }
                if let Some(next) = s_next {
                    self.node_mut(next).prev = Some(p);
                } else {
                    self.tail = Some(p);
                }
                self.starts.remove(&self.node(s).start);
                self.free_node(s);
            }
            (Some(p), None) => {
                self.node_mut(p).end = end;
            }
            (None, Some(s)) => {
                let old_start = self.node(s).start;
                self.starts.remove(&old_start);
                self.node_mut(s).start = start;
                self.starts.insert(start, s);
            }
            (None, None) => {
                self.insert_new_node(start, end);
            }
        }
    }

    fn insert_new_node(&mut self, start: u64, end: u64) {
        let prev = self.starts.range(..start).next_back().map(|(_, id)| *id);
        let next = match prev {
            Some(p) => self.node(p).next,
            None => self.head,
        };

        let id = self.alloc_node(TimelineNode {
            start,
            end,
            prev,
            next,
        });

        match prev {
            Some(p) => self.node_mut(p).next = Some(id),
            None => self.head = Some(id),
        }
        match next {
            Some(n) => self.node_mut(n).prev = Some(id),
            None => self.tail = Some(id),
        }
        self.starts.insert(start, id);
    }

    fn alloc_node(&mut self, node: TimelineNode) -> NodeId {
        if let Some(id) = self.free_arena_slots.pop() {
            self.arena[id.0 as usize] = Some(node);
            id
        } else {
            let id = NodeId(self.arena.len() as u32);
            self.arena.push(Some(node));
            id
        }
    }

    fn free_node(&mut self, id: NodeId) {
        self.arena[id.0 as usize] = None;
        self.free_arena_slots.push(id);
    }

    /// Drop every interval that ends at or before `current_tick`. The
    /// caller calls this periodically (e.g. once per completed request) to
    /// bound arena growth; it never renumbers surviving nodes.
    pub fn flush(&mut self, current_tick: u64) {
        while let Some(id) = self.head {
            let (end, next, start) = {
                let n = self.node(id);
                (n.end, n.next, n.start)
            };
            if end > current_tick {
                break;
            }
            self.head = next;
            match next {
                Some(n) => self.node_mut(n).prev = None,
                None => self.tail = None,
            }
            self.starts.remove(&start);
            self.free_node(id);
        }
    }

    /// Number of live busy intervals.
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}
