//! Breadth-first search over the flag network.
//!
//! Visited flags are marked by writing the current search id into their
//! `search_num` stamp, so starting a new search costs nothing regardless of
//! network size. The id comes from a [`SearchCounter`] owned by the world;
//! when the counter wraps around, all stamps are reset once so stale stamps
//! can never collide with a fresh id.

use crate::flag::Flag;
use crate::id::FlagId;
use crate::pos::Direction;
use crate::table::EntityTable;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub type FlagTable = EntityTable<FlagId, Flag>;

/// Hard cap on dequeues per search.
pub const SEARCH_MAX_DEPTH: usize = 0x10000;

/// Order in which neighbours are expanded.
pub const SEARCH_ORDER: [Direction; 6] = [
    Direction::Up,
    Direction::UpLeft,
    Direction::Left,
    Direction::Down,
    Direction::DownRight,
    Direction::Right,
];

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

/// Source of search ids. Persisted with the game globals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCounter {
    last: u16,
}

impl SearchCounter {
    pub fn new(last: u16) -> Self {
        Self { last }
    }

    /// The most recently issued id.
    pub fn value(&self) -> u16 {
        self.last
    }

    /// Issue a fresh, non-zero search id.
    pub fn next_id(&mut self, flags: &mut FlagTable) -> u16 {
        self.last = self.last.wrapping_add(1);
        if self.last == 0 {
            tracing::trace!(
                target: "settler::search",
                "search counter wrapped, resetting stamps"
            );
            for id in flags.allocated_ids(1) {
                flags.get_mut(id).search_num = 0;
            }
            self.last = 1;
        }
        self.last
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The callback accepted a flag.
    Found,
    /// Every reachable flag was visited.
    NotFound,
    /// The dequeue cap was hit; treated as not found.
    Aborted,
}

impl SearchOutcome {
    pub fn is_found(self) -> bool {
        self == SearchOutcome::Found
    }
}

/// One breadth-first search. Seed it with [`FlagSearch::add_source`] and
/// run it with [`FlagSearch::execute`].
#[derive(Debug)]
pub struct FlagSearch {
    id: u16,
    queue: VecDeque<FlagId>,
}

impl FlagSearch {
    pub fn new(counter: &mut SearchCounter, flags: &mut FlagTable) -> Self {
        Self {
            id: counter.next_id(flags),
            queue: VecDeque::new(),
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Queue `flag` and stamp it as visited.
    pub fn add_source(&mut self, flags: &mut FlagTable, flag: FlagId) {
        if let Some(record) = flags.try_get_mut(flag) {
            record.search_num = self.id;
            self.queue.push_back(flag);
        }
    }

    /// Run the search until `callback` returns `true` or the reachable
    /// network is exhausted.
    ///
    /// With `land_only`, water roads are not followed; with
    /// `transporter_only`, roads without a transporter are not followed.
    /// Each newly reached flag inherits the `search_dir` of the flag it was
    /// reached from. The queue is always empty on return.
    pub fn execute<F>(
        &mut self,
        flags: &mut FlagTable,
        mut callback: F,
        land_only: bool,
        transporter_only: bool,
    ) -> SearchOutcome
    where
        F: FnMut(FlagId, &Flag) -> bool,
    {
        for _ in 0..SEARCH_MAX_DEPTH {
            let Some(current) = self.queue.pop_front() else {
                return SearchOutcome::NotFound;
            };
            let Some(flag) = flags.try_get(current) else {
                continue;
            };

            if callback(current, flag) {
                self.queue.clear();
                return SearchOutcome::Found;
            }

            let search_dir = flag.search_dir;
            let mut next = [None; 6];
            for (slot, dir) in next.iter_mut().zip(SEARCH_ORDER) {
                if land_only && !flag.is_land_path(dir) {
                    continue;
                }
                if transporter_only && !flag.has_transporter(dir) {
                    continue;
                }
                *slot = flag.neighbor(dir);
            }

            for other_id in next.into_iter().flatten() {
                let Some(other) = flags.try_get_mut(other_id) else {
                    continue;
                };
                if other.search_num == self.id {
                    continue;
                }
                other.search_num = self.id;
                other.search_dir = search_dir;
                self.queue.push_back(other_id);
            }
        }

        tracing::warn!(
            target: "settler::search",
            search_id = self.id,
            pending = self.queue.len(),
            "flag search hit the depth cap"
        );
        self.queue.clear();
        SearchOutcome::Aborted
    }

    /// Flags still waiting to be expanded.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Search outward from a single flag.
pub fn search_single<F>(
    counter: &mut SearchCounter,
    flags: &mut FlagTable,
    source: FlagId,
    callback: F,
    land_only: bool,
    transporter_only: bool,
) -> SearchOutcome
where
    F: FnMut(FlagId, &Flag) -> bool,
{
    let mut search = FlagSearch::new(counter, flags);
    search.add_source(flags, source);
    search.execute(flags, callback, land_only, transporter_only)
}
