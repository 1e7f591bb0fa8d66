//! Size-bucketed clause databases.
//!
//! A database maps each clause size to a FIFO bucket of clauses of that
//! size. Selection draws from the smallest sizes first under a hard literal
//! budget, because short clauses are the stronger propagators and the cost
//! of redistributing a selection is dominated by its literal count.
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::clause::ClauseRef;

pub mod lock_free;

pub use lock_free::LockFreeClauseDb;

/// Clause database without internal synchronization.
///
/// Callers must serialize access; the local strategies own one per producer
/// and only touch it from their sharer thread.
pub struct VecClauseDb {
    /// Maximum accepted clause size, `0` means no limit.
    max_clause_size: usize,
    /// One FIFO bucket per clause size, indexed by size.
    buckets: Vec<VecDeque<ClauseRef>>,
    /// Cumulative number of accepted clauses per size, for diagnostics.
    total_added: Vec<u64>,
    len: usize,
}

impl VecClauseDb {
    /// Database accepting clauses of any size.
    pub fn new() -> VecClauseDb {
        VecClauseDb::with_max_size(0)
    }

    /// Database rejecting clauses larger than `max_clause_size` literals.
    ///
    /// A `max_clause_size` of zero means no limit.
    pub fn with_max_size(max_clause_size: usize) -> VecClauseDb {
        VecClauseDb {
            max_clause_size,
            buckets: vec![],
            total_added: vec![],
            len: 0,
        }
    }

    /// Add a clause.
    ///
    /// Returns false and drops the reference if the clause is larger than the
    /// size limit.
    pub fn add_clause(&mut self, clause: ClauseRef) -> bool {
        let size = clause.size();
        if self.max_clause_size > 0 && size > self.max_clause_size {
            return false;
        }
        if self.buckets.len() <= size {
            self.buckets.resize_with(size + 1, VecDeque::new);
            self.total_added.resize(size + 1, 0);
        }
        self.buckets[size].push_back(clause);
        self.total_added[size] += 1;
        self.len += 1;
        true
    }

    /// Pop one clause, preferring the smallest available size.
    ///
    /// FIFO within a bucket. Returns `None` iff the database is empty.
    pub fn give_one(&mut self) -> Option<ClauseRef> {
        for bucket in self.buckets.iter_mut() {
            if let Some(clause) = bucket.pop_front() {
                self.len -= 1;
                return Some(clause);
            }
        }
        None
    }

    /// Move clauses into `out` by ascending size, FIFO within a size, while
    /// the running literal sum stays within `budget`.
    ///
    /// Stops at the first clause that would overflow the budget; selected
    /// clauses are removed from the database. Returns the number of literals
    /// moved.
    pub fn give_selection(&mut self, out: &mut Vec<ClauseRef>, budget: usize) -> usize {
        self.give_selection_counted(out, budget).0
    }

    /// Like [`VecClauseDb::give_selection`] but also reports the number of
    /// clauses selected.
    pub fn give_selection_counted(
        &mut self,
        out: &mut Vec<ClauseRef>,
        budget: usize,
    ) -> (usize, usize) {
        let mut used = 0;
        let mut count = 0;
        for (size, bucket) in self.buckets.iter_mut().enumerate() {
            while !bucket.is_empty() {
                if used + size > budget {
                    return (used, count);
                }
                out.push(bucket.pop_front().unwrap());
                self.len -= 1;
                used += size;
                count += 1;
            }
        }
        (used, count)
    }

    /// Drain all clauses into `out`, by ascending size.
    pub fn drain_all(&mut self, out: &mut Vec<ClauseRef>) {
        for bucket in self.buckets.iter_mut() {
            out.extend(bucket.drain(..));
        }
        self.len = 0;
    }

    /// Fill `out[size]` with the current bucket length at each size.
    pub fn bucket_sizes(&self, out: &mut Vec<usize>) {
        out.clear();
        out.extend(self.buckets.iter().map(|bucket| bucket.len()));
    }

    /// Total number of clauses.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the database holds no clauses.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop all clauses of size `from_size` or larger, releasing each.
    pub fn delete_clauses(&mut self, from_size: usize) {
        for bucket in self.buckets.iter_mut().skip(from_size) {
            self.len -= bucket.len();
            bucket.clear();
        }
    }

    /// Cumulative count of accepted clauses per size.
    pub fn total_added(&self) -> &[u64] {
        &self.total_added
    }
}

impl Default for VecClauseDb {
    fn default() -> VecClauseDb {
        VecClauseDb::new()
    }
}

/// Shared-access contract of a clause database.
///
/// The global database is referenced concurrently by the global sharer and
/// by every local strategy, so its two sides are stored behind this trait:
/// either a mutex around a [`VecClauseDb`] when a single multi-sharer thread
/// drives all strategies, or a [`LockFreeClauseDb`] otherwise.
pub trait ClauseStore: Send + Sync {
    fn add_clause(&self, clause: ClauseRef) -> bool;
    fn give_one(&self) -> Option<ClauseRef>;
    fn give_selection(&self, out: &mut Vec<ClauseRef>, budget: usize) -> usize;
    fn drain_all(&self, out: &mut Vec<ClauseRef>);
    fn bucket_sizes(&self, out: &mut Vec<usize>);
    fn len(&self) -> usize;
    fn delete_clauses(&self, from_size: usize);
}

/// A [`VecClauseDb`] behind a mutex.
pub struct LockedClauseDb {
    inner: Mutex<VecClauseDb>,
}

impl LockedClauseDb {
    pub fn with_max_size(max_clause_size: usize) -> LockedClauseDb {
        LockedClauseDb {
            inner: Mutex::new(VecClauseDb::with_max_size(max_clause_size)),
        }
    }
}

impl ClauseStore for LockedClauseDb {
    fn add_clause(&self, clause: ClauseRef) -> bool {
        self.inner.lock().unwrap().add_clause(clause)
    }

    fn give_one(&self) -> Option<ClauseRef> {
        self.inner.lock().unwrap().give_one()
    }

    fn give_selection(&self, out: &mut Vec<ClauseRef>, budget: usize) -> usize {
        self.inner.lock().unwrap().give_selection(out, budget)
    }

    fn drain_all(&self, out: &mut Vec<ClauseRef>) {
        self.inner.lock().unwrap().drain_all(out)
    }

    fn bucket_sizes(&self, out: &mut Vec<usize>) {
        self.inner.lock().unwrap().bucket_sizes(out)
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    fn delete_clauses(&self, from_size: usize) {
        self.inner.lock().unwrap().delete_clauses(from_size)
    }
}
