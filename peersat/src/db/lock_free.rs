//! Clause database tolerating concurrent producers and consumers.
//!
//! Used for the two sides of the global database when the global sharer and
//! the local sharers run on different threads. Synchronization is
//! fine-grained: one short critical section per size bucket, so an `add` of
//! one size never contends with a pop of another. Ordering within a bucket
//! is FIFO; a selection spanning several buckets is not atomic as a whole,
//! which is acceptable for the best-effort selection contract.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::clause::ClauseRef;
use crate::db::ClauseStore;

pub struct LockFreeClauseDb {
    /// One lock per clause size, indexed by size. Fixed at construction.
    buckets: Vec<Mutex<VecDeque<ClauseRef>>>,
    /// Cumulative number of accepted clauses per size, for diagnostics.
    total_added: Vec<AtomicU64>,
    len: AtomicUsize,
}

impl LockFreeClauseDb {
    /// Database rejecting clauses larger than `max_clause_size` literals.
    ///
    /// Unlike the unsynchronized variant the size limit must be positive:
    /// the bucket table is sized once so that no growth needs coordination.
    pub fn with_max_size(max_clause_size: usize) -> LockFreeClauseDb {
        assert!(max_clause_size > 0);
        let mut buckets = Vec::new();
        buckets.resize_with(max_clause_size + 1, || Mutex::new(VecDeque::new()));
        let mut total_added = Vec::new();
        total_added.resize_with(max_clause_size + 1, || AtomicU64::new(0));
        LockFreeClauseDb {
            buckets,
            total_added,
            len: AtomicUsize::new(0),
        }
    }

    /// Cumulative count of accepted clauses per size.
    pub fn total_added(&self, size: usize) -> u64 {
        self.total_added[size].load(Ordering::Relaxed)
    }
}

impl ClauseStore for LockFreeClauseDb {
    fn add_clause(&self, clause: ClauseRef) -> bool {
        let size = clause.size();
        if size >= self.buckets.len() {
            return false;
        }
        self.buckets[size].lock().unwrap().push_back(clause);
        self.total_added[size].fetch_add(1, Ordering::Relaxed);
        self.len.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn give_one(&self) -> Option<ClauseRef> {
        for bucket in self.buckets.iter() {
            if let Some(clause) = bucket.lock().unwrap().pop_front() {
                self.len.fetch_sub(1, Ordering::Relaxed);
                return Some(clause);
            }
        }
        None
    }

    fn give_selection(&self, out: &mut Vec<ClauseRef>, budget: usize) -> usize {
        let mut used = 0;
        for (size, bucket) in self.buckets.iter().enumerate() {
            let mut bucket = bucket.lock().unwrap();
            while !bucket.is_empty() {
                if used + size > budget {
                    return used;
                }
                out.push(bucket.pop_front().unwrap());
                self.len.fetch_sub(1, Ordering::Relaxed);
                used += size;
            }
        }
        used
    }

    fn drain_all(&self, out: &mut Vec<ClauseRef>) {
        for bucket in self.buckets.iter() {
            let mut bucket = bucket.lock().unwrap();
            self.len.fetch_sub(bucket.len(), Ordering::Relaxed);
            out.extend(bucket.drain(..));
        }
    }

    fn bucket_sizes(&self, out: &mut Vec<usize>) {
        out.clear();
        out.extend(self.buckets.iter().map(|bucket| bucket.lock().unwrap().len()));
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    fn delete_clauses(&self, from_size: usize) {
        for bucket in self.buckets.iter().skip(from_size) {
            let mut bucket = bucket.lock().unwrap();
            self.len.fetch_sub(bucket.len(), Ordering::Relaxed);
            bucket.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Clause;
    use peersat_formula::lit::lits_from_dimacs;

    use std::sync::Arc;
    use std::thread;

    fn clause_of_size(size: usize, seed: i32) -> ClauseRef {
        let lits: Vec<i32> = (0..size as i32).map(|i| seed + i + 1).collect();
        Clause::from_lits(lits_from_dimacs(&lits))
    }

    #[test]
    fn same_contract_as_vec_db() {
        let db = LockFreeClauseDb::with_max_size(4);
        assert!(db.add_clause(clause_of_size(2, 0)));
        assert!(db.add_clause(clause_of_size(4, 10)));
        assert!(!db.add_clause(clause_of_size(5, 20)));
        assert_eq!(db.len(), 2);

        assert_eq!(db.give_one().unwrap().size(), 2);
        assert_eq!(db.give_one().unwrap().size(), 4);
        assert!(db.give_one().is_none());

        // cumulative totals are unaffected by removal
        assert_eq!(db.total_added(2), 1);
        assert_eq!(db.total_added(4), 1);
    }

    #[test]
    fn concurrent_add_and_pop() {
        let db = Arc::new(LockFreeClauseDb::with_max_size(8));
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let db = db.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        db.add_clause(clause_of_size(1 + (i % 5), w * 10_000 + i as i32 * 10));
                    }
                })
            })
            .collect();

        let reader = {
            let db = db.clone();
            thread::spawn(move || {
                let mut popped = 0;
                while popped < 150 {
                    if db.give_one().is_some() {
                        popped += 1;
                    }
                }
                popped
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        let popped = reader.join().unwrap();

        assert_eq!(db.len() + popped, 400);
    }
}
