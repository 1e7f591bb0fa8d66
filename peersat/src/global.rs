//! Global (inter-process) sharing: the bridging database and the
//! topology-specific strategies.
//!
//! The global database is one sharing entity with two sides: clauses
//! imported by local strategies accumulate in `to_send`, clauses arriving
//! from peers accumulate in `received` and flow back into the local tier as
//! this entity's exports. A global strategy's sharer drains `to_send` once
//! per round, serializes up to a literal budget, exchanges buffers over its
//! topology and deserializes into `received`.
use std::sync::Arc;

use peersat_wire::frame;

use crate::bloom::Bloom;
use crate::clause::{Clause, ClauseRef};
use crate::db::ClauseStore;
use crate::entity::{EntityId, EntityKind, SharingEntity};

pub mod all_gather;
pub mod mallob;
pub mod ring;

pub use all_gather::AllGatherSharing;
pub use mallob::MallobSharing;
pub use ring::RingSharing;

/// Relative to the local tier, global rounds run this much slower.
pub(crate) const GLOBAL_SLEEP_FACTOR: u32 = 3;

/// The bridge between the local and the global exchange tier.
pub struct GlobalDatabase {
    id: EntityId,
    to_send: Box<dyn ClauseStore>,
    received: Box<dyn ClauseStore>,
}

impl GlobalDatabase {
    /// Bundle two clause stores into a global database.
    ///
    /// The stores are lock-free databases normally and mutex-wrapped vector
    /// databases when one multi-sharer thread drives all strategies.
    pub fn new(
        id: EntityId,
        to_send: Box<dyn ClauseStore>,
        received: Box<dyn ClauseStore>,
    ) -> GlobalDatabase {
        GlobalDatabase {
            id,
            to_send,
            received,
        }
    }

    /// Pop the best clause awaiting serialization.
    pub fn clause_to_send(&self) -> Option<ClauseRef> {
        self.to_send.give_one()
    }

    /// Put a clause back into the send side.
    ///
    /// Used when a clause did not fit the serialization budget and for ring
    /// propagation of received clauses.
    pub fn requeue_to_send(&self, clause: ClauseRef) -> bool {
        self.to_send.add_clause(clause)
    }

    /// Budgeted drain of the send side.
    pub fn clauses_to_send(&self, out: &mut Vec<ClauseRef>, budget: usize) -> usize {
        self.to_send.give_selection(out, budget)
    }

    /// Insert a clause that arrived from a peer.
    pub fn add_received(&self, clause: ClauseRef) -> bool {
        self.received.add_clause(clause)
    }

    /// Number of clauses waiting to be sent.
    pub fn pending_to_send(&self) -> usize {
        self.to_send.len()
    }

    /// Number of received clauses not yet picked up by the local tier.
    pub fn pending_received(&self) -> usize {
        self.received.len()
    }

    /// Drop the contents of both sides.
    pub fn clear(&self) {
        self.to_send.delete_clauses(0);
        self.received.delete_clauses(0);
    }
}

impl SharingEntity for GlobalDatabase {
    fn id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::GlobalDatabase
    }

    /// Hand the clauses received from other processes to the local tier.
    fn export_clauses(&self, out: &mut Vec<ClauseRef>) {
        self.received.drain_all(out);
    }

    fn export_clauses_bounded(&self, out: &mut Vec<ClauseRef>, budget: usize) {
        self.received.give_selection(out, budget);
    }

    /// Queue a locally learned clause for the next global round.
    fn import_clause(&self, clause: ClauseRef) -> bool {
        self.to_send.add_clause(clause)
    }
}

/// Serialize clauses from the send side of `gdb` into `buf` until `budget`
/// buffer words are used.
///
/// A clause that would overflow the budget is put back and serialization
/// stops, so nothing is lost. When a send-side filter is given, clauses
/// whose literal set was already sent are dropped; the returned pair is
/// `(clauses serialized, duplicates dropped)`.
pub(crate) fn serialize_clauses(
    gdb: &GlobalDatabase,
    filter: Option<&mut Bloom>,
    buf: &mut Vec<i32>,
    budget: usize,
) -> (u64, u64) {
    let start = buf.len();
    let mut serialized = 0;
    let mut duplicates = 0;
    let mut filter = filter;

    while let Some(clause) = gdb.clause_to_send() {
        if let Some(filter) = filter.as_mut() {
            if filter.contains_or_insert(clause.lits()) {
                duplicates += 1;
                continue;
            }
        }
        if buf.len() - start + frame::clause_words(clause.size()) > budget {
            gdb.requeue_to_send(clause);
            break;
        }
        frame::push_clause(buf, clause.lits(), clause.lbd());
        serialized += 1;
    }

    (serialized, duplicates)
}

/// Deserialize a clause buffer into the receive side of `gdb`.
///
/// Each parsed clause is tested against the cross-round filter and, if
/// novel, constructed with the global database as origin and inserted into
/// `received`. Returns `(clauses inserted, duplicates dropped)`.
pub(crate) fn deserialize_clauses(
    gdb: &GlobalDatabase,
    filter: &mut Bloom,
    buf: &[i32],
) -> (u64, u64) {
    let mut inserted = 0;
    let mut duplicates = 0;

    frame::read_clauses(buf, |lits, lbd| {
        if filter.contains_or_insert(&lits) {
            duplicates += 1;
            return;
        }
        gdb.add_received(Clause::new(lits, lbd, gdb.id()));
        inserted += 1;
    });

    (inserted, duplicates)
}

/// Deserialize a concatenation of fixed-size peer buffers, skipping each
/// buffer's padding.
pub(crate) fn deserialize_concat(
    gdb: &GlobalDatabase,
    filter: &mut Bloom,
    buf: &[i32],
    one_size: usize,
    count: usize,
) -> (u64, u64) {
    let mut inserted = 0;
    let mut duplicates = 0;

    frame::read_concat(buf, one_size, count, |lits, lbd| {
        if filter.contains_or_insert(&lits) {
            duplicates += 1;
            return;
        }
        gdb.add_received(Clause::new(lits, lbd, gdb.id()));
        inserted += 1;
    });

    (inserted, duplicates)
}

/// Shared reference to the global database.
pub type GlobalDatabaseRef = Arc<GlobalDatabase>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{LockFreeClauseDb, LockedClauseDb};
    use crate::test::clause_from;

    fn gdb(max_size: usize) -> GlobalDatabase {
        GlobalDatabase::new(
            99,
            Box::new(LockFreeClauseDb::with_max_size(max_size)),
            Box::new(LockFreeClauseDb::with_max_size(max_size)),
        )
    }

    #[test]
    fn import_goes_to_send_export_comes_from_received() {
        let gdb = gdb(50);

        gdb.import_clause(clause_from(&[1, 2], 1));
        assert_eq!(gdb.pending_to_send(), 1);

        let mut out = vec![];
        gdb.export_clauses(&mut out);
        assert!(out.is_empty());

        gdb.add_received(clause_from(&[3, 4], 1));
        gdb.export_clauses(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(gdb.pending_received(), 0);
    }

    #[test]
    fn oversized_imports_are_rejected() {
        let gdb = gdb(3);
        let lits: Vec<i32> = (1..=4).collect();
        assert!(!gdb.import_clause(clause_from(&lits, 2)));
        assert_eq!(gdb.pending_to_send(), 0);
    }

    #[test]
    fn clear_drops_both_sides() {
        let gdb = gdb(50);
        gdb.import_clause(clause_from(&[1, 2], 1));
        gdb.add_received(clause_from(&[3, 4], 1));
        gdb.clear();
        assert_eq!(gdb.pending_to_send(), 0);
        assert_eq!(gdb.pending_received(), 0);
    }

    #[test]
    fn serialize_requeues_on_overflow() {
        let gdb = gdb(50);
        // 4 + 2 words each, budget of 14 fits two clauses
        gdb.import_clause(clause_from(&[1, 2, 3, 4], 2));
        gdb.import_clause(clause_from(&[5, 6, 7, 8], 2));
        gdb.import_clause(clause_from(&[9, 10, 11, 12], 2));

        let mut buf = vec![];
        let (serialized, _) = serialize_clauses(&gdb, None, &mut buf, 14);

        assert_eq!(serialized, 2);
        assert_eq!(gdb.pending_to_send(), 1);
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn serialize_and_deserialize_roundtrip() {
        let gdb = gdb(50);
        gdb.import_clause(clause_from(&[1, -2], 1));
        gdb.import_clause(clause_from(&[3, 4, 5], 0));

        let mut buf = vec![];
        serialize_clauses(&gdb, None, &mut buf, 1000);

        let mut filter = Bloom::new();
        let (inserted, _) = deserialize_clauses(&gdb, &mut filter, &buf);
        assert_eq!(inserted, 2);

        let mut out = vec![];
        gdb.export_clauses(&mut out);
        assert_eq!(out.len(), 2);
        // received clauses carry the global database's id
        assert!(out.iter().all(|cls| cls.from() == 99));
        // the unknown LBD survived the -1 encoding
        assert!(out.iter().any(|cls| cls.size() == 3 && cls.lbd() == 0));
    }

    #[test]
    fn deserialize_suppresses_cross_round_duplicates() {
        let gdb = GlobalDatabase::new(
            7,
            Box::new(LockedClauseDb::with_max_size(50)),
            Box::new(LockedClauseDb::with_max_size(50)),
        );
        let mut buf = vec![];
        frame::push_clause(&mut buf, &peersat_formula::lit::lits_from_dimacs(&[1, 2]), 1);

        let mut filter = Bloom::new();
        assert_eq!(deserialize_clauses(&gdb, &mut filter, &buf), (1, 0));
        assert_eq!(deserialize_clauses(&gdb, &mut filter, &buf), (0, 1));
        assert_eq!(gdb.pending_received(), 1);
    }
}
