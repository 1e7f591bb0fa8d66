//! Producers and consumers of exchanged clauses.
use crate::clause::ClauseRef;

/// Identifier of a sharing entity.
///
/// Ids are assigned by the portfolio at wiring time and are unique within a
/// process. A clause's origin field holds the id of its producer.
pub type EntityId = i32;

/// Concrete kind of a sharing entity.
///
/// Local strategies tailor their per-round policy to the kind: solvers get
/// production-rate feedback, the global database and other entities get a
/// plain budgeted selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntityKind {
    /// A solver engine (including reducers).
    Solver,
    /// The bridge between the local and the global exchange tier.
    GlobalDatabase,
    /// Anything else.
    Other,
}

/// Anything that can produce or consume exchanged clauses.
///
/// Implemented by solver engines and by the global database. Entities are
/// shared between strategies as `Arc<dyn SharingEntity>`; the reference
/// count of the `Arc` is the entity's lifetime.
pub trait SharingEntity: Send + Sync {
    /// Unique id of this entity.
    fn id(&self) -> EntityId;

    /// Concrete kind, used by strategies to pick a per-round policy.
    fn kind(&self) -> EntityKind {
        EntityKind::Other
    }

    /// Drain the clauses this entity wants to publish into `out`.
    ///
    /// Non-blocking, no ordering guarantee. Solvers return the clauses
    /// learned since the last call whose LBD does not exceed their export
    /// limit.
    fn export_clauses(&self, out: &mut Vec<ClauseRef>);

    /// Bounded variant of [`SharingEntity::export_clauses`]: stop once
    /// `budget` literals were drained, leaving the remainder with the
    /// entity.
    ///
    /// Entities whose exports live in a clause database override this with a
    /// budgeted selection; the default ignores the budget.
    fn export_clauses_bounded(&self, out: &mut Vec<ClauseRef>, _budget: usize) {
        self.export_clauses(out);
    }

    /// Offer a clause to this entity.
    ///
    /// The entity may accept (keeping a reference) or silently drop it.
    /// Returns whether the clause was accepted.
    fn import_clause(&self, clause: ClauseRef) -> bool;

    /// Offer a batch of clauses.
    fn import_clauses(&self, clauses: &[ClauseRef]) {
        for clause in clauses {
            self.import_clause(clause.clone());
        }
    }

    /// Raise or lower the LBD limit gating this entity's exports.
    ///
    /// No-op for entities without an export gate.
    fn set_lbd_limit(&self, _lbd: u32) {}

    /// Ask the entity to publish more clauses per round.
    ///
    /// No-op for entities without rate control.
    fn increase_clause_production(&self) {}

    /// Ask the entity to publish fewer clauses per round.
    fn decrease_clause_production(&self) {}
}

/// Sum of the literal counts of a clause batch.
pub fn literals_in(clauses: &[ClauseRef]) -> usize {
    clauses.iter().map(|clause| clause.size()).sum()
}
