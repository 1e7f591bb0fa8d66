//! The shared clause object of the exchange.
//!
//! A clause is created once by its producer and then travels by reference:
//! every database, queue or buffer holding it owns one `Arc` reference and
//! the clause is freed when the last holder drops it. Literals, origin and
//! checksum are immutable after creation; only the LBD may still be lowered
//! by the duplicate-promotion logic, which makes the remaining shared
//! mutation a monotonically decreasing atomic store.
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use peersat_formula::Lit;
use peersat_wire::{clause_hash, ClauseHash};

/// Origin id of a clause that was not produced by a registered entity.
pub const NO_ORIGIN: i32 = -1;

/// A learned clause in exchange form.
pub struct Clause {
    lits: Box<[Lit]>,
    /// LBD quality metric, lower is better. `0` means unknown.
    lbd: AtomicU32,
    /// Id of the sharing entity that produced this clause, [`NO_ORIGIN`] if
    /// unknown.
    from: i32,
    checksum: ClauseHash,
}

/// Counted reference to a shared clause.
pub type ClauseRef = Arc<Clause>;

impl Clause {
    /// Create a clause from its literals, computing the checksum.
    pub fn new(lits: Vec<Lit>, lbd: u32, from: i32) -> ClauseRef {
        let checksum = clause_hash(&lits);
        Arc::new(Clause {
            lits: lits.into_boxed_slice(),
            lbd: AtomicU32::new(lbd),
            from,
            checksum,
        })
    }

    /// Create a clause with unknown LBD and no origin.
    pub fn from_lits(lits: Vec<Lit>) -> ClauseRef {
        Clause::new(lits, 0, NO_ORIGIN)
    }

    /// The literals of the clause.
    #[inline]
    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    /// Number of literals.
    #[inline]
    pub fn size(&self) -> usize {
        self.lits.len()
    }

    /// Current LBD, `0` if unknown.
    #[inline]
    pub fn lbd(&self) -> u32 {
        self.lbd.load(Ordering::Relaxed)
    }

    /// Lower the LBD to `lbd`.
    ///
    /// Concurrent promotions may race; `fetch_min` keeps the value
    /// monotonically decreasing either way. An unknown LBD stays unknown.
    pub fn promote_lbd(&self, lbd: u32) {
        debug_assert!(lbd > 0);
        if self.lbd() > 0 {
            self.lbd.fetch_min(lbd, Ordering::Relaxed);
        }
    }

    /// Id of the producing entity, [`NO_ORIGIN`] if unknown.
    #[inline]
    pub fn from(&self) -> i32 {
        self.from
    }

    /// Order-independent checksum of the literal set.
    #[inline]
    pub fn checksum(&self) -> ClauseHash {
        self.checksum
    }
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "size: {} lbd: {} from: {} {:?}",
            self.size(),
            self.lbd(),
            self.from,
            self.lits
        )
    }
}
