//! Clause checksums and wire framing for the Peersat clause exchange.
//!
//! Everything that crosses a process boundary is a flat buffer of `i32`
//! words. This crate owns the encoding of clause sequences into such buffers
//! and the order-independent clause checksum used for duplicate suppression.
use peersat_formula::Lit;

pub mod frame;

/// Integer type used to store a checksum of a clause.
pub type ClauseHash = u64;

/// Hash a single literal.
///
/// Multiple literals can be combined with xor, as done in [`clause_hash`].
pub fn lit_hash(lit: Lit) -> ClauseHash {
    // Constant based on the golden ratio provides good mixing for the
    // resulting upper bits
    (!(lit.to_dimacs() as u64)).wrapping_mul(0x61c8864680b583ebu64)
}

/// A fast hash function for clauses (or other *sets* of literals).
///
/// This hash function interprets the given slice as a set and will not change
/// when the input is permuted. It does not handle duplicated items.
pub fn clause_hash(lits: &[Lit]) -> ClauseHash {
    let mut hash = 0;
    for &lit in lits {
        hash ^= lit_hash(lit);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use peersat_formula::lit::lits_from_dimacs;

    use proptest::prelude::*;

    #[test]
    fn permutation_invariance() {
        let a = clause_hash(&lits_from_dimacs(&[1, -2, 5]));
        let b = clause_hash(&lits_from_dimacs(&[5, 1, -2]));
        assert_eq!(a, b);
    }

    #[test]
    fn polarity_changes_hash() {
        let a = clause_hash(&lits_from_dimacs(&[1, -2]));
        let b = clause_hash(&lits_from_dimacs(&[1, 2]));
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn shuffle_invariance(
            mut clause in peersat_formula::strategy::clause(500, 1..20usize),
            seed in 0u64..,
        ) {
            let original = clause_hash(&clause);
            // cheap deterministic shuffle
            let len = clause.len();
            for i in 0..len {
                let j = (seed as usize).wrapping_mul(i + 1) % len;
                clause.swap(i, j);
            }
            prop_assert_eq!(clause_hash(&clause), original);
        }
    }
}
