//! Probabilistic clause-set filters for duplicate suppression.
//!
//! Both filters answer "was a clause with this literal set seen before"
//! with false positives allowed and no false negatives. The probe positions
//! are derived from the order-independent clause checksum by double hashing,
//! so permuted literal vectors map to the same probes.
use std::sync::atomic::{AtomicU64, Ordering};

use bit_set::BitSet;

use peersat_formula::Lit;
use peersat_wire::{clause_hash, ClauseHash};

/// Width of the filter bit arrays.
const NUM_BITS: usize = 26_843_543;

/// Number of probes of the plain membership filter.
const NUM_PROBES: u32 = 4;

/// Derive the `i`-th probe position from a clause checksum.
fn probe(checksum: ClauseHash, i: u32) -> usize {
    let h1 = checksum as u32 as u64;
    // force the stride odd so consecutive probes stay distinct
    let h2 = ((checksum >> 32) | 1) as u64;
    ((h1 + i as u64 * h2) % NUM_BITS as u64) as usize
}

/// Membership filter over literal sets.
///
/// Not synchronized; owned and driven by a single sharer thread.
pub struct Bloom {
    bits: BitSet,
}

impl Default for Bloom {
    fn default() -> Bloom {
        Bloom::new()
    }
}

impl Bloom {
    pub fn new() -> Bloom {
        Bloom {
            bits: BitSet::with_capacity(NUM_BITS),
        }
    }

    /// Record a literal set.
    pub fn insert(&mut self, lits: &[Lit]) {
        self.insert_hash(clause_hash(lits));
    }

    /// Whether the literal set was possibly seen before.
    ///
    /// False positives are allowed, false negatives are not.
    pub fn contains(&self, lits: &[Lit]) -> bool {
        self.contains_hash(clause_hash(lits))
    }

    /// Combined test and insert: returns whether the literal set was possibly
    /// seen before, and records it either way.
    pub fn contains_or_insert(&mut self, lits: &[Lit]) -> bool {
        let checksum = clause_hash(lits);
        let seen = self.contains_hash(checksum);
        if !seen {
            self.insert_hash(checksum);
        }
        seen
    }

    fn insert_hash(&mut self, checksum: ClauseHash) {
        for i in 0..NUM_PROBES {
            self.bits.insert(probe(checksum, i));
        }
    }

    fn contains_hash(&self, checksum: ClauseHash) -> bool {
        (0..NUM_PROBES).all(|i| self.bits.contains(probe(checksum, i)))
    }
}

/// Counting filter used for duplicate promotion.
///
/// Each checksum owns a window of probe positions; every call sets one more
/// of them and returns how many are set afterwards. The result is therefore
/// the (approximate) number of times this checksum was inserted, capped at
/// the window width. Word updates are atomic, so concurrent use from several
/// strategies only risks miscounting, never data races.
pub struct CountingBloom {
    words: Vec<AtomicU64>,
}

impl Default for CountingBloom {
    fn default() -> CountingBloom {
        CountingBloom::new()
    }
}

impl CountingBloom {
    pub fn new() -> CountingBloom {
        let mut words = Vec::new();
        words.resize_with((NUM_BITS + 63) / 64, || AtomicU64::new(0));
        CountingBloom { words }
    }

    fn test(&self, pos: usize) -> bool {
        let word = self.words[pos / 64].load(Ordering::Relaxed);
        word & (1 << (pos % 64)) != 0
    }

    fn set(&self, pos: usize) {
        self.words[pos / 64].fetch_or(1 << (pos % 64), Ordering::Relaxed);
    }

    /// Record one occurrence of `checksum` within a window of `window`
    /// probes and return the occupancy count after the insertion.
    ///
    /// The n-th call for a given checksum returns `n` until the window is
    /// full, after which the window width is returned.
    pub fn test_and_insert(&self, checksum: ClauseHash, window: u8) -> u8 {
        let mut count = 0;
        for i in 0..window as u32 {
            if self.test(probe(checksum, i)) {
                count += 1;
            } else {
                self.set(probe(checksum, i));
                return count + 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peersat_formula::lit::lits_from_dimacs;

    #[test]
    fn no_false_negatives() {
        let mut filter = Bloom::new();
        let clause = lits_from_dimacs(&[4, -5, 6]);

        assert!(!filter.contains(&clause));
        filter.insert(&clause);
        assert!(filter.contains(&clause));
        // permutations hit the same probes
        assert!(filter.contains(&lits_from_dimacs(&[6, 4, -5])));
    }

    #[test]
    fn contains_or_insert_reports_first_sighting() {
        let mut filter = Bloom::new();
        let clause = lits_from_dimacs(&[1, 2]);

        assert!(!filter.contains_or_insert(&clause));
        assert!(filter.contains_or_insert(&clause));
    }

    #[test]
    fn occupancy_counts_up_to_window() {
        let filter = CountingBloom::new();
        let checksum = clause_hash(&lits_from_dimacs(&[7, 8]));

        for expected in 1..=12u8 {
            assert_eq!(filter.test_and_insert(checksum, 12), expected);
        }
        // window saturated
        assert_eq!(filter.test_and_insert(checksum, 12), 12);
        assert_eq!(filter.test_and_insert(checksum, 12), 12);
    }

    #[test]
    fn distinct_checksums_count_independently() {
        let filter = CountingBloom::new();
        let a = clause_hash(&lits_from_dimacs(&[1, 2]));
        let b = clause_hash(&lits_from_dimacs(&[3, 4]));

        assert_eq!(filter.test_and_insert(a, 12), 1);
        assert_eq!(filter.test_and_insert(b, 12), 1);
        assert_eq!(filter.test_and_insert(a, 12), 2);
    }
}
