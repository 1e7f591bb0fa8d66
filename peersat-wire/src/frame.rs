//! Flat `i32` framing of clause sequences.
//!
//! A buffer is a sequence of clauses, each ending with its LBD followed by a
//! `0` separator:
//!
//! ```text
//! 6 -7 5 <lbd> 0 65 -4 36 <lbd> 0 0 0 0
//! ```
//!
//! Trailing zeros pad fixed-size buffers. An unknown LBD (stored as `0` on
//! the clause) is written as `-1` so it cannot collide with the separator.
//! Literals are DIMACS codes and therefore never zero.
use peersat_formula::Lit;

/// Number of buffer words one clause of the given length occupies.
///
/// Literals plus the LBD word plus the separator.
pub fn clause_words(len: usize) -> usize {
    len + 2
}

/// Append one clause to a buffer.
pub fn push_clause(buf: &mut Vec<i32>, lits: &[Lit], lbd: u32) {
    buf.reserve(clause_words(lits.len()));
    for &lit in lits {
        buf.push(lit.to_dimacs());
    }
    buf.push(if lbd == 0 { -1 } else { lbd as i32 });
    buf.push(0);
}

/// Pad a buffer with zeros up to `len` words.
///
/// Used by fixed-size collectives where every participant contributes a
/// buffer of identical length.
pub fn pad_to(buf: &mut Vec<i32>, len: usize) {
    debug_assert!(buf.len() <= len);
    buf.resize(len, 0);
}

/// Parse all clauses of a buffer, invoking `sink` with the literals and the
/// LBD of each clause.
///
/// Zeros that do not terminate a clause are skipped, so padded buffers parse
/// cleanly. An unterminated trailing clause is ignored.
pub fn read_clauses(buf: &[i32], mut sink: impl FnMut(Vec<Lit>, u32)) {
    let mut acc: Vec<i32> = vec![];
    for &word in buf {
        if word != 0 {
            acc.push(word);
            continue;
        }
        if acc.is_empty() {
            // padding
            continue;
        }
        let lbd_word = acc.pop().unwrap();
        let lbd = if lbd_word < 0 { 0 } else { lbd_word as u32 };
        sink(acc.drain(..).map(Lit::from_dimacs).collect(), lbd);
    }
}

/// Parse a concatenation of `count` fixed-size buffers of `one_size` words
/// each, skipping over each buffer's zero padding.
///
/// This is the receive side of an all-gather exchange: the gathered buffer is
/// the peers' individual buffers back to back, each padded to `one_size`.
pub fn read_concat(buf: &[i32], one_size: usize, count: usize, mut sink: impl FnMut(Vec<Lit>, u32)) {
    debug_assert!(buf.len() >= one_size * count);
    for chunk in 0..count {
        let chunk = &buf[chunk * one_size..(chunk + 1) * one_size];
        let mut acc: Vec<i32> = vec![];
        for &word in chunk {
            if word != 0 {
                acc.push(word);
                continue;
            }
            if acc.is_empty() {
                // padding starts, the rest of this chunk is empty
                break;
            }
            let lbd_word = acc.pop().unwrap();
            let lbd = if lbd_word < 0 { 0 } else { lbd_word as u32 };
            sink(acc.drain(..).map(Lit::from_dimacs).collect(), lbd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peersat_formula::lit::lits_from_dimacs;

    use proptest::prelude::*;

    fn collect(buf: &[i32]) -> Vec<(Vec<Lit>, u32)> {
        let mut out = vec![];
        read_clauses(buf, |lits, lbd| out.push((lits, lbd)));
        out
    }

    #[test]
    fn single_clause_roundtrip() {
        let lits = lits_from_dimacs(&[6, -7, 5, 15]);
        let mut buf = vec![];
        push_clause(&mut buf, &lits, 3);

        assert_eq!(buf, vec![6, -7, 5, 15, 3, 0]);
        assert_eq!(collect(&buf), vec![(lits, 3)]);
    }

    #[test]
    fn unknown_lbd_written_as_minus_one() {
        let lits = lits_from_dimacs(&[6]);
        let mut buf = vec![];
        push_clause(&mut buf, &lits, 0);

        assert_eq!(buf, vec![6, -1, 0]);
        assert_eq!(collect(&buf), vec![(lits, 0)]);
    }

    #[test]
    fn padding_is_skipped() {
        let mut buf = vec![];
        push_clause(&mut buf, &lits_from_dimacs(&[1, 2]), 1);
        pad_to(&mut buf, 20);
        push_clause(&mut buf, &lits_from_dimacs(&[-3]), 2);

        let parsed = collect(&buf);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], (lits_from_dimacs(&[-3]), 2));
    }

    #[test]
    fn concat_of_fixed_buffers() {
        // three peers with a 20 word buffer each
        let mut buf = vec![];
        push_clause(&mut buf, &lits_from_dimacs(&[1, 2]), 3);
        pad_to(&mut buf, 20);
        push_clause(&mut buf, &lits_from_dimacs(&[-3, 4, 5]), 4);
        pad_to(&mut buf, 40);
        push_clause(&mut buf, &lits_from_dimacs(&[6]), 0);
        pad_to(&mut buf, 60);

        let mut out = vec![];
        read_concat(&buf, 20, 3, |lits, lbd| out.push((lits, lbd)));

        assert_eq!(
            out,
            vec![
                (lits_from_dimacs(&[1, 2]), 3),
                (lits_from_dimacs(&[-3, 4, 5]), 4),
                (lits_from_dimacs(&[6]), 0),
            ]
        );
    }

    proptest! {
        #[test]
        fn buffer_roundtrip(
            clauses in proptest::collection::vec(
                (peersat_formula::strategy::clause(300, 1..15usize), 0u32..30),
                0..20,
            )
        ) {
            let mut buf = vec![];
            for (lits, lbd) in &clauses {
                push_clause(&mut buf, lits, *lbd);
            }

            prop_assert_eq!(collect(&buf), clauses);
        }
    }
}
