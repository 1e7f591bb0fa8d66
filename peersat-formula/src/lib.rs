//! Formula data types shared by all Peersat crates.
//!
//! Exchanged clauses travel between solver threads and between processes as
//! vectors of [`Lit`] values; the DIMACS CNF convention (1-based variable
//! numbers, sign encodes polarity) is the native encoding here because it is
//! also the wire encoding.
pub mod cnf;
pub mod dimacs;
pub mod lit;

#[cfg(any(test, feature = "proptest-strategies"))]
pub mod strategy;

pub use cnf::CnfFormula;
pub use lit::{Lit, Var};
