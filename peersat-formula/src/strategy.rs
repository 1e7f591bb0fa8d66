//! Proptest strategies for formula types.
//!
//! Only built for tests and for downstream crates that enable the
//! `proptest-strategies` feature.
use proptest::{collection, prelude::*};

use crate::cnf::CnfFormula;
use crate::lit::{Lit, Var};

/// Generates a variable with a number in `1..=max_number`.
pub fn var(max_number: u32) -> impl Strategy<Value = Var> {
    (1..=max_number as i32).prop_map(Var::from_dimacs)
}

/// Generates a literal over variables numbered `1..=max_number`.
pub fn lit(max_number: u32) -> impl Strategy<Value = Lit> {
    (var(max_number), proptest::bool::ANY).prop_map(|(var, positive)| var.lit(positive))
}

/// Generates a clause as a vector of literals with distinct variables.
///
/// Distinct variables keep generated clauses free of duplicated and
/// tautological literal pairs, which matches what solvers export.
pub fn clause(max_number: u32, len: impl Into<collection::SizeRange>) -> impl Strategy<Value = Vec<Lit>> {
    collection::btree_map(1..=max_number as i32, proptest::bool::ANY, len).prop_map(|vars| {
        vars.into_iter()
            .map(|(number, positive)| Var::from_dimacs(number).lit(positive))
            .collect()
    })
}

/// Generates a CNF formula.
pub fn cnf_formula(
    max_number: u32,
    clauses: impl Into<collection::SizeRange>,
    clause_len: impl Into<collection::SizeRange>,
) -> impl Strategy<Value = CnfFormula> {
    collection::vec(clause(max_number, clause_len), clauses).prop_map(|clauses| {
        let mut formula = CnfFormula::new();
        for cls in &clauses {
            formula.add_clause(cls);
        }
        formula
    })
}
