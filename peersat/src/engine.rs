//! The solver-engine interface.
//!
//! The portfolio treats engines as opaque: it loads a formula, runs
//! `solve` on a worker thread, interrupts on termination and exchanges
//! clauses through the [`SharingEntity`] supertrait. Concrete CDCL or local
//! search engines live outside this crate; the built-in synthetic engine
//! exists for tests and exchange benchmarks.
use std::sync::Arc;

use peersat_formula::{CnfFormula, Lit};

use crate::ending::SolveResult;
use crate::entity::SharingEntity;

pub mod synthetic;

pub use synthetic::SyntheticEngine;

/// An engine together with its sharing-entity view.
///
/// Both fields point at the same object; the pair exists because a
/// `dyn SolverEngine` cannot be re-borrowed as a `dyn SharingEntity`, so
/// the coercion happens once here while the concrete type is still known.
#[derive(Clone)]
pub struct EngineRef {
    pub engine: Arc<dyn SolverEngine>,
    pub entity: Arc<dyn SharingEntity>,
}

impl EngineRef {
    pub fn new<E: SolverEngine + 'static>(engine: Arc<E>) -> EngineRef {
        EngineRef {
            entity: engine.clone(),
            engine,
        }
    }
}

/// A solver engine raced by the portfolio.
pub trait SolverEngine: SharingEntity {
    /// Load the formula to solve. Called once before `solve`.
    fn load_formula(&self, formula: &CnfFormula);

    /// Run the engine until it has an answer or is interrupted.
    ///
    /// `assumptions` are literals the engine must hold true for this run.
    /// Blocking; runs on a dedicated worker thread.
    fn solve(&self, assumptions: &[Lit]) -> SolveResult;

    /// Ask a running `solve` to return as soon as possible.
    fn set_interrupt(&self);

    /// Clear a previous interrupt before reusing the engine.
    fn unset_interrupt(&self) {}

    /// The satisfying assignment of the last `Sat` answer.
    fn model(&self) -> Vec<Lit>;

    /// Perturb the engine's heuristics so a portfolio of identical engines
    /// still explores different parts of the search space.
    fn diversify(&self, seed: u64);
}
