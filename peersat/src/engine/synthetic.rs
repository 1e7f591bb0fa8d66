//! A clause generator standing in for a real solver engine.
//!
//! Produces random clauses over the loaded formula's variable range at a
//! controlled rate and swallows imports, which is exactly what an exchange
//! soak test or an orchestration test needs: realistic producer/consumer
//! traffic without a search. Never answers `Sat` or `Unsat`.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use peersat_formula::{CnfFormula, Lit, Var};

use crate::clause::{Clause, ClauseRef};
use crate::ending::SolveResult;
use crate::engine::SolverEngine;
use crate::entity::{EntityId, EntityKind, SharingEntity};

/// Longest clause the generator produces.
const MAX_GENERATED_SIZE: usize = 8;

/// Production ceiling in clauses per batch.
const MAX_PRODUCTION: usize = 1000;

pub struct SyntheticEngine {
    id: EntityId,
    var_count: AtomicUsize,
    lbd_limit: AtomicU32,
    /// Clauses generated per batch, adjusted by the rate feedback.
    production: AtomicUsize,
    interrupted: AtomicBool,
    rng: Mutex<StdRng>,
    exports: Mutex<VecDeque<ClauseRef>>,
    imported: AtomicU64,
}

impl SyntheticEngine {
    pub fn new(id: EntityId, lbd_limit: u32) -> SyntheticEngine {
        SyntheticEngine {
            id,
            var_count: AtomicUsize::new(0),
            lbd_limit: AtomicU32::new(lbd_limit.max(1)),
            production: AtomicUsize::new(10),
            interrupted: AtomicBool::new(false),
            rng: Mutex::new(StdRng::seed_from_u64(id as u64)),
            exports: Mutex::new(VecDeque::new()),
            imported: AtomicU64::new(0),
        }
    }

    /// Number of clauses accepted from other entities so far.
    pub fn imported(&self) -> u64 {
        self.imported.load(Ordering::Relaxed)
    }

    /// Generate one batch of random clauses into the export queue.
    pub fn produce_batch(&self) {
        let vars = self.var_count.load(Ordering::Relaxed);
        if vars == 0 {
            return;
        }
        let production = self.production.load(Ordering::Relaxed);
        let lbd_limit = self.lbd_limit.load(Ordering::Relaxed);

        let mut rng = self.rng.lock().unwrap();
        let mut batch = Vec::with_capacity(production);
        for _ in 0..production {
            let len = rng.gen_range(1, MAX_GENERATED_SIZE + 1);
            let mut lits: Vec<Lit> = (0..len)
                .map(|_| Var::from_index(rng.gen_range(0, vars)).lit(rng.gen()))
                .collect();
            lits.sort_unstable_by_key(|lit| lit.index());
            lits.dedup_by_key(|lit| lit.index());

            let lbd = rng.gen_range(1, lbd_limit + 1);
            batch.push(Clause::new(lits, lbd, self.id));
        }
        drop(rng);

        self.exports.lock().unwrap().extend(batch);
    }
}

impl SharingEntity for SyntheticEngine {
    fn id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Solver
    }

    fn export_clauses(&self, out: &mut Vec<ClauseRef>) {
        out.extend(self.exports.lock().unwrap().drain(..));
    }

    fn import_clause(&self, _clause: ClauseRef) -> bool {
        self.imported.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn set_lbd_limit(&self, lbd: u32) {
        self.lbd_limit.store(lbd.max(1), Ordering::Relaxed);
    }

    fn increase_clause_production(&self) {
        let production = self.production.load(Ordering::Relaxed);
        let raised = (production + production / 10 + 1).min(MAX_PRODUCTION);
        self.production.store(raised, Ordering::Relaxed);
    }

    fn decrease_clause_production(&self) {
        let production = self.production.load(Ordering::Relaxed);
        let lowered = production.saturating_sub(production / 10 + 1).max(1);
        self.production.store(lowered, Ordering::Relaxed);
    }
}

impl SolverEngine for SyntheticEngine {
    fn load_formula(&self, formula: &CnfFormula) {
        self.var_count.store(formula.var_count(), Ordering::Relaxed);
    }

    /// Generate batches until interrupted. Never finds an answer.
    fn solve(&self, _assumptions: &[Lit]) -> SolveResult {
        while !self.interrupted.load(Ordering::Relaxed) {
            self.produce_batch();
            thread::sleep(Duration::from_millis(10));
        }
        SolveResult::Unknown
    }

    fn set_interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    fn unset_interrupt(&self) {
        self.interrupted.store(false, Ordering::Relaxed);
    }

    fn model(&self) -> Vec<Lit> {
        vec![]
    }

    fn diversify(&self, seed: u64) {
        *self.rng.lock().unwrap() = StdRng::seed_from_u64(seed);
    }
}
