//! In-process round-trip check of the global sharing topologies.
//!
//! Three ranks on the in-process router, each importing a batch of random
//! clauses; after driving the topology every rank must hold every foreign
//! clause, literal sets and LBDs intact. This is the quickest way to vet
//! wire framing changes without standing up a real mesh.
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Error;
use log::info;
use rand::{Rng, SeedableRng};

use peersat::clause::{Clause, ClauseRef};
use peersat::config::Config;
use peersat::db::LockFreeClauseDb;
use peersat::ending::Ending;
use peersat::entity::SharingEntity;
use peersat::global::{
    AllGatherSharing, GlobalDatabase, GlobalDatabaseRef, MallobSharing, RingSharing,
};
use peersat::strategy::SharingStrategy;
use peersat::transport::{LocalRouter, Transport};

use peersat_formula::{Lit, Var};

const RANKS: usize = 3;
const CLAUSES_PER_RANK: usize = 30;
/// Convergence cap for the ring, whose ranks run unsynchronized.
const RING_ATTEMPTS: usize = 300;

type ClauseKey = (BTreeSet<i32>, u32);

pub fn run() -> Result<i32, Error> {
    let mut failures = 0;
    for &(strategy, name) in &[(1u32, "allgather"), (2, "tree"), (3, "ring")] {
        if check_topology(strategy) {
            info!("wire test {}: ok", name);
        } else {
            info!("wire test {}: FAILED", name);
            failures += 1;
        }
    }
    Ok(if failures == 0 { 0 } else { 1 })
}

fn random_clauses(seed: u64) -> Vec<ClauseRef> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..CLAUSES_PER_RANK)
        .map(|_| {
            let len = rng.gen_range(1, 20);
            let mut lits: Vec<Lit> = (0..len)
                .map(|_| Var::from_index(rng.gen_range(0, 3000)).lit(rng.gen()))
                .collect();
            lits.sort_unstable_by_key(|lit| lit.index());
            lits.dedup_by_key(|lit| lit.index());
            let lbd = rng.gen_range(1, 11);
            Clause::new(lits, lbd, -1)
        })
        .collect()
}

/// Canonical form of a clause for set comparison.
fn key(clause: &ClauseRef) -> ClauseKey {
    (
        clause.lits().iter().map(|lit| lit.to_dimacs()).collect(),
        clause.lbd(),
    )
}

/// All clauses the other ranks will import.
fn foreign_keys(rank: usize) -> BTreeSet<ClauseKey> {
    (0..RANKS)
        .filter(|&peer| peer != rank)
        .flat_map(|peer| random_clauses(peer as u64))
        .map(|clause| key(&clause))
        .collect()
}

fn check_topology(gshr_strat: u32) -> bool {
    let endpoints = LocalRouter::cluster(RANKS);

    let handles: Vec<_> = endpoints
        .into_iter()
        .enumerate()
        .map(|(rank, endpoint)| {
            thread::spawn(move || {
                let config = Config {
                    gshr_lit: 4000,
                    ..Config::default()
                };
                let ending = Arc::new(Ending::new());
                let gdb: GlobalDatabaseRef = Arc::new(GlobalDatabase::new(
                    100,
                    Box::new(LockFreeClauseDb::with_max_size(50)),
                    Box::new(LockFreeClauseDb::with_max_size(50)),
                ));
                let transport: Arc<dyn Transport> = Arc::new(endpoint);

                let mut strategy: Box<dyn SharingStrategy> = match gshr_strat {
                    1 => Box::new(AllGatherSharing::new(
                        0,
                        &config,
                        ending,
                        gdb.clone(),
                        transport,
                    )),
                    2 => Box::new(MallobSharing::new(
                        0,
                        &config,
                        ending,
                        gdb.clone(),
                        transport,
                    )),
                    _ => Box::new(RingSharing::new(
                        0,
                        &config,
                        ending,
                        gdb.clone(),
                        transport,
                    )),
                };

                for clause in random_clauses(rank as u64) {
                    gdb.import_clause(clause);
                }

                let wanted = foreign_keys(rank);
                let mut collected: BTreeSet<ClauseKey> = BTreeSet::new();
                let mut scratch = vec![];

                match gshr_strat {
                    // one synchronized round moves everything
                    1 | 2 => {
                        strategy.do_sharing();
                        gdb.export_clauses(&mut scratch);
                        collected.extend(scratch.drain(..).map(|cls| key(&cls)));
                    }
                    // ring ranks free-run; iterate until converged
                    _ => {
                        for _ in 0..RING_ATTEMPTS {
                            strategy.do_sharing();
                            gdb.export_clauses(&mut scratch);
                            collected.extend(scratch.drain(..).map(|cls| key(&cls)));
                            if wanted.is_subset(&collected) {
                                break;
                            }
                            thread::sleep(Duration::from_millis(5));
                        }
                    }
                }

                wanted.is_subset(&collected)
            })
        })
        .collect();

    handles.into_iter().all(|handle| handle.join().unwrap())
}
