//! End-to-end portfolio runs with synthetic engines, including
//! multi-process runs simulated over the in-process transport.
use std::sync::Arc;
use std::thread;

use peersat::config::Config;
use peersat::ending::SolveResult;
use peersat::engine::{EngineRef, SyntheticEngine};
use peersat::portfolio;
use peersat::transport::{LocalRouter, Transport};

use peersat_formula::lit::lits_from_dimacs;
use peersat_formula::CnfFormula;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_formula() -> CnfFormula {
    let mut formula = CnfFormula::new();
    formula.add_clause(&lits_from_dimacs(&[1, 2, 3]));
    formula.add_clause(&lits_from_dimacs(&[-1, 4]));
    formula.set_var_count(80);
    formula
}

fn engines(count: usize, first_id: i32) -> (Vec<Arc<SyntheticEngine>>, Vec<EngineRef>) {
    let concrete: Vec<Arc<SyntheticEngine>> = (0..count)
        .map(|index| Arc::new(SyntheticEngine::new(first_id + index as i32, 2)))
        .collect();
    let refs = concrete
        .iter()
        .map(|engine| EngineRef::new(engine.clone()))
        .collect();
    (concrete, refs)
}

fn fast_config() -> Config {
    Config {
        cpus: 3,
        timeout: 1,
        shr_strat: 1,
        shr_sleep: 20_000,
        shr_lit: 400,
        lbd_limit: 2,
        ..Config::default()
    }
}

#[test]
fn local_portfolio_times_out_and_exchanges() {
    init_logging();
    let (concrete, refs) = engines(3, 0);

    let outcome =
        portfolio::run(&fast_config(), &small_formula(), refs, vec![], None).unwrap();

    assert_eq!(outcome.result, SolveResult::Timeout);
    assert!(outcome.model.is_empty());
    // clauses flowed between the engines while the run lasted
    assert!(
        concrete.iter().any(|engine| engine.imported() > 0),
        "no clauses were exchanged"
    );
}

#[test]
fn multi_sharer_drives_all_strategies() {
    let (_concrete, refs) = engines(3, 0);
    let config = Config {
        shr_strat: 4,
        one_sharer: true,
        ..fast_config()
    };

    let outcome = portfolio::run(&config, &small_formula(), refs, vec![], None).unwrap();
    assert_eq!(outcome.result, SolveResult::Timeout);
}

#[test]
fn duplicate_detection_run_stays_healthy() {
    let (_concrete, refs) = engines(3, 0);
    let config = Config {
        dup: true,
        ..fast_config()
    };

    let outcome = portfolio::run(&config, &small_formula(), refs, vec![], None).unwrap();
    assert_eq!(outcome.result, SolveResult::Timeout);
}

/// One rank hits its wall-clock limit; the all-gather end signal must stop
/// the other rank, which has no timeout of its own.
#[test]
fn all_gather_end_propagates_across_ranks() {
    init_logging();
    let endpoints = LocalRouter::cluster(2);

    let handles: Vec<_> = endpoints
        .into_iter()
        .enumerate()
        .map(|(rank, endpoint)| {
            thread::spawn(move || {
                let config = Config {
                    timeout: if rank == 0 { 1 } else { 0 },
                    dist: true,
                    gshr_strat: 1,
                    gshr_lit: 2000,
                    ..fast_config()
                };
                let (_concrete, refs) = engines(2, 0);
                let transport: Arc<dyn Transport> = Arc::new(endpoint);
                portfolio::run(
                    &config,
                    &small_formula(),
                    refs,
                    vec![],
                    Some(transport),
                )
                .unwrap()
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.join().unwrap();
        assert_eq!(outcome.result, SolveResult::Timeout);
    }
}

/// Same cross-rank shutdown over the ring topology, three ranks.
#[test]
fn ring_end_propagates_across_ranks() {
    let endpoints = LocalRouter::cluster(3);

    let handles: Vec<_> = endpoints
        .into_iter()
        .enumerate()
        .map(|(rank, endpoint)| {
            thread::spawn(move || {
                let config = Config {
                    timeout: if rank == 1 { 1 } else { 0 },
                    dist: true,
                    gshr_strat: 3,
                    gshr_lit: 2000,
                    ..fast_config()
                };
                let (_concrete, refs) = engines(2, 0);
                let transport: Arc<dyn Transport> = Arc::new(endpoint);
                portfolio::run(
                    &config,
                    &small_formula(),
                    refs,
                    vec![],
                    Some(transport),
                )
                .unwrap()
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.join().unwrap();
        assert_eq!(outcome.result, SolveResult::Timeout);
    }
}

/// A reducer-backed strengthening pipeline keeps the exchange alive end to
/// end.
#[test]
fn strengthening_pipeline_runs() {
    let (_concrete, refs) = engines(4, 0);
    let (reducer_concrete, reducer_refs) = engines(2, 4);
    let config = Config {
        shr_strat: 2,
        ..fast_config()
    };

    let outcome =
        portfolio::run(&config, &small_formula(), refs, reducer_refs, None).unwrap();

    assert_eq!(outcome.result, SolveResult::Timeout);
    // the reducers saw traffic from their producer groups
    assert!(reducer_concrete.iter().any(|reducer| reducer.imported() > 0));
}
