//! The entry layer: wiring engines, strategies, sharers and workers into
//! one portfolio run.
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{info, warn};
use rand::Rng;
use thiserror::Error;

use peersat_formula::{CnfFormula, Lit};

use crate::config::Config;
use crate::db::{LockFreeClauseDb, LockedClauseDb};
use crate::ending::{Ending, SolveResult};
use crate::engine::{EngineRef, SolverEngine};
use crate::entity::{EntityId, SharingEntity};
use crate::global::{
    AllGatherSharing, GlobalDatabase, GlobalDatabaseRef, MallobSharing, RingSharing,
};
use crate::local::{
    EntityRef, HordeSatAltSharing, HordeSatSharing, HordeStrSharing, SimpleSharing,
};
use crate::sharer::{MultiSharer, Sharer};
use crate::strategy::SharingStrategy;
use crate::transport::Transport;
use crate::worker::SequentialWorker;

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("no solver engines were provided")]
    NoEngines,
    #[error("local sharing strategy {0} is not in 1..=5")]
    UnknownLocalStrategy(u32),
    #[error("global sharing strategy {0} is not in 1..=3")]
    UnknownGlobalStrategy(u32),
    #[error("the two-group strategies need more than 2 solvers, got {0}")]
    TooFewSolvers(usize),
    #[error("the strengthening strategy needs two reducer engines")]
    MissingReducers,
    #[error("failed to spawn a thread")]
    ThreadSpawn(#[source] io::Error),
}

/// Result of a portfolio run.
pub struct Outcome {
    pub result: SolveResult,
    /// Satisfying assignment, empty unless the result is `Sat`.
    pub model: Vec<Lit>,
}

/// Race the given engines on `formula`, exchanging clauses per `config`.
///
/// Engines and reducers must carry unique entity ids. With `config.dist`
/// set and a transport given, a global strategy bridges this process to its
/// peers; on a degenerate transport (fewer than 2 ranks) the run silently
/// stays local-only. Blocks until an engine answers, the timeout fires or a
/// peer process announces the end.
pub fn run(
    config: &Config,
    formula: &CnfFormula,
    engines: Vec<EngineRef>,
    reducers: Vec<EngineRef>,
    transport: Option<Arc<dyn Transport>>,
) -> Result<Outcome, PortfolioError> {
    if engines.is_empty() {
        return Err(PortfolioError::NoEngines);
    }

    let ending = Arc::new(Ending::new());
    let mut next_id: EntityId = (engines.len() + reducers.len()) as EntityId;

    // configure and load every engine, one reader thread each
    let mut load_handles = Vec::with_capacity(engines.len() + reducers.len());
    for (index, engine) in engines.iter().chain(reducers.iter()).enumerate() {
        let engine = engine.engine.clone();
        let formula = formula.clone();
        engine.set_lbd_limit(config.lbd_limit);
        engine.diversify(index as u64);
        load_handles.push(
            thread::Builder::new()
                .name("peersat-loader".into())
                .spawn(move || engine.load_formula(&formula))
                .map_err(PortfolioError::ThreadSpawn)?,
        );
    }
    for handle in load_handles {
        if handle.join().is_err() {
            warn!("a formula loading thread panicked, racing its engine anyway");
        }
    }

    let shr_strat = resolve_local_strategy(config, engines.len(), reducers.len())?;

    // the global tier: database bridge plus one topology strategy
    let mut strategies: Vec<Box<dyn SharingStrategy>> = vec![];
    let mut global_db: Option<GlobalDatabaseRef> = None;

    if config.dist {
        if let Some(transport) = transport {
            let gdb: GlobalDatabaseRef = Arc::new(if config.one_sharer {
                GlobalDatabase::new(
                    next_id,
                    Box::new(LockedClauseDb::with_max_size(config.max_cls_size)),
                    Box::new(LockedClauseDb::with_max_size(config.max_cls_size)),
                )
            } else {
                GlobalDatabase::new(
                    next_id,
                    Box::new(LockFreeClauseDb::with_max_size(config.max_cls_size)),
                    Box::new(LockFreeClauseDb::with_max_size(config.max_cls_size)),
                )
            });
            next_id += 1;

            let strategy_id = next_id;
            next_id += 1;
            let global_strategy: Option<Box<dyn SharingStrategy>> = match config.gshr_strat {
                1 => {
                    info!("global strategy: all-gather");
                    let strategy = AllGatherSharing::new(
                        strategy_id,
                        config,
                        ending.clone(),
                        gdb.clone(),
                        transport,
                    );
                    if strategy.init() {
                        Some(Box::new(strategy))
                    } else {
                        None
                    }
                }
                2 => {
                    info!("global strategy: tree aggregation");
                    let strategy = MallobSharing::new(
                        strategy_id,
                        config,
                        ending.clone(),
                        gdb.clone(),
                        transport,
                    );
                    if strategy.init() {
                        Some(Box::new(strategy))
                    } else {
                        None
                    }
                }
                3 => {
                    info!("global strategy: ring");
                    let strategy = RingSharing::new(
                        strategy_id,
                        config,
                        ending.clone(),
                        gdb.clone(),
                        transport,
                    );
                    if strategy.init() {
                        Some(Box::new(strategy))
                    } else {
                        None
                    }
                }
                other => return Err(PortfolioError::UnknownGlobalStrategy(other)),
            };

            if let Some(strategy) = global_strategy {
                strategies.push(strategy);
                global_db = Some(gdb);
            } else {
                warn!("global strategy refused to initialize, staying local-only");
            }
        } else {
            warn!("dist is set but no transport was given, staying local-only");
        }
    }

    // the local tier
    let solver_entities: Vec<EntityRef> =
        engines.iter().map(|engine| engine.entity.clone()).collect();
    let gdb_entity: Option<EntityRef> = global_db
        .as_ref()
        .map(|gdb| gdb.clone() as Arc<dyn SharingEntity>);

    let with_gdb = |mut entities: Vec<EntityRef>| -> Vec<EntityRef> {
        if let Some(gdb) = &gdb_entity {
            entities.insert(0, gdb.clone());
        }
        entities
    };

    match shr_strat {
        1 => {
            info!("local strategy: HordeSat, one group");
            strategies.push(Box::new(HordeSatSharing::new(
                next_id,
                config,
                ending.clone(),
                with_gdb(solver_entities.clone()),
                with_gdb(solver_entities.clone()),
            )));
        }
        2 => {
            info!("local strategy: HordeStr, two groups with reducers");
            let half = engines.len() / 2;
            let reducer0 = reducers[0].entity.clone();
            let reducer1 = reducers[1].entity.clone();

            let mut prod1: Vec<EntityRef> = solver_entities[..half].to_vec();
            prod1.push(reducer0.clone());
            let mut cons1 = solver_entities.clone();
            cons1.push(reducer0.clone());

            let mut prod2: Vec<EntityRef> = solver_entities[half..].to_vec();
            prod2.push(reducer1.clone());
            let mut cons2 = solver_entities.clone();
            cons2.push(reducer1.clone());

            strategies.push(Box::new(HordeStrSharing::new(
                next_id,
                config,
                ending.clone(),
                with_gdb(prod1),
                with_gdb(cons1),
                reducer0,
            )));
            next_id += 1;
            strategies.push(Box::new(HordeStrSharing::new(
                next_id,
                config,
                ending.clone(),
                with_gdb(prod2),
                with_gdb(cons2),
                reducer1,
            )));
        }
        3 => {
            info!("local strategy: HordeSat, two groups");
            let half = engines.len() / 2;
            let last = solver_entities.len() - 1;

            let mut group1: Vec<EntityRef> = solver_entities[..half].to_vec();
            group1.push(solver_entities[last].clone());
            let group2: Vec<EntityRef> = solver_entities[half..last].to_vec();

            strategies.push(Box::new(HordeSatSharing::new(
                next_id,
                config,
                ending.clone(),
                with_gdb(group1.clone()),
                with_gdb(group1),
            )));
            next_id += 1;
            strategies.push(Box::new(HordeSatSharing::new(
                next_id,
                config,
                ending.clone(),
                with_gdb(group2.clone()),
                with_gdb(group2),
            )));
        }
        4 => {
            info!("local strategy: HordeSat, shared database");
            strategies.push(Box::new(HordeSatAltSharing::new(
                next_id,
                config,
                ending.clone(),
                with_gdb(solver_entities.clone()),
                with_gdb(solver_entities.clone()),
            )));
        }
        5 => {
            info!("local strategy: Simple");
            strategies.push(Box::new(SimpleSharing::new(
                next_id,
                config,
                ending.clone(),
                with_gdb(solver_entities.clone()),
                with_gdb(solver_entities.clone()),
            )));
        }
        other => return Err(PortfolioError::UnknownLocalStrategy(other)),
    }

    // launch workers and sharers; a failed spawn unwinds through the
    // already-started workers' interrupt-on-drop
    let mut workers: Vec<SequentialWorker> = Vec::with_capacity(engines.len() + reducers.len());
    for engine in engines.iter().chain(reducers.iter()) {
        workers.push(
            SequentialWorker::start(engine.engine.clone(), ending.clone())
                .map_err(PortfolioError::ThreadSpawn)?,
        );
    }

    let (mut single_sharers, mut multi_sharer) = start_sharers(config, strategies, &ending)?;

    // wait for an answer or the timeout
    match config.timeout_duration() {
        Some(timeout) => {
            let deadline = Instant::now() + timeout;
            while !ending.is_set() {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                ending.wait_round(deadline - now);
            }
            if !ending.is_set() {
                info!("wall-clock limit reached");
                ending.trigger(SolveResult::Timeout);
            }
        }
        None => {
            while !ending.wait_round(std::time::Duration::from_secs(1)) {}
        }
    }

    // wind down: engines first, then the exchange
    for engine in engines.iter().chain(reducers.iter()) {
        engine.engine.set_interrupt();
    }
    for worker in workers.iter_mut() {
        worker.join();
    }
    for sharer in single_sharers.iter_mut() {
        sharer.join();
    }
    if let Some(sharer) = multi_sharer.as_mut() {
        sharer.join();
    }

    Ok(Outcome {
        result: ending.result(),
        model: ending.model(),
    })
}

/// Start one sharer per strategy, or a single multi-sharer for all.
///
/// Sharer threads only exit once the coordinator fires, so a failed spawn
/// triggers it before unwinding; the sharers already running then wind down
/// through their drop-time joins.
fn start_sharers(
    config: &Config,
    strategies: Vec<Box<dyn SharingStrategy>>,
    ending: &Arc<Ending>,
) -> Result<(Vec<Sharer>, Option<MultiSharer>), PortfolioError> {
    if config.one_sharer {
        let sharer = MultiSharer::start(-1, strategies, ending.clone())
            .map_err(PortfolioError::ThreadSpawn)?;
        return Ok((vec![], Some(sharer)));
    }

    let mut sharers = Vec::with_capacity(strategies.len());
    for (index, strategy) in strategies.into_iter().enumerate() {
        match Sharer::start(index as i32, strategy, ending.clone()) {
            Ok(sharer) => sharers.push(sharer),
            Err(err) => {
                ending.trigger(SolveResult::Unknown);
                return Err(PortfolioError::ThreadSpawn(err));
            }
        }
    }
    Ok((sharers, None))
}

/// Pick the local strategy, resolving `0` to a random eligible one.
fn resolve_local_strategy(
    config: &Config,
    engines: usize,
    reducers: usize,
) -> Result<u32, PortfolioError> {
    match config.shr_strat {
        0 => {
            let mut eligible = vec![1, 4, 5];
            if engines > 2 {
                eligible.push(3);
                if reducers >= 2 {
                    eligible.push(2);
                }
            }
            let pick = eligible[rand::thread_rng().gen_range(0, eligible.len())];
            info!("randomly selected local strategy {}", pick);
            Ok(pick)
        }
        strategy @ 1 | strategy @ 4 | strategy @ 5 => Ok(strategy),
        strategy @ 2 | strategy @ 3 => {
            if engines <= 2 {
                return Err(PortfolioError::TooFewSolvers(engines));
            }
            if strategy == 2 && reducers < 2 {
                return Err(PortfolioError::MissingReducers);
            }
            Ok(strategy)
        }
        other => Err(PortfolioError::UnknownLocalStrategy(other)),
    }
}
