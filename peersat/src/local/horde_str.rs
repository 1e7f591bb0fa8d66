//! Strengthening pipeline through a reducer.
//!
//! Two-stage variant of HordeSat: producer exports first pass to a dedicated
//! reducer entity, which shrinks clauses before wider dissemination; the
//! reducer's own exports then feed the ordinary consumers.
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use rustc_hash::FxHashMap;

use crate::clause::ClauseRef;
use crate::config::Config;
use crate::db::VecClauseDb;
use crate::ending::Ending;
use crate::entity::{EntityId, EntityKind, SharingEntity};
use crate::local::{EntityRef, FILL_DECREASE_PERCENT, FILL_INCREASE_PERCENT};
use crate::stats::SharingStats;
use crate::strategy::SharingStrategy;

pub struct HordeStrSharing {
    id: EntityId,
    producers: Vec<EntityRef>,
    consumers: Vec<EntityRef>,
    reducer: EntityRef,
    literals_per_round: usize,
    sleep: Duration,
    init_phase: bool,
    round: u64,
    databases: FxHashMap<EntityId, VecClauseDb>,
    tmp: Vec<ClauseRef>,
    ending: Arc<Ending>,
    stats: SharingStats,
}

impl HordeStrSharing {
    pub fn new(
        id: EntityId,
        config: &Config,
        ending: Arc<Ending>,
        producers: Vec<EntityRef>,
        consumers: Vec<EntityRef>,
        reducer: EntityRef,
    ) -> HordeStrSharing {
        HordeStrSharing {
            id,
            producers,
            consumers,
            reducer,
            literals_per_round: config.shr_lit,
            sleep: config.sharer_sleep(),
            init_phase: true,
            round: 0,
            databases: FxHashMap::default(),
            tmp: vec![],
            ending,
            stats: SharingStats::default(),
        }
    }
}

impl SharingStrategy for HordeStrSharing {
    fn do_sharing(&mut self) -> bool {
        if self.ending.is_set() {
            return true;
        }

        // stage one: producers to the reducer
        for index in 0..self.producers.len() {
            let producer = self.producers[index].clone();
            let db = self
                .databases
                .entry(producer.id())
                .or_insert_with(VecClauseDb::new);

            self.tmp.clear();
            producer.export_clauses(&mut self.tmp);
            self.stats.received += self.tmp.len() as u64;

            for clause in self.tmp.drain(..) {
                db.add_clause(clause);
            }

            match producer.kind() {
                EntityKind::Solver => {
                    let (used, count) =
                        db.give_selection_counted(&mut self.tmp, self.literals_per_round);
                    let used_percent = 100 * used / self.literals_per_round;
                    if used_percent < FILL_INCREASE_PERCENT {
                        producer.increase_clause_production();
                    } else if used_percent > FILL_DECREASE_PERCENT {
                        producer.decrease_clause_production();
                    }
                    if count > 0 && self.init_phase {
                        self.init_phase = false;
                        debug!(
                            "[HordeStr {}] first filled buffer at {}%",
                            self.id, used_percent
                        );
                    }
                }
                _ => {
                    db.give_selection(&mut self.tmp, self.literals_per_round);
                }
            }

            self.stats.shared += self.tmp.len() as u64;
            self.reducer.import_clauses(&self.tmp);
            self.tmp.clear();
        }

        // stage two: the reducer to the consumers
        let reducer = self.reducer.clone();
        let db = self
            .databases
            .entry(reducer.id())
            .or_insert_with(VecClauseDb::new);

        self.tmp.clear();
        reducer.export_clauses(&mut self.tmp);
        self.stats.received += self.tmp.len() as u64;

        for clause in self.tmp.drain(..) {
            db.add_clause(clause);
        }

        let (used, count) = db.give_selection_counted(&mut self.tmp, self.literals_per_round);
        let used_percent = 100 * used / self.literals_per_round;
        if used_percent < FILL_INCREASE_PERCENT {
            reducer.increase_clause_production();
        } else if used_percent > FILL_DECREASE_PERCENT {
            reducer.decrease_clause_production();
        }
        if count > 0 {
            self.init_phase = false;
        }

        self.stats.shared += self.tmp.len() as u64;
        for consumer in &self.consumers {
            if consumer.id() != reducer.id() {
                consumer.import_clauses(&self.tmp);
            }
        }
        self.tmp.clear();

        self.round += 1;
        debug!(
            "[HordeStr {}] round {}: received {} shared {}",
            self.id, self.round, self.stats.received, self.stats.shared
        );

        self.ending.is_set()
    }

    fn sleep_duration(&self) -> Duration {
        self.sleep
    }

    fn log_stats(&self) {
        log::info!("[HordeStr {}] {}", self.id, self.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{clause_from, MockEntity};

    #[test]
    fn exports_pass_through_the_reducer() {
        let config = Config {
            shr_lit: 100,
            ..Config::default()
        };
        let ending = Arc::new(Ending::new());
        let solvers: Vec<Arc<MockEntity>> =
            (0..2).map(|id| Arc::new(MockEntity::new(id))).collect();
        let reducer = Arc::new(MockEntity::new(2));

        let producers: Vec<EntityRef> = solvers
            .iter()
            .map(|solver| solver.clone() as EntityRef)
            .collect();
        let mut consumers: Vec<EntityRef> = producers.clone();
        consumers.push(reducer.clone() as EntityRef);

        let mut strategy = HordeStrSharing::new(
            3,
            &config,
            ending,
            producers,
            consumers,
            reducer.clone() as EntityRef,
        );

        solvers[0].push_export(clause_from(&[1, 2, 3], 2));

        // round one: the clause reaches only the reducer
        strategy.do_sharing();
        assert_eq!(reducer.imported().len(), 1);
        assert!(solvers[1].imported().is_empty());

        // the reducer "strengthens" it and republishes
        reducer.push_export(clause_from(&[1, 2], 1));

        // round two: the reducer's output reaches the consumers
        strategy.do_sharing();
        assert_eq!(solvers[0].imported().len(), 1);
        assert_eq!(solvers[1].imported().len(), 1);
        assert_eq!(solvers[1].imported()[0].size(), 2);
        // but not the reducer itself
        assert_eq!(reducer.imported().len(), 1);
    }
}
