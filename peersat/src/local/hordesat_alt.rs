//! HordeSat variant with a single shared database.
//!
//! All producers feed one database; one selection sized
//! `literals per round × producer count` is drawn per round and broadcast to
//! every consumer except each clause's origin. Deduplication tests literal
//! sets instead of checksum counts, so there is no promotion here.
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::bloom::Bloom;
use crate::clause::ClauseRef;
use crate::config::Config;
use crate::db::VecClauseDb;
use crate::ending::Ending;
use crate::entity::{literals_in, EntityId, EntityKind, SharingEntity};
use crate::local::{
    rounds_before_increase, EntityRef, FILL_DECREASE_PERCENT, FILL_INCREASE_PERCENT,
};
use crate::stats::SharingStats;
use crate::strategy::SharingStrategy;

pub struct HordeSatAltSharing {
    id: EntityId,
    producers: Vec<EntityRef>,
    consumers: Vec<EntityRef>,
    literals_per_round: usize,
    sleep: Duration,
    init_phase: bool,
    round: u64,
    rounds_before_increase: u64,
    database: VecClauseDb,
    filter: Option<Bloom>,
    unfiltered: Vec<ClauseRef>,
    filtered: Vec<ClauseRef>,
    ending: Arc<Ending>,
    stats: SharingStats,
}

impl HordeSatAltSharing {
    pub fn new(
        id: EntityId,
        config: &Config,
        ending: Arc<Ending>,
        producers: Vec<EntityRef>,
        consumers: Vec<EntityRef>,
    ) -> HordeSatAltSharing {
        HordeSatAltSharing {
            id,
            producers,
            consumers,
            literals_per_round: config.shr_lit,
            sleep: config.sharer_sleep(),
            init_phase: true,
            round: 0,
            rounds_before_increase: rounds_before_increase(config.sharer_sleep()),
            database: VecClauseDb::new(),
            filter: if config.dup { Some(Bloom::new()) } else { None },
            unfiltered: vec![],
            filtered: vec![],
            ending,
            stats: SharingStats::default(),
        }
    }
}

impl SharingStrategy for HordeSatAltSharing {
    fn do_sharing(&mut self) -> bool {
        if self.ending.is_set() {
            return true;
        }

        // fill the shared database from all producers
        for index in 0..self.producers.len() {
            let producer = self.producers[index].clone();

            self.unfiltered.clear();
            self.filtered.clear();

            if let Some(filter) = &mut self.filter {
                producer.export_clauses(&mut self.unfiltered);
                let received = self.unfiltered.len() as u64;
                for clause in self.unfiltered.drain(..) {
                    if !filter.contains_or_insert(clause.lits()) {
                        self.filtered.push(clause);
                    }
                }
                self.stats.received += received;
                self.stats.duplicates += received - self.filtered.len() as u64;
            } else {
                producer.export_clauses(&mut self.filtered);
                self.stats.received += self.filtered.len() as u64;
            }

            // the fill feedback looks at what the producer just offered
            if producer.kind() == EntityKind::Solver {
                let used_percent =
                    100 * literals_in(&self.filtered) / self.literals_per_round;
                if used_percent < FILL_INCREASE_PERCENT && !self.init_phase {
                    producer.increase_clause_production();
                } else if used_percent > FILL_DECREASE_PERCENT {
                    producer.decrease_clause_production();
                }
                if self.round >= self.rounds_before_increase {
                    self.init_phase = false;
                }
            }

            for clause in self.filtered.drain(..) {
                self.database.add_clause(clause);
            }
        }

        // one global selection, broadcast to everyone but each origin
        self.filtered.clear();
        self.database.give_selection(
            &mut self.filtered,
            self.literals_per_round * self.producers.len(),
        );
        self.stats.shared += self.filtered.len() as u64;

        for consumer in &self.consumers {
            for clause in &self.filtered {
                if clause.from() != consumer.id() {
                    consumer.import_clause(clause.clone());
                }
            }
        }
        self.filtered.clear();

        self.round += 1;
        debug!(
            "[HordeSatAlt {}] round {}: received {} shared {}",
            self.id, self.round, self.stats.received, self.stats.shared
        );

        self.ending.is_set()
    }

    fn sleep_duration(&self) -> Duration {
        self.sleep
    }

    fn log_stats(&self) {
        log::info!("[HordeSatAlt {}] {}", self.id, self.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{clause_from_origin, MockEntity};

    #[test]
    fn origin_is_excluded_by_clause_not_producer() {
        let config = Config {
            shr_lit: 100,
            ..Config::default()
        };
        let ending = Arc::new(Ending::new());
        let solvers: Vec<Arc<MockEntity>> =
            (0..3).map(|id| Arc::new(MockEntity::new(id))).collect();
        let entities: Vec<EntityRef> = solvers
            .iter()
            .map(|solver| solver.clone() as EntityRef)
            .collect();
        let mut strategy =
            HordeSatAltSharing::new(3, &config, ending, entities.clone(), entities);

        solvers[0].push_export(clause_from_origin(&[1, 2], 1, 0));
        solvers[1].push_export(clause_from_origin(&[3, 4], 1, 1));

        strategy.do_sharing();

        // each solver sees the other's clause but not its own
        assert_eq!(solvers[0].imported().len(), 1);
        assert_eq!(solvers[0].imported()[0].from(), 1);
        assert_eq!(solvers[1].imported().len(), 1);
        assert_eq!(solvers[1].imported()[0].from(), 0);
        assert_eq!(solvers[2].imported().len(), 2);
    }

    #[test]
    fn duplicates_are_dropped_across_producers() {
        let config = Config {
            shr_lit: 100,
            dup: true,
            ..Config::default()
        };
        let ending = Arc::new(Ending::new());
        let solvers: Vec<Arc<MockEntity>> =
            (0..3).map(|id| Arc::new(MockEntity::new(id))).collect();
        let entities: Vec<EntityRef> = solvers
            .iter()
            .map(|solver| solver.clone() as EntityRef)
            .collect();
        let mut strategy =
            HordeSatAltSharing::new(3, &config, ending, entities.clone(), entities);

        solvers[0].push_export(clause_from_origin(&[1, 2], 1, 0));
        solvers[1].push_export(clause_from_origin(&[2, 1], 1, 1));

        strategy.do_sharing();

        // the permuted duplicate from solver 1 was suppressed
        assert_eq!(solvers[2].imported().len(), 1);
        assert_eq!(strategy.stats.duplicates, 1);
    }
}
