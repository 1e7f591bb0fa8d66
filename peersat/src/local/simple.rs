//! Minimal sharing strategy.
//!
//! Like the shared-database HordeSat variant but without any
//! production-rate feedback: producers fill one database, one selection per
//! round goes to every consumer except each clause's origin.
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::bloom::Bloom;
use crate::clause::ClauseRef;
use crate::config::Config;
use crate::db::VecClauseDb;
use crate::ending::Ending;
use crate::entity::{EntityId, SharingEntity};
use crate::local::EntityRef;
use crate::stats::SharingStats;
use crate::strategy::SharingStrategy;

pub struct SimpleSharing {
    id: EntityId,
    producers: Vec<EntityRef>,
    consumers: Vec<EntityRef>,
    literals_per_round: usize,
    sleep: Duration,
    database: VecClauseDb,
    filter: Option<Bloom>,
    unfiltered: Vec<ClauseRef>,
    filtered: Vec<ClauseRef>,
    ending: Arc<Ending>,
    stats: SharingStats,
}

impl SimpleSharing {
    pub fn new(
        id: EntityId,
        config: &Config,
        ending: Arc<Ending>,
        producers: Vec<EntityRef>,
        consumers: Vec<EntityRef>,
    ) -> SimpleSharing {
        SimpleSharing {
            id,
            producers,
            consumers,
            literals_per_round: config.shr_lit,
            sleep: config.sharer_sleep(),
            database: VecClauseDb::new(),
            filter: if config.dup { Some(Bloom::new()) } else { None },
            unfiltered: vec![],
            filtered: vec![],
            ending,
            stats: SharingStats::default(),
        }
    }
}

impl SharingStrategy for SimpleSharing {
    fn do_sharing(&mut self) -> bool {
        if self.ending.is_set() {
            return true;
        }

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

            for clause in self.filtered.drain(..) {
                self.database.add_clause(clause);
            }
        }

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

        debug!(
            "[Simple {}] received {} shared {}",
            self.id, self.stats.received, self.stats.shared
        );

        self.ending.is_set()
    }

    fn sleep_duration(&self) -> Duration {
        self.sleep
    }

    fn log_stats(&self) {
        log::info!("[Simple {}] {}", self.id, self.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{clause_from_origin, MockEntity};

    #[test]
    fn no_rate_feedback_is_given() {
        let config = Config {
            shr_lit: 10,
            ..Config::default()
        };
        let ending = Arc::new(Ending::new());
        let solvers: Vec<Arc<MockEntity>> =
            (0..2).map(|id| Arc::new(MockEntity::new(id))).collect();
        let entities: Vec<EntityRef> = solvers
            .iter()
            .map(|solver| solver.clone() as EntityRef)
            .collect();
        let mut strategy = SimpleSharing::new(2, &config, ending, entities.clone(), entities);

        solvers[0].push_export(clause_from_origin(&[1, 2], 1, 0));
        strategy.do_sharing();

        assert_eq!(solvers[0].production_increases(), 0);
        assert_eq!(solvers[0].production_decreases(), 0);
        assert_eq!(solvers[1].imported().len(), 1);
    }
}
