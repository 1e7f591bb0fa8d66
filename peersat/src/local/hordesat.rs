//! The default HordeSat-style sharing strategy.
//!
//! One private database per producer. Each round a producer's exports are
//! filtered for duplicates, stored, and a budgeted selection is broadcast to
//! every other consumer. Solvers additionally get production-rate feedback
//! from the buffer fill.
//!
//! With duplicate detection enabled, repeated sightings of the same checksum
//! promote the clause: the sixth sighting lowers its LBD to the tier-2
//! level, the eleventh to the core level, and the promoted clause is
//! forwarded again.
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use rustc_hash::FxHashMap;

use crate::bloom::CountingBloom;
use crate::clause::ClauseRef;
use crate::config::Config;
use crate::db::VecClauseDb;
use crate::ending::Ending;
use crate::entity::{EntityId, EntityKind, SharingEntity};
use crate::local::{
    EntityRef, CORE_COUNT, CORE_LBD, DUP_WINDOW, FILL_DECREASE_PERCENT, FILL_INCREASE_PERCENT,
    TIER2_COUNT, TIER2_LBD,
};
use crate::stats::SharingStats;
use crate::strategy::SharingStrategy;

pub struct HordeSatSharing {
    id: EntityId,
    producers: Vec<EntityRef>,
    consumers: Vec<EntityRef>,
    literals_per_round: usize,
    sleep: Duration,
    init_phase: bool,
    round: u64,
    databases: FxHashMap<EntityId, VecClauseDb>,
    filter: Option<CountingBloom>,
    unfiltered: Vec<ClauseRef>,
    filtered: Vec<ClauseRef>,
    ending: Arc<Ending>,
    stats: SharingStats,
}

impl HordeSatSharing {
    pub fn new(
        id: EntityId,
        config: &Config,
        ending: Arc<Ending>,
        producers: Vec<EntityRef>,
        consumers: Vec<EntityRef>,
    ) -> HordeSatSharing {
        HordeSatSharing {
            id,
            producers,
            consumers,
            literals_per_round: config.shr_lit,
            sleep: config.sharer_sleep(),
            init_phase: true,
            round: 0,
            databases: FxHashMap::default(),
            filter: if config.dup {
                Some(CountingBloom::new())
            } else {
                None
            },
            unfiltered: vec![],
            filtered: vec![],
            ending,
            stats: SharingStats::default(),
        }
    }
}

impl SharingStrategy for HordeSatSharing {
    fn do_sharing(&mut self) -> bool {
        if self.ending.is_set() {
            return true;
        }

        for index in 0..self.producers.len() {
            let producer = self.producers[index].clone();
            let db = self
                .databases
                .entry(producer.id())
                .or_insert_with(VecClauseDb::new);

            self.unfiltered.clear();
            self.filtered.clear();

            if let Some(filter) = &self.filter {
                producer.export_clauses(&mut self.unfiltered);
                let received = self.unfiltered.len() as u64;
                for clause in self.unfiltered.drain(..) {
                    let count = filter.test_and_insert(clause.checksum(), DUP_WINDOW);
                    let lbd = clause.lbd();
                    let forward = count == 1
                        || (count == TIER2_COUNT && lbd > TIER2_LBD)
                        || (count == CORE_COUNT && lbd > CORE_LBD);

                    if count == TIER2_COUNT && lbd > TIER2_LBD {
                        clause.promote_lbd(TIER2_LBD);
                        self.stats.promotions_tier2 += 1;
                    } else if count == TIER2_COUNT {
                        self.stats.already_tier2 += 1;
                    } else if count == CORE_COUNT && lbd > CORE_LBD {
                        clause.promote_lbd(CORE_LBD);
                        self.stats.promotions_core += 1;
                    } else if count == CORE_COUNT {
                        self.stats.already_core += 1;
                    }

                    if forward {
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
                db.add_clause(clause);
            }

            // selection, with rate feedback when the producer is a solver
            match producer.kind() {
                EntityKind::Solver => {
                    let (used, count) =
                        db.give_selection_counted(&mut self.filtered, self.literals_per_round);
                    let used_percent = 100 * used / self.literals_per_round;
                    if used_percent < FILL_INCREASE_PERCENT {
                        producer.increase_clause_production();
                        debug!(
                            "[HordeSat {}] production increase for solver {}",
                            self.id,
                            producer.id()
                        );
                    } else if used_percent > FILL_DECREASE_PERCENT {
                        producer.decrease_clause_production();
                        debug!(
                            "[HordeSat {}] production decrease for solver {}",
                            self.id,
                            producer.id()
                        );
                    }
                    if count > 0 && self.init_phase {
                        self.init_phase = false;
                        debug!(
                            "[HordeSat {}] first filled buffer at {}%",
                            self.id, used_percent
                        );
                    }
                }
                _ => {
                    db.give_selection(&mut self.filtered, self.literals_per_round);
                }
            }

            self.stats.shared += self.filtered.len() as u64;

            for consumer in &self.consumers {
                if consumer.id() != producer.id() {
                    consumer.import_clauses(&self.filtered);
                }
            }

            // drop this round's local references
            self.filtered.clear();
        }

        self.round += 1;
        debug!(
            "[HordeSat {}] round {}: received {} shared {}",
            self.id, self.round, self.stats.received, self.stats.shared
        );

        self.ending.is_set()
    }

    fn sleep_duration(&self) -> Duration {
        self.sleep
    }

    fn log_stats(&self) {
        log::info!("[HordeSat {}] {}", self.id, self.stats);
    }
}
