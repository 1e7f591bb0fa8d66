//! Binary-tree aggregation topology, after the Mallob clause sharing
//! scheme.
//!
//! Ranks form a binary tree rooted at rank 0 (children of `r` are `2r+1`
//! and `2r+2`). Every round buffers flow leaves-to-root, each internal node
//! merging its children's buffers with its own in ascending clause-size
//! order, and the root's merge travels back down to everyone. The buffer a
//! node may produce is bounded by the empirical growth rule
//! `n · 0.875^log₂(n) · defaultSize`, `n` being the number of aggregated
//! buffers below it; each upward buffer carries that count as a trailing
//! word.
//!
//! Termination: non-root ranks send their end signal straight to the root;
//! the root folds the final result into the control word it broadcasts down
//! the tree at the start of every round, so the whole tree stops in one
//! round.
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};

use peersat_formula::Lit;
use peersat_wire::frame;

use crate::bloom::Bloom;
use crate::clause::{Clause, NO_ORIGIN};
use crate::config::Config;
use crate::ending::{Ending, SolveResult};
use crate::entity::EntityId;
use crate::global::{
    deserialize_clauses, serialize_clauses, GlobalDatabaseRef, GLOBAL_SLEEP_FACTOR,
};
use crate::stats::GlobalStats;
use crate::strategy::SharingStrategy;
use crate::transport::{recv_blocking, Tag, Transport, TransportError};

pub struct MallobSharing {
    id: EntityId,
    gdb: GlobalDatabaseRef,
    transport: Arc<dyn Transport>,
    ending: Arc<Ending>,
    sleep: Duration,
    /// Base buffer size of the growth rule, in words.
    default_size: usize,
    /// Cross-round filter applied to the downward broadcast.
    final_filter: Bloom,
    parent: Option<usize>,
    children: Vec<usize>,
    end_sent: bool,
    stats: GlobalStats,
}

/// The Mallob buffer bound for `n` aggregated buffers.
fn mallob_budget(aggregated: usize, default_size: usize) -> usize {
    let n = aggregated as f64;
    (n * 0.875f64.powf(n.log2()) * default_size as f64) as usize
}

impl MallobSharing {
    pub fn new(
        id: EntityId,
        config: &Config,
        ending: Arc<Ending>,
        gdb: GlobalDatabaseRef,
        transport: Arc<dyn Transport>,
    ) -> MallobSharing {
        let rank = transport.rank();
        let size = transport.size();

        let parent = if rank == 0 { None } else { Some((rank - 1) / 2) };
        let children = [2 * rank + 1, 2 * rank + 2]
            .iter()
            .copied()
            .filter(|&child| child < size)
            .collect();

        MallobSharing {
            id,
            gdb,
            transport,
            ending,
            sleep: config.sharer_sleep() * GLOBAL_SLEEP_FACTOR,
            default_size: config.global_literals_per_round(),
            final_filter: Bloom::new(),
            parent,
            children,
            end_sent: false,
            stats: GlobalStats::default(),
        }
    }

    pub fn init(&self) -> bool {
        if self.transport.size() < 2 {
            info!("[Mallob] single rank, distributed sharing disabled");
            return false;
        }
        debug!(
            "[Mallob {}] parent {:?}, children {:?}",
            self.transport.rank(),
            self.parent,
            self.children
        );
        true
    }

    /// Merge already-sorted clause buffers into one buffer bounded by
    /// `budget` words, dropping within-round duplicates.
    ///
    /// Serialization drains databases smallest-size first, so each input is
    /// ascending by clause size; a k-way merge on (size, LBD) keeps the
    /// output that way. Clauses that do not fit the budget are put back into
    /// the send side instead of being discarded.
    fn merge_buffers(&mut self, buffers: Vec<Vec<i32>>, budget: usize) -> Vec<i32> {
        let parsed: Vec<Vec<(Vec<Lit>, u32)>> = buffers
            .iter()
            .map(|buf| {
                let mut clauses = vec![];
                frame::read_clauses(buf, |lits, lbd| clauses.push((lits, lbd)));
                clauses
            })
            .collect();
        let mut cursors = vec![0usize; parsed.len()];

        let mut round_filter = Bloom::new();
        let mut merged = vec![];

        loop {
            let mut best: Option<usize> = None;
            for (which, clauses) in parsed.iter().enumerate() {
                if cursors[which] >= clauses.len() {
                    continue;
                }
                let head = &clauses[cursors[which]];
                let better = match best {
                    None => true,
                    Some(current) => {
                        let other = &parsed[current][cursors[current]];
                        (head.0.len(), head.1) < (other.0.len(), other.1)
                    }
                };
                if better {
                    best = Some(which);
                }
            }
            let which = match best {
                Some(which) => which,
                None => break,
            };
            let (lits, lbd) = parsed[which][cursors[which]].clone();
            cursors[which] += 1;

            if round_filter.contains_or_insert(&lits) {
                continue;
            }
            if merged.len() + frame::clause_words(lits.len()) > budget {
                // over budget: conserve the clause for a later round
                self.gdb.requeue_to_send(Clause::new(lits, lbd, NO_ORIGIN));
                continue;
            }
            frame::push_clause(&mut merged, &lits, lbd);
        }

        merged
    }

    fn round_inner(&mut self) -> Result<bool, TransportError> {
        let transport = self.transport.clone();
        let rank = transport.rank();

        // control phase: the root decides, everyone forwards downward
        let code = match self.parent {
            None => {
                if self.ending.is_set() {
                    self.ending.result().to_code()
                } else if let Some((from, end)) = transport.try_recv_any(Tag::End)? {
                    debug!("[Mallob 0] end received from {}", from);
                    end[0]
                } else {
                    0
                }
            }
            Some(parent) => {
                if self.ending.is_set() && !self.end_sent {
                    debug!("[Mallob {}] sending end to the root", rank);
                    transport.send(0, Tag::End, &[self.ending.result().to_code()])?;
                    self.end_sent = true;
                }
                recv_blocking(&*transport, parent, Tag::Control)?[0]
            }
        };
        for &child in &self.children {
            transport.send(child, Tag::Control, &[code])?;
        }
        if code != 0 {
            self.ending.trigger(SolveResult::from_code(code));
            return Ok(true);
        }

        // upward aggregation
        let mut aggregated = 1usize;
        let mut buffers: Vec<Vec<i32>> = vec![];
        for index in 0..self.children.len() {
            let child = self.children[index];
            let mut buf = recv_blocking(&*transport, child, Tag::Clauses)?;
            aggregated += buf.pop().unwrap_or(0).max(0) as usize;
            buffers.push(buf);
        }

        let budget = mallob_budget(aggregated, self.default_size);
        let mut mine = vec![];
        let (serialized, _) = serialize_clauses(&self.gdb, None, &mut mine, budget);
        self.stats.shared += serialized;

        let merged = if buffers.is_empty() {
            mine
        } else {
            buffers.push(mine);
            self.merge_buffers(buffers, budget)
        };

        let result = match self.parent {
            Some(parent) => {
                let mut upward = merged;
                upward.push(aggregated as i32);
                transport.send(parent, Tag::Clauses, &upward)?;
                self.stats.messages_sent += 1;

                recv_blocking(&*transport, parent, Tag::Clauses)?
            }
            None => merged,
        };

        // downward broadcast of the root's merge
        for &child in &self.children {
            transport.send(child, Tag::Clauses, &result)?;
            self.stats.messages_sent += 1;
        }

        let (inserted, duplicates) =
            deserialize_clauses(&self.gdb, &mut self.final_filter, &result);
        self.stats.received += inserted;
        self.stats.received_duplicates += duplicates;

        Ok(false)
    }
}

impl SharingStrategy for MallobSharing {
    fn do_sharing(&mut self) -> bool {
        match self.round_inner() {
            Ok(done) => done,
            Err(err) => {
                error!(
                    "[Mallob {}] transport failure, disabling global sharing: {}",
                    self.id, err
                );
                true
            }
        }
    }

    fn sleep_duration(&self) -> Duration {
        self.sleep
    }

    fn log_stats(&self) {
        info!("[Mallob {}] {}", self.id, self.stats);
    }
}
