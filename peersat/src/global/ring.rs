//! Ring topology: each round one buffer goes to the left neighbor, one to
//! the right, and incoming buffers are probed from both.
//!
//! A clause received from a neighbor is re-queued into the send side so it
//! keeps travelling the ring in later rounds. Two long-lived bloom filters
//! bound that propagation: the receive filter drops clauses seen before,
//! and the send filter — which records every clause this rank ever put on
//! the wire — keeps a clause from being re-broadcast by its originator once
//! it has gone all the way around.
//!
//! Termination is nearest-neighbor too: an ending rank notifies both
//! neighbors and leaves; a rank receiving the signal adopts the result and
//! forwards it once in its next round, so the signal floods the ring in
//! `⌊n/2⌋` rounds.
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};

use crate::bloom::Bloom;
use crate::clause::Clause;
use crate::config::Config;
use crate::ending::{Ending, SolveResult};
use crate::entity::{EntityId, SharingEntity};
use crate::global::{serialize_clauses, GlobalDatabaseRef, GLOBAL_SLEEP_FACTOR};
use crate::stats::GlobalStats;
use crate::strategy::SharingStrategy;
use crate::transport::{Tag, Transport, TransportError};

pub struct RingSharing {
    id: EntityId,
    gdb: GlobalDatabaseRef,
    transport: Arc<dyn Transport>,
    ending: Arc<Ending>,
    sleep: Duration,
    budget: usize,
    send_filter: Bloom,
    recv_filter: Bloom,
    left: usize,
    right: usize,
    end_sent: bool,
    stats: GlobalStats,
}

impl RingSharing {
    pub fn new(
        id: EntityId,
        config: &Config,
        ending: Arc<Ending>,
        gdb: GlobalDatabaseRef,
        transport: Arc<dyn Transport>,
    ) -> RingSharing {
        let rank = transport.rank();
        let size = transport.size();

        RingSharing {
            id,
            gdb,
            transport: transport.clone(),
            ending,
            sleep: config.sharer_sleep() * GLOBAL_SLEEP_FACTOR,
            budget: config.global_literals_per_round(),
            send_filter: Bloom::new(),
            recv_filter: Bloom::new(),
            left: (rank + 1) % size.max(1),
            right: (rank + size.max(1) - 1) % size.max(1),
            end_sent: false,
            stats: GlobalStats::default(),
        }
    }

    pub fn init(&self) -> bool {
        if self.transport.size() < 2 {
            info!("[Ring] single rank, distributed sharing disabled");
            return false;
        }
        debug!(
            "[Ring {}] left {}, right {}",
            self.transport.rank(),
            self.left,
            self.right
        );
        true
    }

    /// Insert a received buffer: novel clauses go into `received` and are
    /// re-queued for onward propagation.
    fn deserialize(&mut self, buf: &[i32]) {
        let gdb = &self.gdb;
        let recv_filter = &mut self.recv_filter;
        let stats = &mut self.stats;

        peersat_wire::frame::read_clauses(buf, |lits, lbd| {
            if recv_filter.contains_or_insert(&lits) {
                stats.received_duplicates += 1;
                return;
            }
            let clause = Clause::new(lits, lbd, gdb.id());
            gdb.add_received(clause.clone());
            gdb.requeue_to_send(clause);
            stats.received += 1;
        });
    }

    fn round_inner(&mut self) -> Result<bool, TransportError> {
        if self.end_sent {
            return Ok(true);
        }
        let transport = self.transport.clone();

        // end signals from either neighbor
        let mut end_code = None;
        if let Some(end) = transport.try_recv(self.left, Tag::End)? {
            debug!("[Ring {}] end received from the left", transport.rank());
            end_code = Some(end[0]);
        }
        if let Some(end) = transport.try_recv(self.right, Tag::End)? {
            debug!("[Ring {}] end received from the right", transport.rank());
            end_code = Some(end[0]);
        }
        if let Some(code) = end_code {
            self.ending.trigger(SolveResult::from_code(code));
        }

        // forward the end once to each neighbor, then leave
        if self.ending.is_set() && !self.end_sent {
            let code = self.ending.result().to_code();
            transport.send(self.left, Tag::End, &[code])?;
            transport.send(self.right, Tag::End, &[code])?;
            self.end_sent = true;
            return Ok(true);
        }

        // serialize once, send both ways
        let mut buf = vec![];
        let (serialized, duplicates) = serialize_clauses(
            &self.gdb,
            Some(&mut self.send_filter),
            &mut buf,
            self.budget,
        );
        self.stats.shared += serialized;
        self.stats.send_duplicates_avoided += duplicates;

        transport.send(self.left, Tag::Clauses, &buf)?;
        transport.send(self.right, Tag::Clauses, &buf)?;
        self.stats.messages_sent += 2;

        // probe for incoming buffers, one per neighbor per round
        if let Some(buf) = transport.try_recv(self.left, Tag::Clauses)? {
            self.deserialize(&buf);
        }
        if let Some(buf) = transport.try_recv(self.right, Tag::Clauses)? {
            self.deserialize(&buf);
        }

        Ok(false)
    }
}

impl SharingStrategy for RingSharing {
    fn do_sharing(&mut self) -> bool {
        match self.round_inner() {
            Ok(done) => done,
            Err(err) => {
                error!(
                    "[Ring {}] transport failure, disabling global sharing: {}",
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
        info!("[Ring {}] {}", self.id, self.stats);
    }
}
