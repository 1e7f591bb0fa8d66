//! All-gather topology: every participating process contributes one
//! fixed-size buffer per round and receives everyone else's.
//!
//! The collective is built from tagged point-to-point messages: each rank
//! sends its round-stamped buffer to every peer and then waits for each
//! peer's buffer for the same round. Ranks advance in lockstep, so a rank
//! that winds down only has to send its end signal plus one final
//! non-participating frame and every peer leaves in the same round.
//!
//! One long-lived bloom filter serves both directions: clauses are recorded
//! when serialized, so a clause gathered back from a peer — including our
//! own — is never inserted twice and never re-sent.
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use peersat_wire::frame;

use crate::bloom::Bloom;
use crate::config::Config;
use crate::ending::{Ending, SolveResult};
use crate::entity::EntityId;
use crate::global::{
    deserialize_concat, serialize_clauses, GlobalDatabaseRef, GLOBAL_SLEEP_FACTOR,
};
use crate::stats::GlobalStats;
use crate::strategy::SharingStrategy;
use crate::transport::{Tag, Transport, TransportError, RECV_TIMEOUT};

pub struct AllGatherSharing {
    id: EntityId,
    gdb: GlobalDatabaseRef,
    transport: Arc<dyn Transport>,
    ending: Arc<Ending>,
    sleep: Duration,
    /// Fixed per-rank buffer size in words.
    buffer_size: usize,
    filter: Bloom,
    round: u64,
    end_sent: bool,
    stats: GlobalStats,
}

impl AllGatherSharing {
    pub fn new(
        id: EntityId,
        config: &Config,
        ending: Arc<Ending>,
        gdb: GlobalDatabaseRef,
        transport: Arc<dyn Transport>,
    ) -> AllGatherSharing {
        AllGatherSharing {
            id,
            gdb,
            transport,
            ending,
            sleep: config.sharer_sleep() * GLOBAL_SLEEP_FACTOR,
            buffer_size: config.global_literals_per_round(),
            filter: Bloom::new(),
            round: 0,
            end_sent: false,
            stats: GlobalStats::default(),
        }
    }

    /// Whether this strategy can run at all.
    ///
    /// With fewer than two ranks there is nothing to exchange and the
    /// strategy refuses to start; the portfolio then stays local-only.
    pub fn init(&self) -> bool {
        if self.transport.size() < 2 {
            info!("[AllGather] single rank, distributed sharing disabled");
            return false;
        }
        true
    }

    fn round_inner(&mut self) -> Result<bool, TransportError> {
        if self.end_sent {
            return Ok(true);
        }
        let round = self.round;
        self.round += 1;

        let transport = self.transport.clone();
        let rank = transport.rank();
        let size = transport.size();

        // a rank that is done announces the end once, then contributes one
        // final empty frame so its peers' collective still completes
        if self.ending.is_set() && !self.end_sent {
            let code = self.ending.result().to_code();
            debug!("[AllGather {}] announcing end to all peers", rank);
            for peer in (0..size).filter(|&peer| peer != rank) {
                transport.send(peer, Tag::End, &[code])?;
            }
            self.end_sent = true;
        }
        let participate = !self.end_sent;

        // serialize this round's buffer
        let mut message = vec![round as i32, participate as i32];
        if participate {
            let (serialized, duplicates) = serialize_clauses(
                &self.gdb,
                Some(&mut self.filter),
                &mut message,
                self.buffer_size,
            );
            frame::pad_to(&mut message, 2 + self.buffer_size);
            self.stats.shared += serialized;
            self.stats.send_duplicates_avoided += duplicates;
        }

        for peer in (0..size).filter(|&peer| peer != rank) {
            transport.send(peer, Tag::Clauses, &message)?;
            self.stats.messages_sent += 1;
        }

        if !participate {
            // end announced, peers got their final frame, nothing to gather
            return Ok(true);
        }

        // gather every peer's frame for this round
        let mut end_code = None;
        let mut gathered = message[2..].to_vec();
        let mut participants = 1;

        for peer in (0..size).filter(|&peer| peer != rank) {
            let deadline = Instant::now() + RECV_TIMEOUT;
            loop {
                if let Some(end) = transport.try_recv(peer, Tag::End)? {
                    end_code = Some(end[0]);
                }
                if let Some(frame) = transport.try_recv(peer, Tag::Clauses)? {
                    if (frame[0] as u64) < round {
                        // stale frame of an earlier round
                        continue;
                    }
                    debug_assert_eq!(frame[0] as u64, round);
                    if frame[1] != 0 {
                        gathered.extend_from_slice(&frame[2..]);
                        participants += 1;
                    }
                    break;
                }
                if Instant::now() >= deadline {
                    return Err(TransportError::Timeout(peer));
                }
                thread::sleep(Duration::from_millis(1));
            }
        }

        if participants < 2 {
            debug!("[AllGather {}] not enough ranks willing to share", rank);
            if let Some(code) = end_code {
                self.ending.trigger(SolveResult::from_code(code));
            }
            return Ok(true);
        }

        let (inserted, duplicates) = deserialize_concat(
            &self.gdb,
            &mut self.filter,
            &gathered,
            self.buffer_size,
            participants,
        );
        self.stats.received += inserted;
        self.stats.received_duplicates += duplicates;

        // ends noticed while gathering, or arriving just after
        if end_code.is_none() {
            if let Some((_, end)) = transport.try_recv_any(Tag::End)? {
                end_code = Some(end[0]);
            }
        }
        if let Some(code) = end_code {
            debug!("[AllGather {}] end received", rank);
            self.ending.trigger(SolveResult::from_code(code));
            return Ok(true);
        }

        Ok(false)
    }
}

impl SharingStrategy for AllGatherSharing {
    fn do_sharing(&mut self) -> bool {
        match self.round_inner() {
            Ok(done) => done,
            Err(err) => {
                error!(
                    "[AllGather {}] transport failure, disabling global sharing: {}",
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
        info!("[AllGather {}] {}", self.id, self.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LockFreeClauseDb;
    use crate::entity::SharingEntity;
    use crate::global::GlobalDatabase;
    use crate::test::clause_from;
    use crate::transport::LocalRouter;

    fn strategy(
        endpoint: LocalRouter,
        buffer_size: usize,
    ) -> (AllGatherSharing, GlobalDatabaseRef, Arc<Ending>) {
        let config = Config {
            gshr_lit: buffer_size,
            ..Config::default()
        };
        let ending = Arc::new(Ending::new());
        let gdb = Arc::new(GlobalDatabase::new(
            100,
            Box::new(LockFreeClauseDb::with_max_size(50)),
            Box::new(LockFreeClauseDb::with_max_size(50)),
        ));
        let strategy = AllGatherSharing::new(
            0,
            &config,
            ending.clone(),
            gdb.clone(),
            Arc::new(endpoint),
        );
        (strategy, gdb, ending)
    }

    #[test]
    fn refuses_single_rank() {
        let mut endpoints = LocalRouter::cluster(1);
        let (strategy, _, _) = strategy(endpoints.pop().unwrap(), 20);
        assert!(!strategy.init());
    }

    #[test]
    fn three_ranks_exchange_one_clause_each() {
        let endpoints = LocalRouter::cluster(3);

        let handles: Vec<_> = endpoints
            .into_iter()
            .enumerate()
            .map(|(rank, endpoint)| {
                thread::spawn(move || {
                    let (mut strategy, gdb, _ending) = strategy(endpoint, 20);
                    assert!(strategy.init());
                    let clause = match rank {
                        0 => clause_from(&[1, 2], 3),
                        1 => clause_from(&[-3, 4, 5], 4),
                        _ => clause_from(&[6], 0),
                    };
                    gdb.import_clause(clause);

                    assert!(!strategy.do_sharing());

                    let mut received = vec![];
                    gdb.export_clauses(&mut received);
                    received
                        .iter()
                        .map(|cls| (cls.size(), cls.lbd()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            let mut received = handle.join().unwrap();
            received.sort_unstable();
            // each rank sees the two foreign clauses; its own was filtered
            // by the long-lived send filter
            assert_eq!(received.len(), 2);
            for &(size, lbd) in &received {
                match size {
                    1 => assert_eq!(lbd, 0),
                    2 => assert_eq!(lbd, 3),
                    3 => assert_eq!(lbd, 4),
                    _ => panic!("unexpected clause size {}", size),
                }
            }
        }
    }

    #[test]
    fn end_is_adopted_by_all_ranks() {
        let endpoints = LocalRouter::cluster(3);

        let handles: Vec<_> = endpoints
            .into_iter()
            .enumerate()
            .map(|(rank, endpoint)| {
                thread::spawn(move || {
                    let (mut strategy, _gdb, ending) = strategy(endpoint, 20);
                    assert!(strategy.init());
                    if rank == 1 {
                        ending.trigger(SolveResult::Unsat);
                    }
                    // at most two rounds until everyone is done
                    let mut rounds = 0;
                    while !strategy.do_sharing() {
                        rounds += 1;
                        assert!(rounds < 3);
                    }
                    ending.result()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), SolveResult::Unsat);
        }
    }
}
