//! In-process transport for tests and the single-host harness.
//!
//! All ranks live in one process; a send appends to the receiver's mailbox
//! queue for that sender and tag. Queues are unbounded, matching the
//! fire-and-forget send contract.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::transport::{Tag, Transport, TransportError, TAG_COUNT};

type Queue = Mutex<VecDeque<Vec<i32>>>;

struct Shared {
    /// `queues[dst][src][tag]`
    queues: Vec<Vec<Vec<Queue>>>,
}

/// One rank's endpoint of an in-process cluster.
pub struct LocalRouter {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalRouter {
    /// Create a cluster of `size` connected endpoints.
    pub fn cluster(size: usize) -> Vec<LocalRouter> {
        let queues = (0..size)
            .map(|_| {
                (0..size)
                    .map(|_| (0..TAG_COUNT).map(|_| Mutex::new(VecDeque::new())).collect())
                    .collect()
            })
            .collect();
        let shared = Arc::new(Shared { queues });

        (0..size)
            .map(|rank| LocalRouter {
                rank,
                shared: shared.clone(),
            })
            .collect()
    }
}

impl Transport for LocalRouter {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.queues.len()
    }

    fn send(&self, to: usize, tag: Tag, payload: &[i32]) -> Result<(), TransportError> {
        self.shared.queues[to][self.rank][tag as usize]
            .lock()
            .unwrap()
            .push_back(payload.to_vec());
        Ok(())
    }

    fn try_recv(&self, from: usize, tag: Tag) -> Result<Option<Vec<i32>>, TransportError> {
        Ok(self.shared.queues[self.rank][from][tag as usize]
            .lock()
            .unwrap()
            .pop_front())
    }
}
