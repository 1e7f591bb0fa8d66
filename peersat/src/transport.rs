//! Message passing between the processes of a distributed portfolio.
//!
//! Global strategies exchange flat `i32` buffers over tagged point-to-point
//! channels. The trait is deliberately small — rank, world size, send,
//! polling receive — so a topology can be driven over an in-process router
//! (tests, single host) or a TCP mesh (multiple hosts) alike.
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

pub mod local;
pub mod tcp;

pub use local::LocalRouter;
pub use tcp::TcpMesh;

/// Message tags.
///
/// Clause buffers and end signals use distinct tags so an end signal is
/// never mistaken for an empty clause buffer; control frames carry the
/// per-round result broadcast of the tree topology.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tag {
    Clauses = 0,
    End = 1,
    Control = 2,
}

/// Number of distinct tags.
pub(crate) const TAG_COUNT: usize = 3;

/// Transport failures.
///
/// All of these are fatal for the affected global strategy: it logs the
/// error and disables itself while the local tier keeps running.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer {0} disconnected")]
    Disconnected(usize),
    #[error("timed out waiting for peer {0}")]
    Timeout(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Tagged point-to-point message passing between the ranks of one run.
pub trait Transport: Send + Sync {
    /// Rank of this process, `0..size`.
    fn rank(&self) -> usize;

    /// Number of participating processes.
    fn size(&self) -> usize;

    /// Send a buffer to a peer. Buffered and non-blocking.
    fn send(&self, to: usize, tag: Tag, payload: &[i32]) -> Result<(), TransportError>;

    /// Take the next pending buffer with the given tag from a peer, if any.
    ///
    /// Messages from one peer with one tag arrive in send order.
    fn try_recv(&self, from: usize, tag: Tag) -> Result<Option<Vec<i32>>, TransportError>;

    /// Take the next pending buffer with the given tag from any peer.
    fn try_recv_any(&self, tag: Tag) -> Result<Option<(usize, Vec<i32>)>, TransportError> {
        for from in 0..self.size() {
            if from == self.rank() {
                continue;
            }
            if let Some(payload) = self.try_recv(from, tag)? {
                return Ok(Some((from, payload)));
            }
        }
        Ok(None)
    }
}

/// How long a blocking receive waits before declaring the peer lost.
pub(crate) const RECV_TIMEOUT: Duration = Duration::from_secs(60);

/// Poll interval of blocking receives.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Wait for a buffer with the given tag from a peer.
///
/// Polling with a bounded wait: a topology round blocks on its neighbors, so
/// a vanished peer must surface as an error instead of a hang.
pub fn recv_blocking(
    transport: &dyn Transport,
    from: usize,
    tag: Tag,
) -> Result<Vec<i32>, TransportError> {
    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        if let Some(payload) = transport.try_recv(from, tag)? {
            return Ok(payload);
        }
        if Instant::now() >= deadline {
            return Err(TransportError::Timeout(from));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_recv_any_scans_all_peers() {
        let endpoints = LocalRouter::cluster(3);
        endpoints[2].send(1, Tag::End, &[10]).unwrap();

        assert!(endpoints[1].try_recv_any(Tag::Clauses).unwrap().is_none());
        let (from, payload) = endpoints[1].try_recv_any(Tag::End).unwrap().unwrap();
        assert_eq!(from, 2);
        assert_eq!(payload, vec![10]);
    }

    #[test]
    fn recv_blocking_returns_sent_payload() {
        let endpoints = LocalRouter::cluster(2);
        endpoints[0].send(1, Tag::Clauses, &[1, 2, 3]).unwrap();
        let payload = recv_blocking(&endpoints[1], 0, Tag::Clauses).unwrap();
        assert_eq!(payload, vec![1, 2, 3]);
    }
}
