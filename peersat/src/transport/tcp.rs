//! TCP mesh transport for multi-host runs.
//!
//! Every pair of ranks shares one socket: rank `i` connects to every rank
//! below it and accepts from every rank above it, identifying itself with a
//! one-word handshake. A reader thread per peer parses length-prefixed
//! frames into the local mailbox; sends write frames under a per-peer lock.
//!
//! Frame layout, all words little-endian `i32`:
//!
//! ```text
//! <tag> <len> <payload word 0> … <payload word len-1>
//! ```
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::transport::{Tag, Transport, TransportError, TAG_COUNT};

/// How long to keep retrying the initial connection to a peer.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_RETRY: Duration = Duration::from_millis(100);

type Queue = Mutex<VecDeque<Vec<i32>>>;

struct Inbox {
    /// `queues[src][tag]`
    queues: Vec<Vec<Queue>>,
    disconnected: Vec<AtomicBool>,
}

pub struct TcpMesh {
    rank: usize,
    size: usize,
    /// Write side of each peer socket, `None` at our own rank.
    peers: Vec<Option<Mutex<TcpStream>>>,
    inbox: Arc<Inbox>,
}

impl TcpMesh {
    /// Join the mesh described by `addrs`, binding `addrs[rank]` locally.
    ///
    /// Blocks until a socket to every peer exists. Reader threads detach;
    /// they exit when their socket closes.
    pub fn connect(rank: usize, addrs: &[SocketAddr]) -> io::Result<TcpMesh> {
        let size = addrs.len();
        assert!(rank < size);

        let listener = TcpListener::bind(addrs[rank])?;

        let mut sockets: Vec<Option<TcpStream>> = (0..size).map(|_| None).collect();

        // lower ranks are dialed, higher ranks dial us
        for peer in 0..rank {
            let stream = dial(addrs[peer])?;
            stream.set_nodelay(true)?;
            write_word(&stream, rank as i32)?;
            sockets[peer] = Some(stream);
            debug!("rank {} connected to peer {}", rank, peer);
        }
        for _ in rank + 1..size {
            let (stream, _) = listener.accept()?;
            stream.set_nodelay(true)?;
            let peer = read_word(&stream)? as usize;
            sockets[peer] = Some(stream);
            debug!("rank {} accepted peer {}", rank, peer);
        }

        let inbox = Arc::new(Inbox {
            queues: (0..size)
                .map(|_| (0..TAG_COUNT).map(|_| Mutex::new(VecDeque::new())).collect())
                .collect(),
            disconnected: (0..size).map(|_| AtomicBool::new(false)).collect(),
        });

        let mut peers = Vec::with_capacity(size);
        for (peer, socket) in sockets.into_iter().enumerate() {
            match socket {
                None => peers.push(None),
                Some(stream) => {
                    let reader = stream.try_clone()?;
                    let inbox = inbox.clone();
                    thread::Builder::new()
                        .name(format!("peersat-net-{}", peer))
                        .spawn(move || reader_loop(reader, peer, &inbox))?;
                    peers.push(Some(Mutex::new(stream)));
                }
            }
        }

        Ok(TcpMesh {
            rank,
            size,
            peers,
            inbox,
        })
    }
}

fn dial(addr: SocketAddr) -> io::Result<TcpStream> {
    let deadline = Instant::now() + CONNECT_TIMEOUT;
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if Instant::now() >= deadline {
                    return Err(err);
                }
                thread::sleep(CONNECT_RETRY);
            }
        }
    }
}

fn write_word(mut stream: &TcpStream, word: i32) -> io::Result<()> {
    stream.write_all(&word.to_le_bytes())
}

fn read_word(mut stream: &TcpStream) -> io::Result<i32> {
    let mut bytes = [0u8; 4];
    stream.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

fn reader_loop(mut stream: TcpStream, peer: usize, inbox: &Inbox) {
    loop {
        let mut header = [0u8; 8];
        if stream.read_exact(&mut header).is_err() {
            break;
        }
        let tag = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let len = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if tag < 0 || tag >= TAG_COUNT as i32 || len < 0 {
            warn!("dropping malformed frame from peer {}", peer);
            break;
        }

        let mut bytes = vec![0u8; len as usize * 4];
        if stream.read_exact(&mut bytes).is_err() {
            break;
        }
        let payload: Vec<i32> = bytes
            .chunks_exact(4)
            .map(|word| i32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect();

        inbox.queues[peer][tag as usize]
            .lock()
            .unwrap()
            .push_back(payload);
    }
    inbox.disconnected[peer].store(true, Ordering::Release);
    debug!("reader for peer {} exited", peer);
}

impl Transport for TcpMesh {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, to: usize, tag: Tag, payload: &[i32]) -> Result<(), TransportError> {
        let peer = self.peers[to]
            .as_ref()
            .ok_or(TransportError::Disconnected(to))?;
        let mut stream = peer.lock().unwrap();

        let mut frame = Vec::with_capacity((payload.len() + 2) * 4);
        frame.extend_from_slice(&(tag as i32).to_le_bytes());
        frame.extend_from_slice(&(payload.len() as i32).to_le_bytes());
        for word in payload {
            frame.extend_from_slice(&word.to_le_bytes());
        }
        stream.write_all(&frame)?;
        Ok(())
    }

    fn try_recv(&self, from: usize, tag: Tag) -> Result<Option<Vec<i32>>, TransportError> {
        if let Some(payload) = self.inbox.queues[from][tag as usize]
            .lock()
            .unwrap()
            .pop_front()
        {
            return Ok(Some(payload));
        }
        // report the loss only once the remaining messages are drained
        if self.inbox.disconnected[from].load(Ordering::Acquire) {
            return Err(TransportError::Disconnected(from));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::recv_blocking;

    use std::net::{IpAddr, Ipv4Addr};

    fn loopback_addrs(ports: &[u16]) -> Vec<SocketAddr> {
        ports
            .iter()
            .map(|&port| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
            .collect()
    }

    #[test]
    fn three_rank_mesh_roundtrip() {
        let addrs = loopback_addrs(&[46101, 46102, 46103]);

        let handles: Vec<_> = (0..3)
            .map(|rank| {
                let addrs = addrs.clone();
                thread::spawn(move || TcpMesh::connect(rank, &addrs).unwrap())
            })
            .collect();
        let meshes: Vec<TcpMesh> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        meshes[0].send(1, Tag::Clauses, &[1, -2, 3, 0]).unwrap();
        meshes[2].send(1, Tag::End, &[10]).unwrap();

        assert_eq!(
            recv_blocking(&meshes[1], 0, Tag::Clauses).unwrap(),
            vec![1, -2, 3, 0]
        );
        assert_eq!(recv_blocking(&meshes[1], 2, Tag::End).unwrap(), vec![10]);
    }
}
