//! Sharer threads: the round drivers of the sharing strategies.
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::ending::Ending;
use crate::strategy::SharingStrategy;

/// Drives one strategy on its own thread: sleep, share, repeat.
///
/// The sleep is a timed wait on the termination coordinator, so an end
/// signal interrupts it immediately; spurious wakeups only cause an early
/// round. The thread exits when the strategy reports it is done and then
/// re-broadcasts the coordinator so the main thread and sibling sharers
/// wake as well.
pub struct Sharer {
    id: i32,
    handle: Option<JoinHandle<()>>,
}

impl Sharer {
    /// Spawn the sharer thread.
    pub fn start(
        id: i32,
        mut strategy: Box<dyn SharingStrategy>,
        ending: Arc<Ending>,
    ) -> io::Result<Sharer> {
        let handle = thread::Builder::new()
            .name(format!("sharer-{}", id))
            .spawn(move || {
                let sleep = strategy.sleep_duration();
                debug!("sharer {} starting, round period {:?}", id, sleep);
                let mut round = 0u64;

                loop {
                    if !ending.is_set() {
                        ending.wait_round(sleep);
                    }
                    round += 1;
                    debug!("sharer {} entering round {}", id, round);
                    if strategy.do_sharing() {
                        break;
                    }
                }

                strategy.log_stats();
                if ending.is_set() {
                    ending.notify_all();
                }
                debug!("sharer {} exited after round {}", id, round);
            })?;

        Ok(Sharer {
            id,
            handle: Some(handle),
        })
    }

    /// Wait for the sharer thread to exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("sharer {} panicked", self.id);
            }
        }
    }
}

impl Drop for Sharer {
    fn drop(&mut self) {
        self.join();
    }
}

/// Drives several strategies round-robin on a single thread.
///
/// Each wakeup advances one strategy only, with the round period divided by
/// the number of strategies so every strategy keeps its own pace. When one
/// strategy reports it is done it is dropped from the rotation and every
/// remaining strategy gets a final round to wind down.
pub struct MultiSharer {
    id: i32,
    handle: Option<JoinHandle<()>>,
}

impl MultiSharer {
    pub fn start(
        id: i32,
        mut strategies: Vec<Box<dyn SharingStrategy>>,
        ending: Arc<Ending>,
    ) -> io::Result<MultiSharer> {
        assert!(!strategies.is_empty());
        let handle = thread::Builder::new()
            .name(format!("multi-sharer-{}", id))
            .spawn(move || {
                let sleep = strategies[0].sleep_duration() / strategies.len() as u32;
                debug!(
                    "multi-sharer {} starting with {} strategies, period {:?}",
                    id,
                    strategies.len(),
                    sleep
                );

                let mut round = 0usize;
                loop {
                    if !ending.is_set() {
                        ending.wait_round(sleep);
                    }
                    let current = round % strategies.len();
                    round += 1;
                    if strategies[current].do_sharing() {
                        let done = strategies.remove(current);
                        done.log_stats();
                        break;
                    }
                }

                // let the remaining strategies finalize
                for mut strategy in strategies {
                    if !strategy.do_sharing() {
                        warn!("multi-sharer {}: a strategy missed the ending", id);
                    }
                    strategy.log_stats();
                }

                if ending.is_set() {
                    ending.notify_all();
                }
            })?;

        Ok(MultiSharer {
            id,
            handle: Some(handle),
        })
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("multi-sharer {} panicked", self.id);
            }
        }
    }
}

impl Drop for MultiSharer {
    fn drop(&mut self) {
        self.join();
    }
}
