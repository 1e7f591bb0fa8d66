//! Process-wide termination coordination.
//!
//! One atomic flag, one condition variable and one final result, shared by
//! the main thread, every worker and every sharer. Whoever decides the run
//! is over calls [`Ending::trigger`]; everyone else observes the flag at its
//! next polling point and winds down without guaranteed drainage.
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use peersat_formula::Lit;

/// Final outcome of a portfolio run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolveResult {
    Unknown,
    Sat,
    Unsat,
    Timeout,
}

impl SolveResult {
    /// Integer code carried by end messages on the wire.
    pub fn to_code(self) -> i32 {
        match self {
            SolveResult::Unknown => 0,
            SolveResult::Sat => 10,
            SolveResult::Unsat => 20,
            SolveResult::Timeout => 30,
        }
    }

    /// Decode a wire code, mapping anything unexpected to `Unknown`.
    pub fn from_code(code: i32) -> SolveResult {
        match code {
            10 => SolveResult::Sat,
            20 => SolveResult::Unsat,
            30 => SolveResult::Timeout,
            _ => SolveResult::Unknown,
        }
    }
}

/// The termination coordinator.
pub struct Ending {
    ending: AtomicBool,
    result: AtomicI32,
    model: Mutex<Vec<Lit>>,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Default for Ending {
    fn default() -> Ending {
        Ending::new()
    }
}

impl Ending {
    pub fn new() -> Ending {
        Ending {
            ending: AtomicBool::new(false),
            result: AtomicI32::new(SolveResult::Unknown.to_code()),
            model: Mutex::new(vec![]),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    /// Whether the end of the run was signalled.
    pub fn is_set(&self) -> bool {
        self.ending.load(Ordering::Acquire)
    }

    /// The final result, `Unknown` while the run is still going.
    pub fn result(&self) -> SolveResult {
        SolveResult::from_code(self.result.load(Ordering::Acquire))
    }

    /// Signal the end of the run with the given result and wake everyone
    /// waiting on the coordinator.
    ///
    /// The first caller's result wins; later calls only re-broadcast.
    pub fn trigger(&self, result: SolveResult) {
        let _ = self.result.compare_exchange(
            SolveResult::Unknown.to_code(),
            result.to_code(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.ending.store(true, Ordering::Release);
        self.notify_all();
    }

    /// Wake every thread waiting on the coordinator.
    ///
    /// Taken under the internal mutex so a waiter cannot miss the wakeup
    /// between its flag check and its wait.
    pub fn notify_all(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cond.notify_all();
    }

    /// Sleep until `timeout` elapsed or the coordinator was signalled.
    ///
    /// Spurious wakeups are passed through; callers re-check
    /// [`Ending::is_set`] either way. Returns whether the end was signalled.
    pub fn wait_round(&self, timeout: Duration) -> bool {
        let guard = self.lock.lock().unwrap();
        if self.is_set() {
            return true;
        }
        let _guard = self.cond.wait_timeout(guard, timeout).unwrap();
        self.is_set()
    }

    /// Store the model of a satisfying assignment.
    ///
    /// Only the first model is kept; racing SAT answers are equivalent.
    pub fn set_model(&self, model: Vec<Lit>) {
        let mut slot = self.model.lock().unwrap();
        if slot.is_empty() {
            *slot = model;
        }
    }

    /// The stored model, empty if none was reported.
    pub fn model(&self) -> Vec<Lit> {
        self.model.lock().unwrap().clone()
    }
}
