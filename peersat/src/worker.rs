//! Worker threads running the solver engines.
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::ending::{Ending, SolveResult};
use crate::engine::SolverEngine;

/// Runs one engine's `solve` on a dedicated thread.
///
/// A definitive answer is reported through the termination coordinator: the
/// first engine to finish decides the run's result, everyone else gets
/// interrupted.
pub struct SequentialWorker {
    engine: Arc<dyn SolverEngine>,
    handle: Option<JoinHandle<()>>,
}

impl SequentialWorker {
    pub fn start(
        engine: Arc<dyn SolverEngine>,
        ending: Arc<Ending>,
    ) -> io::Result<SequentialWorker> {
        let handle = {
            let engine = engine.clone();
            thread::Builder::new()
                .name("peersat-worker".into())
                .spawn(move || {
                    let result = engine.solve(&[]);
                    debug!("worker finished with {:?}", result);
                    match result {
                        SolveResult::Sat => {
                            ending.set_model(engine.model());
                            ending.trigger(SolveResult::Sat);
                        }
                        SolveResult::Unsat => {
                            ending.trigger(SolveResult::Unsat);
                        }
                        _ => {}
                    }
                })?
        };

        Ok(SequentialWorker {
            engine,
            handle: Some(handle),
        })
    }

    /// Ask the engine to stop searching.
    pub fn interrupt(&self) {
        self.engine.set_interrupt();
    }

    /// Wait for the worker thread to exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("a worker thread panicked");
            }
        }
    }
}

impl Drop for SequentialWorker {
    fn drop(&mut self) {
        self.interrupt();
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyntheticEngine;

    use peersat_formula::CnfFormula;
    use std::time::Duration;

    #[test]
    fn interrupted_worker_reports_nothing() {
        let ending = Arc::new(Ending::new());
        let engine = Arc::new(SyntheticEngine::new(0, 2));
        let mut formula = CnfFormula::new();
        formula.set_var_count(10);
        engine.load_formula(&formula);

        let mut worker = SequentialWorker::start(engine, ending.clone()).unwrap();
        thread::sleep(Duration::from_millis(20));
        worker.interrupt();
        worker.join();

        assert!(!ending.is_set());
        assert_eq!(ending.result(), SolveResult::Unknown);
    }
}
