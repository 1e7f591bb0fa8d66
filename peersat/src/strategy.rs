//! The sharing-strategy interface driven by sharer threads.
use std::time::Duration;

/// One clause-redistribution policy, local or global.
///
/// A strategy is owned by exactly one sharer thread, which invokes
/// [`SharingStrategy::do_sharing`] once per round.
pub trait SharingStrategy: Send {
    /// Perform one sharing round.
    ///
    /// Returns true when the strategy is done and its sharer can exit; this
    /// is self-reported so a global strategy can drain one last collective
    /// after the end signal.
    fn do_sharing(&mut self) -> bool;

    /// How long the sharer sleeps between rounds.
    fn sleep_duration(&self) -> Duration;

    /// Log the strategy's statistics, called once after its last round.
    fn log_stats(&self) {}
}
