//! Local (intra-process) sharing strategies.
//!
//! A local strategy holds references to a set of producer entities and a set
//! of consumer entities. Once per round it drains the producers' exports
//! into private databases, selects the best clauses by size under the
//! configured literal budget and imports the selection into the consumers.
use std::sync::Arc;
use std::time::Duration;

use crate::entity::SharingEntity;

mod horde_str;
mod hordesat;
mod hordesat_alt;
mod simple;

pub use horde_str::HordeStrSharing;
pub use hordesat::HordeSatSharing;
pub use hordesat_alt::HordeSatAltSharing;
pub use simple::SimpleSharing;

/// Shared reference to a sharing entity.
pub type EntityRef = Arc<dyn SharingEntity>;

/// Occurrence count at which a duplicate is promoted to the tier-2 level.
pub(crate) const TIER2_COUNT: u8 = 6;
/// LBD assigned by a tier-2 promotion.
pub(crate) const TIER2_LBD: u32 = 6;
/// Occurrence count at which a duplicate is promoted to the core level.
pub(crate) const CORE_COUNT: u8 = 11;
/// LBD assigned by a core promotion.
pub(crate) const CORE_LBD: u32 = 2;
/// Probe window of the counting filter, one past the core count.
pub(crate) const DUP_WINDOW: u8 = 12;

/// Below this buffer fill percentage producers are asked for more clauses.
pub(crate) const FILL_INCREASE_PERCENT: usize = 75;
/// Above this buffer fill percentage producers are asked for fewer clauses.
pub(crate) const FILL_DECREASE_PERCENT: usize = 98;

/// Number of rounds after which the production init phase ends.
///
/// Chosen so the init phase covers roughly five percent of a 5000 second
/// run at the given round period.
pub(crate) fn rounds_before_increase(sleep: Duration) -> u64 {
    let micros = sleep.as_micros().max(1) as u64;
    250_000_000 / micros
}
