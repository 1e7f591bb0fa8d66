//! Sharing statistics.
use std::fmt;

/// Counters kept by a local sharing strategy.
#[derive(Default)]
pub struct SharingStats {
    /// Clauses drained from producers.
    pub received: u64,
    /// Clauses redistributed to consumers.
    pub shared: u64,
    /// Duplicate clauses suppressed or counted by the filter.
    pub duplicates: u64,
    /// Clauses whose LBD was lowered to the tier-2 level.
    pub promotions_tier2: u64,
    /// Clauses whose LBD was lowered to the core level.
    pub promotions_core: u64,
    /// Tier-2 sightings of clauses already at or below the tier-2 level.
    pub already_tier2: u64,
    /// Core sightings of clauses already at or below the core level.
    pub already_core: u64,
}

impl fmt::Display for SharingStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "receivedCls {}, sharedCls {}, duplicates {}, promotionsTier2 {}, \
             promotionsCore {}, alreadyTier2 {}, alreadyCore {}",
            self.received,
            self.shared,
            self.duplicates,
            self.promotions_tier2,
            self.promotions_core,
            self.already_tier2,
            self.already_core,
        )
    }
}

/// Counters kept by a global sharing strategy.
#[derive(Default)]
pub struct GlobalStats {
    /// Clauses deserialized from peers.
    pub received: u64,
    /// Clauses serialized towards peers.
    pub shared: u64,
    /// Clauses dropped by the receive-side filter.
    pub received_duplicates: u64,
    /// Clauses the send-side filter kept off the wire.
    pub send_duplicates_avoided: u64,
    /// Point-to-point or collective messages sent.
    pub messages_sent: u64,
}

impl fmt::Display for GlobalStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "receivedCls {}, sharedCls {}, receivedDuplicates {}, \
             sharedDuplicatesAvoided {}, messagesSent {}",
            self.received,
            self.shared,
            self.received_duplicates,
            self.send_duplicates_avoided,
            self.messages_sent,
        )
    }
}
