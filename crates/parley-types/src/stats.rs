//! Per-user offer statistics.

use serde::{Deserialize, Serialize};

use crate::OfferStatus;

/// Offer counts broken down by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub countered: usize,
    pub accepted: usize,
    pub declined: usize,
    pub withdrawn: usize,
    pub expired: usize,
}

impl StatusCounts {
    /// Tally one offer of the given status.
    pub fn record(&mut self, status: OfferStatus) {
        match status {
            OfferStatus::Pending => self.pending += 1,
            OfferStatus::Countered => self.countered += 1,
            OfferStatus::Accepted => self.accepted += 1,
            OfferStatus::Declined => self.declined += 1,
            OfferStatus::Withdrawn => self.withdrawn += 1,
            OfferStatus::Expired => self.expired += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.pending + self.countered + self.accepted + self.declined + self.withdrawn
            + self.expired
    }

    /// Offers still awaiting resolution.
    #[must_use]
    pub fn active(&self) -> usize {
        self.pending + self.countered
    }
}

/// A user's offer activity from both sides of the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferStats {
    /// Offers the user made as a buyer.
    pub sent: StatusCounts,
    /// Offers the user received as a seller.
    pub received: StatusCounts,
}
