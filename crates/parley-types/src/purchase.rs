//! Purchase record produced by settlement.
//!
//! A [`Purchase`] is the immutable record that a negotiation concluded:
//! created exactly once per listing, 1:1 with the accepted offer, never
//! mutated afterwards. No money moves here — the record states that a
//! price was agreed and the listing is sold.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ListingId, Offer, OfferId, PurchaseId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    /// Deterministic from the winning offer (see [`PurchaseId::deterministic`]).
    pub id: PurchaseId,
    /// The accepted offer that produced this purchase.
    pub offer_id: OfferId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// The amount that won — the accepted offer's settled price.
    pub final_price: Decimal,
    /// Listing price snapshot, for discount reporting.
    pub original_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    /// Build the purchase record for a winning offer at its settled price.
    #[must_use]
    pub fn from_winning_offer(offer: &Offer, final_price: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id: PurchaseId::deterministic(offer.id),
            offer_id: offer.id,
            listing_id: offer.listing_id,
            buyer_id: offer.buyer_id,
            seller_id: offer.seller_id,
            final_price,
            original_price: offer.original_price,
            created_at: now,
        }
    }

    /// Discount achieved against the listing price, floored at zero.
    #[must_use]
    pub fn discount(&self) -> Decimal {
        (self.original_price - self.final_price).max(Decimal::ZERO)
    }
}

impl std::fmt::Display for Purchase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Purchase[{}] listing {} to buyer {} @ {} (asking {})",
            self.id, self.listing_id, self.buyer_id, self.final_price, self.original_price,
        )
    }
}
