//! Offer types and the negotiation state machine.
//!
//! An [`Offer`] is a buyer's proposed price on a listing. Its status moves
//! along a fixed transition table; every mutation path (engine operation or
//! expiry sweep) funnels through [`Offer::transition`], so the guards are
//! identical no matter who initiates the change.
//!
//! ```text
//!            ┌──────────┐  counter   ┌───────────┐
//!  create ──▶│ PENDING  │───────────▶│ COUNTERED │
//!            └──────────┘            └───────────┘
//!                 │  │                    │  │
//!        accept ──┘  └── decline/         │  └── accept-counter
//!                        withdraw/        └───── decline/withdraw/expire
//!                        expire
//! ```
//!
//! ACCEPTED, DECLINED, WITHDRAWN and EXPIRED are terminal: an offer that
//! reaches one of them is immutable forever after.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ListingId, OfferId, ParleyError, Result, UserId};

/// Lifecycle status of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OfferStatus {
    Pending,
    Countered,
    Accepted,
    Declined,
    Withdrawn,
    Expired,
}

impl OfferStatus {
    /// An active offer is one still awaiting resolution.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Countered)
    }

    /// Terminal statuses admit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// The transition table. This is the single source of truth for which
    /// status changes are legal; no other code may flip an offer's status.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Countered) => true,
            (
                Self::Pending | Self::Countered,
                Self::Accepted | Self::Declined | Self::Withdrawn | Self::Expired,
            ) => true,
            _ => false,
        }
    }

    /// Which statuses a transition into `next` is legal from, for error
    /// messages.
    #[must_use]
    pub fn required_predecessors(next: Self) -> &'static str {
        match next {
            Self::Countered => "PENDING",
            Self::Accepted | Self::Declined | Self::Withdrawn | Self::Expired => {
                "PENDING or COUNTERED"
            }
            Self::Pending => "NONE (PENDING is the initial status)",
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Countered => write!(f, "COUNTERED"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Declined => write!(f, "DECLINED"),
            Self::Withdrawn => write!(f, "WITHDRAWN"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Which side of a negotiation a user is on, for offer queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferRole {
    /// Offers the user sent.
    Buyer,
    /// Offers the user received on their listings.
    Seller,
}

impl std::fmt::Display for OfferRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => write!(f, "BUYER"),
            Self::Seller => write!(f, "SELLER"),
        }
    }
}

/// A buyer's proposed price on a listing, together with the seller's
/// counter-proposal when one exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    /// Snapshot of the listing's seller at creation time. Never re-read:
    /// re-parenting a listing mid-negotiation does not reassign offers.
    pub seller_id: UserId,
    /// The buyer's current ask.
    pub amount: Decimal,
    /// The seller's current counter. Meaningful only while COUNTERED.
    pub counter_amount: Option<Decimal>,
    /// Listing price snapshot at creation, for discount reporting.
    pub original_price: Decimal,
    pub status: OfferStatus,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// Set when the counterparty responds (counter, accept, decline).
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Create a fresh PENDING offer.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        listing_id: ListingId,
        buyer_id: UserId,
        seller_id: UserId,
        amount: Decimal,
        original_price: Decimal,
        message: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OfferId::new(),
            listing_id,
            buyer_id,
            seller_id,
            amount,
            counter_amount: None,
            original_price,
            status: OfferStatus::Pending,
            message,
            expires_at,
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whether the offer's response window has elapsed. Expiry takes
    /// effect only when the sweep transitions the offer to EXPIRED.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at < now
    }

    /// The price currently on the table: the seller's counter while
    /// COUNTERED, otherwise the buyer's ask.
    #[must_use]
    pub fn current_price(&self) -> Decimal {
        if self.status == OfferStatus::Countered {
            self.counter_amount.unwrap_or(self.amount)
        } else {
            self.amount
        }
    }

    /// Discount of the buyer's ask against the listing price, floored at
    /// zero (buyers offering above asking report no discount).
    #[must_use]
    pub fn discount(&self) -> Decimal {
        (self.original_price - self.amount).max(Decimal::ZERO)
    }

    /// Guarded status transition — the only way to change `status`.
    ///
    /// Consults the transition table, stamps `updated_at`, and records
    /// `responded_at` when the change is a counterparty response
    /// (COUNTERED, ACCEPTED, DECLINED).
    ///
    /// # Errors
    /// Returns [`ParleyError::WrongOfferStatus`] if the table forbids the
    /// move, in particular for any transition out of a terminal status.
    pub fn transition(&mut self, next: OfferStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ParleyError::WrongOfferStatus {
                offer_id: self.id,
                expected: OfferStatus::required_predecessors(next),
                actual: self.status,
            });
        }
        self.status = next;
        self.updated_at = now;
        if matches!(
            next,
            OfferStatus::Countered | OfferStatus::Accepted | OfferStatus::Declined
        ) {
            self.responded_at = Some(now);
        }
        Ok(())
    }
}

impl std::fmt::Display for Offer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Offer[{}] {} on listing {} @ {} (asking {})",
            self.id, self.status, self.listing_id, self.amount, self.original_price,
        )
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Offer {
    pub fn dummy_pending(amount: Decimal, original_price: Decimal) -> Self {
        Self::new(
            ListingId::new(),
            UserId::new(),
            UserId::new(),
            amount,
            original_price,
            None,
            Utc::now() + chrono::Duration::hours(48),
        )
    }

    pub fn dummy_on_listing(
        listing_id: ListingId,
        buyer_id: UserId,
        seller_id: UserId,
        amount: Decimal,
    ) -> Self {
        Self::new(
            listing_id,
            buyer_id,
            seller_id,
            amount,
            amount,
            None,
            Utc::now() + chrono::Duration::hours(48),
        )
    }
}
