//! Audit events for the Parley negotiation history.
//!
//! Every state change appends an [`OfferEvent`] to the store's history log
//! inside the same transaction as the mutation, giving the offer store a
//! full record of amount/counter/status changes. The same record doubles
//! as the notification payload: after commit, the engine hands each event
//! to the notifier addressed to `recipient`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ListingId, OfferId, UserId};

/// The kind of state change an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferEventKind {
    /// A buyer created a new offer.
    OfferCreated,
    /// The buyer revised a pending offer's amount or message.
    OfferUpdated,
    /// The seller countered with a new price.
    OfferCountered,
    /// An offer was accepted (by seller, or buyer accepting a counter).
    OfferAccepted,
    /// An offer was declined (seller reject, buyer declining a counter,
    /// or a sibling declined by settlement).
    OfferDeclined,
    /// The buyer withdrew the offer.
    OfferWithdrawn,
    /// The expiry sweep timed the offer out.
    OfferExpired,
    /// Settlement flipped the listing to SOLD.
    ListingSold,
    /// Settlement recorded the purchase.
    PurchaseRecorded,
}

impl std::fmt::Display for OfferEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OfferCreated => write!(f, "OFFER_CREATED"),
            Self::OfferUpdated => write!(f, "OFFER_UPDATED"),
            Self::OfferCountered => write!(f, "OFFER_COUNTERED"),
            Self::OfferAccepted => write!(f, "OFFER_ACCEPTED"),
            Self::OfferDeclined => write!(f, "OFFER_DECLINED"),
            Self::OfferWithdrawn => write!(f, "OFFER_WITHDRAWN"),
            Self::OfferExpired => write!(f, "OFFER_EXPIRED"),
            Self::ListingSold => write!(f, "LISTING_SOLD"),
            Self::PurchaseRecorded => write!(f, "PURCHASE_RECORDED"),
        }
    }
}

/// One entry in the append-only negotiation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferEvent {
    pub kind: OfferEventKind,
    pub offer_id: OfferId,
    pub listing_id: ListingId,
    /// Who caused the change. `None` for sweep-driven expiry.
    pub actor: Option<UserId>,
    /// Who should be told about it.
    pub recipient: UserId,
    /// The price attached to the change, where one applies (offer amount,
    /// counter amount, settled price).
    pub amount: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

impl OfferEvent {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: OfferEventKind,
        offer_id: OfferId,
        listing_id: ListingId,
        actor: Option<UserId>,
        recipient: UserId,
        amount: Option<Decimal>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            offer_id,
            listing_id,
            actor,
            recipient,
            amount,
            occurred_at,
        }
    }
}
