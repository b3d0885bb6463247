//! Listing types consumed by the negotiation engine.
//!
//! Listings are created and curated by an external service; the engine
//! keeps the authoritative status view here so settlement can flip a
//! listing to SOLD inside the same transaction that accepts the offer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ListingId, UserId};

/// Lifecycle status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ListingStatus {
    Draft,
    Pending,
    Active,
    Sold,
    Rejected,
    Archived,
}

impl ListingStatus {
    /// Offers may only be created or accepted while the listing is ACTIVE.
    #[must_use]
    pub fn is_offerable(self) -> bool {
        self == Self::Active
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Sold => write!(f, "SOLD"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Archived => write!(f, "ARCHIVED"),
        }
    }
}

/// The engine's view of a listing: identity, owner, asking price, status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub seller_id: UserId,
    /// The fixed asking price buyers negotiate against.
    pub price: Decimal,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    #[must_use]
    pub fn new(seller_id: UserId, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: ListingId::new(),
            seller_id,
            price,
            status: ListingStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_offerable(&self) -> bool {
        self.status.is_offerable()
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Listing {
    pub fn dummy_active(price: Decimal) -> Self {
        Self::new(UserId::new(), price)
    }

    pub fn dummy_for_seller(seller_id: UserId, price: Decimal) -> Self {
        Self::new(seller_id, price)
    }
}
