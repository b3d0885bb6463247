//! Error types for the Parley negotiation engine.
//!
//! All errors use the `PAR_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Offer errors
//! - 2xx: Listing errors
//! - 3xx: Settlement errors
//! - 4xx: Authorization errors
//! - 9xx: General / internal errors
//!
//! Transports map variants onto a four-way taxonomy via [`ParleyError::kind`]:
//! `NotFound`, `Forbidden`, `InvalidState`, `Conflict` (plus `Internal`).

use thiserror::Error;

use crate::{ListingId, ListingStatus, OfferId, OfferStatus, UserId};

/// Coarse classification of an error, for transport-level mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The referenced entity does not exist.
    NotFound,
    /// The actor lacks the role required for this action.
    Forbidden,
    /// A state-machine guard failed (wrong status, listing not active, ...).
    InvalidState,
    /// A concurrent action won the race, or a uniqueness rule was violated.
    Conflict,
    /// Unrecoverable internal failure.
    Internal,
}

/// Central error enum for all Parley operations.
#[derive(Debug, Error)]
pub enum ParleyError {
    // =================================================================
    // Offer Errors (1xx)
    // =================================================================
    /// The requested offer was not found.
    #[error("PAR_ERR_100: Offer not found: {0}")]
    OfferNotFound(OfferId),

    /// The offer amount failed validation.
    #[error("PAR_ERR_101: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The buyer already has an active offer on this listing.
    #[error("PAR_ERR_102: Buyer {buyer_id} already has an active offer on listing {listing_id}")]
    DuplicateActiveOffer {
        listing_id: ListingId,
        buyer_id: UserId,
    },

    /// The offer is not in a status the attempted action allows.
    #[error("PAR_ERR_103: Offer {offer_id} is {actual}, expected {expected}")]
    WrongOfferStatus {
        offer_id: OfferId,
        expected: &'static str,
        actual: OfferStatus,
    },

    /// The attached message exceeds the maximum length.
    #[error("PAR_ERR_104: Message too long: {len} chars (max {max})")]
    MessageTooLong { len: usize, max: usize },

    // =================================================================
    // Listing Errors (2xx)
    // =================================================================
    /// The referenced listing was not found.
    #[error("PAR_ERR_200: Listing not found: {0}")]
    ListingNotFound(ListingId),

    /// The listing is not accepting offers in its current status.
    #[error("PAR_ERR_201: Listing {listing_id} is {status}, offers require ACTIVE")]
    ListingNotActive {
        listing_id: ListingId,
        status: ListingStatus,
    },

    /// A seller attempted to make an offer on their own listing.
    #[error("PAR_ERR_202: Cannot make an offer on own listing {0}")]
    SelfOffer(ListingId),

    // =================================================================
    // Settlement Errors (3xx)
    // =================================================================
    /// A concurrent settlement raced and won; the caller must re-fetch state.
    #[error("PAR_ERR_300: Settlement conflict: {reason}")]
    SettlementConflict { reason: String },

    /// A purchase already exists for this listing (uniqueness backstop).
    #[error("PAR_ERR_301: Purchase already recorded for listing {0}")]
    PurchaseAlreadyRecorded(ListingId),

    // =================================================================
    // Authorization Errors (4xx)
    // =================================================================
    /// The actor is neither the buyer nor the seller of this offer.
    #[error("PAR_ERR_400: Actor is not a party to offer {0}")]
    NotOfferParty(OfferId),

    /// The action is reserved for the offer's buyer.
    #[error("PAR_ERR_401: Only the buyer may perform this action on offer {0}")]
    ActorNotBuyer(OfferId),

    /// The action is reserved for the listing's seller.
    #[error("PAR_ERR_402: Only the seller may perform this action on offer {0}")]
    ActorNotSeller(OfferId),

    /// One of the parties has blocked the other.
    #[error("PAR_ERR_403: Offer refused: buyer is blocked by the seller")]
    BuyerBlocked,

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("PAR_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("PAR_ERR_901: Serialization error: {0}")]
    Serialization(String),
}

impl ParleyError {
    /// Classify this error for transport-level mapping.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OfferNotFound(_) | Self::ListingNotFound(_) => ErrorKind::NotFound,
            Self::NotOfferParty(_)
            | Self::ActorNotBuyer(_)
            | Self::ActorNotSeller(_)
            | Self::BuyerBlocked => ErrorKind::Forbidden,
            Self::InvalidAmount { .. }
            | Self::WrongOfferStatus { .. }
            | Self::MessageTooLong { .. }
            | Self::ListingNotActive { .. }
            | Self::SelfOffer(_) => ErrorKind::InvalidState,
            Self::DuplicateActiveOffer { .. }
            | Self::SettlementConflict { .. }
            | Self::PurchaseAlreadyRecorded(_) => ErrorKind::Conflict,
            Self::Internal(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ParleyError>;

impl From<serde_json::Error> for ParleyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = ParleyError::OfferNotFound(OfferId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("PAR_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn wrong_status_display() {
        let err = ParleyError::WrongOfferStatus {
            offer_id: OfferId::new(),
            expected: "PENDING",
            actual: OfferStatus::Declined,
        };
        let msg = format!("{err}");
        assert!(msg.contains("PAR_ERR_103"));
        assert!(msg.contains("DECLINED"));
        assert!(msg.contains("PENDING"));
    }

    #[test]
    fn kinds_match_taxonomy() {
        assert_eq!(
            ParleyError::ListingNotFound(ListingId::new()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(ParleyError::BuyerBlocked.kind(), ErrorKind::Forbidden);
        assert_eq!(
            ParleyError::SelfOffer(ListingId::new()).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            ParleyError::DuplicateActiveOffer {
                listing_id: ListingId::new(),
                buyer_id: UserId::new(),
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            ParleyError::SettlementConflict {
                reason: "listing sold".into()
            }
            .kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn all_errors_have_par_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(ParleyError::BuyerBlocked),
            Box::new(ParleyError::SelfOffer(ListingId::new())),
            Box::new(ParleyError::PurchaseAlreadyRecorded(ListingId::new())),
            Box::new(ParleyError::Internal("test".into())),
            Box::new(ParleyError::InvalidAmount {
                reason: "negative".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("PAR_ERR_"),
                "Error missing PAR_ERR_ prefix: {msg}"
            );
        }
    }
}
