//! The negotiation engine: every buyer/seller operation on an offer.
//!
//! Each operation is one store transaction. Guards run inside the
//! transaction, in a fixed fail-closed order; staged events commit with
//! the mutation and are handed to the notifier strictly after commit, so
//! nobody is ever notified about a settlement that rolled back.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use parley_store::MarketStore;
use parley_types::{
    EngineConfig, Listing, ListingId, Offer, OfferEvent, OfferEventKind, OfferId, OfferStats,
    OfferStatus, ParleyError, Purchase, Result, UserId,
};

use crate::settlement::settle_offer;
use crate::traits::{BlockChecker, NoBlocks, Notifier, NullNotifier};

/// The core of the marketplace: enforces the offer state machine, the
/// one-active-offer-per-buyer rule, and atomic single-winner settlement.
pub struct NegotiationEngine<B: BlockChecker, N: Notifier> {
    store: Arc<MarketStore>,
    blocks: B,
    notifier: N,
    config: EngineConfig,
}

impl NegotiationEngine<NoBlocks, NullNotifier> {
    /// Engine with no block list and no notification delivery.
    #[must_use]
    pub fn with_defaults(store: Arc<MarketStore>) -> Self {
        Self::new(store, NoBlocks, NullNotifier, EngineConfig::default())
    }
}

impl<B: BlockChecker, N: Notifier> NegotiationEngine<B, N> {
    #[must_use]
    pub fn new(store: Arc<MarketStore>, blocks: B, notifier: N, config: EngineConfig) -> Self {
        Self {
            store,
            blocks,
            notifier,
            config,
        }
    }

    /// The underlying store, for read-only queries.
    #[must_use]
    pub fn store(&self) -> &MarketStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The notifier collaborator, for inspection in embedding code.
    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Register or refresh the engine's view of a listing. Listings are
    /// owned by an external service; this is its write path into the
    /// engine's transactional boundary.
    pub fn upsert_listing(&self, listing: Listing) -> Result<()> {
        let ((), _) = self.store.transaction(move |txn| {
            txn.insert_listing(listing);
            Ok(())
        })?;
        Ok(())
    }

    // =================================================================
    // Buyer operations
    // =================================================================

    /// Create a new PENDING offer on a listing.
    ///
    /// Guards, in order: listing exists, amount positive, message length,
    /// listing ACTIVE, buyer is not the seller, neither party has blocked
    /// the other, and no active offer by this buyer on this listing.
    pub fn create_offer(
        &self,
        buyer_id: UserId,
        listing_id: ListingId,
        amount: Decimal,
        message: Option<String>,
    ) -> Result<Offer> {
        let now = Utc::now();
        let (offer, events) = self.store.transaction(|txn| {
            let listing = txn.listing(listing_id)?;
            validate_amount(amount)?;
            validate_message(message.as_deref(), self.config.max_message_len)?;
            if !listing.is_offerable() {
                return Err(ParleyError::ListingNotActive {
                    listing_id,
                    status: listing.status,
                });
            }
            if listing.seller_id == buyer_id {
                return Err(ParleyError::SelfOffer(listing_id));
            }
            if self.blocks.is_blocked(listing.seller_id, buyer_id)
                || self.blocks.is_blocked(buyer_id, listing.seller_id)
            {
                return Err(ParleyError::BuyerBlocked);
            }
            if txn.active_offer_for(listing_id, buyer_id).is_some() {
                return Err(ParleyError::DuplicateActiveOffer {
                    listing_id,
                    buyer_id,
                });
            }

            let offer = Offer::new(
                listing_id,
                buyer_id,
                listing.seller_id,
                amount,
                listing.price,
                message.clone(),
                now + self.config.offer_ttl(),
            );
            txn.insert_offer(offer.clone());
            txn.append_event(OfferEvent::new(
                OfferEventKind::OfferCreated,
                offer.id,
                listing_id,
                Some(buyer_id),
                offer.seller_id,
                Some(amount),
                now,
            ));
            Ok(offer)
        })?;
        tracing::info!(offer = %offer.id, listing = %listing_id, amount = %amount, "offer created");
        self.dispatch(&events);
        Ok(offer)
    }

    /// Revise a PENDING offer's amount and/or message. Buyer only; the
    /// expiry window is not reset.
    pub fn update_offer(
        &self,
        offer_id: OfferId,
        actor_id: UserId,
        amount: Option<Decimal>,
        message: Option<String>,
    ) -> Result<Offer> {
        let now = Utc::now();
        let (offer, events) = self.store.transaction(|txn| {
            let mut offer = txn.offer(offer_id)?;
            if actor_id != offer.buyer_id {
                return Err(ParleyError::ActorNotBuyer(offer_id));
            }
            if offer.status != OfferStatus::Pending {
                return Err(ParleyError::WrongOfferStatus {
                    offer_id,
                    expected: "PENDING",
                    actual: offer.status,
                });
            }
            if let Some(amount) = amount {
                validate_amount(amount)?;
                offer.amount = amount;
            }
            if let Some(message) = message.clone() {
                validate_message(Some(&message), self.config.max_message_len)?;
                offer.message = Some(message);
            }
            offer.updated_at = now;
            txn.update_offer(offer.clone())?;
            txn.append_event(OfferEvent::new(
                OfferEventKind::OfferUpdated,
                offer_id,
                offer.listing_id,
                Some(actor_id),
                offer.seller_id,
                Some(offer.amount),
                now,
            ));
            Ok(offer)
        })?;
        tracing::debug!(offer = %offer_id, amount = %offer.amount, "offer updated");
        self.dispatch(&events);
        Ok(offer)
    }

    /// Buyer accepts the seller's counter: settles at `counter_amount`,
    /// which is written into `amount` for the record.
    pub fn accept_counter(&self, offer_id: OfferId, actor_id: UserId) -> Result<Purchase> {
        let now = Utc::now();
        let (purchase, events) = self.store.transaction(|txn| {
            let mut offer = txn.offer(offer_id)?;
            if actor_id != offer.buyer_id {
                return Err(ParleyError::ActorNotBuyer(offer_id));
            }
            if offer.status != OfferStatus::Countered {
                return Err(ParleyError::WrongOfferStatus {
                    offer_id,
                    expected: "COUNTERED",
                    actual: offer.status,
                });
            }
            let counter = offer.counter_amount.ok_or_else(|| {
                ParleyError::Internal(format!("countered offer {offer_id} has no counter amount"))
            })?;
            offer.amount = counter;
            offer.updated_at = now;
            txn.update_offer(offer.clone())?;
            settle_offer(txn, &offer, actor_id, counter, now)
        })?;
        tracing::info!(offer = %offer_id, price = %purchase.final_price, "counter accepted, offer settled");
        self.dispatch(&events);
        Ok(purchase)
    }

    /// Buyer declines the seller's counter.
    pub fn decline_counter(&self, offer_id: OfferId, actor_id: UserId) -> Result<Offer> {
        let now = Utc::now();
        let (offer, events) = self.store.transaction(|txn| {
            let mut offer = txn.offer(offer_id)?;
            if actor_id != offer.buyer_id {
                return Err(ParleyError::ActorNotBuyer(offer_id));
            }
            if offer.status != OfferStatus::Countered {
                return Err(ParleyError::WrongOfferStatus {
                    offer_id,
                    expected: "COUNTERED",
                    actual: offer.status,
                });
            }
            offer.transition(OfferStatus::Declined, now)?;
            txn.update_offer(offer.clone())?;
            txn.append_event(OfferEvent::new(
                OfferEventKind::OfferDeclined,
                offer_id,
                offer.listing_id,
                Some(actor_id),
                offer.seller_id,
                None,
                now,
            ));
            Ok(offer)
        })?;
        tracing::debug!(offer = %offer_id, "counter declined");
        self.dispatch(&events);
        Ok(offer)
    }

    /// Buyer withdraws an active offer.
    pub fn cancel_offer(&self, offer_id: OfferId, actor_id: UserId) -> Result<Offer> {
        let now = Utc::now();
        let (offer, events) = self.store.transaction(|txn| {
            let mut offer = txn.offer(offer_id)?;
            if actor_id != offer.buyer_id {
                return Err(ParleyError::ActorNotBuyer(offer_id));
            }
            offer.transition(OfferStatus::Withdrawn, now)?;
            txn.update_offer(offer.clone())?;
            txn.append_event(OfferEvent::new(
                OfferEventKind::OfferWithdrawn,
                offer_id,
                offer.listing_id,
                Some(actor_id),
                offer.seller_id,
                None,
                now,
            ));
            Ok(offer)
        })?;
        tracing::debug!(offer = %offer_id, "offer withdrawn");
        self.dispatch(&events);
        Ok(offer)
    }

    // =================================================================
    // Seller operations
    // =================================================================

    /// Seller accepts an active offer, settling at the buyer's standing
    /// `amount` — accepting a COUNTERED offer abandons the seller's own
    /// counter.
    pub fn accept_offer(&self, offer_id: OfferId, actor_id: UserId) -> Result<Purchase> {
        let now = Utc::now();
        let (purchase, events) = self.store.transaction(|txn| {
            let offer = txn.offer(offer_id)?;
            if actor_id != offer.seller_id {
                return Err(ParleyError::ActorNotSeller(offer_id));
            }
            if !offer.status.is_active() {
                return Err(ParleyError::WrongOfferStatus {
                    offer_id,
                    expected: "PENDING or COUNTERED",
                    actual: offer.status,
                });
            }
            settle_offer(txn, &offer, actor_id, offer.amount, now)
        })?;
        tracing::info!(offer = %offer_id, price = %purchase.final_price, "offer accepted, listing settled");
        self.dispatch(&events);
        Ok(purchase)
    }

    /// Seller rejects an active offer.
    pub fn reject_offer(&self, offer_id: OfferId, actor_id: UserId) -> Result<Offer> {
        let now = Utc::now();
        let (offer, events) = self.store.transaction(|txn| {
            let mut offer = txn.offer(offer_id)?;
            if actor_id != offer.seller_id {
                return Err(ParleyError::ActorNotSeller(offer_id));
            }
            offer.transition(OfferStatus::Declined, now)?;
            txn.update_offer(offer.clone())?;
            txn.append_event(OfferEvent::new(
                OfferEventKind::OfferDeclined,
                offer_id,
                offer.listing_id,
                Some(actor_id),
                offer.buyer_id,
                None,
                now,
            ));
            Ok(offer)
        })?;
        tracing::debug!(offer = %offer_id, "offer rejected");
        self.dispatch(&events);
        Ok(offer)
    }

    /// Seller counters a PENDING offer with a new price. Resets the
    /// expiry window, so each new proposal gets a full response window.
    pub fn counter_offer(
        &self,
        offer_id: OfferId,
        actor_id: UserId,
        amount: Decimal,
    ) -> Result<Offer> {
        let now = Utc::now();
        let (offer, events) = self.store.transaction(|txn| {
            let mut offer = txn.offer(offer_id)?;
            if actor_id != offer.seller_id {
                return Err(ParleyError::ActorNotSeller(offer_id));
            }
            validate_amount(amount)?;
            offer.transition(OfferStatus::Countered, now)?;
            offer.counter_amount = Some(amount);
            offer.expires_at = now + self.config.counter_ttl();
            txn.update_offer(offer.clone())?;
            txn.append_event(OfferEvent::new(
                OfferEventKind::OfferCountered,
                offer_id,
                offer.listing_id,
                Some(actor_id),
                offer.buyer_id,
                Some(amount),
                now,
            ));
            Ok(offer)
        })?;
        tracing::debug!(offer = %offer_id, counter = %amount, "offer countered");
        self.dispatch(&events);
        Ok(offer)
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Sent/received offer counts by status.
    #[must_use]
    pub fn offer_stats(&self, user_id: UserId) -> OfferStats {
        self.store.offer_stats(user_id)
    }

    // =================================================================
    // Notification dispatch (after commit only)
    // =================================================================

    pub(crate) fn dispatch(&self, events: &[OfferEvent]) {
        for event in events {
            if let Err(err) = self.notifier.notify(event.recipient, event) {
                tracing::warn!(
                    kind = %event.kind,
                    offer = %event.offer_id,
                    error = %err,
                    "notification delivery failed"
                );
            }
        }
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(ParleyError::InvalidAmount {
            reason: "amount must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_message(message: Option<&str>, max: usize) -> Result<()> {
    if let Some(message) = message {
        let len = message.chars().count();
        if len > max {
            return Err(ParleyError::MessageTooLong { len, max });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::{ErrorKind, ListingStatus};

    fn engine_with_listing(price: i64) -> (NegotiationEngine<NoBlocks, NullNotifier>, Listing) {
        let store = Arc::new(MarketStore::new());
        let engine = NegotiationEngine::with_defaults(store);
        let listing = Listing::dummy_active(Decimal::new(price, 0));
        engine.upsert_listing(listing.clone()).unwrap();
        (engine, listing)
    }

    #[test]
    fn create_offer_snapshots_listing_fields() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), Some("hi".into()))
            .unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);
        assert_eq!(offer.seller_id, listing.seller_id);
        assert_eq!(offer.original_price, Decimal::new(100, 0));
        assert!(offer.expires_at > offer.created_at);
    }

    #[test]
    fn create_offer_on_missing_listing_is_not_found() {
        let (engine, _) = engine_with_listing(100);
        let err = engine
            .create_offer(UserId::new(), ListingId::new(), Decimal::new(80, 0), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn self_offer_rejected() {
        let (engine, listing) = engine_with_listing(100);
        let err = engine
            .create_offer(listing.seller_id, listing.id, Decimal::new(80, 0), None)
            .unwrap_err();
        assert!(matches!(err, ParleyError::SelfOffer(_)));
    }

    #[test]
    fn blocked_buyer_rejected() {
        let store = Arc::new(MarketStore::new());
        let listing = Listing::dummy_active(Decimal::new(100, 0));
        let buyer = UserId::new();
        let mut blocks = crate::traits::BlockList::new();
        blocks.block(listing.seller_id, buyer);
        let engine =
            NegotiationEngine::new(store, blocks, NullNotifier, EngineConfig::default());
        engine.upsert_listing(listing.clone()).unwrap();

        let err = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap_err();
        assert!(matches!(err, ParleyError::BuyerBlocked));
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn duplicate_active_offer_conflicts() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        let err = engine
            .create_offer(buyer, listing.id, Decimal::new(85, 0), None)
            .unwrap_err();
        assert!(matches!(err, ParleyError::DuplicateActiveOffer { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn nonpositive_amount_rejected() {
        let (engine, listing) = engine_with_listing(100);
        let err = engine
            .create_offer(UserId::new(), listing.id, Decimal::ZERO, None)
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidAmount { .. }));
    }

    #[test]
    fn overlong_message_rejected() {
        let (engine, listing) = engine_with_listing(100);
        let long = "x".repeat(engine.config().max_message_len + 1);
        let err = engine
            .create_offer(UserId::new(), listing.id, Decimal::new(80, 0), Some(long))
            .unwrap_err();
        assert!(matches!(err, ParleyError::MessageTooLong { .. }));
    }

    #[test]
    fn update_offer_is_buyer_only_and_pending_only() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();

        let err = engine
            .update_offer(offer.id, listing.seller_id, Some(Decimal::new(90, 0)), None)
            .unwrap_err();
        assert!(matches!(err, ParleyError::ActorNotBuyer(_)));

        let updated = engine
            .update_offer(offer.id, buyer, Some(Decimal::new(90, 0)), None)
            .unwrap();
        assert_eq!(updated.amount, Decimal::new(90, 0));
        // TTL is not reset by an update.
        assert_eq!(updated.expires_at, offer.expires_at);

        engine.cancel_offer(offer.id, buyer).unwrap();
        let err = engine
            .update_offer(offer.id, buyer, Some(Decimal::new(95, 0)), None)
            .unwrap_err();
        assert!(matches!(err, ParleyError::WrongOfferStatus { .. }));
    }

    #[test]
    fn counter_resets_expiry_and_requires_pending() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();

        let countered = engine
            .counter_offer(offer.id, listing.seller_id, Decimal::new(90, 0))
            .unwrap();
        assert_eq!(countered.status, OfferStatus::Countered);
        assert_eq!(countered.counter_amount, Some(Decimal::new(90, 0)));
        assert!(countered.expires_at >= offer.expires_at);
        assert!(countered.responded_at.is_some());

        // A second counter on an already-countered offer is illegal.
        let err = engine
            .counter_offer(offer.id, listing.seller_id, Decimal::new(95, 0))
            .unwrap_err();
        assert!(matches!(err, ParleyError::WrongOfferStatus { .. }));
    }

    #[test]
    fn accept_counter_settles_at_counter_amount() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        engine
            .counter_offer(offer.id, listing.seller_id, Decimal::new(90, 0))
            .unwrap();

        let purchase = engine.accept_counter(offer.id, buyer).unwrap();
        assert_eq!(purchase.final_price, Decimal::new(90, 0));
        // The agreed price is written into the offer's amount for the record.
        let settled = engine.store().offer(offer.id).unwrap();
        assert_eq!(settled.amount, Decimal::new(90, 0));
        assert_eq!(settled.status, OfferStatus::Accepted);
    }

    #[test]
    fn seller_accept_on_countered_uses_buyer_amount() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        engine
            .counter_offer(offer.id, listing.seller_id, Decimal::new(90, 0))
            .unwrap();

        // Accepting abandons the seller's own counter.
        let purchase = engine.accept_offer(offer.id, listing.seller_id).unwrap();
        assert_eq!(purchase.final_price, Decimal::new(80, 0));
    }

    #[test]
    fn accept_marks_listing_sold() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        engine.accept_offer(offer.id, listing.seller_id).unwrap();
        assert_eq!(
            engine.store().listing(listing.id).unwrap().status,
            ListingStatus::Sold
        );
    }

    #[test]
    fn decline_counter_requires_countered_status() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        let err = engine.decline_counter(offer.id, buyer).unwrap_err();
        assert!(matches!(
            err,
            ParleyError::WrongOfferStatus {
                expected: "COUNTERED",
                ..
            }
        ));
    }

    #[test]
    fn cancel_is_buyer_only() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        let err = engine.cancel_offer(offer.id, listing.seller_id).unwrap_err();
        assert!(matches!(err, ParleyError::ActorNotBuyer(_)));
        let withdrawn = engine.cancel_offer(offer.id, buyer).unwrap();
        assert_eq!(withdrawn.status, OfferStatus::Withdrawn);
    }

    #[test]
    fn reject_is_seller_only() {
        let (engine, listing) = engine_with_listing(100);
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        let err = engine.reject_offer(offer.id, buyer).unwrap_err();
        assert!(matches!(err, ParleyError::ActorNotSeller(_)));
        let declined = engine.reject_offer(offer.id, listing.seller_id).unwrap();
        assert_eq!(declined.status, OfferStatus::Declined);
        assert!(declined.responded_at.is_some());
    }

    #[test]
    fn offer_on_sold_listing_rejected() {
        let (engine, listing) = engine_with_listing(100);
        let buyer_a = UserId::new();
        let offer = engine
            .create_offer(buyer_a, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        engine.accept_offer(offer.id, listing.seller_id).unwrap();

        let err = engine
            .create_offer(UserId::new(), listing.id, Decimal::new(95, 0), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ParleyError::ListingNotActive {
                status: ListingStatus::Sold,
                ..
            }
        ));
    }
}
