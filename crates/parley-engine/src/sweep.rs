//! The expiry sweep.
//!
//! Invoked by whatever scheduler the deployment provides — the engine
//! assumes no timer mechanism of its own. The sweep funnels through the
//! same transition table as user actions, and the set-based transition is
//! status-guarded, so running it twice over the same rows is a no-op.

use chrono::Utc;

use parley_types::{OfferEvent, OfferEventKind, Result};

use crate::engine::NegotiationEngine;
use crate::traits::{BlockChecker, Notifier};

impl<B: BlockChecker, N: Notifier> NegotiationEngine<B, N> {
    /// Transition every active offer whose window has elapsed to EXPIRED.
    ///
    /// Returns the number of offers expired by this run. Expiry
    /// notifications are best-effort and delivered after commit.
    pub fn sweep_expired_offers(&self) -> Result<usize> {
        let now = Utc::now();
        let (count, events) = self.store().transaction(|txn| {
            let expired = txn.expire_active_offers_before(now)?;
            for offer in &expired {
                txn.append_event(OfferEvent::new(
                    OfferEventKind::OfferExpired,
                    offer.id,
                    offer.listing_id,
                    None,
                    offer.buyer_id,
                    None,
                    now,
                ));
            }
            Ok(expired.len())
        })?;
        if count > 0 {
            tracing::info!(expired = count, "expiry sweep transitioned stale offers");
        }
        self.dispatch(&events);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use parley_store::MarketStore;
    use parley_types::{Listing, OfferStatus, ParleyError, UserId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::traits::{NoBlocks, NullNotifier};

    fn engine_with_listing() -> (NegotiationEngine<NoBlocks, NullNotifier>, Listing) {
        let store = Arc::new(MarketStore::new());
        let engine = NegotiationEngine::with_defaults(store);
        let listing = Listing::dummy_active(Decimal::new(100, 0));
        engine.upsert_listing(listing.clone()).unwrap();
        (engine, listing)
    }

    /// Backdate an offer's expiry so the sweep sees it as stale.
    fn backdate(engine: &NegotiationEngine<NoBlocks, NullNotifier>, offer_id: parley_types::OfferId) {
        engine
            .store()
            .transaction(|txn| {
                let mut offer = txn.offer(offer_id)?;
                offer.expires_at = Utc::now() - Duration::hours(1);
                txn.update_offer(offer)
            })
            .unwrap();
    }

    #[test]
    fn sweep_expires_stale_active_offers() {
        let (engine, listing) = engine_with_listing();
        let stale = engine
            .create_offer(UserId::new(), listing.id, Decimal::new(80, 0), None)
            .unwrap();
        let fresh = engine
            .create_offer(UserId::new(), listing.id, Decimal::new(85, 0), None)
            .unwrap();
        backdate(&engine, stale.id);

        let count = engine.sweep_expired_offers().unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            engine.store().offer(stale.id).unwrap().status,
            OfferStatus::Expired
        );
        assert_eq!(
            engine.store().offer(fresh.id).unwrap().status,
            OfferStatus::Pending
        );
    }

    #[test]
    fn sweep_is_idempotent() {
        let (engine, listing) = engine_with_listing();
        let offer = engine
            .create_offer(UserId::new(), listing.id, Decimal::new(80, 0), None)
            .unwrap();
        backdate(&engine, offer.id);

        assert_eq!(engine.sweep_expired_offers().unwrap(), 1);
        assert_eq!(engine.sweep_expired_offers().unwrap(), 0);
        assert_eq!(
            engine.store().offer(offer.id).unwrap().status,
            OfferStatus::Expired
        );
    }

    #[test]
    fn sweep_covers_countered_offers() {
        let (engine, listing) = engine_with_listing();
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        engine
            .counter_offer(offer.id, listing.seller_id, Decimal::new(90, 0))
            .unwrap();
        backdate(&engine, offer.id);

        assert_eq!(engine.sweep_expired_offers().unwrap(), 1);
        assert_eq!(
            engine.store().offer(offer.id).unwrap().status,
            OfferStatus::Expired
        );
    }

    #[test]
    fn accept_after_expiry_fails() {
        let (engine, listing) = engine_with_listing();
        let offer = engine
            .create_offer(UserId::new(), listing.id, Decimal::new(80, 0), None)
            .unwrap();
        backdate(&engine, offer.id);
        engine.sweep_expired_offers().unwrap();

        let err = engine.accept_offer(offer.id, listing.seller_id).unwrap_err();
        assert!(matches!(err, ParleyError::WrongOfferStatus { .. }));
    }

    #[test]
    fn terminal_offers_are_never_swept() {
        let (engine, listing) = engine_with_listing();
        let buyer = UserId::new();
        let offer = engine
            .create_offer(buyer, listing.id, Decimal::new(80, 0), None)
            .unwrap();
        engine.cancel_offer(offer.id, buyer).unwrap();
        backdate(&engine, offer.id);

        assert_eq!(engine.sweep_expired_offers().unwrap(), 0);
        assert_eq!(
            engine.store().offer(offer.id).unwrap().status,
            OfferStatus::Withdrawn
        );
    }
}
