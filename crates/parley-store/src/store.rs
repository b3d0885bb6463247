//! The market store: listing status, offers, purchases, history.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use parley_types::{
    Listing, ListingId, Offer, OfferEvent, OfferId, OfferRole, OfferStats, OfferStatus, Purchase,
    PurchaseId, Result, UserId,
};

use crate::txn::StoreTxn;

/// The committed tables. Only [`StoreTxn`] writes here, and only at commit.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) listings: HashMap<ListingId, Listing>,
    pub(crate) offers: HashMap<OfferId, Offer>,
    pub(crate) purchases: HashMap<PurchaseId, Purchase>,
    /// Uniqueness index: at most one purchase per listing.
    pub(crate) purchase_by_listing: HashMap<ListingId, PurchaseId>,
    /// Append-only negotiation history.
    pub(crate) history: Vec<OfferEvent>,
}

/// Transactional store for the negotiation engine.
///
/// Writers serialize through [`MarketStore::transaction`]; read-only
/// queries share the lock and do not block each other.
#[derive(Debug, Default)]
pub struct MarketStore {
    state: RwLock<StoreState>,
}

impl MarketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoning panic can only have happened before a transaction's
    // staged writes were applied, so the committed state is still
    // consistent and safe to keep serving.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` as one atomic unit.
    ///
    /// The closure sees committed state plus its own staged writes. When it
    /// returns `Ok`, every staged write is applied under the same write
    /// lock; when it returns `Err`, nothing is applied. The events staged
    /// during the transaction are returned alongside the closure's value so
    /// the caller can deliver notifications strictly after commit.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut StoreTxn<'_>) -> Result<T>,
    ) -> Result<(T, Vec<OfferEvent>)> {
        let mut guard = self.write();
        let (value, staged) = {
            let mut txn = StoreTxn::new(&guard);
            let value = f(&mut txn)?;
            (value, txn.into_staged())
        };
        let events = staged.apply(&mut guard);
        Ok((value, events))
    }

    // =================================================================
    // Read-only queries (shared lock)
    // =================================================================

    #[must_use]
    pub fn listing(&self, id: ListingId) -> Option<Listing> {
        self.read().listings.get(&id).cloned()
    }

    #[must_use]
    pub fn offer(&self, id: OfferId) -> Option<Offer> {
        self.read().offers.get(&id).cloned()
    }

    #[must_use]
    pub fn purchase(&self, id: PurchaseId) -> Option<Purchase> {
        self.read().purchases.get(&id).cloned()
    }

    /// The purchase that settled a listing, if it has sold.
    #[must_use]
    pub fn purchase_for_listing(&self, listing_id: ListingId) -> Option<Purchase> {
        let state = self.read();
        let pid = state.purchase_by_listing.get(&listing_id)?;
        state.purchases.get(pid).cloned()
    }

    /// The buyer's active (PENDING or COUNTERED) offer on a listing, if any.
    #[must_use]
    pub fn active_offer_for(&self, listing_id: ListingId, buyer_id: UserId) -> Option<Offer> {
        self.read()
            .offers
            .values()
            .find(|o| o.listing_id == listing_id && o.buyer_id == buyer_id && o.is_active())
            .cloned()
    }

    /// Every offer ever made on a listing, newest first.
    #[must_use]
    pub fn offers_by_listing(&self, listing_id: ListingId) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self
            .read()
            .offers
            .values()
            .filter(|o| o.listing_id == listing_id)
            .cloned()
            .collect();
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        offers
    }

    /// A user's offers, filtered by role and/or status, newest first.
    #[must_use]
    pub fn offers_by_user(
        &self,
        user_id: UserId,
        role: Option<OfferRole>,
        status: Option<OfferStatus>,
    ) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self
            .read()
            .offers
            .values()
            .filter(|o| match role {
                Some(OfferRole::Buyer) => o.buyer_id == user_id,
                Some(OfferRole::Seller) => o.seller_id == user_id,
                None => o.buyer_id == user_id || o.seller_id == user_id,
            })
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        offers
    }

    /// Sent/received offer counts by status for a user.
    #[must_use]
    pub fn offer_stats(&self, user_id: UserId) -> OfferStats {
        let state = self.read();
        let mut stats = OfferStats::default();
        for offer in state.offers.values() {
            if offer.buyer_id == user_id {
                stats.sent.record(offer.status);
            }
            if offer.seller_id == user_id {
                stats.received.record(offer.status);
            }
        }
        stats
    }

    /// History entries for one offer, in append order.
    #[must_use]
    pub fn history_for_offer(&self, offer_id: OfferId) -> Vec<OfferEvent> {
        self.read()
            .history
            .iter()
            .filter(|e| e.offer_id == offer_id)
            .cloned()
            .collect()
    }

    /// Total number of history entries (all offers).
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.read().history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_types::{ListingStatus, ParleyError};
    use rust_decimal::Decimal;

    fn seeded_store() -> (MarketStore, Listing) {
        let store = MarketStore::new();
        let listing = Listing::dummy_active(Decimal::new(100, 0));
        let inserted = listing.clone();
        store
            .transaction(|txn| {
                txn.insert_listing(inserted.clone());
                Ok(())
            })
            .unwrap();
        (store, listing)
    }

    #[test]
    fn insert_and_read_listing() {
        let (store, listing) = seeded_store();
        let read = store.listing(listing.id).unwrap();
        assert_eq!(read.price, listing.price);
        assert_eq!(read.status, ListingStatus::Active);
    }

    #[test]
    fn missing_entities_read_as_none() {
        let store = MarketStore::new();
        assert!(store.listing(ListingId::new()).is_none());
        assert!(store.offer(OfferId::new()).is_none());
        assert!(store.purchase_for_listing(ListingId::new()).is_none());
    }

    #[test]
    fn active_offer_lookup_ignores_terminal_offers() {
        let (store, listing) = seeded_store();
        let buyer = UserId::new();
        let mut offer =
            Offer::dummy_on_listing(listing.id, buyer, listing.seller_id, Decimal::new(80, 0));
        offer.transition(OfferStatus::Withdrawn, Utc::now()).unwrap();
        store
            .transaction(|txn| {
                txn.insert_offer(offer.clone());
                Ok(())
            })
            .unwrap();
        assert!(store.active_offer_for(listing.id, buyer).is_none());
    }

    #[test]
    fn offers_by_user_filters_role_and_status() {
        let (store, listing) = seeded_store();
        let buyer = UserId::new();
        let offer =
            Offer::dummy_on_listing(listing.id, buyer, listing.seller_id, Decimal::new(80, 0));
        store
            .transaction(|txn| {
                txn.insert_offer(offer.clone());
                Ok(())
            })
            .unwrap();

        let sent = store.offers_by_user(buyer, Some(OfferRole::Buyer), None);
        assert_eq!(sent.len(), 1);
        let received = store.offers_by_user(buyer, Some(OfferRole::Seller), None);
        assert!(received.is_empty());
        let pending =
            store.offers_by_user(buyer, Some(OfferRole::Buyer), Some(OfferStatus::Pending));
        assert_eq!(pending.len(), 1);
        let accepted =
            store.offers_by_user(buyer, Some(OfferRole::Buyer), Some(OfferStatus::Accepted));
        assert!(accepted.is_empty());
    }

    #[test]
    fn failed_transaction_leaves_no_writes() {
        let (store, listing) = seeded_store();
        let offer = Offer::dummy_on_listing(
            listing.id,
            UserId::new(),
            listing.seller_id,
            Decimal::new(80, 0),
        );
        let offer_id = offer.id;
        let result: Result<()> = store
            .transaction(|txn| {
                txn.insert_offer(offer.clone());
                Err(ParleyError::Internal("boom".into()))
            })
            .map(|(v, _)| v);
        assert!(result.is_err());
        assert!(store.offer(offer_id).is_none(), "staged write must be gone");
    }

    #[test]
    fn stats_count_both_roles() {
        let (store, listing) = seeded_store();
        let buyer = UserId::new();
        let offer =
            Offer::dummy_on_listing(listing.id, buyer, listing.seller_id, Decimal::new(80, 0));
        store
            .transaction(|txn| {
                txn.insert_offer(offer.clone());
                Ok(())
            })
            .unwrap();

        let buyer_stats = store.offer_stats(buyer);
        assert_eq!(buyer_stats.sent.pending, 1);
        assert_eq!(buyer_stats.received.total(), 0);

        let seller_stats = store.offer_stats(listing.seller_id);
        assert_eq!(seller_stats.received.pending, 1);
        assert_eq!(seller_stats.sent.total(), 0);
    }
}
