//! Staged-write transactions over the market store.
//!
//! A [`StoreTxn`] is handed to the closure passed to
//! [`MarketStore::transaction`](crate::MarketStore::transaction). Reads see
//! committed state overlaid with the transaction's own staged writes;
//! writes land in staging maps and reach the committed tables only when
//! the closure returns `Ok`. The compare-and-swap and set-based bulk
//! helpers here are the primitives settlement correctness rests on.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use parley_types::{
    Listing, ListingId, ListingStatus, Offer, OfferEvent, OfferId, OfferStatus, ParleyError,
    Purchase, Result, UserId,
};

use crate::store::StoreState;

/// A single atomic unit of work against the store.
pub struct StoreTxn<'a> {
    base: &'a StoreState,
    listings: HashMap<ListingId, Listing>,
    offers: HashMap<OfferId, Offer>,
    purchases: Vec<Purchase>,
    events: Vec<OfferEvent>,
}

/// The writes a transaction accumulated, ready to apply at commit.
pub(crate) struct Staged {
    listings: HashMap<ListingId, Listing>,
    offers: HashMap<OfferId, Offer>,
    purchases: Vec<Purchase>,
    events: Vec<OfferEvent>,
}

impl Staged {
    /// Apply every staged write to the committed tables. Infallible by
    /// construction: all guards ran inside the transaction.
    pub(crate) fn apply(self, state: &mut StoreState) -> Vec<OfferEvent> {
        for (id, listing) in self.listings {
            state.listings.insert(id, listing);
        }
        for (id, offer) in self.offers {
            state.offers.insert(id, offer);
        }
        for purchase in self.purchases {
            state.purchase_by_listing.insert(purchase.listing_id, purchase.id);
            state.purchases.insert(purchase.id, purchase);
        }
        state.history.extend(self.events.iter().cloned());
        self.events
    }
}

impl<'a> StoreTxn<'a> {
    pub(crate) fn new(base: &'a StoreState) -> Self {
        Self {
            base,
            listings: HashMap::new(),
            offers: HashMap::new(),
            purchases: Vec::new(),
            events: Vec::new(),
        }
    }

    pub(crate) fn into_staged(self) -> Staged {
        Staged {
            listings: self.listings,
            offers: self.offers,
            purchases: self.purchases,
            events: self.events,
        }
    }

    /// Committed offers overlaid with this transaction's staged versions.
    fn effective_offers(&self) -> impl Iterator<Item = &Offer> {
        self.base
            .offers
            .values()
            .filter(|o| !self.offers.contains_key(&o.id))
            .chain(self.offers.values())
    }

    // =================================================================
    // Listings
    // =================================================================

    pub fn insert_listing(&mut self, listing: Listing) {
        self.listings.insert(listing.id, listing);
    }

    pub fn listing(&self, id: ListingId) -> Result<Listing> {
        self.listings
            .get(&id)
            .or_else(|| self.base.listings.get(&id))
            .cloned()
            .ok_or(ParleyError::ListingNotFound(id))
    }

    /// Compare-and-swap on listing status — the arbitration point that
    /// prevents two settlements from both flipping a listing to SOLD.
    ///
    /// # Errors
    /// [`ParleyError::SettlementConflict`] if the listing's status no
    /// longer matches `expected`.
    pub fn update_listing_status(
        &mut self,
        id: ListingId,
        expected: ListingStatus,
        next: ListingStatus,
        now: DateTime<Utc>,
    ) -> Result<Listing> {
        let mut listing = self.listing(id)?;
        if listing.status != expected {
            return Err(ParleyError::SettlementConflict {
                reason: format!("listing {id} is {}, expected {expected}", listing.status),
            });
        }
        listing.status = next;
        listing.updated_at = now;
        self.listings.insert(id, listing.clone());
        Ok(listing)
    }

    // =================================================================
    // Offers
    // =================================================================

    pub fn insert_offer(&mut self, offer: Offer) {
        self.offers.insert(offer.id, offer);
    }

    pub fn offer(&self, id: OfferId) -> Result<Offer> {
        self.offers
            .get(&id)
            .or_else(|| self.base.offers.get(&id))
            .cloned()
            .ok_or(ParleyError::OfferNotFound(id))
    }

    /// Write back an offer previously read in this transaction.
    pub fn update_offer(&mut self, offer: Offer) -> Result<()> {
        if !self.offers.contains_key(&offer.id) && !self.base.offers.contains_key(&offer.id) {
            return Err(ParleyError::OfferNotFound(offer.id));
        }
        self.offers.insert(offer.id, offer);
        Ok(())
    }

    /// The buyer's active offer on a listing, if any — the uniqueness
    /// guard behind "one active offer per (listing, buyer)".
    pub fn active_offer_for(&self, listing_id: ListingId, buyer_id: UserId) -> Option<Offer> {
        self.effective_offers()
            .find(|o| o.listing_id == listing_id && o.buyer_id == buyer_id && o.is_active())
            .cloned()
    }

    pub fn offers_by_listing(&self, listing_id: ListingId) -> Vec<Offer> {
        self.effective_offers()
            .filter(|o| o.listing_id == listing_id)
            .cloned()
            .collect()
    }

    /// Guarded compare-and-swap on offer status.
    ///
    /// Re-reads the offer inside the transaction and aborts with a
    /// conflict if it is no longer in the status the caller observed,
    /// then runs the transition-table-checked status change.
    ///
    /// # Errors
    /// [`ParleyError::SettlementConflict`] on a lost race,
    /// [`ParleyError::WrongOfferStatus`] if the transition is illegal.
    pub fn cas_offer_status(
        &mut self,
        id: OfferId,
        expected: OfferStatus,
        next: OfferStatus,
        now: DateTime<Utc>,
    ) -> Result<Offer> {
        let mut offer = self.offer(id)?;
        if offer.status != expected {
            return Err(ParleyError::SettlementConflict {
                reason: format!("offer {id} is {}, expected {expected}", offer.status),
            });
        }
        offer.transition(next, now)?;
        self.offers.insert(id, offer.clone());
        Ok(offer)
    }

    /// Decline every other active offer on a listing in one set-based
    /// transition. Executed in the same transaction as the winner's
    /// acceptance, this is what enforces "at most one winning offer":
    /// no sibling can be accepted after this point.
    ///
    /// Returns the declined offers, oldest first.
    pub fn decline_active_siblings(
        &mut self,
        listing_id: ListingId,
        winner: OfferId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Offer>> {
        let mut siblings: Vec<Offer> = self
            .effective_offers()
            .filter(|o| o.listing_id == listing_id && o.id != winner && o.is_active())
            .cloned()
            .collect();
        siblings.sort_by_key(|o| o.created_at);

        for offer in &mut siblings {
            offer.transition(OfferStatus::Declined, now)?;
            self.offers.insert(offer.id, offer.clone());
        }
        tracing::debug!(
            listing = %listing_id,
            declined = siblings.len(),
            "declined sibling offers"
        );
        Ok(siblings)
    }

    /// Expire every active offer whose window elapsed before `now`, in one
    /// set-based transition. Status-guarded, so re-running over the same
    /// rows is a no-op.
    ///
    /// Returns the expired offers, oldest first.
    pub fn expire_active_offers_before(&mut self, now: DateTime<Utc>) -> Result<Vec<Offer>> {
        let mut stale: Vec<Offer> = self
            .effective_offers()
            .filter(|o| o.is_expired(now))
            .cloned()
            .collect();
        stale.sort_by_key(|o| o.created_at);

        for offer in &mut stale {
            offer.transition(OfferStatus::Expired, now)?;
            self.offers.insert(offer.id, offer.clone());
        }
        Ok(stale)
    }

    // =================================================================
    // Purchases & history
    // =================================================================

    /// Append the settlement's purchase record.
    ///
    /// # Errors
    /// [`ParleyError::PurchaseAlreadyRecorded`] if the listing already has
    /// one — the backstop behind the listing-status CAS.
    pub fn record_purchase(&mut self, purchase: Purchase) -> Result<()> {
        let listing_id = purchase.listing_id;
        let already = self.base.purchase_by_listing.contains_key(&listing_id)
            || self.purchases.iter().any(|p| p.listing_id == listing_id);
        if already {
            return Err(ParleyError::PurchaseAlreadyRecorded(listing_id));
        }
        self.purchases.push(purchase);
        Ok(())
    }

    pub fn purchase_for_listing(&self, listing_id: ListingId) -> Option<Purchase> {
        if let Some(purchase) = self.purchases.iter().find(|p| p.listing_id == listing_id) {
            return Some(purchase.clone());
        }
        let pid = self.base.purchase_by_listing.get(&listing_id)?;
        self.base.purchases.get(pid).cloned()
    }

    /// Stage a history entry; delivered to the notifier only after commit.
    pub fn append_event(&mut self, event: OfferEvent) {
        self.events.push(event);
    }
}
