//! The settlement transaction.
//!
//! Settlement is the only path to ACCEPTED, and the listing's status is
//! the single arbitration point: no listing may be flipped to SOLD by two
//! settlements, which the re-check of ACTIVE inside the transaction
//! enforces. Competing offers are declined in the same transaction as the
//! win — a set-based transition, not a pre-check — so no sibling can be
//! accepted afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use parley_store::StoreTxn;
use parley_types::{
    ListingStatus, Offer, OfferEvent, OfferEventKind, OfferStatus, ParleyError, Purchase, Result,
    UserId,
};

/// Settle `observed` as the winning offer at `final_price`.
///
/// Runs inside the caller's transaction:
/// 1. Re-read the offer and listing; abort with
///    [`ParleyError::SettlementConflict`] if the offer left the status the
///    caller observed or the listing is no longer ACTIVE
/// 2. Accept the winner (`responded_at` stamped by the transition)
/// 3. Decline every other active offer on the listing
/// 4. Flip the listing ACTIVE → SOLD (compare-and-swap)
/// 5. Record exactly one purchase, id derived from the winning offer
///
/// The caller commits (step 6) and only then fires notifications.
pub fn settle_offer(
    txn: &mut StoreTxn<'_>,
    observed: &Offer,
    actor: UserId,
    final_price: Decimal,
    now: DateTime<Utc>,
) -> Result<Purchase> {
    let listing = txn.listing(observed.listing_id)?;
    if !listing.is_offerable() {
        return Err(ParleyError::SettlementConflict {
            reason: format!("listing {} is {}, no longer ACTIVE", listing.id, listing.status),
        });
    }

    let winner = txn.cas_offer_status(observed.id, observed.status, OfferStatus::Accepted, now)?;

    let siblings = txn.decline_active_siblings(listing.id, winner.id, now)?;

    txn.update_listing_status(listing.id, ListingStatus::Active, ListingStatus::Sold, now)?;

    let purchase = Purchase::from_winning_offer(&winner, final_price, now);
    txn.record_purchase(purchase.clone())?;

    let counterparty = if actor == winner.buyer_id {
        winner.seller_id
    } else {
        winner.buyer_id
    };
    txn.append_event(OfferEvent::new(
        OfferEventKind::OfferAccepted,
        winner.id,
        listing.id,
        Some(actor),
        counterparty,
        Some(final_price),
        now,
    ));
    for sibling in &siblings {
        txn.append_event(OfferEvent::new(
            OfferEventKind::OfferDeclined,
            sibling.id,
            listing.id,
            Some(actor),
            sibling.buyer_id,
            None,
            now,
        ));
    }
    txn.append_event(OfferEvent::new(
        OfferEventKind::ListingSold,
        winner.id,
        listing.id,
        Some(actor),
        listing.seller_id,
        Some(final_price),
        now,
    ));
    txn.append_event(OfferEvent::new(
        OfferEventKind::PurchaseRecorded,
        winner.id,
        listing.id,
        Some(actor),
        winner.buyer_id,
        Some(final_price),
        now,
    ));

    Ok(purchase)
}
