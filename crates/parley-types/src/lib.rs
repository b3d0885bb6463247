//! # parley-types
//!
//! Shared types, errors, and configuration for the **Parley** offer
//! negotiation and settlement engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OfferId`], [`ListingId`], [`UserId`], [`PurchaseId`]
//! - **Listing model**: [`Listing`], [`ListingStatus`]
//! - **Offer model**: [`Offer`], [`OfferStatus`] and its transition table
//! - **Purchase model**: [`Purchase`]
//! - **Audit events**: [`OfferEvent`], [`OfferEventKind`]
//! - **Stats**: [`OfferStats`], [`StatusCounts`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`ParleyError`] with `PAR_ERR_` prefix codes

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod listing;
pub mod offer;
pub mod purchase;
pub mod stats;

// Re-export all primary types at crate root for ergonomic imports:
//   use parley_types::{Offer, OfferStatus, Purchase, ...};

pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use listing::*;
pub use offer::*;
pub use purchase::*;
pub use stats::*;

// Constants are accessed via `parley_types::constants::FOO`
// (not re-exported to avoid name collisions).
