//! System-wide constants for the Parley negotiation engine.

/// Hours until a freshly created offer expires.
pub const OFFER_TTL_HOURS: i64 = 48;

/// Hours granted to the buyer after a counter-offer. Every counter resets
/// the clock, so each new proposal gets a full response window.
pub const COUNTER_TTL_HOURS: i64 = 48;

/// Maximum length of the free-text message attached to an offer.
pub const MAX_MESSAGE_LEN: usize = 500;

/// At most this many active offers per (listing, buyer) pair.
pub const MAX_ACTIVE_OFFERS_PER_BUYER: usize = 1;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Parley";
