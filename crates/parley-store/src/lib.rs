//! # parley-store
//!
//! **Durable-state plane**: the transactional market store behind the
//! negotiation engine.
//!
//! One [`MarketStore`] holds the three tables the engine coordinates —
//! listing status, offers, purchases — plus the append-only negotiation
//! history. All coordination is pushed down to this layer:
//!
//! - State-changing operations run inside [`MarketStore::transaction`],
//!   which serializes writers and applies staged writes only when the
//!   closure succeeds. An error discards every staged write, so a failed
//!   settlement leaves no partial state.
//! - Read-only queries take the shared lock and never wait on each other.
//! - The set-based bulk transitions ([`StoreTxn::decline_active_siblings`],
//!   [`StoreTxn::expire_active_offers_before`]) update every matching row
//!   in one call inside the caller's transaction, which is what makes
//!   "at most one winning offer" a transactional fact rather than a
//!   read-then-loop race.

pub mod store;
pub mod txn;

pub use store::MarketStore;
pub use txn::StoreTxn;
