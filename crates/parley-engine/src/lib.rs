//! # parley-engine
//!
//! The **negotiation core**: the offer state machine, the atomic
//! settlement transaction, and the expiry sweep.
//!
//! ## Architecture
//!
//! [`NegotiationEngine`] is invoked by concurrent, independent request
//! handlers plus one periodic sweep task. It holds no coordination state
//! of its own — every state-changing operation runs as one
//! [`MarketStore`](parley_store::MarketStore) transaction with all guards
//! inside it, and all cross-offer coordination is pushed down to the
//! store's transactional guarantees.
//!
//! ## Settlement
//!
//! The two accept paths (seller accepts, buyer accepts a counter) funnel
//! through [`settlement::settle_offer`]:
//! 1. Re-read the offer and listing inside the transaction; conflict if
//!    either moved under the caller
//! 2. Accept the winner
//! 3. Decline every competing active offer in one set-based transition
//! 4. Flip the listing ACTIVE → SOLD (compare-and-swap)
//! 5. Record exactly one purchase
//! 6. Commit — and only then notify
//!
//! Any failure aborts the whole unit with no partial writes.

pub mod engine;
pub mod settlement;
pub mod sweep;
pub mod traits;

pub use engine::NegotiationEngine;
pub use traits::{BlockChecker, BlockList, NoBlocks, Notifier, NotifyError, NullNotifier, RecordingNotifier};
