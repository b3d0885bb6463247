//! Configuration for the negotiation engine.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Tunable parameters of the negotiation engine.
///
/// Defaults come from [`constants`]; deployments override via their own
/// config layer and hand the finished struct to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hours until a freshly created offer expires.
    pub offer_ttl_hours: i64,
    /// Hours granted after each counter-offer (resets the expiry clock).
    pub counter_ttl_hours: i64,
    /// Maximum length of the free-text message attached to an offer.
    pub max_message_len: usize,
}

impl EngineConfig {
    /// Expiry window for a new offer.
    #[must_use]
    pub fn offer_ttl(&self) -> Duration {
        Duration::hours(self.offer_ttl_hours)
    }

    /// Expiry window granted by a counter-offer.
    #[must_use]
    pub fn counter_ttl(&self) -> Duration {
        Duration::hours(self.counter_ttl_hours)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            offer_ttl_hours: constants::OFFER_TTL_HOURS,
            counter_ttl_hours: constants::COUNTER_TTL_HOURS,
            max_message_len: constants::MAX_MESSAGE_LEN,
        }
    }
}
