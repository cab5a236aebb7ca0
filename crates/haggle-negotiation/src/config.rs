//! # Negotiation Configuration

use chrono::Duration;
use serde::{Deserialize, Serialize};

use haggle_core::HaggleError;

/// Longest accepted negotiation window: one day.
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Longest accepted poll interval: one hour.
const MAX_POLL_INTERVAL_SECS: u64 = 3_600;

/// Tunables for the negotiation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// A delivery with zero bids expires once this many seconds have passed
    /// since it was opened.
    pub timeout_secs: u64,
    /// Suggested client poll interval, returned with every snapshot.
    pub poll_interval_secs: u64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            poll_interval_secs: 10,
        }
    }
}

impl NegotiationConfig {
    /// Check both values are non-zero and within bounds.
    pub fn validate(&self) -> Result<(), HaggleError> {
        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(HaggleError::Configuration(format!(
                "timeout_secs must be in 1..={MAX_TIMEOUT_SECS}, got {}",
                self.timeout_secs
            )));
        }
        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(HaggleError::Configuration(format!(
                "poll_interval_secs must be in 1..={MAX_POLL_INTERVAL_SECS}, got {}",
                self.poll_interval_secs
            )));
        }
        Ok(())
    }

    /// The negotiation window as a signed duration.
    pub fn timeout_window(&self) -> Duration {
        Duration::seconds(self.timeout_secs.min(MAX_TIMEOUT_SECS) as i64)
    }
}
