//! # Amounts and Estimated Times
//!
//! Prices are integers in minor currency units. Floats never represent money.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A strictly positive price in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    /// Create a validated amount.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAmount`] for zero.
    pub fn new(value: u64) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidAmount(value));
        }
        Ok(Self(value))
    }

    /// The raw value in minor units.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = ValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A courier's estimated time to complete the delivery, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct EtaMinutes(u32);

impl EtaMinutes {
    /// Upper bound: one day.
    pub const MAX: u32 = 24 * 60;

    /// Create a validated ETA in `1..=MAX` minutes.
    pub fn new(minutes: u32) -> Result<Self, ValidationError> {
        if minutes == 0 || minutes > Self::MAX {
            return Err(ValidationError::InvalidEta {
                minutes,
                max: Self::MAX,
            });
        }
        Ok(Self(minutes))
    }

    /// The raw value in minutes.
    pub fn minutes(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for EtaMinutes {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EtaMinutes> for u32 {
    fn from(eta: EtaMinutes) -> Self {
        eta.0
    }
}
