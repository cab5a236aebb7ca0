//! # Error Hierarchy
//!
//! Structured error types shared across the workspace, built with `thiserror`.
//!
//! Validation errors carry the rejected input and the expected shape so that
//! a client developer can fix the request without reading server logs.

use thiserror::Error;

/// Top-level error type for foundational operations.
#[derive(Error, Debug)]
pub enum HaggleError {
    /// Domain primitive validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration value out of range.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Validation errors for domain value types.
///
/// Each value type enforces its constraints at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Monetary amounts must be strictly positive.
    #[error("invalid amount: {0} (expected a positive integer in minor currency units)")]
    InvalidAmount(u64),

    /// Estimated time of arrival outside the accepted range.
    #[error("invalid ETA: {minutes} minutes (expected 1..={max})")]
    InvalidEta {
        /// The rejected value.
        minutes: u32,
        /// The largest accepted value.
        max: u32,
    },

    /// Latitude or longitude outside the WGS-84 range.
    #[error("invalid coordinates: ({lat}, {lng})")]
    InvalidCoordinates {
        /// Rejected latitude.
        lat: f64,
        /// Rejected longitude.
        lng: f64,
    },

    /// A required free-text field is empty.
    #[error("{field} must not be empty")]
    EmptyField {
        /// The offending field name.
        field: &'static str,
    },

    /// A free-text field exceeds its length limit.
    #[error("{field} must not exceed {max} characters")]
    FieldTooLong {
        /// The offending field name.
        field: &'static str,
        /// Maximum accepted length.
        max: usize,
    },

    /// Timestamp string is not valid RFC 3339.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}
