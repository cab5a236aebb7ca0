//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and helpers
//! to extract + validate JSON bodies in handlers.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Request types that check business rules serde cannot express.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Parse a body that may be left out entirely.
///
/// An empty or all-whitespace body yields `T::default()`, whatever the
/// `Content-Type`. Anything else must be valid JSON for `T`.
pub fn extract_optional_validated_json<T>(body: &[u8]) -> Result<T, AppError>
where
    T: DeserializeOwned + Default + Validate,
{
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        T::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))?
    };
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Check an optional free-text field against a length cap.
pub(crate) fn check_note(field: &str, value: Option<&str>, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(format!("{field} must not exceed {max} characters"))
        }
        _ => Ok(()),
    }
}
