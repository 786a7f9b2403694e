//! Structured data from free-form model output.
//!
//! Models wrap JSON in prose or code fences and sometimes stop mid-document.
//! [`extract_json`] locates the outermost JSON value, parses it, and on
//! failure runs exactly one repair pass (see [`repair`]) before giving up.
//! [`parse_as`] additionally validates the value against a typed schema.

mod locate;
pub mod repair;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

pub use locate::{locate_json, strip_code_fences};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("response is empty")]
    Empty,

    #[error("response contains no JSON object or array")]
    NoJson,

    #[error("response JSON could not be repaired: {parse_error}")]
    Unrepairable { parse_error: String },

    #[error("response JSON does not match the expected shape: {0}")]
    Schema(String),
}

/// A parsed value and whether the repair pass was needed.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: serde_json::Value,
    pub repaired: bool,
}

/// Extract the outermost JSON object or array from `text`.
///
/// ```rust
/// use blueprint_extraction::extract_json;
///
/// let out = extract_json(r#"{"goal": "x", "features": ["a","b""#).unwrap();
/// assert!(out.repaired);
/// assert_eq!(out.value, serde_json::json!({"goal": "x", "features": ["a", "b"]}));
/// ```
pub fn extract_json(text: &str) -> Result<Extracted, ExtractionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let unfenced = strip_code_fences(trimmed);
    let candidate = locate_json(unfenced).ok_or(ExtractionError::NoJson)?;

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(Extracted {
            value,
            repaired: false,
        }),
        Err(first) => {
            let fixed = repair::repair(candidate);
            debug!(
                original_len = candidate.len(),
                repaired_len = fixed.len(),
                error = %first,
                "JSON parse failed, trying repaired text"
            );
            serde_json::from_str(&fixed)
                .map(|value| Extracted {
                    value,
                    repaired: true,
                })
                .map_err(|second| ExtractionError::Unrepairable {
                    parse_error: format!("{first}; after repair: {second}"),
                })
        }
    }
}

/// Extract JSON from `text` and deserialize it into `T`.
pub fn parse_as<T: DeserializeOwned>(text: &str) -> Result<T, ExtractionError> {
    let extracted = extract_json(text)?;
    serde_json::from_value(extracted.value).map_err(|e| ExtractionError::Schema(e.to_string()))
}
