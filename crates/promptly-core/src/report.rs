//! Validation of the generation service's reply into a [`StandardReport`].

use crate::error::{Result, SummaryError};
use crate::types::StandardReport;

/// Parse the raw reply text into a [`StandardReport`].
///
/// The text must be exactly one JSON document of the report shape. Prose or
/// markdown fencing around it, missing fields, wrong types and unknown
/// fields are all rejected with [`SummaryError::MalformedReport`].
pub fn normalize(raw_text: &str) -> Result<StandardReport> {
    serde_json::from_str(raw_text).map_err(|e| SummaryError::MalformedReport(e.to_string()))
}
