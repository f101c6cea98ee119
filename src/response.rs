//! Turns raw generation output into normalized question candidates.

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::GenerationError;
use crate::question::{validate, value_type_name, Candidate};

const FENCE: &str = "```";

/// Parse raw generation output into candidates, preserving source order.
///
/// Elements that are not JSON objects are dropped; every other element is
/// repaired by [`validate`]. An empty array is a valid result.
pub fn parse(raw: &str) -> Result<Vec<Candidate>, GenerationError> {
    let cleaned = strip_fences(raw);

    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        format_error(raw, cleaned, format!("invalid JSON: {e}"))
    })?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(format_error(
                raw,
                cleaned,
                format!("expected an array, found {}", value_type_name(&other)),
            ))
        }
    };

    let mut candidates = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        let object = match item {
            Value::Object(object) => object,
            other => {
                debug!(position, found = value_type_name(&other), "dropping non-object suggestion");
                continue;
            }
        };
        let validated = validate(&object);
        for correction in &validated.corrections {
            warn!(position, %correction, "corrected generated question");
        }
        candidates.push(validated.candidate);
    }

    Ok(candidates)
}

/// Remove one optional leading fence (with or without a language tag) and
/// one optional trailing fence.
pub fn strip_fences(raw: &str) -> &str {
    let mut cleaned = raw.trim();

    if let Some(rest) = cleaned.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        cleaned = rest[tag_len..].trim_start();
    }
    if let Some(rest) = cleaned.strip_suffix(FENCE) {
        cleaned = rest.trim_end();
    }

    cleaned
}

fn format_error(raw: &str, cleaned: &str, reason: String) -> GenerationError {
    error!(%reason, raw, cleaned, "generation output could not be parsed");
    GenerationError::Format {
        reason,
        raw: raw.to_string(),
        cleaned: cleaned.to_string(),
    }
}
