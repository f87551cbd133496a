//! Request boundary for model output: pull the pose object out of free text.
//!
//! Models often wrap the JSON in prose or code fences. The object is taken as
//! the span from the first `{` to the last `}`.

use serde_json::Value as JsonValue;

use crate::error::{json_kind, PoseError};

/// Span from the first `{` to the last `}` inclusive, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse response text into a JSON object. Tries the whole text first, then
/// the extracted span.
pub fn parse_response_text(text: &str) -> Result<JsonValue, PoseError> {
    let value = match serde_json::from_str::<JsonValue>(text.trim()) {
        Ok(v) => v,
        Err(strict) => {
            let span = extract_json_object(text).ok_or_else(|| PoseError::ResponseNotJson {
                reason: format!("no JSON object found ({strict})"),
            })?;
            serde_json::from_str(span).map_err(|e| PoseError::ResponseNotJson {
                reason: e.to_string(),
            })?
        }
    };
    if !value.is_object() {
        return Err(PoseError::InvalidPayload {
            found: json_kind(&value),
        });
    }
    Ok(value)
}
