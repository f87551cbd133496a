//! Error types for the pose pipeline.
//!
//! Only request-level failures are errors. Per-field problems inside a payload
//! are recovered locally and reported as [`crate::normalize::Diagnostic`]s.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoseError {
    /// The upstream response (model output, uploaded file) is not JSON at all.
    #[error("pose response is not valid JSON: {reason}")]
    ResponseNotJson { reason: String },

    /// The payload parsed but is not a JSON object.
    #[error("pose payload must be a JSON object, got {found}")]
    InvalidPayload { found: &'static str },

    #[error("invalid pose config: {0}")]
    InvalidConfig(String),

    #[error("serialize pose: {0}")]
    Serialize(String),

    #[error("dataset: {0}")]
    Dataset(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PoseError {
    /// True for failures of a single request that leave the rig untouched.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            PoseError::ResponseNotJson { .. } | PoseError::InvalidPayload { .. }
        )
    }
}

/// Short JSON type label for messages.
pub(crate) fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
