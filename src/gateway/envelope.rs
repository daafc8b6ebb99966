//! Response envelope
//!
//! Every response body is `{code, message, data}` and is sent with HTTP 200.
//! Callers distinguish success from failure by `code` only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Symbolic outcome of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    /// Store error not otherwise classified
    Failed,
    NotFound,
    MalformedParameters,
    InsertFailed,
    UpdateFailed,
}

impl Outcome {
    /// Stable numeric code
    pub const fn code(self) -> i64 {
        match self {
            Outcome::Success => 100200,
            Outcome::NotFound => 100100,
            Outcome::Failed => 100500,
            Outcome::MalformedParameters => 100501,
            Outcome::InsertFailed => 100508,
            Outcome::UpdateFailed => 100518,
        }
    }

    /// Fixed message text
    pub const fn message(self) -> &'static str {
        match self {
            Outcome::Success => "operation succeeded",
            Outcome::NotFound => "data does not exist",
            Outcome::Failed => "operation failed",
            Outcome::MalformedParameters => "request parameter error",
            Outcome::InsertFailed => "failed to add data",
            Outcome::UpdateFailed => "failed to update data",
        }
    }
}

/// Uniform response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    pub message: String,
    pub data: Value,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            code: Outcome::Success.code(),
            message: Outcome::Success.message().to_string(),
            data,
        }
    }

    /// Failure envelope; `data` is always null
    pub fn failure(outcome: Outcome) -> Self {
        Self {
            code: outcome.code(),
            message: outcome.message().to_string(),
            data: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Outcome::Success.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    const ALL: [Outcome; 6] = [
        Outcome::Success,
        Outcome::Failed,
        Outcome::NotFound,
        Outcome::MalformedParameters,
        Outcome::InsertFailed,
        Outcome::UpdateFailed,
    ];

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<i64> = ALL.iter().map(|o| o.code()).collect();
        assert_eq!(codes.len(), ALL.len());
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = Envelope::success(json!({"deletedCount": 1}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "code": 100200,
                "message": "operation succeeded",
                "data": {"deletedCount": 1}
            })
        );
    }

    #[test]
    fn test_failure_has_null_data() {
        for outcome in ALL.iter().filter(|o| **o != Outcome::Success) {
            let envelope = Envelope::failure(*outcome);
            assert_eq!(envelope.code, outcome.code());
            assert_eq!(envelope.message, outcome.message());
            assert!(envelope.data.is_null());
            assert!(!envelope.is_success());
        }
    }
}
