//! Attempt results
//!
//! [`CaptureResult`] is assembled during one orchestration run. Its serialized
//! form deliberately leaves out the status code: the proxy records the response
//! status of the top-level fetch on its own.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the caller-supplied extraction script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CustomJsOutcome {
    /// Evaluation finished without exception details
    #[serde(rename_all = "camelCase")]
    Success {
        remote_object: serde_json::Value,
        /// Serialized as `null` so every evaluated outcome carries the key
        #[serde(default)]
        exception_details: (),
    },

    /// Evaluation raised; details are carried verbatim
    #[serde(rename_all = "camelCase")]
    Exception {
        remote_object: serde_json::Value,
        exception_details: serde_json::Value,
    },

    /// The reply did not have the expected shape
    #[serde(rename_all = "camelCase")]
    Unknown { full_result: Option<serde_json::Value> },
}

/// Status tag of a [`CustomJsOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomJsStatus {
    Success,
    Exception,
    Unknown,
}

impl fmt::Display for CustomJsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Exception => write!(f, "exception"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl CustomJsOutcome {
    #[must_use]
    pub fn status(&self) -> CustomJsStatus {
        match self {
            Self::Success { .. } => CustomJsStatus::Success,
            Self::Exception { .. } => CustomJsStatus::Exception,
            Self::Unknown { .. } => CustomJsStatus::Unknown,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status() == CustomJsStatus::Success
    }
}

/// Result of one browse attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResult {
    /// URL after navigation and redirects
    pub final_url: String,
    /// Outlinks extracted after the extraction script ran
    pub outlinks: Vec<String>,
    /// Extraction script outcome, when a script was requested
    pub custom_js_result: Option<CustomJsOutcome>,
    /// Status of the top-level fetch
    #[serde(skip)]
    pub status_code: u16,
}

/// Result fields obtained before an orchestration stage failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialCapture {
    pub final_url: Option<String>,
    pub status_code: Option<u16>,
    pub outlinks: Option<Vec<String>>,
    pub custom_js_result: Option<CustomJsOutcome>,
}

impl From<CaptureResult> for PartialCapture {
    fn from(result: CaptureResult) -> Self {
        Self {
            final_url: Some(result.final_url),
            status_code: Some(result.status_code),
            outlinks: Some(result.outlinks),
            custom_js_result: result.custom_js_result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = CustomJsOutcome::Exception {
            remote_object: json!({"type": "object"}),
            exception_details: json!({"text": "Uncaught"}),
        };
        assert_eq!(
            serde_json::to_value(&outcome).expect("serializable"),
            json!({
                "status": "exception",
                "remoteObject": {"type": "object"},
                "exceptionDetails": {"text": "Uncaught"}
            })
        );

        let success = CustomJsOutcome::Success {
            remote_object: json!({"type": "number", "value": 4}),
            exception_details: (),
        };
        assert_eq!(
            serde_json::to_value(&success).expect("serializable"),
            json!({
                "status": "success",
                "remoteObject": {"type": "number", "value": 4},
                "exceptionDetails": null
            })
        );

        let unknown = CustomJsOutcome::Unknown { full_result: None };
        assert_eq!(
            serde_json::to_value(&unknown).expect("serializable"),
            json!({"status": "unknown", "fullResult": null})
        );
    }

    #[test]
    fn result_omits_status_code() {
        let result = CaptureResult {
            final_url: "https://example.com/".to_string(),
            outlinks: vec!["https://example.com/a".to_string()],
            custom_js_result: None,
            status_code: 404,
        };
        let value = serde_json::to_value(&result).expect("serializable");
        assert_eq!(
            value,
            json!({
                "final_url": "https://example.com/",
                "outlinks": ["https://example.com/a"],
                "custom_js_result": null
            })
        );
    }
}
