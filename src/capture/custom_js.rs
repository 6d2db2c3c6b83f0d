//! Extraction script evaluation and outcome classification

use serde_json::{Value, json};
use tracing::error;

use crate::job::CustomJsOutcome;

/// Remote-control method used to evaluate the script
pub const EVALUATE_METHOD: &str = "Runtime.evaluate";

/// Evaluation parameters
///
/// `replMode` allows `let` redeclaration and top-level `await`;
/// `returnByValue` makes the reply carry the value itself.
#[must_use]
pub fn evaluate_params(script: &str) -> Value {
    json!({
        "expression": script,
        "replMode": true,
        "returnByValue": true,
    })
}

/// Classify an evaluation reply
///
/// - `result.result` present, `result.exceptionDetails` absent or null: success
/// - `result.exceptionDetails` present (even `{}`): exception
/// - `result.result` missing: unknown, carrying whatever `result` held
#[must_use]
pub fn classify_reply(message: &Value) -> CustomJsOutcome {
    let result = message.get("result");
    let Some(remote_object) = result.and_then(|r| r.get("result")) else {
        error!("unreadable response to custom script: {message}");
        return CustomJsOutcome::Unknown {
            full_result: result.cloned(),
        };
    };

    match result
        .and_then(|r| r.get("exceptionDetails"))
        .filter(|details| !details.is_null())
    {
        Some(details) => CustomJsOutcome::Exception {
            remote_object: remote_object.clone(),
            exception_details: details.clone(),
        },
        None => CustomJsOutcome::Success {
            remote_object: remote_object.clone(),
            exception_details: (),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::CustomJsStatus;

    #[test]
    fn no_exception_details_is_success() {
        let reply = json!({"id": 3, "result": {"result": {"type": "number", "value": 4}}});
        assert_eq!(
            classify_reply(&reply),
            CustomJsOutcome::Success {
                remote_object: json!({"type": "number", "value": 4}),
                exception_details: (),
            }
        );
    }

    #[test]
    fn null_exception_details_is_success() {
        let reply = json!({"result": {"result": {"type": "undefined"}, "exceptionDetails": null}});
        assert_eq!(classify_reply(&reply).status(), CustomJsStatus::Success);
    }

    #[test]
    fn empty_exception_details_is_exception() {
        let reply = json!({"result": {"result": {"type": "object"}, "exceptionDetails": {}}});
        assert_eq!(
            classify_reply(&reply),
            CustomJsOutcome::Exception {
                remote_object: json!({"type": "object"}),
                exception_details: json!({}),
            }
        );
    }

    #[test]
    fn missing_structure_is_unknown_with_raw_value() {
        let reply = json!({"id": 9, "result": {"weird": true}});
        assert_eq!(
            classify_reply(&reply),
            CustomJsOutcome::Unknown {
                full_result: Some(json!({"weird": true}))
            }
        );

        let reply = json!({"id": 9, "error": {"code": -32000, "message": "boom"}});
        assert_eq!(
            classify_reply(&reply),
            CustomJsOutcome::Unknown { full_result: None }
        );
    }

    #[test]
    fn params_enable_repl_mode() {
        let params = evaluate_params("await 1");
        assert_eq!(params["replMode"], json!(true));
        assert_eq!(params["returnByValue"], json!(true));
        assert_eq!(params["expression"], json!("await 1"));
    }
}
