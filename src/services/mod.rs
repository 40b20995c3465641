//! Resource reconcilers.
//!
//! Every workflow follows the same core sequence: authenticate, re-verify
//! the bearer credential, probe for the resource (existence means a UUID
//! could be extracted from the body, not merely a 2xx status), create it
//! when absent, re-fetch to confirm, then run the resource-specific
//! post-create steps. The first failing step aborts the run; earlier
//! server-side effects are left in place and the run is safe to repeat.

mod group;
mod oauth;
mod person;

pub use group::GroupReconciler;
pub use oauth::OauthClientReconciler;
pub use person::PersonReconciler;

use serde_json::{json, Value};

use crate::auth::{authenticate, check_token, AuthOutcome};
use crate::error::{AuthError, KanidmError, KanidmResult, ServerError};
use crate::session::{Session, StepResult};
use crate::types::ATTR_UUID;

/// Authenticate and verify the session can reach the server.
pub(crate) async fn establish(session: &mut Session) -> KanidmResult<()> {
    if let AuthOutcome::Failed(detail) = authenticate(session).await? {
        return Err(AuthError::Rejected { detail }.into());
    }
    if !check_token(session).await? {
        return Err(AuthError::Rejected {
            detail: format!(
                "unable to establish an authenticated connection: {}",
                session.last_error()
            ),
        }
        .into());
    }
    Ok(())
}

/// Extract the identifying UUID from an entry response body.
///
/// The server may answer a lookup with 200 and an error payload, so a
/// resource exists only when this yields a value.
pub(crate) fn extract_uuid(result: &StepResult) -> Option<String> {
    let value = result.json.get("attrs")?.get(ATTR_UUID)?;
    match value {
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        Value::String(uuid) => Some(uuid.clone()),
        _ => None,
    }
}

/// Build an `{"attrs": {...}}` payload from attribute/value pairs.
pub(crate) fn attrs_body(pairs: &[(&str, Vec<String>)]) -> Value {
    let mut attrs = serde_json::Map::new();
    for (name, values) in pairs {
        attrs.insert((*name).to_string(), json!(values));
    }
    json!({ "attrs": attrs })
}

/// Convert a failed step into a fatal error carrying the last response.
pub(crate) fn step_error(session: &Session, step: &str, detail: String) -> KanidmError {
    let (status, reason, body) = session
        .last()
        .map(|l| (l.status, l.reason.clone(), l.text.clone()))
        .unwrap_or((0, String::new(), String::new()));
    ServerError {
        step: step.to_string(),
        detail,
        status,
        reason,
        body,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_with_json(json: Value) -> StepResult {
        StepResult {
            step: "get".to_string(),
            ok: true,
            status: 200,
            reason: "OK".to_string(),
            text: json.to_string(),
            json,
        }
    }

    #[test]
    fn uuid_extraction_handles_list_and_scalar() {
        let listed = step_with_json(json!({"attrs": {"uuid": ["u-1"], "name": ["x"]}}));
        assert_eq!(extract_uuid(&listed).as_deref(), Some("u-1"));

        let scalar = step_with_json(json!({"attrs": {"uuid": "u-2"}}));
        assert_eq!(extract_uuid(&scalar).as_deref(), Some("u-2"));
    }

    #[test]
    fn uuid_extraction_rejects_error_payloads() {
        let empty = step_with_json(json!({}));
        assert_eq!(extract_uuid(&empty), None);

        let wrong = step_with_json(json!({"attrs": {"uuid": []}}));
        assert_eq!(extract_uuid(&wrong), None);
    }

    #[test]
    fn attrs_body_shapes_payload() {
        let body = attrs_body(&[("name", vec!["team".to_string()])]);
        assert_eq!(body, json!({"attrs": {"name": ["team"]}}));
    }
}
