//! Authentication against the server.
//!
//! Two paths, attempted in a fixed order: a configured bearer token is
//! validated with `GET /v1/auth/valid`; otherwise the three-step password
//! login protocol is driven against `POST /v1/auth`. Each login response
//! is decoded into a tagged [`AuthState`]; any other shape fails closed.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AuthError, KanidmResult};
use crate::session::{Session, StepResult};

const AUTH_PATH: &str = "/v1/auth";
const AUTH_VALID_PATH: &str = "/v1/auth/valid";

/// Result of an authentication attempt.
///
/// Consumed immediately by the reconcilers to set the session's bearer
/// credential; never persisted.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// The configured token is valid and attached.
    TokenValid,
    /// The password login protocol completed and issued this token.
    PasswordLoginSucceeded(SecretString),
    /// Both paths were exhausted without a usable session.
    Failed(String),
}

/// Server-side authentication session state, one variant per protocol step.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AuthState {
    /// The server offers a choice of mechanisms.
    Choose(Vec<String>),
    /// The server expects the listed credentials next.
    Continue(Vec<String>),
    /// The protocol finished; the payload is the issued token.
    Success(String),
    /// The server rejected the attempt.
    Denied(String),
}

impl AuthState {
    /// Variant name for diagnostics, without credential material.
    fn describe(&self) -> String {
        match self {
            Self::Choose(mechs) => format!("choose {mechs:?}"),
            Self::Continue(creds) => format!("continue {creds:?}"),
            Self::Success(_) => "success".to_string(),
            Self::Denied(reason) => format!("denied: {reason}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    state: AuthState,
}

/// Establish an authenticated session.
///
/// The token path is attempted first when configured; the password path
/// only runs when there is no token or the token was rejected. Returns
/// an error before any network call when neither method is configured.
pub async fn authenticate(session: &mut Session) -> KanidmResult<AuthOutcome> {
    let token = session.config().token.clone();
    let username = session.config().username.clone();
    let password = session.config().password.clone();

    if token.is_none() && (username.is_none() || password.is_none()) {
        return Err(AuthError::NoMethodConfigured.into());
    }

    if let Some(token) = token {
        session.attach_bearer(token);
        if check_token(session).await? {
            debug!("bearer token accepted");
            return Ok(AuthOutcome::TokenValid);
        }
        warn!("configured token rejected by the server");
    }

    if let (Some(username), Some(password)) = (username, password) {
        if let Some(token) = login(session, &username, &password).await? {
            session.attach_bearer(token.clone());
            debug!(%username, "password login succeeded");
            return Ok(AuthOutcome::PasswordLoginSucceeded(token));
        }
    }

    Ok(AuthOutcome::Failed(session.last_error()))
}

/// Validate the attached bearer credential against the server.
///
/// Attaches the configured token first if the session has no credential
/// yet; errors when there is nothing to validate.
pub async fn check_token(session: &mut Session) -> KanidmResult<bool> {
    if !session.bearer_attached() {
        match session.config().token.clone() {
            Some(token) => session.attach_bearer(token),
            None => return Err(AuthError::MissingBearer.into()),
        }
    }
    Ok(session.get("check_token", AUTH_VALID_PATH).await?.ok)
}

/// Drive the three-step password login protocol.
///
/// Returns the issued token, or `None` when a step failed at the HTTP
/// level. A response whose shape does not match the protocol step is a
/// typed [`AuthError::Protocol`] failure; the protocol never retries or
/// skips steps.
async fn login(
    session: &mut Session,
    username: &str,
    password: &SecretString,
) -> KanidmResult<Option<SecretString>> {
    let init = session
        .post_json(
            "login_init",
            AUTH_PATH,
            &serde_json::json!({
                "step": {
                    "init2": {
                        "username": username,
                        "issue": "token",
                        "privileged": true,
                    }
                }
            }),
        )
        .await?;
    if !init.ok {
        return Ok(None);
    }
    match decode_state("login_init", "state.choose offering password", &init)? {
        AuthState::Choose(mechs) if mechs.iter().any(|m| m == "password") => {}
        other => return Err(protocol_error("login_init", "state.choose offering password", &other)),
    }

    let begin = session
        .post_json(
            "login_begin",
            AUTH_PATH,
            &serde_json::json!({"step": {"begin": "password"}}),
        )
        .await?;
    if !begin.ok {
        return Ok(None);
    }
    match decode_state("login_begin", "state.continue listing password", &begin)? {
        AuthState::Continue(creds) if creds.iter().any(|c| c == "password") => {}
        other => {
            return Err(protocol_error(
                "login_begin",
                "state.continue listing password",
                &other,
            ))
        }
    }

    let cred = session
        .post_json(
            "login_send",
            AUTH_PATH,
            &serde_json::json!({
                "step": {
                    "cred": {
                        "password": password.expose_secret(),
                    }
                }
            }),
        )
        .await?;
    if !cred.ok {
        return Ok(None);
    }
    match decode_state("login_send", "state.success with a token", &cred)? {
        AuthState::Success(token) => Ok(Some(SecretString::new(token.into()))),
        other => Err(protocol_error(
            "login_send",
            "state.success with a token",
            &other,
        )),
    }
}

fn decode_state(
    step: &'static str,
    expected: &'static str,
    result: &StepResult,
) -> KanidmResult<AuthState> {
    serde_json::from_value::<AuthResponse>(result.json.clone())
        .map(|r| r.state)
        .map_err(|_| {
            AuthError::Protocol {
                step,
                expected,
                state: truncate(&result.text),
            }
            .into()
        })
}

fn protocol_error(
    step: &'static str,
    expected: &'static str,
    state: &AuthState,
) -> crate::error::KanidmError {
    AuthError::Protocol {
        step,
        expected,
        state: state.describe(),
    }
    .into()
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.len() <= LIMIT {
        text.to_string()
    } else {
        let mut end = LIMIT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_state_decodes_each_step() {
        let choose: AuthResponse =
            serde_json::from_str(r#"{"sessionid":"x","state":{"choose":["password"]}}"#).unwrap();
        assert!(matches!(choose.state, AuthState::Choose(_)));

        let cont: AuthResponse =
            serde_json::from_str(r#"{"state":{"continue":["password"]}}"#).unwrap();
        assert!(matches!(cont.state, AuthState::Continue(_)));

        let success: AuthResponse =
            serde_json::from_str(r#"{"state":{"success":"tok-123"}}"#).unwrap();
        match success.state {
            AuthState::Success(token) => assert_eq!(token, "tok-123"),
            other => panic!("unexpected state {}", other.describe()),
        }

        let denied: AuthResponse =
            serde_json::from_str(r#"{"state":{"denied":"bad password"}}"#).unwrap();
        assert_eq!(denied.state.describe(), "denied: bad password");
    }

    #[test]
    fn describe_never_exposes_tokens() {
        let state = AuthState::Success("super-secret-token".to_string());
        assert_eq!(state.describe(), "success");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "é".repeat(150);
        let out = truncate(&text);
        assert!(out.chars().count() <= 101);
    }
}
