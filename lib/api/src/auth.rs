//! Login request and response handling.

use crate::error::ApiError;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use tradeportal_core::Result;
use tradeportal_session::Session;

/// Fields that carry the access token in a login response.
const TOKEN_FIELDS: [&str; 2] = ["access", "access_token"];

/// Flags the backend sets when the account must verify its email first.
const VERIFICATION_FIELDS: [&str; 3] = [
    "requires_verification",
    "verification_required",
    "otp_required",
];

/// Email and password posted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Login credentials for `email`.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// The login email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a login attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Tokens were issued and stored.
    Authenticated(Session),
    /// The backend wants the email verified before issuing tokens.
    VerificationRequired { email: String },
}

/// Interprets a successful login response body.
///
/// # Errors
///
/// Returns `ParseError` if the body neither carries a token nor asks for
/// verification.
pub fn login_outcome(body: JsonValue, credentials: &Credentials) -> Result<LoginOutcome, ApiError> {
    let has_token = TOKEN_FIELDS.iter().any(|field| {
        body.get(field)
            .and_then(JsonValue::as_str)
            .is_some_and(|token| !token.is_empty())
    });

    if has_token {
        let session: Session =
            serde_json::from_value(body).map_err(|e| ApiError::ParseError {
                reason: format!("login response: {e}"),
            })?;
        let session = if session.email().is_empty() {
            session.with_email(credentials.email())
        } else {
            session
        };
        return Ok(LoginOutcome::Authenticated(session));
    }

    let needs_verification = VERIFICATION_FIELDS
        .iter()
        .any(|field| body.get(field).and_then(JsonValue::as_bool) == Some(true));
    if needs_verification {
        return Ok(LoginOutcome::VerificationRequired {
            email: credentials.email().to_string(),
        });
    }

    Err(ApiError::ParseError {
        reason: "login response carries no access token".to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> Credentials {
        Credentials::new("alice@example.com", "hunter2")
    }

    #[test]
    fn token_response_authenticates() {
        let outcome = login_outcome(
            json!({"access": "a", "refresh": "r", "role": "client", "name": "Alice"}),
            &alice(),
        )
        .expect("outcome");

        let LoginOutcome::Authenticated(session) = outcome else {
            panic!("expected authenticated outcome");
        };
        assert_eq!(session.access_token(), "a");
        assert_eq!(session.display_name(), "Alice");
        // Filled in from the credentials when the backend omits it.
        assert_eq!(session.email(), "alice@example.com");
    }

    #[test]
    fn verification_response() {
        let outcome =
            login_outcome(json!({"requires_verification": true}), &alice()).expect("outcome");
        assert_eq!(
            outcome,
            LoginOutcome::VerificationRequired {
                email: "alice@example.com".to_string()
            }
        );
    }

    #[test]
    fn empty_token_is_not_a_login() {
        let err = login_outcome(json!({"access": ""}), &alice()).expect_err("should fail");
        assert!(matches!(err.current_context(), ApiError::ParseError { .. }));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let debug = format!("{:?}", alice());
        assert!(!debug.contains("hunter2"));
    }
}
