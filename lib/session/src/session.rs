//! The authenticated session held by the client.
//!
//! A session is created from a successful login response and lives until
//! logout or the first 401/403 from the backend. The client never rotates
//! tokens; lifetime is decided by the server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens and identity of the signed-in user.
///
/// Deserializes directly from the backend's login payload, which uses
/// `access`/`refresh` and `name` for some of the fields.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for protected calls.
    #[serde(alias = "access")]
    access_token: String,
    /// Refresh token, stored but never exchanged by the client.
    #[serde(default, alias = "refresh")]
    refresh_token: Option<String>,
    /// Account role as reported by the backend.
    #[serde(default)]
    role: String,
    /// Signed-in email address.
    #[serde(default)]
    email: String,
    /// Name shown in the UI.
    #[serde(default, alias = "name", alias = "username")]
    display_name: String,
}

impl Session {
    /// Creates a session holding only an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            role: String::new(),
            email: String::new(),
            display_name: String::new(),
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: Option<String>) -> Self {
        self.refresh_token = token;
        self
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Bearer token sent with every protected call.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Refresh token, if the backend issued one. Only sent on logout.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Account role (for example "client"); empty if unknown.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Account email; empty if unknown.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Name shown in the UI; empty if unknown.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("role", &self.role)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish()
    }
}
