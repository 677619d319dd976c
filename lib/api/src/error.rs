//! Error types for the API crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `TransportError`: The request could not be carried over the network
//! - `ApiError`: What a caller of the API wrapper sees

use std::fmt;

/// Errors from an HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    ClientSetup { reason: String },
    /// The request could not be encoded for the wire.
    InvalidRequest { reason: String },
    /// Connecting or sending failed.
    ConnectionFailed { reason: String },
    /// The response body could not be read.
    BodyReadFailed { reason: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientSetup { reason } => write!(f, "HTTP client setup failed: {reason}"),
            Self::InvalidRequest { reason } => write!(f, "request cannot be sent: {reason}"),
            Self::ConnectionFailed { reason } => write!(f, "connection failed: {reason}"),
            Self::BodyReadFailed { reason } => {
                write!(f, "failed to read response body: {reason}")
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors surfaced to callers of the API wrapper.
///
/// `NoAuthToken` and `Unauthorized` have already ended the session by the
/// time the caller sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// A protected endpoint was called with no token; nothing was sent.
    NoAuthToken { endpoint: String },
    /// The backend rejected the credentials (401 or 403).
    Unauthorized { status: u16 },
    /// Any other non-success status.
    HttpError { status: u16, status_text: String },
    /// The transport failed before a response arrived.
    Network { reason: String },
    /// A success response did not hold the expected JSON.
    ParseError { reason: String },
    /// The request could not be built (bad header value, bad URL).
    InvalidRequest { reason: String },
    /// Session storage could not be updated after login.
    SessionUnavailable { reason: String },
}

impl ApiError {
    /// Returns true for the variants that ended the session.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::NoAuthToken { .. } | Self::Unauthorized { .. })
    }

    /// Returns the HTTP status, when a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status } | Self::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuthToken { endpoint } => {
                write!(f, "no auth token for protected endpoint '{endpoint}'")
            }
            Self::Unauthorized { status } => write!(f, "unauthorized ({status})"),
            Self::HttpError {
                status,
                status_text,
            } => write!(f, "HTTP error {status} {status_text}"),
            Self::Network { reason } => write!(f, "network error: {reason}"),
            Self::ParseError { reason } => write!(f, "invalid response body: {reason}"),
            Self::InvalidRequest { reason } => write!(f, "invalid request: {reason}"),
            Self::SessionUnavailable { reason } => {
                write!(f, "session storage unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for ApiError {}
