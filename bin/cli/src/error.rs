//! CLI errors.

use std::fmt;

/// Errors reported by the `tradeportal` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// The command line could not be understood.
    Usage { message: String },
    /// Configuration is missing or invalid.
    Config { reason: String },
    /// Storage or HTTP client could not be set up.
    Setup { reason: String },
    /// `login` was run without `TRADEPORTAL_PASSWORD`.
    MissingPassword,
    /// The request body given to `post` is not JSON.
    InvalidJson { reason: String },
    /// A backend request failed.
    Request { command: &'static str },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage { message } => write!(f, "{message}"),
            Self::Config { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Setup { reason } => write!(f, "setup failed: {reason}"),
            Self::MissingPassword => write!(f, "set TRADEPORTAL_PASSWORD to log in"),
            Self::InvalidJson { reason } => write!(f, "request body is not JSON: {reason}"),
            Self::Request { command } => write!(f, "{command} failed"),
        }
    }
}

impl std::error::Error for CliError {}
