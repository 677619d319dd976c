//! Command-line parsing and execution.

use crate::error::CliError;
use serde_json::{Value as JsonValue, json};
use tradeportal_api::{ApiClient, Credentials, HttpTransport, LoginOutcome};
use tradeportal_core::Result;

/// Usage text printed for `help` and on parse errors.
pub const USAGE: &str = "\
usage: tradeportal <command>

commands:
  login <email> [--remember]   log in (password from TRADEPORTAL_PASSWORD)
  get <endpoint>               GET an endpoint and print the JSON response
  post <endpoint> <json>       POST a JSON body and print the JSON response
  logout                       end the session
  status                       show the stored session

Without --remember the session is kept in memory and ends with the process.";

/// One invocation of the binary.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { email: String, remember: bool },
    Get { endpoint: String },
    Post { endpoint: String, body: JsonValue },
    Logout,
    Status,
    Help,
}

fn usage(message: impl Into<String>) -> CliError {
    CliError::Usage {
        message: format!("{}\n\n{USAGE}", message.into()),
    }
}

impl Command {
    /// Parses the arguments after the program name.
    ///
    /// # Errors
    ///
    /// Returns `Usage` for unknown commands or missing arguments, and
    /// `InvalidJson` for a `post` body that does not parse.
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let Some(name) = args.next() else {
            return Ok(Self::Help);
        };
        let rest: Vec<String> = args.collect();

        let command = match (name.as_str(), rest.as_slice()) {
            ("login", [email]) => Self::Login {
                email: email.clone(),
                remember: false,
            },
            ("login", [email, flag]) | ("login", [flag, email]) if flag == "--remember" => {
                Self::Login {
                    email: email.clone(),
                    remember: true,
                }
            }
            ("get", [endpoint]) => Self::Get {
                endpoint: endpoint.clone(),
            },
            ("post", [endpoint, body]) => {
                let body = serde_json::from_str(body).map_err(|e| CliError::InvalidJson {
                    reason: e.to_string(),
                })?;
                Self::Post {
                    endpoint: endpoint.clone(),
                    body,
                }
            }
            ("logout", []) => Self::Logout,
            ("status", []) => Self::Status,
            ("help" | "--help" | "-h", _) => Self::Help,
            ("login" | "get" | "post" | "logout" | "status", _) => {
                return Err(usage(format!("wrong arguments for '{name}'")).into());
            }
            _ => return Err(usage(format!("unknown command '{name}'")).into()),
        };
        Ok(command)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Get { .. } => "get",
            Self::Post { .. } => "post",
            Self::Logout => "logout",
            Self::Status => "status",
            Self::Help => "help",
        }
    }
}

/// Runs `command` and returns the text to print.
///
/// # Errors
///
/// Returns `MissingPassword` for `login` without a password, and `Request`
/// wrapping the API error when a backend call fails.
pub async fn run<T: HttpTransport>(
    command: Command,
    client: &ApiClient<T>,
    password: Option<String>,
) -> Result<String, CliError> {
    let name = command.name();
    let failed = |report: rootcause::Report<tradeportal_api::ApiError>| {
        report.context(CliError::Request { command: name })
    };

    match command {
        Command::Login { email, remember } => {
            let password = password.ok_or(CliError::MissingPassword)?;
            let outcome = client
                .login(&Credentials::new(email, password), remember)
                .await
                .map_err(failed)?;
            Ok(match outcome {
                LoginOutcome::Authenticated(session) if remember => {
                    format!("logged in as {} (remembered)", session.email())
                }
                LoginOutcome::Authenticated(session) => {
                    format!("logged in as {}", session.email())
                }
                LoginOutcome::VerificationRequired { email } => {
                    format!("check {email} for a verification link, then log in again")
                }
            })
        }
        Command::Get { endpoint } => {
            let value: JsonValue = client.get(&endpoint).await.map_err(failed)?;
            Ok(pretty(&value))
        }
        Command::Post { endpoint, body } => {
            let value: JsonValue = client.post(&endpoint, body).await.map_err(failed)?;
            Ok(pretty(&value))
        }
        Command::Logout => {
            if client.logout().await {
                Ok("logged out".to_string())
            } else {
                Ok("already logged out".to_string())
            }
        }
        Command::Status => Ok(status(client)),
        Command::Help => Ok(USAGE.to_string()),
    }
}

fn pretty(value: &JsonValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn status<T: HttpTransport>(client: &ApiClient<T>) -> String {
    let session = client.session();
    let stored = match session.current_session() {
        Ok(stored) => stored,
        Err(report) => return format!("session storage unreadable: {report}"),
    };
    let pending = session.store().pending_verification().ok().flatten();

    let value = match stored {
        Some(stored) => json!({
            "logged_in": true,
            "email": stored.email(),
            "role": stored.role(),
            "name": stored.display_name(),
            "has_refresh_token": stored.refresh_token().is_some(),
        }),
        None => json!({
            "logged_in": false,
            "pending_verification": pending,
        }),
    };
    pretty(&value)
}
