//! Authenticated REST client for the tradeportal backend.
//!
//! Every backend call goes through [`ApiClient`], which:
//! - adds `Content-Type: application/json` and the bearer token
//! - adds the CSRF header and includes cookies on mutating methods
//! - refuses to send protected calls when no token is stored
//! - ends the session (once) when the backend answers 401 or 403
//!
//! The network sits behind [`HttpTransport`]; [`ReqwestTransport`] is the
//! production implementation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::Value;
//! use tradeportal_api::{ApiClient, ApiConfig, Credentials};
//! use tradeportal_session::{SessionManager, SharedStorage, TracingNavigator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let shared = SharedStorage::in_memory();
//! let session = Arc::new(SessionManager::in_process(&shared, Arc::new(TracingNavigator)));
//! let client = ApiClient::with_reqwest(ApiConfig::new("https://api.example.com/api"), session)
//!     .map_err(|e| e.to_string())?;
//!
//! client
//!     .login(&Credentials::new("alice@example.com", "secret"), true)
//!     .await
//!     .map_err(|e| e.to_string())?;
//! let accounts: Value = client.get("accounts/").await.map_err(|e| e.to_string())?;
//! println!("{accounts}");
//! # Ok(())
//! # }
//! ```

pub mod allowlist;
pub mod auth;
pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod http;
pub mod request;
pub mod transport;
#[cfg(feature = "web")]
pub mod web;

pub use allowlist::{DEFAULT_PUBLIC_PATHS, PublicAllowlist, is_absolute_url};
pub use auth::{Credentials, LoginOutcome, login_outcome};
pub use client::ApiClient;
pub use config::ApiConfig;
pub use cookies::{CookieSource, NoCookies, find_cookie};
pub use error::{ApiError, TransportError};
#[cfg(not(target_arch = "wasm32"))]
pub use http::JarCookies;
pub use http::ReqwestTransport;
pub use request::{
    CredentialsMode, FormPart, FormValue, MultipartForm, RequestBody, RequestDescriptor,
    RequestOptions, is_mutating,
};
pub use transport::{HttpResponse, HttpTransport};
