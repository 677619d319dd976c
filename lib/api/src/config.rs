//! API client configuration.

use crate::allowlist::DEFAULT_PUBLIC_PATHS;
use serde::Deserialize;
use tradeportal_session::DEFAULT_LOGIN_ROUTE;

/// Configuration for [`ApiClient`](crate::ApiClient).
///
/// Everything except `base_url` has a default, so the struct can be
/// loaded from environment variables with only the origin set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Origin (and optional prefix) relative endpoints are joined onto,
    /// e.g. "https://api.example.com/api".
    pub base_url: String,

    /// Route the logout flow redirects to.
    #[serde(default = "default_login_route")]
    pub login_route: String,

    /// Endpoint substrings callable without a token.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    /// Cookie holding the CSRF token.
    #[serde(default = "default_csrf_cookie")]
    pub csrf_cookie: String,

    /// Header the CSRF token is sent in on mutating requests.
    #[serde(default = "default_csrf_header")]
    pub csrf_header: String,

    /// Endpoint credentials are posted to.
    #[serde(default = "default_login_endpoint")]
    pub login_endpoint: String,

    /// Endpoint notified on explicit logout.
    #[serde(default = "default_logout_endpoint")]
    pub logout_endpoint: String,
}

fn default_login_route() -> String {
    DEFAULT_LOGIN_ROUTE.to_string()
}

fn default_public_paths() -> Vec<String> {
    DEFAULT_PUBLIC_PATHS.iter().map(|p| (*p).to_string()).collect()
}

fn default_csrf_cookie() -> String {
    "csrftoken".to_string()
}

fn default_csrf_header() -> String {
    "X-CSRFToken".to_string()
}

fn default_login_endpoint() -> String {
    "login/".to_string()
}

fn default_logout_endpoint() -> String {
    "logout/".to_string()
}

impl ApiConfig {
    /// Creates a configuration with defaults for everything but the base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_route: default_login_route(),
            public_paths: default_public_paths(),
            csrf_cookie: default_csrf_cookie(),
            csrf_header: default_csrf_header(),
            login_endpoint: default_login_endpoint(),
            logout_endpoint: default_logout_endpoint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_has_correct_defaults() {
        let config = ApiConfig::new("https://api.example.com");
        assert_eq!(config.login_route, "/");
        assert_eq!(config.csrf_cookie, "csrftoken");
        assert_eq!(config.csrf_header, "X-CSRFToken");
        assert_eq!(
            config.public_paths,
            vec!["login/", "public/", "get-usd-inr-rate/", "finance/quote"]
        );
    }

    #[test]
    fn deserialize_fills_defaults() {
        let config: ApiConfig =
            serde_json::from_str(r#"{"base_url": "https://api.example.com"}"#)
                .expect("deserialize");
        assert_eq!(config, ApiConfig::new("https://api.example.com"));
    }
}
