//! CLI configuration.
//!
//! Loaded from `TRADEPORTAL_`-prefixed environment variables, with `__`
//! separating nested keys:
//!
//! ```text
//! TRADEPORTAL_API__BASE_URL=https://api.example.com/api
//! TRADEPORTAL_API__PUBLIC_PATHS=login/,public/
//! TRADEPORTAL_STATE_FILE=/home/alice/.tradeportal.json
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use tradeportal_api::ApiConfig;

/// Environment variable prefix for configuration keys.
pub const ENV_PREFIX: &str = "TRADEPORTAL";

/// Top-level configuration for the `tradeportal` binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CliConfig {
    /// Backend client configuration.
    pub api: ApiConfig,

    /// File backing the durable ("remember me") storage tier.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("tradeportal-session.json")
}

/// The environment source with the CLI's prefix, separators and list keys.
#[must_use]
pub fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("api.public_paths")
        .try_parsing(true)
}

impl CliConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(environment())
    }

    /// Loads configuration from an explicit environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_source(source: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> config::Environment {
        environment().source(Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ))
    }

    #[test]
    fn base_url_alone_is_enough() {
        let config = CliConfig::from_source(vars(&[(
            "TRADEPORTAL_API__BASE_URL",
            "https://api.example.com/api",
        )]))
        .expect("config");

        assert_eq!(config.api, ApiConfig::new("https://api.example.com/api"));
        assert_eq!(config.state_file, PathBuf::from("tradeportal-session.json"));
    }

    #[test]
    fn nested_keys_and_lists() {
        let config = CliConfig::from_source(vars(&[
            ("TRADEPORTAL_API__BASE_URL", "http://localhost:8000/api"),
            ("TRADEPORTAL_API__PUBLIC_PATHS", "login/,register/"),
            ("TRADEPORTAL_API__LOGIN_ROUTE", "/signin"),
            ("TRADEPORTAL_STATE_FILE", "/tmp/session.json"),
        ]))
        .expect("config");

        assert_eq!(config.api.public_paths, vec!["login/", "register/"]);
        assert_eq!(config.api.login_route, "/signin");
        assert_eq!(config.state_file, PathBuf::from("/tmp/session.json"));
    }

    #[test]
    fn missing_base_url_is_an_error() {
        assert!(CliConfig::from_source(vars(&[("TRADEPORTAL_STATE_FILE", "x.json")])).is_err());
    }
}
