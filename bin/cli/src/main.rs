//! `tradeportal`: log in to the backend and call its API from a terminal.

mod command;
mod config;
mod error;

use crate::command::{Command, USAGE};
use crate::config::CliConfig;
use crate::error::CliError;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tradeportal_api::ApiClient;
use tradeportal_core::{Result, TabId};
use tradeportal_session::{FileStorage, MemoryStorage, SessionManager, TracingNavigator};

/// Environment variable the `login` password is read from.
const PASSWORD_VAR: &str = "TRADEPORTAL_PASSWORD";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match try_main().await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(report) => {
            eprintln!("error: {report}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> Result<String, CliError> {
    let command = Command::parse(std::env::args().skip(1))?;
    if command == Command::Help {
        return Ok(USAGE.to_string());
    }

    let config = CliConfig::from_env().map_err(|e| CliError::Config {
        reason: e.to_string(),
    })?;
    info!(base_url = %config.api.base_url, "loaded configuration");

    let durable = FileStorage::open(config.state_file.clone()).map_err(|report| {
        report.context(CliError::Setup {
            reason: format!("cannot open {}", config.state_file.display()),
        })
    })?;
    let session = SessionManager::new(
        TabId::new(),
        Arc::new(durable),
        Arc::new(MemoryStorage::new()),
        Arc::new(TracingNavigator),
    )
    .with_login_route(config.api.login_route.clone());

    match session.migrate_legacy() {
        Ok(0) => {}
        Ok(migrated) => info!(migrated, "moved legacy session keys"),
        Err(report) => warn!(error = %report, "legacy session keys not migrated"),
    }

    let client = ApiClient::with_reqwest(config.api, Arc::new(session)).map_err(|report| {
        report.context(CliError::Setup {
            reason: "HTTP client".to_string(),
        })
    })?;

    let password = std::env::var(PASSWORD_VAR).ok();
    command::run(command, &client, password).await
}
