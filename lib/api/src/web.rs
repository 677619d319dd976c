//! Browser wiring: CSRF cookie from `document.cookie` and a client for
//! the current tab.

use crate::client::ApiClient;
use crate::config::ApiConfig;
use crate::cookies::{CookieSource, find_cookie};
use crate::error::TransportError;
use crate::http::ReqwestTransport;
use std::sync::Arc;
use tracing::warn;
use tradeportal_core::Result;
use tradeportal_session::web::{browser_session_manager, install_storage_listener};
use wasm_bindgen::JsCast;

/// Reads `document.cookie`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentCookies;

impl CookieSource for DocumentCookies {
    fn cookie(&self, name: &str) -> Option<String> {
        let document = web_sys::window()?.document()?;
        let document = document.dyn_into::<web_sys::HtmlDocument>().ok()?;
        let cookies = document.cookie().ok()?;
        find_cookie(&cookies, name)
    }
}

/// Builds the API client for this tab and starts listening for logouts
/// from other tabs.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn browser_api_client(
    config: ApiConfig,
) -> Result<ApiClient<ReqwestTransport>, TransportError> {
    let session = Arc::new(browser_session_manager().with_login_route(config.login_route.clone()));
    if let Err(report) = session.migrate_legacy() {
        warn!(error = %report, "legacy session keys not migrated");
    }
    if let Err(report) = install_storage_listener(Arc::clone(&session)) {
        warn!(error = %report, "cross-tab logout disabled");
    }
    let transport = ReqwestTransport::new()?;
    Ok(ApiClient::new(
        config,
        transport,
        session,
        Arc::new(DocumentCookies),
    ))
}
