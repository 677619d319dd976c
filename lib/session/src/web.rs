//! Browser bindings: `localStorage`/`sessionStorage` tiers, DOM `storage`
//! events, and `location.replace` redirects.
//!
//! Handles hold no JS values; the window is looked up on every call so the
//! types stay `Send + Sync` like their native counterparts.

use crate::error::StorageError;
use crate::manager::{Navigator, SessionManager};
use crate::storage::{KeyValueStore, StorageEvent, StorageTier};
use std::sync::Arc;
use tracing::warn;
use tradeportal_core::Result;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;

fn js_reason(value: &wasm_bindgen::JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// One of the browser's two web storage areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserStorage {
    tier: StorageTier,
}

impl BrowserStorage {
    /// `window.localStorage`.
    #[must_use]
    pub fn local() -> Self {
        Self {
            tier: StorageTier::Durable,
        }
    }

    /// `window.sessionStorage`.
    #[must_use]
    pub fn session() -> Self {
        Self {
            tier: StorageTier::PerSession,
        }
    }

    fn area(&self) -> Result<web_sys::Storage, StorageError> {
        let unavailable = |reason: String| StorageError::Unavailable {
            tier: self.tier,
            reason,
        };
        let window = web_sys::window().ok_or_else(|| unavailable("no window".to_string()))?;
        let area = match self.tier {
            StorageTier::Durable => window.local_storage(),
            StorageTier::PerSession => window.session_storage(),
        };
        let area = area
            .map_err(|e| unavailable(js_reason(&e)))?
            .ok_or_else(|| unavailable("storage disabled".to_string()))?;
        Ok(area)
    }
}

impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .area()?
            .get_item(key)
            .map_err(|e| StorageError::ReadFailed {
                key: key.to_string(),
                reason: js_reason(&e),
            })?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.area()?
            .set_item(key, value)
            .map_err(|e| StorageError::WriteFailed {
                key: key.to_string(),
                reason: js_reason(&e),
            })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.area()?
            .remove_item(key)
            .map_err(|e| StorageError::WriteFailed {
                key: key.to_string(),
                reason: js_reason(&e),
            })?;
        Ok(())
    }
}

/// Redirects with `window.location.replace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocationNavigator;

impl Navigator for LocationNavigator {
    fn replace(&self, route: &str) {
        let Some(window) = web_sys::window() else {
            warn!(route, "no window to redirect");
            return;
        };
        if let Err(e) = window.location().replace(route) {
            warn!(route, reason = %js_reason(&e), "redirect failed");
        }
    }
}

/// Builds the manager for the current browser tab.
#[must_use]
pub fn browser_session_manager() -> SessionManager {
    SessionManager::new(
        tradeportal_core::TabId::new(),
        Arc::new(BrowserStorage::local()),
        Arc::new(BrowserStorage::session()),
        Arc::new(LocationNavigator),
    )
}

/// Forwards the window's `storage` events to `manager`.
///
/// The listener lives as long as the page.
///
/// # Errors
///
/// Returns an error if there is no window or the listener is rejected.
pub fn install_storage_listener(manager: Arc<SessionManager>) -> Result<(), StorageError> {
    let window = web_sys::window().ok_or_else(|| StorageError::Unavailable {
        tier: StorageTier::Durable,
        reason: "no window".to_string(),
    })?;

    let listener = Closure::<dyn FnMut(web_sys::StorageEvent)>::new(
        move |event: web_sys::StorageEvent| {
            let Some(key) = event.key() else {
                // `localStorage.clear()` in another tab.
                return;
            };
            manager.handle_storage_event(&StorageEvent {
                key,
                old_value: event.old_value(),
                new_value: event.new_value(),
                source: None,
            });
        },
    );

    window
        .add_event_listener_with_callback("storage", listener.as_ref().unchecked_ref())
        .map_err(|e| StorageError::Unavailable {
            tier: StorageTier::Durable,
            reason: js_reason(&e),
        })?;
    listener.forget();
    Ok(())
}
