//! Cross-tab logout signalling over shared storage.
//!
//! A logout is announced by writing the current time under
//! [`LOGOUT_SIGNAL_KEY`] in the durable tier and removing it straight away.
//! Other tabs see the write as a storage event; the removal that follows is
//! ignored, so only the rising edge counts.

use crate::error::StorageError;
use crate::storage::{KeyValueStore, StorageEvent};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::debug;
use tradeportal_core::Result;

/// The single shared key carrying logout signals.
pub const LOGOUT_SIGNAL_KEY: &str = "tradeportal.logout";

/// A logout announced by some tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutSignal {
    /// When the signal was written.
    pub at: DateTime<Utc>,
}

/// Broadcasts and recognises logout signals.
#[derive(Clone)]
pub struct LogoutChannel {
    shared: Arc<dyn KeyValueStore>,
}

impl LogoutChannel {
    /// Creates a channel writing through the shared durable tier.
    #[must_use]
    pub fn new(shared: Arc<dyn KeyValueStore>) -> Self {
        Self { shared }
    }

    /// Announces a logout to every other tab.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared tier rejects the write or removal.
    pub fn broadcast(&self) -> Result<LogoutSignal, StorageError> {
        let signal = LogoutSignal { at: Utc::now() };
        self.shared
            .set(LOGOUT_SIGNAL_KEY, &signal.at.timestamp_millis().to_string())?;
        self.shared.remove(LOGOUT_SIGNAL_KEY)?;
        debug!(at = %signal.at, "logout signal broadcast");
        Ok(signal)
    }

    /// Interprets a storage event as a logout signal.
    ///
    /// Returns `None` for other keys and for the removal half of a signal.
    /// A value that is not a timestamp still counts as a signal, stamped
    /// with the time it was seen.
    #[must_use]
    pub fn signal_from(event: &StorageEvent) -> Option<LogoutSignal> {
        if event.key != LOGOUT_SIGNAL_KEY {
            return None;
        }
        let value = event.new_value.as_deref()?;
        let at = value
            .parse::<i64>()
            .ok()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or_else(Utc::now);
        Some(LogoutSignal { at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SharedStorage;
    use tradeportal_core::TabId;

    #[test]
    fn broadcast_writes_then_clears_the_key() {
        let shared = SharedStorage::in_memory();
        let tab = shared.for_tab(TabId::new());
        let mut events = shared.subscribe();
        let channel = LogoutChannel::new(Arc::new(tab.clone()));

        let sent = channel.broadcast().expect("broadcast");

        assert!(tab.get(LOGOUT_SIGNAL_KEY).expect("get").is_none());

        let write = events.try_recv().expect("write event");
        let received = LogoutChannel::signal_from(&write).expect("signal");
        assert_eq!(received.at.timestamp_millis(), sent.at.timestamp_millis());

        let removal = events.try_recv().expect("removal event");
        assert!(LogoutChannel::signal_from(&removal).is_none());
    }

    #[test]
    fn other_keys_are_not_signals() {
        let event = StorageEvent {
            key: "auth.access_token".to_string(),
            old_value: None,
            new_value: Some("1700000000000".to_string()),
            source: None,
        };
        assert!(LogoutChannel::signal_from(&event).is_none());
    }

    #[test]
    fn non_numeric_value_still_signals() {
        let event = StorageEvent {
            key: LOGOUT_SIGNAL_KEY.to_string(),
            old_value: None,
            new_value: Some("now".to_string()),
            source: None,
        };
        assert!(LogoutChannel::signal_from(&event).is_some());
    }
}
