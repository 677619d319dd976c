//! Per-tab session manager and the unauthorized/logout flow.
//!
//! One `SessionManager` is built at start-up for each tab and shared by
//! `Arc` with everything that needs credentials. It owns the one-shot
//! logout guard that used to be ambient global state.
//!
//! # Logout flow
//!
//! Triggered locally (missing token, 401/403, explicit logout):
//! 1. mark the tab as logged out (later triggers are no-ops)
//! 2. clear the session store
//! 3. broadcast a logout signal to other tabs
//! 4. replace the current location with the login route
//!
//! Triggered by another tab's signal, step 3 is skipped so signals never
//! bounce between tabs.

use crate::channel::LogoutChannel;
use crate::error::SessionError;
use crate::keys::SessionKey;
use crate::session::Session;
use crate::storage::{KeyValueStore, MemoryStorage, SharedStorage, StorageEvent};
use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tradeportal_core::{Result, TabId};

/// Default route the flow redirects to.
pub const DEFAULT_LOGIN_ROUTE: &str = "/";

const LOGOUT_SUBSCRIBER_CAPACITY: usize = 16;

/// Performs the redirect at the end of the logout flow.
pub trait Navigator: Send + Sync {
    /// Replaces the current location with `route` without adding a
    /// history entry.
    fn replace(&self, route: &str);
}

/// Navigator for hosts without a location bar; it only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn replace(&self, route: &str) {
        info!(route, "session ended, sign in again");
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out.
    UserRequested,
    /// A protected call was attempted without a token.
    MissingToken,
    /// The backend answered 401 or 403.
    Rejected { status: u16 },
    /// Another tab logged out.
    RemoteTab,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRequested => write!(f, "user requested"),
            Self::MissingToken => write!(f, "missing token"),
            Self::Rejected { status } => write!(f, "rejected with status {status}"),
            Self::RemoteTab => write!(f, "logged out in another tab"),
        }
    }
}

/// Notification delivered to logout subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutEvent {
    pub reason: LogoutReason,
    pub at: DateTime<Utc>,
}

/// Owns one tab's session state and logout flow.
pub struct SessionManager {
    tab: TabId,
    store: SessionStore,
    channel: LogoutChannel,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    ended: AtomicBool,
    logouts: broadcast::Sender<LogoutEvent>,
}

impl SessionManager {
    /// Creates a manager for `tab`.
    ///
    /// `durable` must be the tier shared with other tabs; logout signals
    /// are written through it.
    #[must_use]
    pub fn new(
        tab: TabId,
        durable: Arc<dyn KeyValueStore>,
        per_session: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (logouts, _) = broadcast::channel(LOGOUT_SUBSCRIBER_CAPACITY);
        Self {
            tab,
            store: SessionStore::new(Arc::clone(&durable), per_session),
            channel: LogoutChannel::new(durable),
            navigator,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            ended: AtomicBool::new(false),
            logouts,
        }
    }

    /// Creates a new tab on an in-process shared store, with a fresh
    /// in-memory per-session tier.
    #[must_use]
    pub fn in_process(shared: &Arc<SharedStorage>, navigator: Arc<dyn Navigator>) -> Self {
        let tab = TabId::new();
        Self::new(
            tab,
            Arc::new(shared.for_tab(tab)),
            Arc::new(MemoryStorage::new()),
            navigator,
        )
    }

    /// Sets the route the logout flow redirects to.
    #[must_use]
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Moves values stored under legacy key names to canonical keys.
    ///
    /// Call once at start-up.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub fn migrate_legacy(&self) -> Result<usize, SessionError> {
        self.store.migrate_legacy()
    }

    /// Returns the tab this manager belongs to.
    #[must_use]
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Returns the route the logout flow redirects to.
    #[must_use]
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Returns the underlying store, for UI markers.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Returns the current access token.
    ///
    /// Storage that cannot be read is treated as holding no token.
    #[must_use]
    pub fn read_token(&self) -> Option<String> {
        match self.store.read_token() {
            Ok(token) => token,
            Err(report) => {
                warn!(tab = %self.tab, error = %report, "session storage unreadable");
                None
            }
        }
    }

    /// Returns the stored session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn current_session(&self) -> Result<Option<Session>, SessionError> {
        self.store.load()
    }

    /// Stores a freshly issued session and re-arms the logout flow.
    ///
    /// # Errors
    ///
    /// Returns an error if storage rejects the write.
    pub fn write_session(&self, session: &Session, remember: bool) -> Result<(), SessionError> {
        self.store.write_session(session, remember)?;
        self.ended.store(false, Ordering::Release);
        info!(tab = %self.tab, remember, "session started");
        Ok(())
    }

    /// Removes all session state without running the logout flow.
    ///
    /// # Errors
    ///
    /// Returns an error if some keys could not be removed.
    pub fn clear_session(&self) -> Result<(), SessionError> {
        self.store.clear_session()
    }

    /// Subscribes to logout notifications for this tab.
    #[must_use]
    pub fn subscribe_logout(&self) -> broadcast::Receiver<LogoutEvent> {
        self.logouts.subscribe()
    }

    /// Returns true once the logout flow has run and no new session has
    /// been written since.
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Runs the logout flow for a locally detected auth failure.
    ///
    /// Returns false if the flow already ran for this tab.
    pub fn handle_unauthorized(&self, reason: LogoutReason) -> bool {
        if self.ended.swap(true, Ordering::AcqRel) {
            debug!(tab = %self.tab, %reason, "logout already handled");
            return false;
        }
        warn!(tab = %self.tab, %reason, "session rejected, logging out");
        self.end_session(reason, true);
        true
    }

    /// Logs the user out at their request.
    ///
    /// Returns false if the flow already ran for this tab.
    pub fn logout(&self) -> bool {
        if self.ended.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(tab = %self.tab, "logging out");
        self.end_session(LogoutReason::UserRequested, true);
        true
    }

    /// Reacts to a change in shared storage.
    ///
    /// Runs the logout flow, without re-broadcasting, when the event is a
    /// logout signal written by another tab. Returns true if it did.
    ///
    /// An access token stored by another tab re-arms the flow, since this
    /// tab now sends that token and must log out if it is rejected.
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        if event.source == Some(self.tab) {
            return false;
        }
        if event.key == SessionKey::AccessToken.canonical()
            && event.new_value.as_deref().is_some_and(|token| !token.is_empty())
        {
            if self.ended.swap(false, Ordering::AcqRel) {
                debug!(tab = %self.tab, "session started in another tab");
            }
            return false;
        }
        let Some(signal) = LogoutChannel::signal_from(event) else {
            return false;
        };
        if self.ended.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(tab = %self.tab, signalled_at = %signal.at, "logout signalled by another tab");
        self.end_session(LogoutReason::RemoteTab, false);
        true
    }

    /// Feeds events from an in-process storage bus into
    /// [`handle_storage_event`](Self::handle_storage_event) until the bus
    /// closes.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<StorageEvent>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        manager.handle_storage_event(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(tab = %manager.tab, skipped, "storage listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn end_session(&self, reason: LogoutReason, broadcast: bool) {
        if let Err(report) = self.store.clear_session() {
            warn!(tab = %self.tab, error = %report, "session only partially cleared");
        }
        if broadcast {
            if let Err(report) = self.channel.broadcast() {
                warn!(tab = %self.tab, error = %report, "failed to signal other tabs");
            }
        }
        self.navigator.replace(&self.login_route);
        // Nobody listening is fine.
        let _ = self.logouts.send(LogoutEvent {
            reason,
            at: Utc::now(),
        });
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("tab", &self.tab)
            .field("login_route", &self.login_route)
            .field("ended", &self.has_ended())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LOGOUT_SIGNAL_KEY;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        fn routes(&self) -> Vec<String> {
            self.routes.lock().expect("lock").clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn replace(&self, route: &str) {
            self.routes.lock().expect("lock").push(route.to_string());
        }
    }

    fn tab(shared: &Arc<SharedStorage>) -> (Arc<SessionManager>, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        let manager = SessionManager::in_process(shared, navigator.clone());
        (Arc::new(manager), navigator)
    }

    fn signals(events: &mut broadcast::Receiver<StorageEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = events.try_recv() {
            if event.key == LOGOUT_SIGNAL_KEY && event.new_value.is_some() {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn unauthorized_clears_broadcasts_and_redirects() {
        let shared = SharedStorage::in_memory();
        let (manager, navigator) = tab(&shared);
        manager
            .write_session(&Session::new("tok"), true)
            .expect("write");
        let mut events = shared.subscribe();
        let mut logouts = manager.subscribe_logout();

        assert!(manager.handle_unauthorized(LogoutReason::Rejected { status: 403 }));

        assert!(manager.read_token().is_none());
        assert_eq!(navigator.routes(), vec!["/".to_string()]);
        assert_eq!(signals(&mut events), 1);
        let event = logouts.try_recv().expect("logout event");
        assert_eq!(event.reason, LogoutReason::Rejected { status: 403 });
    }

    #[test]
    fn unauthorized_runs_once() {
        let shared = SharedStorage::in_memory();
        let (manager, navigator) = tab(&shared);
        let mut events = shared.subscribe();

        assert!(manager.handle_unauthorized(LogoutReason::MissingToken));
        assert!(!manager.handle_unauthorized(LogoutReason::Rejected { status: 401 }));
        assert!(!manager.logout());

        assert_eq!(navigator.routes().len(), 1);
        assert_eq!(signals(&mut events), 1);
    }

    #[test]
    fn concurrent_failures_run_the_flow_once() {
        let shared = SharedStorage::in_memory();
        let (manager, navigator) = tab(&shared);

        let ran: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let manager = Arc::clone(&manager);
                    scope.spawn(move || {
                        manager.handle_unauthorized(LogoutReason::Rejected { status: 401 })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().expect("join")))
                .sum()
        });

        assert_eq!(ran, 1);
        assert_eq!(navigator.routes().len(), 1);
    }

    #[test]
    fn new_session_rearms_the_flow() {
        let shared = SharedStorage::in_memory();
        let (manager, navigator) = tab(&shared);

        assert!(manager.logout());
        assert!(manager.has_ended());

        manager
            .write_session(&Session::new("tok"), false)
            .expect("write");
        assert!(!manager.has_ended());
        assert!(manager.handle_unauthorized(LogoutReason::Rejected { status: 401 }));
        assert_eq!(navigator.routes().len(), 2);
    }

    #[test]
    fn custom_login_route_is_used() {
        let shared = SharedStorage::in_memory();
        let navigator = Arc::new(RecordingNavigator::default());
        let manager =
            SessionManager::in_process(&shared, navigator.clone()).with_login_route("/login");

        manager.logout();
        assert_eq!(navigator.routes(), vec!["/login".to_string()]);
    }

    #[test]
    fn other_tab_converges_without_rebroadcasting() {
        let shared = SharedStorage::in_memory();
        let (tab_a, _) = tab(&shared);
        let (tab_b, nav_b) = tab(&shared);
        tab_b
            .write_session(&Session::new("tok-b"), false)
            .expect("write");
        let mut bus = shared.subscribe();
        let mut b_logouts = tab_b.subscribe_logout();

        tab_a.handle_unauthorized(LogoutReason::Rejected { status: 401 });

        let from_a: Vec<StorageEvent> = std::iter::from_fn(|| bus.try_recv().ok()).collect();
        for event in &from_a {
            // A ignores its own writes.
            assert!(!tab_a.handle_storage_event(event));
        }
        let reacted = from_a
            .iter()
            .filter(|event| tab_b.handle_storage_event(event))
            .count();

        assert_eq!(reacted, 1);
        assert!(tab_b.read_token().is_none());
        assert_eq!(nav_b.routes(), vec!["/".to_string()]);
        assert_eq!(
            b_logouts.try_recv().expect("event").reason,
            LogoutReason::RemoteTab
        );
        // B wrote no signal of its own.
        assert_eq!(signals(&mut bus), 0);
    }

    #[test]
    fn forwarded_browser_events_have_no_source() {
        let shared = SharedStorage::in_memory();
        let (manager, navigator) = tab(&shared);
        let event = StorageEvent {
            key: LOGOUT_SIGNAL_KEY.to_string(),
            old_value: None,
            new_value: Some("1700000000000".to_string()),
            source: None,
        };

        assert!(manager.handle_storage_event(&event));
        assert!(!manager.handle_storage_event(&event));
        assert_eq!(navigator.routes().len(), 1);
    }

    #[test]
    fn login_in_another_tab_rearms_the_flow() {
        let shared = SharedStorage::in_memory();
        let (tab_a, nav_a) = tab(&shared);
        let (tab_b, _) = tab(&shared);
        let mut bus = shared.subscribe();
        let deliver_to_a = |bus: &mut broadcast::Receiver<StorageEvent>| {
            for event in std::iter::from_fn(|| bus.try_recv().ok()) {
                tab_a.handle_storage_event(&event);
            }
        };

        tab_b.logout();
        deliver_to_a(&mut bus);
        assert!(tab_a.has_ended());

        tab_b
            .write_session(&Session::new("fresh"), true)
            .expect("write");
        deliver_to_a(&mut bus);
        assert!(!tab_a.has_ended());
        assert_eq!(tab_a.read_token().as_deref(), Some("fresh"));

        assert!(tab_a.handle_unauthorized(LogoutReason::Rejected { status: 401 }));
        assert!(tab_a.read_token().is_none());
        assert!(tab_b.read_token().is_none());
        assert_eq!(nav_a.routes().len(), 2);
    }

    #[test]
    fn token_removal_does_not_rearm() {
        let shared = SharedStorage::in_memory();
        let (manager, _) = tab(&shared);
        manager.logout();

        let removed = StorageEvent {
            key: SessionKey::AccessToken.canonical().to_string(),
            old_value: Some("tok".to_string()),
            new_value: None,
            source: None,
        };

        assert!(!manager.handle_storage_event(&removed));
        assert!(manager.has_ended());
    }

    #[tokio::test]
    async fn listener_logs_out_other_tabs() {
        let shared = SharedStorage::in_memory();
        let (tab_a, _) = tab(&shared);
        let (tab_b, nav_b) = tab(&shared);
        let mut b_logouts = tab_b.subscribe_logout();
        let listener = tab_b.spawn_listener(shared.subscribe());

        tab_a.logout();

        let event = tokio::time::timeout(Duration::from_secs(5), b_logouts.recv())
            .await
            .expect("timely logout")
            .expect("logout event");
        assert_eq!(event.reason, LogoutReason::RemoteTab);
        assert_eq!(nav_b.routes(), vec!["/".to_string()]);
        listener.abort();
    }
}
