//! Client session state for tradeportal.
//!
//! This crate provides:
//! - Two-tier key/value storage (`KeyValueStore`, durable and per-session)
//! - The session/token store (`SessionStore`, `Session`)
//! - Cross-tab logout signalling (`LogoutChannel`)
//! - The per-tab `SessionManager` running the unauthorized/logout flow
//!
//! With the `web` feature the tiers map to `localStorage` and
//! `sessionStorage`, and other tabs are heard through DOM `storage` events.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tradeportal_session::{
//!     LogoutReason, Session, SessionManager, SharedStorage, TracingNavigator,
//! };
//!
//! let shared = SharedStorage::in_memory();
//! let tab = SessionManager::in_process(&shared, Arc::new(TracingNavigator));
//!
//! let session = Session::new("access-token")
//!     .with_role("client")
//!     .with_email("alice@example.com");
//! tab.write_session(&session, true).expect("write session");
//! assert_eq!(tab.read_token().as_deref(), Some("access-token"));
//!
//! // A 401 from the backend ends the session exactly once.
//! assert!(tab.handle_unauthorized(LogoutReason::Rejected { status: 401 }));
//! assert!(!tab.handle_unauthorized(LogoutReason::Rejected { status: 401 }));
//! assert!(tab.read_token().is_none());
//! ```

pub mod channel;
pub mod error;
pub mod keys;
pub mod manager;
pub mod session;
pub mod storage;
pub mod store;
#[cfg(feature = "web")]
pub mod web;

// Re-export main types at crate root
pub use channel::{LOGOUT_SIGNAL_KEY, LogoutChannel, LogoutSignal};
pub use error::{SessionError, StorageError};
pub use keys::SessionKey;
pub use manager::{
    DEFAULT_LOGIN_ROUTE, LogoutEvent, LogoutReason, Navigator, SessionManager, TracingNavigator,
};
pub use session::Session;
pub use storage::{
    FileStorage, KeyValueStore, MemoryStorage, SharedStorage, StorageEvent, StorageTier,
    TabStorage,
};
pub use store::SessionStore;
