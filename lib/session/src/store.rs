//! The session/token store.
//!
//! Single source of truth for "am I authenticated, and as whom". Values
//! live under canonical keys (see [`SessionKey`]) in one of two tiers:
//! durable when the user asked to be remembered, per-session otherwise.

use crate::error::{SessionError, StorageError};
use crate::keys::SessionKey;
use crate::session::Session;
use crate::storage::{KeyValueStore, StorageTier};
use rootcause::Report;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tradeportal_core::Result;

/// Reads and writes session fields across the two storage tiers.
#[derive(Clone)]
pub struct SessionStore {
    durable: Arc<dyn KeyValueStore>,
    per_session: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    /// Creates a store over the given tiers.
    #[must_use]
    pub fn new(durable: Arc<dyn KeyValueStore>, per_session: Arc<dyn KeyValueStore>) -> Self {
        Self {
            durable,
            per_session,
        }
    }

    fn tier(&self, tier: StorageTier) -> &dyn KeyValueStore {
        match tier {
            StorageTier::Durable => self.durable.as_ref(),
            StorageTier::PerSession => self.per_session.as_ref(),
        }
    }

    fn read(&self, tier: StorageTier, key: SessionKey) -> Result<Option<String>, SessionError> {
        let value = self
            .tier(tier)
            .get(key.canonical())
            .map_err(|report| report.context(SessionError::ReadFailed { tier }))?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    fn write(&self, tier: StorageTier, key: SessionKey, value: &str) -> Result<(), SessionError> {
        self.tier(tier)
            .set(key.canonical(), value)
            .map_err(|report| report.context(SessionError::WriteFailed { tier }))
    }

    fn erase(&self, tier: StorageTier, key: SessionKey) -> Result<(), SessionError> {
        self.tier(tier)
            .remove(key.canonical())
            .map_err(|report| report.context(SessionError::WriteFailed { tier }))
    }

    /// Returns the tier currently holding an access token.
    ///
    /// The per-session tier wins when both hold one.
    fn active_tier(&self) -> Result<Option<StorageTier>, SessionError> {
        for tier in [StorageTier::PerSession, StorageTier::Durable] {
            if self.read(tier, SessionKey::AccessToken)?.is_some() {
                return Ok(Some(tier));
            }
        }
        Ok(None)
    }

    /// Returns the stored access token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn read_token(&self) -> Result<Option<String>, SessionError> {
        match self.active_tier()? {
            Some(tier) => self.read(tier, SessionKey::AccessToken),
            None => Ok(None),
        }
    }

    /// Returns the full stored session, if an access token is present.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn load(&self) -> Result<Option<Session>, SessionError> {
        let Some(tier) = self.active_tier()? else {
            return Ok(None);
        };
        let Some(token) = self.read(tier, SessionKey::AccessToken)? else {
            return Ok(None);
        };

        let text = |key| -> Result<String, SessionError> {
            Ok(self.read(tier, key)?.unwrap_or_default())
        };

        Ok(Some(
            Session::new(token)
                .with_refresh_token(self.read(tier, SessionKey::RefreshToken)?)
                .with_role(text(SessionKey::Role)?)
                .with_email(text(SessionKey::Email)?)
                .with_display_name(text(SessionKey::DisplayName)?),
        ))
    }

    /// Persists `session`, durably if `remember` is set.
    ///
    /// Identity fields are removed from the other tier so the two tiers
    /// never describe different users.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier rejects a write.
    pub fn write_session(&self, session: &Session, remember: bool) -> Result<(), SessionError> {
        let (target, other) = if remember {
            (StorageTier::Durable, StorageTier::PerSession)
        } else {
            (StorageTier::PerSession, StorageTier::Durable)
        };

        self.write(target, SessionKey::AccessToken, session.access_token())?;
        match session.refresh_token() {
            Some(refresh) => self.write(target, SessionKey::RefreshToken, refresh)?,
            None => self.erase(target, SessionKey::RefreshToken)?,
        }
        self.write(target, SessionKey::Role, session.role())?;
        self.write(target, SessionKey::Email, session.email())?;
        self.write(target, SessionKey::DisplayName, session.display_name())?;

        for key in SessionKey::IDENTITY {
            self.erase(other, key)?;
        }

        debug!(tier = %target, role = session.role(), "session written");
        Ok(())
    }

    /// Removes every session key, canonical and legacy, from both tiers.
    ///
    /// Keeps going past individual failures so as much as possible is
    /// removed. Safe to call with no session stored.
    ///
    /// # Errors
    ///
    /// Returns an error naming how many keys could not be removed.
    pub fn clear_session(&self) -> Result<(), SessionError> {
        let mut failed_keys = 0;

        for tier in StorageTier::ALL {
            let store = self.tier(tier);
            for key in SessionKey::ALL {
                for name in key.all_names() {
                    if let Err(report) = store.remove(name) {
                        warn!(
                            tier = %tier,
                            key = name,
                            error = %report,
                            "failed to remove session key"
                        );
                        failed_keys += 1;
                    }
                }
            }
        }

        if failed_keys > 0 {
            return Err(SessionError::ClearFailed { failed_keys }.into());
        }
        Ok(())
    }

    /// Rewrites values found under legacy aliases to their canonical keys
    /// and deletes every alias.
    ///
    /// An existing canonical value always wins over an alias. Returns the
    /// number of fields that were migrated.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read or written.
    pub fn migrate_legacy(&self) -> Result<usize, SessionError> {
        let mut migrated = 0;

        for tier in StorageTier::ALL {
            let store = self.tier(tier);
            let failed = |report: Report<StorageError>| {
                report.context(SessionError::MigrationFailed { tier })
            };

            for key in SessionKey::ALL {
                let mut legacy_value = None;
                for alias in key.legacy_aliases() {
                    if let Some(value) = store.get(alias).map_err(failed)? {
                        if legacy_value.is_none() && !value.is_empty() {
                            legacy_value = Some(value);
                        }
                        store.remove(alias).map_err(failed)?;
                    }
                }

                let Some(value) = legacy_value else {
                    continue;
                };
                if store.get(key.canonical()).map_err(failed)?.is_none() {
                    store.set(key.canonical(), &value).map_err(failed)?;
                    migrated += 1;
                }
            }
        }

        if migrated > 0 {
            info!(migrated, "migrated legacy session keys");
        }
        Ok(migrated)
    }

    fn read_marker(&self, key: SessionKey) -> Result<Option<String>, SessionError> {
        for tier in [StorageTier::PerSession, StorageTier::Durable] {
            if let Some(value) = self.read(tier, key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Records that `email` must be verified before login can complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the per-session tier rejects the write.
    pub fn set_pending_verification(&self, email: &str) -> Result<(), SessionError> {
        self.write(StorageTier::PerSession, SessionKey::PendingVerification, email)
    }

    /// Returns the email awaiting verification, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn pending_verification(&self) -> Result<Option<String>, SessionError> {
        self.read_marker(SessionKey::PendingVerification)
    }

    /// Drops the pending-verification marker from both tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier rejects the removal.
    pub fn clear_pending_verification(&self) -> Result<(), SessionError> {
        for tier in StorageTier::ALL {
            self.erase(tier, SessionKey::PendingVerification)?;
        }
        Ok(())
    }

    /// Remembers the page to restore after a reload.
    ///
    /// # Errors
    ///
    /// Returns an error if the per-session tier rejects the write.
    pub fn set_current_page(&self, page: &str) -> Result<(), SessionError> {
        self.write(StorageTier::PerSession, SessionKey::CurrentPage, page)
    }

    /// Returns the page to restore, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn current_page(&self) -> Result<Option<String>, SessionError> {
        self.read_marker(SessionKey::CurrentPage)
    }
}
