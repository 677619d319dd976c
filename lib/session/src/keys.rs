//! Storage keys for session fields.
//!
//! Each logical field has exactly one canonical key. Older front-end builds
//! wrote the same field under several names; those aliases are only read
//! by [`SessionStore::migrate_legacy`](crate::SessionStore::migrate_legacy)
//! and removed by `clear_session`, never written.

/// A logical field persisted by the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Bearer token sent on protected calls.
    AccessToken,
    /// Refresh token issued at login (stored, never used by the client).
    RefreshToken,
    /// The account role, e.g. `client` or `ib`.
    Role,
    /// The signed-in email address.
    Email,
    /// Name shown in the header.
    DisplayName,
    /// Email awaiting verification after a login that required it.
    PendingVerification,
    /// Last page the user was on, restored after reload.
    CurrentPage,
}

impl SessionKey {
    /// Every field, in a stable order.
    pub const ALL: [SessionKey; 7] = [
        SessionKey::AccessToken,
        SessionKey::RefreshToken,
        SessionKey::Role,
        SessionKey::Email,
        SessionKey::DisplayName,
        SessionKey::PendingVerification,
        SessionKey::CurrentPage,
    ];

    /// Fields that make up the authenticated identity.
    pub const IDENTITY: [SessionKey; 5] = [
        SessionKey::AccessToken,
        SessionKey::RefreshToken,
        SessionKey::Role,
        SessionKey::Email,
        SessionKey::DisplayName,
    ];

    /// Returns the canonical storage key.
    #[must_use]
    pub const fn canonical(self) -> &'static str {
        match self {
            Self::AccessToken => "auth.access_token",
            Self::RefreshToken => "auth.refresh_token",
            Self::Role => "auth.role",
            Self::Email => "auth.email",
            Self::DisplayName => "auth.display_name",
            Self::PendingVerification => "auth.pending_verification",
            Self::CurrentPage => "ui.current_page",
        }
    }

    /// Returns legacy aliases in lookup order.
    #[must_use]
    pub const fn legacy_aliases(self) -> &'static [&'static str] {
        match self {
            Self::AccessToken => &["accessToken", "access_token", "token", "authToken"],
            Self::RefreshToken => &["refreshToken", "refresh_token"],
            Self::Role => &["userRole", "role"],
            Self::Email => &["userEmail", "email"],
            Self::DisplayName => &["userName", "user_name", "name"],
            Self::PendingVerification => &["pendingVerification", "verifyEmail"],
            Self::CurrentPage => &["currentPage", "activePage"],
        }
    }

    /// Returns the canonical key followed by every alias.
    pub fn all_names(self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.canonical()).chain(self.legacy_aliases().iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_across_fields() {
        let mut seen = HashSet::new();
        for key in SessionKey::ALL {
            for name in key.all_names() {
                assert!(seen.insert(name), "duplicate storage key {name}");
            }
        }
    }

    #[test]
    fn access_token_has_four_aliases() {
        assert_eq!(SessionKey::AccessToken.legacy_aliases().len(), 4);
        assert_eq!(SessionKey::AccessToken.all_names().count(), 5);
    }

    #[test]
    fn identity_excludes_ui_markers() {
        assert!(!SessionKey::IDENTITY.contains(&SessionKey::CurrentPage));
        assert!(!SessionKey::IDENTITY.contains(&SessionKey::PendingVerification));
    }
}
