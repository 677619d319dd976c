//! Identifiers for client-side entities.
//!
//! Identifiers wrap a ULID and display with a short type prefix
//! (`tab_01J...`), so log lines from concurrent tabs and calls sort by
//! creation time and stay distinguishable.

use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when a prefixed identifier does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// Prefix the input was expected to carry.
    pub expected_prefix: &'static str,
    /// Why parsing failed.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid '{}' identifier: {}",
            self.expected_prefix, self.reason
        )
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident => $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Ulid);

        impl $name {
            /// Display prefix.
            pub const PREFIX: &'static str = $prefix;

            /// Generates a fresh identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// The underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let error = |reason: String| ParseIdError {
                    expected_prefix: Self::PREFIX,
                    reason,
                };
                let raw = s
                    .strip_prefix(Self::PREFIX)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .ok_or_else(|| error(format!("missing '{}_' prefix", Self::PREFIX)))?;
                Ulid::from_str(raw)
                    .map(Self)
                    .map_err(|e| error(e.to_string()))
            }
        }
    };
}

define_id!(
    /// Identifies one tab (one `SessionManager` instance) sharing durable storage.
    ///
    /// Storage writes are tagged with the writer's tab so a tab never
    /// reacts to its own cross-tab signals.
    TabId => "tab"
);

define_id!(
    /// Correlates the log lines of a single API call.
    RequestId => "req"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_prefix() {
        assert!(TabId::new().to_string().starts_with("tab_"));
        assert!(RequestId::new().to_string().starts_with("req_"));
    }

    #[test]
    fn parses_own_display() {
        let id = TabId::new();
        let parsed: TabId = id.to_string().parse().expect("should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn wrong_or_missing_prefix_is_rejected() {
        let ulid = Ulid::new();
        let err = ulid.to_string().parse::<TabId>().expect_err("no prefix");
        assert_eq!(err.expected_prefix, "tab");

        let req = RequestId::new().to_string();
        assert!(req.parse::<TabId>().is_err());
    }

    #[test]
    fn malformed_ulid_is_rejected() {
        let err = "req_nope".parse::<RequestId>().expect_err("should not parse");
        assert_eq!(err.expected_prefix, "req");
    }

    #[test]
    fn ids_are_distinct() {
        assert_ne!(TabId::new(), TabId::new());
    }
}
