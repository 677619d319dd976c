//! Endpoints that may be called without a token.

/// Endpoint substrings that are public by default.
pub const DEFAULT_PUBLIC_PATHS: [&str; 4] =
    ["login/", "public/", "get-usd-inr-rate/", "finance/quote"];

/// Substring allowlist of public endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicAllowlist {
    patterns: Vec<String>,
}

impl PublicAllowlist {
    /// Creates an allowlist from endpoint substrings. Empty patterns are
    /// dropped, since they would match everything.
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Returns true if `endpoint` contains any allowlisted substring.
    #[must_use]
    pub fn is_public(&self, endpoint: &str) -> bool {
        self.patterns.iter().any(|p| endpoint.contains(p.as_str()))
    }
}

impl Default for PublicAllowlist {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_PATHS)
    }
}

/// Returns true for absolute `http`/`https` URLs, which point outside the
/// backend and never need a token.
#[must_use]
pub fn is_absolute_url(endpoint: &str) -> bool {
    let lower = endpoint.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allowlist_matches_public_paths() {
        let allowlist = PublicAllowlist::default();
        assert!(allowlist.is_public("login/"));
        assert!(allowlist.is_public("/api/login/"));
        assert!(allowlist.is_public("public/market-hours/"));
        assert!(allowlist.is_public("get-usd-inr-rate/"));
        assert!(allowlist.is_public("finance/quote?symbol=EURUSD"));
    }

    #[test]
    fn protected_paths_are_not_public() {
        let allowlist = PublicAllowlist::default();
        assert!(!allowlist.is_public("accounts/"));
        assert!(!allowlist.is_public("user/transactions/"));
        assert!(!allowlist.is_public("login"));
    }

    #[test]
    fn empty_patterns_are_ignored() {
        let allowlist = PublicAllowlist::new(["", "status/"]);
        assert!(!allowlist.is_public("accounts/"));
        assert!(allowlist.is_public("status/"));
    }

    #[test]
    fn absolute_urls() {
        assert!(is_absolute_url("https://query1.finance.example.com/v8/chart"));
        assert!(is_absolute_url("HTTP://example.com"));
        assert!(!is_absolute_url("/accounts/"));
        assert!(!is_absolute_url("httpbin/"));
    }
}
