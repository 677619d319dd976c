//! Cookie lookup for the CSRF token.

/// Reads cookies visible to requests against the backend.
pub trait CookieSource: Send + Sync {
    /// Returns the value of cookie `name`, if set.
    fn cookie(&self, name: &str) -> Option<String>;
}

/// A source that never has cookies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCookies;

impl CookieSource for NoCookies {
    fn cookie(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Finds `name` in a `Cookie` header or `document.cookie` string
/// (`a=1; b=2`). Empty values count as absent.
#[must_use]
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_cookie_among_others() {
        let header = "sessionid=xyz; csrftoken=abc123; theme=dark";
        assert_eq!(find_cookie(header, "csrftoken").as_deref(), Some("abc123"));
        assert_eq!(find_cookie(header, "theme").as_deref(), Some("dark"));
    }

    #[test]
    fn missing_or_empty_cookie_is_none() {
        assert!(find_cookie("sessionid=xyz", "csrftoken").is_none());
        assert!(find_cookie("csrftoken=", "csrftoken").is_none());
        assert!(find_cookie("", "csrftoken").is_none());
    }

    #[test]
    fn name_must_match_exactly() {
        assert!(find_cookie("xcsrftoken=1", "csrftoken").is_none());
    }

    #[test]
    fn quoted_values_are_unquoted() {
        assert_eq!(find_cookie("csrftoken=\"q\"", "csrftoken").as_deref(), Some("q"));
    }
}
