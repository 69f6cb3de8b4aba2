//! Browser identities attached to outgoing requests
//!
//! The HTTP client carries no default user agent. Every request gets the header
//! set of the current identity, which the fetcher swaps for a different one
//! at a fixed request cadence and after each periodic break.

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

/// Desktop browser user agents to rotate through
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
];

// Accept-Encoding is left to reqwest; setting it by hand turns off decompression.
const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9,ar;q=0.8"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("cache-control", "max-age=0"),
];

/// A user agent plus the header set a browser using it would send
#[derive(Debug, Clone)]
pub struct BrowserIdentity {
    user_agent: &'static str,
    headers: HeaderMap,
}

impl BrowserIdentity {
    pub fn new(user_agent: &'static str) -> Self {
        let mut headers = HeaderMap::with_capacity(BROWSER_HEADERS.len() + 1);
        headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
        for &(name, value) in BROWSER_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }

        Self {
            user_agent,
            headers,
        }
    }

    /// Draws an identity uniformly from [`USER_AGENTS`]
    pub fn random() -> Self {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        Self::new(user_agent)
    }

    /// Draws an identity whose user agent differs from this one
    pub fn rotated(&self) -> Self {
        let user_agent = USER_AGENTS
            .iter()
            .copied()
            .filter(|&ua| ua != self.user_agent)
            .collect::<Vec<_>>()
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(self.user_agent);
        Self::new(user_agent)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL};

    #[test]
    fn test_identity_carries_browser_headers() {
        let identity = BrowserIdentity::new(USER_AGENTS[2]);
        let headers = identity.headers();

        for name in [USER_AGENT, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL] {
            assert!(headers.contains_key(&name), "missing {}", name);
        }
        assert_eq!(headers.get(USER_AGENT).unwrap(), USER_AGENTS[2]);
        assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
        assert!(!headers.contains_key(ACCEPT_ENCODING));
    }

    #[test]
    fn test_random_identity_comes_from_pool() {
        for _ in 0..20 {
            let identity = BrowserIdentity::random();
            assert!(USER_AGENTS.contains(&identity.user_agent()));
        }
    }

    #[test]
    fn test_rotation_always_changes_user_agent() {
        let mut identity = BrowserIdentity::new(USER_AGENTS[0]);
        for _ in 0..50 {
            let next = identity.rotated();
            assert_ne!(next.user_agent(), identity.user_agent());
            assert!(USER_AGENTS.contains(&next.user_agent()));
            identity = next;
        }
    }

    #[test]
    fn test_pool_is_not_trivial() {
        assert_eq!(USER_AGENTS.len(), 7);
    }
}
