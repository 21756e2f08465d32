//! Access grant state for the client-credentials exchange.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Default safety margin before token expiry at which a refresh is forced.
pub const DEFAULT_DRIFT_WINDOW: Duration = Duration::from_secs(300);

/// Token endpoint success payload.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

/// An access token together with the moment it was issued.
#[derive(Debug, Clone)]
pub struct GrantToken {
    access_token: SecretString,
    expires_in: Duration,
    issued_at: Instant,
}

impl GrantToken {
    /// Create a token issued at `issued_at` and valid for `expires_in`.
    #[must_use]
    pub const fn new(access_token: SecretString, expires_in: Duration, issued_at: Instant) -> Self {
        Self {
            access_token,
            expires_in,
            issued_at,
        }
    }

    pub(crate) fn from_response(response: TokenResponse, issued_at: Instant) -> Self {
        Self::new(
            SecretString::from(response.access_token),
            Duration::from_secs(response.expires_in),
            issued_at,
        )
    }

    /// The bearer token value.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Declared lifetime.
    #[must_use]
    pub const fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// When the token was received.
    #[must_use]
    pub const fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// True once `now` is within `drift` of the declared expiry.
    #[must_use]
    pub fn expires_within(&self, now: Instant, drift: Duration) -> bool {
        // An expiry past the end of the clock never comes.
        let Some(expiry) = self.issued_at.checked_add(self.expires_in) else {
            return false;
        };
        now.checked_add(drift).is_none_or(|deadline| deadline >= expiry)
    }
}

/// Lifecycle of the grant held by one authorizer.
#[derive(Debug, Clone, Default)]
pub enum GrantState {
    /// No exchange has succeeded yet
    #[default]
    Unissued,
    /// A token is held
    Issued(GrantToken),
}

impl GrantState {
    /// Whether an exchange is needed before the token can be used.
    #[must_use]
    pub fn needs_refresh(&self, now: Instant, drift: Duration) -> bool {
        match self {
            Self::Unissued => true,
            Self::Issued(token) => token.expires_within(now, drift),
        }
    }

    /// The held token, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&GrantToken> {
        match self {
            Self::Unissued => None,
            Self::Issued(token) => Some(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: u64, issued_at: Instant) -> GrantToken {
        GrantToken::new(
            SecretString::from("tok123"),
            Duration::from_secs(expires_in),
            issued_at,
        )
    }

    #[test]
    fn test_unissued_needs_refresh() {
        let state = GrantState::default();
        assert!(state.needs_refresh(Instant::now(), DEFAULT_DRIFT_WINDOW));
        assert!(state.token().is_none());
    }

    #[test]
    fn test_fresh_token_is_kept() {
        let issued = Instant::now();
        let state = GrantState::Issued(token(3600, issued));

        assert!(!state.needs_refresh(issued, DEFAULT_DRIFT_WINDOW));
        assert!(!state.needs_refresh(issued + Duration::from_secs(3299), DEFAULT_DRIFT_WINDOW));
    }

    #[test]
    fn test_token_inside_drift_window_is_refreshed() {
        let issued = Instant::now();
        let state = GrantState::Issued(token(3600, issued));

        assert!(state.needs_refresh(issued + Duration::from_secs(3300), DEFAULT_DRIFT_WINDOW));
        assert!(state.needs_refresh(issued + Duration::from_secs(4000), DEFAULT_DRIFT_WINDOW));
    }

    #[test]
    fn test_zero_drift_refreshes_at_expiry() {
        let issued = Instant::now();
        let grant = token(60, issued);

        assert!(!grant.expires_within(issued + Duration::from_secs(59), Duration::ZERO));
        assert!(grant.expires_within(issued + Duration::from_secs(60), Duration::ZERO));
    }

    #[test]
    fn test_huge_lifetime_does_not_overflow() {
        let issued = Instant::now();
        let grant = token(u64::MAX, issued);

        assert!(!grant.expires_within(issued, DEFAULT_DRIFT_WINDOW));
    }

    #[test]
    fn test_token_response_uses_camel_case() {
        let body = r#"{"accessToken":"tok123","expiresIn":3600,"tokenType":"bearer"}"#;
        let response: TokenResponse = serde_json::from_str(body).unwrap();
        let grant = GrantToken::from_response(response, Instant::now());

        assert_eq!(grant.access_token(), "tok123");
        assert_eq!(grant.expires_in(), Duration::from_secs(3600));
    }

    #[test]
    fn test_debug_redacts_token() {
        let grant = token(60, Instant::now());
        assert!(!format!("{grant:?}").contains("tok123"));
    }
}
