//! Bearer token authorizers.
//!
//! A [`GrantAuthorizer`] hands out a valid access token on demand and builds
//! the `Authorization` header from it. [`AccessTokenAuthorizer`] wraps a
//! pre-issued token; [`ClientCredentialsAuthorizer`] exchanges a client id
//! and secret for a token at the identity endpoint and refreshes it before it
//! expires.

use crate::error::{AuthError, RawResponse};
use crate::token::{DEFAULT_DRIFT_WINDOW, GrantState, GrantToken, TokenResponse};
use crate::transport::{DEFAULT_TIMEOUT, Rejection, Transport, classify, http_client, join_url};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Default path of the token endpoint, relative to the base URL.
pub const DEFAULT_TOKEN_PATH: &str = "/v1/token";

const GRANT_TYPE: &str = "client_credentials";

/// Produces bearer tokens for DSV requests.
#[async_trait]
pub trait GrantAuthorizer: Send + Sync {
    /// Return a valid access token.
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Return `existing` plus an `Authorization: Bearer <token>` header.
    ///
    /// Other headers are kept; an existing `Authorization` header is replaced.
    async fn headers(&self, existing: HeaderMap) -> Result<HeaderMap, AuthError> {
        let token = self.access_token().await?;
        bearer_headers(existing, &token)
    }
}

fn bearer_headers(mut headers: HeaderMap, token: &str) -> Result<HeaderMap, AuthError> {
    let mut value =
        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| AuthError::Failed {
            message: "access token is not a valid header value".to_string(),
            response: None,
        })?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// Authorizer for a token issued out of band.
#[derive(Debug, Clone)]
pub struct AccessTokenAuthorizer {
    token: SecretString,
}

impl AccessTokenAuthorizer {
    /// Wrap a pre-issued access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl GrantAuthorizer for AccessTokenAuthorizer {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.expose_secret().to_owned())
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

/// Authorizer that exchanges client credentials for an access token.
///
/// The grant is fetched lazily on first use and replaced once it is within
/// the drift window of its declared expiry. The check and the exchange run
/// under one lock, so concurrent callers share a single in-flight exchange.
#[derive(Debug)]
pub struct ClientCredentialsAuthorizer {
    transport: Transport,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    drift_window: Duration,
    grant: Mutex<GrantState>,
}

impl ClientCredentialsAuthorizer {
    /// Create an authorizer for the DSV instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let http = http_client(DEFAULT_TIMEOUT)?;
        Ok(Self::with_http_client(base_url, client_id, client_secret, http))
    }

    /// Create an authorizer that sends its requests through `http`.
    #[must_use]
    pub fn with_http_client(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        http: Client,
    ) -> Self {
        let base_url = base_url.into();
        let token_url = join_url(&base_url, DEFAULT_TOKEN_PATH);
        Self {
            transport: Transport::new(http),
            base_url,
            token_url,
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            drift_window: DEFAULT_DRIFT_WINDOW,
            grant: Mutex::new(GrantState::Unissued),
        }
    }

    /// Override the token endpoint path.
    #[must_use]
    pub fn with_token_path(mut self, token_path: &str) -> Self {
        self.token_url = join_url(&self.base_url, token_path);
        self
    }

    /// Set how long before expiry the grant is refreshed.
    #[must_use]
    pub const fn with_drift_window(mut self, drift_window: Duration) -> Self {
        self.drift_window = drift_window;
        self
    }

    /// The token endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// The client id used for the exchange.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The configured drift window.
    #[must_use]
    pub const fn drift_window(&self) -> Duration {
        self.drift_window
    }

    /// Refresh the grant if it is missing or about to expire, then return
    /// the current token.
    async fn ensure_fresh(&self) -> Result<String, AuthError> {
        let mut grant = self.grant.lock().await;

        if let GrantState::Issued(token) = &*grant {
            if !token.expires_within(Instant::now(), self.drift_window) {
                debug!("Reusing access grant");
                return Ok(token.access_token().to_owned());
            }
        }

        let token = self.exchange().await?;
        info!(
            expires_in_secs = token.expires_in().as_secs(),
            "Access grant refreshed"
        );
        let access_token = token.access_token().to_owned();
        *grant = GrantState::Issued(token);
        Ok(access_token)
    }

    #[instrument(skip(self), fields(client_id = %self.client_id, token_url = %self.token_url))]
    async fn exchange(&self) -> Result<GrantToken, AuthError> {
        let request = TokenRequest {
            client_id: &self.client_id,
            client_secret: self.client_secret.expose_secret(),
            grant_type: GRANT_TYPE,
        };

        let response = self.transport.post_json(&self.token_url, &request).await?;
        let issued_at = Instant::now();

        match classify(&response) {
            Ok(()) => parse_grant(response, issued_at),
            Err(Rejection::Denied(message)) => Err(AuthError::Access {
                message,
                response: Box::new(response),
            }),
            Err(rejection) => {
                let message = rejection.describe(&response);
                Err(AuthError::failed(message, response))
            }
        }
    }
}

fn parse_grant(response: RawResponse, issued_at: Instant) -> Result<GrantToken, AuthError> {
    match serde_json::from_str::<TokenResponse>(&response.body) {
        Ok(parsed) => Ok(GrantToken::from_response(parsed, issued_at)),
        Err(e) => Err(AuthError::failed(
            format!("malformed token response: {e}"),
            response,
        )),
    }
}

#[async_trait]
impl GrantAuthorizer for ClientCredentialsAuthorizer {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.ensure_fresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use reqwest::header::CONTENT_TYPE;

    #[tokio::test]
    async fn test_static_token_headers() {
        let authorizer = AccessTokenAuthorizer::new("T");

        let headers = authorizer.headers(HeaderMap::new()).await.unwrap();

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[AUTHORIZATION], "Bearer T");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[tokio::test]
    async fn test_headers_keep_existing_and_replace_authorization() {
        let authorizer = AccessTokenAuthorizer::new("new");
        let mut existing = HeaderMap::new();
        existing.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        existing.insert(AUTHORIZATION, HeaderValue::from_static("Bearer old"));

        let headers = authorizer.headers(existing).await.unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[AUTHORIZATION], "Bearer new");
    }

    #[tokio::test]
    async fn test_invalid_header_token_is_rejected() {
        let authorizer = AccessTokenAuthorizer::new("line\nbreak");

        let err = authorizer.headers(HeaderMap::new()).await.unwrap_err();

        assert!(matches!(err, AuthError::Failed { response: None, .. }));
    }

    #[test]
    fn test_token_url() {
        let authorizer = ClientCredentialsAuthorizer::with_http_client(
            "https://tenant.secretsvaultcloud.com/",
            "a",
            "b",
            Client::new(),
        );
        assert_eq!(authorizer.token_url(), "https://tenant.secretsvaultcloud.com/v1/token");
        assert_eq!(authorizer.drift_window(), DEFAULT_DRIFT_WINDOW);

        let authorizer = authorizer.with_token_path("oauth/token");
        assert_eq!(authorizer.token_url(), "https://tenant.secretsvaultcloud.com/oauth/token");
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let authorizer = ClientCredentialsAuthorizer::with_http_client(
            "https://x",
            "id",
            "hunter2",
            Client::new(),
        );
        let debug = format!("{authorizer:?}");

        assert!(debug.contains("id"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_parse_grant_rejects_malformed_body() {
        let response = RawResponse::new(StatusCode::OK, "not json");

        let err = parse_grant(response, Instant::now()).unwrap_err();

        assert!(err.message().starts_with("malformed token response"));
        assert_eq!(err.response().map(|r| r.body.as_str()), Some("not json"));
        assert!(err.is_retryable());
    }
}
