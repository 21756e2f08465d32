//! DSV client configuration.

use crate::auth::DEFAULT_TOKEN_PATH;
use crate::error::{VaultError, VaultResult};
use crate::token::DEFAULT_DRIFT_WINDOW;
use crate::transport::DEFAULT_TIMEOUT;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::time::Duration;
use url::Url;

/// Default top-level domain of DSV cloud tenants.
pub const DEFAULT_TLD: &str = "com";

/// How the client authenticates.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Exchange a client id and secret for short-lived access tokens
    ClientCredentials {
        /// Client id
        client_id: String,
        /// Client secret
        client_secret: SecretString,
    },
    /// Use a pre-issued access token as is
    AccessToken(SecretString),
}

impl Credentials {
    /// Client credentials for the token exchange.
    #[must_use]
    pub fn client_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self::ClientCredentials {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// A pre-issued access token.
    #[must_use]
    pub fn access_token(token: impl Into<String>) -> Self {
        Self::AccessToken(SecretString::from(token.into()))
    }
}

/// DSV client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Root URL of the DSV instance, without trailing slash
    pub base_url: String,
    /// Authentication method
    pub credentials: Credentials,
    /// Token endpoint path, relative to the base URL
    pub token_path: String,
    /// Safety margin before token expiry at which a refresh is forced
    pub drift_window: Duration,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl VaultConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            drift_window: DEFAULT_DRIFT_WINDOW,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a configuration for a DSV cloud tenant,
    /// i.e. `https://{tenant}.secretsvaultcloud.{tld}`.
    #[must_use]
    pub fn for_tenant(tenant: &str, tld: &str, credentials: Credentials) -> Self {
        Self::new(tenant_url(tenant, tld), credentials)
    }

    /// Set the token endpoint path.
    #[must_use]
    pub fn with_token_path(mut self, token_path: impl Into<String>) -> Self {
        self.token_path = token_path.into();
        self
    }

    /// Set the drift window.
    #[must_use]
    pub const fn with_drift_window(mut self, drift_window: Duration) -> Self {
        self.drift_window = drift_window;
        self
    }

    /// Set the per-request HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from the environment, reading `.env` first.
    ///
    /// Recognized variables: `DSV_BASE_URL` (or `DSV_TENANT` with optional
    /// `DSV_TLD`), `DSV_ACCESS_TOKEN` or `DSV_CLIENT_ID` + `DSV_CLIENT_SECRET`,
    /// `DSV_TOKEN_PATH`, `DSV_DRIFT_WINDOW_SECS`, `DSV_HTTP_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> VaultResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> VaultResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = match (lookup("DSV_BASE_URL"), lookup("DSV_TENANT")) {
            (Some(url), _) => url,
            (None, Some(tenant)) => {
                let tld = lookup("DSV_TLD").unwrap_or_else(|| DEFAULT_TLD.to_string());
                tenant_url(&tenant, &tld)
            }
            (None, None) => {
                return Err(VaultError::invalid_config(
                    "DSV_BASE_URL or DSV_TENANT must be set",
                ));
            }
        };

        let credentials = match (
            lookup("DSV_ACCESS_TOKEN"),
            lookup("DSV_CLIENT_ID"),
            lookup("DSV_CLIENT_SECRET"),
        ) {
            (Some(token), _, _) => Credentials::access_token(token),
            (None, Some(id), Some(secret)) => Credentials::client_credentials(id, secret),
            _ => {
                return Err(VaultError::invalid_config(
                    "DSV_ACCESS_TOKEN or DSV_CLIENT_ID and DSV_CLIENT_SECRET must be set",
                ));
            }
        };

        let mut config = Self::new(base_url, credentials)
            .with_drift_window(Duration::from_secs(parse_var(
                &lookup,
                "DSV_DRIFT_WINDOW_SECS",
                DEFAULT_DRIFT_WINDOW.as_secs(),
            )?));

        if let Some(token_path) = lookup("DSV_TOKEN_PATH") {
            config = config.with_token_path(token_path);
        }

        let timeout = parse_var(&lookup, "DSV_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs())?;
        config.timeout = Duration::from_secs(timeout);

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be used to build a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL or a
    /// credential is empty.
    pub fn validate(&self) -> VaultResult<()> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            VaultError::invalid_config(format!("Invalid base URL {}: {e}", self.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VaultError::invalid_config(format!(
                "Unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        match &self.credentials {
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => {
                if client_id.is_empty() || client_secret.expose_secret().is_empty() {
                    return Err(VaultError::invalid_config(
                        "Client id and client secret must not be empty",
                    ));
                }
            }
            Credentials::AccessToken(token) => {
                if token.expose_secret().is_empty() {
                    return Err(VaultError::invalid_config("Access token must not be empty"));
                }
            }
        }

        Ok(())
    }
}

fn tenant_url(tenant: &str, tld: &str) -> String {
    format!("https://{tenant}.secretsvaultcloud.{}", tld.trim_matches('.'))
}

/// Parse a variable with a default value.
fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> VaultResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val
            .parse()
            .map_err(|e| VaultError::invalid_config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}
