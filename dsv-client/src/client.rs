//! DSV secrets client.

use crate::{
    auth::{AccessTokenAuthorizer, ClientCredentialsAuthorizer, GrantAuthorizer},
    config::{Credentials, VaultConfig},
    error::{RawResponse, VaultError, VaultResult},
    secret::{DEFAULT_DATETIME_FORMAT, SecretRecord, map_to_secret_record},
    transport::{DEFAULT_TIMEOUT, Transport, http_client, join_url, process},
};
use reqwest::Client;
use reqwest::header::HeaderMap;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

const SECRET_PATH_URI: &str = "secrets";

/// Client for the DSV secret endpoint.
///
/// Every call asks the authorizer for a bearer header (which may trigger a
/// token exchange) and then issues one GET for the secret.
pub struct VaultClient {
    transport: Transport,
    authorizer: Arc<dyn GrantAuthorizer>,
    api_url: String,
    secret_url: String,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("api_url", &self.api_url)
            .field("secret_url", &self.secret_url)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    /// Create a client for the DSV instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, authorizer: impl GrantAuthorizer + 'static) -> VaultResult<Self> {
        let http = http_client(DEFAULT_TIMEOUT)?;
        Ok(Self::with_http_client(base_url, authorizer, http))
    }

    /// Create a client that sends its requests through `http`.
    #[must_use]
    pub fn with_http_client(
        base_url: &str,
        authorizer: impl GrantAuthorizer + 'static,
        http: Client,
    ) -> Self {
        Self::from_parts(base_url, Arc::new(authorizer), http)
    }

    /// Create a client, and its authorizer, from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &VaultConfig) -> VaultResult<Self> {
        config.validate()?;
        let http = http_client(config.timeout)?;

        let authorizer: Arc<dyn GrantAuthorizer> = match &config.credentials {
            Credentials::AccessToken(token) => {
                Arc::new(AccessTokenAuthorizer::new(token.expose_secret()))
            }
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => Arc::new(
                ClientCredentialsAuthorizer::with_http_client(
                    &config.base_url,
                    client_id,
                    client_secret.expose_secret(),
                    http.clone(),
                )
                .with_token_path(&config.token_path)
                .with_drift_window(config.drift_window),
            ),
        };

        Ok(Self::from_parts(&config.base_url, authorizer, http))
    }

    fn from_parts(base_url: &str, authorizer: Arc<dyn GrantAuthorizer>, http: Client) -> Self {
        let api_url = format!("{}/v1", base_url.trim_end_matches('/'));
        let secret_url = join_url(&api_url, SECRET_PATH_URI);
        debug!(%api_url, "Created DSV client");
        Self {
            transport: Transport::new(http),
            authorizer,
            api_url,
            secret_url,
        }
    }

    /// The API root, `{base_url}/v1`.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// The secret endpoint root, `{base_url}/v1/secrets`.
    #[must_use]
    pub fn secret_url(&self) -> &str {
        &self.secret_url
    }

    /// The authorizer used for every request.
    #[must_use]
    pub fn authorizer(&self) -> &dyn GrantAuthorizer {
        self.authorizer.as_ref()
    }

    /// URL of the secret at `secret_path`; a leading slash is optional.
    #[must_use]
    pub fn secret_url_for(&self, secret_path: &str) -> String {
        join_url(&self.secret_url, secret_path)
    }

    /// Get a secret as the raw JSON text returned by the server.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Access`] when the server refuses the request,
    /// [`VaultError::Auth`] when no token could be obtained, and
    /// [`VaultError::Failed`] or [`VaultError::Http`] for anything else.
    #[instrument(skip(self))]
    pub async fn get_secret_json(&self, secret_path: &str) -> VaultResult<String> {
        Ok(self.fetch(secret_path).await?.body)
    }

    /// Get a secret as a JSON object.
    ///
    /// # Errors
    ///
    /// As [`Self::get_secret_json`]; a body that is not a JSON object is a
    /// [`VaultError::Failed`] carrying the raw response.
    #[instrument(skip(self))]
    pub async fn get_secret(&self, secret_path: &str) -> VaultResult<Map<String, Value>> {
        let response = self.fetch(secret_path).await?;
        match serde_json::from_str::<Map<String, Value>>(&response.body) {
            Ok(secret) => Ok(secret),
            Err(e) => Err(VaultError::failed(
                format!("malformed secret payload: {e}"),
                response,
            )),
        }
    }

    /// Get a secret as a typed [`SecretRecord`].
    ///
    /// # Errors
    ///
    /// As [`Self::get_secret`], plus [`VaultError::Record`] when the payload
    /// does not describe a secret.
    #[instrument(skip(self))]
    pub async fn get_secret_record(&self, secret_path: &str) -> VaultResult<SecretRecord> {
        let secret = self.get_secret(secret_path).await?;
        Ok(map_to_secret_record(&secret, DEFAULT_DATETIME_FORMAT)?)
    }

    async fn fetch(&self, secret_path: &str) -> VaultResult<RawResponse> {
        let url = self.secret_url_for(secret_path);
        let headers = self.authorizer.headers(HeaderMap::new()).await?;
        let response = self.transport.get(&url, headers).await?;
        process(response)
    }
}
