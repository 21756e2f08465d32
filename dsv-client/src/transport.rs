//! Thin HTTP transport and response status mapping.

use crate::error::{RawResponse, VaultError, VaultResult};
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every DSV request.
pub const USER_AGENT: &str = concat!("dsv-sdk-rust/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used for token exchanges and secret reads.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .use_rustls_tls()
        .build()
}

/// Issues DSV requests and captures their responses.
#[derive(Debug, Clone)]
pub struct Transport {
    http: Client,
}

impl Transport {
    /// Wrap an HTTP client.
    #[must_use]
    pub const fn new(http: Client) -> Self {
        Self { http }
    }

    /// POST a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the transport error if no response could be read.
    pub async fn post_json<B>(&self, url: &str, body: &B) -> Result<RawResponse, reqwest::Error>
    where
        B: Serialize + ?Sized,
    {
        debug!(url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        RawResponse::read(response).await
    }

    /// GET with the given headers.
    ///
    /// # Errors
    ///
    /// Returns the transport error if no response could be read.
    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<RawResponse, reqwest::Error> {
        debug!(url, "GET");
        let response = self.http.get(url).headers(headers).send().await?;
        RawResponse::read(response).await
    }
}

impl RawResponse {
    /// Capture status, headers and body of a response.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the body cannot be read.
    pub async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Response received");
        Ok(Self {
            status,
            url,
            headers,
            body,
        })
    }
}

/// Why a response was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rejection {
    /// 4xx with a server-supplied message
    Denied(String),
    /// 4xx whose body carries no readable message
    Unreadable,
    /// Any other non-2xx status
    Status,
}

impl Rejection {
    pub(crate) fn describe(&self, response: &RawResponse) -> String {
        match self {
            Self::Denied(message) => message.clone(),
            Self::Unreadable => format!("unreadable error body (status {})", response.status),
            Self::Status => format!("unexpected status {}", response.status),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Sort a response into accepted (2xx) or one of the rejection kinds.
pub(crate) fn classify(response: &RawResponse) -> Result<(), Rejection> {
    let status = response.status;
    if status.is_success() {
        return Ok(());
    }
    if status.is_client_error() {
        return match serde_json::from_str::<ErrorBody>(&response.body) {
            Ok(body) => Err(Rejection::Denied(body.message)),
            Err(_) => Err(Rejection::Unreadable),
        };
    }
    Err(Rejection::Status)
}

/// Process a secret endpoint response.
///
/// Returns the response unchanged on 2xx. A 4xx becomes
/// [`VaultError::Access`] carrying the body's `message`; everything else, a
/// 4xx without a readable message included, becomes [`VaultError::Failed`].
///
/// # Errors
///
/// Returns an error for any non-2xx status.
pub fn process(response: RawResponse) -> VaultResult<RawResponse> {
    match classify(&response) {
        Ok(()) => Ok(response),
        Err(Rejection::Denied(message)) => Err(VaultError::Access {
            message,
            response: Box::new(response),
        }),
        Err(rejection) => {
            let message = rejection.describe(&response);
            Err(VaultError::failed(message, response))
        }
    }
}

/// Join a base URL and a path with exactly one slash between them.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
