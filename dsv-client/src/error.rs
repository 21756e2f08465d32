//! DSV error types using thiserror 2.0.
//!
//! Failures are split between the identity endpoint ([`AuthError`]) and the
//! secret endpoint ([`VaultError`]). Each error that originates from an HTTP
//! response carries a [`RawResponse`] for diagnostic inspection.

use crate::secret::RecordError;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;

/// A captured HTTP response.
///
/// The body of a `reqwest::Response` can only be read once, so the transport
/// snapshots status, headers and body text before any status handling.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Final request URL
    pub url: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body as text
    pub body: String,
}

impl RawResponse {
    /// Build a response snapshot from a status and body.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            url: String::new(),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Set the request URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Errors raised while obtaining an access token.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The token endpoint rejected the credentials (4xx)
    #[error("Access denied by token endpoint: {message}")]
    Access {
        /// Server-supplied message
        message: String,
        /// Raw server response
        response: Box<RawResponse>,
    },

    /// The token endpoint failed or answered with something unusable
    #[error("Token exchange failed: {message}")]
    Failed {
        /// Short description of the failure
        message: String,
        /// Raw server response, when one was received
        response: Option<Box<RawResponse>>,
    },

    /// The token request never completed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AuthError {
    /// Check if error is retryable.
    ///
    /// A rejection needs new credentials; everything else may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Access { .. })
    }

    /// Create an exchange failure carrying the raw response.
    #[must_use]
    pub fn failed(message: impl Into<String>, response: RawResponse) -> Self {
        Self::Failed {
            message: message.into(),
            response: Some(Box::new(response)),
        }
    }

    /// Short error message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Access { message, .. } | Self::Failed { message, .. } => message.clone(),
            Self::Http(e) => e.to_string(),
        }
    }

    /// Raw server response, if any.
    #[must_use]
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Self::Access { response, .. } => Some(response),
            Self::Failed { response, .. } => response.as_deref(),
            Self::Http(_) => None,
        }
    }
}

/// Errors raised by secret operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The secret endpoint refused the request (4xx)
    #[error("Access denied: {message}")]
    Access {
        /// Server-supplied message
        message: String,
        /// Raw server response
        response: Box<RawResponse>,
    },

    /// Server error, malformed body or any other failure
    #[error("Vault request failed: {message}")]
    Failed {
        /// Short description of the failure
        message: String,
        /// Raw server response, when one was received
        response: Option<Box<RawResponse>>,
    },

    /// The secret request never completed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The access token could not be obtained
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The secret payload could not be mapped to a record
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for DSV operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Failed { .. } | Self::Http(_) => true,
            Self::Auth(e) => e.is_retryable(),
            Self::Access { .. } | Self::Record(_) | Self::InvalidConfig(_) => false,
        }
    }

    /// Create a failure carrying the raw response.
    #[must_use]
    pub fn failed(message: impl Into<String>, response: RawResponse) -> Self {
        Self::Failed {
            message: message.into(),
            response: Some(Box::new(response)),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Short error message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Access { message, .. } | Self::Failed { message, .. } => message.clone(),
            Self::Auth(e) => e.message(),
            other => other.to_string(),
        }
    }

    /// Raw server response, if any.
    #[must_use]
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Self::Access { response, .. } => Some(response),
            Self::Failed { response, .. } => response.as_deref(),
            Self::Auth(e) => e.response(),
            Self::Http(_) | Self::Record(_) | Self::InvalidConfig(_) => None,
        }
    }
}
