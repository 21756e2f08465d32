//! DevOps Secrets Vault (DSV) client.
//!
//! Retrieves secrets from DSV using bearer token authentication. Tokens come
//! from a [`GrantAuthorizer`]: either a pre-issued token
//! ([`AccessTokenAuthorizer`]) or a client-credentials exchange
//! ([`ClientCredentialsAuthorizer`]) that refreshes the token shortly before
//! it expires.
//!
//! ```no_run
//! use dsv_client::{ClientCredentialsAuthorizer, VaultClient};
//!
//! # async fn run() -> Result<(), dsv_client::VaultError> {
//! let base_url = "https://tenant.secretsvaultcloud.com";
//! let authorizer = ClientCredentialsAuthorizer::new(base_url, "client-id", "client-secret")?;
//! let vault = VaultClient::new(base_url, authorizer)?;
//!
//! let secret = vault.get_secret_record("/path/to/secret").await?;
//! println!("{}", secret.data["username"]);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod secret;
pub mod token;
pub mod transport;

pub use auth::{AccessTokenAuthorizer, ClientCredentialsAuthorizer, GrantAuthorizer};
pub use client::VaultClient;
pub use config::{Credentials, VaultConfig};
pub use error::{AuthError, RawResponse, VaultError, VaultResult};
pub use secret::{RecordError, SecretRecord, map_to_secret_record, to_snake_case};
pub use token::{GrantState, GrantToken};
pub use transport::process;
