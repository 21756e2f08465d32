//! Fetch one secret and print its credentials.
//!
//! Configuration comes from the environment (or `.env`), see
//! [`VaultConfig::from_env`]. The secret path is the first argument and
//! defaults to `/test/secret`.
//!
//! ```text
//! DSV_TENANT=acme DSV_CLIENT_ID=... DSV_CLIENT_SECRET=... \
//!     cargo run --example get_secret -- /test/secret
//! ```

use dsv_client::{VaultClient, VaultConfig, VaultError};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dsv_client=debug")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/test/secret".to_string());

    let config = VaultConfig::from_env()?;
    let vault = VaultClient::from_config(&config)?;

    match vault.get_secret_record(&path).await {
        Ok(secret) => {
            let field = |name: &str| {
                secret
                    .data
                    .get(name)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            println!("username: {}\npassword: {}", field("username"), field("password"));
        }
        Err(e @ (VaultError::Access { .. } | VaultError::Auth(_))) => {
            eprintln!("{}", e.message());
        }
        Err(e) => {
            match e.response() {
                Some(response) => eprintln!("{} {}", response.status, response.body),
                None => eprintln!("{e}"),
            }
            return Err(e.into());
        }
    }

    Ok(())
}
