//! Bearer-token provider for the GCP REST clients
//!
//! Resolution order: the `GOOGLE_OAUTH_ACCESS_TOKEN` environment variable,
//! then `gcloud auth print-access-token`. Tokens are cached and refreshed
//! before the usual 60-minute expiry.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::debug;

/// Refresh margin well inside the 1h access-token lifetime.
const TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

struct CachedToken {
    value: String,
    fetched_at: Instant,
}

/// Shared access-token source for all REST clients.
pub struct TokenProvider {
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new() -> Self {
        Self {
            cached: RwLock::new(None),
        }
    }

    /// Return a valid access token, fetching or refreshing as needed.
    pub async fn token(&self) -> Result<String> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.fetched_at.elapsed() < TOKEN_TTL {
                return Ok(cached.value.clone());
            }
        }

        let value = Self::fetch().await?;
        let mut guard = self.cached.write().await;
        *guard = Some(CachedToken {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    async fn fetch() -> Result<String> {
        if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            let token = token.trim().to_string();
            if !token.is_empty() {
                debug!("Using access token from GOOGLE_OAUTH_ACCESS_TOKEN");
                return Ok(token);
            }
        }

        debug!("Requesting access token from gcloud");
        let output = Command::new("gcloud")
            .args(["auth", "print-access-token", "--quiet"])
            .output()
            .await
            .context("could not find default credentials: gcloud is not installed or not on PATH")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "could not find default credentials: gcloud exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            bail!("could not find default credentials: gcloud returned an empty token");
        }
        Ok(token)
    }
}

impl Default for TokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests mutate the process environment, so they must not interleave.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_env_token_preferred() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("GOOGLE_OAUTH_ACCESS_TOKEN", "ya29.test-token");
        let provider = TokenProvider::new();
        let token = provider.token().await.unwrap();
        assert_eq!(token, "ya29.test-token");
        std::env::remove_var("GOOGLE_OAUTH_ACCESS_TOKEN");
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("GOOGLE_OAUTH_ACCESS_TOKEN", "ya29.cached");
        let provider = TokenProvider::new();
        let first = provider.token().await.unwrap();
        // Even after the env var disappears the cached value is served.
        std::env::remove_var("GOOGLE_OAUTH_ACCESS_TOKEN");
        let second = provider.token().await.unwrap();
        assert_eq!(first, second);
    }
}
