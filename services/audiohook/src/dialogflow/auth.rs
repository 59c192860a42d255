//! Ambient Google Cloud credentials.
//!
//! On GCE / Cloud Run the instance metadata server hands out access tokens
//! for the attached service account; tokens are cached until shortly before
//! expiry.  `GCP_ACCESS_TOKEN` overrides the metadata server for local runs.

use super::AiError;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the reported expiry.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct TokenSource {
    http: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
    override_token: Option<String>,
}

impl TokenSource {
    pub fn from_env() -> Self {
        TokenSource {
            http: reqwest::Client::new(),
            cached: RwLock::new(None),
            override_token: std::env::var("GCP_ACCESS_TOKEN").ok(),
        }
    }

    /// A bearer token valid for at least [`EXPIRY_SKEW`].
    pub async fn token(&self) -> Result<String, AiError> {
        if let Some(token) = &self.override_token {
            return Ok(token.clone());
        }

        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.expires_at > Instant::now() {
                    return Ok(entry.token.clone());
                }
            }
        }

        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AiError::Transport(format!("metadata server: {e}")))?
            .error_for_status()
            .map_err(|e| AiError::Transport(format!("metadata server: {e}")))?;
        let body: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| AiError::Transport(format!("metadata token decode: {e}")))?;

        let expires_at = Instant::now()
            + Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_SKEW);
        let token = body.access_token.clone();
        *self.cached.write().await = Some(CachedToken {
            token: body.access_token,
            expires_at,
        });
        Ok(token)
    }
}
