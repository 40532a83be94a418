use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CollaboratorError;

const SERVICE: &str = "google oauth";

/// Fields of a service-account JSON key that the token exchange needs.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct TokenCache {
    access_token: String,
    expires_at: Instant,
}

/// Exchanges a signed JWT for an OAuth access token and caches it until
/// shortly before expiry. Shared by the Sheets and Drive clients.
#[derive(Clone)]
pub struct ServiceAccountAuth {
    key: Arc<ServiceAccountKey>,
    scopes: Vec<String>,
    client: reqwest::Client,
    token_cache: Arc<Mutex<Option<TokenCache>>>,
}

impl ServiceAccountAuth {
    pub async fn from_file(path: &Path, scopes: Vec<String>) -> Result<Self, CollaboratorError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|err| {
            CollaboratorError::Config(format!(
                "failed to read Google credentials {}: {}",
                path.display(),
                err
            ))
        })?;
        Self::from_json(&content, scopes)
    }

    pub fn from_json(json: &str, scopes: Vec<String>) -> Result<Self, CollaboratorError> {
        let key: ServiceAccountKey = serde_json::from_str(json).map_err(|err| {
            CollaboratorError::Config(format!("invalid Google service account key: {}", err))
        })?;
        Ok(Self {
            key: Arc::new(key),
            scopes,
            client: reqwest::Client::new(),
            token_cache: Arc::new(Mutex::new(None)),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub async fn access_token(&self) -> Result<String, CollaboratorError> {
        let now = Instant::now();
        {
            let guard = self.token_cache.lock().await;
            if let Some(cache) = guard.as_ref() {
                if now < cache.expires_at {
                    return Ok(cache.access_token.clone());
                }
            }
        }

        let token = self.fetch_token().await?;
        let mut guard = self.token_cache.lock().await;
        *guard = Some(token.clone());
        Ok(token.access_token)
    }

    async fn fetch_token(&self) -> Result<TokenCache, CollaboratorError> {
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or(0);
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: &self.key.token_uri,
            iat: issued_at,
            exp: issued_at + 3600,
        };

        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|err| CollaboratorError::Config(format!("invalid service account private key: {}", err)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|err| CollaboratorError::Config(format!("failed to sign token request: {}", err)))?;

        debug!(client_email = %self.key.client_email, "requesting Google access token");
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::upstream(SERVICE, status.as_u16(), &body));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| CollaboratorError::parse(SERVICE, err))?;

        let expires_in = body.expires_in.unwrap_or(3600);
        Ok(TokenCache {
            access_token: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(expires_in.saturating_sub(60)),
        })
    }
}
