//! Service-account credentials and OAuth2 access tokens.
//!
//! Google service accounts authenticate with the JWT-bearer grant: sign a
//! short-lived RS256 assertion with the account's private key, post it to
//! the token endpoint, and receive a bearer token for the requested scope.
//! A token is fetched for every remote call; nothing is cached between
//! calls.

use crate::error::FormStampError;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Default OAuth2 token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime in seconds (Google's maximum).
const ASSERTION_TTL_SECS: i64 = 3600;

/// The fields of a service-account key file this crate needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a key-file JSON blob.
    pub fn from_json(json: &str) -> Result<Self, FormStampError> {
        let key: Self = serde_json::from_str(json).map_err(|e| FormStampError::InvalidCredentials {
            detail: e.to_string(),
        })?;
        if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
            return Err(FormStampError::InvalidCredentials {
                detail: "client_email and private_key must not be empty".into(),
            });
        }
        Ok(key)
    }

    /// Read the key-file JSON from environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, FormStampError> {
        match std::env::var(var) {
            Ok(json) if !json.trim().is_empty() => Self::from_json(&json),
            _ => Err(FormStampError::MissingCredentials {
                var: var.to_string(),
            }),
        }
    }

    /// Sign the JWT-bearer assertion for `scope`.
    pub fn assertion(&self, scope: &str) -> Result<String, FormStampError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_TTL_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
            FormStampError::InvalidCredentials {
                detail: format!("private_key is not an RSA PEM key: {e}"),
            }
        })?;
        jsonwebtoken::encode(&header, &claims, &key).map_err(|e| FormStampError::InvalidCredentials {
            detail: format!("failed to sign assertion: {e}"),
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Source of bearer tokens for Drive calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self, scope: &str) -> Result<String, FormStampError>;
}

/// Exchanges a signed service-account assertion for an access token.
pub struct ServiceAccountTokens {
    key: ServiceAccountKey,
    http: reqwest::Client,
}

impl ServiceAccountTokens {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self { key, http }
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokens {
    async fn access_token(&self, scope: &str) -> Result<String, FormStampError> {
        let assertion = self.key.assertion(scope)?;
        debug!("Requesting token for {} ({})", self.key.client_email, scope);

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| FormStampError::AuthFailed {
                detail: format!("token request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FormStampError::AuthFailed {
                detail: format!("token endpoint returned HTTP {status}: {}", body.trim()),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| FormStampError::AuthFailed {
            detail: format!("malformed token response: {e}"),
        })?;
        Ok(token.access_token)
    }
}

/// A fixed bearer token, for pre-authorised environments and tests.
#[derive(Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self, _scope: &str) -> Result<String, FormStampError> {
        Ok(self.0.clone())
    }
}
