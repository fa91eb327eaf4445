//! Google service-account authentication.
//!
//! Implements the OAuth 2.0 JWT bearer flow: a short-lived RS256 assertion
//! signed with the service account's private key is exchanged at the key's
//! `token_uri` for a bearer access token. Tokens are cached and refreshed a
//! minute before they expire.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::{ConfigError, ConfigResult, SheetsError, SheetsResult};

/// Environment variable holding the service-account JSON blob
pub const CREDENTIALS_ENV: &str = "GOOGLE_CREDENTIALS_JSON";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a Google service-account key file this crate uses
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("key_type", &self.key_type)
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON representation
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let key: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::CredentialInvalid {
                name: CREDENTIALS_ENV,
                reason: format!("not a service-account key: {}", e),
            })?;

        if let Some(key_type) = key.key_type.as_deref() {
            if key_type != "service_account" {
                return Err(ConfigError::CredentialInvalid {
                    name: CREDENTIALS_ENV,
                    reason: format!("expected type service_account, got {}", key_type),
                });
            }
        }

        if key.client_email.trim().is_empty() {
            return Err(ConfigError::CredentialInvalid {
                name: CREDENTIALS_ENV,
                reason: "client_email is empty".to_string(),
            });
        }

        Ok(key)
    }
}

/// Claims of the signed assertion sent to the token endpoint
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Issues and caches access tokens for a service account
pub struct ServiceAccountAuth {
    http: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

impl fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.key.client_email)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountAuth {
    /// Validate the private key and prepare to request tokens for `scopes`
    pub fn new(key: ServiceAccountKey, scopes: &[&str]) -> ConfigResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            ConfigError::CredentialInvalid {
                name: CREDENTIALS_ENV,
                reason: format!("private_key is not a usable RSA key: {}", e),
            }
        })?;

        Ok(Self {
            http: Client::new(),
            key,
            encoding_key,
            scope: scopes.join(" "),
            cached: Mutex::new(None),
        })
    }

    /// Service account the tokens are issued to
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Claims for an assertion issued at `now`
    pub fn claims_at(&self, now: DateTime<Utc>) -> AssertionClaims {
        let iat = now.timestamp();
        AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }

    /// Sign an assertion issued at `now`
    pub fn build_assertion(&self, now: DateTime<Utc>) -> SheetsResult<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        Ok(jsonwebtoken::encode(
            &header,
            &self.claims_at(now),
            &self.encoding_key,
        )?)
    }

    /// Return a valid access token, exchanging a new assertion when needed
    pub async fn access_token(&self) -> SheetsResult<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.token.clone());
        }

        let token = self.fetch_token(now).await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self, now: DateTime<Utc>) -> SheetsResult<AccessToken> {
        let assertion = self.build_assertion(now)?;
        debug!(client_email = %self.key.client_email, "Requesting access token");

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SheetsError::AuthError(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::AuthError(format!(
                "Token endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SheetsError::ParsingError(format!("Failed to parse token: {}", e)))?;

        info!(
            client_email = %self.key.client_email,
            expires_in = body.expires_in,
            "Obtained access token"
        );

        Ok(AccessToken {
            token: body.access_token,
            expires_at: now + Duration::seconds(body.expires_in),
        })
    }
}
