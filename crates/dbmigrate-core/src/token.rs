//! Short-lived database auth tokens.
//!
//! [`RdsIamTokenProvider`] produces RDS IAM authentication tokens: a SigV4
//! query-presigned `connect` request for the `rds-db` service, used in place
//! of a password.

use crate::dsn::UNRESERVED;
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbmigrate_config::{EnvSource, ProcessEnv};
use percent_encoding::utf8_percent_encode;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "rds-db";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const EMPTY_PAYLOAD_HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// What a token is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// `host:port` of the database or proxy.
    pub endpoint: String,
    /// AWS region.
    pub region: String,
    /// Database user the token authenticates.
    pub user: String,
}

/// Issues short-lived secrets that stand in for a password.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Build a token for `request`.
    async fn build_auth_token(&self, request: &TokenRequest) -> Result<SecretString>;
}

/// AWS access credentials.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
}

impl AwsCredentials {
    /// Long-term credentials.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key.into()),
            session_token: None,
        }
    }

    /// Attach a session token for temporary credentials.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(SecretString::new(token.into()));
        self
    }

    /// Read `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and optional
    /// `AWS_SESSION_TOKEN` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_env_source(&ProcessEnv)
    }

    /// Like [`from_env`](Self::from_env) against an injected environment.
    pub fn from_env_source(env: &dyn EnvSource) -> Result<Self> {
        let required = |key: &str| {
            env.var(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| MigrateError::credential(format!("{key} is not set")))
        };
        let credentials = Self::new(required("AWS_ACCESS_KEY_ID")?, required("AWS_SECRET_ACCESS_KEY")?);
        Ok(match env.var("AWS_SESSION_TOKEN").filter(|v| !v.is_empty()) {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        })
    }

    /// Access key ID.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }
}

/// Region from `AWS_REGION`, then `AWS_DEFAULT_REGION`.
pub fn region_from_env(env: &dyn EnvSource) -> Option<String> {
    env.var("AWS_REGION")
        .filter(|v| !v.is_empty())
        .or_else(|| env.var("AWS_DEFAULT_REGION").filter(|v| !v.is_empty()))
}

/// Builds RDS IAM auth tokens locally; no network access is needed.
#[derive(Debug, Clone)]
pub struct RdsIamTokenProvider {
    credentials: AwsCredentials,
    expires_in: Duration,
}

impl RdsIamTokenProvider {
    /// Provider signing with `credentials`. Tokens are valid for 15 minutes.
    #[must_use]
    pub fn new(credentials: AwsCredentials) -> Self {
        Self {
            credentials,
            expires_in: Duration::from_secs(900),
        }
    }

    /// Provider using credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        AwsCredentials::from_env().map(Self::new)
    }

    /// Build a token as of `now`.
    pub fn build_token_at(&self, request: &TokenRequest, now: DateTime<Utc>) -> Result<SecretString> {
        if request.region.is_empty() {
            return Err(MigrateError::credential("no AWS region configured"));
        }
        if request.endpoint.is_empty() {
            return Err(MigrateError::credential("no database endpoint configured"));
        }

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let credential_scope = format!("{date_stamp}/{}/{SERVICE}/aws4_request", request.region);

        let mut params = vec![
            ("Action", "connect".to_string()),
            ("DBUser", request.user.clone()),
            ("X-Amz-Algorithm", ALGORITHM.to_string()),
            (
                "X-Amz-Credential",
                format!("{}/{credential_scope}", self.credentials.access_key_id),
            ),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", self.expires_in.as_secs().to_string()),
            ("X-Amz-SignedHeaders", "host".to_string()),
        ];
        if let Some(token) = &self.credentials.session_token {
            params.push(("X-Amz-Security-Token", token.expose_secret().clone()));
        }
        params.sort_by(|a, b| a.0.cmp(b.0));

        let canonical_query = params
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "GET\n/\n{canonical_query}\nhost:{}\n\nhost\n{EMPTY_PAYLOAD_HASH}",
            request.endpoint
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
            hex::encode(sha256_hash(canonical_request.as_bytes()))
        );

        let signing_key = signing_key(
            self.credentials.secret_access_key.expose_secret(),
            &date_stamp,
            &request.region,
            SERVICE,
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        debug!(
            endpoint = %request.endpoint,
            region = %request.region,
            user = %request.user,
            "Built RDS IAM auth token"
        );

        Ok(SecretString::new(format!(
            "{}/?{canonical_query}&X-Amz-Signature={signature}",
            request.endpoint
        )))
    }
}

#[async_trait]
impl TokenProvider for RdsIamTokenProvider {
    async fn build_auth_token(&self, request: &TokenRequest) -> Result<SecretString> {
        self.build_token_at(request, Utc::now())
    }
}

fn uri_encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Result<[u8; 32]> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn sha256_hash(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| MigrateError::credential(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}
