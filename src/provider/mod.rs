pub mod aws;
pub mod azure;
pub mod gcp;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::errors::{Error, ErrorKind, Result};

/// A short-lived bearer credential for a managed cluster.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_at - Utc::now()
    }
}

/// Parameters for a single token mint. Cluster name is always required; the
/// rest are cloud-specific selectors.
#[derive(Debug, Clone, Default)]
pub struct TokenOptions {
    pub cluster_name: String,
    pub region: Option<String>,
    pub project_id: Option<String>,
    pub account_id: Option<String>,
    pub subscription_id: Option<String>,
    pub tenant_id: Option<String>,
    pub resource_group: Option<String>,
}

/// One implementation per cloud platform. Instances are invocation-scoped:
/// the dispatcher builds one, uses it once and drops it.
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    async fn mint_token(&self, opts: &TokenOptions) -> Result<Token>;

    async fn validate_credentials(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderName {
    Gcp,
    Aws,
    Azure,
}

impl ProviderName {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderName::Gcp => "gcp",
            ProviderName::Aws => "aws",
            ProviderName::Azure => "azure",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gcp" => Ok(ProviderName::Gcp),
            "aws" => Ok(ProviderName::Aws),
            "azure" => Ok(ProviderName::Azure),
            other => Err(Error::new(
                ErrorKind::ProviderNotSupported,
                format!("unsupported provider: {other} (must be one of: gcp, aws, azure)"),
            )
            .with_field("provider", other)),
        }
    }
}

/// Classifies a transport-level failure. Timeouts and refused connections
/// keep their retryable kinds; anything else falls back to `fallback`.
pub(crate) fn map_http_error(
    err: reqwest::Error,
    fallback: ErrorKind,
    detail: impl Into<String>,
) -> Error {
    let kind = if err.is_timeout() {
        ErrorKind::NetworkTimeout
    } else if err.is_connect() {
        ErrorKind::NetworkUnreachable
    } else {
        fallback
    };
    Error::wrap(kind, err, detail)
}

/// Checks a freshly minted token before it is handed to the encoder. A token
/// already past expiry or with an empty access string never leaves the
/// process; one under `warn_threshold` is returned with a warning.
pub fn validate_token(token: &Token, provider: &str, warn_threshold: Duration) -> Result<()> {
    if token.access_token.is_empty() {
        return Err(Error::new(ErrorKind::TokenInvalid, "access token is empty")
            .with_field("provider", provider));
    }

    if token.is_expired() {
        return Err(Error::new(ErrorKind::TokenExpired, "token has expired")
            .with_field("provider", provider)
            .with_field("expires_at", token.expires_at.to_rfc3339()));
    }

    if token.expires_in() < warn_threshold {
        warn!(
            provider,
            expires_in_seconds = token.expires_in().num_seconds(),
            "token expires soon"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: DateTime<Utc>) -> Token {
        Token {
            access_token: "opaque".to_owned(),
            expires_at,
            token_type: "Bearer".to_owned(),
        }
    }

    #[test]
    fn provider_name_round_trip() {
        for name in ["gcp", "aws", "azure"] {
            assert_eq!(ProviderName::from_str(name).unwrap().as_str(), name);
        }
        let err = ProviderName::from_str("oracle").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderNotSupported);
        assert!(err.to_string().contains("unsupported provider"));
    }

    #[test]
    fn expired_token_never_validates() {
        let t = token(Utc::now() - Duration::seconds(1));
        let err = validate_token(&t, "gcp", Duration::minutes(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenExpired);
    }

    #[test]
    fn empty_access_token_never_validates() {
        let mut t = token(Utc::now() + Duration::hours(1));
        t.access_token.clear();
        let err = validate_token(&t, "aws", Duration::minutes(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenInvalid);
    }

    #[test]
    fn near_expiry_token_still_returned() {
        let t = token(Utc::now() + Duration::seconds(90));
        assert!(validate_token(&t, "gcp", Duration::minutes(5)).is_ok());
    }
}
