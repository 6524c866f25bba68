use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::credentials::AzureCredentials;
use crate::errors::{Error, ErrorKind, Result};
use crate::provider::{map_http_error, Token};

pub(super) const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Audience requested for AKS access; management-plane tokens authenticate
/// against the cluster's AAD integration.
pub(super) const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: String,
}

/// OAuth2 client-credentials grant against the tenant's Azure AD token
/// endpoint. When the response omits `expires_in`, `fallback_duration`
/// bounds the token's lifetime.
pub(super) async fn exchange(
    http: &reqwest::Client,
    authority: &str,
    creds: &AzureCredentials,
    tenant_id: &str,
    fallback_duration: Duration,
) -> Result<Token> {
    let url = format!("{authority}/{tenant_id}/oauth2/v2.0/token");

    let response = http
        .post(&url)
        .form(&[
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("scope", MANAGEMENT_SCOPE),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await
        .map_err(|err| {
            map_http_error(err, ErrorKind::TokenGenerationFailed, "Azure AD token request failed")
                .with_field("provider", "azure")
                .with_field("tenant_id", tenant_id)
        })?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::BAD_REQUEST {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::new(
            ErrorKind::Unauthenticated,
            format!("Azure AD rejected the client credentials: {status}: {body}"),
        )
        .with_field("provider", "azure")
        .with_field("tenant_id", tenant_id));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::new(
            ErrorKind::TokenGenerationFailed,
            format!("Azure AD token endpoint returned {status}: {body}"),
        )
        .with_field("provider", "azure"));
    }

    let parsed: TokenResponse = response.json().await.map_err(|err| {
        Error::wrap(ErrorKind::TokenMalformed, err, "failed to parse Azure AD token response")
            .with_field("provider", "azure")
    })?;

    if parsed.access_token.is_empty() {
        return Err(Error::new(ErrorKind::TokenInvalid, "Azure AD response carried an empty token")
            .with_field("provider", "azure"));
    }

    debug!(expires_in = parsed.expires_in, "Azure AD access token obtained");

    let lifetime = parsed.expires_in.map(Duration::seconds).unwrap_or(fallback_duration);

    Ok(Token {
        access_token: parsed.access_token,
        expires_at: Utc::now() + lifetime,
        token_type: if parsed.token_type.is_empty() {
            "Bearer".to_owned()
        } else {
            parsed.token_type
        },
    })
}
