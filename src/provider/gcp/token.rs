use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::GcpCredentials;
use crate::errors::{Error, ErrorKind, Result};
use crate::provider::{map_http_error, Token};

use super::GcpConfig;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Claims of the signed assertion sent to the Google OAuth2 token service.
/// `iat`/`exp` are seconds since the UNIX epoch; the service rejects
/// assertions whose lifetime exceeds one hour.
#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    token_type: String,
}

/// Performs the OAuth2 JWT-bearer grant: sign an RS256 assertion with the
/// service-account key and exchange it at the key's `token_uri`.
pub(super) async fn exchange(
    http: &reqwest::Client,
    creds: &GcpCredentials,
    config: &GcpConfig,
) -> Result<Token> {
    let assertion = sign_assertion(creds, config)?;

    let response = http
        .post(&creds.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|err| {
            map_http_error(err, ErrorKind::TokenGenerationFailed, "OAuth2 token exchange failed")
                .with_field("provider", "gcp")
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::new(
            ErrorKind::TokenGenerationFailed,
            format!("OAuth2 token endpoint returned {status}: {body}"),
        )
        .with_field("provider", "gcp"));
    }

    let parsed: TokenResponse = response.json().await.map_err(|err| {
        Error::wrap(ErrorKind::TokenMalformed, err, "failed to parse OAuth2 token response")
            .with_field("provider", "gcp")
    })?;

    if parsed.access_token.is_empty() {
        return Err(Error::new(ErrorKind::TokenInvalid, "OAuth2 response carried an empty token")
            .with_field("provider", "gcp"));
    }

    debug!(expires_in = parsed.expires_in, "OAuth2 access token obtained");

    Ok(Token {
        access_token: parsed.access_token,
        expires_at: Utc::now() + Duration::seconds(parsed.expires_in),
        token_type: if parsed.token_type.is_empty() {
            "Bearer".to_owned()
        } else {
            parsed.token_type
        },
    })
}

fn sign_assertion(creds: &GcpCredentials, config: &GcpConfig) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(creds.private_key_id.clone());

    let lifetime = config.token_duration.min(Duration::hours(1));
    let now = Utc::now().timestamp();
    let claims = Claims {
        iss: &creds.client_email,
        scope: config.scopes.join(" "),
        aud: &creds.token_uri,
        iat: now,
        exp: now + lifetime.num_seconds(),
    };

    let key = EncodingKey::from_rsa_pem(creds.private_key.as_bytes()).map_err(|err| {
        Error::wrap(ErrorKind::CredentialMalformed, err, "failed to parse service-account RSA key")
            .with_field("provider", "gcp")
    })?;

    jsonwebtoken::encode(&header, &claims, &key).map_err(|err| {
        Error::wrap(ErrorKind::TokenGenerationFailed, err, "failed to sign JWT assertion")
            .with_field("provider", "gcp")
    })
}
