use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, ErrorKind, Result};
use crate::provider::Token;

pub const API_VERSION_V1: &str = "client.authentication.k8s.io/v1";
pub const API_VERSION_V1BETA1: &str = "client.authentication.k8s.io/v1beta1";
pub const KIND: &str = "ExecCredential";

/// The document a Kubernetes client parses from the exec plugin's stdout.
/// This type is the only writer of that stream besides the kubeconfig
/// emitter; everything else in the process logs to stderr.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExecCredential {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub status: Option<ExecCredentialStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecCredentialStatus {
    #[serde(rename = "expirationTimestamp")]
    pub expiration_timestamp: DateTime<Utc>,
    pub token: String,
}

impl ExecCredential {
    pub fn new(token: &Token) -> Self {
        Self {
            api_version: API_VERSION_V1.to_owned(),
            kind: KIND.to_owned(),
            status: Some(ExecCredentialStatus {
                expiration_timestamp: token.expires_at,
                token: token.access_token.clone(),
            }),
        }
    }

    /// Validity checks mirroring what the consuming client enforces:
    /// a known apiVersion (v1 preferred, v1beta1 accepted), the right kind,
    /// a non-empty token and an expiry still in the future.
    pub fn validate(&self) -> Result<()> {
        if self.api_version != API_VERSION_V1 && self.api_version != API_VERSION_V1BETA1 {
            return Err(Error::new(ErrorKind::ExecPluginInvalidOutput, "invalid apiVersion")
                .with_field("api_version", &self.api_version));
        }
        if self.kind != KIND {
            return Err(Error::new(ErrorKind::ExecPluginInvalidOutput, "invalid kind")
                .with_field("kind", &self.kind));
        }
        let status = self.status.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::ExecPluginInvalidOutput, "status is required")
        })?;
        if status.token.is_empty() {
            return Err(Error::new(ErrorKind::ExecPluginInvalidOutput, "status.token is empty"));
        }
        if status.expiration_timestamp <= Utc::now() {
            return Err(Error::new(
                ErrorKind::ExecPluginInvalidOutput,
                "expirationTimestamp is already in the past",
            )
            .with_field("expires_at", status.expiration_timestamp.to_rfc3339()));
        }
        Ok(())
    }
}

/// Serializes the credential for a token and writes it, followed by a single
/// newline, to `out`. Nothing is written unless the document validates.
pub fn write_token(out: &mut impl Write, token: &Token) -> Result<()> {
    if token.access_token.is_empty() {
        return Err(Error::new(ErrorKind::TokenInvalid, "access token is empty"));
    }

    let credential = ExecCredential::new(token);
    credential.validate()?;

    let document = serde_json::to_string_pretty(&credential).map_err(|err| {
        Error::wrap(ErrorKind::ExecPluginFailed, err, "failed to serialize ExecCredential")
    })?;

    out.write_all(document.as_bytes())
        .and_then(|()| out.write_all(b"\n"))
        .map_err(|err| {
            Error::wrap(ErrorKind::ExecPluginFailed, err, "failed to write ExecCredential")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_at: DateTime<Utc>) -> Token {
        Token {
            access_token: "bearer-opaque".to_owned(),
            expires_at,
            token_type: "Bearer".to_owned(),
        }
    }

    #[test]
    fn writes_single_document_with_trailing_newline() {
        let mut out = Vec::new();
        write_token(&mut out, &token(Utc::now() + Duration::hours(1))).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert!(!text.ends_with("\n\n"));

        let parsed: ExecCredential = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.api_version, API_VERSION_V1);
        assert_eq!(parsed.kind, KIND);
        let status = parsed.status.unwrap();
        assert_eq!(status.token, "bearer-opaque");
        assert!(status.expiration_timestamp > Utc::now());
    }

    #[test]
    fn expiration_round_trips_through_json() {
        let expires_at = Utc::now() + Duration::minutes(15);
        let mut out = Vec::new();
        write_token(&mut out, &token(expires_at)).unwrap();

        let parsed: ExecCredential = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.status.unwrap().expiration_timestamp, expires_at);
    }

    #[test]
    fn empty_token_writes_nothing() {
        let mut out = Vec::new();
        let mut t = token(Utc::now() + Duration::hours(1));
        t.access_token.clear();
        let err = write_token(&mut out, &t).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenInvalid);
        assert!(out.is_empty());
    }

    #[test]
    fn expired_token_writes_nothing() {
        let mut out = Vec::new();
        let err = write_token(&mut out, &token(Utc::now() - Duration::seconds(5))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecPluginInvalidOutput);
        assert!(out.is_empty());
    }

    #[test]
    fn v1beta1_accepted_on_parse() {
        let raw = serde_json::json!({
            "apiVersion": API_VERSION_V1BETA1,
            "kind": KIND,
            "status": {
                "token": "t",
                "expirationTimestamp": (Utc::now() + Duration::hours(1)).to_rfc3339()
            }
        });
        let parsed: ExecCredential = serde_json::from_value(raw).unwrap();
        parsed.validate().unwrap();
    }

    #[test]
    fn unknown_api_version_rejected() {
        let credential = ExecCredential {
            api_version: "client.authentication.k8s.io/v2".to_owned(),
            kind: KIND.to_owned(),
            status: Some(ExecCredentialStatus {
                expiration_timestamp: Utc::now() + Duration::hours(1),
                token: "t".to_owned(),
            }),
        };
        let err = credential.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecPluginInvalidOutput);
    }
}
