mod loader;

pub use loader::{
    load_aws, load_azure, load_gcp, loader_env_for, redact_path, AwsCredentialOptions,
    AzureCredentialOptions,
};

use serde::Deserialize;

use crate::errors::{Error, ErrorKind, Result};

/// GCP service-account key file contents. The raw JSON is retained because
/// the cluster-metadata path re-feeds the unmodified document to the OAuth
/// exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct GcpCredentials {
    #[serde(rename = "type", default)]
    pub credential_type: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub auth_uri: String,
    #[serde(default)]
    pub token_uri: String,
    #[serde(default)]
    pub auth_provider_x509_cert_url: String,
    #[serde(default)]
    pub client_x509_cert_url: String,

    #[serde(skip)]
    pub raw_json: String,
}

#[derive(Debug, Clone, Default)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AzureCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
}

impl GcpCredentials {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.credential_type != "service_account" {
            return Err(Error::new(ErrorKind::CredentialInvalid, "invalid GCP credential type")
                .with_field("type", &self.credential_type)
                .with_field("provider", "gcp"));
        }
        for (field, value) in [
            ("project_id", &self.project_id),
            ("private_key", &self.private_key),
            ("client_email", &self.client_email),
        ] {
            if value.is_empty() {
                return Err(Error::new(
                    ErrorKind::CredentialInvalid,
                    format!("GCP credentials missing {field}"),
                )
                .with_field("provider", "gcp"));
            }
        }
        Ok(())
    }
}

impl AwsCredentials {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.access_key_id.is_empty() {
            return Err(Error::new(ErrorKind::CredentialNotFound, "AWS access key ID not found")
                .with_field("provider", "aws")
                .with_field("hint", "set AWS_ACCESS_KEY_ID or supply a credentials file"));
        }
        if self.secret_access_key.is_empty() {
            return Err(
                Error::new(ErrorKind::CredentialNotFound, "AWS secret access key not found")
                    .with_field("provider", "aws")
                    .with_field("hint", "set AWS_SECRET_ACCESS_KEY or supply a credentials file"),
            );
        }
        Ok(())
    }
}

impl AzureCredentials {
    pub(crate) fn validate(&self) -> Result<()> {
        for (field, value, env) in [
            ("client ID", &self.client_id, "AZURE_CLIENT_ID"),
            ("client secret", &self.client_secret, "AZURE_CLIENT_SECRET"),
            ("tenant ID", &self.tenant_id, "AZURE_TENANT_ID"),
        ] {
            if value.is_empty() {
                return Err(Error::new(
                    ErrorKind::CredentialNotFound,
                    format!("Azure {field} not found"),
                )
                .with_field("provider", "azure")
                .with_field("hint", format!("set {env} or supply a credentials file")));
            }
        }
        Ok(())
    }
}
