mod cluster;
mod token;

pub use cluster::GkeClusterInfo;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, info};

use crate::credentials::{self, GcpCredentials};
use crate::errors::{Error, ErrorKind, Result};

use super::{validate_token, Provider, Token, TokenOptions};

const WARN_THRESHOLD_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct GcpConfig {
    pub project_id: String,
    pub credentials_file: Option<String>,
    pub token_duration: Duration,
    pub scopes: Vec<String>,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            credentials_file: None,
            token_duration: Duration::hours(1),
            scopes: default_scopes(),
        }
    }
}

pub fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/cloud-platform".to_owned(),
        "https://www.googleapis.com/auth/userinfo.email".to_owned(),
    ]
}

#[derive(Debug)]
pub struct GcpProvider {
    config: GcpConfig,
    http: reqwest::Client,
    container_api: String,
}

impl GcpProvider {
    pub fn new(config: GcpConfig) -> Result<Self> {
        if config.project_id.is_empty() {
            return Err(Error::new(ErrorKind::ConfigMissingField, "GCP project_id is required")
                .with_field("provider", "gcp"));
        }

        debug!(project_id = %config.project_id, scopes = config.scopes.len(), "GCP provider initialized");

        Ok(Self {
            config,
            http: reqwest::Client::new(),
            container_api: cluster::DEFAULT_CONTAINER_API.to_owned(),
        })
    }

    #[cfg(test)]
    fn with_container_api(mut self, base: impl Into<String>) -> Self {
        self.container_api = base.into();
        self
    }

    fn load_credentials(&self) -> Result<GcpCredentials> {
        credentials::load_gcp(self.config.credentials_file.as_deref())
    }

    /// Resolves GKE control-plane metadata for one cluster. The returned
    /// endpoint carries no URL scheme.
    pub async fn fetch_cluster_info(
        &self,
        cluster_name: &str,
        location: &str,
    ) -> Result<GkeClusterInfo> {
        let creds = self.load_credentials()?;
        let bearer = token::exchange(&self.http, &creds, &self.config).await?;
        cluster::fetch(
            &self.http,
            &self.container_api,
            &bearer.access_token,
            &creds.project_id,
            location,
            cluster_name,
        )
        .await
    }
}

#[async_trait]
impl Provider for GcpProvider {
    async fn mint_token(&self, opts: &TokenOptions) -> Result<Token> {
        if opts.cluster_name.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument, "cluster name is required")
                .with_field("provider", "gcp"));
        }

        let creds = self.load_credentials()?;
        let token = token::exchange(&self.http, &creds, &self.config).await?;
        validate_token(&token, "gcp", Duration::minutes(WARN_THRESHOLD_MINUTES))?;

        info!(
            cluster = %opts.cluster_name,
            project = %creds.project_id,
            expires_at = %token.expires_at.to_rfc3339(),
            "GCP token minted"
        );

        Ok(token)
    }

    async fn validate_credentials(&self) -> Result<()> {
        let creds = self.load_credentials().map_err(|err| {
            Error::wrap(
                ErrorKind::CredentialValidationFailed,
                err,
                "failed to load GCP credentials",
            )
            .with_field("provider", "gcp")
        })?;

        if !self.config.project_id.is_empty() && creds.project_id != self.config.project_id {
            return Err(Error::new(
                ErrorKind::CredentialInvalid,
                "project ID mismatch between configuration and credentials",
            )
            .with_field("provider", "gcp")
            .with_field("config_project", &self.config.project_id)
            .with_field("creds_project", &creds.project_id));
        }

        // Dry-run exchange: the only way to know the key still signs a grant
        // the token service accepts.
        let token = token::exchange(&self.http, &creds, &self.config).await.map_err(|err| {
            Error::wrap(
                ErrorKind::CredentialValidationFailed,
                err,
                "credentials loaded but the token exchange failed",
            )
            .with_field("provider", "gcp")
        })?;
        validate_token(&token, "gcp", Duration::minutes(WARN_THRESHOLD_MINUTES))?;

        info!(project_id = %creds.project_id, client_email = %creds.client_email, "GCP credentials validated");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // 2048-bit throwaway key, generated for tests only.
    const TEST_RSA_KEY: &str = include_str!("testdata/test_key.pem");

    fn service_account_json(project_id: &str, token_uri: &str) -> String {
        serde_json::json!({
            "type": "service_account",
            "project_id": project_id,
            "private_key_id": "kid-test",
            "private_key": TEST_RSA_KEY,
            "client_email": format!("svc@{project_id}.iam.gserviceaccount.com"),
            "client_id": "1234",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": token_uri,
            "auth_provider_x509_cert_url": "https://www.googleapis.com/oauth2/v1/certs",
            "client_x509_cert_url": "https://www.googleapis.com/robot/v1/metadata/x509/svc"
        })
        .to_string()
    }

    fn write_credentials(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn provider_for(file: &NamedTempFile, project_id: &str) -> GcpProvider {
        GcpProvider::new(GcpConfig {
            project_id: project_id.to_owned(),
            credentials_file: Some(file.path().to_str().unwrap().to_owned()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn mint_token_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.minted",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let file = write_credentials(&service_account_json("p1", &format!("{}/token", server.uri())));
        let provider = provider_for(&file, "p1");

        let opts = TokenOptions { cluster_name: "c1".to_owned(), ..Default::default() };
        let token = provider.mint_token(&opts).await.unwrap();
        assert_eq!(token.access_token, "ya29.minted");
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at > chrono::Utc::now());
    }

    #[tokio::test]
    async fn mint_token_requires_cluster_name() {
        let file = write_credentials(&service_account_json("p1", "https://unused.example/token"));
        let provider = provider_for(&file, "p1");

        let err = provider.mint_token(&TokenOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn validate_credentials_rejects_project_mismatch() {
        let file = write_credentials(&service_account_json("p1", "https://unused.example/token"));
        let provider = provider_for(&file, "p2");

        let err = provider.validate_credentials().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    }

    #[tokio::test]
    async fn token_type_defaults_to_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.minted",
                "expires_in": 600
            })))
            .mount(&server)
            .await;

        let file = write_credentials(&service_account_json("p1", &format!("{}/token", server.uri())));
        let provider = provider_for(&file, "p1");

        let opts = TokenOptions { cluster_name: "c1".to_owned(), ..Default::default() };
        let token = provider.mint_token(&opts).await.unwrap();
        assert_eq!(token.token_type, "Bearer");
    }

    #[tokio::test]
    async fn exchange_failure_maps_to_token_generation_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let file = write_credentials(&service_account_json("p1", &format!("{}/token", server.uri())));
        let provider = provider_for(&file, "p1");

        let opts = TokenOptions { cluster_name: "c1".to_owned(), ..Default::default() };
        let err = provider.mint_token(&opts).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenGenerationFailed);
    }

    #[tokio::test]
    async fn cluster_info_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.minted",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let file = write_credentials(&service_account_json("p1", &format!("{}/token", server.uri())));
        let provider = provider_for(&file, "p1").with_container_api(server.uri());

        let err = provider.fetch_cluster_info("ghost", "us-central1-a").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClusterNotFound);
    }
}
