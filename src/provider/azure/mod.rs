mod cluster;
mod token;

pub use cluster::AksClusterInfo;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, info};

use crate::credentials::{self, AzureCredentialOptions, AzureCredentials};
use crate::errors::{Error, ErrorKind, Result};

use super::{validate_token, Provider, Token, TokenOptions};

const WARN_THRESHOLD_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub subscription_id: Option<String>,
    pub tenant_id: Option<String>,
    pub resource_group: Option<String>,
    pub credentials_file: Option<String>,
    pub token_duration: Duration,
    /// Azure AD authority base; overridden in tests.
    pub authority: String,
    /// ARM base; overridden in tests.
    pub arm_endpoint: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            tenant_id: None,
            resource_group: None,
            credentials_file: None,
            token_duration: Duration::hours(1),
            authority: token::DEFAULT_AUTHORITY.to_owned(),
            arm_endpoint: cluster::DEFAULT_ARM_ENDPOINT.to_owned(),
        }
    }
}

#[derive(Debug)]
pub struct AzureProvider {
    config: AzureConfig,
    http: reqwest::Client,
}

impl AzureProvider {
    pub fn new(config: AzureConfig) -> Result<Self> {
        debug!(
            subscription_id = config.subscription_id.as_deref().unwrap_or(""),
            tenant_id = config.tenant_id.as_deref().unwrap_or(""),
            resource_group = config.resource_group.as_deref().unwrap_or(""),
            "Azure provider initialized"
        );
        Ok(Self { config, http: reqwest::Client::new() })
    }

    fn load_credentials(&self, opts: &TokenOptions) -> Result<AzureCredentials> {
        credentials::load_azure(&AzureCredentialOptions {
            credentials_file: self.config.credentials_file.clone(),
            tenant_id: opts
                .tenant_id
                .clone()
                .filter(|t| !t.is_empty())
                .or_else(|| self.config.tenant_id.clone()),
        })
    }

    /// Tenant precedence: per-invocation option, provider configuration,
    /// then the principal's own tenant.
    fn effective_tenant(&self, opts: &TokenOptions, creds: &AzureCredentials) -> String {
        opts.tenant_id
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| self.config.tenant_id.clone().filter(|t| !t.is_empty()))
            .unwrap_or_else(|| creds.tenant_id.clone())
    }

    /// Resolves AKS control-plane metadata for one cluster.
    pub async fn fetch_cluster_info(
        &self,
        cluster_name: &str,
        resource_group: &str,
    ) -> Result<AksClusterInfo> {
        let subscription_id = self
            .config
            .subscription_id
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::new(ErrorKind::ConfigMissingField, "Azure subscription_id is required")
                    .with_field("provider", "azure")
            })?;

        let opts = TokenOptions::default();
        let creds = self.load_credentials(&opts)?;
        let tenant = self.effective_tenant(&opts, &creds);
        let bearer = token::exchange(
            &self.http,
            &self.config.authority,
            &creds,
            &tenant,
            self.config.token_duration,
        )
        .await?;

        cluster::fetch(
            &self.http,
            &self.config.arm_endpoint,
            &bearer.access_token,
            &subscription_id,
            resource_group,
            cluster_name,
        )
        .await
    }
}

#[async_trait]
impl Provider for AzureProvider {
    async fn mint_token(&self, opts: &TokenOptions) -> Result<Token> {
        if opts.cluster_name.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument, "cluster name is required")
                .with_field("provider", "azure"));
        }

        let creds = self.load_credentials(opts)?;
        let tenant = self.effective_tenant(opts, &creds);

        let token = token::exchange(
            &self.http,
            &self.config.authority,
            &creds,
            &tenant,
            self.config.token_duration,
        )
        .await?;
        validate_token(&token, "azure", Duration::minutes(WARN_THRESHOLD_MINUTES))?;

        info!(
            cluster = %opts.cluster_name,
            tenant_id = %tenant,
            expires_at = %token.expires_at.to_rfc3339(),
            "Azure token minted"
        );

        Ok(token)
    }

    async fn validate_credentials(&self) -> Result<()> {
        let opts = TokenOptions::default();
        let creds = self.load_credentials(&opts).map_err(|err| {
            Error::wrap(
                ErrorKind::CredentialValidationFailed,
                err,
                "failed to load Azure credentials",
            )
            .with_field("provider", "azure")
        })?;

        let tenant = self.effective_tenant(&opts, &creds);
        let token = token::exchange(
            &self.http,
            &self.config.authority,
            &creds,
            &tenant,
            self.config.token_duration,
        )
        .await
        .map_err(|err| {
            Error::wrap(
                ErrorKind::CredentialValidationFailed,
                err,
                "credentials loaded but the client-credentials grant failed",
            )
            .with_field("provider", "azure")
        })?;
        validate_token(&token, "azure", Duration::minutes(WARN_THRESHOLD_MINUTES))?;

        info!(tenant_id = %tenant, "Azure credentials validated");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"client_id":"c-1","client_secret":"s-1","tenant_id":"t-1"}"#)
            .unwrap();
        file
    }

    fn provider_for(file: &NamedTempFile, authority: &str, tenant: Option<&str>) -> AzureProvider {
        AzureProvider::new(AzureConfig {
            credentials_file: Some(file.path().to_str().unwrap().to_owned()),
            tenant_id: tenant.map(str::to_owned),
            authority: authority.to_owned(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn mint_token_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/t-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "eyJ0.eyJh.c2ln",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let file = credentials_file();
        let provider = provider_for(&file, &server.uri(), None);

        let opts = TokenOptions { cluster_name: "aks1".to_owned(), ..Default::default() };
        let token = provider.mint_token(&opts).await.unwrap();
        assert_eq!(token.access_token, "eyJ0.eyJh.c2ln");
        assert_eq!(token.access_token.split('.').count(), 3);
        assert!(token.expires_at > chrono::Utc::now());
        assert!(token.expires_at <= chrono::Utc::now() + Duration::minutes(90));
    }

    #[tokio::test]
    async fn option_tenant_wins_over_principal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/t-override/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let file = credentials_file();
        let provider = provider_for(&file, &server.uri(), None);

        let opts = TokenOptions {
            cluster_name: "aks1".to_owned(),
            tenant_id: Some("t-override".to_owned()),
            ..Default::default()
        };
        provider.mint_token(&opts).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_client_secret_is_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("AADSTS7000215"))
            .mount(&server)
            .await;

        let file = credentials_file();
        let provider = provider_for(&file, &server.uri(), None);

        let opts = TokenOptions { cluster_name: "aks1".to_owned(), ..Default::default() };
        let err = provider.mint_token(&opts).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn mint_token_requires_cluster_name() {
        let file = credentials_file();
        let provider = provider_for(&file, "https://unused.example", None);
        let err = provider.mint_token(&TokenOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn cluster_info_requires_subscription() {
        let file = credentials_file();
        let provider = provider_for(&file, "https://unused.example", None);
        let err = provider.fetch_cluster_info("aks1", "rg").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigMissingField);
    }
}
