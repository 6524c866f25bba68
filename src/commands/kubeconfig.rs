use std::path::Path;

use chrono::Duration;
use tracing::info;

use crate::cmd::{GlobalArgs, ProviderArgs};
use crate::credentials::loader_env_for;
use crate::errors::{Error, ErrorKind, Result};
use crate::kubeconfig::{emit, ClientConfigParams, EnvVar};
use crate::provider::aws::{AwsConfig, AwsProvider};
use crate::provider::azure::{AzureConfig, AzureProvider};
use crate::provider::gcp::{self, GcpConfig, GcpProvider};
use crate::provider::ProviderName;

/// Fetched endpoint/CA plus the selectors that must be replayed on every
/// credential refresh.
struct ResolvedCluster {
    endpoint: String,
    certificate_authority: String,
    selector_args: Vec<String>,
}

pub(super) async fn run(
    global: &GlobalArgs,
    args: &ProviderArgs,
    output: Option<&Path>,
) -> Result<()> {
    let provider_name = args.provider.parse::<ProviderName>()?;

    info!(provider = %provider_name, cluster = %args.cluster_name, "generating client configuration");

    let resolved = match provider_name {
        ProviderName::Gcp => resolve_gcp(global, args).await?,
        ProviderName::Aws => resolve_aws(global, args).await?,
        ProviderName::Azure => resolve_azure(global, args).await?,
    };

    let mut exec_args = vec![
        "mint-token".to_owned(),
        format!("--provider={provider_name}"),
        format!("--cluster-name={}", args.cluster_name),
    ];
    exec_args.extend(resolved.selector_args);

    let params = ClientConfigParams {
        cluster_name: args.cluster_name.clone(),
        endpoint: resolved.endpoint,
        certificate_authority: resolved.certificate_authority,
        exec_args,
        credentials_env: credentials_env(provider_name, global),
    };

    emit(&params, output)?;

    if let Some(path) = output {
        info!(path = %path.display(), "client configuration generated");
    }

    Ok(())
}

fn require(value: &Option<String>, flag: &str, provider: &str) -> Result<String> {
    value.clone().filter(|v| !v.is_empty()).ok_or_else(|| {
        Error::new(ErrorKind::ConfigMissingField, format!("--{flag} is required for {provider}"))
            .with_field("provider", provider)
    })
}

async fn resolve_gcp(global: &GlobalArgs, args: &ProviderArgs) -> Result<ResolvedCluster> {
    let project_id = require(&args.project_id, "project-id", "gcp")?;
    let location = require(&args.region, "region", "gcp")?;

    let provider = GcpProvider::new(GcpConfig {
        project_id: project_id.clone(),
        credentials_file: global.credentials_file.clone(),
        scopes: gcp::default_scopes(),
        token_duration: args.token_duration.unwrap_or_else(|| Duration::hours(1)),
    })?;
    let info = provider.fetch_cluster_info(&args.cluster_name, &location).await?;

    Ok(ResolvedCluster {
        endpoint: format!("https://{}", info.endpoint),
        certificate_authority: info.certificate_authority,
        selector_args: vec![
            format!("--project-id={project_id}"),
            format!("--region={location}"),
        ],
    })
}

async fn resolve_aws(global: &GlobalArgs, args: &ProviderArgs) -> Result<ResolvedCluster> {
    let region = require(&args.region, "region", "aws")?;

    let provider = AwsProvider::new(AwsConfig {
        region: Some(region.clone()),
        credentials_file: global.credentials_file.clone(),
        profile: args.profile.clone(),
        ..Default::default()
    })?;
    let info = provider.fetch_cluster_info(&args.cluster_name).await?;

    Ok(ResolvedCluster {
        endpoint: info.endpoint,
        certificate_authority: info.certificate_authority,
        selector_args: vec![format!("--region={region}")],
    })
}

async fn resolve_azure(global: &GlobalArgs, args: &ProviderArgs) -> Result<ResolvedCluster> {
    let subscription_id = require(&args.subscription_id, "subscription-id", "azure")?;
    let tenant_id = require(&args.tenant_id, "tenant-id", "azure")?;
    let resource_group = require(&args.resource_group, "resource-group", "azure")?;

    let provider = AzureProvider::new(AzureConfig {
        subscription_id: Some(subscription_id.clone()),
        tenant_id: Some(tenant_id.clone()),
        resource_group: Some(resource_group.clone()),
        credentials_file: global.credentials_file.clone(),
        ..Default::default()
    })?;
    let info = provider.fetch_cluster_info(&args.cluster_name, &resource_group).await?;

    Ok(ResolvedCluster {
        endpoint: info.endpoint,
        certificate_authority: info.certificate_authority,
        selector_args: vec![
            format!("--subscription-id={subscription_id}"),
            format!("--tenant-id={tenant_id}"),
            format!("--resource-group={resource_group}"),
        ],
    })
}

/// The exec stanza carries the cloud's credentials-path variable so the
/// refresh invocation finds the same principal this run used.
fn credentials_env(provider: ProviderName, global: &GlobalArgs) -> EnvVar {
    let (name, default_path) = loader_env_for(provider);
    EnvVar {
        name: name.to_owned(),
        value: global.credentials_file.clone().unwrap_or_else(|| default_path.to_owned()),
    }
}
