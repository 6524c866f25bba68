use chrono::Duration;
use tracing::info;

use crate::cmd::{GlobalArgs, ProviderArgs};
use crate::errors::{Error, ErrorKind, Result};
use crate::provider::aws::{AwsConfig, AwsProvider};
use crate::provider::azure::{AzureConfig, AzureProvider};
use crate::provider::gcp::{self, GcpConfig, GcpProvider};
use crate::provider::ProviderName;

/// Fetches control-plane metadata and prints it as a JSON object on stdout.
pub(super) async fn run(global: &GlobalArgs, args: &ProviderArgs) -> Result<()> {
    info!(provider = %args.provider, cluster = %args.cluster_name, "fetching cluster info");

    let output = match args.provider.parse::<ProviderName>()? {
        ProviderName::Gcp => gcp_cluster_info(global, args).await?,
        ProviderName::Aws => aws_cluster_info(global, args).await?,
        ProviderName::Azure => azure_cluster_info(global, args).await?,
    };

    let document = serde_json::to_string_pretty(&output)
        .map_err(|err| Error::wrap(ErrorKind::Internal, err, "failed to encode cluster info"))?;
    println!("{document}");

    Ok(())
}

fn require(value: &Option<String>, flag: &str, provider: &str) -> Result<String> {
    value.clone().filter(|v| !v.is_empty()).ok_or_else(|| {
        Error::new(ErrorKind::ConfigMissingField, format!("--{flag} is required for {provider}"))
            .with_field("provider", provider)
    })
}

async fn gcp_cluster_info(global: &GlobalArgs, args: &ProviderArgs) -> Result<serde_json::Value> {
    let project_id = require(&args.project_id, "project-id", "gcp")?;
    let location = require(&args.region, "region", "gcp")?;

    let provider = GcpProvider::new(GcpConfig {
        project_id,
        credentials_file: global.credentials_file.clone(),
        scopes: gcp::default_scopes(),
        token_duration: args.token_duration.unwrap_or_else(|| Duration::hours(1)),
    })?;
    let info = provider.fetch_cluster_info(&args.cluster_name, &location).await?;

    // GKE returns a bare host; the URL form is what clients consume.
    Ok(serde_json::json!({
        "endpoint": format!("https://{}", info.endpoint),
        "certificateAuthority": info.certificate_authority,
        "version": info.version,
        "location": info.location,
    }))
}

async fn aws_cluster_info(global: &GlobalArgs, args: &ProviderArgs) -> Result<serde_json::Value> {
    require(&args.region, "region", "aws")?;

    let provider = AwsProvider::new(AwsConfig {
        region: args.region.clone(),
        credentials_file: global.credentials_file.clone(),
        profile: args.profile.clone(),
        ..Default::default()
    })?;
    let info = provider.fetch_cluster_info(&args.cluster_name).await?;

    Ok(serde_json::json!({
        "endpoint": info.endpoint,
        "certificateAuthority": info.certificate_authority,
        "version": info.version,
        "region": info.region,
        "arn": info.arn,
    }))
}

async fn azure_cluster_info(global: &GlobalArgs, args: &ProviderArgs) -> Result<serde_json::Value> {
    let subscription_id = require(&args.subscription_id, "subscription-id", "azure")?;
    let resource_group = require(&args.resource_group, "resource-group", "azure")?;

    let provider = AzureProvider::new(AzureConfig {
        subscription_id: Some(subscription_id),
        tenant_id: args.tenant_id.clone(),
        resource_group: Some(resource_group.clone()),
        credentials_file: global.credentials_file.clone(),
        ..Default::default()
    })?;
    let info = provider.fetch_cluster_info(&args.cluster_name, &resource_group).await?;

    Ok(serde_json::json!({
        "endpoint": info.endpoint,
        "certificateAuthority": info.certificate_authority,
        "version": info.version,
        "location": info.location,
        "resourceId": info.resource_id,
    }))
}
