use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use tracing::{debug, info};

use crate::credentials::AwsCredentials;
use crate::errors::{Error, ErrorKind, Result};

use super::token::CREDENTIALS_PROVIDER_NAME;

/// EKS control-plane metadata. The endpoint already carries its scheme and
/// the CA certificate is returned base64-encoded by the service.
#[derive(Debug, Clone)]
pub struct EksClusterInfo {
    pub endpoint: String,
    pub certificate_authority: String,
    pub version: String,
    pub region: String,
    pub arn: String,
}

pub(super) async fn fetch(
    creds: &AwsCredentials,
    region: &str,
    cluster_name: &str,
) -> Result<EksClusterInfo> {
    let sdk_credentials = Credentials::new(
        creds.access_key_id.clone(),
        creds.secret_access_key.clone(),
        creds.session_token.clone(),
        None,
        CREDENTIALS_PROVIDER_NAME,
    );

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_owned()))
        .credentials_provider(sdk_credentials)
        .load()
        .await;

    let client = aws_sdk_eks::Client::new(&sdk_config);

    debug!(cluster = cluster_name, region, "describing EKS cluster");

    let output = client.describe_cluster().name(cluster_name).send().await.map_err(|err| {
        let service_error = err.into_service_error();
        if service_error.is_resource_not_found_exception() {
            Error::wrap(ErrorKind::ClusterNotFound, service_error, "EKS cluster not found")
                .with_field("provider", "aws")
                .with_field("cluster", cluster_name)
                .with_field("region", region)
        } else {
            Error::wrap(ErrorKind::ClusterUnreachable, service_error, "failed to describe EKS cluster")
                .with_field("provider", "aws")
                .with_field("cluster", cluster_name)
                .with_field("region", region)
        }
    })?;

    let cluster = output.cluster().ok_or_else(|| {
        Error::new(ErrorKind::ClusterNotFound, "EKS cluster not found")
            .with_field("provider", "aws")
            .with_field("cluster", cluster_name)
    })?;

    let endpoint = cluster.endpoint().unwrap_or_default();
    if endpoint.is_empty() {
        return Err(Error::new(ErrorKind::ValidationFailed, "cluster endpoint is empty")
            .with_field("provider", "aws")
            .with_field("cluster", cluster_name));
    }

    let certificate_authority =
        cluster.certificate_authority().and_then(|ca| ca.data()).unwrap_or_default();
    if certificate_authority.is_empty() {
        return Err(Error::new(ErrorKind::ValidationFailed, "cluster CA certificate is empty")
            .with_field("provider", "aws")
            .with_field("cluster", cluster_name));
    }

    let info = EksClusterInfo {
        endpoint: endpoint.to_owned(),
        certificate_authority: certificate_authority.to_owned(),
        version: cluster.version().unwrap_or_default().to_owned(),
        region: region.to_owned(),
        arn: cluster.arn().unwrap_or_default().to_owned(),
    };

    info!(
        cluster = cluster_name,
        endpoint = %info.endpoint,
        version = %info.version,
        region,
        "EKS cluster info retrieved"
    );

    Ok(info)
}
