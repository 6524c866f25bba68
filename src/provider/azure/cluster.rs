use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::{Error, ErrorKind, Result};
use crate::provider::map_http_error;

pub(super) const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

const API_VERSION: &str = "2024-05-01";

/// AKS control-plane metadata. The endpoint is `https://` + the cluster
/// FQDN; the CA certificate is lifted out of the admin kubeconfig.
#[derive(Debug, Clone)]
pub struct AksClusterInfo {
    pub endpoint: String,
    pub certificate_authority: String,
    pub version: String,
    pub location: String,
    pub resource_id: String,
}

#[derive(Debug, Deserialize)]
struct ManagedCluster {
    #[serde(default)]
    id: String,
    #[serde(default)]
    location: String,
    properties: Option<ManagedClusterProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedClusterProperties {
    #[serde(default)]
    fqdn: String,
    #[serde(default)]
    kubernetes_version: String,
}

#[derive(Debug, Deserialize)]
struct CredentialResults {
    #[serde(default)]
    kubeconfigs: Vec<CredentialResult>,
}

#[derive(Debug, Deserialize)]
struct CredentialResult {
    #[serde(default)]
    value: String,
}

pub(super) async fn fetch(
    http: &reqwest::Client,
    arm_base: &str,
    bearer: &str,
    subscription_id: &str,
    resource_group: &str,
    cluster_name: &str,
) -> Result<AksClusterInfo> {
    let resource = format!(
        "{arm_base}/subscriptions/{subscription_id}/resourceGroups/{resource_group}\
/providers/Microsoft.ContainerService/managedClusters/{cluster_name}"
    );

    debug!(cluster = cluster_name, resource_group, "fetching AKS managed cluster");

    let response = http
        .get(format!("{resource}?api-version={API_VERSION}"))
        .bearer_auth(bearer)
        .send()
        .await
        .map_err(|err| {
            map_http_error(err, ErrorKind::ClusterUnreachable, "AKS cluster lookup failed")
                .with_field("provider", "azure")
                .with_field("cluster", cluster_name)
        })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::new(ErrorKind::ClusterNotFound, "AKS cluster not found")
            .with_field("provider", "azure")
            .with_field("cluster", cluster_name)
            .with_field("resource_group", resource_group));
    }
    if status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::new(
            ErrorKind::PermissionDenied,
            "caller lacks access to the AKS cluster",
        )
        .with_field("provider", "azure")
        .with_field("cluster", cluster_name));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::new(
            ErrorKind::ClusterUnreachable,
            format!("ARM returned {status}: {body}"),
        )
        .with_field("provider", "azure")
        .with_field("cluster", cluster_name));
    }

    let cluster: ManagedCluster = response.json().await.map_err(|err| {
        Error::wrap(ErrorKind::ClusterUnreachable, err, "failed to parse managed cluster response")
            .with_field("provider", "azure")
    })?;

    let properties = cluster.properties.ok_or_else(|| {
        Error::new(ErrorKind::ValidationFailed, "managed cluster has no properties")
            .with_field("provider", "azure")
            .with_field("cluster", cluster_name)
    })?;
    if properties.fqdn.is_empty() {
        return Err(Error::new(ErrorKind::ValidationFailed, "cluster FQDN is empty")
            .with_field("provider", "azure")
            .with_field("cluster", cluster_name));
    }

    let certificate_authority =
        fetch_admin_ca(http, &resource, bearer, cluster_name).await?;

    let info = AksClusterInfo {
        endpoint: format!("https://{}", properties.fqdn),
        certificate_authority,
        version: properties.kubernetes_version,
        location: cluster.location,
        resource_id: cluster.id,
    };

    info!(
        cluster = cluster_name,
        endpoint = %info.endpoint,
        version = %info.version,
        location = %info.location,
        "AKS cluster info retrieved"
    );

    Ok(info)
}

/// Pulls the admin kubeconfig and lifts the CA certificate out of it.
async fn fetch_admin_ca(
    http: &reqwest::Client,
    resource: &str,
    bearer: &str,
    cluster_name: &str,
) -> Result<String> {
    let response = http
        .post(format!("{resource}/listClusterAdminCredential?api-version={API_VERSION}"))
        .bearer_auth(bearer)
        .send()
        .await
        .map_err(|err| {
            map_http_error(err, ErrorKind::ClusterUnreachable, "admin credential listing failed")
                .with_field("provider", "azure")
                .with_field("cluster", cluster_name)
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::new(
            ErrorKind::ClusterUnreachable,
            format!("listClusterAdminCredential returned {status}: {body}"),
        )
        .with_field("provider", "azure")
        .with_field("cluster", cluster_name));
    }

    let results: CredentialResults = response.json().await.map_err(|err| {
        Error::wrap(ErrorKind::ClusterUnreachable, err, "failed to parse credential results")
            .with_field("provider", "azure")
    })?;

    let encoded = results.kubeconfigs.first().map(|k| k.value.as_str()).ok_or_else(|| {
        Error::new(ErrorKind::ValidationFailed, "no kubeconfig in admin credentials")
            .with_field("provider", "azure")
            .with_field("cluster", cluster_name)
    })?;

    let kubeconfig = STANDARD.decode(encoded).map_err(|err| {
        Error::wrap(ErrorKind::ValidationFailed, err, "admin kubeconfig is not base64")
            .with_field("provider", "azure")
    })?;

    extract_ca_data(&String::from_utf8_lossy(&kubeconfig)).ok_or_else(|| {
        Error::new(
            ErrorKind::ValidationFailed,
            "certificate-authority-data not found in admin kubeconfig",
        )
        .with_field("provider", "azure")
        .with_field("cluster", cluster_name)
    })
}

/// Textual scan for the `certificate-authority-data: ` line. Deliberately
/// not a YAML parse: output must match what the service returns byte for
/// byte, comments and odd indentation included.
fn extract_ca_data(kubeconfig: &str) -> Option<String> {
    const NEEDLE: &str = "certificate-authority-data: ";

    let start = kubeconfig.find(NEEDLE)? + NEEDLE.len();
    let rest = &kubeconfig[start..];
    let end = rest.find(['\n', '\r']).unwrap_or(rest.len());
    let ca = &rest[..end];

    if ca.is_empty() {
        None
    } else {
        Some(ca.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ca_extraction_reads_to_end_of_line() {
        let kubeconfig = "\
apiVersion: v1
clusters:
- cluster:
    certificate-authority-data: LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0t
    server: https://aks1.example.azmk8s.io:443
  name: aks1
";
        assert_eq!(
            extract_ca_data(kubeconfig).as_deref(),
            Some("LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0t")
        );
    }

    #[test]
    fn ca_extraction_missing_key() {
        assert!(extract_ca_data("apiVersion: v1\nclusters: []\n").is_none());
    }

    #[test]
    fn ca_extraction_empty_value() {
        assert!(extract_ca_data("certificate-authority-data: \nnext: x\n").is_none());
    }

    #[test]
    fn ca_extraction_handles_crlf() {
        let kubeconfig = "certificate-authority-data: QUJD\r\nserver: https://x\r\n";
        assert_eq!(extract_ca_data(kubeconfig).as_deref(), Some("QUJD"));
    }
}
