use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::{Error, ErrorKind, Result};
use crate::provider::map_http_error;

pub(super) const DEFAULT_CONTAINER_API: &str = "https://container.googleapis.com";

/// GKE control-plane metadata. The endpoint is a bare host; callers that
/// need a URL prepend `https://`.
#[derive(Debug, Clone)]
pub struct GkeClusterInfo {
    pub endpoint: String,
    pub certificate_authority: String,
    pub version: String,
    pub location: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterResponse {
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    master_auth: MasterAuth,
    #[serde(default)]
    current_master_version: String,
    #[serde(default)]
    location: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MasterAuth {
    #[serde(default)]
    cluster_ca_certificate: String,
}

pub(super) async fn fetch(
    http: &reqwest::Client,
    api_base: &str,
    bearer: &str,
    project: &str,
    location: &str,
    cluster_name: &str,
) -> Result<GkeClusterInfo> {
    let url = format!(
        "{api_base}/v1/projects/{project}/locations/{location}/clusters/{cluster_name}"
    );

    debug!(%url, "fetching GKE cluster");

    let response = http.get(&url).bearer_auth(bearer).send().await.map_err(|err| {
        map_http_error(err, ErrorKind::ClusterUnreachable, "GKE cluster lookup failed")
            .with_field("provider", "gcp")
            .with_field("cluster", cluster_name)
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::new(ErrorKind::ClusterNotFound, "GKE cluster not found")
            .with_field("provider", "gcp")
            .with_field("cluster", cluster_name)
            .with_field("location", location));
    }
    if status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::new(
            ErrorKind::PermissionDenied,
            "caller lacks access to the GKE cluster",
        )
        .with_field("provider", "gcp")
        .with_field("cluster", cluster_name));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::new(
            ErrorKind::ClusterUnreachable,
            format!("Container Engine API returned {status}: {body}"),
        )
        .with_field("provider", "gcp")
        .with_field("cluster", cluster_name));
    }

    let cluster: ClusterResponse = response.json().await.map_err(|err| {
        Error::wrap(ErrorKind::ClusterUnreachable, err, "failed to parse GKE cluster response")
            .with_field("provider", "gcp")
    })?;

    if cluster.endpoint.is_empty() {
        return Err(Error::new(ErrorKind::ValidationFailed, "cluster endpoint is empty")
            .with_field("provider", "gcp")
            .with_field("cluster", cluster_name));
    }
    if cluster.master_auth.cluster_ca_certificate.is_empty() {
        return Err(Error::new(ErrorKind::ValidationFailed, "cluster CA certificate is empty")
            .with_field("provider", "gcp")
            .with_field("cluster", cluster_name));
    }

    info!(
        cluster = cluster_name,
        endpoint = %cluster.endpoint,
        version = %cluster.current_master_version,
        "GKE cluster info retrieved"
    );

    Ok(GkeClusterInfo {
        endpoint: cluster.endpoint,
        certificate_authority: cluster.master_auth.cluster_ca_certificate,
        version: cluster.current_master_version,
        location: cluster.location,
    })
}
