use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::errors::{Error, ErrorKind, Result};
use crate::execplugin::API_VERSION_V1;

const USER_NAME: &str = "hyperfleet-user";

/// Everything needed to compose a self-contained client configuration for
/// one cluster, with this executable wired in as the credential helper.
#[derive(Debug, Clone)]
pub struct ClientConfigParams {
    pub cluster_name: String,
    /// Full server URL, scheme included.
    pub endpoint: String,
    /// Base64-encoded CA certificate.
    pub certificate_authority: String,
    /// `mint-token` plus the provider flag and the cloud selectors the
    /// caller originally supplied.
    pub exec_args: Vec<String>,
    /// Credentials-path environment variable propagated into the exec
    /// stanza, e.g. `GOOGLE_APPLICATION_CREDENTIALS`.
    pub credentials_env: EnvVar,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Config {
    api_version: &'static str,
    kind: &'static str,
    clusters: Vec<NamedCluster>,
    users: Vec<NamedUser>,
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    current_context: String,
}

#[derive(Serialize)]
struct NamedCluster {
    name: String,
    cluster: Cluster,
}

#[derive(Serialize)]
struct Cluster {
    server: String,
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: String,
}

#[derive(Serialize)]
struct NamedUser {
    name: String,
    user: User,
}

#[derive(Serialize)]
struct User {
    exec: ExecConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecConfig {
    api_version: &'static str,
    command: &'static str,
    args: Vec<String>,
    env: Vec<EnvVar>,
    interactive_mode: &'static str,
}

#[derive(Serialize)]
struct NamedContext {
    name: String,
    context: Context,
}

#[derive(Serialize)]
struct Context {
    cluster: String,
    user: String,
}

/// Renders the YAML document: exactly one cluster, one user, one context,
/// the context current.
pub fn render(params: &ClientConfigParams) -> Result<String> {
    let config = Config {
        api_version: "v1",
        kind: "Config",
        clusters: vec![NamedCluster {
            name: params.cluster_name.clone(),
            cluster: Cluster {
                server: params.endpoint.clone(),
                certificate_authority_data: params.certificate_authority.clone(),
            },
        }],
        users: vec![NamedUser {
            name: USER_NAME.to_owned(),
            user: User {
                exec: ExecConfig {
                    api_version: API_VERSION_V1,
                    command: env!("CARGO_PKG_NAME"),
                    args: params.exec_args.clone(),
                    env: vec![params.credentials_env.clone()],
                    interactive_mode: "Never",
                },
            },
        }],
        contexts: vec![NamedContext {
            name: params.cluster_name.clone(),
            context: Context {
                cluster: params.cluster_name.clone(),
                user: USER_NAME.to_owned(),
            },
        }],
        current_context: params.cluster_name.clone(),
    };

    serde_yaml::to_string(&config).map_err(|err| {
        Error::wrap(ErrorKind::Internal, err, "failed to serialize client configuration")
    })
}

/// Writes the document to `output` with mode 0600, or to stdout when no
/// path is given.
pub fn emit(params: &ClientConfigParams, output: Option<&Path>) -> Result<()> {
    let document = render(params)?;

    match output {
        Some(path) => {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .map_err(|err| {
                    Error::wrap(ErrorKind::Internal, err, "failed to open output file")
                        .with_field("path", path.display().to_string())
                })?;
            file.write_all(document.as_bytes()).map_err(|err| {
                Error::wrap(ErrorKind::Internal, err, "failed to write client configuration")
                    .with_field("path", path.display().to_string())
            })?;
            info!(path = %path.display(), "client configuration written");
        }
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(document.as_bytes()).map_err(|err| {
                Error::wrap(ErrorKind::Internal, err, "failed to write client configuration")
            })?;
        }
    }

    Ok(())
}
