use chrono::Duration;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Multi-cloud Kubernetes credential broker.
///
/// Mints short-lived authentication tokens for GKE, EKS and AKS clusters
/// without requiring cloud CLIs, speaking the Kubernetes exec plugin
/// protocol on stdout.
#[derive(Parser)]
#[command(name = "hyperfleet-credential-provider", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Log level.
    #[arg(long, global = true, env = "HFCP_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format.
    #[arg(long, global = true, env = "HFCP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Path to a credentials file. Overrides the cloud-standard environment
    /// variables.
    #[arg(long, global = true, env = "HFCP_CREDENTIALS_FILE")]
    pub credentials_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Console,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mint a Kubernetes authentication token and print the ExecCredential
    /// document to stdout.
    MintToken {
        #[command(flatten)]
        args: ProviderArgs,

        /// Validate credentials (including a dry-run exchange) before
        /// minting.
        #[arg(long, env = "HFCP_VALIDATE", default_value_t = false)]
        validate: bool,
    },

    /// Fetch cluster metadata (API endpoint, CA certificate, version).
    FetchClusterInfo(ProviderArgs),

    /// Emit a self-contained kubeconfig that uses this executable for
    /// on-demand credential refresh.
    EmitClientConfig {
        #[command(flatten)]
        args: ProviderArgs,

        /// Output file path (written with mode 0600). Defaults to stdout.
        #[arg(long, env = "HFCP_OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Print version information.
    Version,
}

#[derive(Args)]
pub struct ProviderArgs {
    /// Cloud provider (gcp, aws, azure).
    #[arg(long, env = "HFCP_PROVIDER")]
    pub provider: String,

    /// Cluster name.
    #[arg(long, env = "HFCP_CLUSTER_NAME")]
    pub cluster_name: String,

    /// Cloud region or location.
    #[arg(long, env = "HFCP_REGION")]
    pub region: Option<String>,

    /// GCP project ID (required for gcp).
    #[arg(long, env = "HFCP_PROJECT_ID")]
    pub project_id: Option<String>,

    /// AWS account ID (advisory).
    #[arg(long, env = "HFCP_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Azure subscription ID.
    #[arg(long, env = "HFCP_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Azure tenant ID.
    #[arg(long, env = "HFCP_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Azure resource group.
    #[arg(long, env = "HFCP_RESOURCE_GROUP")]
    pub resource_group: Option<String>,

    /// AWS credentials-file profile.
    #[arg(long, env = "HFCP_PROFILE")]
    pub profile: Option<String>,

    /// Token duration, e.g. 1h, 30m or 900s. Defaults per provider
    /// (gcp=1h, aws=15m, azure=1h).
    #[arg(long, env = "HFCP_TOKEN_DURATION", value_parser = parse_duration)]
    pub token_duration: Option<Duration>,
}

/// Parses `1h` / `30m` / `900s` / bare seconds into a positive duration.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let (number, unit) = match input.chars().last() {
        Some('h') => (&input[..input.len() - 1], 3600),
        Some('m') => (&input[..input.len() - 1], 60),
        Some('s') => (&input[..input.len() - 1], 1),
        Some(c) if c.is_ascii_digit() => (input, 1),
        _ => return Err(format!("invalid duration: {input} (examples: 1h, 30m, 900s)")),
    };

    let value: i64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {input} (examples: 1h, 30m, 900s)"))?;
    if value <= 0 {
        return Err("token duration must be positive".to_owned());
    }

    Ok(Duration::seconds(value * unit))
}
