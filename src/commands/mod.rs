mod cluster;
mod kubeconfig;
mod token;
mod version;

use chrono::Duration;

use crate::cmd::{Cli, Commands, GlobalArgs, ProviderArgs};
use crate::errors::Result;
use crate::provider::aws::{AwsConfig, AwsProvider};
use crate::provider::azure::{AzureConfig, AzureProvider};
use crate::provider::gcp::{self, GcpConfig, GcpProvider};
use crate::provider::{Provider, ProviderName, TokenOptions};

pub async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::MintToken { args, validate } => token::run(&cli.global, args, *validate).await,
        Commands::FetchClusterInfo(args) => cluster::run(&cli.global, args).await,
        Commands::EmitClientConfig { args, output } => {
            kubeconfig::run(&cli.global, args, output.as_deref()).await
        }
        Commands::Version => {
            version::run();
            Ok(())
        }
    }
}

/// Builds the provider selected on the command line. Unknown names fail
/// with `ProviderNotSupported` before any credential I/O.
pub(crate) fn create_provider(
    global: &GlobalArgs,
    args: &ProviderArgs,
) -> Result<Box<dyn Provider>> {
    match args.provider.parse::<ProviderName>()? {
        ProviderName::Gcp => {
            let config = GcpConfig {
                project_id: args.project_id.clone().unwrap_or_default(),
                credentials_file: global.credentials_file.clone(),
                token_duration: args.token_duration.unwrap_or_else(|| Duration::hours(1)),
                scopes: gcp::default_scopes(),
            };
            Ok(Box::new(GcpProvider::new(config)?))
        }
        ProviderName::Aws => {
            let config = AwsConfig {
                region: args.region.clone(),
                account_id: args.account_id.clone(),
                credentials_file: global.credentials_file.clone(),
                profile: args.profile.clone(),
                token_duration: args.token_duration.unwrap_or_else(|| Duration::minutes(15)),
                ..Default::default()
            };
            Ok(Box::new(AwsProvider::new(config)?))
        }
        ProviderName::Azure => {
            let config = AzureConfig {
                subscription_id: args.subscription_id.clone(),
                tenant_id: args.tenant_id.clone(),
                resource_group: args.resource_group.clone(),
                credentials_file: global.credentials_file.clone(),
                token_duration: args.token_duration.unwrap_or_else(|| Duration::hours(1)),
                ..Default::default()
            };
            Ok(Box::new(AzureProvider::new(config)?))
        }
    }
}

pub(crate) fn token_options(args: &ProviderArgs) -> TokenOptions {
    TokenOptions {
        cluster_name: args.cluster_name.clone(),
        region: args.region.clone(),
        project_id: args.project_id.clone(),
        account_id: args.account_id.clone(),
        subscription_id: args.subscription_id.clone(),
        tenant_id: args.tenant_id.clone(),
        resource_group: args.resource_group.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{LogFormat, LogLevel};
    use crate::errors::ErrorKind;

    fn global() -> GlobalArgs {
        GlobalArgs {
            log_level: LogLevel::Info,
            log_format: LogFormat::Json,
            credentials_file: None,
        }
    }

    fn args(provider: &str) -> ProviderArgs {
        ProviderArgs {
            provider: provider.to_owned(),
            cluster_name: "c1".to_owned(),
            region: None,
            project_id: Some("p1".to_owned()),
            account_id: None,
            subscription_id: None,
            tenant_id: None,
            resource_group: None,
            profile: None,
            token_duration: None,
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = create_provider(&global(), &args("oracle")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderNotSupported);
        assert!(err.to_string().contains("unsupported provider"));
    }

    #[test]
    fn known_providers_construct() {
        for provider in ["gcp", "aws", "azure"] {
            let built = create_provider(&global(), &args(provider)).unwrap();
            assert_eq!(built.name(), provider);
        }
    }

    #[test]
    fn gcp_without_project_id_fails_construction() {
        let mut a = args("gcp");
        a.project_id = None;
        let err = create_provider(&global(), &a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigMissingField);
    }
}
