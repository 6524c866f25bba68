use tracing::info;

use crate::cmd::{GlobalArgs, ProviderArgs};
use crate::errors::Result;
use crate::execplugin;

use super::{create_provider, token_options};

/// Mints a token and writes the ExecCredential document to stdout. On any
/// failure nothing at all reaches stdout; the Kubernetes client treats an
/// empty primary stream plus a nonzero exit as an authentication failure.
pub(super) async fn run(global: &GlobalArgs, args: &ProviderArgs, validate: bool) -> Result<()> {
    let provider = create_provider(global, args)?;
    let opts = token_options(args);

    info!(provider = provider.name(), cluster = %opts.cluster_name, "starting token mint");

    if validate {
        provider.validate_credentials().await?;
    }

    let token = provider.mint_token(&opts).await?;

    info!(
        provider = provider.name(),
        expires_at = %token.expires_at.to_rfc3339(),
        "token minted"
    );

    execplugin::write_token(&mut std::io::stdout(), &token)
}
