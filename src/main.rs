mod cmd;
mod commands;
mod credentials;
mod errors;
mod execplugin;
mod kubeconfig;
mod logging;
mod provider;

use clap::Parser;

use cmd::Cli;
use errors::{Error, ErrorKind};

#[tokio::main]
async fn main() {
    // Usage errors exit 2 and print to stderr; help and version print to
    // stdout and exit 0. Both are handled before logging is installed.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    logging::init(cli.global.log_level, cli.global.log_format);

    let result = tokio::select! {
        result = commands::run(&cli) => result,
        _ = shutdown_signal() => Err(Error::new(
            ErrorKind::NetworkTimeout,
            "operation cancelled by signal",
        )),
    };

    if let Err(err) = result {
        let redacted = err.redacted();
        tracing::error!(
            code = redacted.kind().code(),
            retryable = redacted.is_retryable(),
            error = %redacted,
            "command failed"
        );
        eprintln!("Error: {redacted}");
        std::process::exit(1);
    }
}

/// Resolves on SIGINT or SIGTERM. In-flight cloud calls are dropped, so the
/// process observes cancellation within one network round-trip.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
