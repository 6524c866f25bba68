use tracing_subscriber::EnvFilter;

use crate::cmd::{LogFormat, LogLevel};

/// Installs the global subscriber. Everything is pinned to stderr: stdout
/// belongs to the exec-plugin document and the emitted kubeconfig.
pub fn init(level: LogLevel, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Console => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
