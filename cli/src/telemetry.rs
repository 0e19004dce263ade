//! Log output for the CLI. Logs go to stderr so command output stays pipeable.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub verbose: bool,
    pub json_logs: bool,
}

impl LogConfig {
    fn default_directive(&self) -> &'static str {
        if self.verbose {
            "orgboard_sdk=debug,ob=debug"
        } else {
            "warn"
        }
    }
}

/// `RUST_LOG` wins over `--verbose` when both are set.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json_logs {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).try_init()?;
    }

    Ok(())
}
