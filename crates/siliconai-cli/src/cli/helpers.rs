use super::CliError;
use anyhow::Context;
use serde::Serialize;
use siliconai_core::config::ValidatorConfig;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the `--debug` default.
pub(super) fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // a subscriber may already be installed when running in-process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub(super) fn load_config(path: &Path) -> Result<ValidatorConfig, CliError> {
    let config = ValidatorConfig::from_path(path)?;
    debug!(config = %path.display(), output_path = %config.output_path.display(), "configuration loaded");
    Ok(config)
}

pub(super) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render summary")?;
    println!("{}", rendered);
    Ok(())
}
