//! Utility functions for CLI commands.

use std::path::PathBuf;

use voicegate::{Config, VoiceGate};

use crate::output::OutputFormat;
use crate::paths::Paths;
use crate::wav::WavDirStore;
use crate::Cli;

/// Resolves the config file path: `--config` or ~/.voicegate/config.yaml.
pub fn config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.config {
        Some(p) => Ok(PathBuf::from(p)),
        None => Ok(Paths::new()?.config_file()),
    }
}

/// Loads the configuration.
///
/// An explicit `--config` file must exist; the default file is optional
/// and built-in defaults apply when it is missing.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let path = config_path(cli)?;
    if cli.config.is_none() && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    Ok(Config::load(&path)?)
}

/// Opens the sample store: `--samples` or ~/.voicegate/samples.
pub fn open_store(cli: &Cli) -> anyhow::Result<WavDirStore> {
    let root = match &cli.samples {
        Some(p) => PathBuf::from(p),
        None => Paths::new()?.samples_dir(),
    };
    WavDirStore::open(root)
}

/// Builds the engine from the loaded configuration.
pub fn build_gate(cli: &Cli) -> anyhow::Result<VoiceGate> {
    Ok(VoiceGate::new(load_config(cli)?)?)
}

pub fn output_format(cli: &Cli) -> OutputFormat {
    OutputFormat::from_json_flag(cli.json)
}
