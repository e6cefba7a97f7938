//! Config command.

use clap::{Args, Subcommand};
use voicegate::Config;

use super::{config_path, load_config, output_format};
use crate::output;
use crate::Cli;

/// Manage CLI configuration.
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::Show => output::print(&load_config(cli)?, output_format(cli)),
            ConfigSubcommand::Init { force } => {
                let path = config_path(cli)?;
                init_config(&path, *force)?;
                eprintln!("Wrote {}", path.display());
                Ok(())
            }
            ConfigSubcommand::Path => {
                println!("{}", config_path(cli)?.display());
                Ok(())
            }
        }
    }
}

fn init_config(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, use --force to overwrite", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::default().to_yaml_string()?)?;
    Ok(())
}
