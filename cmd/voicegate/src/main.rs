//! Voicegate CLI - voice-activated access control from the command line.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod paths;
mod wav;

use commands::{ConfigCommand, EnrollCommand, LabelsCommand, TestCommand};

/// Voicegate CLI - enroll voice samples and test utterances.
///
/// A test grants access only when the spoken command is recognized and the
/// voice matches the enrolled owner. Exit status: 0 granted, 1 denied,
/// 2 error.
///
/// Configuration is read from ~/.voicegate/config.yaml and samples are
/// stored under ~/.voicegate/samples/ unless overridden.
#[derive(Parser)]
#[command(name = "voicegate")]
#[command(about = "Voice-activated access control")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.voicegate/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Sample directory (default is ~/.voicegate/samples)
    #[arg(long, global = true)]
    pub samples: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enroll reference recordings for a command label or the owner
    Enroll(EnrollCommand),
    /// Test a recording: recognize the command and verify the speaker
    Test(TestCommand),
    /// List enrolled labels
    Labels(LabelsCommand),
    /// Manage CLI configuration
    Config(ConfigCommand),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging; -v wins over RUST_LOG.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Enroll(cmd) => cmd.run(&cli).map(|()| ExitCode::SUCCESS),
        Commands::Test(cmd) => cmd.run(&cli),
        Commands::Labels(cmd) => cmd.run(&cli).map(|()| ExitCode::SUCCESS),
        Commands::Config(cmd) => cmd.run(&cli).map(|()| ExitCode::SUCCESS),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
