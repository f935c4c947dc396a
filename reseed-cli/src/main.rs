//! Reseed CLI - Command line interface for reseed
//!
//! Migrates a repository (or one of its subdirectories) to a new remote as a
//! single fresh commit. Parameters arrive as JSON on stdin or in a file; the
//! result is printed as JSON on stdout. Logs go to stderr.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use reseed_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::MigrateArgs;

/// Reseed: publish a repository or subtree as a fresh single-commit history
#[derive(Parser, Debug)]
#[command(name = "reseed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to git executable (overrides config and env)
    #[arg(long, global = true, env = "RESEED_GIT_PATH")]
    git_path: Option<String>,

    #[command(flatten)]
    migrate: MigrateArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout is reserved for the JSON result
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Load configuration with overrides
    let config = match Config::load_with_overrides(cli.git_path.clone(), cli.migrate.sync_before_push)
    {
        Ok(config) => config,
        Err(e) => return commands::migrate::boundary_failure(&e),
    };

    if cli.verbose {
        tracing::debug!(
            git = %config.git.program,
            sync_before_push = config.migration.sync_before_push,
            config_file = ?Config::default_config_path(),
            "Configuration loaded"
        );
    }

    cli.migrate.execute(&config)
}
