// crates/secret-store-cli/src/main.rs
// ============================================================================
// Module: Secret Store CLI Entry Point
// Description: Command dispatcher for schema migrations and config checks.
// Purpose: Provide the `secret-store` binary.
// Dependencies: clap, secret-store-cli, secret-store-config, serde_json
// ============================================================================

//! ## Overview
//! `secret-store migrate {upgrade,downgrade,current,history}` and
//! `secret-store config validate`. Results print as JSON on stdout; failures
//! print on stderr and exit non-zero. Service failures also print their
//! structured error report.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use secret_store_cli::CliError;
use secret_store_cli::migrate_current;
use secret_store_cli::migrate_downgrade;
use secret_store_cli::migrate_history;
use secret_store_cli::migrate_upgrade;
use secret_store_cli::validate_config;
use secret_store_config::SecretStoreConfig;
use serde::Serialize;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "secret-store", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to secret-store.toml or `SECRET_STORE_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Schema migration utilities.
    Migrate {
        /// Selected migrate subcommand.
        #[command(subcommand)]
        command: MigrateCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Migration subcommands.
#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply steps up to a revision.
    Upgrade {
        /// Target revision or `head` (defaults to `migration.target`).
        #[arg(long, value_name = "REVISION")]
        to: Option<String>,
    },
    /// Revert steps down to a revision.
    Downgrade {
        /// Target revision or `base`.
        #[arg(long, value_name = "REVISION")]
        to: String,
    },
    /// Show the applied revision.
    Current,
    /// List the migration chain.
    History,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the config file.
    Validate,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => emit_error(&err),
    }
}

/// Loads configuration and dispatches the command.
fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = SecretStoreConfig::load(cli.config.as_deref())?;
    config.apply_process_settings();
    match cli.command {
        Commands::Migrate {
            command,
        } => match command {
            MigrateCommand::Upgrade {
                to,
            } => write_json(&migrate_upgrade(&config, to.as_deref())?),
            MigrateCommand::Downgrade {
                to,
            } => write_json(&migrate_downgrade(&config, &to)?),
            MigrateCommand::Current => write_json(&migrate_current(&config)?),
            MigrateCommand::History => write_json(&migrate_history(&config)?),
        },
        Commands::Config {
            command: ConfigCommand::Validate,
        } => write_json(&validate_config(&config)),
    }
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a value as pretty JSON on stdout.
fn write_json<T: Serialize>(value: &T) -> Result<ExitCode, CliError> {
    let Ok(text) = serde_json::to_string_pretty(value) else {
        return Ok(emit_message("failed to serialize command output"));
    };
    if write_stdout_line(&text).is_err() {
        return Ok(emit_message("failed to write to stdout"));
    }
    Ok(ExitCode::SUCCESS)
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits a command failure to stderr and returns a failure exit code.
fn emit_error(err: &CliError) -> ExitCode {
    let _ = write_stderr_line(&format!("error: {err}"));
    if let Some(report) = err.report()
        && let Ok(text) = serde_json::to_string(&report)
    {
        let _ = write_stderr_line(&text);
    }
    ExitCode::FAILURE
}

/// Emits a plain message to stderr and returns a failure exit code.
fn emit_message(message: &str) -> ExitCode {
    let _ = write_stderr_line(&format!("error: {message}"));
    ExitCode::FAILURE
}
