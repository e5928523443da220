//! Gatehouse — whitelist access management CLI.
//!
//! # Usage
//!
//! ```text
//! gatehouse init [--force]
//! gatehouse sync roster [--reconcile] [--dry-run]
//! gatehouse sync avatars [--dry-run]
//! gatehouse diff [--reconcile]
//! gatehouse status [--json]
//! gatehouse record list [--json]
//! gatehouse record add <email> --name <name>
//! gatehouse record remove <email>
//! gatehouse resolve --bearer <token> [--email <email>] [--json]
//! gatehouse avatar set --bearer <token> --url <url>
//! gatehouse daemon start|stop|status|install|uninstall|logs
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    avatar::AvatarCommand, daemon::DaemonCommand, diff::DiffArgs, init::InitArgs,
    record::RecordCommand, resolve::ResolveArgs, status::StatusArgs, sync::SyncCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "gatehouse",
    version,
    about = "Manage the whitelist roster, avatars, and authorization checks",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold ~/.gatehouse/config.yaml with defaults.
    Init(InitArgs),

    /// Pull the sheet roster into the store, or push avatars back out.
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },

    /// Show what a roster sync would change, as a unified diff.
    Diff(DiffArgs),

    /// Summarize the record store against the sheet.
    Status(StatusArgs),

    /// Inspect and edit access records directly.
    Record {
        #[command(subcommand)]
        command: RecordCommand,
    },

    /// Run an authorization check for one identity.
    Resolve(ResolveArgs),

    /// Manage the calling member's avatar.
    Avatar {
        #[command(subcommand)]
        command: AvatarCommand,
    },

    /// Manage the Gatehouse background daemon and launchd integration.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync { command } => commands::sync::run(command),
        Commands::Diff(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Record { command } => commands::record::run(command),
        Commands::Resolve(args) => args.run(),
        Commands::Avatar { command } => commands::avatar::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
