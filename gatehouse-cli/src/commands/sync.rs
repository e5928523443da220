//! `gatehouse sync roster` and `gatehouse sync avatars`.
//!
//! Plain runs are handed to the daemon when one is listening, so that job
//! history stays in one place and concurrent triggers serialize on its
//! queues. Runs with call-specific flags (`--dry-run`, `--reconcile`) always
//! execute in-process.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use gatehouse_core::config;
use gatehouse_daemon::{request_sync_avatars, request_sync_roster, DaemonError};
use gatehouse_store::RestStore;
use gatehouse_sync::{
    sync_avatars, sync_roster, AvatarSyncOutcome, RestSheet, RosterSyncOptions, RosterSyncOutcome,
};

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
    /// Pull the sheet's member rows into the record store.
    Roster(RosterArgs),
    /// Push stored avatar URLs back into the sheet's avatar column.
    Avatars(AvatarsArgs),
}

#[derive(Args, Debug)]
pub struct RosterArgs {
    /// Also delete records whose email no longer appears in the sheet.
    #[arg(long)]
    pub reconcile: bool,

    /// Show what would change without writing to the store.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct AvatarsArgs {
    /// Count the cell writes without sending them to the sheet.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(command: SyncCommand) -> Result<()> {
    match command {
        SyncCommand::Roster(args) => run_roster(args),
        SyncCommand::Avatars(args) => run_avatars(args),
    }
}

fn run_roster(args: RosterArgs) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config = config::load_at(&home).context("no config found — run `gatehouse init` first")?;

    if !args.dry_run && !args.reconcile {
        match request_sync_roster(&home) {
            Ok(report) => {
                println!(
                    "✓ roster synced via daemon ({} upserted, {} deleted)",
                    report["processed"].as_u64().unwrap_or(0),
                    report["deleted"].as_u64().unwrap_or(0),
                );
                return Ok(());
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {}
            Err(err) => return Err(err).context("daemon roster sync failed"),
        }
    }

    let store = RestStore::new(&config.store);
    let sheet = RestSheet::new(&config.sheet);
    let options = RosterSyncOptions {
        reconcile_deletes: args.reconcile || config.sync.reconcile_deletes,
        dry_run: args.dry_run,
    };

    let outcome = sync_roster(&store, &sheet, &config.sheet.tab, &options)
        .context("roster sync failed")?;
    print_roster(&outcome);
    Ok(())
}

fn run_avatars(args: AvatarsArgs) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config = config::load_at(&home).context("no config found — run `gatehouse init` first")?;

    if !args.dry_run {
        match request_sync_avatars(&home) {
            Ok(report) => {
                println!(
                    "✓ avatars synced via daemon ({} updated, {} skipped)",
                    report["updated"].as_u64().unwrap_or(0),
                    report["skipped"].as_u64().unwrap_or(0),
                );
                return Ok(());
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {}
            Err(err) => return Err(err).context("daemon avatar sync failed"),
        }
    }

    let store = RestStore::new(&config.store);
    let sheet = RestSheet::new(&config.sheet);

    let outcome = sync_avatars(&store, &sheet, &config.sheet.tab, args.dry_run)
        .context("avatar sync failed")?;
    print_avatars(&outcome);
    Ok(())
}

fn print_roster(outcome: &RosterSyncOutcome) {
    if outcome.dry_run {
        println!(
            "[dry-run] ~ roster sync would upsert {}, delete {}",
            outcome.processed, outcome.deleted
        );
        return;
    }
    println!(
        "✓ roster synced ({} upserted, {} deleted)",
        outcome.processed, outcome.deleted
    );
}

fn print_avatars(outcome: &AvatarSyncOutcome) {
    if outcome.dry_run {
        println!(
            "[dry-run] ~ avatar sync would update {}, skip {}",
            outcome.updated, outcome.skipped
        );
        return;
    }
    println!(
        "✓ avatars synced ({} updated, {} skipped)",
        outcome.updated, outcome.skipped
    );
}
