//! `gatehouse status` — store-versus-sheet visibility.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use gatehouse_core::config;
use gatehouse_store::RestStore;
use gatehouse_sync::{format_datetime_age, roster_status, RestSheet, RosterStatus};

/// Arguments for `gatehouse status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config =
            config::load_at(&home).context("no config found — run `gatehouse init` first")?;

        let store = RestStore::new(&config.store);
        let sheet = RestSheet::new(&config.sheet);
        let status = roster_status(&store, &sheet, &config.sheet.tab)
            .context("status check failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&status)
                    .context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_report(&config.sheet.tab, &status);
        Ok(())
    }
}

fn print_report(tab: &str, status: &RosterStatus) {
    println!(
        "Gatehouse v{} | {} records ({} with avatars) | sheet '{}': {} members",
        env!("CARGO_PKG_VERSION"),
        status.records,
        status.with_avatar,
        tab,
        status.sheet_members,
    );

    let last_update = match status.newest_update {
        Some(timestamp) => format!("{} ago", format_datetime_age(timestamp)),
        None => "never".to_string(),
    };
    println!("Last roster update: {last_update}");

    let pending = status.pending_creates + status.pending_updates + status.pending_deletes;
    if pending == 0 {
        println!("{} store matches the sheet", "✓".green().bold());
        return;
    }

    println!(
        "{} pending: {} to create, {} to update, {} to delete",
        "~".yellow().bold(),
        status.pending_creates,
        status.pending_updates,
        status.pending_deletes,
    );
    if status.pending_deletes > 0 {
        println!("Deletes apply only on a reconciling run (`gatehouse sync roster --reconcile`).");
    } else {
        println!("Run `gatehouse sync roster` to apply.");
    }
}
