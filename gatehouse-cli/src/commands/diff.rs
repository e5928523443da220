//! `gatehouse diff` — unified diff of what a roster sync would change.

use anyhow::{Context, Result};
use clap::Args;

use gatehouse_core::config;
use gatehouse_store::RestStore;
use gatehouse_sync::{render_roster_diff, RestSheet};

/// Arguments for `gatehouse diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Preview a reconciling run (deletes included) regardless of config.
    #[arg(long)]
    pub reconcile: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config =
            config::load_at(&home).context("no config found — run `gatehouse init` first")?;

        let store = RestStore::new(&config.store);
        let sheet = RestSheet::new(&config.sheet);
        let reconcile = self.reconcile || config.sync.reconcile_deletes;

        let diff = render_roster_diff(&store, &sheet, &config.sheet.tab, reconcile)
            .context("diff failed")?;

        if diff.is_empty() {
            println!("No differences. The store matches the sheet.");
            return Ok(());
        }

        print!("{diff}");
        if !diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
