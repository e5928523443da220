//! `gatehouse init [--force]`

use anyhow::{Context, Result};
use clap::Args;

use gatehouse_core::config;

/// Scaffold `~/.gatehouse/config.yaml` with defaults.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config with the defaults.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;

        let (config, created) =
            config::init_at(&home, self.force).context("failed to write config")?;
        let path = config::config_path_at(&home);

        if created {
            println!("✓ Wrote {}", path.display());
            println!("  Edit it to point at your sheet and store:");
            println!("    sheet.spreadsheet_id   (currently '{}')", config.sheet.spreadsheet_id);
            println!("    sheet.base_url         (currently '{}')", config.sheet.base_url);
            println!("    store.base_url         (currently '{}')", config.store.base_url);
        } else {
            println!("Config already exists: {}", path.display());
            println!("Use --force to overwrite it with the defaults.");
        }
        Ok(())
    }
}
