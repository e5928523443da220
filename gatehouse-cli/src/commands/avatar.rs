//! `gatehouse avatar set` — update the calling member's avatar URL.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use gatehouse_auth::{update_avatar, IdentityVerifier, StaticTokenVerifier};
use gatehouse_core::config;
use gatehouse_daemon::{request_set_avatar, DaemonError};
use gatehouse_store::RestStore;

#[derive(Subcommand, Debug)]
pub enum AvatarCommand {
    /// Set the avatar URL on the caller's own record.
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Bearer token identifying the caller.
    #[arg(long)]
    pub bearer: String,

    /// The new avatar URL.
    #[arg(long)]
    pub url: String,
}

pub fn run(command: AvatarCommand) -> Result<()> {
    match command {
        AvatarCommand::Set(args) => set(args),
    }
}

fn set(args: SetArgs) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config = config::load_at(&home).context("no config found — run `gatehouse init` first")?;

    match request_set_avatar(&home, &args.bearer, &args.url) {
        Ok(update) => {
            println!(
                "✓ avatar updated to {}",
                update["avatar_url"].as_str().unwrap_or(&args.url)
            );
            return Ok(());
        }
        Err(DaemonError::DaemonNotRunning { .. }) => {}
        Err(err) => return Err(err).context("daemon avatar update failed"),
    }

    let identity = StaticTokenVerifier::from_config(&config).verify(&args.bearer);
    let store = RestStore::new(&config.store);
    let update = update_avatar(&store, identity.as_ref(), &args.url)
        .context("avatar update refused")?;

    println!("✓ avatar updated to {}", update.avatar_url);
    Ok(())
}
