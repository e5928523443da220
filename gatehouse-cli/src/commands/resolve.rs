//! `gatehouse resolve` — run one authorization check.
//!
//! With `--email` the identity is taken from the flags as-is. Without it the
//! bearer token has to identify the caller: a running daemon answers from its
//! token map, otherwise the config's `tokens` section is consulted locally.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use gatehouse_auth::{IdentityVerifier, Resolver, StaticTokenVerifier};
use gatehouse_core::{config, VerifiedIdentity};
use gatehouse_daemon::{request_resolve, DaemonError};
use gatehouse_store::{RestFallback, RestStore};

/// Arguments for `gatehouse resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Bearer token forwarded to the fallback lookup.
    #[arg(long)]
    pub bearer: String,

    /// Email of the identity to check (skips the token map).
    #[arg(long)]
    pub email: Option<String>,

    /// Display name the identity provider reported.
    #[arg(long, requires = "email")]
    pub display_name: Option<String>,

    /// Photo URL the identity provider reported.
    #[arg(long, requires = "email")]
    pub photo_url: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ResolveArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config =
            config::load_at(&home).context("no config found — run `gatehouse init` first")?;

        let identity = match self.email.clone() {
            Some(email) => VerifiedIdentity {
                email,
                display_name: self.display_name.clone(),
                photo_url: self.photo_url.clone(),
                bearer: self.bearer.clone(),
            },
            None => match request_resolve(&home, &self.bearer) {
                Ok(resolution) => {
                    print_value(self.json, &resolution)?;
                    return Ok(());
                }
                Err(DaemonError::DaemonNotRunning { .. }) => {
                    StaticTokenVerifier::from_config(&config)
                        .verify(&self.bearer)
                        .context("bearer token is not in the config token map; pass --email")?
                }
                Err(err) => return Err(err).context("daemon resolve failed"),
            },
        };

        let store = Arc::new(RestStore::new(&config.store));
        let fallback = Arc::new(RestFallback::new(&config.resolver, &config.store.collection));
        let resolver = Resolver::with_timeout(store, fallback, config.resolver.primary_timeout());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let resolution = runtime.block_on(resolver.resolve(&identity));

        let value = serde_json::to_value(&resolution).context("failed to serialize resolution")?;
        print_value(self.json, &value)?;
        Ok(())
    }
}

fn print_value(json: bool, resolution: &Value) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(resolution).context("failed to render resolution")?
        );
        return Ok(());
    }

    if resolution["authorized"].as_bool().unwrap_or(false) {
        let profile = &resolution["profile"];
        println!(
            "{} authorized: {} <{}>",
            "✓".green().bold(),
            profile["name"].as_str().unwrap_or("?"),
            profile["email"].as_str().unwrap_or("?"),
        );
        if let Some(avatar) = profile["avatarUrl"].as_str() {
            println!("  avatar: {avatar}");
        }
    } else {
        println!("{} not authorized", "✗".red().bold());
    }
    Ok(())
}
