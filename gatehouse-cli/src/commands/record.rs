//! `gatehouse record list | add | remove` — direct store edits.
//!
//! These bypass the sheet entirely. A record added here survives additive
//! roster runs but is removed by the next reconciling run unless the email
//! is also added to the sheet.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use gatehouse_core::{config, EmailKey, RecordPatch};
use gatehouse_store::{RecordStore, RestStore};
use gatehouse_sync::format_datetime_age;

#[derive(Subcommand, Debug)]
pub enum RecordCommand {
    /// List every access record in the store.
    List(ListArgs),

    /// Add (or update) a record by email.
    Add(AddArgs),

    /// Remove a record by email. Access is denied at the next check.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Email of the member; its normalized form becomes the record key.
    pub email: String,

    /// Display name for the record.
    #[arg(long)]
    pub name: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Email of the record to remove.
    pub email: String,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "email")]
    email: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "avatar")]
    avatar: String,
    #[tabled(rename = "updated")]
    updated: String,
}

pub fn run(command: RecordCommand) -> Result<()> {
    match command {
        RecordCommand::List(args) => list(args),
        RecordCommand::Add(args) => add(args),
        RecordCommand::Remove(args) => remove(args),
    }
}

fn store() -> Result<RestStore> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config = config::load_at(&home).context("no config found — run `gatehouse init` first")?;
    Ok(RestStore::new(&config.store))
}

fn list(args: ListArgs) -> Result<()> {
    let store = store()?;
    let records = store.list().context("failed to list records")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("failed to serialize records")?
        );
        return Ok(());
    }

    if records.is_empty() {
        println!("No records in the store.");
        println!("Run `gatehouse sync roster` to pull the sheet in.");
        return Ok(());
    }

    let rows: Vec<RecordRow> = records
        .iter()
        .map(|record| RecordRow {
            email: record.email.clone(),
            name: record.name.clone(),
            avatar: if record.avatar_url.is_some() { "✓" } else { "·" }.to_string(),
            updated: record
                .last_updated
                .map(format_datetime_age)
                .unwrap_or_else(|| "never".to_string()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{} record(s)", records.len());
    Ok(())
}

fn add(args: AddArgs) -> Result<()> {
    let key = EmailKey::new(&args.email);
    if key.is_empty() {
        anyhow::bail!("email must not be empty");
    }

    let store = store()?;
    let patch = RecordPatch {
        name: Some(args.name),
        email: Some(args.email.trim().to_string()),
        avatar_url: None,
        last_updated: Some(Utc::now()),
    };
    store
        .upsert(&key, &patch)
        .with_context(|| format!("failed to write record for '{}'", key.as_str()))?;

    println!("✓ upserted '{}'", key.as_str());
    Ok(())
}

fn remove(args: RemoveArgs) -> Result<()> {
    let key = EmailKey::new(&args.email);
    if key.is_empty() {
        anyhow::bail!("email must not be empty");
    }

    let store = store()?;
    let existed = store
        .delete(&key)
        .with_context(|| format!("failed to remove record for '{}'", key.as_str()))?;

    if existed {
        println!("✓ removed '{}'", key.as_str());
    } else {
        println!("no record for '{}'", key.as_str());
    }
    Ok(())
}
