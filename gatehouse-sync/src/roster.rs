//! Roster sync: spreadsheet -> record store.
//!
//! One batch per run. Every parsed member becomes a merge-upsert carrying
//! name, email, and the run timestamp; patches never carry an avatar field,
//! so stored avatars survive every run. With `reconcile_deletes` the same
//! batch also deletes records whose email no longer appears in the sheet —
//! deletion is never an implicit side effect of the additive run.

use std::collections::BTreeSet;

use chrono::Utc;

use gatehouse_core::{EmailKey, RecordPatch, WriteOp};
use gatehouse_store::RecordStore;

use crate::error::SyncError;
use crate::sheet::{self, RosterMember, SheetSource};

// ---------------------------------------------------------------------------
// Options and outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSyncOptions {
    /// Delete records absent from the sheet, in the same commit.
    pub reconcile_deletes: bool,
    /// Plan the batch but write nothing.
    pub dry_run: bool,
}

/// Outcome of one roster run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSyncOutcome {
    /// Rows that parsed into members and were upserted.
    pub processed: usize,
    /// Records removed by reconciliation (always 0 on additive runs).
    pub deleted: usize,
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// sync_roster
// ---------------------------------------------------------------------------

/// Run one roster sync.
///
/// A sheet read failure aborts the run before any write. The batch commits
/// atomically: a commit failure leaves the store exactly as it was.
pub fn sync_roster(
    store: &dyn RecordStore,
    sheet: &dyn SheetSource,
    tab: &str,
    opts: &RosterSyncOptions,
) -> Result<RosterSyncOutcome, SyncError> {
    let run_started_at = Utc::now();

    let rows = sheet.read_rows(&sheet::data_range(tab))?;
    let members: Vec<RosterMember> = rows.iter().filter_map(sheet::member_from_row).collect();
    tracing::debug!(
        "roster sheet: {} rows, {} with an email",
        rows.len(),
        members.len()
    );

    let mut batch: Vec<WriteOp> = Vec::new();

    if opts.reconcile_deletes {
        let sheet_keys: BTreeSet<&EmailKey> = members.iter().map(|m| &m.key).collect();
        for record in store.list()? {
            if !sheet_keys.contains(&record.key) {
                batch.push(WriteOp::Delete { key: record.key });
            }
        }
    }
    let deleted = batch.len();

    for member in &members {
        batch.push(WriteOp::Upsert {
            key: member.key.clone(),
            patch: RecordPatch {
                name: Some(member.name.clone()),
                email: Some(member.email.clone()),
                last_updated: Some(run_started_at),
                ..Default::default()
            },
        });
    }
    let processed = members.len();

    if opts.dry_run {
        tracing::info!(
            "[dry-run] roster sync would upsert {processed} member(s), delete {deleted}"
        );
        return Ok(RosterSyncOutcome {
            processed,
            deleted,
            dry_run: true,
        });
    }

    store.commit(&batch)?;
    tracing::info!("roster sync committed {processed} upsert(s), {deleted} delete(s)");
    Ok(RosterSyncOutcome {
        processed,
        deleted,
        dry_run: false,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
