//! Avatar reverse sync: record store -> spreadsheet.
//!
//! The inverse direction of the roster job. Each stored record is matched to
//! a sheet row by email; matched records stage one cell write into the avatar
//! column, and the whole set goes out as a single batched update. Records
//! without a sheet row are skipped silently.

use std::collections::BTreeMap;

use gatehouse_core::EmailKey;
use gatehouse_store::RecordStore;

use crate::error::SyncError;
use crate::sheet::{self, CellWrite, SheetSource, FIRST_DATA_ROW};

/// Outcome of one avatar reverse sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarSyncOutcome {
    /// Records matched to a sheet row (one cell write each).
    pub updated: usize,
    /// Records whose email had no row in the sheet.
    pub skipped: usize,
    pub dry_run: bool,
}

/// Map each email in the sheet to its 1-based sheet row.
///
/// Row numbers start at [`FIRST_DATA_ROW`] because row 1 holds the header.
/// When the same email appears twice the later row wins, matching the
/// roster direction where the later row's upsert lands last.
fn email_rows(sheet: &dyn SheetSource, tab: &str) -> Result<BTreeMap<EmailKey, u32>, SyncError> {
    let rows = sheet.read_rows(&sheet::email_range(tab))?;
    let mut map = BTreeMap::new();
    for (index, row) in rows.iter().enumerate() {
        let email = row.first().map(|c| c.trim()).unwrap_or_default();
        if email.is_empty() {
            continue;
        }
        map.insert(EmailKey::new(email), FIRST_DATA_ROW + index as u32);
    }
    Ok(map)
}

/// Run one avatar reverse sync.
///
/// Reads the sheet's email column, matches stored records against it, and
/// writes every matched record's avatar URL into the avatar column in one
/// batch. A record with no stored avatar clears its cell. Zero matches is a
/// success and performs no write at all.
pub fn sync_avatars(
    store: &dyn RecordStore,
    sheet: &dyn SheetSource,
    tab: &str,
    dry_run: bool,
) -> Result<AvatarSyncOutcome, SyncError> {
    let rows = email_rows(sheet, tab)?;
    let records = store.list()?;

    let mut writes: Vec<CellWrite> = Vec::new();
    let mut skipped = 0;
    for record in &records {
        match rows.get(&record.key) {
            Some(&row) => writes.push(CellWrite {
                range: sheet::avatar_cell(tab, row),
                value: record.avatar_url.clone().unwrap_or_default(),
            }),
            None => {
                tracing::debug!("no sheet row for {}, skipping", record.key);
                skipped += 1;
            }
        }
    }

    let updated = writes.len();
    if dry_run {
        tracing::info!("[dry-run] avatar sync would write {updated} cell(s), skip {skipped}");
        return Ok(AvatarSyncOutcome { updated, skipped, dry_run: true });
    }
    if writes.is_empty() {
        tracing::info!("avatar sync: nothing to write ({skipped} record(s) without a row)");
        return Ok(AvatarSyncOutcome { updated, skipped, dry_run: false });
    }

    sheet.write_cells(&writes)?;
    tracing::info!("avatar sync wrote {updated} cell(s), skipped {skipped}");
    Ok(AvatarSyncOutcome { updated, skipped, dry_run: false })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
