//! Roster planning, dry-run diff rendering, and status counts.
//!
//! Everything here is read-only: the plan says what a roster run would
//! change, the diff renders that as unified text, and the status summarizes
//! both sides for `gatehouse status`. Comparison is field-level on name and
//! email; `last_updated` is refreshed by every run and would turn every
//! record into a permanent "update" if it participated.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use similar::TextDiff;

use gatehouse_core::{AccessRecord, EmailKey};
use gatehouse_store::RecordStore;

use crate::error::SyncError;
use crate::sheet::{self, RosterMember, SheetRow, SheetSource};

// ---------------------------------------------------------------------------
// 1. Plan
// ---------------------------------------------------------------------------

/// What one roster run would change, computed without writing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Sheet members with no stored record yet.
    pub creates: Vec<RosterMember>,
    /// Sheet members whose stored name or email differs.
    pub updates: Vec<RosterMember>,
    /// Stored records absent from the sheet (empty unless reconciling).
    pub deletes: Vec<EmailKey>,
    /// Members already stored with matching fields.
    pub unchanged: usize,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Collapse sheet rows into a keyed member map; a later row with the same
/// email overwrites an earlier one, matching batch order in the live run.
fn member_map(rows: &[SheetRow]) -> BTreeMap<EmailKey, RosterMember> {
    rows.iter()
        .filter_map(sheet::member_from_row)
        .map(|m| (m.key.clone(), m))
        .collect()
}

fn record_map(records: Vec<AccessRecord>) -> BTreeMap<EmailKey, AccessRecord> {
    records.into_iter().map(|r| (r.key.clone(), r)).collect()
}

fn plan_from(
    existing: &BTreeMap<EmailKey, AccessRecord>,
    members: &BTreeMap<EmailKey, RosterMember>,
    reconcile_deletes: bool,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    for (key, member) in members {
        match existing.get(key) {
            None => plan.creates.push(member.clone()),
            Some(record) if record.name != member.name || record.email != member.email => {
                plan.updates.push(member.clone());
            }
            Some(_) => plan.unchanged += 1,
        }
    }
    if reconcile_deletes {
        plan.deletes = existing
            .keys()
            .filter(|key| !members.contains_key(*key))
            .cloned()
            .collect();
    }
    plan
}

/// Compute what a roster run with these options would do. No writes.
pub fn plan_roster_sync(
    store: &dyn RecordStore,
    sheet: &dyn SheetSource,
    tab: &str,
    reconcile_deletes: bool,
) -> Result<SyncPlan, SyncError> {
    let rows = sheet.read_rows(&sheet::data_range(tab))?;
    let members = member_map(&rows);
    let existing = record_map(store.list()?);
    Ok(plan_from(&existing, &members, reconcile_deletes))
}

// ---------------------------------------------------------------------------
// 2. Diff rendering
// ---------------------------------------------------------------------------

fn member_line(record: &AccessRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\n",
        record.key,
        record.name,
        record.email,
        record.avatar_url.as_deref().unwrap_or("-"),
    )
}

fn roster_view(records: &BTreeMap<EmailKey, AccessRecord>) -> String {
    records.values().map(member_line).collect()
}

/// Project the post-sync roster: members land with refreshed name and email,
/// stored avatars survive, and reconciliation drops absent records.
fn projected_view(
    existing: &BTreeMap<EmailKey, AccessRecord>,
    members: &BTreeMap<EmailKey, RosterMember>,
    reconcile_deletes: bool,
) -> BTreeMap<EmailKey, AccessRecord> {
    let mut projected: BTreeMap<EmailKey, AccessRecord> = existing
        .iter()
        .filter(|(key, _)| !reconcile_deletes || members.contains_key(*key))
        .map(|(key, record)| (key.clone(), record.clone()))
        .collect();
    for (key, member) in members {
        let entry = projected.entry(key.clone()).or_insert_with(|| AccessRecord {
            key: key.clone(),
            name: String::new(),
            email: String::new(),
            avatar_url: None,
            last_updated: None,
        });
        entry.name = member.name.clone();
        entry.email = member.email.clone();
    }
    projected
}

/// Render what a roster run would change as a unified diff over the member
/// view, one `key\tname\temail\tavatar` line per record, sorted by key.
///
/// Returns an empty string when the run would change nothing.
pub fn render_roster_diff(
    store: &dyn RecordStore,
    sheet: &dyn SheetSource,
    tab: &str,
    reconcile_deletes: bool,
) -> Result<String, SyncError> {
    let rows = sheet.read_rows(&sheet::data_range(tab))?;
    let members = member_map(&rows);
    let existing = record_map(store.list()?);

    let current = roster_view(&existing);
    let projected = roster_view(&projected_view(&existing, &members, reconcile_deletes));
    if current == projected {
        return Ok(String::new());
    }

    let unified = TextDiff::from_lines(&current, &projected)
        .unified_diff()
        .header("a/roster", "b/roster")
        .context_radius(3)
        .to_string();
    Ok(unified)
}

// ---------------------------------------------------------------------------
// 3. Status
// ---------------------------------------------------------------------------

/// Counts for `gatehouse status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterStatus {
    /// Stored records.
    pub records: usize,
    /// Stored records carrying an avatar URL.
    pub with_avatar: usize,
    /// Sheet rows that parse into a member.
    pub sheet_members: usize,
    pub pending_creates: usize,
    pub pending_updates: usize,
    /// Records a reconciling run would delete.
    pub pending_deletes: usize,
    /// Most recent `last_updated` across the store.
    pub newest_update: Option<DateTime<Utc>>,
}

/// Summarize store and sheet for the status surfaces.
///
/// `pending_deletes` always reports reconciliation candidates so the operator
/// can see drift; only a run with `--reconcile` acts on them.
pub fn roster_status(
    store: &dyn RecordStore,
    sheet: &dyn SheetSource,
    tab: &str,
) -> Result<RosterStatus, SyncError> {
    let rows = sheet.read_rows(&sheet::data_range(tab))?;
    let members = member_map(&rows);
    let existing = record_map(store.list()?);
    let plan = plan_from(&existing, &members, true);

    Ok(RosterStatus {
        records: existing.len(),
        with_avatar: existing.values().filter(|r| r.avatar_url.is_some()).count(),
        sheet_members: members.len(),
        pending_creates: plan.creates.len(),
        pending_updates: plan.updates.len(),
        pending_deletes: plan.deletes.len(),
        newest_update: existing.values().filter_map(|r| r.last_updated).max(),
    })
}

/// Compact age for status output (`0s`, `5m`, `3h`, `2d`).
pub fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(timestamp).num_seconds().max(0) as u64;
    format_seconds(age)
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
