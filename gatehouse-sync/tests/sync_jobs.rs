//! End-to-end runs of both sync directions against in-memory transports.

use chrono::Utc;

use gatehouse_core::EmailKey;
use gatehouse_store::{MemoryStore, RecordStore};
use gatehouse_sync::{
    plan_roster_sync, render_roster_diff, roster_status, sheet::SheetRow, sync_avatars,
    sync_roster, MemorySheet, RosterSyncOptions,
};

fn row(cells: &[&str]) -> SheetRow {
    cells.iter().map(|c| c.to_string()).collect()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn roster_row_becomes_a_store_record() {
    init_logging();
    let store = MemoryStore::new();
    let sheet = MemorySheet::new(vec![row(&["Ada Lovelace", "ada@co.com"])]);

    sync_roster(&store, &sheet, "Employees", &RosterSyncOptions::default()).expect("sync");

    let ada = store
        .get(&EmailKey::from("ada@co.com"))
        .expect("get")
        .expect("record");
    assert_eq!(ada.key.as_str(), "ada@co.com");
    assert_eq!(ada.name, "Ada Lovelace");
    assert_eq!(ada.email, "ada@co.com");
    assert!(ada.avatar_url.is_none(), "roster sync never touches avatars");
}

#[test]
fn full_cycle_roster_then_avatar_reverse_sync() {
    init_logging();
    let store = MemoryStore::new();
    let sheet = MemorySheet::new(vec![
        row(&["Ada Lovelace", "ada@co.com"]),
        row(&["Grace Hopper", "grace@navy.mil"]),
    ]);

    sync_roster(&store, &sheet, "Employees", &RosterSyncOptions::default()).expect("roster");

    // A member uploads an avatar between the two jobs.
    store
        .set_avatar(&EmailKey::from("ada@co.com"), "https://img/ada.png")
        .expect("set avatar");

    let outcome = sync_avatars(&store, &sheet, "Employees", false).expect("avatars");
    assert_eq!(outcome.updated, 2);

    assert_eq!(sheet.cell(2, 2).as_deref(), Some("https://img/ada.png"));
    assert_eq!(sheet.cell(3, 2).as_deref(), Some(""), "no avatar clears the cell");
}

#[test]
fn avatar_survives_repeated_roster_runs() {
    init_logging();
    let store = MemoryStore::new();
    let sheet = MemorySheet::new(vec![row(&["Ada Lovelace", "ada@co.com"])]);
    let key = EmailKey::from("ada@co.com");

    sync_roster(&store, &sheet, "Employees", &RosterSyncOptions::default()).expect("first");
    store.set_avatar(&key, "https://img/ada.png").expect("set avatar");

    for _ in 0..3 {
        sync_roster(&store, &sheet, "Employees", &RosterSyncOptions::default()).expect("rerun");
    }

    let ada = store.get(&key).expect("get").expect("record");
    assert_eq!(ada.avatar_url.as_deref(), Some("https://img/ada.png"));
}

#[test]
fn reconciling_run_converges_to_the_sheet() {
    init_logging();
    let store = MemoryStore::new();
    let before = MemorySheet::new(vec![
        row(&["Ada Lovelace", "ada@co.com"]),
        row(&["Leaver", "leaver@co.com"]),
    ]);
    sync_roster(&store, &before, "Employees", &RosterSyncOptions::default()).expect("seed");

    // Leaver's row disappears from the sheet.
    let after = MemorySheet::new(vec![row(&["Ada Lovelace", "ada@co.com"])]);

    let status = roster_status(&store, &after, "Employees").expect("status");
    assert_eq!(status.pending_deletes, 1, "drift visible before the run");

    let opts = RosterSyncOptions { reconcile_deletes: true, dry_run: false };
    let outcome = sync_roster(&store, &after, "Employees", &opts).expect("reconcile");
    assert_eq!(outcome.deleted, 1);

    assert!(store.get(&EmailKey::from("leaver@co.com")).expect("get").is_none());
    let plan = plan_roster_sync(&store, &after, "Employees", true).expect("plan");
    assert!(plan.is_noop(), "converged roster plans as a no-op");
}

#[test]
fn dry_run_diff_matches_the_eventual_run() {
    init_logging();
    let store = MemoryStore::new();
    let sheet = MemorySheet::new(vec![row(&["Ada Lovelace", "ada@co.com"])]);

    let preview = render_roster_diff(&store, &sheet, "Employees", false).expect("preview");
    assert!(preview.contains("+ada@co.com\tAda Lovelace"));

    sync_roster(&store, &sheet, "Employees", &RosterSyncOptions::default()).expect("sync");

    let settled = render_roster_diff(&store, &sheet, "Employees", false).expect("settled");
    assert!(settled.is_empty(), "post-run diff must be empty, got:\n{settled}");
}

#[test]
fn status_reflects_a_freshly_synced_roster() {
    init_logging();
    let store = MemoryStore::new();
    let sheet = MemorySheet::new(vec![
        row(&["Ada Lovelace", "ada@co.com"]),
        row(&["Grace Hopper", "grace@navy.mil"]),
    ]);
    sync_roster(&store, &sheet, "Employees", &RosterSyncOptions::default()).expect("sync");
    store
        .set_avatar(&EmailKey::from("ada@co.com"), "https://img/ada.png")
        .expect("avatar");

    let status = roster_status(&store, &sheet, "Employees").expect("status");
    assert_eq!(status.records, 2);
    assert_eq!(status.with_avatar, 1);
    assert_eq!(status.sheet_members, 2);
    assert_eq!(status.pending_creates, 0);
    assert_eq!(status.pending_updates, 0);
    assert_eq!(status.pending_deletes, 0);

    let stamp = status.newest_update.expect("stamp");
    assert!(Utc::now().signed_duration_since(stamp).num_seconds() < 60);
}
