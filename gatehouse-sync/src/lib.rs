//! # gatehouse-sync
//!
//! Spreadsheet roster sync and avatar reverse sync.
//!
//! Call [`sync_roster`] to pull the sheet's member rows into the record
//! store as one atomic batch, or [`sync_avatars`] to push stored avatar
//! URLs back into the sheet's avatar column. [`plan_roster_sync`] and
//! [`render_roster_diff`] preview a roster run without writing.

pub mod avatars;
pub mod error;
pub mod plan;
pub mod roster;
pub mod sheet;

pub use avatars::{sync_avatars, AvatarSyncOutcome};
pub use error::SyncError;
pub use plan::{
    format_datetime_age, plan_roster_sync, render_roster_diff, roster_status, RosterStatus,
    SyncPlan,
};
pub use roster::{sync_roster, RosterSyncOptions, RosterSyncOutcome};
pub use sheet::{MemorySheet, RestSheet, SheetSource};
