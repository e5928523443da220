//! Spreadsheet source: row parsing, A1 range helpers, and transports.
//!
//! # Column contract
//!
//! The roster tab is literal and fixed:
//!
//! ```text
//! row 1:  header
//! col A:  member name      (read by roster sync)
//! col B:  email            (read by roster sync and avatar sync)
//! col C:  avatar URL       (written by avatar sync only)
//! ```
//!
//! Name precedes email. Transports may omit trailing empty cells, so all row
//! access goes through `row.get(i)`.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gatehouse_core::config::SheetConfig;
use gatehouse_core::{EmailKey, DEFAULT_MEMBER_NAME};

use crate::error::{sheet_decode_err, sheet_transport_err, SyncError};

/// One spreadsheet row as the transport delivered it. Trailing empty cells
/// may be missing entirely.
pub type SheetRow = Vec<String>;

/// First 1-based sheet row that holds data (row 1 is the header).
pub const FIRST_DATA_ROW: u32 = 2;

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

/// A roster row that parsed into an actual member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterMember {
    pub key: EmailKey,
    pub name: String,
    /// Email as written in the sheet (trimmed, original casing).
    pub email: String,
}

/// Parse one data row. Returns `None` when the email cell is missing or
/// blank — such rows are skipped, never an error. A blank name falls back to
/// [`DEFAULT_MEMBER_NAME`].
pub fn member_from_row(row: &SheetRow) -> Option<RosterMember> {
    let email = row.get(1).map(|s| s.trim()).unwrap_or("");
    if email.is_empty() {
        return None;
    }
    let name = row.get(0).map(|s| s.trim()).unwrap_or("");
    let name = if name.is_empty() {
        DEFAULT_MEMBER_NAME.to_string()
    } else {
        name.to_string()
    };
    Some(RosterMember {
        key: EmailKey::new(email),
        name,
        email: email.to_string(),
    })
}

// ---------------------------------------------------------------------------
// A1 ranges
// ---------------------------------------------------------------------------

/// `{tab}!A2:B` — the name/email data block.
pub fn data_range(tab: &str) -> String {
    format!("{tab}!A2:B")
}

/// `{tab}!B2:B` — the email column only.
pub fn email_range(tab: &str) -> String {
    format!("{tab}!B2:B")
}

/// `{tab}!C{row}` — the avatar cell for a 1-based sheet row.
pub fn avatar_cell(tab: &str, row: u32) -> String {
    format!("{tab}!C{row}")
}

/// A single-cell write staged for a batch update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellWrite {
    pub range: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// SheetSource trait
// ---------------------------------------------------------------------------

/// Read/write access to the roster spreadsheet.
///
/// Implementations are blocking; async callers wrap calls in
/// `tokio::task::spawn_blocking`. `write_cells` applies the whole set
/// atomically on the transport side.
pub trait SheetSource: Send + Sync {
    fn read_rows(&self, range: &str) -> Result<Vec<SheetRow>, SyncError>;
    fn write_cells(&self, writes: &[CellWrite]) -> Result<(), SyncError>;
}

// ---------------------------------------------------------------------------
// REST transport (values API)
// ---------------------------------------------------------------------------

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Values-API client:
///
/// ```text
/// GET  {base}/{spreadsheet_id}/values/{range}       -> {"values": [[..], ..]}
/// POST {base}/{spreadsheet_id}/values:batchUpdate   -> applies all ranges
/// ```
pub struct RestSheet {
    agent: ureq::Agent,
    base_url: String,
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    // An entirely empty range comes back with no `values` field at all.
    #[serde(default)]
    values: Vec<SheetRow>,
}

impl RestSheet {
    pub fn new(config: &SheetConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(REQUEST_TIMEOUT)
            .timeout_write(REQUEST_TIMEOUT)
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/{}/values/{}", self.base_url, self.spreadsheet_id, range)
    }

    fn batch_update_url(&self) -> String {
        format!("{}/{}/values:batchUpdate", self.base_url, self.spreadsheet_id)
    }

    fn batch_update_body(writes: &[CellWrite]) -> serde_json::Value {
        let data: Vec<serde_json::Value> = writes
            .iter()
            .map(|w| {
                serde_json::json!({
                    "range": w.range,
                    "values": [[w.value]],
                })
            })
            .collect();
        serde_json::json!({
            "valueInputOption": "RAW",
            "data": data,
        })
    }
}

impl SheetSource for RestSheet {
    fn read_rows(&self, range: &str) -> Result<Vec<SheetRow>, SyncError> {
        match self.agent.get(&self.values_url(range)).call() {
            Ok(resp) => {
                let values = resp
                    .into_json::<ValuesResponse>()
                    .map_err(|e| sheet_decode_err(e.to_string()))?;
                Ok(values.values)
            }
            Err(ureq::Error::Status(code, resp)) => Err(SyncError::SheetHttp {
                status: code,
                detail: resp.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(err)) => Err(sheet_transport_err(err.to_string())),
        }
    }

    fn write_cells(&self, writes: &[CellWrite]) -> Result<(), SyncError> {
        if writes.is_empty() {
            return Ok(());
        }
        let body = Self::batch_update_body(writes);
        match self.agent.post(&self.batch_update_url()).send_json(body) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => Err(SyncError::SheetHttp {
                status: code,
                detail: resp.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(err)) => Err(sheet_transport_err(err.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory transport
// ---------------------------------------------------------------------------

/// In-memory sheet backing the test suite and local dry runs.
///
/// Holds data rows starting at sheet row 2 in `[name, email, avatar]` layout.
/// Reads slice the requested column span and mimic the values API by
/// trimming trailing empty cells and rows; writes are parsed back into the
/// grid and recorded batch-by-batch.
#[derive(Debug, Default)]
pub struct MemorySheet {
    rows: RwLock<Vec<SheetRow>>,
    batches: RwLock<Vec<Vec<CellWrite>>>,
}

impl MemorySheet {
    pub fn new(rows: Vec<SheetRow>) -> Self {
        Self {
            rows: RwLock::new(rows),
            batches: RwLock::new(Vec::new()),
        }
    }

    /// Current grid contents (data rows, starting at sheet row 2).
    pub fn rows(&self) -> Vec<SheetRow> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Every `write_cells` batch applied so far, in order.
    pub fn batches(&self) -> Vec<Vec<CellWrite>> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Value at a 1-based sheet row and 0-based column, if present.
    pub fn cell(&self, sheet_row: u32, col: usize) -> Option<String> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let index = sheet_row.checked_sub(FIRST_DATA_ROW)? as usize;
        rows.get(index).and_then(|r| r.get(col)).cloned()
    }
}

/// Column letters to 0-based index (`A` -> 0, `C` -> 2).
fn column_index(letters: &str) -> usize {
    letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c as usize - 'A' as usize + 1))
        .saturating_sub(1)
}

/// Parse `Tab!C5` into (0-based column, 1-based row).
fn parse_cell_ref(range: &str) -> Option<(usize, u32)> {
    let cell = range.split('!').nth(1)?;
    let letters: String = cell.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits: String = cell.chars().skip_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() || digits.is_empty() {
        return None;
    }
    Some((column_index(&letters), digits.parse().ok()?))
}

/// Parse `Tab!A2:B` into (start column, end column), both 0-based inclusive.
fn parse_column_span(range: &str) -> Option<(usize, usize)> {
    let cells = range.split('!').nth(1)?;
    let (start, end) = cells.split_once(':')?;
    let start_letters: String = start.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let end_letters: String = end.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if start_letters.is_empty() || end_letters.is_empty() {
        return None;
    }
    Some((column_index(&start_letters), column_index(&end_letters)))
}

impl SheetSource for MemorySheet {
    fn read_rows(&self, range: &str) -> Result<Vec<SheetRow>, SyncError> {
        let Some((start_col, end_col)) = parse_column_span(range) else {
            return Err(sheet_decode_err(format!("unsupported range: {range}")));
        };
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<SheetRow> = rows
            .iter()
            .map(|row| {
                let mut cells: SheetRow = (start_col..=end_col)
                    .map(|i| row.get(i).cloned().unwrap_or_default())
                    .collect();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    fn write_cells(&self, writes: &[CellWrite]) -> Result<(), SyncError> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        for write in writes {
            let Some((col, sheet_row)) = parse_cell_ref(&write.range) else {
                return Err(sheet_decode_err(format!("unsupported range: {}", write.range)));
            };
            let Some(index) = sheet_row.checked_sub(FIRST_DATA_ROW) else {
                return Err(sheet_decode_err(format!("row out of range: {}", write.range)));
            };
            let index = index as usize;
            if rows.len() <= index {
                rows.resize(index + 1, Vec::new());
            }
            if rows[index].len() <= col {
                rows[index].resize(col + 1, String::new());
            }
            rows[index][col] = write.value.clone();
        }
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(writes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
