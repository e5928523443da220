//! Size-based rotation for the daemon's log files.
//!
//! `gatehouse.log` and `gatehouse-err.log` rotate once they pass 10 MiB,
//! keeping up to 5 numbered copies:
//!   gatehouse.log → gatehouse.log.1 → … → gatehouse.log.5

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotation threshold (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Numbered copies kept per log file.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` when it has grown past `max_bytes`.
///
/// The oldest copy (`.{max_files}`) is dropped, every other copy shifts up
/// one number, the live file becomes `.1`, and a fresh empty live file is
/// created so the process always has a writable path. A missing live file
/// is not an error; it simply means nothing to rotate yet.
///
/// Returns whether a rotation happened.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let src = rotated_path(log_path, n);
        if src.exists() {
            fs::rename(&src, rotated_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, rotated_path(log_path, 1))?;

    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;

    Ok(true)
}

/// Rotate both daemon log files under `home`.
///
/// A failure on one file is logged and does not block the other.
pub fn rotate_logs(home: &Path) {
    for log_path in [
        crate::paths::stdout_log_path(home),
        crate::paths::stderr_log_path(home),
    ] {
        match rotate_if_needed(&log_path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
            Ok(true) => tracing::info!(path = %log_path.display(), "log file rotated"),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(path = %log_path.display(), error = %err, "log rotation failed")
            }
        }
    }
}

/// Path of the `n`-th rotated copy (`gatehouse.log.2` for n = 2).
fn rotated_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(crate::paths::DAEMON_STDOUT_LOG);
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn oversized() -> Vec<u8> {
        vec![b'x'; MAX_LOG_BYTES as usize + 1]
    }

    #[test]
    fn small_and_missing_files_are_left_alone() {
        let dir = TempDir::new().expect("dir");
        let log = dir.path().join("gatehouse.log");

        assert!(!rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).expect("missing"));

        fs::write(&log, b"short").expect("write");
        assert!(!rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).expect("small"));
        assert!(!rotated_path(&log, 1).exists());
    }

    #[test]
    fn oversized_file_rotates_to_dot_one_and_resets() {
        let dir = TempDir::new().expect("dir");
        let log = dir.path().join("gatehouse.log");
        fs::write(&log, oversized()).expect("write");

        assert!(rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).expect("rotate"));

        assert_eq!(fs::metadata(&log).expect("live").len(), 0, "live log resets to empty");
        let copy = rotated_path(&log, 1);
        assert!(fs::metadata(&copy).expect("copy").len() > MAX_LOG_BYTES);
    }

    #[test]
    fn copies_shift_up_and_the_oldest_falls_off() {
        let dir = TempDir::new().expect("dir");
        let log = dir.path().join("gatehouse.log");
        for n in 1..=MAX_ROTATED_FILES {
            fs::write(rotated_path(&log, n), format!("copy-{n}")).expect("seed");
        }
        fs::write(&log, oversized()).expect("write");

        assert!(rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).expect("rotate"));

        // Former copy-1 now sits at .2, former copy-4 at .5; copy-5 is gone.
        assert_eq!(fs::read_to_string(rotated_path(&log, 2)).expect("read"), "copy-1");
        assert_eq!(
            fs::read_to_string(rotated_path(&log, MAX_ROTATED_FILES)).expect("read"),
            format!("copy-{}", MAX_ROTATED_FILES - 1),
        );
        assert!(!rotated_path(&log, MAX_ROTATED_FILES + 1).exists());
    }

    #[test]
    fn rotate_logs_handles_both_files_and_tolerates_absence() {
        let home = TempDir::new().expect("home");
        let logs = crate::paths::logs_dir(home.path());
        fs::create_dir_all(&logs).expect("logs dir");
        fs::write(crate::paths::stdout_log_path(home.path()), oversized()).expect("stdout log");
        // No stderr log on disk for this case.

        rotate_logs(home.path());

        let rotated = rotated_path(&crate::paths::stdout_log_path(home.path()), 1);
        assert!(rotated.exists(), "stdout log rotated");
        assert!(!crate::paths::stderr_log_path(home.path()).exists());
    }
}
