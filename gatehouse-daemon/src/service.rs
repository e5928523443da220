//! launchd service management for the daemon (macOS only).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{io_err, DaemonError};
use crate::paths::{
    launch_agents_dir, launchd_plist_path, logs_dir, socket_path, DAEMON_LABEL, DAEMON_STDERR_LOG,
    DAEMON_STDOUT_LOG,
};

/// Where `install` expects the release binary to live.
const INSTALLED_BINARY: &str = "/usr/local/bin/gatehouse";

/// Seconds launchd waits before reviving a crashed daemon.
const THROTTLE_SECS: u32 = 10;

/// Render the launchd plist that keeps the daemon alive across logins.
pub fn generate_plist(binary_path: &Path, log_dir: &Path) -> String {
    let binary = xml_escape(&binary_path.display().to_string());
    let stdout = xml_escape(&log_dir.join(DAEMON_STDOUT_LOG).display().to_string());
    let stderr = xml_escape(&log_dir.join(DAEMON_STDERR_LOG).display().to_string());

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{DAEMON_LABEL}</string>
  <key>ProgramArguments</key>
  <array>
    <string>{binary}</string>
    <string>daemon</string>
    <string>start</string>
  </array>
  <key>RunAtLoad</key>
  <true/>
  <key>KeepAlive</key>
  <true/>
  <key>ThrottleInterval</key>
  <integer>{THROTTLE_SECS}</integer>
  <key>ProcessType</key>
  <string>Background</string>
  <key>StandardOutPath</key>
  <string>{stdout}</string>
  <key>StandardErrorPath</key>
  <string>{stderr}</string>
</dict>
</plist>
"#
    )
}

/// Home directories can contain characters XML reserves.
fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Write the plist and (re)bootstrap the agent for the current user.
pub fn install(home: &Path) -> Result<PathBuf, DaemonError> {
    ensure_macos()?;

    for dir in [launch_agents_dir(home), logs_dir(home)] {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
    }

    let plist = launchd_plist_path(home);
    let rendered = generate_plist(Path::new(INSTALLED_BINARY), &logs_dir(home));
    fs::write(&plist, rendered).map_err(|e| io_err(&plist, e))?;

    let domain = gui_domain()?;
    let target = format!("{domain}/{DAEMON_LABEL}");

    // A previous install may still be loaded; boot it out before bootstrapping.
    let _ = run_launchctl(&["bootout", &target], true);
    run_launchctl(&["bootstrap", &domain, &plist.display().to_string()], false)?;
    run_launchctl(&["kickstart", "-k", &target], false)?;

    Ok(plist)
}

/// Boot the agent out of launchd and remove its plist.
pub fn uninstall(home: &Path) -> Result<(), DaemonError> {
    ensure_macos()?;

    let plist = launchd_plist_path(home);
    if plist.exists() {
        let target = format!("{}/{DAEMON_LABEL}", gui_domain()?);
        let _ = run_launchctl(&["bootout", &target], true);
        fs::remove_file(&plist).map_err(|e| io_err(&plist, e))?;
    }

    // The daemon removes its socket on clean exit; a crash can leave it behind.
    let socket = socket_path(home);
    if socket.exists() {
        let _ = fs::remove_file(socket);
    }

    Ok(())
}

#[cfg(target_os = "macos")]
fn ensure_macos() -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn ensure_macos() -> Result<(), DaemonError> {
    Err(DaemonError::Launchd(
        "launchd management is only supported on macOS".to_string(),
    ))
}

fn run_launchctl(args: &[&str], ignore_failure: bool) -> Result<(), DaemonError> {
    let output = Command::new("launchctl")
        .args(args)
        .output()
        .map_err(|e| io_err("launchctl", e))?;
    if output.status.success() || ignore_failure {
        return Ok(());
    }

    let detail: Vec<String> = [&output.stdout, &output.stderr]
        .into_iter()
        .map(|stream| String::from_utf8_lossy(stream).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    Err(DaemonError::Launchd(format!(
        "`launchctl {}` failed ({}): {}",
        args.join(" "),
        output.status,
        detail.join("; ")
    )))
}

/// launchd domain for the current user's GUI session, `gui/<uid>`.
fn gui_domain() -> Result<String, DaemonError> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .map_err(|e| io_err("id -u", e))?;

    let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || uid.is_empty() {
        return Err(DaemonError::Launchd(
            "could not resolve the current uid via `id -u`".to_string(),
        ));
    }
    Ok(format!("gui/{uid}"))
}
