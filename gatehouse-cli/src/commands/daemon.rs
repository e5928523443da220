//! `gatehouse daemon` — scheduler lifecycle and launchd management.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use gatehouse_daemon::paths::{socket_path, stderr_log_path, stdout_log_path};
use gatehouse_daemon::{
    install_service, request_status, request_stop, start_blocking, uninstall_service, DaemonError,
};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (schedulers + socket server).
    Start,
    /// Ask the daemon to shut down, waiting for its socket to disappear.
    Stop,
    /// Print daemon runtime status as JSON.
    Status,
    /// Install and bootstrap the launchd agent.
    Install,
    /// Boot out and remove the launchd agent.
    Uninstall,
    /// Print recent daemon log lines.
    Logs(DaemonLogsArgs),
}

#[derive(Args, Debug)]
pub struct DaemonLogsArgs {
    /// Number of trailing lines to show per file.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,

    /// Show only the stderr log file.
    #[arg(long)]
    pub stderr_only: bool,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
            Ok(())
        }
        DaemonCommand::Stop => stop(&home),
        DaemonCommand::Status => {
            let payload = status_payload(&home)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
            Ok(())
        }
        DaemonCommand::Install => {
            let path = install_service(&home).context("failed to install launchd service")?;
            println!("installed launchd service: {}", path.display());
            Ok(())
        }
        DaemonCommand::Uninstall => {
            uninstall_service(&home).context("failed to uninstall launchd service")?;
            println!("uninstalled launchd service");
            Ok(())
        }
        DaemonCommand::Logs(args) => logs(&home, &args),
    }
}

/// Request shutdown, then wait briefly for the socket file to go away so the
/// caller can tell a completed stop from one still in flight.
fn stop(home: &Path) -> Result<()> {
    match request_stop(home) {
        Ok(()) => {}
        Err(DaemonError::DaemonNotRunning { .. }) => {
            println!("daemon is not running");
            return Ok(());
        }
        Err(err) => return Err(err).context("failed to stop daemon"),
    }

    let socket = socket_path(home);
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if !socket.exists() {
            println!("✓ daemon stopped");
            return Ok(());
        }
        sleep(Duration::from_millis(50));
    }

    println!("daemon stop requested (still shutting down)");
    Ok(())
}

/// Live payload over the socket, or a synthetic `running: false` one.
fn status_payload(home: &Path) -> Result<serde_json::Value> {
    match request_status(home) {
        Ok(status) => Ok(status),
        Err(DaemonError::DaemonNotRunning { .. }) => Ok(serde_json::json!({
            "running": false,
            "socket": socket_path(home).display().to_string(),
        })),
        Err(err) => Err(err).context("failed to query daemon status"),
    }
}

fn logs(home: &Path, args: &DaemonLogsArgs) -> Result<()> {
    if args.stderr_only {
        return print_tail(&stderr_log_path(home), args.lines, false)
            .context("failed to read daemon stderr log");
    }

    // Both streams, with tail(1)-style headers to tell them apart.
    print_tail(&stdout_log_path(home), args.lines, true)
        .context("failed to read daemon stdout log")?;
    print_tail(&stderr_log_path(home), args.lines, true)
        .context("failed to read daemon stderr log")
}

fn print_tail(path: &Path, lines: usize, with_header: bool) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }
    if with_header {
        println!("==> {} <==", path.display());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let all: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("read {}", path.display()))?;

    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{line}");
    }
    Ok(())
}
