//! On-disk layout under `~/.gatehouse/` plus the launchd agent paths.

use std::path::{Path, PathBuf};

pub const DAEMON_LABEL: &str = "dev.gatehouse.daemon";

pub const DAEMON_STDOUT_LOG: &str = "gatehouse.log";
pub const DAEMON_STDERR_LOG: &str = "gatehouse-err.log";
pub const DAEMON_SOCKET: &str = "daemon.sock";

const ROOT_DIR: &str = ".gatehouse";
const LOGS_DIR: &str = "logs";

pub fn gatehouse_root(home: &Path) -> PathBuf {
    home.join(ROOT_DIR)
}

pub fn socket_path(home: &Path) -> PathBuf {
    gatehouse_root(home).join(DAEMON_SOCKET)
}

pub fn logs_dir(home: &Path) -> PathBuf {
    gatehouse_root(home).join(LOGS_DIR)
}

pub fn stdout_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(DAEMON_STDOUT_LOG)
}

pub fn stderr_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(DAEMON_STDERR_LOG)
}

pub fn launch_agents_dir(home: &Path) -> PathBuf {
    home.join("Library").join("LaunchAgents")
}

pub fn launchd_plist_path(home: &Path) -> PathBuf {
    launch_agents_dir(home).join(format!("{DAEMON_LABEL}.plist"))
}
