//! Gatehouse YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.gatehouse/
//!   config.yaml   (mode 0600, created by `gatehouse init`)
//!   logs/         (daemon log files)
//!   daemon.sock   (daemon control socket)
//! ```
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::VerifiedIdentity;

// ---------------------------------------------------------------------------
// 1. Config model
// ---------------------------------------------------------------------------

/// Root of `~/.gatehouse/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sheet: SheetConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Static bearer-token → identity map for the operational verifier.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tokens: BTreeMap<String, TokenIdentity>,
}

/// Record-store endpoint (JSON document collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub base_url: String,
    pub collection: String,
    /// Optional service credential sent as `Authorization: Bearer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/v1".to_string(),
            collection: "whitelist".to_string(),
            bearer_token: None,
        }
    }
}

/// Spreadsheet values-API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub base_url: String,
    pub spreadsheet_id: String,
    /// Tab holding the roster; column A = name, column B = email, column C = avatar.
    #[serde(default = "default_tab")]
    pub tab: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081/v4".to_string(),
            spreadsheet_id: String::new(),
            tab: default_tab(),
        }
    }
}

fn default_tab() -> String {
    "Employees".to_string()
}

/// Authorization-resolver tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// How long the primary store lookup may take before the fallback runs.
    #[serde(default = "default_primary_timeout_secs")]
    pub primary_timeout_secs: u64,
    /// Document-fetch endpoint used with the caller's bearer token.
    pub fallback_base_url: String,
}

impl ResolverConfig {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_secs(self.primary_timeout_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            primary_timeout_secs: default_primary_timeout_secs(),
            fallback_base_url: "http://127.0.0.1:8080/v1".to_string(),
        }
    }
}

fn default_primary_timeout_secs() -> u64 {
    10
}

/// Scheduled-job intervals and the reconciliation switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_roster_interval_hours")]
    pub roster_interval_hours: u64,
    #[serde(default = "default_avatar_interval_days")]
    pub avatar_interval_days: u64,
    /// When true, roster sync also deletes records whose email no longer
    /// appears in the sheet. Off by default; deletion is never implicit.
    #[serde(default)]
    pub reconcile_deletes: bool,
}

impl SyncConfig {
    pub fn roster_interval(&self) -> Duration {
        Duration::from_secs(self.roster_interval_hours * 3600)
    }

    pub fn avatar_interval(&self) -> Duration {
        Duration::from_secs(self.avatar_interval_days * 86_400)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            roster_interval_hours: default_roster_interval_hours(),
            avatar_interval_days: default_avatar_interval_days(),
            reconcile_deletes: false,
        }
    }
}

fn default_roster_interval_hours() -> u64 {
    24
}

fn default_avatar_interval_days() -> u64 {
    7
}

/// Identity behind a static bearer token in the `tokens` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIdentity {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl TokenIdentity {
    pub fn into_identity(self, bearer: &str) -> VerifiedIdentity {
        VerifiedIdentity {
            email: self.email,
            display_name: self.display_name,
            photo_url: self.photo_url,
            bearer: bearer.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.gatehouse/` — pure, no I/O.
pub fn gatehouse_dir_at(home: &Path) -> PathBuf {
    home.join(".gatehouse")
}

/// `<home>/.gatehouse/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    gatehouse_dir_at(home).join("config.yaml")
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

/// Creates `<home>/.gatehouse/` (mode `0700`) if it does not yet exist.
pub fn ensure_dir_at(home: &Path) -> Result<PathBuf, ConfigError> {
    let dir = gatehouse_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load `<home>/.gatehouse/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 4. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the config to `<home>/.gatehouse/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem — no EXDEV on macOS).
pub fn save_at(home: &Path, config: &Config) -> Result<(), ConfigError> {
    ensure_dir_at(home)?;
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// 5. Init
// ---------------------------------------------------------------------------

/// Scaffold `<home>/.gatehouse/config.yaml` with defaults.
///
/// Idempotent unless `force`: an existing file is loaded and returned
/// unchanged. Returns the config plus whether a new file was written.
pub fn init_at(home: &Path, force: bool) -> Result<(Config, bool), ConfigError> {
    let path = config_path_at(home);
    if path.exists() && !force {
        return Ok((load_at(home)?, false));
    }
    let config = Config::default();
    save_at(home, &config)?;
    Ok((config, true))
}

/// `init_at` convenience wrapper.
pub fn init(force: bool) -> Result<(Config, bool), ConfigError> {
    init_at(&home()?, force)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
