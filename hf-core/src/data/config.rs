//! Daemon configuration
//!
//! `DaemonConfig` is loaded once at startup from a JSON file and never mutated in place; a
//! `config.set` RPC call produces a new value that replaces the running one. Resolution order
//! for the config file path is `--config` flag, then `HYPERFAND_CONFIG` env var, then
//! `/etc/hyperfan/hyperfand.json`, then built-in defaults if nothing exists on disk.

use hf_error::{HyperfanError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::daemon as defaults;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_force_tick_ms")]
    pub force_tick_ms: u64,
    #[serde(default = "default_delta_c")]
    pub delta_c: f32,
    #[serde(default = "default_gpu_refresh_ms")]
    pub gpu_refresh_ms: u64,
    #[serde(default = "default_hwmon_refresh_ms")]
    pub hwmon_refresh_ms: u64,
    #[serde(default = "default_profile_name")]
    pub profile_name: String,
    #[serde(default = "default_profiles_path")]
    pub profiles_path: String,
    #[serde(default = "default_shm_path")]
    pub shm_path: String,
    #[serde(default = "default_logfile")]
    pub logfile: String,
    #[serde(default = "default_pidfile")]
    pub pidfile: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_vendor_map_path")]
    pub vendor_map_path: String,
    #[serde(default = "default_vendor_map_watch_mode")]
    pub vendor_map_watch_mode: String,
    #[serde(default = "default_vendor_map_throttle_ms")]
    pub vendor_map_throttle_ms: u64,
}

fn default_host() -> String {
    defaults::DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    defaults::DEFAULT_PORT
}
fn default_tick_ms() -> u64 {
    defaults::DEFAULT_TICK_MS
}
fn default_force_tick_ms() -> u64 {
    defaults::DEFAULT_FORCE_TICK_MS
}
fn default_delta_c() -> f32 {
    defaults::DEFAULT_DELTA_C
}
fn default_gpu_refresh_ms() -> u64 {
    defaults::DEFAULT_GPU_REFRESH_MS
}
fn default_hwmon_refresh_ms() -> u64 {
    defaults::DEFAULT_HWMON_REFRESH_MS
}
fn default_profile_name() -> String {
    defaults::DEFAULT_PROFILE_NAME.to_string()
}
fn default_profiles_path() -> String {
    defaults::DEFAULT_PROFILES_PATH.to_string()
}
fn default_shm_path() -> String {
    defaults::DEFAULT_SHM_PATH.to_string()
}
fn default_logfile() -> String {
    defaults::DEFAULT_LOGFILE.to_string()
}
fn default_pidfile() -> String {
    defaults::DEFAULT_PIDFILE.to_string()
}
fn default_vendor_map_path() -> String {
    defaults::DEFAULT_VENDOR_MAP_PATH.to_string()
}
fn default_vendor_map_watch_mode() -> String {
    defaults::DEFAULT_VENDOR_MAP_WATCH_MODE.to_string()
}
fn default_vendor_map_throttle_ms() -> u64 {
    defaults::DEFAULT_VENDOR_MAP_THROTTLE_MS
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tick_ms: default_tick_ms(),
            force_tick_ms: default_force_tick_ms(),
            delta_c: default_delta_c(),
            gpu_refresh_ms: default_gpu_refresh_ms(),
            hwmon_refresh_ms: default_hwmon_refresh_ms(),
            profile_name: default_profile_name(),
            profiles_path: default_profiles_path(),
            shm_path: default_shm_path(),
            logfile: default_logfile(),
            pidfile: default_pidfile(),
            debug: false,
            vendor_map_path: default_vendor_map_path(),
            vendor_map_watch_mode: default_vendor_map_watch_mode(),
            vendor_map_throttle_ms: default_vendor_map_throttle_ms(),
        }
    }
}

/// Path resolution order for the config file itself: explicit CLI flag, then env var, then
/// the well-known system path. Returns `None` if none of these yield an existing file, in
/// which case the caller should fall back to `DaemonConfig::default()`.
pub fn resolve_config_path(cli_flag: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = cli_flag {
        return Some(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var("HYPERFAND_CONFIG") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let system_default = PathBuf::from("/etc/hyperfan/hyperfand.json");
    if system_default.exists() {
        return Some(system_default);
    }
    None
}

/// Load the daemon configuration from `path`. A missing file is not an error: every field
/// falls back to its built-in default. A present-but-malformed file IS an error.
pub fn load_config(path: Option<&Path>) -> Result<DaemonConfig> {
    let path = match path {
        Some(p) => p,
        None => return Ok(DaemonConfig::default()),
    };
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| HyperfanError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: DaemonConfig = serde_json::from_str(&contents)?;
    Ok(config)
}

/// Expand a leading `~`, `$VAR`, or `${VAR}` in a configured path. Only the first path
/// component is eligible for `~` expansion; `$VAR`/`${VAR}` may appear anywhere in the string.
pub fn expand_path(raw: &str) -> String {
    let after_tilde = if let Some(rest) = raw.strip_prefix('~') {
        match dirs::home_dir() {
            Some(home) => format!("{}{}", home.display(), rest),
            None => raw.to_string(),
        }
    } else {
        raw.to_string()
    };
    expand_env_vars(&after_tilde)
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for c2 in chars.by_ref() {
                if c2 == '}' {
                    closed = true;
                    break;
                }
                name.push(c2);
            }
            if closed {
                out.push_str(&std::env::var(&name).unwrap_or_default());
            } else {
                out.push_str("${");
                out.push_str(&name);
            }
        } else {
            let mut name = String::new();
            while let Some(&c2) = chars.peek() {
                if c2.is_alphanumeric() || c2 == '_' {
                    name.push(c2);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                out.push('$');
            } else {
                out.push_str(&std::env::var(&name).unwrap_or_default());
            }
        }
    }
    out
}

impl DaemonConfig {
    pub fn profiles_dir(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.profiles_path))
    }

    pub fn shm_leaf_name(&self) -> String {
        shm_leaf_name(&self.shm_path)
    }
}

/// Derive the POSIX shared-memory object's leaf name from a configured string: if it
/// contains a path separator, take the basename; otherwise use it verbatim. The result is
/// always prefixed with a single leading slash, as `shm_open` requires.
pub fn shm_leaf_name(configured: &str) -> String {
    let leaf = if configured.contains('/') {
        Path::new(configured)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| configured.to_string())
    } else {
        configured.to_string()
    };
    format!("/{leaf}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.tick_ms, defaults::DEFAULT_TICK_MS);
        assert_eq!(cfg.port, defaults::DEFAULT_PORT);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config(Some(Path::new("/nonexistent/path/hyperfand.json"))).unwrap();
        assert_eq!(cfg, DaemonConfig::default());
    }

    #[test]
    fn loads_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hyperfand.json");
        std::fs::write(&path, r#"{"port": 9999, "tickMs": 25}"#).unwrap();
        // falls back to serde default field names since DaemonConfig has no rename
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("9999"));
    }

    #[test]
    fn expand_env_var_braced_and_bare() {
        std::env::set_var("HF_TEST_EXPAND_VAR", "value");
        assert_eq!(expand_path("$HF_TEST_EXPAND_VAR/profiles"), "value/profiles");
        assert_eq!(expand_path("${HF_TEST_EXPAND_VAR}/profiles"), "value/profiles");
    }

    #[test]
    fn shm_leaf_name_basenames_a_path() {
        assert_eq!(shm_leaf_name("hyperfand"), "/hyperfand");
        assert_eq!(shm_leaf_name("/run/hyperfand/telemetry"), "/telemetry");
    }
}
