//! Centralized configuration for snapwarden.
//!
//! Layers, lowest to highest precedence:
//! - built-in defaults (`Config::default()`),
//! - TOML file (`Config::load(Some(path))`),
//! - environment (`SNAPWARDEN_*`),
//! - CLI flags (applied by the binary through the `with_*` setters).
//!
//! Environment:
//! - SNAPWARDEN_ZFS                  zfs binary (default: first of /usr/bin/zfs, /sbin/zfs,
//!                                   /usr/sbin/zfs, else `zfs`)
//! - SNAPWARDEN_SSH                  ssh binary (default `ssh`)
//! - SNAPWARDEN_SSH_OPTS             extra ssh options, whitespace separated
//! - SNAPWARDEN_SCENARIO             default retention scenario (default `standard`)
//! - SNAPWARDEN_LOCK_DIR             directory for per-dataset lock files (default: no locking)
//! - SNAPWARDEN_ALLOW_DIVERGED_BASE  1|true|yes|on
//!
//! File format:
//! ```toml
//! zfs_bin = "/sbin/zfs"
//! ssh_options = ["-oBatchMode=yes"]
//! lock_dir = "/run/snapwarden"
//!
//! [scenarios.short]
//! grace_hours = 12
//! hourly = [1, 48]
//! daily = [2, 14]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::exec::SystemExecutor;
use crate::retention::{ScenarioSpec, ScenarioTable, STANDARD};
use crate::zfs::Zfs;

const ZFS_LOCATIONS: [&str; 3] = ["/usr/bin/zfs", "/sbin/zfs", "/usr/sbin/zfs"];

/// First zfs binary found at a well-known location, else rely on PATH.
pub fn locate_zfs() -> String {
    ZFS_LOCATIONS
        .iter()
        .find(|p| Path::new(p).is_file())
        .map(|p| p.to_string())
        .unwrap_or_else(|| "zfs".to_string())
}

fn parse_bool(s: &str) -> bool {
    let s = s.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

#[derive(Clone, Debug)]
pub struct Config {
    pub zfs_bin: String,
    pub ssh_bin: String,
    pub ssh_options: Vec<String>,
    pub default_scenario: String,
    /// Per-dataset advisory locks live here when set.
    pub lock_dir: Option<PathBuf>,
    /// Replication may use the newest shared snapshot even if the mirror moved on.
    pub allow_diverged_base: bool,
    pub scenarios: ScenarioTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zfs_bin: locate_zfs(),
            ssh_bin: "ssh".to_string(),
            ssh_options: Vec::new(),
            default_scenario: STANDARD.to_string(),
            lock_dir: None,
            allow_diverged_base: false,
            scenarios: ScenarioTable::builtin(),
        }
    }
}

/// On-disk shape of the config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub zfs_bin: Option<String>,
    pub ssh_bin: Option<String>,
    pub ssh_options: Option<Vec<String>>,
    pub default_scenario: Option<String>,
    pub lock_dir: Option<PathBuf>,
    pub allow_diverged_base: Option<bool>,
    #[serde(default)]
    pub scenarios: BTreeMap<String, ScenarioSpec>,
}

impl FileConfig {
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse TOML config")
    }
}

impl Config {
    /// Defaults overridden by the environment.
    pub fn from_env() -> Self {
        Self::default().apply_env_with(|k| std::env::var(k).ok())
    }

    /// Defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(p) = path {
            let s = std::fs::read_to_string(p)
                .with_context(|| format!("read config {}", p.display()))?;
            let file = FileConfig::parse(&s).with_context(|| format!("config {}", p.display()))?;
            cfg = cfg.apply_file(file)?;
        }
        Ok(cfg.apply_env_with(|k| std::env::var(k).ok()))
    }

    pub fn apply_file(mut self, file: FileConfig) -> Result<Self> {
        if let Some(v) = file.zfs_bin {
            self.zfs_bin = v;
        }
        if let Some(v) = file.ssh_bin {
            self.ssh_bin = v;
        }
        if let Some(v) = file.ssh_options {
            self.ssh_options = v;
        }
        if let Some(v) = file.default_scenario {
            self.default_scenario = v;
        }
        if let Some(v) = file.lock_dir {
            self.lock_dir = Some(v);
        }
        if let Some(v) = file.allow_diverged_base {
            self.allow_diverged_base = v;
        }
        for (name, spec) in file.scenarios {
            let sc = spec.into_scenario(&name)?;
            self.scenarios.insert(sc);
        }
        Ok(self)
    }

    /// Apply `SNAPWARDEN_*` overrides read through `get`.
    pub fn apply_env_with<F>(mut self, get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("SNAPWARDEN_ZFS") {
            self.zfs_bin = v;
        }
        if let Some(v) = non_empty("SNAPWARDEN_SSH") {
            self.ssh_bin = v;
        }
        if let Some(v) = non_empty("SNAPWARDEN_SSH_OPTS") {
            self.ssh_options = v.split_whitespace().map(str::to_string).collect();
        }
        if let Some(v) = non_empty("SNAPWARDEN_SCENARIO") {
            self.default_scenario = v;
        }
        if let Some(v) = non_empty("SNAPWARDEN_LOCK_DIR") {
            self.lock_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SNAPWARDEN_ALLOW_DIVERGED_BASE") {
            self.allow_diverged_base = parse_bool(&v);
        }
        self
    }

    pub fn with_zfs_bin<S: Into<String>>(mut self, bin: S) -> Self {
        self.zfs_bin = bin.into();
        self
    }

    pub fn with_ssh_bin<S: Into<String>>(mut self, bin: S) -> Self {
        self.ssh_bin = bin.into();
        self
    }

    pub fn with_ssh_options(mut self, opts: Vec<String>) -> Self {
        self.ssh_options = opts;
        self
    }

    pub fn with_default_scenario<S: Into<String>>(mut self, name: S) -> Self {
        self.default_scenario = name.into();
        self
    }

    pub fn with_lock_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.lock_dir = dir;
        self
    }

    pub fn with_allow_diverged_base(mut self, on: bool) -> Self {
        self.allow_diverged_base = on;
        self
    }

    pub fn executor(&self) -> SystemExecutor {
        SystemExecutor::new(self.ssh_bin.clone(), self.ssh_options.clone())
    }

    /// Real `Zfs` handle for this configuration.
    pub fn zfs(&self) -> Zfs<SystemExecutor> {
        Zfs::new(self.executor(), self.zfs_bin.clone())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            concat!(
                "Config {{ zfs_bin: {}, ssh_bin: {}, ssh_options: [{}], default_scenario: {}, ",
                "lock_dir: {}, allow_diverged_base: {}, scenarios: [{}] }}"
            ),
            self.zfs_bin,
            self.ssh_bin,
            self.ssh_options.join(" "),
            self.default_scenario,
            self.lock_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.allow_diverged_base,
            self.scenarios.names().collect::<Vec<_>>().join(", "),
        )
    }
}
