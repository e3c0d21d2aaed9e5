//! Shared configuration for the netforge CLI.
//!
//! TOML file + `NETFORGE_*` environment layering over built-in defaults,
//! and the path conventions every command derives its state, ISP, and lock
//! file locations from. A command invocation resolves configuration once
//! and hands it to the engine through the command context.

use std::path::PathBuf;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config struct ───────────────────────────────────────────────────

/// Top-level configuration.
///
/// `state_id` names the topology; every OS object and on-disk file carries
/// it, which is what lets independent topologies share one host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Topology name, used as the prefix of every OS-visible object.
    #[serde(default = "default_state_id")]
    pub state_id: String,

    /// Directory holding state documents and lock files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Privilege-escalation prefix for OS commands. Empty string disables
    /// it; absent means "sudo" unless already running as root.
    pub sudo: Option<String>,

    /// Host interface carrying real Internet connectivity, for the ISP
    /// uplink NAT. Auto-detected from the default route when absent.
    pub uplink_interface: Option<String>,

    /// Default DNS servers handed to new nodes.
    #[serde(default)]
    pub dns: Vec<String>,

    /// Root of per-namespace /etc overlays (resolv.conf placement).
    #[serde(default = "default_nsroot")]
    pub nsroot: PathBuf,

    /// Directory for captured daemon output files.
    #[serde(default = "default_process_log_dir")]
    pub process_log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_id: default_state_id(),
            state_dir: default_state_dir(),
            sudo: None,
            uplink_interface: None,
            dns: Vec::new(),
            nsroot: default_nsroot(),
            process_log_dir: default_process_log_dir(),
        }
    }
}

fn default_state_id() -> String {
    "net".into()
}

fn default_state_dir() -> PathBuf {
    ProjectDirs::from("dev", "netforge", "netforge").map_or_else(
        || PathBuf::from("/tmp/netforge"),
        |dirs| {
            dirs.state_dir()
                .map_or_else(|| dirs.data_local_dir().to_path_buf(), PathBuf::from)
        },
    )
}

fn default_nsroot() -> PathBuf {
    PathBuf::from("/etc/netns")
}

fn default_process_log_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

// ── Path conventions ────────────────────────────────────────────────

impl Config {
    /// The state document for this topology.
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(format!("{}.json", self.state_id))
    }

    /// The parallel ISP document for `isp_id`.
    pub fn isp_file(&self, isp_id: &str) -> PathBuf {
        self.state_dir
            .join(format!("{}{}_.json", self.state_id, isp_id))
    }

    /// Resolved privilege prefix: explicit config wins, then root detection.
    pub fn sudo_prefix(&self) -> Option<String> {
        match &self.sudo {
            Some(prefix) if prefix.is_empty() => None,
            Some(prefix) => Some(prefix.clone()),
            None => {
                if effective_uid_is_root() {
                    None
                } else {
                    Some("sudo".into())
                }
            }
        }
    }
}

// Effective-uid probe from /proc, avoiding an OS crate in this config crate.
fn effective_uid_is_root() -> bool {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return false;
    };
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|ids| ids.split_whitespace().nth(1))
        .is_some_and(|euid| euid == "0")
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "netforge", "netforge").map_or_else(
        || {
            let mut fallback =
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            fallback.push(".config");
            fallback.push("netforge");
            fallback.push("config.toml");
            fallback
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the full Config from defaults + file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_path()))
        .merge(Env::prefixed("NETFORGE_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, falling back to defaults when nothing is configured.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn state_file_carries_state_id() {
        let cfg = Config {
            state_id: "alpha".into(),
            state_dir: PathBuf::from("/var/lib/netforge"),
            ..Config::default()
        };
        assert_eq!(
            cfg.state_file(),
            PathBuf::from("/var/lib/netforge/alpha.json")
        );
        assert_eq!(
            cfg.isp_file("eth"),
            PathBuf::from("/var/lib/netforge/alphaeth_.json")
        );
    }

    #[test]
    fn empty_sudo_disables_prefix() {
        let cfg = Config {
            sudo: Some(String::new()),
            ..Config::default()
        };
        assert_eq!(cfg.sudo_prefix(), None);
    }

    #[test]
    fn explicit_sudo_wins() {
        let cfg = Config {
            sudo: Some("doas".into()),
            ..Config::default()
        };
        assert_eq!(cfg.sudo_prefix(), Some("doas".into()));
    }
}
