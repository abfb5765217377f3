// file: src/config/mod.rs
// version: 1.1.0
// guid: 48c6e1a9-7f52-4d08-a6b3-e90d14c7f285

//! Tool configuration.
//!
//! All default paths live in one [`Settings`] struct that is threaded
//! through every command handler. Operators can override entries via
//! `~/.config/dockervm/config.toml` or `/etc/dockervm/config.toml`; tests
//! point the paths at temporary directories.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DvmError, Result};

/// Default NVIDIA driver download used by `gpu install-driver`.
const DEFAULT_DRIVER_URL: &str =
    "https://uk.download.nvidia.com/XFree86/Linux-x86_64/580.119.02/NVIDIA-Linux-x86_64-580.119.02.run";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Base directory for container volumes and compose stacks.
    pub volumes_dir: PathBuf,
    /// Dockhand installation directory.
    pub dockhand_dir: PathBuf,
    /// Directory holding container templates (compose file + .env each).
    pub templates_dir: PathBuf,
    pub fstab_path: PathBuf,
    pub daemon_json_path: PathBuf,
    pub netplan_dir: PathBuf,
    pub apt_conf_dir: PathBuf,
    pub msmtprc_path: PathBuf,
    /// Interface offered as default for netplan configuration.
    pub default_interface: String,
    /// Default NVIDIA driver download URL.
    pub driver_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volumes_dir: PathBuf::from("/mnt/volumes"),
            dockhand_dir: PathBuf::from("/mnt/volumes/dockhand"),
            templates_dir: PathBuf::from("/usr/share/dockervm/templates"),
            fstab_path: PathBuf::from("/etc/fstab"),
            daemon_json_path: PathBuf::from("/etc/docker/daemon.json"),
            netplan_dir: PathBuf::from("/etc/netplan"),
            apt_conf_dir: PathBuf::from("/etc/apt/apt.conf.d"),
            msmtprc_path: PathBuf::from("/etc/msmtprc"),
            default_interface: "eth0".to_string(),
            driver_url: DEFAULT_DRIVER_URL.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the first config file found, falling back to the
    /// built-in defaults when none exists.
    pub fn load() -> Result<Self> {
        for path in Self::candidate_paths() {
            if path.is_file() {
                debug!("loading settings from {}", path.display());
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            DvmError::config(format!("invalid config file {}: {}", path.display(), e))
        })
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("dockervm").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/dockervm/config.toml"));
        paths
    }

    /// Path under the apt configuration directory.
    pub fn apt_conf_file(&self, name: &str) -> PathBuf {
        self.apt_conf_dir.join(name)
    }

    /// Path to the unattended-upgrades package blacklist.
    pub fn blacklist_path(&self) -> PathBuf {
        self.apt_conf_file("51unattended-upgrades-blacklist")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.volumes_dir, PathBuf::from("/mnt/volumes"));
        assert_eq!(settings.fstab_path, PathBuf::from("/etc/fstab"));
        assert_eq!(settings.default_interface, "eth0");
        assert!(settings.driver_url.starts_with("https://"));
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "volumes_dir = \"/srv/volumes\"\ndefault_interface = \"ens18\"\n",
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.volumes_dir, PathBuf::from("/srv/volumes"));
        assert_eq!(settings.default_interface, "ens18");
        // Untouched fields keep their defaults.
        assert_eq!(settings.fstab_path, PathBuf::from("/etc/fstab"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "volums_dir = \"/srv\"\n").unwrap();
        assert!(Settings::from_file(&path).is_err());
    }

    #[test]
    fn test_blacklist_path() {
        let settings = Settings::default();
        assert_eq!(
            settings.blacklist_path(),
            PathBuf::from("/etc/apt/apt.conf.d/51unattended-upgrades-blacklist")
        );
    }
}
