//! Runtime configuration (spec §5): where the vault file and its backups
//! live, how many backups to retain, and the idle-lock policy.

use crate::autolock::AutoLockConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Path to the vault container file.
    pub vault_path: PathBuf,

    /// Maximum number of rotated backups to retain (spec §4.8).
    pub max_backups: usize,

    pub autolock: AutoLockConfig,
}

impl VaultConfig {
    #[must_use]
    pub fn with_vault_path(vault_path: PathBuf) -> Self {
        Self {
            vault_path,
            ..Self::default()
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            vault_path: default_vault_dir().join("DodoPass.vaultdb"),
            max_backups: 10,
            autolock: AutoLockConfig::default(),
        }
    }
}

fn default_vault_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("DodoPass")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_retention_and_timeout() {
        let config = VaultConfig::default();
        assert_eq!(config.max_backups, 10);
        assert_eq!(config.autolock.idle_timeout_seconds, 300);
    }

    #[test]
    fn with_vault_path_overrides_only_the_path() {
        let config = VaultConfig::with_vault_path(PathBuf::from("/tmp/test.vaultdb"));
        assert_eq!(config.vault_path, PathBuf::from("/tmp/test.vaultdb"));
        assert_eq!(config.max_backups, 10);
    }
}
