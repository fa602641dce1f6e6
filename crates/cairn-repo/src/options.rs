//! Construction options for a repository.
//!
//! Options can be built in code or loaded from a TOML/JSON file:
//!
//! ```toml
//! auto_migrate = false
//! lock = "memory"
//!
//! [backends]
//! blocks = "memory"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RepoError, RepoResult};

/// Storage adapter type for one namespace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One file per key below the repository path.
    #[default]
    Fs,
    /// Process memory; contents are lost when the repository is dropped.
    Memory,
}

/// Lock manager used by `open`.
///
/// Defaults to a lock file inside the repository path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    #[default]
    Fs,
    Memory,
}

/// Adapter type for each namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub root: BackendKind,
    pub blocks: BackendKind,
    pub keys: BackendKind,
    pub datastore: BackendKind,
}

impl BackendsConfig {
    /// Every namespace uses `kind`.
    pub fn all(kind: BackendKind) -> Self {
        Self {
            root: kind,
            blocks: kind,
            keys: kind,
            datastore: kind,
        }
    }
}

/// Options recognised at repository construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoOptions {
    /// Run registered migrations when `open` finds an older version.
    pub auto_migrate: bool,
    pub lock: LockKind,
    pub backends: BackendsConfig,
}

impl Default for RepoOptions {
    fn default() -> Self {
        Self {
            auto_migrate: true,
            lock: LockKind::default(),
            backends: BackendsConfig::default(),
        }
    }
}

impl RepoOptions {
    /// Memory-backed namespaces guarded by the in-process lock.
    pub fn in_memory() -> Self {
        Self {
            lock: LockKind::Memory,
            backends: BackendsConfig::all(BackendKind::Memory),
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> RepoResult<Self> {
        toml::from_str(content).map_err(|e| RepoError::InvalidOptions(format!("invalid TOML: {e}")))
    }

    /// Load options from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> RepoResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RepoError::InvalidOptions(format!("failed to read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| RepoError::InvalidOptions(format!("invalid JSON: {e}"))),
            _ => Err(RepoError::InvalidOptions(format!(
                "unsupported options file format: {}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = RepoOptions::default();
        assert!(options.auto_migrate);
        assert_eq!(options.lock, LockKind::Fs);
        assert_eq!(options.backends, BackendsConfig::all(BackendKind::Fs));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let options = RepoOptions::from_toml_str(
            r#"
            auto_migrate = false

            [backends]
            blocks = "memory"
            "#,
        )
        .unwrap();
        assert!(!options.auto_migrate);
        assert_eq!(options.lock, LockKind::Fs);
        assert_eq!(options.backends.blocks, BackendKind::Memory);
        assert_eq!(options.backends.root, BackendKind::Fs);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = RepoOptions::from_toml_str("[backends]\nroot = \"level\"").unwrap_err();
        assert!(matches!(err, RepoError::InvalidOptions(_)));
    }

    #[test]
    fn load_from_files() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("repo.toml");
        fs::write(&toml_path, "lock = \"memory\"").unwrap();
        assert_eq!(RepoOptions::from_file(&toml_path).unwrap().lock, LockKind::Memory);

        let json_path = dir.path().join("repo.json");
        fs::write(&json_path, r#"{"auto_migrate": false}"#).unwrap();
        assert!(!RepoOptions::from_file(&json_path).unwrap().auto_migrate);

        let yaml_path = dir.path().join("repo.yaml");
        fs::write(&yaml_path, "lock: fs").unwrap();
        assert!(RepoOptions::from_file(&yaml_path).is_err());
    }

    #[test]
    fn in_memory_preset() {
        let options = RepoOptions::in_memory();
        assert!(options.auto_migrate);
        assert_eq!(options.lock, LockKind::Memory);
        assert_eq!(options.backends, BackendsConfig::all(BackendKind::Memory));
    }
}
