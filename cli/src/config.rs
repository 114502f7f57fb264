//! `blockdoc.toml` loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

/// Looked for in the working directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "blockdoc.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Snapshot file. Defaults to [`default_store_path`].
    pub store: Option<PathBuf>,
    /// Where `export` writes when `--out` is not given.
    pub export_file: PathBuf,
    /// Log filter used when `BLOCKDOC_LOG` is unset.
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: None,
            export_file: PathBuf::from(blockdoc::parser::EXPORT_FILE_NAME),
            log: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load from `explicit` if given (it must exist), else from
    /// `./blockdoc.toml` if present, else defaults.
    pub fn locate(explicit: Option<&Path>) -> Result<Config> {
        match explicit {
            Some(path) if !path.exists() => bail!("config file not found: {}", path.display()),
            Some(path) => Config::load(path),
            None => Config::load(Path::new(CONFIG_FILE_NAME)),
        }
    }

    /// Parse a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            debug!(path = %path.display(), "config file does not exist; using defaults");
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    pub fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(default_store_path)
    }
}

/// `<data_local_dir>/blockdoc/document.json`, or `.blockdoc/document.json`
/// when the platform has no data directory.
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("blockdoc"))
        .unwrap_or_else(|| PathBuf::from(".blockdoc"))
        .join("document.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.export_file, PathBuf::from("document.md"));
        assert!(config.store_path().ends_with("blockdoc/document.json"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::locate(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockdoc.toml");
        std::fs::write(&path, "store = \"docs/state.json\"\nlog = \"blockdoc=debug\"\n").unwrap();
        let config = Config::locate(Some(&path)).unwrap();
        assert_eq!(config.store_path(), PathBuf::from("docs/state.json"));
        assert_eq!(config.log, "blockdoc=debug");
        assert_eq!(config.export_file, PathBuf::from("document.md"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockdoc.toml");
        std::fs::write(&path, "stroe = \"x\"\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config file"));
    }
}
