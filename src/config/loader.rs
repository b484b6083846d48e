// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::Result;

/// Read and deserialize a graph file without semantic validation.
///
/// Use [`load_and_validate`] for a [`GraphFile`] the rest of the crate can
/// trust.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraphFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

/// Deserialize a graph file from TOML text.
pub fn parse_str(contents: &str) -> Result<RawGraphFile> {
    let raw: RawGraphFile = toml::from_str(contents)?;
    Ok(raw)
}

/// Load a graph file and validate it:
///
/// - at least one task, no empty commands,
/// - `after` entries name existing tasks other than the task itself,
/// - no dependency cycles,
/// - sane `[executor]` settings.
///
/// Environment overrides are applied to `[executor]` before validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphFile> {
    let mut raw = load_from_path(&path)?;
    raw.executor = raw.executor.overlay_env()?;
    GraphFile::try_from(raw)
}

/// `Dagrun.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Dagrun.toml")
}
