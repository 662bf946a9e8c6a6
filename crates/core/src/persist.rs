use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRow {
    pub key: String,
    pub count: u64,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMeta {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub timestamp: i64,
}

/// On-disk layout of the aggregate store. Rows keep creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(rename = "promptA", default)]
    pub prompt_a: Vec<PersistedRow>,
    #[serde(rename = "promptB", default)]
    pub prompt_b: Vec<PersistedRow>,
    #[serde(default)]
    pub meta: PersistedMeta,
}

/// Writes `value` as JSON through a temp file in the same directory, so a
/// crash never leaves a half-written document behind.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;
    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    temp_file.as_file().sync_all()?;
    temp_file.persist(path)?;
    Ok(())
}

/// `Ok(None)` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

pub fn save_state(path: &Path, state: &PersistedState) -> Result<()> {
    save_json(path, state)
}

/// `Ok(None)` when no state has been written yet.
pub fn load_state(path: &Path) -> Result<Option<PersistedState>> {
    load_json(path)
}
