use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;

/// Reads a JSON document, falling back to the default when the file is
/// missing or unreadable.
pub fn read_json_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match pulse_core::load_json(path) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "discarding corrupt client file");
            T::default()
        }
    }
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    Ok(pulse_core::save_json(path, value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.json");
        std::fs::write(&path, "[{\"id\":").unwrap();
        let entries: Vec<String> = read_json_or_default(&path);
        assert!(entries.is_empty());
    }

    #[test]
    fn written_documents_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client").join("cache.json");
        write_json_atomic(&path, &vec![3u64, 5]).unwrap();
        assert_eq!(read_json_or_default::<Vec<u64>>(&path), vec![3, 5]);
        assert!(read_json_or_default::<Vec<u64>>(&dir.path().join("absent.json")).is_empty());
    }
}
