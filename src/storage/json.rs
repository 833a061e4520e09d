use crate::model::{ScrapeHistoryEntry, StorageError};
use crate::storage::HistoryStore;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// History kept as a JSON array of `{"scrape_date": "..."}` objects.
pub struct JsonHistoryStore {
    path: PathBuf,
    // Serializes the read-modify-write cycle within this process.
    write_lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load(&self) -> Result<Vec<ScrapeHistoryEntry>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let rows: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Corrupt history file {}, treating as empty: {}", self.path.display(), e);
                return Ok(Vec::new());
            }
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<ScrapeHistoryEntry>(row.clone()) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping unreadable history entry {}: {}", row, e),
            }
        }
        Ok(entries)
    }

    fn append(&self, entry: &ScrapeHistoryEntry) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;

        let mut entries = self.load()?;
        entries.push(entry.clone());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ScrapeHistory;
    use chrono::DateTime;

    fn entry(ts: &str) -> ScrapeHistoryEntry {
        ScrapeHistoryEntry {
            scrape_date: DateTime::parse_from_rfc3339(ts).unwrap(),
        }
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history.json"));
        assert!(store.load().unwrap().is_empty());
        assert_eq!(ScrapeHistory::load_from(&store).last_scrape(), None);
    }

    #[test]
    fn corrupt_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonHistoryStore::new(&path);
        assert!(store.load().unwrap().is_empty());

        store.append(&entry("2024-03-15T10:00:00+01:00")).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn unreadable_entries_are_skipped_and_the_rest_kept_on_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"[{"scrape_date": "2024-03-14T10:00:00+01:00"},
                {"scrape_date": "oops"},
                {"when": "2024-03-14T11:00:00+01:00"},
                {"scrape_date": "2024-03-15T10:00:00+01:00"}]"#,
        )
        .unwrap();
        let store = JsonHistoryStore::new(&path);
        assert_eq!(store.load().unwrap().len(), 2);

        store.append(&entry("2024-03-16T10:00:00+01:00")).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(
            loaded,
            vec![
                entry("2024-03-14T10:00:00+01:00"),
                entry("2024-03-15T10:00:00+01:00"),
                entry("2024-03-16T10:00:00+01:00"),
            ]
        );
    }

    #[test]
    fn non_utf8_file_is_empty_history_and_accepts_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let store = JsonHistoryStore::new(&path);
        assert!(store.load().unwrap().is_empty());

        store.append(&entry("2024-03-16T10:00:00+01:00")).unwrap();
        assert_eq!(store.load().unwrap(), vec![entry("2024-03-16T10:00:00+01:00")]);
    }

    #[test]
    fn append_keeps_earlier_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("nested/history.json"));
        store.append(&entry("2024-03-15T10:00:00+01:00")).unwrap();
        store.append(&entry("2024-03-16T11:00:00+01:00")).unwrap();

        let history = ScrapeHistory::load_from(&store);
        assert_eq!(history.entries().len(), 2);
        assert_eq!(
            history.last_scrape().unwrap().to_rfc3339(),
            "2024-03-16T11:00:00+01:00"
        );
    }

    #[test]
    fn file_uses_scrape_date_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history.json"));
        store.append(&entry("2024-03-15T10:00:00+01:00")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!([{ "scrape_date": "2024-03-15T10:00:00+01:00" }])
        );
    }
}
