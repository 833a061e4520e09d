use crate::model::{ScrapeHistoryEntry, StorageError};
use crate::storage::HistoryStore;
use crate::utils::parse_datetime;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// History kept in a `scrape_history` table.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Opens the database and creates the table if needed.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::init(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scrape_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scrape_date TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load(&self) -> Result<Vec<ScrapeHistoryEntry>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT scrape_date FROM scrape_history ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut entries = Vec::new();
        for row in rows {
            let raw = row?;
            match parse_datetime(&raw) {
                Some(scrape_date) => entries.push(ScrapeHistoryEntry { scrape_date }),
                None => warn!("Skipping unreadable history row: {:?}", raw),
            }
        }
        Ok(entries)
    }

    fn append(&self, entry: &ScrapeHistoryEntry) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT INTO scrape_history (scrape_date) VALUES (?1)",
            params![entry.scrape_date.to_rfc3339()],
        )?;
        Ok(())
    }
}
