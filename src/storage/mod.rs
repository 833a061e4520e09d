pub mod json;
pub mod sqlite;

pub use json::JsonHistoryStore;
pub use sqlite::SqliteHistoryStore;

use crate::model::{ScrapeHistoryEntry, StorageError};
use chrono::{DateTime, FixedOffset};
use tracing::warn;

/// Append-only record of successful scrapes.
pub trait HistoryStore: Send + Sync {
    /// All entries, oldest first. A store that does not exist yet is empty.
    fn load(&self) -> Result<Vec<ScrapeHistoryEntry>, StorageError>;

    fn append(&self, entry: &ScrapeHistoryEntry) -> Result<(), StorageError>;
}

/// In-memory view of the history, seeded from a store at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeHistory {
    entries: Vec<ScrapeHistoryEntry>,
}

impl ScrapeHistory {
    pub fn new(entries: Vec<ScrapeHistoryEntry>) -> Self {
        Self { entries }
    }

    /// Unreadable history counts as empty.
    pub fn load_from(store: &dyn HistoryStore) -> Self {
        match store.load() {
            Ok(entries) => Self::new(entries),
            Err(e) => {
                warn!("Failed to load scrape history, starting empty: {}", e);
                Self::default()
            }
        }
    }

    pub fn push(&mut self, entry: ScrapeHistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ScrapeHistoryEntry] {
        &self.entries
    }

    pub fn last_scrape(&self) -> Option<DateTime<FixedOffset>> {
        self.entries.last().map(|e| e.scrape_date)
    }
}
