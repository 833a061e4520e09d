pub mod config;
pub mod locale;
pub mod model;
pub mod normalizer;
pub mod orchestrator;
pub mod parser;
pub mod query;
pub mod scanner;
pub mod scraper;
pub mod storage;
pub mod utils;

pub use locale::{CatalogLocale, Clock, FixedClock, SystemClock};
pub use model::{
    ExtractError, FetchError, ListingRecord, QueryResult, ScanError, ScrapeError, ScrapeHistoryEntry,
    ScrapeSnapshot, StorageError,
};
pub use orchestrator::{PartialScrape, Published, QueryFailure, ScrapeOrchestrator, ScraperState};
pub use parser::{ExtractedPage, OlxParser, Parser};
pub use query::QueryDescriptor;
pub use scanner::QueryScanner;
pub use scraper::{HttpFetcher, PageFetcher};
pub use storage::{HistoryStore, JsonHistoryStore, ScrapeHistory, SqliteHistoryStore};
