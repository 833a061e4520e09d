// Core structs: ListingRecord, QueryResult, ScrapeSnapshot and the error taxonomy
use crate::utils::parse_datetime;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// One catalog card, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRecord {
    pub title: String,
    pub price: u64,
    pub location: String,
    pub date: String,
    pub item_url: String,
    pub photo_url: String,
}

/// Listings collected for one query, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub label: String,
    pub listings: Vec<ListingRecord>,
}

/// Label -> listings, in configuration order.
///
/// Inserting an existing label replaces its listings but keeps the
/// position of the first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSnapshot {
    results: Vec<QueryResult>,
}

impl ScrapeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: String, listings: Vec<ListingRecord>) {
        match self.results.iter_mut().find(|r| r.label == label) {
            Some(existing) => existing.listings = listings,
            None => self.results.push(QueryResult { label, listings }),
        }
    }

    pub fn get(&self, label: &str) -> Option<&[ListingRecord]> {
        self.results
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.listings.as_slice())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn total_listings(&self) -> usize {
        self.results.iter().map(|r| r.listings.len()).sum()
    }
}

/// A single line of scrape history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeHistoryEntry {
    #[serde(
        serialize_with = "serialize_timestamp",
        deserialize_with = "deserialize_timestamp"
    )]
    pub scrape_date: DateTime<FixedOffset>,
}

fn serialize_timestamp<S: Serializer>(
    value: &DateTime<FixedOffset>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<FixedOffset>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_datetime(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Fatal, page-level extraction failures.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("listing-count banner not found")]
    MissingCountBanner,

    #[error("listing-count banner not recognised: {0:?}")]
    UnparsableCount(String),
}

/// Card-level failure; never leaves the parser.
#[derive(Debug, Error)]
pub enum CardError {
    #[error("card has no {0}")]
    MissingField(&'static str),

    #[error("card link {href:?} is not a valid URL: {source}")]
    InvalidLink {
        href: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("page {page}: {source}")]
    Fetch {
        page: u32,
        #[source]
        source: FetchError,
    },

    #[error("page {page}: {source}")]
    Extract {
        page: u32,
        #[source]
        source: ExtractError,
    },

    #[error("scan cancelled before page {page}")]
    Cancelled { page: u32 },
}

/// Aggregate failure of one scrape run.
#[derive(Debug, Error)]
#[error("scrape of \"{label}\" failed ({failed_queries} of {total_queries} queries failed): {source}")]
pub struct ScrapeError {
    pub label: String,
    pub failed_queries: usize,
    pub total_queries: usize,
    #[source]
    pub source: ScanError,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("history store lock poisoned")]
    Poisoned,

    #[error("history write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
