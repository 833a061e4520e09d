use crate::query::{DEFAULT_ORIGIN, DEFAULT_RADIUS_KM, QueryDescriptor};
use crate::scraper::fetcher::DEFAULT_USER_AGENT;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const MAX_PAGE_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub item_query: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub distance: Option<u32>,
}

impl QueryConfig {
    pub fn to_descriptor(&self) -> QueryDescriptor {
        let mut descriptor = QueryDescriptor::new(self.item_query.trim())
            .with_radius_km(self.distance.unwrap_or(DEFAULT_RADIUS_KM));
        if let Some(city) = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            descriptor = descriptor.with_locality(city);
        }
        descriptor
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub search_queries: Vec<QueryConfig>,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub max_concurrent_queries: Option<usize>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default)]
    pub history_backend: HistoryBackend,
    /// Publish the queries that succeeded even when others failed.
    #[serde(default)]
    pub allow_partial: bool,
    #[serde(default)]
    pub debug_html_dir: Option<PathBuf>,
}

fn default_page_limit() -> u32 {
    1
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_base_url() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_history_path() -> PathBuf {
    PathBuf::from("scrape_history.json")
}

impl AppConfig {
    pub fn descriptors(&self) -> Vec<QueryDescriptor> {
        self.search_queries.iter().map(QueryConfig::to_descriptor).collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PAGE_LIMIT).contains(&self.page_limit) {
            return Err(ConfigError::Invalid(format!(
                "page_limit must be between 1 and {MAX_PAGE_LIMIT}, got {}",
                self.page_limit
            )));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("request_timeout_seconds must be positive".into()));
        }
        if self.max_concurrent_queries == Some(0) {
            return Err(ConfigError::Invalid("max_concurrent_queries must be positive".into()));
        }
        if let Some(position) = self
            .search_queries
            .iter()
            .position(|q| q.item_query.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "search_queries[{position}].item_query is empty"
            )));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url {:?}: {e}", self.base_url)))?;
        Ok(())
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let config = parse(r#"{"search_queries": [{"item_query": "boss chorus"}]}"#);
        assert_eq!(config.page_limit, 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.base_url, "https://www.olx.pl");
        assert_eq!(config.history_backend, HistoryBackend::Json);
        assert!(!config.allow_partial);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn queries_become_descriptors() {
        let config = parse(
            r#"{"search_queries": [
                {"item_query": "wzmacniacz gitarowy", "city": "legnica", "distance": 50},
                {"item_query": "mxr micro amp", "city": "  "}
            ], "history_backend": "sqlite"}"#,
        );
        let descriptors = config.descriptors();
        assert_eq!(descriptors[0].label(), "Wzmacniacz gitarowy - Legnica - 50km");
        assert_eq!(descriptors[1].locality(), None);
        assert_eq!(descriptors[1].radius_km(), 100);
        assert_eq!(config.history_backend, HistoryBackend::Sqlite);
    }

    #[test]
    fn page_limit_is_bounded() {
        let config = parse(r#"{"search_queries": [], "page_limit": 11}"#);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        let config = parse(r#"{"search_queries": [], "page_limit": 0}"#);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_item_query_is_rejected() {
        let config = parse(r#"{"search_queries": [{"item_query": "amp"}, {"item_query": " "}]}"#);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("search_queries[1]"));
    }

    #[test]
    fn load_config_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_config_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"search_queries": [{"item_query": "amp"}], "page_limit": 3}"#).unwrap();
        assert_eq!(load_config(&path).unwrap().page_limit, 3);

        fs::write(&path, r#"{"search_queries": [{"item_query": "amp"}], "page_limit": 30}"#).unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));
    }
}
