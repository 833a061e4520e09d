use crate::model::{ListingRecord, ScanError};
use crate::parser::Parser;
use crate::query::{DEFAULT_ORIGIN, QueryDescriptor};
use crate::scraper::PageFetcher;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs the pagination loop of one query.
///
/// Pages are fetched strictly one after another: the loop stops once the
/// page limit is reached or the collected items cover the reported total.
/// Any fetch or banner failure aborts the query and drops what was
/// collected so far.
pub struct QueryScanner {
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn Parser>,
    origin: String,
    page_limit: u32,
    debug_html_dir: Option<PathBuf>,
}

impl QueryScanner {
    pub fn new(fetcher: Arc<dyn PageFetcher>, parser: Arc<dyn Parser>, page_limit: u32) -> Self {
        Self {
            fetcher,
            parser,
            origin: DEFAULT_ORIGIN.to_string(),
            page_limit: page_limit.max(1),
            debug_html_dir: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Pages whose count banner cannot be read are dumped here.
    pub fn with_debug_html_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_html_dir = Some(dir.into());
        self
    }

    pub async fn scan(
        &self,
        query: &QueryDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Vec<ListingRecord>, ScanError> {
        let label = query.label();
        let mut listings = Vec::new();
        let mut page = 1;

        loop {
            let url = query.build_page_url_on(&self.origin, page);
            debug!("[{}] fetching page {}: {}", label, page, url);

            let html = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ScanError::Cancelled { page }),
                fetched = self.fetcher.fetch(&url) => {
                    fetched.map_err(|source| ScanError::Fetch { page, source })?
                }
            };

            let extracted = match self.parser.parse(&html) {
                Ok(extracted) => extracted,
                Err(source) => {
                    if let Some(dir) = &self.debug_html_dir {
                        log_and_save_html(dir, &html, &label);
                    }
                    return Err(ScanError::Extract { page, source });
                }
            };

            let found = extracted.items.len();
            listings.extend(extracted.items);
            info!(
                "[{}] page {}: {} items ({} of {} collected)",
                label,
                page,
                found,
                listings.len(),
                extracted.total_count
            );

            if page >= self.page_limit || listings.len() as u64 >= extracted.total_count {
                break;
            }
            page += 1;
        }

        info!("[{}] scan finished after {} page(s), {} listings", label, page, listings.len());
        Ok(listings)
    }
}

/// Logs and saves the provided HTML for debugging purposes.
fn log_and_save_html(folder: &Path, html: &str, label: &str) {
    if let Err(e) = fs::create_dir_all(folder) {
        warn!("Failed to create debug folder: {}", e);
        return;
    }
    let filename = folder.join(format!("debug-{}.html", label.replace([' ', '/'], "_")));
    if let Err(e) = fs::write(&filename, html) {
        warn!("Failed to write debug HTML: {}", e);
    } else {
        info!("Saved debug HTML: {}", filename.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtractError, FetchError};
    use crate::parser::ExtractedPage;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies keyed by page number and records requested URLs.
    struct PagedFetcher {
        pages: HashMap<u32, Result<String, u16>>,
        requested: Mutex<Vec<String>>,
    }

    impl PagedFetcher {
        fn new(pages: Vec<(u32, Result<String, u16>)>) -> Self {
            Self {
                pages: pages.into_iter().collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl PageFetcher for PagedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            let page: u32 = url
                .split("page=")
                .nth(1)
                .and_then(|rest| rest.split('&').next())
                .and_then(|n| n.parse().ok())
                .unwrap_or(1);
            match self.pages.get(&page) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(FetchError::HttpStatus {
                    status: *status,
                    url: url.to_string(),
                }),
                None => Err(FetchError::HttpStatus {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }

    /// Bodies are `"<total>:<items>"` or `"broken"`.
    struct CountingParser;

    impl Parser for CountingParser {
        fn parse(&self, html: &str) -> Result<ExtractedPage, ExtractError> {
            let (total, items) = html
                .split_once(':')
                .ok_or(ExtractError::MissingCountBanner)?;
            let total: u64 = total.parse().unwrap();
            let items: usize = items.parse().unwrap();
            Ok(ExtractedPage {
                total_count: total,
                items: (0..items)
                    .map(|i| ListingRecord {
                        title: format!("item {i}"),
                        price: i as u64,
                        location: String::new(),
                        date: String::new(),
                        item_url: format!("https://www.olx.pl/d/{i}"),
                        photo_url: String::new(),
                    })
                    .collect(),
            })
        }
    }

    fn scanner(fetcher: Arc<PagedFetcher>, page_limit: u32) -> QueryScanner {
        QueryScanner::new(fetcher, Arc::new(CountingParser), page_limit)
    }

    #[tokio::test]
    async fn stops_at_page_limit_and_keeps_overfetch() {
        let fetcher = Arc::new(PagedFetcher::new(vec![
            (1, Ok("25:10".into())),
            (2, Ok("25:10".into())),
            (3, Ok("25:10".into())),
            (4, Ok("25:10".into())),
        ]));
        let listings = scanner(fetcher.clone(), 3)
            .scan(&QueryDescriptor::new("boss chorus"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(listings.len(), 30);
        assert_eq!(fetcher.requested().len(), 3);
    }

    #[tokio::test]
    async fn stops_once_total_is_covered() {
        let fetcher = Arc::new(PagedFetcher::new(vec![
            (1, Ok("8:10".into())),
            (2, Ok("8:10".into())),
        ]));
        let listings = scanner(fetcher.clone(), 5)
            .scan(&QueryDescriptor::new("mxr"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(listings.len(), 10);
        assert_eq!(fetcher.requested().len(), 1);
        assert!(!fetcher.requested()[0].contains("page="));
    }

    #[tokio::test]
    async fn walks_pages_in_order() {
        let fetcher = Arc::new(PagedFetcher::new(vec![
            (1, Ok("25:10".into())),
            (2, Ok("25:10".into())),
            (3, Ok("25:5".into())),
        ]));
        let listings = scanner(fetcher.clone(), 10)
            .scan(&QueryDescriptor::new("mxr"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(listings.len(), 25);
        let requested = fetcher.requested();
        assert!(requested[1].contains("page=2&"));
        assert!(requested[2].contains("page=3&"));
    }

    #[tokio::test]
    async fn zero_results_stop_after_first_page() {
        let fetcher = Arc::new(PagedFetcher::new(vec![(1, Ok("0:0".into()))]));
        let listings = scanner(fetcher.clone(), 5)
            .scan(&QueryDescriptor::new("nothing"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(listings.is_empty());
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_discards_collected_pages() {
        let fetcher = Arc::new(PagedFetcher::new(vec![(1, Ok("30:10".into())), (2, Err(503))]));
        let result = scanner(fetcher, 3)
            .scan(&QueryDescriptor::new("mxr"), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(ScanError::Fetch {
                page: 2,
                source: FetchError::HttpStatus { status: 503, .. }
            })
        ));
    }

    #[tokio::test]
    async fn missing_banner_fails_and_dumps_page() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(PagedFetcher::new(vec![(1, Ok("broken".into()))]));
        let result = scanner(fetcher, 3)
            .with_debug_html_dir(dir.path())
            .scan(&QueryDescriptor::new("boss chorus"), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(ScanError::Extract {
                page: 1,
                source: ExtractError::MissingCountBanner
            })
        ));
        let dumped = fs::read_to_string(dir.path().join("debug-Boss_chorus_-_100km.html")).unwrap();
        assert_eq!(dumped, "broken");
    }

    #[tokio::test]
    async fn cancelled_scan_fetches_nothing() {
        let fetcher = Arc::new(PagedFetcher::new(vec![(1, Ok("5:5".into()))]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = scanner(fetcher.clone(), 3)
            .scan(&QueryDescriptor::new("mxr"), &cancel)
            .await;

        assert!(matches!(result, Err(ScanError::Cancelled { page: 1 })));
        assert!(fetcher.requested().is_empty());
    }
}
