// olx.pl-specific HTML parsing
use crate::locale::{CatalogLocale, Clock};
use crate::model::{CardError, ExtractError, ListingRecord};
use crate::normalizer::{normalize_price, split_location_date};
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, LazyLock};
use tracing::warn;
use url::Url;

static CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-cy="l-card"]"#).expect("valid card selector"));
static TOTAL_COUNT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"span[data-testid="total-count"]"#).expect("valid count selector")
});
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h6").expect("valid title selector"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"p[data-testid="ad-price"]"#).expect("valid price selector")
});
static FIRST_PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"p:not([data-testid="location-date"])"#).expect("valid paragraph selector")
});
static LOCATION_DATE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"p[data-testid="location-date"]"#).expect("valid location selector")
});
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").expect("valid image selector"));

/// What one results page yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub total_count: u64,
    pub items: Vec<ListingRecord>,
}

pub trait Parser: Send + Sync {
    fn parse(&self, html: &str) -> Result<ExtractedPage, ExtractError>;
}

pub struct OlxParser {
    base_url: Url,
    locale: CatalogLocale,
    clock: Arc<dyn Clock>,
}

impl OlxParser {
    pub fn new(base_url: Url, locale: CatalogLocale, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_url,
            locale,
            clock,
        }
    }

    fn parse_count(&self, document: &Html) -> Result<u64, ExtractError> {
        let banner = document
            .select(&TOTAL_COUNT)
            .next()
            .ok_or(ExtractError::MissingCountBanner)?;
        let text = element_text(banner);
        self.locale
            .parse_count(&text)
            .ok_or(ExtractError::UnparsableCount(text))
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Result<ListingRecord, CardError> {
        let title = card
            .select(&TITLE)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .ok_or(CardError::MissingField("title"))?;

        let price_node = card
            .select(&PRICE)
            .next()
            .or_else(|| card.select(&FIRST_PARAGRAPH).next())
            .ok_or(CardError::MissingField("price"))?;
        let price = normalize_price(&element_text(price_node), &self.locale);

        let href = card
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .ok_or(CardError::MissingField("link"))?;
        let item_url = self
            .base_url
            .join(href)
            .map_err(|source| CardError::InvalidLink {
                href: href.to_string(),
                source,
            })?;

        let (location, date) = match card.select(&LOCATION_DATE).next() {
            Some(node) => split_location_date(&element_text(node), &self.locale, self.clock.as_ref()),
            None => (String::new(), String::new()),
        };

        let photo_url = card
            .select(&IMAGE)
            .next()
            .and_then(|img| img.value().attr("src"))
            .unwrap_or_default()
            .to_string();

        Ok(ListingRecord {
            title,
            price,
            location,
            date,
            item_url: item_url.to_string(),
            photo_url,
        })
    }
}

impl Parser for OlxParser {
    fn parse(&self, html: &str) -> Result<ExtractedPage, ExtractError> {
        let document = Html::parse_document(html);
        let total_count = self.parse_count(&document)?;

        // With nothing found the site fills the page with unrelated promoted cards.
        if total_count == 0 {
            return Ok(ExtractedPage {
                total_count,
                items: Vec::new(),
            });
        }

        let mut items = Vec::new();
        for (index, card) in document.select(&CARD).enumerate() {
            match self.parse_card(card) {
                Ok(record) => items.push(record),
                Err(e) => warn!("Skipping card #{}: {}", index, e),
            }
        }

        Ok(ExtractedPage { total_count, items })
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
