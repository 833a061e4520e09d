// Catalog locale and clock, injected into the parser
use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static POLISH_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Znaleźliśmy\s+(?:ponad\s+)?(\d+)\s+ogłosze(?:ń|nie|nia)").expect("valid count regex")
});

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Always reports the same instant.
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Site wording the parser depends on.
#[derive(Debug, Clone)]
pub struct CatalogLocale {
    /// Lower-case word marking a listing posted today.
    pub today_token: String,
    /// Qualifier stripped from price text before digits are extracted.
    pub negotiable_token: String,
    /// Banner pattern; capture group 1 holds the listing count.
    pub count_pattern: Regex,
    pub month_names: [String; 12],
}

impl CatalogLocale {
    /// olx.pl wording. Month names are genitive, the way the site prints dates.
    pub fn polish() -> Self {
        Self {
            today_token: "dzisiaj".into(),
            negotiable_token: "do negocjacji".into(),
            count_pattern: POLISH_COUNT.clone(),
            month_names: [
                "stycznia",
                "lutego",
                "marca",
                "kwietnia",
                "maja",
                "czerwca",
                "lipca",
                "sierpnia",
                "września",
                "października",
                "listopada",
                "grudnia",
            ]
            .map(String::from),
        }
    }

    /// `15 marca 2024`
    pub fn format_date(&self, date: NaiveDate) -> String {
        format!(
            "{:02} {} {}",
            date.day(),
            self.month_names[date.month0() as usize],
            date.year()
        )
    }

    /// Reads the count from banner text; `None` when the wording is not recognised.
    pub fn parse_count(&self, banner: &str) -> Option<u64> {
        self.count_pattern
            .captures(banner)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}
