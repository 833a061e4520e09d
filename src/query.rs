use crate::utils::{capitalize, join_whitespace};

pub const DEFAULT_ORIGIN: &str = "https://www.olx.pl";
pub const DEFAULT_RADIUS_KM: u32 = 100;

/// Path segment used when no locality is given.
const ALL_LOCATIONS: &str = "oferty";
const PATH_SEPARATOR: char = '-';
const SORT_NEWEST_FIRST: &str = "search%5Border%5D=created_at%3Adesc";

/// One configured search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDescriptor {
    item_query: String,
    locality: Option<String>,
    radius_km: u32,
}

impl QueryDescriptor {
    pub fn new(item_query: impl Into<String>) -> Self {
        Self {
            item_query: item_query.into(),
            locality: None,
            radius_km: DEFAULT_RADIUS_KM,
        }
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn with_radius_km(mut self, radius_km: u32) -> Self {
        self.radius_km = radius_km;
        self
    }

    pub fn locality(&self) -> Option<&str> {
        self.locality.as_deref()
    }

    pub fn radius_km(&self) -> u32 {
        self.radius_km
    }

    pub fn build_page_url(&self, page: u32) -> String {
        self.build_page_url_on(DEFAULT_ORIGIN, page)
    }

    /// Newest-first results page on `origin`. Page 1 carries no page
    /// parameter; the radius filter only applies with a locality.
    pub fn build_page_url_on(&self, origin: &str, page: u32) -> String {
        let (location, radius) = match &self.locality {
            Some(locality) => (
                join_whitespace(locality, PATH_SEPARATOR),
                format!("search%5Bdist%5D={}&", self.radius_km),
            ),
            None => (ALL_LOCATIONS.to_string(), String::new()),
        };
        let item_query = join_whitespace(&self.item_query, PATH_SEPARATOR);
        let page_param = if page > 1 {
            format!("page={page}&")
        } else {
            String::new()
        };

        format!(
            "{}/{location}/q-{item_query}/?{page_param}{radius}{SORT_NEWEST_FIRST}",
            origin.trim_end_matches('/')
        )
    }

    /// `"Wzmacniacz gitarowy - Legnica - 100km"`; absent locality and a zero
    /// radius are left out.
    pub fn label(&self) -> String {
        let mut label = capitalize(&self.item_query);
        if let Some(locality) = &self.locality {
            label.push_str(" - ");
            label.push_str(&capitalize(locality));
        }
        if self.radius_km > 0 {
            label.push_str(&format!(" - {}km", self.radius_km));
        }
        label
    }
}
