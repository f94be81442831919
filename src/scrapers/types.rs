use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Knobs for one scraping run
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Minimum gap between any two requests
    pub delay: Duration,
    /// Per-request timeout
    pub timeout: Duration,
    pub user_agent: String,
    /// Search pages to fetch at most (`None` = all the site offers)
    pub max_pages: Option<u32>,
    /// Detail pages to visit at most (`None` = every collected listing)
    pub max_listings: Option<usize>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1500),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_pages: None,
            max_listings: None,
        }
    }
}

/// Search filters recovered from the operator's URL, echoed in the report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub location: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_bedrooms: Option<String>,
    pub max_bedrooms: Option<String>,
    pub property_types: Option<String>,
    pub exclude: Option<String>,
    pub include_let_agreed: bool,
    pub search_url: String,
}

impl SearchCriteria {
    pub fn from_url(url: &Url) -> Self {
        let mut criteria = SearchCriteria {
            search_url: url.to_string(),
            ..Default::default()
        };

        for (key, value) in url.query_pairs() {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "searchLocation" => criteria.location = Some(value),
                "displayLocationIdentifier" if criteria.location.is_none() => {
                    let name = value.trim_end_matches(".html").replace('-', " ");
                    if name != "undefined" {
                        criteria.location = Some(name);
                    }
                }
                "minPrice" => criteria.min_price = Some(value),
                "maxPrice" => criteria.max_price = Some(value),
                "minBedrooms" => criteria.min_bedrooms = Some(value),
                "maxBedrooms" => criteria.max_bedrooms = Some(value),
                "propertyTypes" => criteria.property_types = Some(value),
                "dontShow" => criteria.exclude = Some(value.replace(',', ", ")),
                "_includeLetAgreed" | "includeLetAgreed" => {
                    criteria.include_let_agreed = value == "on" || value == "true"
                }
                _ => {}
            }
        }

        criteria
    }

    /// Ordered label/value pairs for the report
    pub fn echo(&self) -> Vec<(&'static str, String)> {
        let any = |v: &Option<String>| v.clone().unwrap_or_else(|| "any".to_string());
        vec![
            ("Location", any(&self.location)),
            ("Min price", any(&self.min_price)),
            ("Max price", any(&self.max_price)),
            ("Min bedrooms", any(&self.min_bedrooms)),
            ("Max bedrooms", any(&self.max_bedrooms)),
            ("Property types", any(&self.property_types)),
            (
                "Exclude",
                self.exclude.clone().unwrap_or_else(|| "none".to_string()),
            ),
            (
                "Include let agreed",
                if self.include_let_agreed { "Yes" } else { "No" }.to_string(),
            ),
            ("Search URL", self.search_url.clone()),
        ]
    }
}
