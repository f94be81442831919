use crate::models::{ListingDetails, ListingRecord};
use crate::scrapers::error::ScrapeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

/// One decoded page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub listings: Vec<ListingRecord>,
    /// Pages the site says are available for this search
    pub total_pages: Option<u32>,
    /// Listings the site says match this search
    pub result_count: Option<u64>,
}

/// Everything that depends on how a particular property site renders its pages.
/// Pagination, deduplication and reporting only talk to this trait, so adding
/// another source (Zoopla, OnTheMarket, ...) means adding another implementation.
pub trait ListingSite: Send + Sync {
    /// Name of the source, used in logs
    fn source_name(&self) -> &'static str;

    /// Hard cap on pages the site will serve for one search
    fn max_pages(&self) -> u32;

    /// URL of the `page`-th results page (0-based) relative to the operator's URL.
    /// Fails when the page cannot be addressed from that URL.
    fn page_url(&self, template: &Url, page: u32) -> Result<Url, ScrapeError>;

    /// Decode listing summaries out of a results page
    fn parse_search_page(
        &self,
        html: &str,
        page_url: &Url,
        searched_at: DateTime<Utc>,
    ) -> Result<SearchPage, ScrapeError>;

    /// Pull size and letting details out of a listing page
    fn parse_detail_page(&self, html: &str) -> Result<ListingDetails, ScrapeError>;
}

/// Source of raw page bodies
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return the body; non-success statuses are errors
    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError>;
}
