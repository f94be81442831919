use crate::models::ListingRecord;
use crate::scrapers::dedup::dedup_by_id;
use crate::scrapers::traits::{ListingSite, PageFetcher};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use url::Url;

/// Why the pagination loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Operator's page ceiling reached
    CeilingReached,
    /// The site will not serve more pages for one search
    SiteLimitReached,
    /// Empty page, or every page the site advertised has been read
    NoMoreResults,
    /// Connection failure, timeout or non-success status
    TransportFailure,
    /// The next page's URL could not be built from the operator's URL
    InvalidPageUrl,
}

#[derive(Debug, Clone)]
pub struct PageFailure {
    /// 1-based page number
    pub page: u32,
    pub url: String,
    pub error: String,
}

#[derive(Debug)]
pub struct CollectOutcome {
    pub records: Vec<ListingRecord>,
    pub pages_fetched: u32,
    pub failed_pages: Vec<PageFailure>,
    pub duplicates_removed: usize,
    /// Listings the site claimed for the search, if it said
    pub result_count: Option<u64>,
    pub stop_reason: StopReason,
}

/// Walks search-result pages one request at a time
pub struct Collector<'a> {
    site: &'a dyn ListingSite,
    fetcher: &'a dyn PageFetcher,
    max_pages: Option<u32>,
}

impl<'a> Collector<'a> {
    pub fn new(site: &'a dyn ListingSite, fetcher: &'a dyn PageFetcher, max_pages: Option<u32>) -> Self {
        Self {
            site,
            fetcher,
            max_pages,
        }
    }

    fn limit_reached(&self, page: u32, advertised: Option<u32>) -> Option<StopReason> {
        if self.max_pages.is_some_and(|max| page >= max) {
            Some(StopReason::CeilingReached)
        } else if page >= self.site.max_pages() {
            Some(StopReason::SiteLimitReached)
        } else if advertised.is_some_and(|total| page >= total) {
            Some(StopReason::NoMoreResults)
        } else {
            None
        }
    }

    /// Fetch pages until a ceiling, an empty page or a transport failure,
    /// then deduplicate. Records gathered before a failure are kept.
    pub async fn collect(&self, template: &Url, searched_at: DateTime<Utc>) -> CollectOutcome {
        info!("Starting {} scrape", self.site.source_name());

        let mut records = Vec::new();
        let mut failed_pages = Vec::new();
        let mut pages_fetched = 0;
        let mut advertised_pages = None;
        let mut result_count = None;
        let mut page = 0;

        let stop_reason = loop {
            if let Some(reason) = self.limit_reached(page, advertised_pages) {
                break reason;
            }

            let url = match self.site.page_url(template, page) {
                Ok(url) => url,
                Err(e) => {
                    error!("✗ Cannot address page {}: {}", page + 1, e);
                    failed_pages.push(PageFailure {
                        page: page + 1,
                        url: template.to_string(),
                        error: e.to_string(),
                    });
                    break StopReason::InvalidPageUrl;
                }
            };
            info!("Fetching page {}...", page + 1);

            let html = match self.fetcher.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    error!("✗ Page {} failed: {}", page + 1, e);
                    failed_pages.push(PageFailure {
                        page: page + 1,
                        url: url.to_string(),
                        error: e.to_string(),
                    });
                    if e.ends_pagination() {
                        warn!("Stopping at page {}", page + 1);
                        break StopReason::TransportFailure;
                    }
                    page += 1;
                    continue;
                }
            };
            pages_fetched += 1;

            match self.site.parse_search_page(&html, &url, searched_at) {
                Ok(result) => {
                    if page == 0 {
                        if let Some(count) = result.result_count {
                            info!("Total results available: {}", count);
                        }
                        if let Some(total) = result.total_pages {
                            info!("Total pages available: {}", total);
                        }
                    }
                    if result.total_pages.is_some() {
                        advertised_pages = result.total_pages;
                    }
                    if result_count.is_none() {
                        result_count = result.result_count;
                    }

                    if result.listings.is_empty() {
                        info!("✗ No properties found on page {}, stopping", page + 1);
                        break StopReason::NoMoreResults;
                    }

                    info!("✓ Page {}: {} properties", page + 1, result.listings.len());
                    records.extend(result.listings);
                }
                Err(e) => {
                    warn!("✗ Could not decode page {}: {}", page + 1, e);
                    failed_pages.push(PageFailure {
                        page: page + 1,
                        url: url.to_string(),
                        error: e.to_string(),
                    });
                }
            }

            page += 1;
        };

        let (records, duplicates_removed) = dedup_by_id(records);

        info!("Total properties scraped: {}", records.len());
        if duplicates_removed > 0 {
            info!("Duplicates removed: {}", duplicates_removed);
        }
        if !failed_pages.is_empty() {
            warn!("{} page(s) failed", failed_pages.len());
        }

        CollectOutcome {
            records,
            pages_fetched,
            failed_pages,
            duplicates_removed,
            result_count,
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::fetcher::HttpFetcher;
    use crate::scrapers::fixtures::{listings, search_page};
    use crate::scrapers::rightmove::{Rightmove, SITE_MAX_PAGES};
    use crate::scrapers::types::ScrapeConfig;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&ScrapeConfig {
            delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    fn template(server: &MockServer) -> Url {
        Url::parse(&format!(
            "{}/property-to-rent/find.html?locationIdentifier=OUTCODE%5E2335&index=0",
            server.uri()
        ))
        .unwrap()
    }

    async fn mount_page(server: &MockServer, index: u32, body: String) {
        Mock::given(method("GET"))
            .and(path("/property-to-rent/find.html"))
            .and(query_param("index", index.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn overlapping_pages_are_deduplicated() {
        let server = MockServer::start().await;
        mount_page(&server, 0, search_page(listings(1..=25), None, Some("47"))).await;
        mount_page(&server, 24, search_page(listings(23..=47), None, None)).await;
        mount_page(&server, 48, search_page(vec![], None, None)).await;

        let site = Rightmove::new();
        let fetcher = fetcher();
        let outcome = Collector::new(&site, &fetcher, None)
            .collect(&template(&server), Utc::now())
            .await;

        assert_eq!(outcome.records.len(), 25 + 25 - 3);
        assert_eq!(outcome.duplicates_removed, 3);
        assert_eq!(outcome.pages_fetched, 3);
        assert_eq!(outcome.result_count, Some(47));
        assert_eq!(outcome.stop_reason, StopReason::NoMoreResults);
        assert_eq!(outcome.records[0].id, "1");
        assert_eq!(outcome.records.last().unwrap().id, "47");
    }

    #[tokio::test]
    async fn page_ceiling_bounds_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_page(listings(1..=3), None, None)))
            .expect(2)
            .mount(&server)
            .await;

        let site = Rightmove::new();
        let fetcher = fetcher();
        let outcome = Collector::new(&site, &fetcher, Some(2))
            .collect(&template(&server), Utc::now())
            .await;

        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.stop_reason, StopReason::CeilingReached);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.duplicates_removed, 3);
    }

    #[tokio::test]
    async fn site_maximum_overrides_larger_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_page(listings(1..=2), None, None)))
            .expect(u64::from(SITE_MAX_PAGES))
            .mount(&server)
            .await;

        let site = Rightmove::new();
        let fetcher = fetcher();
        let outcome = Collector::new(&site, &fetcher, Some(500))
            .collect(&template(&server), Utc::now())
            .await;

        assert_eq!(outcome.pages_fetched, SITE_MAX_PAGES);
        assert_eq!(outcome.stop_reason, StopReason::SiteLimitReached);
    }

    #[tokio::test]
    async fn advertised_page_count_is_honoured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_page(listings(1..=2), Some(2), None)))
            .expect(2)
            .mount(&server)
            .await;

        let site = Rightmove::new();
        let fetcher = fetcher();
        let outcome = Collector::new(&site, &fetcher, None)
            .collect(&template(&server), Utc::now())
            .await;

        assert_eq!(outcome.pages_fetched, 2);
        assert_eq!(outcome.stop_reason, StopReason::NoMoreResults);
    }

    #[tokio::test]
    async fn error_status_keeps_partial_results() {
        let server = MockServer::start().await;
        mount_page(&server, 0, search_page(listings(1..=24), None, None)).await;
        Mock::given(method("GET"))
            .and(query_param("index", "24"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("index", "48"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_page(listings(49..=50), None, None)))
            .expect(0)
            .mount(&server)
            .await;

        let site = Rightmove::new();
        let fetcher = fetcher();
        let outcome = Collector::new(&site, &fetcher, None)
            .collect(&template(&server), Utc::now())
            .await;

        assert_eq!(outcome.records.len(), 24);
        assert_eq!(outcome.stop_reason, StopReason::TransportFailure);
        assert_eq!(outcome.failed_pages.len(), 1);
        assert_eq!(outcome.failed_pages[0].page, 2);
        assert!(outcome.failed_pages[0].error.contains("429"));
    }

    #[tokio::test]
    async fn undecodable_page_is_skipped() {
        let server = MockServer::start().await;
        mount_page(&server, 0, search_page(listings(1..=3), None, None)).await;
        mount_page(&server, 24, "<html><body>Something went wrong</body></html>".to_string()).await;
        mount_page(&server, 48, search_page(listings(4..=5), None, None)).await;
        mount_page(&server, 72, search_page(vec![], None, None)).await;

        let site = Rightmove::new();
        let fetcher = fetcher();
        let outcome = Collector::new(&site, &fetcher, None)
            .collect(&template(&server), Utc::now())
            .await;

        let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(outcome.failed_pages.len(), 1);
        assert_eq!(outcome.failed_pages[0].page, 2);
        assert_eq!(outcome.pages_fetched, 4);
        assert_eq!(outcome.stop_reason, StopReason::NoMoreResults);
    }

    #[tokio::test]
    async fn unaddressable_page_stops_without_panicking() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("index", "4294967290"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_page(listings(1..=2), None, None)))
            .expect(1)
            .mount(&server)
            .await;

        let template = Url::parse(&format!("{}/property-to-rent/find.html?index=4294967290", server.uri())).unwrap();
        let site = Rightmove::new();
        let fetcher = fetcher();
        let outcome = Collector::new(&site, &fetcher, None).collect(&template, Utc::now()).await;

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(outcome.stop_reason, StopReason::InvalidPageUrl);
        assert_eq!(outcome.failed_pages.len(), 1);
        assert_eq!(outcome.failed_pages[0].page, 2);
    }

    #[tokio::test]
    async fn records_carry_run_timestamp() {
        let server = MockServer::start().await;
        mount_page(&server, 0, search_page(listings(1..=2), Some(1), None)).await;

        let site = Rightmove::new();
        let fetcher = fetcher();
        let searched_at = Utc::now();
        let outcome = Collector::new(&site, &fetcher, None)
            .collect(&template(&server), searched_at)
            .await;

        assert!(outcome.records.iter().all(|r| r.search_date == searched_at));
    }
}
