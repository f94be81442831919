use crate::models::{Enrichment, ListingDetails, ListingRecord};
use crate::scrapers::error::ScrapeError;
use crate::scrapers::traits::{ListingSite, PageFetcher};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct EnrichOutcome {
    /// Every input record, in input order
    pub records: Vec<ListingRecord>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Visits each listing's own page once and attaches what it finds.
/// A failure is recorded on that listing only; the batch always completes.
pub struct Enricher<'a> {
    site: &'a dyn ListingSite,
    fetcher: &'a dyn PageFetcher,
    max_listings: Option<usize>,
}

impl<'a> Enricher<'a> {
    pub fn new(site: &'a dyn ListingSite, fetcher: &'a dyn PageFetcher, max_listings: Option<usize>) -> Self {
        Self {
            site,
            fetcher,
            max_listings,
        }
    }

    async fn fetch_details(&self, record: &ListingRecord) -> Result<ListingDetails, ScrapeError> {
        let url = Url::parse(&record.property_url)?;
        let html = self.fetcher.fetch(&url).await?;
        self.site.parse_detail_page(&html)
    }

    async fn enrich_one(&self, record: &ListingRecord) -> Enrichment {
        match self.fetch_details(record).await {
            Ok(details) => Enrichment::Succeeded(details),
            Err(e) => {
                warn!("Error scraping {}: {}", record.property_url, e);
                Enrichment::Failed { error: e.to_string() }
            }
        }
    }

    pub async fn enrich(&self, mut records: Vec<ListingRecord>) -> EnrichOutcome {
        let target = self
            .max_listings
            .map_or(records.len(), |max| max.min(records.len()));
        info!("Scraping details for {} individual listings...", target);

        let mut succeeded = 0;
        let mut failed = 0;

        for (i, record) in records.iter_mut().take(target).enumerate() {
            info!(
                "Scraping listing {}/{}: {}",
                i + 1,
                target,
                record.address.as_deref().unwrap_or(&record.property_url)
            );

            record.enrichment = self.enrich_one(record).await;
            if record.enrichment.succeeded() {
                succeeded += 1;
            } else {
                failed += 1;
            }

            if (i + 1) % 10 == 0 {
                info!("Progress: {}/{} listings scraped", i + 1, target);
            }
        }

        info!("Successful scrapes: {}", succeeded);
        info!("Failed scrapes: {}", failed);
        if target > 0 {
            info!("Success rate: {:.1}%", succeeded as f64 / target as f64 * 100.0);
        }

        EnrichOutcome {
            records,
            attempted: target,
            succeeded,
            failed,
        }
    }
}
