pub mod collector;
pub mod dedup;
pub mod enricher;
pub mod error;
pub mod fetcher;
pub mod rightmove;
pub mod traits;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use collector::Collector;
pub use enricher::Enricher;
pub use fetcher::HttpFetcher;
pub use rightmove::Rightmove;
pub use traits::ListingSite;
pub use types::{ScrapeConfig, SearchCriteria};
