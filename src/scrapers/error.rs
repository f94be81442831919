use reqwest::StatusCode;

/// Failures while fetching or decoding one page
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: StatusCode, url: String },
    #[error("embedded data payload not found in page")]
    MissingPayload,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected payload shape: {0}")]
    UnexpectedShape(String),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid result index: {0}")]
    InvalidIndex(String),
    #[error("no size or letting details found on page")]
    NoDetails,
}

impl ScrapeError {
    /// Transport failures end pagination; decoding failures only cost the page
    pub fn ends_pagination(&self) -> bool {
        matches!(
            self,
            ScrapeError::Http(_)
                | ScrapeError::Status { .. }
                | ScrapeError::InvalidUrl(_)
                | ScrapeError::InvalidIndex(_)
        )
    }
}
