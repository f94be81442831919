use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

mod lease;

pub use lease::LeaseDetails;

/// Outward postcode, e.g. "SE8" out of "Deptford High Street, London SE8"
static POSTAL_AREA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{1,2}[0-9][A-Z0-9]?)\b").expect("valid postcode regex"));

/// How often the advertised price is billed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frequency {
    Weekly,
    Monthly,
    #[default]
    Unspecified,
}

impl Frequency {
    /// Map the site's free-form frequency string
    pub fn from_site(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("weekly") => Frequency::Weekly,
            Some("monthly") => Frequency::Monthly,
            _ => Frequency::Unspecified,
        }
    }

    /// Label used in exports; unspecified is written as an empty cell
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Unspecified => "",
        }
    }
}

/// Attributes only present on a listing's own detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingDetails {
    pub letting_details: LeaseDetails,
    pub size_sqft: Option<u32>,
    pub size_sqm: Option<u32>,
}

impl ListingDetails {
    /// True when neither a size nor a single letting detail was found
    pub fn is_empty(&self) -> bool {
        self.letting_details.is_empty() && self.size_sqft.is_none() && self.size_sqm.is_none()
    }
}

/// Outcome of the detail-page pass for one listing
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Enrichment {
    #[default]
    NotAttempted,
    Succeeded(ListingDetails),
    Failed { error: String },
}

impl Enrichment {
    pub fn details(&self) -> Option<&ListingDetails> {
        match self {
            Enrichment::Succeeded(details) => Some(details),
            _ => None,
        }
    }

    pub fn was_attempted(&self) -> bool {
        !matches!(self, Enrichment::NotAttempted)
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Enrichment::Succeeded(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Enrichment::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// One scraped property advertisement
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub id: String,
    /// `None` for unlisted or "price on application" adverts
    pub price: Option<f64>,
    pub price_display: Option<String>,
    pub frequency: Frequency,
    pub property_type: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub address: Option<String>,
    pub summary: Option<String>,
    pub property_url: String,
    pub contact_url: Option<String>,
    pub branch: Option<String>,
    pub branch_id: Option<String>,
    /// e.g. "Added today", "Reduced on 03/10/2025"
    pub added_or_reduced: Option<String>,
    pub first_visible_date: Option<String>,
    pub let_type: Option<String>,
    pub postcode: Option<String>,
    pub search_date: DateTime<Utc>,
    pub enrichment: Enrichment,
}

impl ListingRecord {
    /// A record with only the identifying fields set, everything else null
    pub fn new(id: impl Into<String>, property_url: impl Into<String>, search_date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            price: None,
            price_display: None,
            frequency: Frequency::Unspecified,
            property_type: None,
            bedrooms: None,
            bathrooms: None,
            address: None,
            summary: None,
            property_url: property_url.into(),
            contact_url: None,
            branch: None,
            branch_id: None,
            added_or_reduced: None,
            first_visible_date: None,
            let_type: None,
            postcode: None,
            search_date,
            enrichment: Enrichment::NotAttempted,
        }
    }

    pub fn details(&self) -> Option<&ListingDetails> {
        self.enrichment.details()
    }

    pub fn size_sqm(&self) -> Option<u32> {
        self.details().and_then(|d| d.size_sqm)
    }

    pub fn size_sqft(&self) -> Option<u32> {
        self.details().and_then(|d| d.size_sqft)
    }
}

/// Extract the postal area code from free-text address
pub fn postal_area(address: &str) -> Option<String> {
    POSTAL_AREA
        .captures(address)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Accept only finite, non-negative amounts
pub fn sanitize_price(amount: Option<f64>) -> Option<f64> {
    amount.filter(|p| p.is_finite() && *p >= 0.0)
}
