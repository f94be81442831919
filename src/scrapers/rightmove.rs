use crate::models::{postal_area, sanitize_price, Frequency, LeaseDetails, ListingDetails, ListingRecord};
use crate::scrapers::error::ScrapeError;
use crate::scrapers::traits::{ListingSite, SearchPage};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

/// Rightmove serves 24 listings per results page
pub const RESULTS_PER_PAGE: u32 = 24;

/// Rightmove stops paging at 1,000 results
pub const SITE_MAX_PAGES: u32 = 42;

const LETTING_TERMS: [&str; 6] = [
    "let available date",
    "deposit",
    "min. tenancy",
    "let type",
    "furnish type",
    "council tax",
];

static NEXT_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__"[^>]*>(.*?)</script>"#).expect("valid payload regex")
});
static SQFT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:,\d{3})*(?:\.\d+)?)\s*(?:sq\.?\s*f(?:ee)?t|square\s*f(?:ee|oo)t)")
        .expect("valid sq ft regex")
});
static SQM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:,\d{3})*(?:\.\d+)?)\s*(?:sq\.?\s*m(?:etres?|eters?)?\b|square\s*met(?:re|er)s?|m²)")
        .expect("valid sq m regex")
});
static DEPOSIT_TOOLTIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\s*(?:A deposit provides security for a landlord.*|Read\s*more.*glossary.*|aboutdepositin.*)$")
        .expect("valid tooltip regex")
});
static HEADINGS_AND_LISTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, dl").expect("valid selector"));
static TERMS_AND_DEFINITIONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("dt, dd").expect("valid selector"));
static DL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dl").expect("valid selector"));
static DIV: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").expect("valid selector"));
static DT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dt").expect("valid selector"));
static DD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dd").expect("valid selector"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid selector"));

#[derive(Debug, Deserialize)]
struct NextData {
    props: Props,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Props {
    page_props: PageProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageProps {
    search_results: Option<SearchResults>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResults {
    #[serde(default)]
    properties: Vec<RawProperty>,
    #[serde(default)]
    pagination: Option<Pagination>,
    #[serde(default)]
    result_count: Value,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    total: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawProperty {
    id: Value,
    price: Option<RawPrice>,
    property_sub_type: Option<String>,
    bedrooms: Value,
    bathrooms: Value,
    display_address: Option<String>,
    summary: Option<String>,
    property_url: Option<String>,
    contact_url: Option<String>,
    customer: Option<RawCustomer>,
    added_or_reduced: Option<String>,
    first_visible_date: Option<String>,
    let_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawPrice {
    amount: Value,
    frequency: Option<String>,
    display_prices: Vec<DisplayPrice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DisplayPrice {
    display_price: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawCustomer {
    branch_display_name: Option<String>,
    branch_id: Value,
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace([',', '£'], "").trim().parse().ok(),
        _ => None,
    }
}

fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Collapse the text of an element into one whitespace-normalised line
fn element_text(element: ElementRef) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn parse_size(text: &str, pattern: &Regex) -> Option<u32> {
    let caps = pattern.captures(text)?;
    let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    if number.is_finite() && number >= 0.0 && number <= u32::MAX as f64 {
        Some(number.round() as u32)
    } else {
        None
    }
}

/// Result offset the operator's URL starts at; a missing or empty `index` is 0
fn start_index(template: &Url) -> Result<u32, ScrapeError> {
    match template.query_pairs().find(|(k, _)| k == "index") {
        Some((_, v)) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| ScrapeError::InvalidIndex(v.into_owned())),
        _ => Ok(0),
    }
}

/// Drop the glossary tooltip Rightmove renders inside the deposit cell
pub fn clean_deposit_value(value: &str) -> String {
    DEPOSIT_TOOLTIP.replace(value, "").trim().to_string()
}

fn detail_key(dt: ElementRef) -> String {
    element_text(dt).replace(':', "").trim().to_lowercase()
}

fn detail_value(key: &str, dd: ElementRef) -> String {
    let value = element_text(dd);
    if key.contains("deposit") {
        clean_deposit_value(&value)
    } else {
        value
    }
}

/// Rightmove adapter: search results come from the Next.js data blob,
/// listing pages are read through their rendered markup.
#[derive(Debug, Clone, Default)]
pub struct Rightmove;

impl Rightmove {
    pub fn new() -> Self {
        Self
    }

    fn to_record(&self, raw: RawProperty, page_url: &Url, searched_at: DateTime<Utc>) -> Option<ListingRecord> {
        let id = value_to_string(&raw.id)?;

        let property_url = match raw.property_url.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(path) => page_url
                .join(path)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| path.to_string()),
            None => page_url.join(&format!("/properties/{}", id)).map(|u| u.to_string()).unwrap_or_default(),
        };

        let mut record = ListingRecord::new(id, property_url, searched_at);
        if let Some(price) = raw.price {
            record.price = sanitize_price(value_to_f64(&price.amount));
            record.price_display = non_empty(price.display_prices.into_iter().next().and_then(|p| p.display_price));
            record.frequency = Frequency::from_site(price.frequency.as_deref());
        }
        record.property_type = non_empty(raw.property_sub_type);
        record.bedrooms = value_to_u32(&raw.bedrooms);
        record.bathrooms = value_to_u32(&raw.bathrooms);
        record.address = non_empty(raw.display_address);
        record.summary = non_empty(raw.summary);
        record.contact_url = non_empty(raw.contact_url);
        if let Some(customer) = raw.customer {
            record.branch = non_empty(customer.branch_display_name);
            record.branch_id = value_to_string(&customer.branch_id);
        }
        record.added_or_reduced = non_empty(raw.added_or_reduced);
        record.first_visible_date = non_empty(raw.first_visible_date);
        record.let_type = non_empty(raw.let_type);
        record.postcode = record.address.as_deref().and_then(postal_area);

        Some(record)
    }

    fn letting_details_after_heading(&self, document: &Html) -> LeaseDetails {
        let mut details = LeaseDetails::new();
        let mut heading_seen = false;

        for element in document.select(&HEADINGS_AND_LISTS) {
            let name = element.value().name();
            if name == "h2" && element_text(element).to_lowercase().contains("letting details") {
                heading_seen = true;
            } else if name == "dl" && heading_seen {
                for div in element.select(&DIV) {
                    if let (Some(dt), Some(dd)) = (div.select(&DT).next(), div.select(&DD).next()) {
                        let key = detail_key(dt);
                        if !key.is_empty() {
                            let value = detail_value(&key, dd);
                            details.insert(key, value);
                        }
                    }
                }
                break;
            }
        }

        if !heading_seen {
            debug!("No letting details heading found");
        }
        details
    }

    fn letting_details_by_terms(&self, document: &Html) -> LeaseDetails {
        let mut details = LeaseDetails::new();
        for dl in document.select(&DL) {
            for div in dl.select(&DIV) {
                if let (Some(dt), Some(dd)) = (div.select(&DT).next(), div.select(&DD).next()) {
                    let key = detail_key(dt);
                    if LETTING_TERMS.iter().any(|term| key.contains(term)) {
                        let value = detail_value(&key, dd);
                        details.insert(key, value);
                    }
                }
            }
        }
        details
    }

    /// (sq ft, sq m) from the "SIZE" term of the key-facts list
    fn size_from_key_facts(&self, document: &Html) -> (Option<u32>, Option<u32>) {
        let mut size_term_seen = false;
        for element in document.select(&TERMS_AND_DEFINITIONS) {
            let name = element.value().name();
            if name == "dt" && element_text(element).to_lowercase().contains("size") {
                size_term_seen = true;
            } else if name == "dd" && size_term_seen {
                let text = element_text(element);
                let lower = text.to_lowercase();
                if lower.contains("ask agent") || lower.contains("contact") {
                    debug!("Size not published (ask agent)");
                    return (None, None);
                }
                return (parse_size(&text, &SQFT), parse_size(&text, &SQM));
            }
        }
        (None, None)
    }

    fn size_from_body_text(&self, document: &Html) -> (Option<u32>, Option<u32>) {
        let text = document
            .select(&BODY)
            .next()
            .map(element_text)
            .unwrap_or_default();
        (parse_size(&text, &SQFT), parse_size(&text, &SQM))
    }
}

impl ListingSite for Rightmove {
    fn source_name(&self) -> &'static str {
        "Rightmove"
    }

    fn max_pages(&self) -> u32 {
        SITE_MAX_PAGES
    }

    fn page_url(&self, template: &Url, page: u32) -> Result<Url, ScrapeError> {
        let start = start_index(template)?;
        let index = page
            .checked_mul(RESULTS_PER_PAGE)
            .and_then(|offset| start.checked_add(offset))
            .ok_or_else(|| ScrapeError::InvalidIndex(format!("{} plus page {} is out of range", start, page + 1)))?;

        let pairs: Vec<(String, String)> = template
            .query_pairs()
            .filter(|(k, _)| k != "index")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut url = template.clone();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("index", &index.to_string());
        Ok(url)
    }

    fn parse_search_page(
        &self,
        html: &str,
        page_url: &Url,
        searched_at: DateTime<Utc>,
    ) -> Result<SearchPage, ScrapeError> {
        let blob = NEXT_DATA
            .captures(html)
            .and_then(|caps| caps.get(1))
            .ok_or(ScrapeError::MissingPayload)?;

        let data: NextData = serde_json::from_str(blob.as_str())?;
        let results = data
            .props
            .page_props
            .search_results
            .ok_or_else(|| ScrapeError::UnexpectedShape("no searchResults in page props".to_string()))?;

        let raw_count = results.properties.len();
        let listings: Vec<ListingRecord> = results
            .properties
            .into_iter()
            .filter_map(|raw| self.to_record(raw, page_url, searched_at))
            .collect();

        if listings.len() < raw_count {
            warn!("Skipped {} listing entries without an id", raw_count - listings.len());
        }

        Ok(SearchPage {
            listings,
            total_pages: results.pagination.and_then(|p| p.total),
            result_count: value_to_f64(&results.result_count).map(|n| n as u64),
        })
    }

    fn parse_detail_page(&self, html: &str) -> Result<ListingDetails, ScrapeError> {
        let document = Html::parse_document(html);

        let mut letting_details = self.letting_details_after_heading(&document);
        if letting_details.is_empty() {
            debug!("Trying alternative method for letting details extraction");
            letting_details = self.letting_details_by_terms(&document);
        }

        let (mut size_sqft, mut size_sqm) = self.size_from_key_facts(&document);
        if size_sqft.is_none() && size_sqm.is_none() {
            (size_sqft, size_sqm) = self.size_from_body_text(&document);
        }

        let details = ListingDetails {
            letting_details,
            size_sqft,
            size_sqm,
        };

        if details.is_empty() {
            return Err(ScrapeError::NoDetails);
        }
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::fixtures::{detail_page, raw_listing, search_page};
    use serde_json::json;

    fn template() -> Url {
        Url::parse("https://www.rightmove.co.uk/property-to-rent/find.html?maxPrice=1500&index=0&channel=RENT").unwrap()
    }

    #[test]
    fn page_url_advances_index() {
        let site = Rightmove::new();
        let first = site.page_url(&template(), 0).unwrap();
        let third = site.page_url(&template(), 2).unwrap();

        let index = |u: &Url| u.query_pairs().find(|(k, _)| k == "index").map(|(_, v)| v.into_owned());
        assert_eq!(index(&first).as_deref(), Some("0"));
        assert_eq!(index(&third).as_deref(), Some("48"));
        assert_eq!(third.query_pairs().filter(|(k, _)| k == "index").count(), 1);
        assert!(third.as_str().contains("maxPrice=1500"));
    }

    #[test]
    fn page_url_respects_start_index() {
        let site = Rightmove::new();
        let template = Url::parse("https://www.rightmove.co.uk/property-to-rent/find.html?index=48").unwrap();
        let next = site.page_url(&template, 1).unwrap();
        assert!(next.as_str().ends_with("index=72"));

        let blank = Url::parse("https://www.rightmove.co.uk/property-to-rent/find.html?index=").unwrap();
        assert!(site.page_url(&blank, 1).unwrap().as_str().ends_with("index=24"));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let site = Rightmove::new();
        let near_max = Url::parse("https://www.rightmove.co.uk/property-to-rent/find.html?index=4294967290").unwrap();
        assert!(site.page_url(&near_max, 0).is_ok());
        let err = site.page_url(&near_max, 1).unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidIndex(_)));

        for bad in ["99999999999", "-24", "abc"] {
            let url = Url::parse(&format!("https://www.rightmove.co.uk/property-to-rent/find.html?index={}", bad)).unwrap();
            assert!(
                matches!(site.page_url(&url, 0), Err(ScrapeError::InvalidIndex(_))),
                "index={} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn maps_listing_fields() {
        let site = Rightmove::new();
        let html = search_page(vec![json!({
            "id": 161234567,
            "price": {
                "amount": 1450,
                "frequency": "monthly",
                "displayPrices": [{ "displayPrice": "£1,450 pcm" }]
            },
            "propertySubType": "Flat",
            "bedrooms": 2,
            "bathrooms": 1,
            "displayAddress": "Deptford High Street, London SE8",
            "summary": "A bright two bedroom flat",
            "propertyUrl": "/properties/161234567#/?channel=RES_LET",
            "contactUrl": "/property-to-rent/contactBranch.html?propertyId=161234567",
            "customer": { "branchDisplayName": "Acme Lettings, Deptford", "branchId": 4321 },
            "addedOrReduced": "Added today",
            "firstVisibleDate": "2025-10-15T09:12:00Z",
            "letType": "Long term"
        })], Some(3), Some("61"));

        let searched_at = Utc::now();
        let page = site.parse_search_page(&html, &template(), searched_at).unwrap();
        assert_eq!(page.total_pages, Some(3));
        assert_eq!(page.result_count, Some(61));
        assert_eq!(page.listings.len(), 1);

        let record = &page.listings[0];
        assert_eq!(record.id, "161234567");
        assert_eq!(record.price, Some(1450.0));
        assert_eq!(record.price_display.as_deref(), Some("£1,450 pcm"));
        assert_eq!(record.frequency, Frequency::Monthly);
        assert_eq!(record.property_type.as_deref(), Some("Flat"));
        assert_eq!(record.bedrooms, Some(2));
        assert_eq!(record.bathrooms, Some(1));
        assert_eq!(
            record.property_url,
            "https://www.rightmove.co.uk/properties/161234567#/?channel=RES_LET"
        );
        assert_eq!(record.branch.as_deref(), Some("Acme Lettings, Deptford"));
        assert_eq!(record.branch_id.as_deref(), Some("4321"));
        assert_eq!(record.added_or_reduced.as_deref(), Some("Added today"));
        assert_eq!(record.postcode.as_deref(), Some("SE8"));
        assert_eq!(record.search_date, searched_at);
    }

    #[test]
    fn unparsable_price_is_kept_as_null() {
        let site = Rightmove::new();
        let mut poa = raw_listing("1");
        poa["price"] = json!({ "amount": "POA", "displayPrices": [{ "displayPrice": "POA" }] });
        let mut missing = raw_listing("2");
        missing.as_object_mut().unwrap().remove("price");

        let html = search_page(vec![poa, missing], Some(1), None);
        let page = site.parse_search_page(&html, &template(), Utc::now()).unwrap();
        assert_eq!(page.listings.len(), 2);
        assert_eq!(page.listings[0].price, None);
        assert_eq!(page.listings[0].price_display.as_deref(), Some("POA"));
        assert_eq!(page.listings[1].price, None);
    }

    #[test]
    fn entries_without_id_are_skipped() {
        let site = Rightmove::new();
        let mut anonymous = raw_listing("x");
        anonymous.as_object_mut().unwrap().remove("id");
        let html = search_page(vec![anonymous, raw_listing("7")], None, None);

        let page = site.parse_search_page(&html, &template(), Utc::now()).unwrap();
        assert_eq!(page.listings.len(), 1);
        assert_eq!(page.listings[0].id, "7");
    }

    #[test]
    fn missing_payload_is_an_extraction_error() {
        let site = Rightmove::new();
        let err = site
            .parse_search_page("<html><body>Access denied</body></html>", &template(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ScrapeError::MissingPayload));
        assert!(!err.ends_pagination());
    }

    #[test]
    fn wrong_shape_is_an_extraction_error() {
        let site = Rightmove::new();
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{}}}</script>"#;
        let err = site.parse_search_page(html, &template(), Utc::now()).unwrap_err();
        assert!(matches!(err, ScrapeError::UnexpectedShape(_)));

        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"props": [</script>"#;
        let err = site.parse_search_page(html, &template(), Utc::now()).unwrap_err();
        assert!(matches!(err, ScrapeError::Json(_)));
    }

    #[test]
    fn detail_page_letting_details_and_size() {
        let site = Rightmove::new();
        let details = site.parse_detail_page(&detail_page("1")).unwrap();

        assert_eq!(details.size_sqft, Some(1033));
        assert_eq!(details.size_sqm, Some(96));
        assert_eq!(details.letting_details.get("let available date"), Some("Now"));
        assert_eq!(details.letting_details.get("deposit"), Some("£1,730"));
        assert_eq!(details.letting_details.get("furnish type"), Some("Unfurnished"));
        let keys: Vec<_> = details.letting_details.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["let available date", "deposit", "min. tenancy", "furnish type"]);
    }

    #[test]
    fn detail_page_fallbacks() {
        let site = Rightmove::new();
        let html = r#"<html><body>
            <dl><div><dt>Council Tax:</dt><dd>Band C</dd></div>
                <div><dt>Parking</dt><dd>Allocated</dd></div></dl>
            <p>Approx. 650 square feet of living space</p>
        </body></html>"#;
        let details = site.parse_detail_page(html).unwrap();
        assert_eq!(details.letting_details.get("council tax"), Some("Band C"));
        assert_eq!(details.letting_details.get("parking"), None);
        assert_eq!(details.size_sqft, Some(650));
        assert_eq!(details.size_sqm, None);
    }

    #[test]
    fn ask_agent_size_is_null() {
        let site = Rightmove::new();
        let html = r#"<html><body>
            <dl data-test="infoReel"><dt><span>SIZE</span></dt><dd>Ask agent</dd></dl>
            <h2>Letting details</h2>
            <dl><div><dt>Deposit:</dt><dd>£1,500A deposit provides security for a landlord against damage</dd></div></dl>
        </body></html>"#;
        let details = site.parse_detail_page(html).unwrap();
        assert_eq!(details.size_sqft, None);
        assert_eq!(details.size_sqm, None);
        assert_eq!(details.letting_details.get("deposit"), Some("£1,500"));
    }

    #[test]
    fn page_without_details_fails() {
        let site = Rightmove::new();
        let err = site.parse_detail_page("<html><body><p>Property removed</p></body></html>").unwrap_err();
        assert!(matches!(err, ScrapeError::NoDetails));
    }

    #[test]
    fn deposit_tooltip_variants() {
        assert_eq!(clean_deposit_value("£1,730 Read more about deposit in our glossary page"), "£1,730");
        assert_eq!(clean_deposit_value("£2,000Read moreaboutdepositin our glossary page."), "£2,000");
        assert_eq!(clean_deposit_value("Ask agent"), "Ask agent");
    }
}
