//! Canned Rightmove markup shared by the scraper tests.

use serde_json::{json, Value};

pub fn raw_listing(id: &str) -> Value {
    json!({
        "id": id,
        "price": {
            "amount": 1200,
            "frequency": "monthly",
            "displayPrices": [{ "displayPrice": "£1,200 pcm" }]
        },
        "propertySubType": "Flat",
        "bedrooms": 1,
        "bathrooms": 1,
        "displayAddress": "Creek Road, London SE8",
        "summary": "One bedroom flat",
        "propertyUrl": format!("/properties/{}", id),
        "customer": { "branchDisplayName": "Acme Lettings", "branchId": 99 },
        "letType": "Long term"
    })
}

pub fn listings(ids: impl IntoIterator<Item = u32>) -> Vec<Value> {
    ids.into_iter().map(|id| raw_listing(&id.to_string())).collect()
}

pub fn search_page(properties: Vec<Value>, total_pages: Option<u32>, result_count: Option<&str>) -> String {
    let mut results = json!({ "properties": properties });
    if let Some(total) = total_pages {
        results["pagination"] = json!({ "total": total });
    }
    if let Some(count) = result_count {
        results["resultCount"] = json!(count);
    }
    let data = json!({ "props": { "pageProps": { "searchResults": results } } });
    format!(
        r#"<!DOCTYPE html><html><head><title>Property to rent</title></head><body>
<div id="__next"></div>
<script id="__NEXT_DATA__" type="application/json">{}</script>
</body></html>"#,
        data
    )
}

pub fn detail_page(id: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>Property {id}</title></head><body>
<article>
  <dl data-test="infoReel">
    <div><dt><span>PROPERTY TYPE</span></dt><dd>Flat</dd></div>
    <div><dt><span>BEDROOMS</span></dt><dd>x2</dd></div>
    <div><dt><span>SIZE</span></dt><dd><span>1,033 sq ft</span><span>96 sq m</span></dd></div>
  </dl>
  <h2>Letting details</h2>
  <dl>
    <div><dt>Let available date: </dt><dd>Now</dd></div>
    <div><dt>Deposit: </dt><dd>£1,730<span>A deposit provides security for a landlord against damage, or unpaid rent by a tenant.</span><a>Read more about deposit in our glossary page.</a></dd></div>
    <div><dt>Min. Tenancy: </dt><dd>12 months</dd></div>
    <div><dt>Furnish type: </dt><dd>Unfurnished</dd></div>
  </dl>
</article>
</body></html>"#
    )
}
