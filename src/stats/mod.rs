//! Descriptive statistics over a finished record set.
//!
//! Everything here is recomputed from the records on each call. Null values
//! are skipped; an empty input yields zeros and empty distributions.

use crate::models::ListingRecord;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

/// Central tendency and spread of one numeric column
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1)
    pub std_dev: f64,
    pub q1: f64,
    pub q3: f64,
    pub min: f64,
    pub max: f64,
}

/// Linear interpolation between closest ranks on sorted input
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

impl NumericSummary {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let (min, max) = (sorted[0], sorted[count - 1]);
        // Rounding in the sum can land a hair outside the observed range
        let mean = (sorted.iter().sum::<f64>() / count as f64).clamp(min, max);
        let std_dev = if count > 1 {
            let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Self {
            count,
            mean,
            median: quantile(&sorted, 0.5),
            std_dev,
            q1: quantile(&sorted, 0.25),
            q3: quantile(&sorted, 0.75),
            min,
            max,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionEntry {
    pub label: String,
    pub count: usize,
}

/// Every distinct value with its frequency, most common first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    pub entries: Vec<DistributionEntry>,
    pub total: usize,
}

impl Distribution {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut total = 0;
        for label in labels {
            *counts.entry(label).or_default() += 1;
            total += 1;
        }

        let mut entries: Vec<DistributionEntry> = counts
            .into_iter()
            .map(|(label, count)| DistributionEntry {
                label: label.to_string(),
                count,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

        Self { entries, total }
    }

    pub fn unique(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn percentage(&self, entry: &DistributionEntry) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            entry.count as f64 / self.total as f64 * 100.0
        }
    }
}

/// One category value and the metric summarised over its records
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    pub label: String,
    /// Records in the category, whether or not they carry the metric
    pub count: usize,
    pub summary: NumericSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    /// Natural key order (bedroom counts)
    Key,
    /// Most common first, ties by label
    Count,
}

fn breakdown<K, FK, FM>(records: &[ListingRecord], key: FK, metric: FM, order: Order) -> Vec<CategoryStats>
where
    K: Ord + Display,
    FK: Fn(&ListingRecord) -> Option<K>,
    FM: Fn(&ListingRecord) -> Option<f64>,
{
    let mut groups: BTreeMap<K, (usize, Vec<f64>)> = BTreeMap::new();
    for record in records {
        if let Some(k) = key(record) {
            let group = groups.entry(k).or_default();
            group.0 += 1;
            if let Some(value) = metric(record) {
                group.1.push(value);
            }
        }
    }

    let mut stats: Vec<CategoryStats> = groups
        .into_iter()
        .map(|(k, (count, values))| CategoryStats {
            label: k.to_string(),
            count,
            summary: NumericSummary::from_values(values),
        })
        .collect();

    if order == Order::Count {
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    }
    stats
}

/// Value frequencies for one letting-detail key
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseKeyStats {
    pub key: String,
    pub distribution: Distribution,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnrichmentStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl EnrichmentStats {
    /// Share of attempted records that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    pub total: usize,
    pub price: NumericSummary,
    pub size_sqm: NumericSummary,
    pub size_sqft: NumericSummary,
    pub price_per_sqm: NumericSummary,
    pub by_bedrooms: Vec<CategoryStats>,
    pub by_bathrooms: Vec<CategoryStats>,
    pub by_property_type: Vec<CategoryStats>,
    pub by_postcode: Vec<CategoryStats>,
    pub by_agent: Vec<CategoryStats>,
    pub size_by_bedrooms: Vec<CategoryStats>,
    pub listing_status: Distribution,
    /// One entry per letting-detail key, keys in alphabetical order
    pub letting_details: Vec<LeaseKeyStats>,
    pub enrichment: EnrichmentStats,
}

impl RunStatistics {
    pub fn compute(records: &[ListingRecord]) -> Self {
        let price = |r: &ListingRecord| r.price;
        let sqm = |r: &ListingRecord| r.size_sqm().map(f64::from);

        let mut lease_values: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for details in records.iter().filter_map(ListingRecord::details) {
            for (key, value) in details.letting_details.iter() {
                lease_values.entry(key).or_default().push(value);
            }
        }
        let letting_details = lease_values
            .into_iter()
            .map(|(key, values)| LeaseKeyStats {
                key: key.to_string(),
                distribution: Distribution::from_labels(values),
            })
            .collect();

        let attempted = records.iter().filter(|r| r.enrichment.was_attempted()).count();
        let succeeded = records.iter().filter(|r| r.enrichment.succeeded()).count();

        Self {
            total: records.len(),
            price: NumericSummary::from_values(records.iter().filter_map(price)),
            size_sqm: NumericSummary::from_values(records.iter().filter_map(sqm)),
            size_sqft: NumericSummary::from_values(records.iter().filter_map(|r| r.size_sqft().map(f64::from))),
            price_per_sqm: NumericSummary::from_values(records.iter().filter_map(|r| match (r.price, r.size_sqm()) {
                (Some(p), Some(s)) if s > 0 => Some(p / f64::from(s)),
                _ => None,
            })),
            by_bedrooms: breakdown(records, |r| r.bedrooms, price, Order::Key),
            by_bathrooms: breakdown(records, |r| r.bathrooms, price, Order::Key),
            by_property_type: breakdown(records, |r| r.property_type.clone(), price, Order::Count),
            by_postcode: breakdown(records, |r| r.postcode.clone(), price, Order::Count),
            by_agent: breakdown(records, |r| r.branch.clone(), price, Order::Count),
            size_by_bedrooms: breakdown(records, |r| r.bedrooms, sqm, Order::Key),
            listing_status: Distribution::from_labels(records.iter().filter_map(|r| r.added_or_reduced.as_deref())),
            letting_details,
            enrichment: EnrichmentStats {
                attempted,
                succeeded,
                failed: attempted - succeeded,
            },
        }
    }
}
