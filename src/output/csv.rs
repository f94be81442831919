//! Tabular export and its defensive re-import.
//!
//! Column order is fixed per schema version; a null is an empty cell. The
//! letting-details column holds a strict JSON object.

use crate::models::{Enrichment, Frequency, LeaseDetails, ListingDetails, ListingRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

pub const SCHEMA_VERSION: u32 = 1;

pub const BASE_COLUMNS: [&str; 18] = [
    "id",
    "price",
    "price_display",
    "frequency",
    "property_type",
    "bedrooms",
    "bathrooms",
    "address",
    "summary",
    "property_url",
    "contact_url",
    "branch",
    "branch_id",
    "added_or_reduced",
    "first_visible_date",
    "let_type",
    "postcode",
    "search_date",
];

pub const ENRICHED_COLUMNS: [&str; 5] = [
    "letting_details",
    "property_size_sqft",
    "property_size_sqm",
    "scraping_success",
    "scraping_error",
];

/// Which column set an export carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Plain,
    Enriched,
}

impl ExportKind {
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            ExportKind::Plain => BASE_COLUMNS.to_vec(),
            ExportKind::Enriched => BASE_COLUMNS.iter().chain(ENRICHED_COLUMNS.iter()).copied().collect(),
        }
    }
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn record_row(record: &ListingRecord, kind: ExportKind) -> Result<Vec<String>> {
    let mut row = vec![
        record.id.clone(),
        opt(&record.price),
        opt(&record.price_display),
        record.frequency.as_str().to_string(),
        opt(&record.property_type),
        opt(&record.bedrooms),
        opt(&record.bathrooms),
        opt(&record.address),
        opt(&record.summary),
        record.property_url.clone(),
        opt(&record.contact_url),
        opt(&record.branch),
        opt(&record.branch_id),
        opt(&record.added_or_reduced),
        opt(&record.first_visible_date),
        opt(&record.let_type),
        opt(&record.postcode),
        record.search_date.to_rfc3339(),
    ];

    if kind == ExportKind::Enriched {
        let (details, sqft, sqm) = match record.details() {
            Some(d) => (
                d.letting_details
                    .to_json()
                    .with_context(|| format!("Failed to encode letting details of {}", record.id))?,
                opt(&d.size_sqft),
                opt(&d.size_sqm),
            ),
            None => (String::new(), String::new(), String::new()),
        };
        let success = match &record.enrichment {
            Enrichment::NotAttempted => "",
            Enrichment::Succeeded(_) => "true",
            Enrichment::Failed { .. } => "false",
        };
        row.extend([
            details,
            sqft,
            sqm,
            success.to_string(),
            record.enrichment.error().unwrap_or_default().to_string(),
        ]);
    }

    Ok(row)
}

/// Serialize records to CSV bytes with a header row
pub fn to_csv_bytes(records: &[ListingRecord], kind: ExportKind) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(kind.columns())?;
    for record in records {
        writer.write_record(record_row(record, kind)?)?;
    }
    writer.into_inner().context("Failed to flush CSV buffer")
}

#[derive(Debug)]
pub struct ImportOutcome {
    pub records: Vec<ListingRecord>,
    /// Rows dropped because they could not be read at all
    pub skipped_rows: usize,
}

struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn text(&self, row: &StringRecord, name: &str) -> Option<String> {
        let value = row.get(*self.index.get(name)?)?.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    fn number(&self, row: &StringRecord, name: &str) -> Option<f64> {
        let raw = self.text(row, name)?;
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => {
                debug!("Unparsable {} value {:?}, treating as null", name, raw);
                None
            }
        }
    }

    /// Whole counts, tolerating a trailing ".0"
    fn count(&self, row: &StringRecord, name: &str) -> Option<u32> {
        self.number(row, name)
            .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
            .map(|n| n as u32)
    }

    fn flag(&self, row: &StringRecord, name: &str) -> Option<bool> {
        match self.text(row, name)?.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

fn row_to_record(columns: &Columns, row: &StringRecord) -> Option<ListingRecord> {
    let id = columns.text(row, "id")?;
    let search_date = columns
        .text(row, "search_date")
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();

    let mut record = ListingRecord::new(id, columns.text(row, "property_url").unwrap_or_default(), search_date);
    record.price = crate::models::sanitize_price(columns.number(row, "price"));
    record.price_display = columns.text(row, "price_display");
    record.frequency = Frequency::from_site(columns.text(row, "frequency").as_deref());
    record.property_type = columns.text(row, "property_type");
    record.bedrooms = columns.count(row, "bedrooms");
    record.bathrooms = columns.count(row, "bathrooms");
    record.address = columns.text(row, "address");
    record.summary = columns.text(row, "summary");
    record.contact_url = columns.text(row, "contact_url");
    record.branch = columns.text(row, "branch");
    record.branch_id = columns.text(row, "branch_id");
    record.added_or_reduced = columns.text(row, "added_or_reduced");
    record.first_visible_date = columns.text(row, "first_visible_date");
    record.let_type = columns.text(row, "let_type");
    record.postcode = columns.text(row, "postcode");

    if columns.has("scraping_success") {
        record.enrichment = match columns.flag(row, "scraping_success") {
            Some(true) => {
                let letting_details = columns
                    .text(row, "letting_details")
                    .and_then(|raw| match LeaseDetails::from_json(&raw) {
                        Ok(details) => Some(details),
                        Err(e) => {
                            debug!("Unparsable letting details for {}: {}", record.id, e);
                            None
                        }
                    })
                    .unwrap_or_default();
                Enrichment::Succeeded(ListingDetails {
                    letting_details,
                    size_sqft: columns.count(row, "property_size_sqft"),
                    size_sqm: columns.count(row, "property_size_sqm"),
                })
            }
            Some(false) => Enrichment::Failed {
                error: columns
                    .text(row, "scraping_error")
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
            None => Enrichment::NotAttempted,
        };
    }

    Some(record)
}

/// Load an export back into records. Bad cells become nulls; rows that
/// cannot be read, lack an id or have the wrong width are skipped.
pub fn read_csv(path: &Path) -> Result<ImportOutcome> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header row of {}", path.display()))?
        .clone();
    let columns = Columns::new(&headers);
    if !columns.has("id") {
        anyhow::bail!("{} has no id column", path.display());
    }

    let mut records = Vec::new();
    let mut skipped_rows = 0;

    for (i, row) in reader.records().enumerate() {
        let line = i + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping unreadable row {}: {}", line, e);
                skipped_rows += 1;
                continue;
            }
        };
        if row.len() != headers.len() {
            warn!("Skipping row {}: expected {} fields, found {}", line, headers.len(), row.len());
            skipped_rows += 1;
            continue;
        }
        match row_to_record(&columns, &row) {
            Some(record) => records.push(record),
            None => {
                warn!("Skipping row {}: no id", line);
                skipped_rows += 1;
            }
        }
    }

    Ok(ImportOutcome { records, skipped_rows })
}
