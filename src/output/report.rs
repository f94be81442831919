use crate::output::csv::SCHEMA_VERSION;
use crate::stats::{CategoryStats, Distribution, NumericSummary, RunStatistics};
use chrono::{DateTime, Local};
use std::fmt::Write;

const RULE: usize = 80;

/// `1234567.891` -> `1,234,567.89`
fn thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

fn money(value: f64) -> String {
    format!("£{}", thousands(value, 2))
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "-".repeat(RULE));
}

fn end_section(out: &mut String) {
    let _ = writeln!(out, "\n{}\n", "=".repeat(RULE));
}

fn summary_block(out: &mut String, title: &str, summary: &NumericSummary, fmt: impl Fn(f64) -> String) {
    let _ = writeln!(out, "\n{}:", title);
    if summary.is_empty() {
        let _ = writeln!(out, "  No values recorded");
        return;
    }
    let _ = writeln!(out, "  Count:           {}", summary.count);
    let _ = writeln!(out, "  Average:         {}", fmt(summary.mean));
    let _ = writeln!(out, "  Median:          {}", fmt(summary.median));
    let _ = writeln!(out, "  Std Dev:         {}", fmt(summary.std_dev));
    let _ = writeln!(out, "  Min:             {}", fmt(summary.min));
    let _ = writeln!(out, "  Max:             {}", fmt(summary.max));
    let _ = writeln!(out, "  25th percentile: {}", fmt(summary.q1));
    let _ = writeln!(out, "  50th percentile: {}", fmt(summary.median));
    let _ = writeln!(out, "  75th percentile: {}", fmt(summary.q3));
}

fn category_table(out: &mut String, title: &str, noun: &str, rows: &[CategoryStats], fmt: impl Fn(f64) -> String) {
    section(out, title);
    if rows.is_empty() {
        let _ = writeln!(out, "No data.");
        end_section(out);
        return;
    }

    let width = rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0).max(noun.len());
    let _ = writeln!(out, "Total unique: {}\n", rows.len());
    let _ = writeln!(
        out,
        "{:<width$}  {:>6}  {:>14}  {:>14}  {:>14}  {:>14}",
        noun,
        "Count",
        "Average",
        "Median",
        "Min",
        "Max",
        width = width
    );
    for row in rows {
        let s = &row.summary;
        let cell = |v: f64| if s.is_empty() { "-".to_string() } else { fmt(v) };
        let _ = writeln!(
            out,
            "{:<width$}  {:>6}  {:>14}  {:>14}  {:>14}  {:>14}",
            row.label,
            row.count,
            cell(s.mean),
            cell(s.median),
            cell(s.min),
            cell(s.max),
            width = width
        );
    }
    end_section(out);
}

fn distribution_lines(out: &mut String, distribution: &Distribution) {
    for entry in &distribution.entries {
        let _ = writeln!(
            out,
            "    {}: {} ({:.1}%)",
            entry.label,
            entry.count,
            distribution.percentage(entry)
        );
    }
}

/// Plain-text statistics report. Sections appear in a fixed order and every
/// distribution is listed in full.
pub fn render_report(
    stats: &RunStatistics,
    title: &str,
    generated: DateTime<Local>,
    criteria: &[(&str, String)],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(RULE));
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "=".repeat(RULE));
    let _ = writeln!(out, "Generated: {}", generated.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Export schema: v{}", SCHEMA_VERSION);
    let _ = writeln!(out, "{}\n", "=".repeat(RULE));

    section(&mut out, "OVERALL STATISTICS");
    let _ = writeln!(out, "Total properties: {}", stats.total);
    let _ = writeln!(out, "With price: {}", stats.price.count);
    let _ = writeln!(out, "With size: {}", stats.size_sqm.count.max(stats.size_sqft.count));
    end_section(&mut out);

    section(&mut out, "PRICE STATISTICS");
    summary_block(&mut out, "Price", &stats.price, money);
    summary_block(&mut out, "Price per sq m", &stats.price_per_sqm, money);
    end_section(&mut out);

    section(&mut out, "PROPERTY SIZE STATISTICS");
    summary_block(&mut out, "Size (sq m)", &stats.size_sqm, |v| format!("{} sq m", thousands(v, 1)));
    summary_block(&mut out, "Size (sq ft)", &stats.size_sqft, |v| format!("{} sq ft", thousands(v, 0)));
    end_section(&mut out);

    category_table(&mut out, "BREAKDOWN BY NUMBER OF BEDROOMS", "Bedrooms", &stats.by_bedrooms, money);
    category_table(&mut out, "BREAKDOWN BY NUMBER OF BATHROOMS", "Bathrooms", &stats.by_bathrooms, money);
    category_table(&mut out, "BREAKDOWN BY PROPERTY TYPE (ALL TYPES)", "Type", &stats.by_property_type, money);
    category_table(&mut out, "BREAKDOWN BY POSTCODE (ALL POSTCODES)", "Postcode", &stats.by_postcode, money);
    category_table(&mut out, "BREAKDOWN BY ESTATE AGENT (ALL AGENTS)", "Agent", &stats.by_agent, money);
    category_table(&mut out, "PROPERTY SIZE BY BEDROOMS", "Bedrooms", &stats.size_by_bedrooms, |v| {
        format!("{} sq m", thousands(v, 1))
    });

    section(&mut out, "BREAKDOWN BY LISTING STATUS");
    if stats.listing_status.is_empty() {
        let _ = writeln!(out, "No data.");
    } else {
        distribution_lines(&mut out, &stats.listing_status);
    }
    end_section(&mut out);

    section(&mut out, "LETTING DETAILS ANALYSIS");
    if stats.letting_details.is_empty() {
        let _ = writeln!(out, "No letting details recorded.");
    }
    for key in &stats.letting_details {
        let _ = writeln!(out, "\n{}:", key.key.to_uppercase());
        let _ = writeln!(out, "  Total entries: {}", key.distribution.total);
        let _ = writeln!(out, "  Unique values: {}", key.distribution.unique());
        let _ = writeln!(out, "  Values:");
        distribution_lines(&mut out, &key.distribution);
    }
    end_section(&mut out);

    section(&mut out, "INDIVIDUAL LISTING SCRAPES");
    let enrichment = &stats.enrichment;
    if enrichment.attempted == 0 {
        let _ = writeln!(out, "Not attempted.");
    } else {
        let _ = writeln!(out, "Attempted:    {}", enrichment.attempted);
        let _ = writeln!(out, "Successful:   {}", enrichment.succeeded);
        let _ = writeln!(out, "Failed:       {}", enrichment.failed);
        let _ = writeln!(out, "Success rate: {:.1}%", enrichment.success_rate());
    }
    end_section(&mut out);

    section(&mut out, "SEARCH CRITERIA");
    for (label, value) in criteria {
        let _ = writeln!(out, "{}: {}", label, value);
    }
    end_section(&mut out);

    let _ = writeln!(out, "END OF REPORT");
    let _ = writeln!(out, "{}", "=".repeat(RULE));
    out
}
