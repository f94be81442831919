pub mod csv;
pub mod report;

use crate::models::ListingRecord;
use crate::stats::RunStatistics;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub use self::csv::{read_csv, ExportKind};
pub use report::render_report;

/// `<base>/scrape_2025-Oct-15_at_13h45m`, created if missing
pub async fn create_run_folder(base: &Path, kind: ExportKind, now: DateTime<Local>) -> Result<PathBuf> {
    let prefix = match kind {
        ExportKind::Plain => "scrape",
        ExportKind::Enriched => "enhanced_scrape",
    };
    let folder = base.join(format!("{}_{}", prefix, now.format("%Y-%b-%d_at_%Hh%Mm")));
    tokio::fs::create_dir_all(&folder)
        .await
        .with_context(|| format!("Failed to create output folder {}", folder.display()))?;
    Ok(folder)
}

/// Write via a temporary sibling and rename, so a reader never sees half a file
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".partial");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to write {}", tmp.display()));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to move {} into place", path.display()));
    }
    Ok(())
}

/// Result of writing each artifact; one failing never stops the other
#[derive(Debug)]
pub struct ArtifactReport {
    pub csv: Result<PathBuf>,
    pub statistics: Result<PathBuf>,
}

impl ArtifactReport {
    pub fn all_written(&self) -> bool {
        self.csv.is_ok() && self.statistics.is_ok()
    }
}

/// File names and report title for one kind of run
fn artifact_names(kind: ExportKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        ExportKind::Plain => (
            "properties.csv",
            "statistics.txt",
            "RIGHTMOVE PROPERTY SCRAPER - FULL STATISTICS REPORT",
        ),
        ExportKind::Enriched => (
            "enhanced_properties.csv",
            "enhanced_statistics.txt",
            "ENHANCED RIGHTMOVE SCRAPER - DETAILED STATISTICS REPORT",
        ),
    }
}

pub async fn write_artifacts(
    folder: &Path,
    records: &[ListingRecord],
    stats: &RunStatistics,
    criteria: &[(&str, String)],
    kind: ExportKind,
) -> ArtifactReport {
    let (csv_name, stats_name, title) = artifact_names(kind);

    let csv_path = folder.join(csv_name);
    let csv = async {
        let bytes = self::csv::to_csv_bytes(records, kind)?;
        write_atomic(&csv_path, &bytes).await?;
        Ok::<_, anyhow::Error>(csv_path.clone())
    }
    .await;
    match &csv {
        Ok(path) => info!("✓ CSV file created: {}", path.display()),
        Err(e) => error!("✗ CSV export failed: {:#}", e),
    }

    let stats_path = folder.join(stats_name);
    let report = render_report(stats, title, Local::now(), criteria);
    let statistics = write_atomic(&stats_path, report.as_bytes())
        .await
        .map(|_| stats_path.clone());
    match &statistics {
        Ok(path) => info!("✓ Statistics file created: {}", path.display()),
        Err(e) => error!("✗ Statistics report failed: {:#}", e),
    }

    ArtifactReport { csv, statistics }
}
