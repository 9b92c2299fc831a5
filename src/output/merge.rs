use crate::output::{CsvRow, OutputResult};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Counts reported by [`merge_fragments`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    pub fragments: usize,
    pub rows_read: usize,
    pub rows_written: usize,
    pub duplicates: usize,
}

/// Merges every `fragment_*.csv` in `fragments_dir` into `merged_path`
///
/// Rows are sorted newest first by article date, then by scrape time. When a
/// URL appears in several fragments only its most recently scraped row is
/// kept. Unreadable fragments are logged and skipped.
pub fn merge_fragments(fragments_dir: &Path, merged_path: &Path) -> OutputResult<MergeReport> {
    let mut report = MergeReport::default();
    let mut rows: Vec<CsvRow> = Vec::new();

    for path in list_fragments(fragments_dir)? {
        let mut reader = match csv::Reader::from_path(&path) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Skipping fragment {}: {}", path.display(), e);
                continue;
            }
        };
        report.fragments += 1;

        for row in reader.deserialize::<CsvRow>() {
            match row {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Bad row in {}: {}", path.display(), e),
            }
        }
    }
    report.rows_read = rows.len();

    // Newest scrape wins, even if the article date changed in between
    rows.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));
    let mut seen = HashSet::new();
    rows.retain(|row| seen.insert(row.url.clone()));
    report.duplicates = report.rows_read - rows.len();

    rows.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.scraped_at.cmp(&a.scraped_at))
    });

    if let Some(parent) = merged_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(merged_path)?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    report.rows_written = rows.len();

    info!(
        "Merged {} fragments into {}: {} rows ({} duplicates dropped)",
        report.fragments,
        merged_path.display(),
        report.rows_written,
        report.duplicates
    );

    Ok(report)
}

fn list_fragments(dir: &Path) -> OutputResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name.starts_with("fragment_") && name.ends_with(".csv")
        })
        .collect();
    paths.sort();
    Ok(paths)
}
