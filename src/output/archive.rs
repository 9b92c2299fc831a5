//! On-disk archive: one TXT file per article plus a CSV fragment per worker
//!
//! Layout under the output directory:
//!
//! ```text
//! articles/<YYYYMMDD|nodate>_<worker>_<seq>_<title>.txt
//! csv_fragments/fragment_<source>_w<worker>_<first page>_<last page|end>.csv
//! ```
//!
//! Every record is flushed as soon as it is written, so an interrupted run
//! leaves complete files behind.

use crate::crawler::ArticleRecord;
use crate::output::{OutputResult, RecordSink};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ARTICLES_DIR: &str = "articles";
pub const FRAGMENTS_DIR: &str = "csv_fragments";

/// Characters that are not allowed in archive file names
const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const TITLE_SLUG_CHARS: usize = 30;
const HEADER_RULE_WIDTH: usize = 70;

/// One row of a CSV fragment or of the merged archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvRow {
    pub article_id: String,
    /// `YYYY-MM-DD`, empty when unknown
    pub date: String,
    pub title: String,
    pub author: String,
    pub categories: String,
    pub tags: String,
    pub url: String,
    /// `YYYY-MM-DD HH:MM:SS` UTC
    pub scraped_at: String,
    pub source: String,
    pub body_char_count: usize,
    pub body: String,
}

impl CsvRow {
    pub fn from_record(article_id: &str, record: &ArticleRecord) -> Self {
        Self {
            article_id: article_id.to_string(),
            date: record
                .canonical_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            title: record.title.clone(),
            author: record.author.clone().unwrap_or_default(),
            categories: join_labels(record.categories.iter()),
            tags: join_labels(record.tags.iter()),
            url: record.url.clone(),
            scraped_at: record.fetched_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            source: record.source_name.clone(),
            body_char_count: record.body_char_count(),
            body: record.body.clone(),
        }
    }
}

fn join_labels<'a>(labels: impl Iterator<Item = &'a String>) -> String {
    labels.map(String::as_str).collect::<Vec<_>>().join("|")
}

/// `articles/` under an output directory
pub fn articles_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(ARTICLES_DIR)
}

/// `csv_fragments/` under an output directory
pub fn fragments_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(FRAGMENTS_DIR)
}

/// Makes a title safe to use as part of a file name
///
/// # Examples
///
/// ```
/// use furrow::output::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Corn: up 3%?"), "Corn_up_3%");
/// ```
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(TITLE_SLUG_CHARS)
        .collect()
}

/// [`RecordSink`] writing the TXT archive and one CSV fragment
pub struct ArchiveWriter {
    articles_dir: PathBuf,
    fragment_path: PathBuf,
    csv: csv::Writer<File>,
    worker_id: u32,
    sequence: u64,
}

impl ArchiveWriter {
    /// Opens the fragment for this source, worker and page range
    ///
    /// An existing fragment is appended to, and numbering continues after
    /// its last row, so a resumed worker never reuses an article id.
    pub fn create(
        output_dir: &Path,
        source_name: &str,
        worker_id: u32,
        start_page: u32,
        end_page: Option<u32>,
    ) -> OutputResult<Self> {
        let articles_dir = articles_dir(output_dir);
        let fragments = fragments_dir(output_dir);
        fs::create_dir_all(&articles_dir)?;
        fs::create_dir_all(&fragments)?;

        let last = end_page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "end".to_string());
        let fragment_path = fragments.join(format!(
            "fragment_{}_w{}_{}_{}.csv",
            source_name, worker_id, start_page, last
        ));

        let existing_rows = count_rows(&fragment_path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&fragment_path)?;
        let csv = csv::WriterBuilder::new()
            .has_headers(existing_rows.is_none())
            .from_writer(file);

        debug!(
            "Writing fragment {} ({} existing rows)",
            fragment_path.display(),
            existing_rows.unwrap_or(0)
        );

        Ok(Self {
            articles_dir,
            fragment_path,
            csv,
            worker_id,
            sequence: existing_rows.unwrap_or(0),
        })
    }

    pub fn fragment_path(&self) -> &Path {
        &self.fragment_path
    }

    /// Records written by this worker, including earlier runs
    pub fn written(&self) -> u64 {
        self.sequence
    }

    fn next_article_id(&mut self, record: &ArticleRecord) -> String {
        self.sequence += 1;
        let date = record
            .canonical_date
            .map(|d| d.format("%Y%m%d").to_string())
            .unwrap_or_else(|| "nodate".to_string());
        format!("{}_{}_{:06}", date, self.worker_id, self.sequence)
    }

    fn write_txt(&self, article_id: &str, record: &ArticleRecord) -> OutputResult<PathBuf> {
        let path = self.articles_dir.join(format!(
            "{}_{}.txt",
            article_id,
            sanitize_filename(&record.title)
        ));

        let mut file = File::create(&path)?;
        file.write_all(format_txt(record).as_bytes())?;
        file.flush()?;
        Ok(path)
    }
}

impl RecordSink for ArchiveWriter {
    fn emit(&mut self, record: &ArticleRecord) -> OutputResult<()> {
        let article_id = self.next_article_id(record);
        let path = self.write_txt(&article_id, record)?;

        self.csv.serialize(CsvRow::from_record(&article_id, record))?;
        self.csv.flush()?;

        debug!("Archived {} as {}", record.url, path.display());
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.csv.flush()?;
        Ok(())
    }
}

/// TXT archive body: metadata header, a rule, then the article text
pub fn format_txt(record: &ArticleRecord) -> String {
    let mut txt = String::new();

    txt.push_str(&format!("URL: {}\n", record.url));
    txt.push_str(&format!(
        "Date: {}\n",
        record
            .canonical_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    ));
    txt.push_str(&format!("Title: {}\n", record.title));
    txt.push_str(&format!(
        "Author: {}\n",
        record.author.as_deref().unwrap_or("N/A")
    ));
    txt.push_str(&format!(
        "Categories: {}\n",
        join_labels(record.categories.iter())
    ));
    txt.push_str(&format!("Tags: {}\n", join_labels(record.tags.iter())));
    txt.push_str(&format!("Source: {}\n", record.source_name));
    txt.push_str(&format!(
        "Scraped at: {}\n",
        record.fetched_at.format("%Y-%m-%d %H:%M:%S")
    ));
    txt.push_str(&format!(
        "Body character count: {}\n",
        record.body_char_count()
    ));
    txt.push_str(&"=".repeat(HEADER_RULE_WIDTH));
    txt.push_str("\n\n");
    txt.push_str(&record.body);
    txt.push('\n');

    txt
}

/// Data rows in an existing CSV file; `None` if it is missing or empty
fn count_rows(path: &Path) -> OutputResult<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => {}
        _ => return Ok(None),
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = 0;
    for record in reader.records() {
        record?;
        rows += 1;
    }
    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn create_test_record(title: &str) -> ArticleRecord {
        ArticleRecord {
            url: "https://example.com/markets/corn/".to_string(),
            canonical_date: NaiveDate::from_ymd_opt(2026, 1, 15),
            title: title.to_string(),
            author: None,
            tags: BTreeSet::from(["exports".to_string(), "corn".to_string()]),
            categories: BTreeSet::from(["Markets".to_string()]),
            body: "Corn futures rose.".to_string(),
            fetched_at: Utc.with_ymd_and_hms(2026, 1, 16, 8, 30, 0).unwrap(),
            source_name: "demo".to_string(),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Wheat / Corn  <update>"), "Wheat_Corn_update");
        assert_eq!(
            sanitize_filename("A very long headline about soybean export sales"),
            "A_very_long_headline_about_soy"
        );
    }

    #[test]
    fn test_format_txt_header() {
        let txt = format_txt(&create_test_record("Corn rallies"));
        let lines: Vec<&str> = txt.lines().collect();

        assert_eq!(lines[0], "URL: https://example.com/markets/corn/");
        assert_eq!(lines[1], "Date: 2026-01-15");
        assert_eq!(lines[3], "Author: N/A");
        assert_eq!(lines[4], "Categories: Markets");
        assert_eq!(lines[5], "Tags: corn|exports");
        assert_eq!(lines[7], "Scraped at: 2026-01-16 08:30:00");
        assert_eq!(lines[8], "Body character count: 18");
        assert_eq!(lines[9], "=".repeat(70));
        assert_eq!(lines[11], "Corn futures rose.");
    }

    #[test]
    fn test_writer_creates_txt_and_fragment() {
        let dir = TempDir::new().unwrap();
        let mut writer = ArchiveWriter::create(dir.path(), "demo", 2, 1, Some(5)).unwrap();

        writer.emit(&create_test_record("Corn rallies")).unwrap();
        writer.finish().unwrap();

        let txt = articles_dir(dir.path()).join("20260115_2_000001_Corn_rallies.txt");
        assert!(txt.exists());
        assert!(writer
            .fragment_path()
            .ends_with("csv_fragments/fragment_demo_w2_1_5.csv"));

        let mut reader = csv::Reader::from_path(writer.fragment_path()).unwrap();
        let rows: Vec<CsvRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].article_id, "20260115_2_000001");
        assert_eq!(rows[0].tags, "corn|exports");
        assert_eq!(rows[0].body_char_count, 18);
    }

    #[test]
    fn test_reopened_fragment_continues_numbering() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = ArchiveWriter::create(dir.path(), "demo", 0, 1, None).unwrap();
            writer.emit(&create_test_record("First")).unwrap();
        }

        let mut writer = ArchiveWriter::create(dir.path(), "demo", 0, 1, None).unwrap();
        assert_eq!(writer.written(), 1);
        writer.emit(&create_test_record("Second")).unwrap();

        let mut reader = csv::Reader::from_path(writer.fragment_path()).unwrap();
        let ids: Vec<String> = reader
            .deserialize::<CsvRow>()
            .map(|r| r.unwrap().article_id)
            .collect();
        assert_eq!(ids, vec!["20260115_0_000001", "20260115_0_000002"]);
    }
}
