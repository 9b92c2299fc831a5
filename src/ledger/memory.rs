use crate::ledger::{DeduplicationLedger, LedgerResult};
use crate::url::normalize_url;
use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Lines of a TXT archive file searched for the `URL:` header
const HEADER_SCAN_LINES: usize = 10;

/// In-process ledger backed by a `HashSet`
///
/// Used for dry runs and tests, or seeded from an existing archive directory
/// when no ledger database is available.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    urls: HashSet<String>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a ledger from the `URL:` headers of every `.txt` file in `dir`
    pub fn from_archive_dir(dir: &Path) -> LedgerResult<Self> {
        Ok(scan_archive_urls(dir)?.into_iter().collect())
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}

impl FromIterator<String> for MemoryLedger {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            urls: iter.into_iter().collect(),
        }
    }
}

impl DeduplicationLedger for MemoryLedger {
    fn contains(&self, url: &str) -> LedgerResult<bool> {
        Ok(self.urls.contains(url))
    }

    fn record(&mut self, url: &str, _source_name: &str) -> LedgerResult<()> {
        self.urls.insert(url.to_string());
        Ok(())
    }

    fn len(&self) -> LedgerResult<usize> {
        Ok(self.urls.len())
    }
}

/// Collects article URLs from TXT archive files
///
/// A missing directory yields an empty list. Files without a `URL:` line in
/// their header are ignored. URLs are normalized the same way candidates are,
/// so that they compare equal to freshly discovered links.
pub fn scan_archive_urls(dir: &Path) -> LedgerResult<Vec<String>> {
    if !dir.exists() {
        debug!("Archive directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut urls = Vec::new();
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "txt"))
        .collect();
    entries.sort();

    for path in entries {
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                continue;
            }
        };

        let header_url = BufReader::new(file)
            .lines()
            .take(HEADER_SCAN_LINES)
            .map_while(Result::ok)
            .find_map(|line| line.strip_prefix("URL: ").map(|u| u.trim().to_string()));

        match header_url {
            Some(url) if !url.is_empty() => {
                let url = normalize_url(&url).map(|u| u.to_string()).unwrap_or(url);
                urls.push(url);
            }
            _ => debug!("No URL header in {}", path.display()),
        }
    }

    Ok(urls)
}
