//! SQLite ledger implementation
//!
//! The ledger database holds the dedup set plus a history of runs and their
//! skipped candidates. Several partitioned workers may share one file: WAL
//! mode, a busy timeout and `INSERT OR IGNORE` keep concurrent appends safe.

use crate::ledger::schema::initialize_schema;
use crate::ledger::{DeduplicationLedger, LedgerError, LedgerResult};
use crate::state::{CrawlCursor, RunStatus, SkipKind, SkippedCandidate};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// A run row as stored in the `runs` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    pub source_name: String,
    pub worker_id: u32,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub stop_reason: Option<String>,
    pub pages_visited: u32,
    pub candidates_seen: u64,
    pub accepted: u64,
    pub skipped: u64,
}

/// A skipped candidate as stored in the `run_skips` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRecord {
    pub url: String,
    pub kind: SkipKind,
    pub detail: Option<String>,
}

const RUN_COLUMNS: &str = "id, source_name, worker_id, started_at, finished_at, config_hash, \
     status, stop_reason, pages_visited, candidates_seen, accepted, skipped";

/// SQLite-backed [`DeduplicationLedger`] with run history
pub struct SqliteLedger {
    conn: Connection,
    current_run: Option<i64>,
}

impl SqliteLedger {
    /// Opens or creates the ledger database at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteLedger)` - Successfully opened/created database
    /// * `Err(LedgerError)` - Failed to open database
    pub fn new(path: &Path) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(Duration::from_secs(10))?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            current_run: None,
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            current_run: None,
        })
    }

    // ===== Run Management =====

    /// Inserts a `running` run row; later [`record`](DeduplicationLedger::record)
    /// calls are attributed to it
    pub fn begin_run(
        &mut self,
        source_name: &str,
        worker_id: u32,
        config_hash: &str,
    ) -> LedgerResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (source_name, worker_id, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                source_name,
                worker_id,
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        let run_id = self.conn.last_insert_rowid();
        self.current_run = Some(run_id);
        Ok(run_id)
    }

    /// Closes a run row and stores its skipped candidates
    pub fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        cursor: &CrawlCursor,
        skipped: &[SkippedCandidate],
    ) -> LedgerResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2, stop_reason = ?3,
                 pages_visited = ?4, candidates_seen = ?5, accepted = ?6, skipped = ?7
             WHERE id = ?8",
            params![
                now,
                status.to_db_string(),
                cursor.stop_reason.map(|r| r.to_db_string()),
                cursor.pages_visited,
                cursor.candidates_seen as i64,
                cursor.candidates_accepted as i64,
                skipped.len() as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(LedgerError::RunNotFound(run_id));
        }

        {
            let mut stmt =
                tx.prepare("INSERT INTO run_skips (run_id, url, kind, detail) VALUES (?1, ?2, ?3, ?4)")?;
            for skip in skipped {
                stmt.execute(params![
                    run_id,
                    skip.url,
                    skip.reason.kind().to_db_string(),
                    skip.reason.detail()
                ])?;
            }
        }

        tx.commit()?;

        if self.current_run == Some(run_id) {
            self.current_run = None;
        }
        Ok(())
    }

    /// Marks runs left `running` by a dead process as `interrupted`
    ///
    /// Only rows of this source and worker are touched: other workers may be
    /// crawling on the same ledger right now.
    pub fn mark_stale_runs_interrupted(
        &mut self,
        source_name: &str,
        worker_id: u32,
    ) -> LedgerResult<usize> {
        let count = self.conn.execute(
            "UPDATE runs SET status = ?1
             WHERE status = ?2 AND source_name = ?3 AND worker_id = ?4",
            params![
                RunStatus::Interrupted.to_db_string(),
                RunStatus::Running.to_db_string(),
                source_name,
                worker_id
            ],
        )?;
        Ok(count)
    }

    pub fn get_run(&self, run_id: i64) -> LedgerResult<RunRecord> {
        let query = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&query, params![run_id], run_from_row)
            .optional()?
            .ok_or(LedgerError::RunNotFound(run_id))
    }

    /// Most recent runs first
    pub fn get_runs(&self, limit: usize) -> LedgerResult<Vec<RunRecord>> {
        let query = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&query)?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    pub fn get_run_skips(&self, run_id: i64) -> LedgerResult<Vec<SkipRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, kind, detail FROM run_skips WHERE run_id = ?1 ORDER BY id")?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut skips = Vec::new();
        for row in rows {
            let (url, kind, detail) = row?;
            if let Some(kind) = SkipKind::from_db_string(&kind) {
                skips.push(SkipRecord { url, kind, detail });
            }
        }
        Ok(skips)
    }

    // ===== Ledger Maintenance =====

    /// Adds URLs found outside the crawl loop (e.g. an archive scan)
    ///
    /// Returns the number of URLs that were not already present.
    pub fn import_urls(&mut self, urls: &[String], source_name: &str) -> LedgerResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO ledger_entries (url, source_name, resolved_at, run_id)
                 VALUES (?1, ?2, ?3, NULL)",
            )?;
            for url in urls {
                inserted += stmt.execute(params![url, source_name, now])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Removes all entries, runs and skips
    pub fn clear(&mut self) -> LedgerResult<()> {
        self.conn.execute_batch(
            "
            DELETE FROM run_skips;
            DELETE FROM ledger_entries;
            DELETE FROM runs;
        ",
        )?;
        self.current_run = None;
        Ok(())
    }

    // ===== Statistics =====

    /// Entries recorded for one source
    pub fn count_for_source(&self, source_name: &str) -> LedgerResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ledger_entries WHERE source_name = ?1",
            params![source_name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Ledger size per source, largest first
    pub fn count_entries_by_source(&self) -> LedgerResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_name, COUNT(*) FROM ledger_entries
             GROUP BY source_name ORDER BY COUNT(*) DESC, source_name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Skip counts over all runs
    pub fn count_skips_by_kind(&self) -> LedgerResult<BTreeMap<SkipKind, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM run_skips GROUP BY kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (kind, count) = row?;
            if let Some(kind) = SkipKind::from_db_string(&kind) {
                counts.insert(kind, count as u64);
            }
        }
        Ok(counts)
    }
}

impl DeduplicationLedger for SqliteLedger {
    fn contains(&self, url: &str) -> LedgerResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM ledger_entries WHERE url = ?1",
                params![url],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn record(&mut self, url: &str, source_name: &str) -> LedgerResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO ledger_entries (url, source_name, resolved_at, run_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![url, source_name, now, self.current_run],
        )?;
        Ok(())
    }

    fn len(&self) -> LedgerResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        source_name: row.get(1)?,
        worker_id: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Running),
        stop_reason: row.get(7)?,
        pages_visited: row.get(8)?,
        candidates_seen: row.get::<_, i64>(9)? as u64,
        accepted: row.get::<_, i64>(10)? as u64,
        skipped: row.get::<_, i64>(11)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchFailureKind;
    use crate::state::{SkipReason, StopReason};
    use tempfile::TempDir;

    #[test]
    fn test_record_is_idempotent() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();
        ledger.record("https://example.com/a/", "demo").unwrap();
        ledger.record("https://example.com/a/", "demo").unwrap();

        assert!(ledger.contains("https://example.com/a/").unwrap());
        assert!(!ledger.contains("https://example.com/b/").unwrap());
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();
        let run_id = ledger.begin_run("demo", 2, "abc123").unwrap();
        ledger.record("https://example.com/a/", "demo").unwrap();

        let mut cursor = CrawlCursor::new();
        cursor.pages_visited = 3;
        cursor.candidates_seen = 4;
        cursor.candidates_accepted = 1;
        cursor.finish(StopReason::CutoffReached);

        let skipped = vec![
            SkippedCandidate::new(
                "https://example.com/b/",
                SkipReason::FetchFailed {
                    kind: FetchFailureKind::Timeout,
                    message: "request timeout".to_string(),
                },
            ),
            SkippedCandidate::new("https://example.com/c/", SkipReason::AlreadyProcessed),
        ];
        ledger
            .finish_run(run_id, RunStatus::Completed, &cursor, &skipped)
            .unwrap();

        let run = ledger.get_run(run_id).unwrap();
        assert_eq!(run.source_name, "demo");
        assert_eq!(run.worker_id, 2);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.stop_reason.as_deref(), Some("cutoff_reached"));
        assert_eq!(run.pages_visited, 3);
        assert_eq!(run.accepted, 1);
        assert_eq!(run.skipped, 2);
        assert!(run.finished_at.is_some());

        let skips = ledger.get_run_skips(run_id).unwrap();
        assert_eq!(skips.len(), 2);
        assert_eq!(skips[0].kind, SkipKind::FetchFailed);
        assert_eq!(skips[1].detail, None);

        let counts = ledger.count_skips_by_kind().unwrap();
        assert_eq!(counts.get(&SkipKind::FetchFailed), Some(&1));

        let by_source = ledger.count_entries_by_source().unwrap();
        assert_eq!(by_source, vec![("demo".to_string(), 1)]);
        assert_eq!(ledger.count_for_source("demo").unwrap(), 1);
        assert_eq!(ledger.count_for_source("other").unwrap(), 0);
    }

    #[test]
    fn test_finish_unknown_run() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();
        let result = ledger.finish_run(99, RunStatus::Completed, &CrawlCursor::new(), &[]);
        assert!(matches!(result, Err(LedgerError::RunNotFound(99))));
    }

    #[test]
    fn test_stale_runs_marked_interrupted() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();
        let run_id = ledger.begin_run("demo", 0, "abc").unwrap();
        let other_worker = ledger.begin_run("demo", 1, "abc").unwrap();
        let other_source = ledger.begin_run("other", 0, "abc").unwrap();

        assert_eq!(ledger.mark_stale_runs_interrupted("demo", 0).unwrap(), 1);
        assert_eq!(
            ledger.get_run(run_id).unwrap().status,
            RunStatus::Interrupted
        );
        assert_eq!(
            ledger.get_run(other_worker).unwrap().status,
            RunStatus::Running
        );
        assert_eq!(
            ledger.get_run(other_source).unwrap().status,
            RunStatus::Running
        );
    }

    #[test]
    fn test_import_and_clear() {
        let mut ledger = SqliteLedger::new_in_memory().unwrap();
        ledger.record("https://example.com/a/", "demo").unwrap();

        let urls = vec![
            "https://example.com/a/".to_string(),
            "https://example.com/b/".to_string(),
        ];
        assert_eq!(ledger.import_urls(&urls, "demo").unwrap(), 1);
        assert_eq!(ledger.len().unwrap(), 2);

        ledger.clear().unwrap();
        assert!(ledger.is_empty().unwrap());
        assert!(ledger.get_runs(10).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let mut ledger = SqliteLedger::new(&path).unwrap();
            ledger.record("https://example.com/a/", "demo").unwrap();
        }

        let ledger = SqliteLedger::new(&path).unwrap();
        assert!(ledger.contains("https://example.com/a/").unwrap());
    }
}
