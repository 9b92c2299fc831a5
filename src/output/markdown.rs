//! Markdown summary generation
//!
//! One report covers every source crawled in an invocation; each source gets
//! its stop reason and a breakdown of why candidates were skipped.

use crate::output::{OutputResult, RunSummary};
use crate::state::SkipKind;
use chrono::Utc;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Skipped URLs listed per source before the list is cut off
const MAX_LISTED_SKIPS: usize = 20;

/// Writes the markdown summary for `summaries` to `output_path`
pub fn write_markdown_summary(summaries: &[RunSummary], output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summaries);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats run summaries as markdown
pub fn format_markdown_summary(summaries: &[RunSummary]) -> String {
    let mut md = String::new();

    md.push_str("# Furrow Crawl Summary\n\n");
    md.push_str(&format!(
        "Generated {}\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));

    md.push_str("## Overview\n\n");
    md.push_str("| Source | Worker | Pages | Candidates | Accepted | Skipped | Stop Reason |\n");
    md.push_str("|--------|--------|-------|------------|----------|---------|-------------|\n");
    for s in summaries {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            s.source_name,
            s.worker_id,
            s.pages_visited,
            s.candidates_found,
            s.accepted,
            s.total_skipped(),
            s.stop_reason.as_deref().unwrap_or("-")
        ));
    }
    md.push('\n');

    for s in summaries {
        md.push_str(&format!("## {}\n\n", s.source_name));
        if let Some(run_id) = s.run_id {
            md.push_str(&format!("- **Run ID**: {}\n", run_id));
        }
        md.push_str(&format!(
            "- **Stop Reason**: {}\n",
            s.stop_reason.as_deref().unwrap_or("-")
        ));
        md.push_str(&format!("- **Cutoff Reached**: {}\n", s.cutoff_reached));
        md.push_str(&format!("- **Limit Reached**: {}\n", s.limit_reached));
        md.push_str(&format!(
            "- **Needs Attention**: {} skipped candidates\n\n",
            s.actionable_skips()
        ));

        if !s.skipped_by_reason.is_empty() {
            md.push_str("| Skip Reason | Count |\n");
            md.push_str("|-------------|-------|\n");
            for kind in SkipKind::all_kinds() {
                if let Some(count) = s.skipped_by_reason.get(&kind) {
                    md.push_str(&format!("| {} | {} |\n", kind, count));
                }
            }
            md.push('\n');
        }

        let notable: Vec<_> = s
            .skipped
            .iter()
            .filter(|skip| skip.reason.kind() != SkipKind::AlreadyProcessed)
            .collect();
        if !notable.is_empty() {
            md.push_str("### Skipped Candidates\n\n");
            for skip in notable.iter().take(MAX_LISTED_SKIPS) {
                md.push_str(&format!("- {}: {}\n", skip.url, skip.reason));
            }
            if notable.len() > MAX_LISTED_SKIPS {
                md.push_str(&format!(
                    "\n... and {} more\n",
                    notable.len() - MAX_LISTED_SKIPS
                ));
            }
            md.push('\n');
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchFailureKind;
    use crate::state::{SkipReason, SkippedCandidate};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn create_test_summary() -> RunSummary {
        let mut skipped_by_reason = BTreeMap::new();
        skipped_by_reason.insert(SkipKind::FetchFailed, 1);
        skipped_by_reason.insert(SkipKind::AlreadyProcessed, 12);

        RunSummary {
            source_name: "brownfield".to_string(),
            run_id: Some(3),
            worker_id: 1,
            pages_visited: 4,
            candidates_found: 40,
            accepted: 27,
            skipped_by_reason,
            stop_reason: Some("cutoff_reached".to_string()),
            cutoff_reached: true,
            limit_reached: false,
            skipped: vec![
                SkippedCandidate::new("https://example.com/x/", SkipReason::AlreadyProcessed),
                SkippedCandidate::new(
                    "https://example.com/y/",
                    SkipReason::FetchFailed {
                        kind: FetchFailureKind::Blocked,
                        message: "challenge page".to_string(),
                    },
                ),
            ],
        }
    }

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&[create_test_summary()]);

        assert!(markdown.contains("# Furrow Crawl Summary"));
        assert!(markdown.contains("| brownfield | 1 | 4 | 40 | 27 | 13 | cutoff_reached |"));
        assert!(markdown.contains("| fetch_failed | 1 |"));
        assert!(markdown.contains("**Needs Attention**: 1 skipped"));
        assert!(markdown.contains("https://example.com/y/: fetch_failed (blocked: challenge page)"));
        assert!(!markdown.contains("https://example.com/x/"));
    }

    #[test]
    fn test_write_markdown_summary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.md");

        write_markdown_summary(&[create_test_summary()], &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Furrow Crawl Summary"));
    }
}
