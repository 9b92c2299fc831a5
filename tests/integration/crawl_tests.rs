//! Integration tests for the crawler
//!
//! These tests serve a small news site from wiremock and run whole sources
//! through the real HTTP fetcher, selector rules, SQLite ledger and archive
//! writer.

use chrono::NaiveDate;
use furrow::config::{
    Config, CrawlerConfig, ListingOrder, OutputConfig, PaginationMode, SelectorConfig,
    SourceConfig, UserAgentConfig,
};
use furrow::crawler::{run_source, RunOptions, SourceRun};
use furrow::dates::DateLocale;
use furrow::fetch::{HttpFetcher, PoliteFetcher, RetryPolicy, DEFAULT_CHALLENGE_MARKERS};
use furrow::ledger::{open_ledger, DeduplicationLedger};
use furrow::output::{fragments_dir, merge_fragments, ArchiveWriter, CsvRow};
use furrow::state::{SkipKind, StopReason};
use furrow::FurrowError;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for one source on the mock server
fn create_test_config(base_url: &str, output_dir: &Path, pagination: PaginationMode) -> Config {
    Config {
        crawler: CrawlerConfig {
            request_timeout_ms: 2_000,
            max_attempts: 2,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            ledger_path: output_dir.join("ledger.db").display().to_string(),
            output_dir: output_dir.display().to_string(),
            summary_path: output_dir.join("summary.md").display().to_string(),
            merged_path: output_dir.join("archive_complete.csv").display().to_string(),
        },
        sources: vec![SourceConfig {
            name: "farmwire".to_string(),
            listing_url: format!("{}/markets/", base_url),
            pagination,
            page_path_template: "page/{n}/".to_string(),
            max_pages: None,
            max_candidates: None,
            max_items: None,
            cutoff: NaiveDate::from_ymd_opt(2026, 1, 1),
            ordering: ListingOrder::ReverseChronological,
            date_locale: DateLocale::Us,
            min_text_length: 300,
            selectors: SelectorConfig {
                listing_item: Some("li.post".to_string()),
                listing_link: "a.headline".to_string(),
                listing_date: Some("span.date".to_string()),
                listing_date_attribute: None,
                next_page: Some("a.next".to_string()),
                title: "h1.entry-title".to_string(),
                author: Some("span.byline".to_string()),
                date: "time".to_string(),
                date_attribute: Some("datetime".to_string()),
                tags: Some("a[rel=tag]".to_string()),
                categories: None,
                body: "div.entry-content p".to_string(),
                media_markers: vec!["div.video-player".to_string()],
                boilerplate_markers: vec!["Newsletter Sign Up".to_string()],
            },
        }],
    }
}

fn listing_page(items: &[(&str, &str)], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><ul>");
    for (slug, date) in items {
        html.push_str(&format!(
            r#"<li class="post"><a class="headline" href="/news/{}/">{}</a><span class="date">{}</span></li>"#,
            slug, slug, date
        ));
    }
    html.push_str("</ul>");
    if let Some(next) = next {
        html.push_str(&format!(r#"<a class="next" href="{}">Older posts</a>"#, next));
    }
    html.push_str("</body></html>");
    html
}

fn article_page(title: &str, date: &str) -> String {
    format!(
        r#"<html><body>
        <h1 class="entry-title">{title}</h1>
        <span class="byline">By Dana Reyes</span>
        <time datetime="{date}T09:30:00-06:00">{date}</time>
        <a rel="tag" href="/tag/corn/">corn</a>
        <div class="entry-content">
          <p>{title} moved the market this week.</p>
          <p>Traders watched export numbers closely.</p>
          <p>Newsletter Sign Up for daily updates.</p>
        </div>
        </body></html>"#
    )
}

async fn mount_html(server: &MockServer, route: &str, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(expected)
        .mount(server)
        .await;
}

fn test_fetcher(config: &Config) -> PoliteFetcher<HttpFetcher> {
    let markers = DEFAULT_CHALLENGE_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect();
    let http = HttpFetcher::new(&config.user_agent, markers).expect("Failed to build client");
    PoliteFetcher::new(http, RetryPolicy::immediate(config.crawler.max_attempts))
}

async fn crawl_once(
    config: &Config,
    options: &RunOptions,
) -> Result<(SourceRun, ArchiveWriter), FurrowError> {
    let source = &config.sources[0];
    let mut ledger = open_ledger(Path::new(&config.output.ledger_path))?;
    let mut writer = ArchiveWriter::create(
        Path::new(&config.output.output_dir),
        &source.name,
        options.worker_id,
        options.start_page,
        options.end_page,
    )?;

    let run = run_source(
        &config.crawler,
        source,
        options,
        &test_fetcher(config),
        &mut ledger,
        &mut writer,
    )
    .await?;
    Ok((run, writer))
}

#[tokio::test]
async fn test_crawl_stops_at_cutoff_across_pages() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_html(
        &server,
        "/markets/",
        listing_page(
            &[("corn-rally", "February 1, 2026"), ("soy-exports", "January 20, 2026")],
            Some("/markets/page/2/"),
        ),
        1,
    )
    .await;
    mount_html(
        &server,
        "/markets/page/2/",
        listing_page(
            &[("wheat-outlook", "January 5, 2026"), ("year-review", "December 30, 2025")],
            Some("/markets/page/3/"),
        ),
        1,
    )
    .await;
    mount_html(&server, "/markets/page/3/", listing_page(&[], None), 0).await;
    mount_html(&server, "/news/corn-rally/", article_page("Corn rally", "2026-02-01"), 1).await;
    mount_html(&server, "/news/soy-exports/", article_page("Soy exports", "2026-01-20"), 1).await;
    mount_html(&server, "/news/wheat-outlook/", article_page("Wheat outlook", "2026-01-05"), 1)
        .await;
    mount_html(&server, "/news/year-review/", article_page("Year review", "2025-12-30"), 0).await;

    let config = create_test_config(&server.uri(), output.path(), PaginationMode::NextLink);
    let (run, writer) = crawl_once(&config, &RunOptions::default()).await.unwrap();

    assert_eq!(run.result.accepted.len(), 3);
    assert_eq!(run.result.stop_reason(), Some(StopReason::CutoffReached));
    assert!(run.result.cursor.cutoff_reached);
    assert_eq!(run.result.cursor.pages_visited, 2);

    let first = &run.result.accepted[0];
    assert_eq!(first.title, "Corn rally");
    assert_eq!(first.author.as_deref(), Some("Dana Reyes"));
    assert_eq!(first.canonical_date, NaiveDate::from_ymd_opt(2026, 2, 1));
    assert!(first.tags.contains("corn"));
    assert!(!first.body.contains("Newsletter"));

    let mut reader = csv::Reader::from_path(writer.fragment_path()).unwrap();
    let rows: Vec<CsvRow> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].article_id, "20260201_0_000001");

    let txt_files = std::fs::read_dir(output.path().join("articles")).unwrap().count();
    assert_eq!(txt_files, 3);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_html(
        &server,
        "/markets/",
        listing_page(
            &[("corn-rally", "February 1, 2026"), ("year-review", "December 30, 2025")],
            None,
        ),
        2,
    )
    .await;
    mount_html(&server, "/news/corn-rally/", article_page("Corn rally", "2026-02-01"), 1).await;

    let config = create_test_config(&server.uri(), output.path(), PaginationMode::NextLink);

    let (first, _) = crawl_once(&config, &RunOptions::default()).await.unwrap();
    let (second, _) = crawl_once(&config, &RunOptions::default()).await.unwrap();

    assert_eq!(first.result.accepted.len(), 1);
    assert!(second.result.accepted.is_empty());
    assert_eq!(
        second.result.skipped_by_reason().get(&SkipKind::AlreadyProcessed),
        Some(&1)
    );

    let ledger = open_ledger(Path::new(&config.output.ledger_path)).unwrap();
    assert_eq!(ledger.len().unwrap(), 1);
    assert_eq!(ledger.get_runs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_challenge_page_is_skipped_and_run_continues() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_html(
        &server,
        "/markets/",
        listing_page(
            &[("guarded", "February 2, 2026"), ("corn-rally", "February 1, 2026")],
            None,
        ),
        1,
    )
    .await;
    mount_html(
        &server,
        "/news/guarded/",
        "<html><title>Just a moment...</title></html>".to_string(),
        2,
    )
    .await;
    mount_html(&server, "/news/corn-rally/", article_page("Corn rally", "2026-02-01"), 1).await;

    let config = create_test_config(&server.uri(), output.path(), PaginationMode::NextLink);
    let (run, _) = crawl_once(&config, &RunOptions::default()).await.unwrap();

    assert_eq!(run.result.accepted.len(), 1);
    assert_eq!(
        run.result.skipped_by_reason().get(&SkipKind::FetchFailed),
        Some(&1)
    );
    assert_eq!(run.result.stop_reason(), Some(StopReason::NoMoreCandidates));
}

#[tokio::test]
async fn test_partitioned_workers_merge() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_html(
        &server,
        "/markets/",
        listing_page(&[("corn-rally", "February 1, 2026")], None),
        1,
    )
    .await;
    mount_html(
        &server,
        "/markets/page/2/",
        listing_page(&[("soy-exports", "January 20, 2026")], None),
        1,
    )
    .await;
    mount_html(&server, "/news/corn-rally/", article_page("Corn rally", "2026-02-01"), 1).await;
    mount_html(&server, "/news/soy-exports/", article_page("Soy exports", "2026-01-20"), 1).await;

    let config = create_test_config(&server.uri(), output.path(), PaginationMode::PageNumber);

    let first = RunOptions {
        worker_id: 0,
        start_page: 1,
        end_page: Some(1),
        ..RunOptions::default()
    };
    let second = RunOptions {
        worker_id: 1,
        start_page: 2,
        end_page: Some(2),
        ..RunOptions::default()
    };
    let (run_a, _) = crawl_once(&config, &first).await.unwrap();
    let (run_b, _) = crawl_once(&config, &second).await.unwrap();

    assert_eq!(run_a.result.accepted.len(), 1);
    assert_eq!(run_b.result.accepted.len(), 1);

    let merged = Path::new(&config.output.merged_path);
    let report = merge_fragments(&fragments_dir(output.path()), merged).unwrap();
    assert_eq!(report.fragments, 2);
    assert_eq!(report.rows_written, 2);

    let mut reader = csv::Reader::from_path(merged).unwrap();
    let ids: Vec<String> = reader
        .deserialize::<CsvRow>()
        .map(|r| r.unwrap().article_id)
        .collect();
    assert_eq!(ids, vec!["20260201_0_000001", "20260120_1_000001"]);
}

#[tokio::test]
async fn test_changed_markup_is_reported() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_html(
        &server,
        "/markets/",
        "<html><body><div class=\"cards\">Redesigned</div></body></html>".to_string(),
        1,
    )
    .await;

    let config = create_test_config(&server.uri(), output.path(), PaginationMode::Auto);
    match crawl_once(&config, &RunOptions::default()).await {
        Err(FurrowError::ListingUnrecognized { source_name, .. }) => {
            assert_eq!(source_name, "farmwire");
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok((run, _)) => panic!("run {} should have failed", run.run_id),
    }
}
