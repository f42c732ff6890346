//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small catalog and run full harvests
//! against a real state directory.

use catalog_harvest::config::{parse_config, Config, ExportFormat};
use catalog_harvest::state::{CrawlProgress, ItemReference};
use catalog_harvest::storage::{open_store, CheckpointStore, StorageError, PROGRESS_FILE};
use catalog_harvest::{run_harvest, HarvestError};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, dir: &Path, total_pages: Option<u32>) -> Config {
    let total = total_pages
        .map(|n| format!("total-pages = {}", n))
        .unwrap_or_default();

    parse_config(&format!(
        r#"
        [catalog]
        origin = "{uri}"
        list-url = "{uri}/list?p={{page}}"
        {total}
        max-pages = 20

        [crawler]
        concurrency = 1
        max-retries = 3
        base-delay-ms = 10
        request-delay-ms = 0
        timeout-secs = 5

        [output]
        state-dir = '{state}'
        export-path = '{export}'
        export-format = "csv"
        "#,
        uri = server.uri(),
        state = dir.join("state").display(),
        export = dir.join("items.csv").display(),
    ))
    .expect("test config is valid")
}

fn list_body(items: &[(&str, &str)]) -> String {
    let anchors: String = items
        .iter()
        .map(|(title, href)| {
            format!(r#"<p><span class="tiptip"><a href="{href}">{title}:</a></span></p>"#)
        })
        .collect();
    format!("<html><body><div class=\"list\">{anchors}</div></body></html>")
}

fn detail_body(name: &str, markers: &[&str]) -> String {
    let spans: String = markers
        .iter()
        .map(|m| format!(r#"<span class="color-red">{m}</span>"#))
        .collect();
    format!(
        r#"<html><body>
        <h1>{name}</h1>
        <div class="description">
            <p><a href="/tac-gia/someone">Someone</a></p>
            <p><a href="/theloai/action">Action</a><a href="/theloai/comedy">Comedy</a></p>
            <p>{spans}</p>
        </div>
        <div class="detail"><div class="content">About {name}.</div></div>
        <span id="PageViews">100</span>
        <span id="LikeCount">7</span>
        </body></html>"#
    )
}

async fn mount_list_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("p", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, item_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(item_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Two list pages sharing item B, and the three detail pages
async fn mount_overlapping_catalog(server: &MockServer) {
    mount_list_page(server, 1, list_body(&[("A", "/a"), ("B", "/b")])).await;
    mount_list_page(server, 2, list_body(&[("B", "/b"), ("C", "/c")])).await;
    mount_detail(server, "/a", detail_body("Alpha", &["Ongoing"])).await;
    mount_detail(server, "/b", detail_body("Beta", &["AltA", "AltB", "Completed"])).await;
    mount_detail(server, "/c", detail_body("Gamma", &[])).await;
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

fn load_state(dir: &Path) -> (CrawlProgress, Vec<catalog_harvest::ItemRecord>) {
    let store = open_store(&dir.join("state"), "").unwrap();
    (store.load().unwrap(), store.load_records().unwrap())
}

#[tokio::test]
async fn test_full_harvest_with_overlapping_pages() {
    let server = MockServer::start().await;
    mount_overlapping_catalog(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), Some(2));

    let summary = run_harvest(config, "hash", false, CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.discovery.completed, 2);
    assert_eq!(summary.new_items, 3);
    assert_eq!(summary.details.completed, 3);

    let (progress, records) = load_state(dir.path());
    let discovered: Vec<(&str, String)> = progress
        .discovered_items()
        .iter()
        .map(|r| (r.title.as_str(), r.url.trim_start_matches(&server.uri()).to_string()))
        .collect();
    assert_eq!(
        discovered,
        vec![
            ("A", "/a".to_string()),
            ("B", "/b".to_string()),
            ("C", "/c".to_string())
        ]
    );
    assert_eq!(records.len(), 3);

    let beta = records.iter().find(|r| r.name == "Beta").unwrap();
    assert_eq!(beta.status, "Completed");
    assert_eq!(beta.alternate_names, "AltA, AltB");
    assert_eq!(beta.genre, "Action, Comedy");
    assert_eq!(beta.author, "Someone");
    assert_eq!(beta.summary, "About Beta.");
    assert_eq!(beta.view_count, "100");
    assert_eq!(beta.like_count, "7");

    let alpha = records.iter().find(|r| r.name == "Alpha").unwrap();
    assert_eq!(alpha.alternate_names, "no alternate name");

    let gamma = records.iter().find(|r| r.name == "Gamma").unwrap();
    assert_eq!(gamma.status, "");

    // Export holds a header and one row per item, in discovery order
    let export = std::fs::read_to_string(dir.path().join("items.csv")).unwrap();
    let names: Vec<String> = csv::Reader::from_reader(export.as_bytes())
        .records()
        .map(|row| row.unwrap()[1].to_string())
        .collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
}

#[tokio::test]
async fn test_parallel_workers_keep_page_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("p", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(list_body(&[("A", "/a"), ("B", "/b")]))
                .set_delay(std::time::Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_list_page(&server, 2, list_body(&[("B late", "/b"), ("C", "/c")])).await;
    mount_detail(&server, "/a", detail_body("Alpha", &["Ongoing"])).await;
    mount_detail(&server, "/b", detail_body("Beta", &["Ongoing"])).await;
    mount_detail(&server, "/c", detail_body("Gamma", &["Ongoing"])).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, dir.path(), Some(2));
    config.crawler.concurrency = 2;

    run_harvest(config, "hash", false, CancellationToken::new())
        .await
        .unwrap();

    let (progress, _) = load_state(dir.path());
    let discovered: Vec<(&str, String)> = progress
        .discovered_items()
        .iter()
        .map(|r| (r.title.as_str(), r.url.trim_start_matches(&server.uri()).to_string()))
        .collect();
    assert_eq!(
        discovered,
        vec![
            ("A", "/a".to_string()),
            ("B", "/b".to_string()),
            ("C", "/c".to_string())
        ]
    );

    let export = std::fs::read_to_string(dir.path().join("items.csv")).unwrap();
    let names: Vec<String> = csv::Reader::from_reader(export.as_bytes())
        .records()
        .map(|row| row.unwrap()[1].to_string())
        .collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
}

#[tokio::test]
async fn test_harvest_exports_workbook() {
    use calamine::{open_workbook, Reader, Xlsx};

    let server = MockServer::start().await;
    mount_overlapping_catalog(&server).await;
    let dir = TempDir::new().unwrap();
    let export = dir.path().join("manga_details.xlsx");

    let mut config = create_test_config(&server, dir.path(), Some(2));
    config.output.export_path = export.display().to_string();
    config.output.export_format = ExportFormat::Xlsx;
    config.output.sheet_name = "MangaDetails".to_string();

    run_harvest(config, "hash", false, CancellationToken::new())
        .await
        .unwrap();

    let mut workbook: Xlsx<_> = open_workbook(&export).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["MangaDetails"]);
    let range = workbook.worksheet_range("MangaDetails").unwrap();
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], catalog_harvest::ItemRecord::COLUMNS.to_vec());
    let names: Vec<&str> = rows[1..].iter().map(|row| row[1].as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
    assert_eq!(rows[2][8], "AltA, AltB");
}

#[tokio::test]
async fn test_second_run_performs_no_fetches() {
    let server = MockServer::start().await;
    mount_overlapping_catalog(&server).await;
    let dir = TempDir::new().unwrap();

    run_harvest(
        create_test_config(&server, dir.path(), Some(2)),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();
    let first_run_requests = request_count(&server).await;
    assert_eq!(first_run_requests, 5);

    let summary = run_harvest(
        create_test_config(&server, dir.path(), Some(2)),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(request_count(&server).await, first_run_requests);
    assert_eq!(summary.discovery.completed, 0);
    assert_eq!(summary.discovery.already_done, 2);
    assert_eq!(summary.details.already_done, 3);

    let (progress, records) = load_state(dir.path());
    assert_eq!(progress.discovered_items().len(), 3);
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_resume_skips_checkpointed_units() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // An earlier run finished page 1 and item A, then died
    {
        let mut store = open_store(&dir.path().join("state"), "hash").unwrap();
        let mut progress = CrawlProgress::new();
        progress.merge_references(vec![
            ItemReference::new("A", format!("{}/a", server.uri())),
            ItemReference::new("B", format!("{}/b", server.uri())),
        ]);
        progress.mark_page_complete(1);
        let mut record = catalog_harvest::ItemRecord::empty(format!("{}/a", server.uri()));
        record.name = "Alpha".to_string();
        store.append_record(&record).unwrap();
        progress.mark_item_complete(&record.url);
        store.save(&progress).unwrap();
    }

    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("p", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_list_page(&server, 2, list_body(&[("B", "/b"), ("C", "/c")])).await;
    mount_detail(&server, "/b", detail_body("Beta", &["Ongoing"])).await;
    mount_detail(&server, "/c", detail_body("Gamma", &["Ongoing"])).await;

    let summary = run_harvest(
        create_test_config(&server, dir.path(), Some(2)),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.discovery.completed, 1);
    assert_eq!(summary.new_items, 1);
    assert_eq!(summary.details.completed, 2);

    let (_, records) = load_state(dir.path());
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
}

#[tokio::test]
async fn test_failed_items_are_retried_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_list_page(
        &server,
        1,
        list_body(&[("A", "/a"), ("Gone", "/gone"), ("Flaky", "/flaky")]),
    )
    .await;
    mount_detail(&server, "/a", detail_body("Alpha", &["Ongoing"])).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;

    let summary = run_harvest(
        create_test_config(&server, dir.path(), Some(1)),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.details.completed, 1);
    assert_eq!(summary.details.skipped, 1);
    assert_eq!(summary.details.pending, 1);
    assert!(!summary.is_complete());

    // The flaky item recovers; the missing one is tried once more
    mount_detail(&server, "/flaky", detail_body("Flaky", &["Ongoing"])).await;

    let summary = run_harvest(
        create_test_config(&server, dir.path(), Some(1)),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.details.already_done, 1);
    assert_eq!(summary.details.completed, 1);
    assert_eq!(summary.details.skipped, 1);

    let (progress, records) = load_state(dir.path());
    assert_eq!(records.len(), 2);
    assert_eq!(progress.pending_items().len(), 1);
}

#[tokio::test]
async fn test_server_error_is_retried_within_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_list_page(&server, 1, list_body(&[("A", "/a")])).await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_detail(&server, "/a", detail_body("Alpha", &["Ongoing"])).await;

    let summary = run_harvest(
        create_test_config(&server, dir.path(), Some(1)),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.details.completed, 1);
    let detail_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/a")
        .count();
    assert_eq!(detail_requests, 3);
}

#[tokio::test]
async fn test_open_ended_catalog_stops_at_empty_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_list_page(&server, 1, list_body(&[("A", "/a")])).await;
    mount_list_page(&server, 2, list_body(&[("B", "/b")])).await;
    mount_list_page(&server, 3, list_body(&[])).await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("p", "4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_detail(&server, "/a", detail_body("Alpha", &["Ongoing"])).await;
    mount_detail(&server, "/b", detail_body("Beta", &["Ongoing"])).await;

    let summary = run_harvest(
        create_test_config(&server, dir.path(), None),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.end_of_catalog, Some(3));
    assert_eq!(summary.discovery.completed, 2);
    assert_eq!(summary.details.completed, 2);

    let (progress, _) = load_state(dir.path());
    assert_eq!(progress.end_of_catalog(), Some(3));
    assert!(!progress.is_page_complete(3));
}

#[tokio::test]
async fn test_fresh_run_discards_corrupt_state() {
    let server = MockServer::start().await;
    mount_overlapping_catalog(&server).await;
    let dir = TempDir::new().unwrap();

    let state_dir = dir.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();
    std::fs::write(state_dir.join(PROGRESS_FILE), "{ not json").unwrap();

    let result = run_harvest(
        create_test_config(&server, dir.path(), Some(2)),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await;
    assert!(matches!(
        result,
        Err(HarvestError::Storage(StorageError::Corrupt { .. }))
    ));
    assert_eq!(request_count(&server).await, 0);

    let summary = run_harvest(
        create_test_config(&server, dir.path(), Some(2)),
        "hash",
        true,
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(summary.is_complete());
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let server = MockServer::start().await;
    mount_overlapping_catalog(&server).await;
    let dir = TempDir::new().unwrap();

    let _held = open_store(&dir.path().join("state"), "hash").unwrap();

    let result = run_harvest(
        create_test_config(&server, dir.path(), Some(2)),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(HarvestError::Storage(StorageError::Locked { .. }))
    ));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_cancelled_run_keeps_checkpoint_and_skips_export() {
    let server = MockServer::start().await;
    mount_overlapping_catalog(&server).await;
    let dir = TempDir::new().unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_harvest(
        create_test_config(&server, dir.path(), Some(2)),
        "hash",
        false,
        cancel,
    )
    .await
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(request_count(&server).await, 0);
    assert!(!dir.path().join("items.csv").exists());

    // A later run picks up everything
    let summary = run_harvest(
        create_test_config(&server, dir.path(), Some(2)),
        "hash",
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(summary.is_complete());
    assert!(dir.path().join("items.csv").exists());
}
