//! End-to-end tests for the pouet-ingest binary
//!
//! These tests run the binary against a mocked API and check:
//! - The default `run` command writing a SQLite file
//! - The `fetch` command printing JSON lines
//! - Exit status and error output on failures

use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

/// Helper to create a mock production response
fn mock_prod_response(id: u32) -> serde_json::Value {
    json!({
        "success": true,
        "prod": {
            "id": id.to_string(),
            "name": format!("prod #{}", id),
            "type": "demo",
            "groups": [{"id": "1", "name": "Future Crew"}]
        }
    })
}

async fn mock_api(ids: std::ops::RangeInclusive<u32>) -> MockServer {
    let mock_server = MockServer::start().await;
    for id in ids {
        Mock::given(method("GET"))
            .and(path("/v1/prod/"))
            .and(query_param("id", id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_prod_response(id)))
            .mount(&mock_server)
            .await;
    }
    mock_server
}

/// Command with a clean environment pointing at the mock server, loading
/// into SQLite so tests can read the file back with rusqlite
fn pouet_ingest(mock_server: &MockServer) -> Command {
    let mut cmd = Command::cargo_bin("pouet-ingest").unwrap();
    for var in [
        "POUET_PIPELINE_NAME",
        "POUET_ID_FROM",
        "POUET_ID_TO",
        "POUET_DESTINATION",
        "POUET_DATASET",
        "POUET_TABLE",
        "POUET_DATA_DIR",
        "POUET_MAX_TABLE_NESTING",
        "POUET_HTTP_TIMEOUT_SECS",
        "LOG_LEVEL",
        "LOG_OUTPUT",
        "LOG_FILTER",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("LOG_FORMAT", "json")
        .env("POUET_DESTINATION", "sqlite")
        .env("POUET_URL_TEMPLATE", format!("{}/v1/prod/?id={{id}}", mock_server.uri()));
    cmd
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_writes_sqlite_database() {
    let mock_server = mock_api(1..=3).await;
    let dir = TempDir::new().unwrap();

    pouet_ingest(&mock_server)
        .arg("run")
        .arg("--from")
        .arg("1")
        .arg("--to")
        .arg("3")
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Fetched record"))
        .stderr(predicate::str::contains("prod #3"))
        .stderr(predicate::str::contains("Ingestion complete"));

    let conn = Connection::open(dir.path().join("pouet_prod.sqlite")).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM pouet_prod", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);

    let groups: i64 = conn
        .query_row("SELECT COUNT(*) FROM pouet_prod__prod__groups", [], |row| row.get(0))
        .unwrap();
    assert_eq!(groups, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_is_the_default_command() {
    let mock_server = mock_api(1..=2).await;
    let dir = TempDir::new().unwrap();

    pouet_ingest(&mock_server)
        .env("POUET_ID_FROM", "1")
        .env("POUET_ID_TO", "2")
        .env("POUET_DATA_DIR", dir.path())
        .env("POUET_TABLE", "prods")
        .assert()
        .success();

    let conn = Connection::open(dir.path().join("pouet_prod.sqlite")).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM prods", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dotenv_file_is_read() {
    let mock_server = mock_api(4..=5).await;
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        "POUET_ID_FROM=4\nPOUET_ID_TO=5\nPOUET_TABLE=prods_from_dotenv\n",
    )
    .unwrap();

    pouet_ingest(&mock_server)
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .success();

    let conn = Connection::open(dir.path().join("pouet_prod.sqlite")).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM prods_from_dotenv", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}

#[cfg(feature = "duckdb")]
#[tokio::test(flavor = "multi_thread")]
async fn test_run_defaults_to_duckdb() {
    let mock_server = mock_api(1..=2).await;
    let dir = TempDir::new().unwrap();

    pouet_ingest(&mock_server)
        .env_remove("POUET_DESTINATION")
        .arg("--from")
        .arg("1")
        .arg("--to")
        .arg("2")
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .success();

    assert!(!dir.path().join("pouet_prod.sqlite").exists());
    let conn = duckdb::Connection::open(dir.path().join("pouet_prod.duckdb")).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM main.pouet_prod", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_prints_json_lines() {
    let mock_server = mock_api(1..=2).await;

    let output = pouet_ingest(&mock_server)
        .arg("fetch")
        .arg("--from")
        .arg("1")
        .arg("--to")
        .arg("2")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines, vec![mock_prod_response(1), mock_prod_response(2)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_failure_exits_non_zero() {
    let mock_server = mock_api(1..=1).await;
    Mock::given(method("GET"))
        .and(path("/v1/prod/"))
        .and(query_param("id", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    let dir = TempDir::new().unwrap();

    pouet_ingest(&mock_server)
        .arg("--from")
        .arg("1")
        .arg("--to")
        .arg("3")
        .arg("--data-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Fetch failed"))
        .stderr(predicate::str::contains("id 2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_template_rejected() {
    let mock_server = MockServer::start().await;

    pouet_ingest(&mock_server)
        .env("POUET_URL_TEMPLATE", "https://api.pouet.net/v1/prod/")
        .arg("fetch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("placeholder"));
}

#[test]
fn test_unknown_destination_rejected() {
    Command::cargo_bin("pouet-ingest")
        .unwrap()
        .arg("--destination")
        .arg("postgres")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown destination"));
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("pouet-ingest")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("--max-table-nesting"));
}
