// Integration tests: the game API client against a mock HTTP server.

use std::io::{Cursor, Write};
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use raiden_bot::error::{BotError, UpstreamError};
use raiden_bot::model::Collection;
use raiden_bot::upstream::{GameApi, PnwClient, RetryPolicy};

const KEY: &str = "test-key";

fn zipped(name: &str, csv: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(name, SimpleFileOptions::default()).unwrap();
    writer.write_all(csv.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn client(server: &MockServer) -> PnwClient {
    PnwClient::new(KEY, server.uri(), server.uri())
        .unwrap()
        .with_retry(RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(10),
        })
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

const NATIONS_CSV: &str = "nation_id,nation_name,score,cities\n1,Alpha,1000.5,10\n2,Bravo,800,7\n";

// ── Bulk files ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_download_extracts_zipped_csv() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nations/nations-2024-05-02.csv.zip"))
        .and(query_param("key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zipped("nations.csv", NATIONS_CSV)))
        .expect(1)
        .mount(&server)
        .await;

    let table = client(&server)
        .download_table_for(Collection::Nations, day(2))
        .await
        .unwrap();
    assert_eq!(table.len(), 2);
    assert!(table.has_column("score"));
}

#[tokio::test]
async fn test_download_falls_back_to_previous_day() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wars/wars-2024-05-02.csv.zip"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wars/wars-2024-05-01.csv.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zipped(
            "wars.csv",
            "war_id,aggressor_nation_id,defender_nation_id\n9,1,2\n",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let table = client(&server)
        .download_table_for(Collection::Wars, day(2))
        .await
        .unwrap();
    assert_eq!(table.len(), 1);
}

#[tokio::test]
async fn test_download_reports_missing_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server)
        .download_table_for(Collection::Cities, day(2))
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Status(404)));
}

#[tokio::test]
async fn test_download_rejects_non_zip_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .download_table_for(Collection::Alliances, day(2))
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Archive(_)));
}

// ── Throttling ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_throttled_request_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nations/nations-2024-05-02.csv.zip"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/nations/nations-2024-05-02.csv.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zipped("nations.csv", NATIONS_CSV)))
        .expect(1)
        .mount(&server)
        .await;

    let table = client(&server)
        .download_table_for(Collection::Nations, day(2))
        .await
        .unwrap();
    assert_eq!(table.len(), 2);
}

#[tokio::test]
async fn test_throttled_twice_gives_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server)
        .download_table_for(Collection::Nations, day(2))
        .await
        .unwrap_err();
    // Throttling is not a missing file, so there is no fallback to yesterday.
    assert!(matches!(err, UpstreamError::Throttled));
}

// ── GraphQL ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_nation_lookup_decodes_loose_numbers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(query_param("api_key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "nations": { "data": [{
                "id": "42",
                "nation_name": "Target",
                "leader_name": "Leader",
                "score": 1234.5,
                "num_cities": 11,
                "alliance_id": "0",
                "soldiers": 1500.0,
                "last_active": "2024-05-01 12:00:00",
                "money": null
            }] } }
        })))
        .mount(&server)
        .await;

    let nation = client(&server).nation(42).await.unwrap().unwrap();
    assert_eq!(nation.id, 42);
    assert_eq!(nation.nation_name, "Target");
    assert_eq!(nation.city_count(), 11);
    assert_eq!(nation.soldiers, 1500);
    assert_eq!(nation.money, 0.0);
    assert!(nation.last_active.is_some());
}

#[tokio::test]
async fn test_unknown_nation_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "nations": { "data": [] } } })),
        )
        .mount(&server)
        .await;

    assert!(client(&server).nation(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_graphql_errors_are_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Invalid API key" }]
        })))
        .mount(&server)
        .await;

    let err = client(&server).war(5).await.unwrap_err();
    match err {
        UpstreamError::Decode(msg) => assert!(msg.contains("Invalid API key")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_alliance_members_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("page: 1,"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "nations": {
                "paginatorInfo": { "hasMorePages": true },
                "data": [{ "id": "1" }, { "id": "2" }]
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("page: 2,"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "nations": {
                "paginatorInfo": { "hasMorePages": false },
                "data": [{ "id": "3" }]
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let members = client(&server).alliance_members(13033).await.unwrap();
    let ids: Vec<i64> = members.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

// ── Error hygiene ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_transport_errors_do_not_expose_api_key() {
    const SECRET: &str = "SUPERSECRETKEY";
    // Nothing listens on port 1, so every request fails before a response.
    let client = PnwClient::new(SECRET, "http://127.0.0.1:1", "http://127.0.0.1:1").unwrap();

    let err = client
        .download_table_for(Collection::Nations, day(2))
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Http(_)));
    assert!(!err.to_string().contains(SECRET));
    assert!(!format!("{err:?}").contains(SECRET));

    let err = client.nation(1).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Http(_)));
    let err = BotError::from(err);
    assert!(!err.to_string().contains(SECRET));
    assert!(!format!("{err:?}").contains(SECRET));
}
