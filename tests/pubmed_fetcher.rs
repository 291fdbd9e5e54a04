//! Integration tests for the PubMed fetcher against a mock E-utilities server.

use std::time::Duration;

use mesh_trends::fetch::{
    FetchError, FetchQuery, PubMedConfig, PubMedFetcher, RecordFetcher, RetryPolicy,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn config(server: &MockServer) -> PubMedConfig {
    PubMedConfig {
        base_url: server.uri(),
        request_interval: Some(Duration::ZERO),
        ..PubMedConfig::default()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50), 2.0)
}

fn query() -> FetchQuery {
    FetchQuery::new("Shiseido", vec!["beauty".to_string()], 2016, 2025)
}

fn esearch_body(ids: &[&str]) -> serde_json::Value {
    json!({
        "header": {"type": "esearch", "version": "0.3"},
        "esearchresult": {
            "count": ids.len().to_string(),
            "retmax": ids.len().to_string(),
            "retstart": "0",
            "idlist": ids,
        }
    })
}

fn article(pmid: &str, year: Option<&str>, descriptors: &[&str]) -> String {
    let pub_date = year.map_or_else(
        || "<MedlineDate>Winter</MedlineDate>".to_string(),
        |year| format!("<Year>{year}</Year>"),
    );
    let headings: String = descriptors
        .iter()
        .map(|name| {
            format!("<MeshHeading><DescriptorName MajorTopicYN=\"N\">{name}</DescriptorName></MeshHeading>")
        })
        .collect();
    format!(
        "<PubmedArticle><MedlineCitation><PMID Version=\"1\">{pmid}</PMID>\
         <Article><Journal><JournalIssue><PubDate>{pub_date}</PubDate></JournalIssue></Journal></Article>\
         <MeshHeadingList>{headings}</MeshHeadingList></MedlineCitation></PubmedArticle>"
    )
}

fn article_set(articles: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" ?>\n<PubmedArticleSet>{}</PubmedArticleSet>",
        articles.concat()
    )
}

async fn mount_esearch(server: &MockServer, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(ids)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_returns_records_and_drops_out_of_window_years() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("db", "pubmed"))
        .and(query_param("retmode", "json"))
        .and(query_param("retmax", "5000"))
        .and(query_param(
            "term",
            "(\"Shiseido\"[Affiliation]) AND (beauty) AND (\"2016\"[PDAT] : \"2025\"[PDAT])",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&["1", "2", "3", "4"])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", "1,2,3,4"))
        .and(query_param("rettype", "medline"))
        .and(query_param("retmode", "xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_set(&[
            article("1", Some("2020"), &["Skin", "Retinol"]),
            article("2", Some("2021"), &["Skin"]),
            article("3", Some("2010"), &["Hair"]),
            article("4", None, &["Aged"]),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::new(config(&server)).unwrap();
    let records = fetcher.fetch(&query()).await.unwrap();

    let pmids: Vec<&str> = records.iter().map(|r| r.pmid.as_str()).collect();
    assert_eq!(pmids, vec!["1", "2", "4"]);
    assert_eq!(records[0].keywords, vec!["Skin", "Retinol"]);
    assert_eq!(records[2].year, None);
}

#[tokio::test]
async fn test_fetch_zero_hits_skips_efetch() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_esearch(&server, &[]).await;
    Mock::given(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::new(config(&server)).unwrap();
    let records = fetcher.fetch(&query()).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_fetch_retries_server_error_then_succeeds() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&["7"])))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/efetch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_set(&[article("7", Some("2019"), &["Skin"])])),
        )
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::with_retry_policy(config(&server), fast_retry()).unwrap();
    let records = fetcher.fetch(&query()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pmid, "7");
}

#[tokio::test]
async fn test_fetch_honours_retry_after_on_429() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&[])))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::with_retry_policy(config(&server), fast_retry()).unwrap();
    assert!(fetcher.fetch(&query()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_permanent_client_error_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::with_retry_policy(config(&server), fast_retry()).unwrap();
    let err = fetcher.fetch(&query()).await.unwrap_err();
    assert!(
        matches!(err, FetchError::HttpStatus { status: 400, .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_attempts() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::with_retry_policy(config(&server), fast_retry()).unwrap();
    let err = fetcher.fetch(&query()).await.unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_fetch_esearch_error_field_is_api_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "esearchresult": {"ERROR": "Invalid query syntax"}
        })))
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::new(config(&server)).unwrap();
    let err = fetcher.fetch(&query()).await.unwrap_err();
    match err {
        FetchError::Api { message, .. } => assert_eq!(message, "Invalid query syntax"),
        other => panic!("expected Api error, got {other}"),
    }
}

#[tokio::test]
async fn test_fetch_malformed_esearch_json() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::with_retry_policy(config(&server), fast_retry()).unwrap();
    let err = fetcher.fetch(&query()).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_fetch_efetch_error_element_is_api_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_esearch(&server, &["1"]).await;
    Mock::given(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<eFetchResult><ERROR>Empty id list - nothing todo</ERROR></eFetchResult>",
        ))
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::new(config(&server)).unwrap();
    let err = fetcher.fetch(&query()).await.unwrap_err();
    assert!(matches!(err, FetchError::Api { .. }), "unexpected error: {err}");
}

#[tokio::test]
async fn test_fetch_batches_preserve_pmid_order() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_esearch(&server, &["1", "2", "3", "4", "5"]).await;

    // The first batch answers last; results must still come back in order.
    let batches: [(&str, &[&str], u64); 3] = [
        ("1,2", &["1", "2"], 300),
        ("3,4", &["3", "4"], 0),
        ("5", &["5"], 100),
    ];
    for (ids, pmids, delay_ms) in batches {
        let articles: Vec<String> = pmids
            .iter()
            .map(|pmid| article(pmid, Some("2020"), &["Skin"]))
            .collect();
        Mock::given(path("/efetch.fcgi"))
            .and(query_param("id", ids))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(article_set(&articles))
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let fetcher = PubMedFetcher::new(PubMedConfig {
        batch_size: 2,
        concurrency: 3,
        ..config(&server)
    })
    .unwrap();
    let records = fetcher.fetch(&query()).await.unwrap();

    let pmids: Vec<&str> = records.iter().map(|r| r.pmid.as_str()).collect();
    assert_eq!(pmids, vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn test_fetch_sends_identity_params_and_hides_api_key_in_errors() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/esearch.fcgi"))
        .and(query_param("tool", "mesh-trends"))
        .and(query_param("email", "analyst@example.com"))
        .and(query_param("api_key", "secret-key-123"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = PubMedFetcher::with_retry_policy(
        PubMedConfig {
            email: Some("analyst@example.com".to_string()),
            api_key: Some("secret-key-123".to_string()),
            ..config(&server)
        },
        fast_retry(),
    )
    .unwrap();

    let err = fetcher.fetch(&query()).await.unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status: 403, .. }));
    assert!(!err.to_string().contains("secret-key-123"));
    assert!(!format!("{err:?}").contains("secret-key-123"));
}
