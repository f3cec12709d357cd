//! Integration tests for the HTTP search client against a mock cluster.

use elktail::config::{ConfigError, Configuration};
use elktail::search::{
    Credentials, ElasticClient, QueryExpr, SearchBackend, SearchError, SearchRequest,
};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> SearchRequest {
    SearchRequest {
        indices: vec!["logstash-2024.01.02".to_string()],
        sort_field: "@timestamp".to_string(),
        ascending: false,
        from: 0,
        size: 2,
        query: QueryExpr::MatchAll,
    }
}

fn msearch_body() -> serde_json::Value {
    json!({
        "responses": [{
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "hits": [
                    { "_id": "b", "_source": { "@timestamp": "2024-01-02T10:00:02.000Z", "message": "second" } },
                    { "_id": "a", "_source": { "@timestamp": "2024-01-02T10:00:01.000Z", "message": "first" } }
                ]
            }
        }]
    })
}

#[tokio::test]
async fn test_search_sends_ndjson_and_parses_hits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_msearch"))
        .and(header("content-type", "application/x-ndjson"))
        .and(body_string_contains(r#"{"index":["logstash-2024.01.02"]}"#))
        .and(body_string_contains(r#""order":"desc""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(msearch_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = assert_ok!(ElasticClient::new(&server.uri()));
    let response = assert_ok!(client.search(&request()).await);

    assert_eq!(response.total_hits, 2);
    let ids: Vec<_> = response.hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(response.hits[1].source["message"], "first");
}

#[tokio::test]
async fn test_list_indices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_cat/indices"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "index": "logstash-2024.01.01", "health": "green" },
            { "index": "logstash-2024.01.02", "health": "green" },
            { "health": "red" }
        ])))
        .mount(&server)
        .await;

    let client = assert_ok!(ElasticClient::new(&server.uri()));
    let indices = assert_ok!(client.list_indices().await);
    assert_eq!(indices, vec!["logstash-2024.01.01", "logstash-2024.01.02"]);
}

#[tokio::test]
async fn test_basic_auth_on_direct_connection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_msearch"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(msearch_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = assert_ok!(ElasticClient::new(&server.uri()))
        .with_credentials(Credentials::parse("user:pass"));
    assert_ok!(client.search(&request()).await);
}

#[tokio::test]
async fn test_query_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_msearch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responses": [{
                "error": { "root_cause": [{ "reason": "no such index [logstash-x]" }] },
                "status": 404
            }]
        })))
        .mount(&server)
        .await;

    let client = assert_ok!(ElasticClient::new(&server.uri()));
    let err = assert_err!(client.search(&request()).await);
    assert!(matches!(err, SearchError::Query(ref reason) if reason == "no such index [logstash-x]"));
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_msearch"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = assert_ok!(ElasticClient::new(&server.uri()));
    let err = assert_err!(client.search(&request()).await);
    assert!(matches!(err, SearchError::Status { status: 503, ref body } if body == "unavailable"));
}

#[tokio::test]
async fn test_kibana_login_and_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("kbn-version", "6.2.4"))
        .and(body_string_contains("username=alice"))
        .respond_with(
            ResponseTemplate::new(204).insert_header("set-cookie", "sid-auth=tok123; Path=/; HttpOnly"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/elasticsearch/_msearch"))
        .and(header("kbn-version", "6.2.4"))
        .and(header("cookie", "sid-auth=tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(msearch_body()))
        .expect(2)
        .mount(&server)
        .await;

    let client = assert_ok!(ElasticClient::new(&server.uri()))
        .with_kibana("6.2.4", None)
        .with_credentials(Credentials::parse("alice:secret"));

    assert_ok!(client.search(&request()).await);
    // The session is reused; login happens once.
    assert_ok!(client.search(&request()).await);
}

#[tokio::test]
async fn test_kibana_redirect_to_login_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/elasticsearch/_msearch"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .mount(&server)
        .await;

    let client = assert_ok!(ElasticClient::new(&server.uri())).with_kibana("6.2.4", None);
    let err = assert_err!(client.search(&request()).await);
    assert!(matches!(err, SearchError::AuthenticationRequired));
}

#[test]
fn test_from_config_rejects_malformed_header() {
    let mut config = Configuration::default();
    config.search_target.extra_headers = vec!["no colon here".to_string()];
    let err = assert_err!(ElasticClient::from_config(&config));
    assert!(matches!(err, ConfigError::InvalidHeader(_)));
}

#[test]
fn test_from_config_uses_tunnel_url() {
    let mut config = Configuration::default();
    config.search_target.url = "http://es.internal:9200".to_string();
    config.search_target.tunnel_url = Some("http://localhost:9199".to_string());
    let client = assert_ok!(ElasticClient::from_config(&config));
    assert_eq!(client.base_url(), "http://localhost:9199");
}
