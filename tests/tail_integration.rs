//! Integration tests for the tailing engine against in-memory backends.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use elktail::config::QueryDefinition;
use elktail::format::Formatter;
use elktail::search::{Hit, QueryExpr, SearchBackend, SearchError, SearchRequest, SearchResponse};
use elktail::tail::{timestamp, Tail, TailError, TailState};
use serde_json::json;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

fn hit(id: &str, ts: &str) -> Hit {
    Hit::new(id, json!({ "@timestamp": ts, "message": format!("event {id}") }))
}

fn response(hits: Vec<Hit>) -> SearchResponse {
    let total = hits.len() as u64;
    SearchResponse::new(hits, total)
}

/// Returns queued responses, then fails. Records when each request arrived.
#[derive(Default)]
struct ScriptedBackend {
    responses: Mutex<Vec<SearchResponse>>,
    requests: Mutex<Vec<(Instant, SearchRequest)>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<SearchResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        self.requests
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(SearchError::Status {
                status: 503,
                body: "cluster went away".to_string(),
            });
        }
        Ok(responses.remove(0))
    }

    async fn list_indices(&self) -> Result<Vec<String>, SearchError> {
        Ok(Vec::new())
    }
}

/// Documents held in memory and matched against the query the engine sends,
/// the way a cluster would.
#[derive(Default)]
struct InMemoryCluster {
    documents: Mutex<Vec<Hit>>,
}

impl InMemoryCluster {
    fn index(&self, id: &str, ts: &str) {
        self.documents.lock().unwrap().push(hit(id, ts));
    }

    fn matches(query: &QueryExpr, doc: &Hit) -> bool {
        match query {
            QueryExpr::MatchAll | QueryExpr::QueryString(_) => true,
            QueryExpr::Ids(ids) => ids.contains(&doc.id),
            QueryExpr::Range(range) => {
                let Some(ts) = doc.timestamp(&range.field) else {
                    return false;
                };
                let ts = timestamp::parse(&ts);
                range.gte.as_deref().map_or(true, |gte| ts >= timestamp::parse(gte))
                    && range.lt.as_deref().map_or(true, |lt| ts < timestamp::parse(lt))
            }
            QueryExpr::Bool(bool_query) => {
                bool_query.filter.iter().all(|q| Self::matches(q, doc))
                    && !bool_query.must_not.iter().any(|q| Self::matches(q, doc))
            }
        }
    }
}

#[async_trait]
impl SearchBackend for InMemoryCluster {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let mut hits: Vec<Hit> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|doc| Self::matches(&request.query, doc))
            .cloned()
            .collect();
        hits.sort_by_key(|doc| {
            timestamp::parse(&doc.timestamp(&request.sort_field).unwrap_or_default())
        });
        if !request.ascending {
            hits.reverse();
        }
        hits.truncate(request.size);
        Ok(response(hits))
    }

    async fn list_indices(&self) -> Result<Vec<String>, SearchError> {
        Ok(vec!["logstash-2024.01.01".to_string()])
    }
}

fn tail<B: SearchBackend>(backend: B, initial_entries: usize) -> Tail<B> {
    Tail::new(
        backend,
        QueryDefinition::default(),
        vec!["logstash-2024.01.01".to_string()],
        Formatter::default(),
        initial_entries,
    )
}

#[tokio::test]
async fn test_overlapping_follow_up_shows_only_new_document() {
    let backend = ScriptedBackend::new(vec![
        response(vec![
            hit("t2", "2024-01-01T10:00:01.000Z"),
            hit("t1", "2024-01-01T10:00:00.000Z"),
        ]),
        // A backend that ignores the exclusion list and returns t2 again.
        response(vec![
            hit("t3", "2024-01-01T10:00:02.000Z"),
            hit("t2", "2024-01-01T10:00:01.000Z"),
        ]),
    ]);
    let mut t = tail(backend, 2);

    let first = assert_ok!(t.poll().await);
    assert_eq!(first.lines, vec!["event t1", "event t2"]);

    let request = t.follow_up_request().unwrap();
    assert_eq!(
        request.query.to_json().pointer("/bool/filter/1/bool/must_not/0/ids/values"),
        Some(&json!(["t2"]))
    );

    let second = assert_ok!(t.poll().await);
    assert_eq!(second.hits, 2);
    assert_eq!(second.lines, vec!["event t3"]);
    assert_eq!(t.last_timestamp(), Some("2024-01-01T10:00:02.000Z"));
}

#[tokio::test]
async fn test_late_documents_within_window_are_shown_once() {
    let cluster = InMemoryCluster::default();
    cluster.index("a", "2024-01-01T10:00:00.000Z");
    cluster.index("b", "2024-01-01T10:00:01.000Z");
    let mut t = tail(cluster, 10);
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut record = |lines: Vec<String>| {
        for line in lines {
            *seen.entry(line).or_default() += 1;
        }
    };

    record(assert_ok!(t.poll().await).lines);

    // Indexed late: older than the newest shown document but inside the window.
    t.backend().index("late", "2024-01-01T10:00:00.700Z");
    t.backend().index("c", "2024-01-01T10:00:01.000Z");
    record(assert_ok!(t.poll().await).lines);

    record(assert_ok!(t.poll().await).lines);

    t.backend().index("d", "2024-01-01T10:00:03.000Z");
    record(assert_ok!(t.poll().await).lines);
    record(assert_ok!(t.poll().await).lines);

    for id in ["a", "b", "late", "c", "d"] {
        assert_eq!(seen.get(&format!("event {id}")), Some(&1), "{id} shown once");
    }
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn test_documents_older_than_window_are_not_fetched() {
    let cluster = InMemoryCluster::default();
    cluster.index("a", "2024-01-01T10:00:05.000Z");
    let mut t = tail(cluster, 10);
    assert_ok!(t.poll().await);

    t.backend().index("stale", "2024-01-01T10:00:04.000Z");
    let outcome = assert_ok!(t.poll().await);
    assert!(outcome.lines.is_empty());
    assert_eq!(outcome.hits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_follow_loop_backs_off_and_stops_on_error() {
    let backend = ScriptedBackend::new(vec![
        response(vec![
            hit("t2", "2024-01-01T10:00:01.000Z"),
            hit("t1", "2024-01-01T10:00:00.000Z"),
        ]),
        response(vec![hit("t3", "2024-01-01T10:00:02.000Z")]),
        response(vec![]),
        response(vec![]),
        response(vec![]),
    ]);
    let mut t = tail(backend, 2);
    let mut out = Vec::new();

    let err = assert_err!(t.run_with(true, &mut out).await);
    assert!(matches!(err, TailError::Search(SearchError::Status { status: 503, .. })));
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "event t1\nevent t2\nevent t3\n"
    );
    assert_ne!(t.state(), TailState::Stopped);

    let requests = t.backend().requests.lock().unwrap();
    assert_eq!(requests.len(), 6);
    let gaps: Vec<Duration> = requests
        .windows(2)
        .map(|pair| pair[1].0.duration_since(pair[0].0))
        .collect();
    let expected = [500, 500, 1000, 1500, 2000];
    for (gap, ms) in gaps.iter().zip(expected) {
        let ms = Duration::from_millis(ms);
        assert!(*gap >= ms && *gap < ms + Duration::from_millis(5), "{gap:?} vs {ms:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_list_only_run_issues_single_request() {
    let backend =
        ScriptedBackend::new(vec![response(vec![hit("t1", "2024-01-01T10:00:00.000Z")])]);
    let mut t = tail(backend, 5);
    let mut out = Vec::new();

    assert_ok!(t.run_with(false, &mut out).await);

    assert_eq!(String::from_utf8(out).unwrap(), "event t1\n");
    assert_eq!(t.state(), TailState::Stopped);
    assert_eq!(t.backend().requests.lock().unwrap().len(), 1);
}
