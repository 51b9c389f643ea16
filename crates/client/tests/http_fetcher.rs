use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use missive_client::{ClientConfig, HttpHistoryFetcher};
use missive_history::{
    ConversationIdentity, Cursor, FetchError, FetchQuery, HistoryFetcher, MessageId,
};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>,
}

impl Recorded {
    fn take(&self) -> Vec<(HashMap<String, String>, Option<String>)> {
        std::mem::take(&mut *self.requests.lock().expect("recorded lock poisoned"))
    }
}

async fn history_page(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let wants_sidebar = params.get("chat_list").is_some_and(|flag| flag == "1");
    let older = params.contains_key("message_id");
    recorded
        .requests
        .lock()
        .expect("recorded lock poisoned")
        .push((params, authorization));

    let (rows, total) = if older {
        (
            vec![
                json!({"message_id": 10, "author_id": 2, "author": "lee", "message": "ten", "dateline": 1_000}),
                json!({"message_id": 9, "author_id": 1, "author": "kim", "message": "nine", "dateline": 900}),
            ],
            2,
        )
    } else {
        (
            vec![
                json!({"message_id": 12, "author_id": 1, "author": "kim", "message": "twelve", "dateline": 1_200}),
                json!({"message_id": 11, "author_id": 2, "author": "lee", "message": "eleven", "dateline": 1_100}),
            ],
            14,
        )
    };

    let mut body = json!({"rows": rows, "total": total, "page_size": 2});
    if wants_sidebar {
        body["chat_list"] = json!([
            {"conversation_id": 5, "to_uid": 2, "to_username": "lee", "last_message": "twelve", "last_dateline": 1_200, "unread": 0}
        ]);
    }
    Json(body)
}

async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}/api")
}

async fn spawn_history_server() -> (String, Recorded) {
    let recorded = Recorded::default();
    let router = Router::new()
        .route("/api/messages/chat", get(history_page))
        .with_state(recorded.clone());
    (spawn_server(router).await, recorded)
}

#[tokio::test]
async fn initial_page_decodes_rows_and_sidebar() {
    let (endpoint, recorded) = spawn_history_server().await;
    let fetcher = HttpHistoryFetcher::new(ClientConfig::new(endpoint).with_auth_token("secret"))
        .expect("valid config");

    let page = fetcher
        .fetch(&FetchQuery::initial(ConversationIdentity::chat(5), true))
        .await
        .expect("page fetched");

    let ids: Vec<_> = page.rows.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![MessageId::new(12), MessageId::new(11)]);
    assert_eq!(page.rows[0].text, "twelve");
    assert_eq!(page.total, 14);
    assert_eq!(page.page_size, 2);
    let sidebar = page.sidebar_list.expect("sidebar requested");
    assert_eq!(sidebar.len(), 1);
    assert_eq!(sidebar[0].conversation_id, 5);

    let requests = recorded.take();
    assert_eq!(requests.len(), 1);
    let (params, authorization) = &requests[0];
    assert_eq!(params.get("chat_id").map(String::as_str), Some("5"));
    assert_eq!(params.get("chat_list").map(String::as_str), Some("1"));
    assert_eq!(params.get("page").map(String::as_str), Some("1"));
    assert!(!params.contains_key("uid"));
    assert_eq!(authorization.as_deref(), Some("Bearer secret"));
}

#[tokio::test]
async fn older_page_sends_cursor_without_sidebar_flag() {
    let (endpoint, recorded) = spawn_history_server().await;
    let fetcher = HttpHistoryFetcher::new(ClientConfig::new(endpoint)).expect("valid config");
    let initial = FetchQuery::initial(ConversationIdentity::user(2), false);
    let older = FetchQuery::older(
        &initial,
        Cursor {
            dateline: 1_100,
            message_id: MessageId::new(11),
        },
    );

    let page = fetcher.fetch(&older).await.expect("page fetched");

    assert!(page.is_last_page());
    assert_eq!(page.sidebar_list, None);
    let requests = recorded.take();
    let (params, authorization) = &requests[0];
    assert_eq!(params.get("uid").map(String::as_str), Some("2"));
    assert_eq!(params.get("dateline").map(String::as_str), Some("1100"));
    assert_eq!(params.get("message_id").map(String::as_str), Some("11"));
    assert_eq!(params.get("page").map(String::as_str), Some("2"));
    assert_eq!(params.get("newer").map(String::as_str), Some("0"));
    assert!(!params.contains_key("chat_list"));
    assert_eq!(authorization, &None);
}

#[tokio::test]
async fn error_status_is_a_server_error() {
    let router = Router::new().route(
        "/api/messages/chat",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let endpoint = spawn_server(router).await;
    let fetcher = HttpHistoryFetcher::new(ClientConfig::new(endpoint)).expect("valid config");

    let error = fetcher
        .fetch(&FetchQuery::initial(ConversationIdentity::chat(1), false))
        .await
        .expect_err("503 fails");

    assert!(matches!(
        error,
        FetchError::Server {
            status: Some(503),
            ..
        }
    ));
}

#[tokio::test]
async fn undecodable_body_is_a_server_error() {
    let router = Router::new().route("/api/messages/chat", get(|| async { "<html>login</html>" }));
    let endpoint = spawn_server(router).await;
    let fetcher = HttpHistoryFetcher::new(ClientConfig::new(endpoint)).expect("valid config");

    let error = fetcher
        .fetch(&FetchQuery::initial(ConversationIdentity::chat(1), false))
        .await
        .expect_err("html is not a page");

    assert!(matches!(
        error,
        FetchError::Server {
            status: Some(200),
            ..
        }
    ));
}

#[tokio::test]
async fn timeout_is_a_network_error() {
    let router = Router::new().route(
        "/api/messages/chat",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "{}"
        }),
    );
    let endpoint = spawn_server(router).await;
    let fetcher = HttpHistoryFetcher::new(
        ClientConfig::new(endpoint).with_timeout(Duration::from_millis(100)),
    )
    .expect("valid config");

    let error = fetcher
        .fetch(&FetchQuery::initial(ConversationIdentity::chat(1), false))
        .await
        .expect_err("slow server times out");

    assert!(error.is_network());
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let addr = listener.local_addr().expect("listener address");
    drop(listener);
    let fetcher =
        HttpHistoryFetcher::new(ClientConfig::new(format!("http://{addr}"))).expect("valid config");

    let error = fetcher
        .fetch(&FetchQuery::initial(ConversationIdentity::chat(1), false))
        .await
        .expect_err("nothing listens");

    assert!(error.is_network());
}
