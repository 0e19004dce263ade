use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use orgboard_sdk::{
    ApiClient, ApiError, ChatBackend, ClientConfig, CollectionSource, ListController,
    MemorySessionStore, QueryState, SearchBy, Session, SessionEvent, SignUpRequest,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Default)]
struct Recorded {
    queries: Vec<String>,
    auth: Vec<Option<String>>,
    read_rooms: Vec<i64>,
}

type Shared = Arc<Mutex<Recorded>>;

fn record(state: &Shared, headers: &HeaderMap, query: Option<String>) {
    let mut recorded = state.lock().unwrap();
    recorded.auth.push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    if let Some(query) = query {
        recorded.queries.push(query);
    }
}

async fn search_organizations(
    State(state): State<Shared>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Json<Value> {
    record(&state, &headers, query);
    Json(json!({
        "data": [{"id": 1, "name": "Acme & Sons"}, {"id": 2, "name": "Acme Labs"}],
        "totalElements": 2
    }))
}

async fn search_articles(
    State(state): State<Shared>,
    Path(board_id): Path<i64>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Json<Value> {
    record(&state, &headers, query);
    Json(json!({
        "data": [{"id": 1, "title": "Welcome", "boardId": board_id}],
        "totalElements": 37
    }))
}

async fn search_tasks(RawQuery(_): RawQuery) -> Json<Value> {
    // Ignores pageSize and returns more rows than asked for.
    let rows: Vec<Value> = (1..=15).map(|id| json!({"id": id, "title": format!("task {}", id)})).collect();
    Json(json!({"data": rows, "totalElements": 15}))
}

async fn private(headers: HeaderMap) -> impl IntoResponse {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer good") => (StatusCode::OK, Json(json!({"ok": true}))),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"message": "token expired"}))),
    }
}

async fn slow_private() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_millis(300)).await;
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "token expired"})))
}

async fn failing() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "database down"})),
    )
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({}))
}

async fn sign_in(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] == "correct horse" {
        (
            StatusCode::OK,
            Json(json!({"accessToken": "good", "username": body["username"]})),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Bad credentials"})),
        )
    }
}

async fn sign_up(Json(body): Json<Value>) -> impl IntoResponse {
    assert!(body.get("confirmPassword").is_none());
    StatusCode::CREATED
}

async fn rooms() -> Json<Value> {
    Json(json!([
        {"id": 1, "name": "general", "unreadCount": 3},
        {"id": 2, "name": "random"}
    ]))
}

async fn history(Path(room_id): Path<i64>) -> Json<Value> {
    Json(json!([
        {"id": 10, "roomId": room_id, "sender": "kim", "content": "hi", "sentAt": "2024-05-01T09:00:00Z"}
    ]))
}

async fn mark_read(State(state): State<Shared>, Path(room_id): Path<i64>) -> StatusCode {
    state.lock().unwrap().read_rooms.push(room_id);
    StatusCode::NO_CONTENT
}

async fn start_backend() -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(Recorded::default()));
    let app = Router::new()
        .route("/api/organizations/search", get(search_organizations))
        .route("/api/boards/:id/articles/search", get(search_articles))
        .route("/api/boards/:id/tasks/search", get(search_tasks))
        .route("/api/private", get(private))
        .route("/api/slow-private", get(slow_private))
        .route("/api/failing", get(failing))
        .route("/api/slow", get(slow))
        .route("/api/auth/signin", post(sign_in))
        .route("/api/auth/signup", post(sign_up))
        .route("/api/chat/rooms", get(rooms))
        .route("/api/chat/rooms/:id/messages", get(history))
        .route("/api/chat/rooms/:id/read", post(mark_read))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/api", addr), state)
}

fn client(api_url: &str, session: Session) -> ApiClient {
    let config = ClientConfig::default().with_api_url(api_url);
    ApiClient::new(&config, session).expect("should build client")
}

#[tokio::test]
async fn test_unauthorized_signals_sign_in_once() {
    let (api_url, _) = start_backend().await;
    let session = Session::new(MemorySessionStore::with_token("stale"));
    let mut events = session.subscribe();
    let api = client(&api_url, session.clone());

    let url = api.endpoint("private").unwrap();
    let (a, b, c) = tokio::join!(
        api.get_json::<Value>(url.clone()),
        api.get_json::<Value>(url.clone()),
        api.get_json::<Value>(url.clone()),
    );
    for result in [a, b, c] {
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    assert!(session.token().is_none(), "rejected token should be evicted");
    assert_eq!(events.try_recv(), Ok(SessionEvent::SignInRequired));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

    // A later 401 after the eviction does not signal again.
    let _ = api.get_json::<Value>(url.clone()).await;
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_sign_in_stores_token_and_rearms() {
    let (api_url, _) = start_backend().await;
    let session = Session::in_memory();
    let mut events = session.subscribe();
    let api = client(&api_url, session.clone());

    let err = api.sign_in("kim", "wrong").await.unwrap_err();
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Bad credentials");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!session.is_signed_in());

    let response = api.sign_in("kim", "correct horse").await.unwrap();
    assert_eq!(response.access_token, "good");
    assert_eq!(session.token().as_deref(), Some("good"));
    assert_eq!(events.try_recv(), Ok(SessionEvent::SignedIn));

    let ok: Value = api.get_json(api.endpoint("private").unwrap()).await.unwrap();
    assert_eq!(ok["ok"], true);

    session.sign_in("bad").unwrap();
    assert!(api.get_json::<Value>(api.endpoint("private").unwrap()).await.is_err());
    assert_eq!(events.try_recv(), Ok(SessionEvent::SignedIn));
    assert_eq!(events.try_recv(), Ok(SessionEvent::SignInRequired));
}

#[tokio::test]
async fn test_late_unauthorized_keeps_newer_token() {
    let (api_url, _) = start_backend().await;
    let session = Session::new(MemorySessionStore::with_token("old"));
    let api = client(&api_url, session.clone());

    let url = api.endpoint("slow-private").unwrap();
    let pending = tokio::spawn({
        let api = api.clone();
        async move { api.get_json::<Value>(url).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.sign_in("fresh").unwrap();
    let mut events = session.subscribe();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(session.token().as_deref(), Some("fresh"));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_bearer_header_only_when_signed_in() {
    let (api_url, recorded) = start_backend().await;
    let session = Session::in_memory();
    let api = client(&api_url, session.clone());

    api.organizations().fetch(&QueryState::default()).await.unwrap();
    session.sign_in("abc").unwrap();
    api.organizations().fetch(&QueryState::default()).await.unwrap();

    let auth = recorded.lock().unwrap().auth.clone();
    assert_eq!(auth, vec![None, Some("Bearer abc".to_string())]);
}

#[tokio::test]
async fn test_search_parameters_per_route() {
    let (api_url, recorded) = start_backend().await;
    let api = client(&api_url, Session::in_memory());

    let query = QueryState::default()
        .with_search("acme & sons")
        .with_search_by(SearchBy::field("name"));
    let page = api.organizations().fetch(&query).await.unwrap();
    assert_eq!(page.data[0].name, "Acme & Sons");

    api.organizations().fetch(&QueryState::default()).await.unwrap();
    api.board_articles(3).fetch(&QueryState::default()).await.unwrap();

    let queries = recorded.lock().unwrap().queries.clone();
    assert_eq!(
        queries,
        vec![
            "searchBy=name&search=acme%20%26%20sons&page=0&pageSize=10&sortBy=id&sortDirection=desc",
            "page=0&pageSize=10&sortBy=id&sortDirection=desc",
            "searchBy=all&search=&page=0&pageSize=10&sortBy=id&sortDirection=desc",
        ]
    );
}

#[tokio::test]
async fn test_article_list_end_to_end() {
    let (api_url, _) = start_backend().await;
    let api = client(&api_url, Session::in_memory());

    let articles = ListController::open(api.board_articles(3), QueryState::default()).await;
    let snapshot = articles.snapshot();

    assert!(!snapshot.loading);
    assert_eq!(snapshot.page.len(), 1);
    assert_eq!(snapshot.page.total_elements, 37);
    assert_eq!(snapshot.page_count(), 4);
    assert_eq!(snapshot.page.data[0].board_id, Some(3));
}

#[tokio::test]
async fn test_oversized_page_is_truncated() {
    let (api_url, _) = start_backend().await;
    let api = client(&api_url, Session::in_memory());

    let page = api.board_tasks(1).fetch(&QueryState::default()).await.unwrap();
    assert_eq!(page.len(), 10);
    assert_eq!(page.total_elements, 15);
}

#[tokio::test]
async fn test_error_message_and_timeout() {
    let (api_url, _) = start_backend().await;
    let config = ClientConfig::default()
        .with_api_url(&api_url)
        .with_request_timeout(Duration::from_millis(200));
    let api = ApiClient::new(&config, Session::in_memory()).unwrap();

    let err = api
        .get_json::<Value>(api.endpoint("failing").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Status { status: 500, ref message } if message == "database down"
    ));

    let err = api
        .get_json::<Value>(api.endpoint("slow").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Timeout), "got {:?}", err);
}

#[tokio::test]
async fn test_sign_up_posts_validated_form() {
    let (api_url, _) = start_backend().await;
    let api = client(&api_url, Session::in_memory());

    api.sign_up(SignUpRequest {
        username: "kim".to_string(),
        password: "longenough".to_string(),
        confirm_password: "longenough".to_string(),
        phone: Some("+82 (10) 1234-5678".to_string()),
    })
    .await
    .expect("valid form should be accepted");
}

#[tokio::test]
async fn test_chat_backend_routes() {
    let (api_url, recorded) = start_backend().await;
    let api = client(&api_url, Session::in_memory());

    let rooms = api.list_rooms().await.unwrap();
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].unread_count, 3);
    assert_eq!(rooms[1].unread_count, 0);

    let history = api.load_history(2).await.unwrap();
    assert_eq!(history[0].room_id, 2);
    assert_eq!(history[0].sent_at.as_deref(), Some("2024-05-01T09:00:00Z"));

    api.mark_read(2).await.unwrap();
    assert_eq!(recorded.lock().unwrap().read_rooms, vec![2]);
}
