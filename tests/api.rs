mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use bookshelf_api_types::{ROLE_HEADER, TIMEOUT_HEADER, methods};
use serde_json::{Value, json};
use tower::ServiceExt;

use bookshelf::application::access::AccessGuard;
use bookshelf::application::books::BookService;
use bookshelf::application::events::{BookEvent, EventNotifier};
use bookshelf::application::repos::BooksRepo;
use bookshelf::cache::{CacheConfig, MemorySpeedCache};
use bookshelf::infra::http::{ApiState, HealthState, RequestDeadline, RouterState, build_router};

use support::{FakeStore, RecordingNotifier, SlowStore, TTL};

struct Harness {
    router: Router,
    store: Arc<FakeStore>,
    events: Arc<RecordingNotifier>,
}

fn harness_with(reader: Option<Arc<dyn BooksRepo>>, deadline: Duration) -> Harness {
    let store = FakeStore::new();
    let events = Arc::new(RecordingNotifier::default());
    let reader: Arc<dyn BooksRepo> = match reader {
        Some(reader) => reader,
        None => store.clone(),
    };
    let cache = Arc::new(MemorySpeedCache::new(&CacheConfig::default()));
    let books = Arc::new(BookService::new(reader, store.clone(), cache, TTL));
    let notifier: Arc<dyn EventNotifier> = events.clone();

    let state = RouterState {
        api: ApiState {
            books,
            guard: Arc::new(AccessGuard::default()),
            events: notifier,
        },
        health: HealthState {
            store: store.clone(),
        },
        deadline: RequestDeadline(deadline),
    };

    Harness {
        router: build_router(state),
        store,
        events,
    }
}

fn harness() -> Harness {
    harness_with(None, Duration::from_secs(5))
}

async fn rpc(
    router: &Router,
    method: &str,
    role: Option<&str>,
    body: Value,
    timeout_ms: Option<u64>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(method)
        .header("content-type", "application/json");
    if let Some(role) = role {
        builder = builder.header(ROLE_HEADER, role);
    }
    if let Some(timeout_ms) = timeout_ms {
        builder = builder.header(TIMEOUT_HEADER, timeout_ms.to_string());
    }
    let request = builder
        .body(Body::from(body.to_string()))
        .expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn call(router: &Router, method: &str, role: Option<&str>, body: Value) -> (StatusCode, Value) {
    rpc(router, method, role, body, None).await
}

async fn seed_book(router: &Router, title: &str, author: &str) -> String {
    let (status, body) = call(
        router,
        methods::ADD_BOOK,
        Some("admin"),
        json!({ "title": title, "author": author, "publication_year": 1965, "genre": "sf" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "seed failed: {body}");
    body["book_id"].as_str().expect("book id").to_string()
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn add_book_requires_admin_role() {
    let h = harness();
    let payload = json!({ "title": "Dune", "author": "Herbert" });

    let (status, body) = call(&h.router, methods::ADD_BOOK, None, payload.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "unauthenticated");

    let (status, body) = call(&h.router, methods::ADD_BOOK, Some("reader"), payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "permission_denied");

    let (status, body) = call(&h.router, methods::ADD_BOOK, Some("Admin"), payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "role match is exact: {body}");

    assert_eq!(h.store.book_count(), 0);

    let (status, body) = call(&h.router, methods::ADD_BOOK, Some("admin"), payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Dune");
    assert_eq!(body["publication_year"], 0);
    assert!(!body["book_id"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn public_methods_need_no_role() {
    let h = harness();
    let id = seed_book(&h.router, "Dune", "Herbert").await;

    let (status, body) = call(&h.router, methods::GET_BOOK, None, json!({ "book_id": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["author"], "Herbert");

    let (status, body) = call(&h.router, methods::LIST_BOOKS, None, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn authenticated_methods_accept_any_role() {
    let h = harness();
    let id = seed_book(&h.router, "Dune", "Herbert").await;
    let link = json!({ "user_id": "u-1", "book_id": id });

    let (status, _) = call(&h.router, methods::ADD_BOOK_TO_USER, None, link.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&h.router, methods::ADD_BOOK_TO_USER, Some("   "), link.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&h.router, methods::ADD_BOOK_TO_USER, Some("reader"), link.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book_id"], id.as_str());

    let (status, body) = call(
        &h.router,
        methods::GET_USER_BOOKS,
        Some("reader"),
        json!({ "user_id": "u-1", "genre": "sf" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"][0]["book_id"], id.as_str());

    let (status, _) = call(&h.router, methods::REMOVE_BOOK_FROM_USER, Some("reader"), link.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&h.router, methods::REMOVE_BOOK_FROM_USER, Some("reader"), link).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");
}

#[tokio::test]
async fn missing_fields_are_invalid_input() {
    let h = harness();

    let (status, body) = call(
        &h.router,
        methods::ADD_BOOK,
        Some("admin"),
        json!({ "title": "", "author": "Herbert" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "invalid_input");
    assert_eq!(h.store.book_count(), 0);
    assert!(h.events.events().is_empty());

    let (status, _) = call(&h.router, methods::GET_BOOK, None, json!({ "book_id": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &h.router,
        methods::GET_USER_BOOKS,
        Some("reader"),
        json!({ "user_id": " " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &h.router,
        methods::UPDATE_BOOK,
        Some("admin"),
        json!({ "book_id": "b-1", "title": "Dune" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_body_is_invalid_input() {
    let h = harness();
    let request = Request::builder()
        .method(Method::POST)
        .uri(methods::LIST_BOOKS)
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request should build");

    let response = h.router.clone().oneshot(request).await.expect("respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_books_are_not_found() {
    let h = harness();

    let (status, body) = call(&h.router, methods::GET_BOOK, None, json!({ "book_id": "nope" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");

    let (status, _) = call(&h.router, methods::DELETE_BOOK, Some("admin"), json!({ "book_id": "nope" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &h.router,
        methods::UPDATE_BOOK,
        Some("admin"),
        json!({ "book_id": "nope", "title": "T", "author": "A" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &h.router,
        methods::ADD_BOOK_TO_USER,
        Some("reader"),
        json!({ "user_id": "u-1", "book_id": "nope" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_then_get_returns_new_fields() {
    let h = harness();
    let id = seed_book(&h.router, "Dune", "Herbert").await;

    let (status, _) = call(&h.router, methods::GET_BOOK, None, json!({ "book_id": id })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &h.router,
        methods::UPDATE_BOOK,
        Some("admin"),
        json!({ "book_id": id, "title": "Dune Messiah", "author": "Herbert", "publication_year": 1969 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&h.router, methods::GET_BOOK, None, json!({ "book_id": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Dune Messiah");
    assert_eq!(body["publication_year"], 1969);
    assert_eq!(body["genre"], "");

    let (status, body) = call(&h.router, methods::DELETE_BOOK, Some("admin"), json!({ "book_id": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book_id"], id.as_str());

    let (status, _) = call(&h.router, methods::GET_BOOK, None, json!({ "book_id": id })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_outage_is_internal_error() {
    let h = harness();
    h.store.set_offline(true);

    let (status, body) = call(&h.router, methods::LIST_BOOKS, None, json!({})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&body), "internal");
}

#[tokio::test]
async fn add_book_publishes_created_event() {
    let h = harness();
    let id = seed_book(&h.router, "Dune", "Herbert").await;

    let events = h.events.events();
    assert_eq!(events, vec![BookEvent::book_created(id, "Dune")]);

    let (status, _) = call(
        &h.router,
        methods::ADD_BOOK,
        Some("admin"),
        json!({ "title": "", "author": "Herbert" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.events.events().len(), 1);
}

#[tokio::test]
async fn unknown_method_is_admin_only() {
    let h = harness();
    let method = "/bookshelf.BookService/DropAllBooks";

    let (status, _) = call(&h.router, method, None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&h.router, method, Some("reader"), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&h.router, method, Some("admin"), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");
}

#[tokio::test]
async fn caller_timeout_header_shortens_deadline() {
    let store = FakeStore::new();
    let slow: Arc<dyn BooksRepo> = SlowStore::new(store, Duration::from_secs(2));
    let h = harness_with(Some(slow), Duration::from_secs(30));

    let (status, body) = rpc(&h.router, methods::LIST_BOOKS, None, json!({}), Some(50)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(error_code(&body), "deadline_exceeded");
}

#[tokio::test]
async fn server_deadline_bounds_every_call() {
    let store = FakeStore::new();
    let slow: Arc<dyn BooksRepo> = SlowStore::new(store, Duration::from_secs(2));
    let h = harness_with(Some(slow), Duration::from_millis(50));

    let (status, _) = rpc(&h.router, methods::LIST_BOOKS, None, json!({}), Some(60_000)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn healthz_is_unguarded_and_tracks_store() {
    let h = harness();
    let probe = || {
        Request::builder()
            .method(Method::GET)
            .uri("/healthz")
            .body(Body::empty())
            .expect("request should build")
    };

    let response = h.router.clone().oneshot(probe()).await.expect("respond");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    h.store.set_offline(true);
    let response = h.router.clone().oneshot(probe()).await.expect("respond");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
