mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use bookshelf_api_types::methods;
use metrics_util::debugging::DebuggingRecorder;
use tower::ServiceExt;

use bookshelf::application::access::AccessGuard;
use bookshelf::application::books::BookService;
use bookshelf::application::events::{BookEvent, EventNotifier, NoopNotifier};
use bookshelf::cache::{CacheConfig, MemorySpeedCache};
use bookshelf::infra::events::{ChannelNotifier, LogSink};
use bookshelf::infra::http::{ApiState, HealthState, RequestDeadline, RouterState, build_router};

use support::{FailingCache, FakeStore, TTL, book_service, draft};

#[tokio::test]
async fn book_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // cache hit and miss
    let store = FakeStore::new();
    let cache = Arc::new(MemorySpeedCache::new(&CacheConfig::default()));
    let service = Arc::new(BookService::new(
        store.clone(),
        store.clone(),
        cache,
        TTL,
    ));
    let book = service
        .add_book(draft("Dune", "Herbert", 1965, "sf"))
        .await
        .expect("add");
    service.get_book(&book.id).await.expect("miss");
    service.get_book(&book.id).await.expect("hit");

    // cache error
    let failing = book_service(&store, Arc::new(FailingCache::default()));
    failing.get_book(&book.id).await.expect("fallback read");

    // events delivered, then dropped after close
    let notifier = ChannelNotifier::open(Arc::new(LogSink), 4);
    notifier
        .publish(BookEvent::book_created(book.id.clone(), "Dune"))
        .expect("queued");
    notifier.close(Duration::from_secs(1)).await;
    assert!(notifier.publish(BookEvent::book_created("b-2", "Emma")).is_err());

    // rpc counters, histogram and a guard rejection
    let state = RouterState {
        api: ApiState {
            books: service,
            guard: Arc::new(AccessGuard::default()),
            events: Arc::new(NoopNotifier),
        },
        health: HealthState {
            store: store.clone(),
        },
        deadline: RequestDeadline(Duration::from_secs(5)),
    };
    let router = build_router(state);
    for role in [None, Some("admin")] {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(methods::DELETE_BOOK)
            .header("content-type", "application/json");
        if let Some(role) = role {
            builder = builder.header("x-user-role", role);
        }
        let request = builder
            .body(Body::from(format!(r#"{{"book_id":"{}"}}"#, book.id)))
            .expect("request should build");
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        assert_ne!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "bookshelf_cache_hit_total",
        "bookshelf_cache_miss_total",
        "bookshelf_cache_error_total",
        "bookshelf_events_published_total",
        "bookshelf_events_dropped_total",
        "bookshelf_access_denied_total",
        "bookshelf_rpc_requests_total",
        "bookshelf_rpc_duration_seconds",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
