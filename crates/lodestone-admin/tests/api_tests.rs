//! Integration tests for the admin API endpoints.
//!
//! Most tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server, backed by a private in-memory store. One test
//! drives `bind` and `serve` over a loopback socket.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use lodestone_admin::router::build_router;
use lodestone_admin::state::AdminState;
use lodestone_core::config::FeedConfig;
use lodestone_core::{FeedEngine, IoPool, MemoryStats, RecordingMessenger, Roster};
use lodestone_db::DurableStore;
use lodestone_types::{ActorId, AnnouncementId, ItemCount};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

struct Fixture {
    state: Arc<AdminState>,
    store: DurableStore,
    stats: Arc<MemoryStats>,
    roster: Arc<Roster>,
    messenger: Arc<RecordingMessenger>,
}

async fn make_fixture() -> Fixture {
    let store = DurableStore::open_in_memory().await.unwrap();
    let stats = Arc::new(MemoryStats::new());
    let roster = Arc::new(Roster::new());
    let messenger = Arc::new(RecordingMessenger::new());
    let feed = FeedEngine::new(
        store.clone(),
        stats.clone(),
        roster.clone(),
        messenger.clone(),
        IoPool::new(2),
        FeedConfig::default(),
    );
    let state = Arc::new(AdminState::new(Some(feed), stats.clone()));
    Fixture {
        state,
        store,
        stats,
        roster,
        messenger,
    }
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn publish_request(message: &str) -> Request<Body> {
    Request::post("/api/announcements")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "message": message }).to_string()))
        .unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_status_reports_store_and_feed() {
    let fixture = make_fixture().await;
    let response = build_router(fixture.state)
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["store"], "available");
    assert_eq!(json["retention"], 10);
    assert_eq!(json["line_budget"], 10);
}

#[tokio::test]
async fn test_publish_returns_created_id() {
    let fixture = make_fixture().await;
    let actor = ActorId::new();
    fixture.roster.join(actor);

    let response = build_router(fixture.state)
        .oneshot(publish_request("  Server restart at dawn "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["id"], 1);

    assert_eq!(
        fixture.messenger.batches_for(actor),
        vec![vec!["[Announcement] Server restart at dawn".to_owned()]]
    );
    let snapshot = fixture.store.snapshots().get(actor).await.unwrap();
    assert_eq!(snapshot.last_seen_announcement, AnnouncementId(1));
}

#[tokio::test]
async fn test_publish_blank_is_bad_request() {
    let fixture = make_fixture().await;
    let response = build_router(fixture.state)
        .oneshot(publish_request("   "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
    assert_eq!(fixture.store.announcements().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_publish_with_closed_store_is_unavailable() {
    let fixture = make_fixture().await;
    fixture.store.close().await;

    let response = build_router(fixture.state)
        .oneshot(publish_request("hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_no_store_is_unavailable() {
    let stats = Arc::new(MemoryStats::new());
    let state = Arc::new(AdminState::new(None, stats));
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(publish_request("hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = router
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["store"], "unavailable");
}

#[tokio::test]
async fn test_list_announcements_oldest_first() {
    let fixture = make_fixture().await;
    let router = build_router(fixture.state);
    for message in ["first", "second", "third"] {
        let response = router.clone().oneshot(publish_request(message)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = router
        .oneshot(Request::get("/api/announcements").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 3);
    assert_eq!(json["announcements"][0]["message"], "first");
    assert_eq!(json["announcements"][2]["message"], "third");
}

#[tokio::test]
async fn test_list_announcements_newest_first() {
    let fixture = make_fixture().await;
    let router = build_router(fixture.state);
    for message in ["first", "second", "third"] {
        let response = router.clone().oneshot(publish_request(message)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = router
        .clone()
        .oneshot(
            Request::get("/api/announcements?order=newest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["announcements"][0]["message"], "third");
    assert_eq!(json["announcements"][2]["message"], "first");

    let response = router
        .oneshot(
            Request::get("/api/announcements?order=sideways")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_snapshot_of_unknown_actor_is_zero() {
    let fixture = make_fixture().await;
    let path = format!("/api/actors/{}/snapshot", ActorId::new());

    let response = build_router(fixture.state)
        .oneshot(Request::get(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["last_seen_announcement"], 0);
    assert_eq!(json["items_sold"], "0");
}

#[tokio::test]
async fn test_snapshot_invalid_uuid() {
    let fixture = make_fixture().await;
    let response = build_router(fixture.state)
        .oneshot(
            Request::get("/api/actors/not-a-uuid/snapshot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_global_stats_aggregates_sales() {
    let fixture = make_fixture().await;
    fixture
        .stats
        .record_sale(ActorId::new(), &ItemCount::from(3_u32), Decimal::new(125, 2));
    fixture
        .stats
        .record_sale(ActorId::new(), &ItemCount::from(4_u32), Decimal::new(75, 2));

    let response = build_router(fixture.state)
        .oneshot(Request::get("/api/stats/global").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "global");
    assert_eq!(json["items_sold"], "7");
    assert_eq!(json["money_earned"], "2.00");
}

#[tokio::test]
async fn test_bound_listener_serves_status() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let fixture = make_fixture().await;
    let config = lodestone_admin::ServerConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
    };
    let listener = lodestone_admin::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(lodestone_admin::serve(listener, fixture.state));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/status HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("\"store\":\"available\""), "{response}");

    server.abort();
}

#[tokio::test]
async fn test_bind_rejects_bad_address() {
    let config = lodestone_admin::ServerConfig {
        host: "not an address".to_owned(),
        port: 80,
    };
    let result = lodestone_admin::bind(&config).await;
    assert!(matches!(result, Err(lodestone_admin::ServerError::Bind(_))));
}
