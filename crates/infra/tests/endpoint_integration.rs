//! Integration tests for endpoint resolution and probing
//!
//! Uses real sockets: wiremock servers for answering origins, a freed port
//! for refused connections.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use medisync_common::platform::{PlatformInfo, StaticPlatformDetector};
use medisync_infra::auth::LogRedirect;
use medisync_infra::config::{ClientConfig, EndpointConfig, ProbeConfig};
use medisync_infra::endpoint::{EndpointCandidate, EndpointResolver, ProbeOutcome};
use medisync_infra::http::{ReqwestTransport, Transport};
use medisync_infra::storage::{FileStore, MemoryStore, SessionStore, API_BASE_URL_KEY};
use medisync_infra::MediSync;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn refused_origin() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/api")
}

/// Server answering the probe path under `/{status}/api` with that status.
async fn status_server(statuses: &[u16]) -> MockServer {
    let server = MockServer::start().await;
    for status in statuses {
        Mock::given(method("GET"))
            .and(path(format!("/{status}/api/users/profile/")))
            .respond_with(ResponseTemplate::new(*status))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/slow/api/users/profile/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    server
}

fn transport() -> Arc<dyn Transport> {
    Arc::new(ReqwestTransport::new().unwrap())
}

fn mobile_resolver(
    candidates: Vec<EndpointCandidate>,
    store: Arc<dyn SessionStore>,
) -> EndpointResolver {
    EndpointResolver::new(
        EndpointConfig { mobile_candidates: candidates, ..EndpointConfig::default() },
        ProbeConfig { timeout_ms: 300, ..ProbeConfig::default() },
        Arc::new(StaticPlatformDetector::new(PlatformInfo::native_shell())),
        store,
        transport(),
    )
}

/// Validates probe classification over real HTTP.
///
/// # Test Steps
/// 1. Serve 200, 401, 403, 405, 404, 500 and a delayed answer
/// 2. Probe each origin plus a refused port
/// 3. Verify 404, 5xx, timeouts and refused connections are unreachable
/// 4. Verify auth-gated statuses count as reachable
#[tokio::test]
async fn test_probe_classification() {
    let server = status_server(&[200, 401, 403, 405, 404, 500]).await;
    let resolver = mobile_resolver(Vec::new(), Arc::new(MemoryStore::new()));
    let origin = |segment: &str| format!("{}/{segment}/api", server.uri());

    assert!(resolver.probe_endpoint(&origin("200")).await);
    for status in ["401", "403", "405"] {
        assert!(resolver.probe_endpoint(&origin(status)).await, "{status}");
    }
    assert!(!resolver.probe_endpoint(&origin("404")).await);
    assert!(!resolver.probe_endpoint(&origin("500")).await);
    assert!(!resolver.probe_endpoint(&origin("slow")).await);
    assert!(!resolver.probe_endpoint(&refused_origin()).await);

    assert_eq!(resolver.probe(&origin("403")).await, ProbeOutcome::Protected { status: 403 });
    assert_eq!(resolver.probe(&origin("404")).await, ProbeOutcome::WrongService);
    assert!(matches!(resolver.probe(&origin("slow")).await, ProbeOutcome::Unreachable { .. }));
}

#[tokio::test]
async fn test_open_probe_path_rejects_auth_statuses() {
    let server = status_server(&[401]).await;
    let resolver = EndpointResolver::new(
        EndpointConfig::default(),
        ProbeConfig { auth_gated: false, ..ProbeConfig::default() },
        Arc::new(StaticPlatformDetector::new(PlatformInfo::web())),
        Arc::new(MemoryStore::new()),
        transport(),
    );

    let result = resolver.test_endpoint(&format!("{}/401/api", server.uri())).await;
    assert!(!result.success);
    assert_eq!(result.outcome, ProbeOutcome::Rejected { status: 401 });
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    let resolver = mobile_resolver(
        vec![
            EndpointCandidate::new("http://10.0.2.2:8000/api", 2, "emulator"),
            EndpointCandidate::new("http://172.20.29.202:8000/api", 1, "lan"),
        ],
        store.clone(),
    );

    let first = resolver.resolve_base_url_sync();
    let second = resolver.resolve_base_url_sync();
    assert_eq!(first, second);
    assert_eq!(first, "http://172.20.29.202:8000/api");

    store.set(API_BASE_URL_KEY, "http://192.168.1.100:8000/api/").unwrap();
    assert_eq!(resolver.resolve_base_url_sync(), "http://192.168.1.100:8000/api");
    assert_eq!(resolver.resolve_base_url_sync(), resolver.resolve_base_url_sync());
}

/// Validates mobile optimization and persistence across restarts.
///
/// # Test Steps
/// 1. Candidates: refused, 404, 401, 200 (in priority order)
/// 2. Optimize and verify the 401 origin wins
/// 3. Verify the override is written to the session file
/// 4. Reopen the file and verify a new resolver boots on the winner
#[tokio::test]
async fn test_mobile_optimization_persists_winner() {
    let server = status_server(&[404, 401, 200]).await;
    let dir = TempDir::new().unwrap();
    let session_path = dir.path().join("session.json");

    let winner = format!("{}/401/api", server.uri());
    let candidates = vec![
        EndpointCandidate::new(refused_origin(), 1, "gone"),
        EndpointCandidate::new(format!("{}/404/api", server.uri()), 2, "wrong service"),
        EndpointCandidate::new(winner.clone(), 3, "protected"),
        EndpointCandidate::new(format!("{}/200/api", server.uri()), 4, "open"),
    ];

    let store = Arc::new(FileStore::open(&session_path).unwrap());
    let resolver = mobile_resolver(candidates.clone(), store);
    assert_ne!(*resolver.active().get(), *winner);

    let switched = resolver.optimize_endpoint().await;
    assert_eq!(switched.as_deref(), Some(winner.as_str()));
    assert_eq!(*resolver.active().get(), *winner);

    // second run finds the same winner and changes nothing
    assert!(resolver.optimize_endpoint().await.is_none());

    let reopened = Arc::new(FileStore::open(&session_path).unwrap());
    assert_eq!(reopened.get(API_BASE_URL_KEY).as_deref(), Some(winner.as_str()));
    let rebooted = mobile_resolver(candidates, reopened);
    assert_eq!(rebooted.resolve_base_url_sync(), winner);
}

#[tokio::test]
async fn test_web_optimization_prefers_page_port() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let closed_port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let config = EndpointConfig {
        page_url: Some(format!("{}/dashboard", server.uri())),
        api_port: closed_port,
        ..EndpointConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let resolver = EndpointResolver::new(
        config,
        ProbeConfig::default(),
        Arc::new(StaticPlatformDetector::new(PlatformInfo::web())),
        store.clone(),
        transport(),
    );
    assert_eq!(resolver.resolve_base_url_sync(), format!("http://127.0.0.1:{closed_port}/api"));

    let switched = resolver.optimize_endpoint().await;
    assert_eq!(switched.as_deref(), Some(format!("{}/api", server.uri()).as_str()));
    assert!(store.get(API_BASE_URL_KEY).is_some());
}

#[tokio::test]
async fn test_nothing_reachable_keeps_origin() {
    let first = refused_origin();
    let resolver = mobile_resolver(
        vec![
            EndpointCandidate::new(first.clone(), 1, "gone"),
            EndpointCandidate::new(refused_origin(), 2, "also gone"),
        ],
        Arc::new(MemoryStore::new()),
    );

    assert!(resolver.find_best_endpoint().await.is_none());
    assert!(resolver.optimize_endpoint().await.is_none());
    assert_eq!(*resolver.active().get(), *first);
}

/// Validates the booted client follows the optimized origin.
///
/// # Test Steps
/// 1. Boot with a refused first candidate and the mock server second
/// 2. Run background optimization to completion
/// 3. Verify API calls reach the mock server
/// 4. Log out and verify the origin falls back to the first candidate
#[tokio::test]
async fn test_booted_client_follows_optimized_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .mount(&server)
        .await;

    let first = refused_origin();
    let mut config = ClientConfig::default();
    config.endpoint.mobile_candidates = vec![
        EndpointCandidate::new(first.clone(), 1, "gone"),
        EndpointCandidate::new(format!("{}/api", server.uri()), 2, "mock"),
    ];
    config.probe.timeout_ms = 500;

    let client = MediSync::with_transport(
        &config,
        Arc::new(StaticPlatformDetector::new(PlatformInfo::native_shell())),
        Arc::new(MemoryStore::new()),
        Arc::new(LogRedirect),
        transport(),
        None,
    )
    .unwrap();
    assert_eq!(&*client.api().base_url(), first.as_str());

    client.start().unwrap().await.unwrap();
    assert_eq!(&*client.api().base_url(), format!("{}/api", server.uri()));

    let profile: Value = client.api().get("/users/profile/").await.unwrap();
    assert_eq!(profile["id"], 42);

    client.logout();
    assert_eq!(&*client.api().base_url(), first.as_str());
}
