//! Integration tests for health probes, service routing, and forwarding.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::{StatusCode, Uri};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use frontgate::config::model::{HostPort, ProxyConfig, Service};
use frontgate::health::{self, HealthChecker, HealthError, HEALTH_CHECK_HEADER};
use frontgate::proxy::table::RoutingTable;
use frontgate::server::{self, AppState};
use http_body::Frame;

const DOMAIN: &str = "my-service.my-company.com";

fn config_with_hosts(hosts: Vec<HostPort>) -> ProxyConfig {
    ProxyConfig {
        listen: HostPort::new("127.0.0.1", 8080),
        services: vec![Service {
            name: "my-service".into(),
            domain: DOMAIN.into(),
            hosts,
        }],
    }
}

fn golden_config() -> ProxyConfig {
    config_with_hosts(vec![
        HostPort::new("127.0.0.1", 9090),
        HostPort::new("127.0.0.1", 9091),
    ])
}

async fn spawn_backend(router: Router) -> HostPort {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    HostPort::new("127.0.0.1", addr.port())
}

async fn start_proxy(state: AppState) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let router = server::build_router(Arc::new(state), 1_048_576);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}

async fn start_with(
    config: ProxyConfig,
    checker: Arc<dyn HealthChecker>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    start_proxy(AppState::from_config(config, checker).unwrap()).await
}

async fn get_text(url: &str) -> (StatusCode, String) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status();
    (status, resp.text().await.unwrap())
}

#[tokio::test]
async fn health_check_ok() {
    let (addr, shutdown) = start_with(golden_config(), health::default_checker()).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/"))
        .header(HEALTH_CHECK_HEADER, "health-check")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn health_check_fail() {
    let checker = |_: &RoutingTable| -> Result<(), HealthError> {
        Err(HealthError::new("failed health check"))
    };
    let (addr, shutdown) = start_with(golden_config(), Arc::new(checker)).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/?s={DOMAIN}"))
        .header(HEALTH_CHECK_HEADER, "yes")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.text().await.unwrap(), "failed health check");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn health_checker_sees_routing_table() {
    let checker = |table: &RoutingTable| -> Result<(), HealthError> {
        match table.get(DOMAIN) {
            Some(set) if set.hosts().len() == 2 => Ok(()),
            _ => Err(HealthError::new("backends missing")),
        }
    };
    let (addr, shutdown) = start_with(golden_config(), Arc::new(checker)).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/"))
        .header(HEALTH_CHECK_HEADER, "1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn empty_health_header_is_routed() {
    let (addr, shutdown) = start_with(golden_config(), health::default_checker()).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/"))
        .header(HEALTH_CHECK_HEADER, "")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.text().await.unwrap(), "service not found");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn missing_s_param_returns_404() {
    let (addr, shutdown) = start_with(golden_config(), health::default_checker()).await;

    let (status, body) = get_text(&format!("http://{addr}/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "service not found");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unknown_s_param_returns_404() {
    let (addr, shutdown) = start_with(golden_config(), health::default_checker()).await;

    let (status, body) = get_text(&format!("http://{addr}/?s=foo")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "service not found");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn proxies_to_backend() {
    let backend = spawn_backend(Router::new().route("/", get(|| async { "this is the backend" }))).await;
    let (addr, shutdown) =
        start_with(config_with_hosts(vec![backend]), health::default_checker()).await;

    let (status, body) = get_text(&format!("http://{addr}/?s={DOMAIN}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "this is the backend");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn s_param_is_not_forwarded() {
    let backend =
        spawn_backend(Router::new().fallback(|uri: Uri| async move { uri.to_string() })).await;
    let (addr, shutdown) =
        start_with(config_with_hosts(vec![backend]), health::default_checker()).await;

    let (status, body) =
        get_text(&format!("http://{addr}/orders/42?s={DOMAIN}&page=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "/orders/42?page=2");

    let (_, body) = get_text(&format!("http://{addr}/orders?s={DOMAIN}")).await;
    assert_eq!(body, "/orders");

    // Escapes that are not valid UTF-8 reach the backend untouched.
    let (_, body) = get_text(&format!("http://{addr}/x?tok=%FF%FE&s={DOMAIN}&a=b%2Fc")).await;
    assert_eq!(body, "/x?tok=%FF%FE&a=b%2Fc");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn request_body_and_method_are_forwarded() {
    let backend = spawn_backend(Router::new().fallback(
        |method: axum::http::Method, body: String| async move { format!("{method} {body}") },
    ))
    .await;
    let (addr, shutdown) =
        start_with(config_with_hosts(vec![backend]), health::default_checker()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/submit?s={DOMAIN}"))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "POST payload");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn requests_spread_across_backends() {
    let a = spawn_backend(Router::new().fallback(|| async { "a" })).await;
    let b = spawn_backend(Router::new().fallback(|| async { "b" })).await;
    let (addr, shutdown) =
        start_with(config_with_hosts(vec![a, b]), health::default_checker()).await;

    let client = reqwest::Client::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..200 {
        let body = client
            .get(format!("http://{addr}/?s={DOMAIN}"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        *counts.entry(body).or_default() += 1;
    }

    assert_eq!(counts.len(), 2, "unexpected responders: {counts:?}");
    assert!(counts["a"] > 50, "skewed: {counts:?}");
    assert!(counts["b"] > 50, "skewed: {counts:?}");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn backend_status_and_headers_pass_through() {
    let backend = spawn_backend(Router::new().fallback(|| async {
        (
            StatusCode::IM_A_TEAPOT,
            [("x-backend", "teapot")],
            "short and stout",
        )
    }))
    .await;
    let (addr, shutdown) =
        start_with(config_with_hosts(vec![backend]), health::default_checker()).await;

    let resp = reqwest::get(format!("http://{addr}/?s={DOMAIN}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(resp.headers()["x-backend"], "teapot");
    assert_eq!(resp.text().await.unwrap(), "short and stout");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn head_keeps_backend_content_length() {
    let backend = spawn_backend(Router::new().route("/", get(|| async { "hi" }))).await;
    let (addr, shutdown) =
        start_with(config_with_hosts(vec![backend]), health::default_checker()).await;

    let resp = reqwest::Client::new()
        .head(format!("http://{addr}/?s={DOMAIN}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-length"], "2");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn large_body_is_relayed_intact() {
    let payload: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();
    let backend = spawn_backend(Router::new().fallback(move || {
        let payload = payload.clone();
        async move { payload }
    }))
    .await;
    let (addr, shutdown) =
        start_with(config_with_hosts(vec![backend]), health::default_checker()).await;

    let resp = reqwest::get(format!("http://{addr}/?s={DOMAIN}")).await.unwrap();
    assert_eq!(
        resp.headers()["content-length"],
        expected.len().to_string().as_str()
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), expected.as_slice());

    let _ = shutdown.send(());
}

/// Sends one chunk, then never finishes.
struct StallAfterFirstChunk {
    sent: bool,
}

impl http_body::Body for StallAfterFirstChunk {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        if self.sent {
            return Poll::Pending;
        }
        self.sent = true;
        Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(b"first chunk")))))
    }
}

#[tokio::test]
async fn response_body_is_streamed() {
    let backend = spawn_backend(Router::new().fallback(|| async {
        axum::body::Body::new(StallAfterFirstChunk { sent: false })
    }))
    .await;
    let state = AppState::from_config(config_with_hosts(vec![backend]), health::default_checker())
        .unwrap()
        .with_backend_timeout(Duration::from_millis(200));
    let (addr, shutdown) = start_proxy(state).await;

    let mut resp = reqwest::get(format!("http://{addr}/?s={DOMAIN}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let chunk = tokio::time::timeout(Duration::from_secs(2), resp.chunk())
        .await
        .expect("first chunk should arrive while the backend is still sending")
        .unwrap()
        .unwrap();
    assert_eq!(chunk.as_ref(), b"first chunk");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unreachable_backend_returns_502() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (addr, shutdown) = start_with(
        config_with_hosts(vec![HostPort::new("127.0.0.1", port)]),
        health::default_checker(),
    )
    .await;

    let (status, _) = get_text(&format!("http://{addr}/?s={DOMAIN}")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn slow_backend_returns_504() {
    let backend = spawn_backend(Router::new().fallback(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "too late"
    }))
    .await;
    let state = AppState::from_config(config_with_hosts(vec![backend]), health::default_checker())
        .unwrap()
        .with_backend_timeout(Duration::from_millis(200));
    let (addr, shutdown) = start_proxy(state).await;

    let (status, _) = get_text(&format!("http://{addr}/?s={DOMAIN}")).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn invalid_config_is_rejected_with_all_errors() {
    let config = ProxyConfig {
        listen: HostPort::new("", 0),
        services: vec![],
    };
    let Err(frontgate::error::FrontgateError::ConfigValidation { errors }) =
        AppState::from_config(config, health::default_checker())
    else {
        panic!("expected validation failure");
    };
    assert_eq!(errors.len(), 2);
}

#[tokio::test]
async fn graceful_shutdown_works() {
    let (addr, shutdown) = start_with(golden_config(), health::default_checker()).await;

    let url = format!("http://{addr}/");
    assert!(reqwest::get(&url).await.is_ok());

    let _ = shutdown.send(());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(reqwest::get(&url).await.is_err());
}
