//! End-to-end forwarding through a running gateway.

mod common;

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, Request, StatusCode};
use common::{closed_addr, start_gateway, start_mock_backend, Reply};
use relay_gateway::config::parse_config;
use relay_gateway::http::{RoutingContext, StatusRemapper};
use relay_gateway::routing::PathTemplate;
use relay_gateway::upstream::Target;
use relay_gateway::{ClientRegistry, Upstream};

#[tokio::test]
async fn test_remaps_filters_and_rewrites_status() {
    let backend = start_mock_backend(Reply {
        status: "201 Created",
        headers: vec![("loc", "/v2/items/42"), ("server", "mock")],
        body: "created",
        delay: Duration::ZERO,
    })
    .await;

    let gateway = start_gateway(&format!(
        r#"
        [[routes]]
        name = "items"
        path = "/items/{{id}}"
        methods = ["POST"]
        upstream = {{ uri = "{}/api" }}
        remapping = {{ path = "/v2/items/{{id}}" }}
        request_headers = {{ deny = ["x-secret"] }}
        response_headers = {{ deny = ["server"] }}
        status = [{{ from = ["CREATED"], to = 200 }}]
        "#,
        backend.uri()
    ))
    .await;

    let client = reqwest::Client::new();
    let res = client
        .post(gateway.url("/items/42?verbose=1"))
        .header("x-secret", "hunter2")
        .header("x-tenant", "acme")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["loc"], "/v2/items/42");
    assert!(res.headers().get("server").is_none());
    assert_eq!(res.text().await.unwrap(), "created");

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let seen = &requests[0];
    assert_eq!(seen.request_line, "POST /v2/items/42 HTTP/1.1");
    assert_eq!(seen.header("x-secret"), None);
    assert_eq!(seen.header("x-tenant"), Some("acme"));
    assert!(seen.header("x-request-id").is_some());
    assert_eq!(seen.body, b"payload");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_remapped_path_replaces_target_base_path() {
    let backend = start_mock_backend(Reply {
        status: "201 Created",
        headers: vec![("loc", "/items/42")],
        body: "",
        delay: Duration::ZERO,
    })
    .await;

    let registry = ClientRegistry::default();
    let upstream = Upstream::builder(Target::from_uri(&format!("{}/items", backend.uri())).unwrap())
        .remap_path(PathTemplate::parse("/items/{id}").unwrap())
        .status(StatusRemapper::when(|s| s.is_success()).to(StatusCode::OK))
        .build(&registry);

    let ctx = RoutingContext::new("items", Method::GET, "/items/42")
        .with_params(vec![("id".into(), "42".into())]);
    let req = Request::builder()
        .method(Method::GET)
        .uri("/items/42")
        .body(Bytes::new())
        .unwrap();

    let res = upstream.forward(&ctx, req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["loc"], "/items/42");
    assert_eq!(backend.requests()[0].request_line, "GET /items/42 HTTP/1.1");
}

#[tokio::test]
async fn test_unmapped_path_keeps_target_base_path() {
    let backend = start_mock_backend(Reply::ok("ok")).await;
    let gateway = start_gateway(&format!(
        r#"
        [[routes]]
        name = "orders"
        path_prefix = "/orders"
        upstream = {{ uri = "{}/api" }}
        "#,
        backend.uri()
    ))
    .await;

    let res = reqwest::get(gateway.url("/orders/7?full=1")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(backend.requests()[0].request_line, "GET /api/orders/7?full=1 HTTP/1.1");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_method_mismatch_is_not_found() {
    let backend = start_mock_backend(Reply::ok("ok")).await;
    let gateway = start_gateway(&format!(
        r#"
        [[routes]]
        name = "items"
        path = "/items/{{id}}"
        methods = ["POST"]
        upstream = {{ uri = "{}" }}
        "#,
        backend.uri()
    ))
    .await;

    let res = reqwest::get(gateway.url("/items/42")).await.unwrap();
    assert_eq!(res.status(), 404);
    let body = res.text().await.unwrap();
    assert!(body.contains("no matching route"));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_connection_refused_is_service_unavailable() {
    let addr = closed_addr().await;
    let gateway = start_gateway(&format!(
        r#"
        [[routes]]
        name = "down"
        path_prefix = "/"
        upstream = {{ uri = "http://{addr}" }}
        "#
    ))
    .await;

    let res = reqwest::get(gateway.url("/anything")).await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "");
}

#[tokio::test]
async fn test_configured_timeout_translation() {
    let backend = start_mock_backend(Reply {
        delay: Duration::from_secs(3),
        ..Reply::ok("late")
    })
    .await;
    let gateway = start_gateway(&format!(
        r#"
        [timeouts]
        connect_secs = 1
        request_secs = 1

        [translation]
        timeout = "GATEWAY_TIMEOUT"

        [[routes]]
        name = "slow"
        path_prefix = "/"
        upstream = {{ uri = "{}" }}
        "#,
        backend.uri()
    ))
    .await;

    let res = reqwest::get(gateway.url("/slow")).await.unwrap();
    assert_eq!(res.status(), 504);
}

#[tokio::test]
async fn test_request_id_round_trip_and_health() {
    let backend = start_mock_backend(Reply::ok("ok")).await;
    let gateway = start_gateway(&format!(
        r#"
        [listener]
        health_check_path = "/healthz"

        [[routes]]
        name = "all"
        path_prefix = "/"
        upstream = {{ uri = "{}" }}
        "#,
        backend.uri()
    ))
    .await;

    let client = reqwest::Client::new();
    let res = client
        .get(gateway.url("/ping"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-request-id"], "req-123");
    assert_eq!(backend.requests()[0].header("x-request-id"), Some("req-123"));

    let res = reqwest::get(gateway.url("/healthz")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let backend = start_mock_backend(Reply::ok("ok")).await;
    let gateway = start_gateway(&format!(
        r#"
        [listener]
        max_body_size = 16

        [[routes]]
        name = "all"
        path_prefix = "/"
        upstream = {{ uri = "{}" }}
        "#,
        backend.uri()
    ))
    .await;

    let res = reqwest::Client::new()
        .post(gateway.url("/upload"))
        .body(vec![b'x'; 64])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_hot_reload_swaps_routes() {
    let first = start_mock_backend(Reply::ok("first")).await;
    let second = start_mock_backend(Reply::ok("second")).await;
    let route = |uri: String| {
        format!(
            r#"
            [[routes]]
            name = "all"
            path_prefix = "/"
            upstream = {{ uri = "{uri}" }}
            "#
        )
    };

    let gateway = start_gateway(&route(first.uri())).await;
    let body = reqwest::get(gateway.url("/")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "first");

    gateway
        .updates
        .send(parse_config(&route(second.uri())).unwrap())
        .unwrap();

    let mut body = String::new();
    for _ in 0..50 {
        body = reqwest::get(gateway.url("/")).await.unwrap().text().await.unwrap();
        if body == "second" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(body, "second");
}
