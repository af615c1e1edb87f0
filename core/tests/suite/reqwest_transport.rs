use std::time::Duration;

use core_test_support::ReplayTestContext;
use pretty_assertions::assert_eq;
use replay_core::HttpRequest;
use replay_core::LiveTransport;
use replay_core::Mode;
use replay_core::ReplaySession;
use replay_core::ReqwestTransport;
use replay_core::TransportError;
use serde_json::json;
use url::Url;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{route}", server.uri())).expect("mock server url")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn performs_requests_and_keeps_status_headers_and_body() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"sku": "A-1"})))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-request-id", "abc")
                .set_body_json(json!({"order": 9})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(Duration::from_secs(5))?;
    let request = HttpRequest::post_json(url(&server, "/orders"), &json!({"sku": "A-1"}));
    let response = transport.perform(&request).await?;

    assert_eq!(response.status, 201);
    assert_eq!(
        response.headers.get("x-request-id").map(String::as_str),
        Some("abc")
    );
    assert_eq!(response.body_json()?, json!({"order": 9}));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_responses_time_out() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let delayed = ResponseTemplate::new(200).set_delay(Duration::from_secs(2));
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(delayed)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(Duration::from_millis(100))?;
    let err = transport
        .perform(&HttpRequest::get(url(&server, "/slow")))
        .await
        .unwrap_err();
    assert_eq!(err.code, TransportError::CODE_TIMEOUT);
    assert_eq!(err.domain, TransportError::DOMAIN);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn capture_then_replay_hits_the_server_once() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let profile = ResponseTemplate::new(200).set_body_json(json!({"name": "Ada"}));
    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(profile)
        .expect(1)
        .mount(&server)
        .await;

    let ctx = ReplayTestContext::new("Reqwest_capture");
    let capture = ReplaySession::install_with_reqwest(ctx.config(Mode::Capture))?
        .expect("session is active");
    let live = capture
        .intercept(HttpRequest::get(url(&server, "/profile")))
        .await?;
    capture.shutdown().await;

    let replay = ReplaySession::install_with_reqwest(ctx.config(Mode::ReplayOrFail))?
        .expect("session is active");
    let replayed = replay
        .intercept(HttpRequest::get(url(&server, "/profile")))
        .await?;

    assert_eq!(replayed.status, live.status);
    assert_eq!(replayed.body_json()?, live.body_json()?);
    assert_eq!(replayed.body_json()?, json!({"name": "Ada"}));
    Ok(())
}
