use std::sync::Arc;

use async_trait::async_trait;
use core_test_support::ReplayTestContext;
use core_test_support::ScriptedTransport;
use core_test_support::decode_all;
use core_test_support::get;
use core_test_support::graphql;
use core_test_support::url_entry;
use pretty_assertions::assert_eq;
use replay_core::HttpRequest;
use replay_core::HttpResponse;
use replay_core::LiveTransport;
use replay_core::Mode;
use replay_core::ReplayError;
use replay_core::ReplaySession;
use replay_core::TransportError;
use serde_json::json;
use tokio::sync::Notify;

fn install(
    ctx: &ReplayTestContext,
    mode: Mode,
    transport: &Arc<ScriptedTransport>,
) -> ReplaySession {
    ReplaySession::install(ctx.config(mode), transport.as_transport())
        .expect("install")
        .expect("session is active")
}

/// Holds calls to `/slow` until released, so later calls finish first.
#[derive(Default)]
struct HeldTransport {
    slow_started: Notify,
    release_slow: Notify,
}

#[async_trait]
impl LiveTransport for HeldTransport {
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if request.url.path() == "/slow" {
            self.slow_started.notify_one();
            self.release_slow.notified().await;
        }
        Ok(HttpResponse::new(200, request.url.path().to_string()))
    }
}

fn recorded_identifiers(ctx: &ReplayTestContext) -> Vec<String> {
    decode_all(&ctx.read_fixture())
        .into_iter()
        .map(|stub| stub.identifier.to_string())
        .collect()
}

#[tokio::test]
async fn miss_goes_live_once_and_appends_one_recording() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Capture_miss");
    let transport = ScriptedTransport::new();
    let json_type = "application/json";
    let created = HttpResponse::new(201, r#"{"id":42}"#).with_header("content-type", json_type);
    transport.push(Ok(created));
    let session = install(&ctx, Mode::Capture, &transport);

    let response = session.intercept(get("https://x/create")).await?;
    assert_eq!(response.status, 201);
    assert_eq!(transport.calls(), 1);

    session.shutdown().await;
    let recorded = ctx.read_fixture();
    assert_eq!(
        recorded,
        vec![json!({
            "type": "url",
            "identifier": "https://x/create",
            "mock": {
                "json": {"id": 42},
                "statusCode": 201,
                "headerFields": {"content-type": "application/json"}
            }
        })]
    );
    Ok(())
}

#[tokio::test]
async fn captured_calls_replay_identically_in_a_later_session() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Capture_round_trip");
    let transport = ScriptedTransport::new();
    transport.push(Ok(HttpResponse::new(200, "first")));
    transport.push(Ok(HttpResponse::new(200, r#"{"data":{"feed":[]}}"#)));
    let refused = TransportError::new(TransportError::CODE_CONNECT, "refused");
    transport.push(Err(refused));

    let feed = || graphql("Feed", "query Feed { feed }", json!({"limit": 10}));

    let capture = install(&ctx, Mode::Capture, &transport);
    capture.intercept(get("https://x/a")).await?;
    capture.intercept(feed()).await?;
    let live_err = capture.intercept(get("https://x/down")).await.unwrap_err();
    assert!(matches!(live_err, ReplayError::Transport(_)));
    capture.shutdown().await;
    assert_eq!(transport.calls(), 3);

    let replay_transport = ScriptedTransport::new();
    let replay = install(&ctx, Mode::ReplayOrFail, &replay_transport);
    assert_eq!(replay.intercept(get("https://x/a")).await?.body, "first");
    assert_eq!(
        replay.intercept(feed()).await?.body_json()?,
        json!({"data": {"feed": []}})
    );
    let replayed_err = replay.intercept(get("https://x/down")).await.unwrap_err();
    let ReplayError::Transport(error) = replayed_err else {
        panic!("expected transport error, got {replayed_err:?}");
    };
    assert_eq!(error.message, "refused");
    assert_eq!(replay_transport.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn hits_are_rerecorded_in_capture_mode() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Capture_hit");
    ctx.write_fixture(&json!([url_entry("https://x/cached", json!({"v": 1}))]));
    let transport = ScriptedTransport::new();
    let session = install(&ctx, Mode::Capture, &transport);

    let body = session
        .intercept(get("https://x/cached"))
        .await?
        .body_json()?;
    assert_eq!(body, json!({"v": 1}));
    assert_eq!(transport.calls(), 0);
    session.shutdown().await;

    let stubs = decode_all(&ctx.read_fixture());
    assert_eq!(stubs.len(), 2);
    assert_eq!(stubs[0], stubs[1]);
    Ok(())
}

#[tokio::test]
async fn sequential_recordings_keep_call_order() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Capture_order");
    let transport = ScriptedTransport::new();
    let session = install(&ctx, Mode::Capture, &transport);

    for n in 0..5 {
        session.intercept(get(&format!("https://x/step/{n}"))).await?;
    }
    session.shutdown().await;

    let expected: Vec<String> = (0..5).map(|n| format!("https://x/step/{n}")).collect();
    assert_eq!(recorded_identifiers(&ctx), expected);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recordings_follow_completion_order() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Capture_completion_order");
    let transport = Arc::new(HeldTransport::default());
    let session = ReplaySession::install(
        ctx.config(Mode::Capture),
        Arc::clone(&transport) as Arc<dyn LiveTransport>,
    )?
    .expect("session is active");

    let interceptor = session.interceptor();
    let slow = tokio::spawn(async move {
        interceptor.intercept(get("https://x/slow")).await
    });
    transport.slow_started.notified().await;
    session.intercept(get("https://x/fast")).await?;
    transport.release_slow.notify_one();
    slow.await??;
    session.shutdown().await;

    assert_eq!(
        recorded_identifiers(&ctx),
        vec!["https://x/fast", "https://x/slow"]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_sessions_recording_to_one_file_lose_nothing() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Capture_shared_file");
    let first = install(&ctx, Mode::Capture, &ScriptedTransport::new());
    let second = install(&ctx, Mode::Capture, &ScriptedTransport::new());

    let mut handles = Vec::new();
    for (n, session) in [first.interceptor(), second.interceptor()]
        .into_iter()
        .cycle()
        .take(20)
        .enumerate()
    {
        handles.push(tokio::spawn(async move {
            session.intercept(get(&format!("https://x/item/{n}"))).await
        }));
    }
    for handle in handles {
        handle.await??;
    }
    first.shutdown().await;
    second.shutdown().await;

    assert_eq!(ctx.read_fixture().len(), 20);
    Ok(())
}
