use std::collections::HashSet;
use std::sync::Arc;

use core_test_support::ReplayTestContext;
use core_test_support::ScriptedTransport;
use core_test_support::get;
use core_test_support::graphql;
use core_test_support::url_entry;
use pretty_assertions::assert_eq;
use replay_core::Mode;
use replay_core::ReplayError;
use replay_core::ReplaySession;
use serde_json::json;

fn install(ctx: &ReplayTestContext, transport: &Arc<ScriptedTransport>) -> ReplaySession {
    ReplaySession::install(ctx.config(Mode::ReplayOrFail), transport.as_transport())
        .expect("install")
        .expect("session is active")
}

#[tokio::test]
async fn stored_json_is_replayed_without_network() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Scenario_basic");
    ctx.write_fixture(&json!([
        {"type": "url", "identifier": "https://x/y", "mock": {"json": {"a": "b"}}}
    ]));
    let transport = ScriptedTransport::new();
    let session = install(&ctx, &transport);

    let response = session.intercept(get("https://x/y")).await?;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_json()?, json!({"a": "b"}));
    assert_eq!(transport.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn empty_queue_fails_with_the_identifier() {
    let ctx = ReplayTestContext::new("Scenario_empty");
    let transport = ScriptedTransport::new();
    let session = install(&ctx, &transport);

    let err = session
        .intercept(get("https://x/nothing-here"))
        .await
        .unwrap_err();
    let ReplayError::NoFixtureAvailable { identifier } = err else {
        panic!("expected NoFixtureAvailable, got {err:?}");
    };
    assert_eq!(identifier.to_string(), "https://x/nothing-here");
    assert_eq!(transport.calls(), 0);
    assert!(!ctx.fixture_path().exists());
}

#[tokio::test]
async fn repeated_calls_consume_in_order_then_fail() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Scenario_sequence");
    ctx.write_fixture(&json!([
        url_entry("https://x/poll", json!({"state": "pending"})),
        url_entry("https://x/poll", json!({"state": "running"})),
        url_entry("https://x/poll", json!({"state": "done"})),
    ]));
    let transport = ScriptedTransport::new();
    let session = install(&ctx, &transport);

    let mut states = Vec::new();
    for _ in 0..3 {
        let body = session.intercept(get("https://x/poll")).await?.body_json()?;
        states.push(body["state"].as_str().unwrap_or_default().to_string());
    }
    assert_eq!(states, vec!["pending", "running", "done"]);

    let err = session.intercept(get("https://x/poll")).await.unwrap_err();
    assert!(matches!(err, ReplayError::NoFixtureAvailable { .. }));
    Ok(())
}

#[tokio::test]
async fn shared_fixture_is_consumed_before_the_specific_one() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Scenario_shared");
    ctx.write_shared_fixture(&json!([url_entry("https://x/me", json!({"from": "A"}))]));
    ctx.write_fixture(&json!([url_entry("https://x/me", json!({"from": "B"}))]));
    let transport = ScriptedTransport::new();
    let session = install(&ctx, &transport);

    let first = session.intercept(get("https://x/me")).await?.body_json()?;
    let second = session.intercept(get("https://x/me")).await?.body_json()?;
    assert_eq!(first["from"], "A");
    assert_eq!(second["from"], "B");
    Ok(())
}

#[tokio::test]
async fn graphql_calls_match_despite_whitespace_and_key_order() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Scenario_graphql");
    ctx.write_fixture(&json!([{
        "type": "signature",
        "signature": {
            "operationName": "User",
            "query": "query User($id: ID!) {\n  user(id: $id) { name }\n}",
            "endpoint": core_test_support::GRAPHQL_ENDPOINT,
            "variables": {"id": 7, "opts": {"b": true, "a": null}}
        },
        "mock": {"json": {"data": {"user": {"name": "Ada"}}}}
    }]));
    let transport = ScriptedTransport::new();
    let session = install(&ctx, &transport);

    let request = graphql(
        "User",
        "query User($id:ID!){ user(id:$id){ name } }",
        json!({"opts": {"a": null, "b": true}, "id": 7.0}),
    );
    let body = session.intercept(request).await?.body_json()?;
    assert_eq!(body["data"]["user"]["name"], "Ada");

    let other_vars = graphql(
        "User",
        "query User($id: ID!) { user(id: $id) { name } }",
        json!({"id": 8}),
    );
    let err = session.intercept(other_vars).await.unwrap_err();
    assert!(matches!(err, ReplayError::NoFixtureAvailable { .. }));
    assert_eq!(transport.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn malformed_graphql_request_is_a_bad_request() {
    let ctx = ReplayTestContext::new("Scenario_bad");
    let transport = ScriptedTransport::new();
    let session = install(&ctx, &transport);

    let anonymous = graphql("", "{ viewer { id } }", json!(null));
    let err = session.intercept(anonymous).await.unwrap_err();
    assert!(matches!(err, ReplayError::BadRequest { .. }), "{err:?}");
}

#[tokio::test]
async fn stored_error_is_replayed_as_transport_failure() {
    let ctx = ReplayTestContext::new("Scenario_error");
    ctx.write_fixture(&json!([{
        "type": "url",
        "identifier": "https://x/flaky",
        "mock": {"error": {"domain": "transport", "code": 2, "message": "timed out"}}
    }]));
    let transport = ScriptedTransport::new();
    let session = install(&ctx, &transport);

    let err = session.intercept(get("https://x/flaky")).await.unwrap_err();
    let ReplayError::Transport(error) = err else {
        panic!("expected a transport error, got {err:?}");
    };
    assert_eq!(error.code, 2);
    assert_eq!(error.message, "timed out");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_each_get_a_distinct_response() -> anyhow::Result<()> {
    let ctx = ReplayTestContext::new("Scenario_concurrent");
    let entries: Vec<_> = (0..32)
        .map(|n| url_entry("https://x/ticket", json!({"n": n})))
        .collect();
    ctx.write_fixture(&json!(entries));
    let transport = ScriptedTransport::new();
    let session = install(&ctx, &transport);
    let interceptor = session.interceptor();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let interceptor = Arc::clone(&interceptor);
        handles.push(tokio::spawn(async move {
            interceptor.intercept(get("https://x/ticket")).await
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let body = handle.await??.body_json()?;
        assert!(seen.insert(body["n"].as_i64().unwrap()), "duplicate {body}");
    }
    assert_eq!(seen.len(), 32);
    assert!(session.queue().is_empty());
    Ok(())
}
