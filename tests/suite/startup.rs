//! Startup sequence: OAuth callback, hydration, client configuration

use std::sync::Arc;

use serde_json::Value;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use connect_core::keys;
use connect_types::RouteDecision;

use crate::common::{HarnessBuilder, StickyStore, jwt_with_exp, mount_token_exchange};

#[tokio::test]
async fn no_exchange_outside_callback_path() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "unused", 0).await;

    for url in ["/", "/?code=abc&provider=google", "/v2/auth/extra?code=a&provider=b"] {
        let harness = HarnessBuilder::new(url, &server.uri()).build();
        harness.gate.start().await;
        assert!(harness.gate.is_initialized());
        assert!(!harness.gate.credentials().is_authenticated());
    }
}

#[tokio::test]
async fn callback_exchanges_code_and_configures_clients() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/auth/"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("provider=google"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t0k"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let harness =
        HarnessBuilder::new("/v2/auth/?code=abc&provider=google", &server.uri()).build();
    harness.gate.start().await;

    assert!(harness.gate.is_initialized());
    assert_eq!(
        harness.durable().get(keys::ACCESS_TOKEN).as_deref(),
        Some("t0k")
    );
    assert_eq!(
        harness.gate.session().token().map(|token| token.as_str().to_string()),
        Some("t0k".to_string())
    );
    for client in harness.gate.clients().clients() {
        assert!(client.is_configured(), "{} not configured", client.name());
    }
    assert!(harness.reporter.fingerprints().is_empty());
}

#[tokio::test]
async fn callback_missing_provider_is_reported_and_startup_continues() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "unused", 0).await;

    let harness = HarnessBuilder::new("/v2/auth/?code=abc", &server.uri()).build();
    harness.gate.start().await;

    assert!(harness.gate.is_initialized());
    assert_eq!(harness.reporter.fingerprints(), vec!["app_auth_refresh_token"]);
    assert!(harness.reporter.messages()[0].contains("provider"));
}

#[tokio::test]
async fn failed_exchange_keeps_existing_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/auth/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let harness = HarnessBuilder::new("/v2/auth/?code=abc&provider=github", &server.uri())
        .token("stored")
        .build();
    harness.gate.start().await;

    assert!(harness.gate.is_initialized());
    assert_eq!(harness.reporter.fingerprints(), vec!["app_auth_refresh_token"]);
    assert!(harness.gate.credentials().is_authenticated());
    assert!(harness.gate.clients().any_configured());
}

#[tokio::test]
async fn hydration_failure_is_reported_and_startup_still_settles() {
    let server = MockServer::start().await;
    let durable = Arc::new(StickyStore::default());

    let harness = HarnessBuilder::new("/", &server.uri())
        .durable(durable)
        .token(&jwt_with_exp(1))
        .build();
    harness.gate.start().await;

    assert!(harness.gate.is_initialized());
    assert_eq!(harness.reporter.fingerprints(), vec!["app_init"]);
    assert!(!harness.gate.clients().any_configured());
    assert_eq!(harness.gate.decision(), Some(RouteDecision::Anonymous));
}

#[tokio::test]
async fn no_token_means_no_configured_clients() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/", &server.uri()).build();
    harness.gate.start().await;

    assert!(harness.gate.is_initialized());
    assert!(!harness.gate.clients().any_configured());
    assert!(harness.gate.session().token().is_none());
}

#[tokio::test]
async fn expired_persisted_token_is_discarded() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/", &server.uri())
        .token(&jwt_with_exp(1))
        .build();
    harness.gate.start().await;

    assert!(harness.gate.session().token().is_none());
    assert_eq!(harness.durable().get(keys::ACCESS_TOKEN), None);
    assert!(!harness.gate.clients().any_configured());
    assert!(harness.reporter.fingerprints().is_empty());
}

#[tokio::test]
async fn configured_clients_send_jwt_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/"))
        .and(header("authorization", "JWT stored"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "u1"})))
        .expect(1)
        .mount(&server)
        .await;

    let harness = HarnessBuilder::new("/", &server.uri())
        .token("stored")
        .build();
    harness.gate.start().await;

    let me: Value = harness.gate.clients().request().get_json("/v1/me/").await.unwrap();
    assert_eq!(me["id"], "u1");
}

#[tokio::test]
async fn unauthorized_response_logs_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let harness = HarnessBuilder::new("/", &server.uri())
        .token("stored")
        .build();
    harness.gate.start().await;
    assert_eq!(harness.gate.decision(), Some(RouteDecision::Authenticated));

    let result: Result<Value, _> = harness.gate.clients().athena().get_json("/v1/me/").await;
    assert_eq!(result.unwrap_err().status().map(|s| s.as_u16()), Some(401));

    assert!(!harness.gate.credentials().is_authenticated());
    assert!(harness.gate.session().token().is_none());
    assert_eq!(harness.durable().get(keys::ACCESS_TOKEN), None);
    assert_eq!(harness.gate.decision(), Some(RouteDecision::Anonymous));
}

#[tokio::test]
async fn other_error_statuses_keep_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let harness = HarnessBuilder::new("/", &server.uri())
        .token("stored")
        .build();
    harness.gate.start().await;

    let result: Result<Value, _> = harness.gate.clients().billing().get_json("/v1/me/").await;
    assert!(result.is_err());
    assert!(harness.gate.credentials().is_authenticated());
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "t0k", 1).await;

    let harness =
        HarnessBuilder::new("/v2/auth/?code=abc&provider=google", &server.uri()).build();
    tokio::join!(harness.gate.start(), harness.gate.start());
    harness.gate.start().await;

    assert!(harness.gate.is_initialized());
}

#[tokio::test]
async fn pairing_code_is_persisted() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/?pair=ey.pair.code", &server.uri()).build();

    assert_eq!(
        harness.durable().get(keys::PAIR_TOKEN).as_deref(),
        Some("ey.pair.code")
    );
}
