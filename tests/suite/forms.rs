//! Login and signup forms driven through the gate

use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use connect_core::{KeyValueStore, keys};
use connect_engine::{FormOutcome, LOGIN_FALLBACK_ERROR, LoginForm, SignupForm};
use connect_types::PageKind;

use crate::common::HarnessBuilder;

#[tokio::test]
async fn wrong_password_without_body_stays_with_fallback_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(serde_json::json!({"email": "a@b.com", "password": "wrong"})))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let harness = HarnessBuilder::new("/login", &server.uri()).build();
    harness.gate.start().await;

    let mut form = LoginForm::new("a@b.com", "wrong");
    let outcome = harness.gate.submit_login(&mut form).await.unwrap();

    assert_eq!(outcome, FormOutcome::Stay);
    assert_eq!(form.error(), Some(LOGIN_FALLBACK_ERROR));
    assert_eq!(harness.path(), "/login");
    assert!(harness.reporter.fingerprints().is_empty());
}

#[tokio::test]
async fn login_success_lands_on_pending_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": "t0k",
            "name": "A",
            "pid": "p1",
        })))
        .mount(&server)
        .await;

    let harness = HarnessBuilder::new("/login", &server.uri()).build();
    harness
        .session()
        .set(keys::REDIRECT_URL, "/garage/123")
        .unwrap();
    harness.gate.start().await;

    let mut form = LoginForm::new("a@b.com", "right");
    let outcome = harness.gate.submit_login(&mut form).await.unwrap();

    assert_eq!(outcome.target(), Some("/auth/"));
    assert_eq!(harness.path(), "/auth/");
    assert_eq!(form.error(), None);
    assert!(harness.gate.clients().any_configured());
    assert_eq!(
        harness.durable().get(keys::ACCESS_TOKEN).as_deref(),
        Some("t0k")
    );

    let view = harness.gate.render().unwrap();
    assert_eq!(view.redirect_target(), Some("/garage/123"));
}

#[tokio::test]
async fn signup_success_navigates_to_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(serde_json::json!({
            "name": "Ada",
            "email": "ada@example.com",
            "password": "hunter22",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let harness = HarnessBuilder::new("/register", &server.uri()).build();
    harness.gate.start().await;

    let mut form = SignupForm::new("Ada", "ada@example.com", "hunter22");
    let outcome = harness.gate.submit_signup(&mut form).await.unwrap();

    assert_eq!(outcome.target(), Some("/login"));
    assert_eq!(form.error(), None);
    assert_eq!(harness.path(), "/login");

    let view = harness.gate.render().unwrap();
    assert!(matches!(
        view,
        connect_types::View::Page {
            kind: PageKind::Login,
            ..
        }
    ));
}

#[tokio::test]
async fn signup_shows_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(serde_json::json!({"message": "Email already registered"})),
        )
        .mount(&server)
        .await;

    let harness = HarnessBuilder::new("/register", &server.uri()).build();
    harness.gate.start().await;

    let mut form = SignupForm::new("Ada", "ada@example.com", "hunter22");
    let outcome = harness.gate.submit_signup(&mut form).await.unwrap();

    assert_eq!(outcome, FormOutcome::Stay);
    assert_eq!(form.error(), Some("Email already registered"));
    assert_eq!(harness.path(), "/register");
}
