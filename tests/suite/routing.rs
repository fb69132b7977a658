//! Route decision, route trees, lazy pages, and the error boundary

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use wiremock::MockServer;

use connect_core::{KeyValueStore, keys};
use connect_engine::{FALLBACK_MESSAGE, LazyPage, Page, PageContext, PageSet, RenderError};
use connect_types::{PageKind, RouteDecision, View};

use crate::common::{DEMO_DONGLE, HarnessBuilder, mount_token_exchange};

struct BrokenExplorer;

impl Page for BrokenExplorer {
    fn kind(&self) -> PageKind {
        PageKind::Explorer
    }

    fn render(&self, _ctx: &PageContext<'_>) -> Result<String, RenderError> {
        Err(RenderError::failed(PageKind::Explorer, "device list unavailable"))
    }
}

struct PanickingLanding;

impl Page for PanickingLanding {
    fn kind(&self) -> PageKind {
        PageKind::AnonymousLanding
    }

    fn render(&self, _ctx: &PageContext<'_>) -> Result<String, RenderError> {
        panic!("landing exploded")
    }
}

fn page_kind(view: &View) -> Option<PageKind> {
    match view {
        View::Page { kind, .. } => Some(*kind),
        _ => None,
    }
}

#[tokio::test]
async fn decision_covers_every_signal() {
    let server = MockServer::start().await;
    let demo = format!("/{DEMO_DONGLE}");
    let zoom = format!("/{DEMO_DONGLE}x/1700000000000/1700000060000");
    let cases = [
        ("/", false, RouteDecision::Anonymous),
        ("/", true, RouteDecision::Authenticated),
        (demo.as_str(), false, RouteDecision::Authenticated),
        (zoom.as_str(), false, RouteDecision::Authenticated),
        ("/garage/123", false, RouteDecision::Anonymous),
    ];

    for (url, authenticated, expected) in cases {
        let mut builder = HarnessBuilder::new(url, &server.uri());
        if authenticated {
            builder = builder.token("stored");
        }
        let harness = builder.build();
        harness.gate.start().await;
        assert_eq!(harness.gate.decision(), Some(expected), "{url}");
    }
}

#[tokio::test]
async fn auth_junction_consumes_redirect_once() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/auth/", &server.uri())
        .token("stored")
        .build();
    harness
        .session()
        .set(keys::REDIRECT_URL, "/garage/123")
        .unwrap();
    harness.gate.start().await;

    let view = harness.gate.render().unwrap();
    assert_eq!(view.redirect_target(), Some("/garage/123"));
    assert_eq!(harness.session().get(keys::REDIRECT_URL), None);

    let again = harness.gate.render().unwrap();
    assert_eq!(again.redirect_target(), Some("/"));
}

#[tokio::test]
async fn auth_junction_while_anonymous_goes_home() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/auth/", &server.uri()).build();
    harness
        .session()
        .set(keys::REDIRECT_URL, "/garage/123")
        .unwrap();
    harness.gate.start().await;

    let view = harness.gate.render().unwrap();
    assert_eq!(view.redirect_target(), Some("/"));
    assert_eq!(
        harness.session().get(keys::REDIRECT_URL).as_deref(),
        Some("/garage/123")
    );
}

#[tokio::test]
async fn deep_link_survives_login_round_trip() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/garage/123", &server.uri()).build();
    harness.gate.start().await;

    let landing = harness.gate.render().unwrap();
    assert_eq!(page_kind(&landing), Some(PageKind::AnonymousLanding));
    assert_eq!(
        harness.session().get(keys::REDIRECT_URL).as_deref(),
        Some("/garage/123")
    );

    harness
        .gate
        .credentials()
        .set_token(connect_types::AccessToken::new("fresh").unwrap())
        .unwrap();
    harness.gate.navigate("/auth/").unwrap();
    let view = harness.gate.render().unwrap();
    assert_eq!(view.redirect_target(), Some("/garage/123"));
}

#[tokio::test]
async fn anonymous_tree_mounts_forms() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/login", &server.uri()).build();
    harness.gate.start().await;
    assert_eq!(
        page_kind(&harness.gate.render().unwrap()),
        Some(PageKind::Login)
    );

    harness.gate.navigate("/register").unwrap();
    assert_eq!(
        page_kind(&harness.gate.render().unwrap()),
        Some(PageKind::Signup)
    );
}

#[tokio::test]
async fn authenticated_tree_mounts_explorer_everywhere_else() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/login", &server.uri())
        .token("stored")
        .build();
    harness.gate.start().await;

    let view = harness.gate.render().unwrap();
    assert_eq!(page_kind(&view), Some(PageKind::Explorer));
}

#[tokio::test]
async fn render_before_start_is_loading() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/", &server.uri()).build();
    assert_eq!(harness.gate.render().unwrap(), View::Loading);
    assert_eq!(harness.gate.decision(), None);
}

#[tokio::test]
async fn production_boundary_replaces_failing_page() {
    let server = MockServer::start().await;
    let pages = PageSet::default().with(LazyPage::of(Arc::new(BrokenExplorer)));
    let harness = HarnessBuilder::new("/", &server.uri())
        .token("stored")
        .production()
        .pages(pages)
        .build();
    harness.gate.start().await;

    let view = harness.gate.render().unwrap();
    assert_eq!(
        view,
        View::Fallback {
            message: FALLBACK_MESSAGE.to_string()
        }
    );
    assert_eq!(harness.reporter.fingerprints(), vec!["render"]);
    assert!(harness.reporter.messages()[0].contains("device list unavailable"));
}

#[tokio::test]
async fn production_boundary_catches_panics() {
    let server = MockServer::start().await;
    let pages = PageSet::default().with(LazyPage::of(Arc::new(PanickingLanding)));
    let harness = HarnessBuilder::new("/", &server.uri())
        .production()
        .pages(pages)
        .build();
    harness.gate.start().await;

    let view = harness.gate.render().unwrap();
    assert!(matches!(view, View::Fallback { .. }));
    assert_eq!(harness.reporter.fingerprints(), vec!["render"]);
}

#[tokio::test]
async fn development_render_errors_propagate() {
    let server = MockServer::start().await;
    let pages = PageSet::default().with(LazyPage::of(Arc::new(BrokenExplorer)));
    let harness = HarnessBuilder::new("/", &server.uri())
        .token("stored")
        .pages(pages)
        .build();
    harness.gate.start().await;

    let err = harness.gate.render().unwrap_err();
    assert!(err.to_string().contains("device list unavailable"));
    assert!(harness.reporter.fingerprints().is_empty());
}

#[tokio::test]
async fn unresolved_page_module_renders_loading() {
    let server = MockServer::start().await;
    let never = LazyPage::new(
        PageKind::Explorer,
        Box::new(|| std::future::pending::<anyhow::Result<Arc<dyn Page>>>().boxed()),
    );
    let harness = HarnessBuilder::new("/", &server.uri())
        .token("stored")
        .pages(PageSet::default().with(never))
        .build();
    harness.gate.start().await;

    assert_eq!(harness.gate.render().unwrap(), View::Loading);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), harness.gate.wait_until_ready())
            .await
            .is_err()
    );
    assert_eq!(harness.gate.render().unwrap(), View::Loading);
}

#[tokio::test]
async fn failed_callback_is_not_remembered_as_destination() {
    let server = MockServer::start().await;
    mount_token_exchange(&server, "unused", 0).await;

    let harness = HarnessBuilder::new("/v2/auth/?code=abc", &server.uri()).build();
    harness.gate.start().await;

    let view = harness.gate.render().unwrap();
    assert_eq!(page_kind(&view), Some(PageKind::AnonymousLanding));
    assert_eq!(harness.session().get(keys::REDIRECT_URL), None);
}

#[tokio::test]
async fn auth_junction_matches_any_case() {
    let server = MockServer::start().await;
    let harness = HarnessBuilder::new("/Auth/", &server.uri())
        .token("stored")
        .build();
    harness
        .session()
        .set(keys::REDIRECT_URL, "/garage/123")
        .unwrap();
    harness.gate.start().await;

    let view = harness.gate.render().unwrap();
    assert_eq!(view.redirect_target(), Some("/garage/123"));
}
