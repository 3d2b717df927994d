//! Session integration tests against the mock bridge

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;

use crate::bridge::mock::{MockLauncher, MockNode, MockPage, MOCK_PNG};
use crate::bridge::{CloseOptions, NavigateOptions, TransportError, TypeOptions, WaitUntil};
use crate::config::SessionConfig;
use crate::registry::BrowserRegistry;
use crate::session::Session;
use crate::Error;

async fn fixture_at(url: &str) -> (Session, Arc<MockLauncher>, Arc<MockPage>) {
    fixture_with(url, SessionConfig::default()).await
}

async fn fixture_with(
    url: &str,
    config: SessionConfig,
) -> (Session, Arc<MockLauncher>, Arc<MockPage>) {
    let launcher = Arc::new(MockLauncher::new());
    let registry = BrowserRegistry::new(launcher.clone());
    let session = Session::create(&registry, url, config)
        .await
        .expect("session creation failed");
    let page = launcher.browser().expect("no browser").page(0);
    (session, launcher, page)
}

#[tokio::test]
async fn test_create_applies_viewport_and_navigates_network_idle() {
    let (session, _, page) = fixture_at("https://h.example/login").await;

    assert_eq!(session.url(), "https://h.example/login");
    assert_eq!(page.viewports(), vec![(1680, 1050)]);
    assert_eq!(
        page.navigations(),
        vec![("https://h.example/login".to_string(), WaitUntil::NetworkIdle)]
    );
}

#[tokio::test]
async fn test_operations_after_process_loss_fail_cleanly() {
    let (session, _, page) = fixture_at("https://h.example/").await;

    // Once the page is gone, every interactive call fails with the
    // session-bound error instead of crashing
    page.fail_all_with(TransportError::target_closed("browser reset"));
    let err = session
        .goto("https://h.example/next", &NavigateOptions::default())
        .await
        .expect_err("dead page must fail");
    assert!(matches!(err, Error::Session(_)));
    assert!(err.session().is_some());

    assert!(session.query_selector("div").await.is_err());
    assert!(session.evaluate("1 + 1").await.is_err());
    // Best-effort paths still degrade instead of erroring
    assert_eq!(session.html().await, None);
}

#[tokio::test]
async fn test_create_runs_request_logging_before_returning() {
    let captures: Arc<Mutex<Vec<(String, Vec<u8>, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captures);
    let config = SessionConfig::default().with_logger(Arc::new(move |url, png, html| {
        sink.lock()
            .unwrap()
            .push((url.to_string(), png.to_vec(), html.to_string()));
    }));

    let (_session, _, page) = fixture_with("https://h.example/start", config).await;

    let captured = captures.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let (url, png, html) = &captured[0];
    assert_eq!(url, "https://h.example/start");
    assert_eq!(png.as_slice(), MOCK_PNG);
    assert!(html.starts_with("<html>"));
    // Capture viewport: fixed width, height from the page's scroll extent
    assert_eq!(page.viewports(), vec![(1680, 1050), (1280, 800)]);
}

#[tokio::test]
async fn test_logger_receives_the_page_screenshot_bytes() {
    let pngs: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pngs);
    let config = SessionConfig::default().with_logger(Arc::new(move |_url, png, _html| {
        sink.lock().unwrap().push(png.to_vec());
    }));
    let (session, _, page) = fixture_with("https://h.example/", config).await;

    page.set_screenshot(vec![0xCA, 0xFE, 0xBA, 0xBE]);
    session.log_request().await.expect("logging failed");

    let captured = pngs.lock().unwrap();
    assert_eq!(captured[0], MOCK_PNG);
    assert_eq!(captured[1], vec![0xCA, 0xFE, 0xBA, 0xBE]);
}

#[tokio::test]
async fn test_logger_receives_empty_html_when_capture_fails() {
    let htmls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&htmls);
    let config = SessionConfig::default().with_logger(Arc::new(move |_url, _png, html| {
        sink.lock().unwrap().push(html.to_string());
    }));
    let (session, _, page) = fixture_with("https://h.example/", config).await;
    assert_eq!(htmls.lock().unwrap().len(), 1);

    // HTML capture is best-effort: its failure degrades the trail to an
    // empty string but must not abort the logging attempt
    page.fail_eval(
        "documentElement.outerHTML",
        TransportError::command("context destroyed"),
    );
    assert_eq!(session.html().await, None);
    assert!(!session.contains("anything").await);

    session.log_request().await.expect("logging must still work");
    let captured = htmls.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[1], "");
}

#[tokio::test]
async fn test_new_tab_resolves_relative_reference() {
    let (session, launcher, _) = fixture_at("https://h.example/a/b?y=2").await;

    let tab = session.new_tab("/path?x=1").await.expect("new tab failed");

    assert_eq!(tab.url(), "https://h.example/path?x=1");
    let pages = launcher.browser().unwrap().pages();
    assert_eq!(pages.len(), 2);
    assert_eq!(
        pages[1].navigations(),
        vec![("https://h.example/path?x=1".to_string(), WaitUntil::NetworkIdle)]
    );
}

#[tokio::test]
async fn test_new_tab_shares_logger() {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    let config = SessionConfig::default().with_logger(Arc::new(move |_url, _png, _html| {
        sink.fetch_add(1, Ordering::SeqCst);
    }));
    let (session, _, _) = fixture_with("https://h.example/a", config).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    session.new_tab("next").await.expect("new tab failed");
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_queries_never_error_on_zero_matches() {
    let (session, _, page) = fixture_at("https://h.example/").await;

    assert!(session.query_selector("div.missing").await.unwrap().is_none());
    assert!(session
        .query_selector_all("div.missing")
        .await
        .unwrap()
        .is_empty());
    assert!(!session.exists("div.missing").await.unwrap());

    page.add_node("div.present", MockNode::new());
    page.add_node("div.present", MockNode::new());
    assert!(session.exists("div.present").await.unwrap());
    assert!(session.query_selector("div.present").await.unwrap().is_some());
    assert_eq!(
        session.query_selector_all("div.present").await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_wait_for_selector_requires_visibility() {
    let (session, _, page) = fixture_at("https://h.example/").await;

    page.add_node("#spinner", MockNode::hidden());
    let err = session
        .wait_for_selector("#spinner")
        .await
        .expect_err("hidden-only match must time out");
    assert!(matches!(err, Error::Session(_)));

    page.add_node("#spinner", MockNode::new());
    let handle = session
        .wait_for_selector("#spinner")
        .await
        .expect("visible match expected");
    assert!(handle.is_visible().await.unwrap());
}

#[tokio::test]
async fn test_wait_for_selector_to_disappear() {
    let (session, _, page) = fixture_at("https://h.example/").await;

    page.add_node("#overlay", MockNode::hidden());
    session
        .wait_for_selector_to_disappear("#overlay")
        .await
        .expect("hidden matches count as disappeared");

    page.add_node("#overlay", MockNode::new());
    let err = session
        .wait_for_selector_to_disappear("#overlay")
        .await
        .expect_err("visible match must be a hard failure");
    assert!(matches!(err, Error::Session(_)));
}

#[tokio::test(start_paused = true)]
async fn test_wait_till_not_exists_gives_up_silently() {
    let (session, _, page) = fixture_at("https://h.example/").await;
    page.add_node("#stuck", MockNode::new());

    let started = tokio::time::Instant::now();
    // Selector persists for the whole wait: returns after the bound, no error
    session
        .wait_till_not_exists("#stuck", Duration::from_secs(5))
        .await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_wait_till_not_exists_returns_once_gone() {
    let (session, _, page) = fixture_at("https://h.example/").await;
    page.add_node("#toast", MockNode::new());

    let waiter = {
        let session = session.clone();
        tokio::spawn(async move {
            session
                .wait_till_not_exists("#toast", Duration::from_secs(30))
                .await
        })
    };
    sleep(Duration::from_secs(2)).await;
    page.clear_nodes("#toast");
    waiter.await.expect("wait task panicked");
}

#[tokio::test]
async fn test_wait_till_not_exists_swallows_transport_failures() {
    let (session, _, page) = fixture_at("https://h.example/").await;
    page.fail_all_with(TransportError::target_closed("gone"));

    // Soft by contract: no panic, no error surface
    session
        .wait_till_not_exists("#any", Duration::from_secs(30))
        .await;
}

#[tokio::test]
async fn test_contains_is_a_snapshot() {
    let (session, _, page) = fixture_at("https://h.example/").await;
    page.set_html("<html><body>Order 4711 confirmed</body></html>");

    assert!(session.contains("Order 4711").await);
    page.set_html("<html><body>empty cart</body></html>");
    assert!(!session.contains("Order 4711").await);
}

#[tokio::test]
async fn test_evaluate_and_typed_variant() {
    let (session, _, page) = fixture_at("https://h.example/").await;
    page.stub_eval("window.appState", json!({"ready": true, "version": 3}));

    let value = session.evaluate("window.appState").await.unwrap();
    assert_eq!(value["ready"], json!(true));

    #[derive(serde::Deserialize)]
    struct AppState {
        ready: bool,
        version: u32,
    }
    let state: AppState = session.evaluate_as("window.appState").await.unwrap();
    assert!(state.ready);
    assert_eq!(state.version, 3);
}

#[tokio::test]
async fn test_page_height_reads_scroll_extent() {
    let (session, _, page) = fixture_at("https://h.example/").await;
    page.set_height(4200.0);
    assert_eq!(session.page_height().await.unwrap(), 4200);
}

#[tokio::test]
async fn test_navigation_family_and_close_defaults() {
    let (session, _, page) = fixture_at("https://h.example/a").await;

    session
        .goto("https://h.example/b", &NavigateOptions::default())
        .await
        .unwrap();
    session.reload(&NavigateOptions::default()).await.unwrap();
    session
        .wait_for_navigation(&NavigateOptions::network_idle())
        .await
        .unwrap();
    session.close(&CloseOptions::default()).await.unwrap();

    assert_eq!(page.navigations().len(), 3);
    // Unload handlers run under the default close options
    assert_eq!(page.close_log(), vec![true]);
}

#[tokio::test]
async fn test_page_level_typing() {
    let (session, _, page) = fixture_at("https://h.example/").await;
    session
        .type_text("hello", &TypeOptions::default())
        .await
        .unwrap();
    assert_eq!(page.typed(), vec!["hello"]);
}

#[tokio::test(start_paused = true)]
async fn test_await_commands_evaluates_and_exits() {
    let (session, _, page) = fixture_at("https://h.example/").await;
    page.stub_eval("6 * 7", json!(42));

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("command.js");
    tokio::fs::write(&script, "").await.unwrap();

    let console = {
        let session = session.clone();
        let script = script.clone();
        tokio::spawn(async move { session.await_commands(&script).await })
    };

    // Let the console loop take its baseline read of the empty file before
    // the first command lands, so the change below is observable.
    sleep(Duration::from_millis(10)).await;

    tokio::fs::write(&script, "6 * 7").await.unwrap();
    let result_path = script.with_extension("result.json");
    while tokio::fs::try_exists(&result_path).await.ok() != Some(true) {
        sleep(Duration::from_millis(200)).await;
    }
    let result = tokio::fs::read_to_string(&result_path).await.unwrap();
    assert_eq!(result.trim(), "42");

    tokio::fs::write(&script, "exit").await.unwrap();
    console
        .await
        .expect("console task panicked")
        .expect("console loop failed");
}

#[tokio::test]
async fn test_session_error_carries_live_session() {
    let (session, _, page) = fixture_at("https://h.example/").await;
    page.fail_eval("window.broken", TransportError::command("ReferenceError"));

    let err = session
        .evaluate("window.broken")
        .await
        .expect_err("evaluation should fail");
    let bound = err.session().expect("session error must carry its session");
    // The carried session is the same live page; a diagnostic loop can
    // resume against it
    assert_eq!(bound.url(), session.url());
    assert!(bound.exists("#anything").await.is_ok());
}
