use std::sync::atomic::Ordering;
use tokio_test::assert_ok;
use webscribe::core::LoginCredentials;
use webscribe::testing::{MockBrowser, MockElement};
use webscribe::{ChromeBrowser, ScrapeConfig, ScribeSession, ScribeError};

fn fast_config() -> ScrapeConfig {
    let mut config = ScrapeConfig::default();
    config.stability.wait_seconds = 1;
    config.stability.ready_poll_interval_ms = 0;
    config.stability.height_sample_delay_ms = 0;
    config.stability.height_resample_delay_ms = 0;
    config.stability.settle_delay_ms = 0;
    config.stability.scroll_pause_ms = 0;
    config.stability.top_pause_ms = 0;
    config
}

fn reference_page() -> MockElement {
    MockElement::new("body")
        .child(MockElement::new("div").attr("id", "a").text("Hi"))
        .child(
            MockElement::new("div")
                .attr("class", "b")
                .child(MockElement::new("span").text("x")),
        )
}

fn collect_indices(records: &[webscribe::ElementRecord], out: &mut Vec<usize>) {
    for record in records {
        out.push(record.index);
        collect_indices(&record.children, out);
    }
}

#[tokio::test]
async fn end_to_end_snapshot_of_a_small_page() {
    let browser = MockBrowser::with_body(reference_page()).titled("Fixture");
    let mut session = ScribeSession::new(browser, fast_config()).await.unwrap();

    let result = session.scrape("https://example.com/").await.unwrap();
    session.close().await.unwrap();

    assert_eq!(result.total_elements, 4);
    let mut indices = Vec::new();
    collect_indices(&result.elements, &mut indices);
    assert_eq!(indices, vec![0, 1, 2, 3]);

    let body = &result.elements[0];
    assert_eq!(body.tag, "body");
    assert_eq!(body.children[0].text, "Hi");
    assert_eq!(body.children[1].children_count, 1);
    assert_eq!(result.page_info.title, "Fixture");
    assert_eq!(result.page_info.url, "https://example.com/");
    assert_eq!(result.page_info.viewport_size.width, 1920);
}

#[tokio::test]
async fn json_document_has_the_reference_shape() {
    let browser = MockBrowser::with_body(reference_page());
    let mut config = fast_config();
    config.traversal.include_xpath = true;
    config.traversal.include_css_selector = true;
    let mut session = ScribeSession::new(browser, config).await.unwrap();

    let result = session.scrape("https://example.com/").await.unwrap();
    session.close().await.unwrap();

    let value = serde_json::to_value(&result).unwrap();
    assert!(value["page_info"]["timestamp"].is_string());
    assert!(value["page_info"]["viewport_size"]["height"].is_u64());
    assert_eq!(value["total_elements"], 4);

    let body = &value["elements"][0];
    assert_eq!(body["index"], 0);
    assert_eq!(body["tag"], "body");
    assert_eq!(body["xpath"], "/html/body");

    let div_a = &body["children"][0];
    assert_eq!(div_a["xpath"], "//*[@id='a']");
    assert_eq!(div_a["css_selector"], "#a");

    let div_b = &body["children"][1];
    assert_eq!(div_b["css_selector"], "body > div.b");
    assert_eq!(div_b["children"][0]["xpath"], "/html/body/div[2]/span[1]");
    assert_eq!(div_b["children_count"], 1);
}

#[tokio::test]
async fn login_runs_before_the_target_navigation() {
    let page = MockElement::new("body")
        .child(
            MockElement::new("form")
                .child(MockElement::new("input").attr("type", "email"))
                .child(MockElement::new("input").attr("type", "password"))
                .child(MockElement::new("button").attr("type", "submit")),
        )
        .child(MockElement::new("div").text("content"));
    let browser = MockBrowser::with_body(page)
        .with_url("https://example.com/login")
        .redirect_after_submit("https://example.com/home");

    let mut config = fast_config();
    config.login = Some(LoginCredentials {
        login_url: "https://example.com/login".to_string(),
        username: "alice".to_string(),
        password: "secret".to_string(),
        username_locator: None,
        password_locator: None,
        submit_locator: None,
        post_login_wait_seconds: 0,
    });

    let mut session = ScribeSession::new(browser, config).await.unwrap();
    let result = session.scrape("https://example.com/app").await.unwrap();
    session.close().await.unwrap();

    assert!(result.total_elements > 0);
    assert_eq!(result.page_info.url, "https://example.com/app");
}

#[tokio::test]
async fn failed_login_aborts_the_scrape() {
    // No username-like field anywhere on the login page.
    let browser = MockBrowser::with_body(
        MockElement::new("body").child(MockElement::new("input").attr("type", "password")),
    )
    .with_url("https://example.com/login");

    let mut config = fast_config();
    config.login = Some(LoginCredentials {
        login_url: "https://example.com/login".to_string(),
        username: "alice".to_string(),
        password: "secret".to_string(),
        username_locator: None,
        password_locator: None,
        submit_locator: None,
        post_login_wait_seconds: 0,
    });

    let mut session = ScribeSession::new(browser, config).await.unwrap();
    let err = session.scrape("https://example.com/app").await.unwrap_err();
    session.close().await.unwrap();

    assert!(matches!(
        err,
        ScribeError::LoginFieldNotFound { field: "username" }
    ));
}

#[tokio::test]
async fn pre_set_stop_flag_yields_an_empty_partial_result() {
    let browser = MockBrowser::with_body(reference_page());
    let mut session = ScribeSession::new(browser, fast_config()).await.unwrap();

    session.stop_handle().store(true, Ordering::Relaxed);
    let result = session.scrape("https://example.com/").await.unwrap();
    session.close().await.unwrap();

    assert_eq!(result.total_elements, 0);
    assert!(result.elements.is_empty());
    assert!(!result.page_info.url.is_empty());
}

#[tokio::test]
async fn progress_observer_receives_cadenced_updates() {
    let mut body = MockElement::new("body");
    for _ in 0..30 {
        body = body.child(MockElement::new("div"));
    }
    let browser = MockBrowser::with_body(body);
    let mut session = ScribeSession::new(browser, fast_config()).await.unwrap();

    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    session.set_progress_observer(std::sync::Arc::new(move |current, total, _message| {
        sink.lock().unwrap().push((current, total));
    }));

    let result = session.scrape("https://example.com/").await.unwrap();
    session.close().await.unwrap();

    assert_eq!(result.total_elements, 31);
    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec![(10, 10_000), (20, 10_000), (30, 10_000)]);
}

#[test]
fn session_construction_succeeds_on_a_mock() {
    let browser = MockBrowser::with_body(reference_page());
    tokio_test::assert_ok!(tokio_test::block_on(ScribeSession::new(
        browser,
        fast_config()
    )));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn real_chrome_snapshot() {
    let mut config = ScrapeConfig::default();
    config.browser.headless = true;
    config.stability.wait_seconds = 10;

    let mut session = ScribeSession::new(ChromeBrowser::new(), config)
        .await
        .expect("failed to launch browser");
    let result = session
        .scrape("data:text/html,<html><body><div id='a'>Hi</div><div class='b'><span>x</span></div></body></html>")
        .await
        .expect("scrape failed");
    session.close().await.expect("close failed");

    assert!(result.total_elements >= 1);
    assert_eq!(result.elements[0].tag, "body");
}
