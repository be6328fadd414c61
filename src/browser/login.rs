use crate::core::{BrowserTrait, By, LoginCredentials};
use crate::errors::{Result, ScribeError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// States of the authentication flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    NavigatingLogin,
    LocatingFields,
    Filling,
    Submitting,
    AwaitingTransition,
    Success,
    Failed,
}

/// Ordered candidate locators probed when no explicit locator is supplied.
/// First candidate that resolves to a currently visible element wins.
const USERNAME_CANDIDATES: &[&str] = &[
    "input[type='email']",
    "input[type='text'][name*='user']",
    "input[type='text'][name*='login']",
    "input[type='text'][name*='account']",
    "input[name='username']",
    "input[id*='user']",
    "input[id*='login']",
];

const PASSWORD_CANDIDATES: &[&str] = &[
    "input[type='password']",
    "input[name='password']",
    "input[id*='pass']",
];

const SUBMIT_CANDIDATES: &[&str] = &[
    "button[type='submit']",
    "input[type='submit']",
    "button[id*='login']",
    "button[class*='login']",
];

/// Locator strings starting with `//` (or a grouped `(//`) are XPath;
/// everything else is a CSS selector.
pub fn locator_kind(selector: &str) -> By {
    if selector.starts_with("//") || selector.starts_with("(//") {
        By::XPath
    } else {
        By::Css
    }
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Success {
        final_url: String,
        /// False when the URL never left the login page; success is still
        /// reported because some sites do not redirect, but the ambiguity
        /// is logged.
        redirected: bool,
    },
    Cancelled,
}

/// Drives navigate → locate fields → fill → submit → verify transition.
///
/// Username and password fields are required; a missing submit control
/// falls back to a confirm keystroke on the password field.
pub struct LoginSequencer {
    /// Pause after the login page renders, before probing for fields.
    post_navigation_pause: Duration,
    /// Pause between filling individual fields.
    inter_field_pause: Duration,
}

impl Default for LoginSequencer {
    fn default() -> Self {
        Self {
            post_navigation_pause: Duration::from_secs(1),
            inter_field_pause: Duration::from_millis(500),
        }
    }
}

impl LoginSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compressed pauses, used by tests.
    pub fn with_pauses(post_navigation_pause: Duration, inter_field_pause: Duration) -> Self {
        Self {
            post_navigation_pause,
            inter_field_pause,
        }
    }

    pub async fn run<B: BrowserTrait>(
        &self,
        browser: &B,
        tab: &B::TabHandle,
        credentials: &LoginCredentials,
        stop: &AtomicBool,
    ) -> Result<LoginOutcome> {
        match self.run_sequence(browser, tab, credentials, stop).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let state = LoginState::Failed;
                warn!(?state, %err, "login sequence failed");
                Err(err)
            }
        }
    }

    async fn run_sequence<B: BrowserTrait>(
        &self,
        browser: &B,
        tab: &B::TabHandle,
        credentials: &LoginCredentials,
        stop: &AtomicBool,
    ) -> Result<LoginOutcome> {
        let mut state = LoginState::NavigatingLogin;
        info!(?state, url = %credentials.login_url, "starting login sequence");

        browser.navigate(tab, &credentials.login_url).await?;
        tokio::time::sleep(self.post_navigation_pause).await;
        if stop.load(Ordering::Relaxed) {
            return Ok(LoginOutcome::Cancelled);
        }

        state = LoginState::LocatingFields;
        debug!(?state, "probing for credential fields");
        let username_locator = match &credentials.username_locator {
            Some(locator) => locator.clone(),
            None => self
                .probe_candidates(browser, tab, USERNAME_CANDIDATES)
                .await
                .ok_or(ScribeError::LoginFieldNotFound { field: "username" })?,
        };
        let password_locator = match &credentials.password_locator {
            Some(locator) => locator.clone(),
            None => self
                .probe_candidates(browser, tab, PASSWORD_CANDIDATES)
                .await
                .ok_or(ScribeError::LoginFieldNotFound { field: "password" })?,
        };
        // A missing submit control is not fatal; the confirm keystroke on
        // the password field stands in for it.
        let submit_locator = match &credentials.submit_locator {
            Some(locator) => Some(locator.clone()),
            None => self.probe_candidates(browser, tab, SUBMIT_CANDIDATES).await,
        };
        if stop.load(Ordering::Relaxed) {
            return Ok(LoginOutcome::Cancelled);
        }

        state = LoginState::Filling;
        debug!(?state, locator = %username_locator, "filling username");
        let username_field = browser
            .find_element(tab, locator_kind(&username_locator), &username_locator)
            .await
            .map_err(|_| ScribeError::LoginFieldNotFound { field: "username" })?;
        browser.clear(tab, &username_field).await?;
        browser
            .send_keys(tab, &username_field, &credentials.username)
            .await?;
        tokio::time::sleep(self.inter_field_pause).await;

        debug!(?state, locator = %password_locator, "filling password");
        let password_field = browser
            .find_element(tab, locator_kind(&password_locator), &password_locator)
            .await
            .map_err(|_| ScribeError::LoginFieldNotFound { field: "password" })?;
        browser.clear(tab, &password_field).await?;
        browser
            .send_keys(tab, &password_field, &credentials.password)
            .await?;
        tokio::time::sleep(self.inter_field_pause).await;
        if stop.load(Ordering::Relaxed) {
            return Ok(LoginOutcome::Cancelled);
        }

        state = LoginState::Submitting;
        match &submit_locator {
            Some(locator) => {
                debug!(?state, %locator, "clicking submit control");
                let submit = browser
                    .find_element(tab, locator_kind(locator), locator)
                    .await
                    .map_err(|err| ScribeError::LoginSubmitFailed(err.to_string()))?;
                browser
                    .click(tab, &submit)
                    .await
                    .map_err(|err| ScribeError::LoginSubmitFailed(err.to_string()))?;
            }
            None => {
                info!("no submit control resolved, sending confirm keystroke");
                browser
                    .press_enter(tab, &password_field)
                    .await
                    .map_err(|err| ScribeError::LoginSubmitFailed(err.to_string()))?;
            }
        }

        state = LoginState::AwaitingTransition;
        debug!(
            ?state,
            wait_seconds = credentials.post_login_wait_seconds,
            "waiting for post-login transition"
        );
        tokio::time::sleep(Duration::from_secs(credentials.post_login_wait_seconds)).await;
        if stop.load(Ordering::Relaxed) {
            return Ok(LoginOutcome::Cancelled);
        }

        let current = browser.current_url(tab).await?;
        let redirected = !looks_like_login_page(&current, &credentials.login_url);
        state = LoginState::Success;
        if redirected {
            info!(?state, url = %current, "login succeeded");
        } else {
            // Some sites never redirect on success, so this still counts as
            // success; flagged because it is indistinguishable from a
            // silent failure.
            warn!(url = %current, "URL still looks like the login page, reporting success anyway");
        }
        Ok(LoginOutcome::Success {
            final_url: current,
            redirected,
        })
    }

    /// First candidate resolving to at least one visible element.
    async fn probe_candidates<B: BrowserTrait>(
        &self,
        browser: &B,
        tab: &B::TabHandle,
        candidates: &[&str],
    ) -> Option<String> {
        for candidate in candidates {
            let found = match browser
                .find_elements(tab, locator_kind(candidate), candidate)
                .await
            {
                Ok(found) => found,
                Err(_) => continue,
            };
            for element in &found {
                if browser.is_displayed(tab, element).await.unwrap_or(false) {
                    return Some(candidate.to_string());
                }
            }
        }
        None
    }
}

fn looks_like_login_page(current_url: &str, login_url: &str) -> bool {
    if urls_equal(current_url, login_url) {
        return true;
    }
    let lowered = current_url.to_lowercase();
    lowered.contains("login") || lowered.contains("signin")
}

fn urls_equal(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrowser, MockElement};

    fn credentials() -> LoginCredentials {
        LoginCredentials {
            login_url: "https://example.com/login".to_string(),
            username: "alice".to_string(),
            password: "secret".to_string(),
            username_locator: None,
            password_locator: None,
            submit_locator: None,
            post_login_wait_seconds: 0,
        }
    }

    fn sequencer() -> LoginSequencer {
        LoginSequencer::with_pauses(Duration::ZERO, Duration::ZERO)
    }

    fn login_form() -> MockElement {
        MockElement::new("body").child(
            MockElement::new("form")
                .child(MockElement::new("input").attr("type", "email").attr("name", "email"))
                .child(
                    MockElement::new("input")
                        .attr("type", "password")
                        .attr("name", "password"),
                )
                .child(MockElement::new("button").attr("type", "submit").text("Sign in")),
        )
    }

    #[tokio::test]
    async fn fills_and_submits_with_probed_locators() {
        let browser = MockBrowser::with_body(login_form())
            .with_url("https://example.com/login")
            .redirect_after_submit("https://example.com/home");
        let tab = browser.new_tab().await.unwrap();
        let stop = AtomicBool::new(false);

        let outcome = sequencer()
            .run(&browser, &tab, &credentials(), &stop)
            .await
            .unwrap();

        match outcome {
            LoginOutcome::Success {
                final_url,
                redirected,
            } => {
                assert!(redirected);
                assert_eq!(final_url, "https://example.com/home");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let keys = browser.typed_keys();
        assert!(keys.iter().any(|(_, text)| text == "alice"));
        assert!(keys.iter().any(|(_, text)| text == "secret"));
        assert_eq!(browser.click_count(), 1);
    }

    #[tokio::test]
    async fn missing_username_field_fails_before_submission() {
        // Password field present, nothing username-like.
        let browser = MockBrowser::with_body(
            MockElement::new("body")
                .child(MockElement::new("input").attr("type", "password")),
        )
        .with_url("https://example.com/login");
        let tab = browser.new_tab().await.unwrap();
        let stop = AtomicBool::new(false);

        let err = sequencer()
            .run(&browser, &tab, &credentials(), &stop)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScribeError::LoginFieldNotFound { field: "username" }
        ));
        assert_eq!(browser.click_count(), 0);
        assert!(browser.typed_keys().is_empty());
    }

    #[tokio::test]
    async fn hidden_candidates_are_not_accepted() {
        let browser = MockBrowser::with_body(
            MockElement::new("body")
                .child(MockElement::new("input").attr("type", "email").hidden())
                .child(MockElement::new("input").attr("type", "password")),
        )
        .with_url("https://example.com/login");
        let tab = browser.new_tab().await.unwrap();
        let stop = AtomicBool::new(false);

        let err = sequencer()
            .run(&browser, &tab, &credentials(), &stop)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScribeError::LoginFieldNotFound { field: "username" }
        ));
    }

    #[tokio::test]
    async fn falls_back_to_confirm_keystroke_without_submit_control() {
        let browser = MockBrowser::with_body(
            MockElement::new("body")
                .child(MockElement::new("input").attr("type", "email"))
                .child(MockElement::new("input").attr("type", "password")),
        )
        .with_url("https://example.com/login")
        .redirect_after_submit("https://example.com/app");
        let tab = browser.new_tab().await.unwrap();
        let stop = AtomicBool::new(false);

        let outcome = sequencer()
            .run(&browser, &tab, &credentials(), &stop)
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::Success { redirected: true, .. }));
        assert_eq!(browser.click_count(), 0);
        assert_eq!(browser.enter_presses(), 1);
    }

    #[tokio::test]
    async fn unchanged_url_still_reports_success() {
        let browser = MockBrowser::with_body(login_form()).with_url("https://example.com/login");
        let tab = browser.new_tab().await.unwrap();
        let stop = AtomicBool::new(false);

        let outcome = sequencer()
            .run(&browser, &tab, &credentials(), &stop)
            .await
            .unwrap();
        match outcome {
            LoginOutcome::Success { redirected, .. } => assert!(!redirected),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn explicit_locators_override_probing() {
        let browser = MockBrowser::with_body(
            MockElement::new("body").child(
                MockElement::new("form")
                    .child(MockElement::new("input").attr("id", "who"))
                    .child(MockElement::new("input").attr("id", "pw").attr("type", "password"))
                    .child(MockElement::new("button").attr("id", "go")),
            ),
        )
        .with_url("https://example.com/login")
        .redirect_after_submit("https://example.com/home");
        let tab = browser.new_tab().await.unwrap();
        let stop = AtomicBool::new(false);

        let mut creds = credentials();
        creds.username_locator = Some("#who".to_string());
        creds.password_locator = Some("#pw".to_string());
        creds.submit_locator = Some("#go".to_string());

        let outcome = sequencer().run(&browser, &tab, &creds, &stop).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Success { .. }));
        assert_eq!(browser.click_count(), 1);
    }

    #[tokio::test]
    async fn stop_flag_cancels_between_steps() {
        let browser = MockBrowser::with_body(login_form()).with_url("https://example.com/login");
        let tab = browser.new_tab().await.unwrap();
        let stop = AtomicBool::new(true);

        let outcome = sequencer()
            .run(&browser, &tab, &credentials(), &stop)
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::Cancelled));
        assert!(browser.typed_keys().is_empty());
    }

    #[test]
    fn xpath_locators_are_detected_by_prefix() {
        assert_eq!(locator_kind("//input[@id='user']"), By::XPath);
        assert_eq!(locator_kind("(//input)[1]"), By::XPath);
        assert_eq!(locator_kind("input[name='user']"), By::Css);
        assert_eq!(locator_kind("#login"), By::Css);
    }
}
