use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub browser: BrowserConfig,
    pub stability: StabilityConfig,
    pub traversal: TraversalConfig,
    #[serde(skip_serializing, default)]
    pub login: Option<LoginCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Timing knobs for the page-settling heuristic. All intervals are
/// milliseconds so tests can compress the whole wait to near-zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Upper bound on waiting for `document.readyState == "complete"`.
    pub wait_seconds: u64,
    /// How many height-sampling rounds to run before giving up on quiescence.
    pub additional_wait_iterations: u32,
    pub ready_poll_interval_ms: u64,
    pub height_sample_delay_ms: u64,
    pub height_resample_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub scroll_pause_ms: u64,
    pub top_pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    pub max_depth: usize,
    pub max_elements: usize,
    /// XPath synthesis is expensive on large pages; off unless asked for.
    pub include_xpath: bool,
    pub include_css_selector: bool,
}

/// Credentials for an optional pre-scrape login. Never serialized by the
/// core; `Debug` redacts the password.
#[derive(Clone, Deserialize)]
pub struct LoginCredentials {
    pub login_url: String,
    pub username: String,
    pub password: String,
    pub username_locator: Option<String>,
    pub password_locator: Option<String>,
    pub submit_locator: Option<String>,
    pub post_login_wait_seconds: u64,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("username_locator", &self.username_locator)
            .field("password_locator", &self.password_locator)
            .field("submit_locator", &self.submit_locator)
            .field("post_login_wait_seconds", &self.post_login_wait_seconds)
            .finish()
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport {
                width: 1920,
                height: 1080,
            },
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            args: vec![],
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            wait_seconds: 10,
            additional_wait_iterations: 5,
            ready_poll_interval_ms: 250,
            height_sample_delay_ms: 1000,
            height_resample_delay_ms: 500,
            settle_delay_ms: 1000,
            scroll_pause_ms: 300,
            top_pause_ms: 500,
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 50,
            max_elements: 10_000,
            include_xpath: false,
            include_css_selector: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_limits() {
        let config = ScrapeConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.stability.wait_seconds, 10);
        assert_eq!(config.stability.additional_wait_iterations, 5);
        assert_eq!(config.traversal.max_depth, 50);
        assert_eq!(config.traversal.max_elements, 10_000);
        assert!(!config.traversal.include_xpath);
        assert!(!config.traversal.include_css_selector);
        assert!(config.login.is_none());
    }

    #[test]
    fn debug_redacts_password() {
        let creds = LoginCredentials {
            login_url: "https://example.com/login".to_string(),
            username: "alice".to_string(),
            password: "hunter2".to_string(),
            username_locator: None,
            password_locator: None,
            submit_locator: None,
            post_login_wait_seconds: 3,
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
