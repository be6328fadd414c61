use crate::core::{BrowserTrait, StabilityConfig};
use crate::errors::{Result, ScribeError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Where the settling state machine ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityPhase {
    Loading,
    PollingHeight,
    Scrolling,
    Settled,
    TimedOut,
}

/// Heuristic wait for a page to finish dynamic loading.
///
/// The page counts as settled once `document.readyState` is complete and
/// two scroll-height samples taken shortly apart agree; a bounded scroll
/// pass then walks the viewport down the page to trigger lazy-loaded
/// content. Every phase degrades instead of failing: a load timeout or a
/// scripting fault hands the (possibly incomplete) page back to the caller.
pub struct StabilityWaiter {
    config: StabilityConfig,
}

impl StabilityWaiter {
    pub fn new(config: StabilityConfig) -> Self {
        Self { config }
    }

    pub async fn wait_until_settled<B: BrowserTrait>(
        &self,
        browser: &B,
        tab: &B::TabHandle,
    ) -> StabilityPhase {
        let mut phase = StabilityPhase::Loading;
        debug!(?phase, "waiting for document ready");
        if let Err(err) = self.wait_for_ready_state(browser, tab).await {
            warn!(%err, "proceeding with a possibly incomplete page");
            return StabilityPhase::TimedOut;
        }

        phase = StabilityPhase::PollingHeight;
        debug!(?phase, "sampling scroll height");
        self.poll_height_until_stable(browser, tab).await;

        phase = StabilityPhase::Scrolling;
        debug!(?phase, "scroll pass to trigger lazy-loaded content");
        if let Err(err) = self.scroll_through(browser, tab).await {
            warn!(%err, "scroll pass failed, treating page as settled");
        }
        StabilityPhase::Settled
    }

    /// `Loading`: block until the document reports itself complete, bounded
    /// by the configured wait budget.
    async fn wait_for_ready_state<B: BrowserTrait>(
        &self,
        browser: &B,
        tab: &B::TabHandle,
    ) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.wait_seconds);
        loop {
            match browser.execute_script(tab, "document.readyState").await {
                Ok(value) if value.as_str() == Some("complete") => return Ok(()),
                Ok(_) => {}
                Err(err) => debug!(%err, "readyState probe failed"),
            }
            if Instant::now() >= deadline {
                return Err(ScribeError::PageLoadTimeout(self.config.wait_seconds));
            }
            tokio::time::sleep(Duration::from_millis(self.config.ready_poll_interval_ms)).await;
        }
    }

    /// `PollingHeight`: bounded double-sampling of the scroll height until
    /// two consecutive samples agree.
    async fn poll_height_until_stable<B: BrowserTrait>(&self, browser: &B, tab: &B::TabHandle) {
        for iteration in 0..self.config.additional_wait_iterations {
            tokio::time::sleep(Duration::from_millis(self.config.height_sample_delay_ms)).await;
            let first = self.scroll_height(browser, tab).await;
            tokio::time::sleep(Duration::from_millis(self.config.height_resample_delay_ms)).await;
            let second = self.scroll_height(browser, tab).await;

            match (first, second) {
                (Ok(a), Ok(b)) if a == b => {
                    debug!(height = a, iteration, "scroll height stable");
                    tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
                    return;
                }
                (Ok(a), Ok(b)) => debug!(from = a, to = b, iteration, "scroll height still moving"),
                _ => {}
            }
        }
        debug!(
            iterations = self.config.additional_wait_iterations,
            "scroll height never stabilized within the iteration budget"
        );
    }

    /// `Scrolling`: step the viewport down the page to trigger lazy
    /// loading, then return to the top.
    async fn scroll_through<B: BrowserTrait>(&self, browser: &B, tab: &B::TabHandle) -> Result<()> {
        let total_height = self.scroll_height(browser, tab).await?;
        let viewport_height = browser
            .execute_script(tab, "window.innerHeight")
            .await?
            .as_i64()
            .unwrap_or(0)
            .max(1);

        let mut offset = 0;
        while offset < total_height {
            browser
                .execute_script(tab, &format!("window.scrollTo(0, {offset});"))
                .await?;
            tokio::time::sleep(Duration::from_millis(self.config.scroll_pause_ms)).await;
            offset += viewport_height;
        }

        browser.execute_script(tab, "window.scrollTo(0, 0);").await?;
        tokio::time::sleep(Duration::from_millis(self.config.top_pause_ms)).await;
        Ok(())
    }

    async fn scroll_height<B: BrowserTrait>(&self, browser: &B, tab: &B::TabHandle) -> Result<i64> {
        let value = browser
            .execute_script(tab, "document.body.scrollHeight")
            .await?;
        Ok(value.as_i64().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrowser, MockElement};

    fn fast_config() -> StabilityConfig {
        StabilityConfig {
            wait_seconds: 0,
            additional_wait_iterations: 5,
            ready_poll_interval_ms: 0,
            height_sample_delay_ms: 0,
            height_resample_delay_ms: 0,
            settle_delay_ms: 0,
            scroll_pause_ms: 0,
            top_pause_ms: 0,
        }
    }

    #[tokio::test]
    async fn settles_once_heights_agree() {
        let browser = MockBrowser::with_body(MockElement::new("body"))
            .scroll_heights(vec![500, 800, 800]);
        let tab = browser.new_tab().await.unwrap();

        let phase = StabilityWaiter::new(fast_config())
            .wait_until_settled(&browser, &tab)
            .await;
        assert_eq!(phase, StabilityPhase::Settled);
        // Two samples disagreed, the next pair agreed, then the scroll pass
        // walked the page and returned to the top.
        assert!(browser.scroll_positions().ends_with(&[0]));
    }

    #[tokio::test]
    async fn height_polling_is_bounded() {
        // Heights never agree; the poller must give up after its iteration
        // budget instead of looping forever, and still settle.
        let browser = MockBrowser::with_body(MockElement::new("body"))
            .scroll_heights((1..=40i64).map(|i| i * 100).collect());
        let tab = browser.new_tab().await.unwrap();

        let phase = StabilityWaiter::new(fast_config())
            .wait_until_settled(&browser, &tab)
            .await;
        assert_eq!(phase, StabilityPhase::Settled);
    }

    #[tokio::test]
    async fn incomplete_document_times_out_nonfatally() {
        let browser = MockBrowser::with_body(MockElement::new("body"))
            .ready_states(vec!["loading".to_string(); 50]);
        let tab = browser.new_tab().await.unwrap();

        let phase = StabilityWaiter::new(fast_config())
            .wait_until_settled(&browser, &tab)
            .await;
        assert_eq!(phase, StabilityPhase::TimedOut);
    }

    #[tokio::test]
    async fn scroll_pass_covers_the_full_height() {
        let browser = MockBrowser::with_body(MockElement::new("body"))
            .scroll_heights(vec![2000, 2000, 2000])
            .viewport(1280, 720);
        let tab = browser.new_tab().await.unwrap();

        StabilityWaiter::new(fast_config())
            .wait_until_settled(&browser, &tab)
            .await;

        let positions = browser.scroll_positions();
        assert_eq!(positions, vec![0, 720, 1440, 0]);
    }
}
