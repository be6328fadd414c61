use crate::browser::login::{LoginOutcome, LoginSequencer};
use crate::browser::stability::{StabilityPhase, StabilityWaiter};
use crate::core::{BrowserTrait, ScrapeConfig, Viewport};
use crate::dom::{
    PageInfo, ProgressObserver, RecordOptions, ScrapeResult, TimingAggregator, TraversalBudget,
    TreeCollector,
};
use crate::errors::{Result, ScribeError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One snapshot session: owns the browser and a single tab for its whole
/// lifetime and drives login → navigate → settle → collect.
///
/// The session is single-owner; run at most one scrape at a time against
/// it and call [`close`](Self::close) on every exit path.
pub struct ScribeSession<B: BrowserTrait> {
    browser: B,
    tab: Option<B::TabHandle>,
    config: ScrapeConfig,
    session_id: String,
    stop: Arc<AtomicBool>,
    progress: Option<ProgressObserver>,
}

impl<B: BrowserTrait> ScribeSession<B> {
    pub async fn new(mut browser: B, config: ScrapeConfig) -> Result<Self> {
        browser.launch(&config).await?;
        let tab = browser.new_tab().await?;
        let session_id = uuid::Uuid::new_v4().to_string();
        debug!(%session_id, "browser session ready");

        Ok(Self {
            browser,
            tab: Some(tab),
            config,
            session_id,
            stop: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Shared flag a host can flip to cancel an in-flight scrape; the
    /// walk then returns the prefix collected so far.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn set_progress_observer(&mut self, observer: ProgressObserver) {
        self.progress = Some(observer);
    }

    /// Scrape `url` into an element-tree snapshot.
    ///
    /// Runs the login sequence first when credentials are configured; a
    /// login failure aborts the scrape. A page-load timeout does not —
    /// the walk proceeds over whatever rendered.
    pub async fn scrape(&mut self, url: &str) -> Result<ScrapeResult> {
        let tab = self.tab.as_ref().ok_or(ScribeError::NoActiveTab)?;

        if let Some(credentials) = self.config.login.clone() {
            let sequencer = LoginSequencer::new();
            match sequencer
                .run(&self.browser, tab, &credentials, &self.stop)
                .await?
            {
                LoginOutcome::Success { final_url, .. } => {
                    info!(url = %final_url, "login complete, moving to target page");
                }
                LoginOutcome::Cancelled => {
                    info!("scrape cancelled during login");
                    let page_info = self.capture_page_info(tab).await?;
                    return Ok(ScrapeResult::new(page_info, Vec::new()));
                }
            }
        }

        info!(url, "navigating to target page");
        self.browser.navigate(tab, url).await?;

        let waiter = StabilityWaiter::new(self.config.stability.clone());
        match waiter.wait_until_settled(&self.browser, tab).await {
            StabilityPhase::TimedOut => {
                warn!("continuing on a page that never reported itself loaded")
            }
            phase => debug!(?phase, "page settled"),
        }

        let page_info = self.capture_page_info(tab).await?;

        info!("collecting elements");
        let mut budget = TraversalBudget::from(&self.config.traversal);
        let mut timings = TimingAggregator::new();
        let mut collector = TreeCollector::new(
            &self.browser,
            tab,
            RecordOptions::from(&self.config.traversal),
        )
        .with_stop_flag(self.stop.clone());
        if let Some(observer) = &self.progress {
            collector = collector.with_progress(observer.clone());
        }

        let elements = collector.collect(None, &mut budget, &mut timings).await?;
        let result = ScrapeResult::new(page_info, elements);

        debug!("timing summary:\n{}", timings.summary());
        info!(
            total_elements = result.total_elements,
            cancelled = self.stop.load(Ordering::Relaxed),
            "collection finished"
        );
        Ok(result)
    }

    async fn capture_page_info(&self, tab: &B::TabHandle) -> Result<PageInfo> {
        let url = self.browser.current_url(tab).await?;
        let title = self.browser.title(tab).await?;
        let viewport = self
            .browser
            .execute_script(
                tab,
                "({width: window.innerWidth, height: window.innerHeight})",
            )
            .await?;
        let viewport_size = Viewport {
            width: viewport
                .get("width")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            height: viewport
                .get("height")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        };

        Ok(PageInfo {
            url,
            title,
            timestamp: chrono::Utc::now(),
            viewport_size,
        })
    }

    /// Release the browser. Must run on every exit path, including after
    /// cancellation or failure.
    pub async fn close(&mut self) -> Result<()> {
        self.tab = None;
        self.browser.close().await
    }
}
