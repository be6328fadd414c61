use crate::core::{BrowserTrait, By, TraversalConfig};
use crate::dom::record::ElementRecord;
use crate::dom::recorder::{self, RecordOptions};
use crate::dom::timing::TimingAggregator;
use crate::errors::{Result, ScribeError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Depth and element-count limits shared across the whole walk. The
/// element counter doubles as the pre-order index source, so indexes are
/// globally unique and strictly increasing in discovery order.
#[derive(Debug)]
pub struct TraversalBudget {
    pub max_depth: usize,
    pub max_elements: usize,
    pub elements_so_far: usize,
    cap_reported: bool,
}

impl TraversalBudget {
    pub fn new(max_depth: usize, max_elements: usize) -> Self {
        Self {
            max_depth,
            max_elements,
            elements_so_far: 0,
            cap_reported: false,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.elements_so_far >= self.max_elements
    }

    /// Claim the next pre-order index. Must be called before recursing so
    /// children index after their parent.
    fn next_index(&mut self) -> usize {
        let index = self.elements_so_far;
        self.elements_so_far += 1;
        index
    }
}

impl From<&TraversalConfig> for TraversalBudget {
    fn from(config: &TraversalConfig) -> Self {
        Self::new(config.max_depth, config.max_elements)
    }
}

/// Observer invoked with `(current, total, message)` as the walk advances.
pub type ProgressObserver = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Number of recorded elements between progress notifications.
const PROGRESS_CADENCE: usize = 10;

/// Recursive pre-order walk over the visible DOM.
///
/// Hidden elements are pruned together with their entire subtrees, and
/// elements that go stale mid-walk are skipped without aborting their
/// siblings. Traversal stops silently at the depth bound and reports the
/// element cap once through the progress channel.
pub struct TreeCollector<'a, B: BrowserTrait> {
    browser: &'a B,
    tab: &'a B::TabHandle,
    options: RecordOptions,
    progress: Option<ProgressObserver>,
    stop: Arc<AtomicBool>,
}

impl<'a, B: BrowserTrait> TreeCollector<'a, B> {
    pub fn new(browser: &'a B, tab: &'a B::TabHandle, options: RecordOptions) -> Self {
        Self {
            browser,
            tab,
            options,
            progress: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_progress(mut self, observer: ProgressObserver) -> Self {
        self.progress = Some(observer);
        self
    }

    /// Share a cancellation flag; the walk checks it between elements and
    /// returns the already-collected prefix when it flips.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Collect the forest rooted at `root`, or at `<body>` when `root` is
    /// `None`. The body element itself is the first record.
    pub async fn collect(
        &self,
        root: Option<B::ElementHandle>,
        budget: &mut TraversalBudget,
        timings: &mut TimingAggregator,
    ) -> Result<Vec<ElementRecord>> {
        self.collect_level(root, 0, budget, timings).await
    }

    fn collect_level<'f>(
        &'f self,
        root: Option<B::ElementHandle>,
        depth: usize,
        budget: &'f mut TraversalBudget,
        timings: &'f mut TimingAggregator,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ElementRecord>>> + Send + 'f>> {
        Box::pin(async move {
            if depth >= budget.max_depth {
                return Ok(Vec::new());
            }
            if budget.exhausted() {
                self.report_cap(budget);
                return Ok(Vec::new());
            }

            let candidates = match &root {
                None => vec![self.resolve_root().await?],
                // A parent that went stale simply has no children anymore.
                Some(parent) => self
                    .browser
                    .child_elements(self.tab, parent)
                    .await
                    .unwrap_or_default(),
            };

            let mut records = Vec::new();
            for element in candidates {
                if self.stop.load(Ordering::Relaxed) {
                    debug!(collected = budget.elements_so_far, "stop requested, returning partial forest");
                    break;
                }
                if budget.exhausted() {
                    self.report_cap(budget);
                    break;
                }

                // Invisible elements are pruned with their whole subtree;
                // a failing visibility probe means the element detached.
                let displayed = match self.browser.is_displayed(self.tab, &element).await {
                    Ok(displayed) => displayed,
                    Err(_) => continue,
                };
                if !displayed {
                    continue;
                }

                let index = budget.next_index();
                let mut record = recorder::record(
                    self.browser,
                    self.tab,
                    &element,
                    index,
                    self.options,
                    timings,
                )
                .await;

                let children = self
                    .collect_level(Some(element), depth + 1, &mut *budget, &mut *timings)
                    .await?;
                record.attach_children(children);
                records.push(record);

                self.notify_progress(budget);
            }

            Ok(records)
        })
    }

    async fn resolve_root(&self) -> Result<B::ElementHandle> {
        if let Ok(body) = self.browser.find_element(self.tab, By::TagName, "body").await {
            return Ok(body);
        }
        self.browser
            .find_element(self.tab, By::XPath, "//body")
            .await
            .map_err(|_| ScribeError::RootNotFound("no <body> element resolvable".to_string()))
    }

    fn report_cap(&self, budget: &mut TraversalBudget) {
        if budget.cap_reported {
            return;
        }
        budget.cap_reported = true;
        warn!(
            max_elements = budget.max_elements,
            "element cap reached, truncating traversal"
        );
        if let Some(observer) = &self.progress {
            observer(
                budget.elements_so_far,
                budget.max_elements,
                "element cap reached, truncating traversal",
            );
        }
    }

    fn notify_progress(&self, budget: &TraversalBudget) {
        if budget.elements_so_far % PROGRESS_CADENCE != 0 {
            return;
        }
        if let Some(observer) = &self.progress {
            observer(
                budget.elements_so_far,
                budget.max_elements,
                &format!("collected {} elements", budget.elements_so_far),
            );
        }
    }
}
