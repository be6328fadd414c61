use crate::core::{BrowserTrait, TraversalConfig};
use crate::dom::locator;
use crate::dom::record::ElementRecord;
use crate::dom::timing::TimingAggregator;
use crate::errors::Result;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// Which of the expensive locator fields to synthesize.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordOptions {
    pub include_xpath: bool,
    pub include_css_selector: bool,
}

impl From<&TraversalConfig> for RecordOptions {
    fn from(config: &TraversalConfig) -> Self {
        Self {
            include_xpath: config.include_xpath,
            include_css_selector: config.include_css_selector,
        }
    }
}

async fn timed<T>(
    operation: &str,
    breakdown: &mut Vec<(String, Duration)>,
    timings: &mut TimingAggregator,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    let started = Instant::now();
    let outcome = work.await;
    let elapsed = started.elapsed();
    breakdown.push((operation.to_string(), elapsed));
    timings.record(operation, elapsed);
    outcome
}

/// Map one element handle into an [`ElementRecord`].
///
/// Never fails the walk: every field is captured independently and falls
/// back to its zero value on a driver fault. Only when the tag name itself
/// cannot be read does the element degrade to a stub carrying the error.
pub async fn record<B: BrowserTrait>(
    browser: &B,
    tab: &B::TabHandle,
    element: &B::ElementHandle,
    index: usize,
    options: RecordOptions,
    timings: &mut TimingAggregator,
) -> ElementRecord {
    let total_started = Instant::now();
    let mut breakdown: Vec<(String, Duration)> = Vec::new();

    let tag = timed(
        "tag_name",
        &mut breakdown,
        timings,
        browser.tag_name(tab, element),
    )
    .await;
    let tag = match tag {
        Ok(tag) => tag,
        Err(err) => {
            debug!(index, %err, "element unreadable, recording stub");
            let total = total_started.elapsed();
            timings.record("record_element", total);
            timings.record_element(index, "", total, breakdown);
            return ElementRecord::stub(index, err.to_string());
        }
    };

    let mut record = ElementRecord::new(index, tag.clone());

    record.text = timed("text", &mut breakdown, timings, browser.text(tab, element))
        .await
        .map(|text| text.trim().to_string())
        .unwrap_or_default();

    record.attributes = match timed(
        "attributes",
        &mut breakdown,
        timings,
        browser.attributes(tab, element),
    )
    .await
    {
        Ok(attributes) => attributes,
        Err(err) => {
            debug!(index, %tag, %err, "attribute extraction failed");
            Default::default()
        }
    };

    record.displayed = timed(
        "displayed",
        &mut breakdown,
        timings,
        browser.is_displayed(tab, element),
    )
    .await
    .unwrap_or(false);

    record.enabled = timed(
        "enabled",
        &mut breakdown,
        timings,
        browser.is_enabled(tab, element),
    )
    .await
    .unwrap_or(false);

    record.location = timed(
        "location",
        &mut breakdown,
        timings,
        browser.location(tab, element),
    )
    .await
    .ok();

    record.size = timed("size", &mut breakdown, timings, browser.size(tab, element))
        .await
        .ok();

    if options.include_xpath {
        record.xpath = match timed(
            "xpath",
            &mut breakdown,
            timings,
            locator::xpath_for(browser, tab, element),
        )
        .await
        {
            Ok(xpath) => Some(xpath),
            Err(err) => {
                debug!(index, %tag, %err, "xpath synthesis failed");
                None
            }
        };
    }

    if options.include_css_selector {
        record.css_selector = match timed(
            "css_selector",
            &mut breakdown,
            timings,
            locator::css_path_for(browser, tab, element),
        )
        .await
        {
            Ok(path) => Some(path),
            Err(err) => {
                debug!(index, %tag, %err, "css path synthesis failed");
                None
            }
        };
    }

    let total = total_started.elapsed();
    timings.record("record_element", total);
    timings.record_element(index, &tag, total, breakdown);

    record
}
