//! In-memory [`BrowserTrait`] implementation for tests.
//!
//! `MockBrowser` serves a fixture DOM built from [`MockElement`] trees and
//! records every interaction (navigations, typed keys, clicks, scroll
//! positions) so tests can assert on driver traffic without a real
//! browser. Script evaluation answers the handful of queries the engine
//! issues (readyState, scroll height, viewport, scrollTo) from
//! configurable queues.

use crate::core::{BrowserTrait, By, Point, ScrapeConfig, Size};
use crate::errors::{Result, ScribeError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Declarative DOM fixture node.
#[derive(Debug, Clone)]
pub struct MockElement {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    displayed: bool,
    enabled: bool,
    detached: bool,
    location: Point,
    size: Size,
    children: Vec<MockElement>,
}

impl MockElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            attrs: Vec::new(),
            text: String::new(),
            displayed: true,
            enabled: true,
            detached: false,
            location: Point { x: 0, y: 0 },
            size: Size {
                width: 100,
                height: 20,
            },
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn child(mut self, child: MockElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Simulate an element that goes stale: findable, but every accessor
    /// fails with `ElementDetached`.
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn at(mut self, x: i64, y: i64) -> Self {
        self.location = Point { x, y };
        self
    }

    pub fn sized(mut self, width: u64, height: u64) -> Self {
        self.size = Size { width, height };
        self
    }
}

#[derive(Debug)]
struct Node {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    displayed: bool,
    enabled: bool,
    detached: bool,
    location: Point,
    size: Size,
    parent: Option<usize>,
    children: Vec<usize>,
}

pub struct MockBrowser {
    nodes: Vec<Node>,
    body: Option<usize>,
    title: String,
    viewport: (u32, u32),
    current_url: Mutex<String>,
    redirect_after_submit: Option<String>,
    ready_states: Mutex<VecDeque<String>>,
    scroll_heights: Mutex<VecDeque<i64>>,
    last_height: Mutex<i64>,
    scroll_positions: Mutex<Vec<i64>>,
    navigations: Mutex<Vec<String>>,
    clicks: Mutex<Vec<usize>>,
    keys: Mutex<Vec<(usize, String)>>,
    cleared: Mutex<Vec<usize>>,
    enters: Mutex<Vec<usize>>,
}

impl MockBrowser {
    /// Fixture with the given `<body>` tree.
    pub fn with_body(body: MockElement) -> Self {
        let mut browser = Self::empty();
        let root = flatten(body, None, &mut browser.nodes);
        browser.body = Some(root);
        browser
    }

    /// Fixture with no DOM at all; root resolution fails.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            body: None,
            title: "Mock Page".to_string(),
            viewport: (1920, 1080),
            current_url: Mutex::new("about:blank".to_string()),
            redirect_after_submit: None,
            ready_states: Mutex::new(VecDeque::new()),
            scroll_heights: Mutex::new(VecDeque::new()),
            last_height: Mutex::new(1000),
            scroll_positions: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
            clicks: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
            enters: Mutex::new(Vec::new()),
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_url(self, url: &str) -> Self {
        *self.current_url.lock().unwrap() = url.to_string();
        self
    }

    /// URL the mock jumps to when anything is clicked or confirmed.
    pub fn redirect_after_submit(mut self, url: &str) -> Self {
        self.redirect_after_submit = Some(url.to_string());
        self
    }

    /// Scripted answers for `document.readyState` probes; once exhausted
    /// the document reports itself complete.
    pub fn ready_states(self, states: Vec<String>) -> Self {
        *self.ready_states.lock().unwrap() = states.into();
        self
    }

    /// Scripted answers for scroll-height samples; once exhausted the last
    /// value repeats.
    pub fn scroll_heights(self, heights: Vec<i64>) -> Self {
        *self.scroll_heights.lock().unwrap() = heights.into();
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    pub fn scroll_positions(&self) -> Vec<i64> {
        self.scroll_positions.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn typed_keys(&self) -> Vec<(usize, String)> {
        self.keys.lock().unwrap().clone()
    }

    pub fn cleared_fields(&self) -> Vec<usize> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn click_count(&self) -> usize {
        self.clicks.lock().unwrap().len()
    }

    pub fn enter_presses(&self) -> usize {
        self.enters.lock().unwrap().len()
    }

    fn node(&self, handle: usize) -> Result<&Node> {
        let node = self
            .nodes
            .get(handle)
            .ok_or(ScribeError::ElementDetached)?;
        if node.detached {
            return Err(ScribeError::ElementDetached);
        }
        Ok(node)
    }

    fn all_matching(&self, matcher: impl Fn(&Node) -> bool) -> Vec<usize> {
        // Node indexes are assigned in pre-order, so index order is
        // document order.
        (0..self.nodes.len())
            .filter(|&i| matcher(&self.nodes[i]))
            .collect()
    }

    fn submit_happened(&self) {
        if let Some(url) = &self.redirect_after_submit {
            *self.current_url.lock().unwrap() = url.clone();
        }
    }
}

fn flatten(element: MockElement, parent: Option<usize>, nodes: &mut Vec<Node>) -> usize {
    let index = nodes.len();
    nodes.push(Node {
        tag: element.tag,
        attrs: element.attrs,
        text: element.text,
        displayed: element.displayed,
        enabled: element.enabled,
        detached: element.detached,
        location: element.location,
        size: element.size,
        parent,
        children: Vec::new(),
    });
    for child in element.children {
        let child_index = flatten(child, Some(index), nodes);
        nodes[index].children.push(child_index);
    }
    index
}

/// The subset of CSS the engine's candidate locators use:
/// `#id`, `tag`, and `tag[attr='v']` / `tag[attr*='v']` chains.
#[derive(Debug)]
struct CssPattern {
    tag: Option<String>,
    id: Option<String>,
    attrs: Vec<(String, bool, String)>, // (name, substring-match, value)
}

fn parse_css(selector: &str) -> Option<CssPattern> {
    let selector = selector.trim();
    if let Some(id) = selector.strip_prefix('#') {
        if id.is_empty() || id.contains(|c: char| !c.is_alphanumeric() && c != '-' && c != '_') {
            return None;
        }
        return Some(CssPattern {
            tag: None,
            id: Some(id.to_string()),
            attrs: Vec::new(),
        });
    }

    let (tag, mut rest) = match selector.find('[') {
        Some(at) => (&selector[..at], &selector[at..]),
        None => (selector, ""),
    };
    if tag.contains(|c: char| !c.is_ascii_alphanumeric()) {
        return None;
    }

    let mut attrs = Vec::new();
    while let Some(stripped) = rest.strip_prefix('[') {
        let close = stripped.find(']')?;
        let group = &stripped[..close];
        rest = &stripped[close + 1..];

        let (name, substring, value) = if let Some((name, value)) = group.split_once("*=") {
            (name, true, value)
        } else if let Some((name, value)) = group.split_once('=') {
            (name, false, value)
        } else {
            return None;
        };
        let value = value.trim_matches('\'').trim_matches('"');
        attrs.push((name.to_string(), substring, value.to_string()));
    }
    if !rest.is_empty() {
        return None;
    }

    Some(CssPattern {
        tag: if tag.is_empty() {
            None
        } else {
            Some(tag.to_lowercase())
        },
        id: None,
        attrs,
    })
}

fn attr_of<'n>(node: &'n Node, name: &str) -> Option<&'n str> {
    node.attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn matches_css(node: &Node, pattern: &CssPattern) -> bool {
    if let Some(id) = &pattern.id {
        return attr_of(node, "id") == Some(id.as_str());
    }
    if let Some(tag) = &pattern.tag {
        if &node.tag != tag {
            return false;
        }
    }
    pattern.attrs.iter().all(|(name, substring, value)| {
        match attr_of(node, name) {
            Some(actual) if *substring => actual.contains(value.as_str()),
            Some(actual) => actual == value,
            None => false,
        }
    })
}

#[async_trait]
impl BrowserTrait for MockBrowser {
    type TabHandle = ();
    type ElementHandle = usize;

    async fn launch(&mut self, _config: &ScrapeConfig) -> Result<()> {
        Ok(())
    }

    async fn new_tab(&self) -> Result<Self::TabHandle> {
        Ok(())
    }

    async fn navigate(&self, _tab: &Self::TabHandle, url: &str) -> Result<()> {
        self.navigations.lock().unwrap().push(url.to_string());
        *self.current_url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn current_url(&self, _tab: &Self::TabHandle) -> Result<String> {
        Ok(self.current_url.lock().unwrap().clone())
    }

    async fn title(&self, _tab: &Self::TabHandle) -> Result<String> {
        Ok(self.title.clone())
    }

    async fn execute_script(&self, _tab: &Self::TabHandle, script: &str) -> Result<Value> {
        if let Some(at) = script.find("window.scrollTo(0,") {
            let after = &script[at + "window.scrollTo(0,".len()..];
            let digits: String = after
                .chars()
                .take_while(|c| c.is_ascii_digit() || c.is_whitespace())
                .collect();
            if let Ok(position) = digits.trim().parse::<i64>() {
                self.scroll_positions.lock().unwrap().push(position);
            }
            return Ok(Value::Null);
        }
        if script.contains("innerWidth") && script.contains("innerHeight") {
            return Ok(json!({"width": self.viewport.0, "height": self.viewport.1}));
        }
        if script.contains("readyState") {
            let state = self
                .ready_states
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "complete".to_string());
            return Ok(Value::String(state));
        }
        if script.contains("scrollHeight") {
            let mut last = self.last_height.lock().unwrap();
            if let Some(height) = self.scroll_heights.lock().unwrap().pop_front() {
                *last = height;
            }
            return Ok(json!(*last));
        }
        if script.contains("innerHeight") {
            return Ok(json!(self.viewport.1 as i64));
        }
        if script.contains("document.title") {
            return Ok(Value::String(self.title.clone()));
        }
        Ok(Value::Null)
    }

    async fn find_element(
        &self,
        tab: &Self::TabHandle,
        by: By,
        selector: &str,
    ) -> Result<Self::ElementHandle> {
        self.find_elements(tab, by, selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScribeError::ElementNotFound(selector.to_string()))
    }

    async fn find_elements(
        &self,
        _tab: &Self::TabHandle,
        by: By,
        selector: &str,
    ) -> Result<Vec<Self::ElementHandle>> {
        match by {
            By::TagName => {
                let tag = selector.to_lowercase();
                Ok(self.all_matching(|node| node.tag == tag))
            }
            By::XPath => match selector {
                "//body" => Ok(self.body.into_iter().collect()),
                other => Err(ScribeError::ScriptFailed(format!(
                    "mock supports only //body xpath, got {other}"
                ))),
            },
            By::Css => {
                let pattern = parse_css(selector).ok_or_else(|| {
                    ScribeError::ScriptFailed(format!("unsupported mock selector {selector}"))
                })?;
                Ok(self.all_matching(|node| matches_css(node, &pattern)))
            }
        }
    }

    async fn child_elements(
        &self,
        _tab: &Self::TabHandle,
        parent: &Self::ElementHandle,
    ) -> Result<Vec<Self::ElementHandle>> {
        Ok(self.node(*parent)?.children.clone())
    }

    async fn parent_element(
        &self,
        _tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<Option<Self::ElementHandle>> {
        Ok(self.node(*element)?.parent)
    }

    async fn same_element(
        &self,
        _tab: &Self::TabHandle,
        a: &Self::ElementHandle,
        b: &Self::ElementHandle,
    ) -> Result<bool> {
        Ok(a == b)
    }

    async fn tag_name(
        &self,
        _tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<String> {
        Ok(self.node(*element)?.tag.clone())
    }

    async fn text(&self, _tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<String> {
        Ok(self.node(*element)?.text.clone())
    }

    async fn attribute(
        &self,
        _tab: &Self::TabHandle,
        element: &Self::ElementHandle,
        name: &str,
    ) -> Result<Option<String>> {
        Ok(attr_of(self.node(*element)?, name).map(str::to_string))
    }

    async fn attributes(
        &self,
        _tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<HashMap<String, String>> {
        Ok(self.node(*element)?.attrs.iter().cloned().collect())
    }

    async fn is_displayed(
        &self,
        _tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<bool> {
        Ok(self.node(*element)?.displayed)
    }

    async fn is_enabled(
        &self,
        _tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<bool> {
        Ok(self.node(*element)?.enabled)
    }

    async fn location(
        &self,
        _tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<Point> {
        Ok(self.node(*element)?.location)
    }

    async fn size(&self, _tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<Size> {
        Ok(self.node(*element)?.size)
    }

    async fn clear(&self, _tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<()> {
        self.node(*element)?;
        self.cleared.lock().unwrap().push(*element);
        Ok(())
    }

    async fn send_keys(
        &self,
        _tab: &Self::TabHandle,
        element: &Self::ElementHandle,
        text: &str,
    ) -> Result<()> {
        self.node(*element)?;
        self.keys.lock().unwrap().push((*element, text.to_string()));
        Ok(())
    }

    async fn press_enter(
        &self,
        _tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<()> {
        self.node(*element)?;
        self.enters.lock().unwrap().push(*element);
        self.submit_happened();
        Ok(())
    }

    async fn click(&self, _tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<()> {
        self.node(*element)?;
        self.clicks.lock().unwrap().push(*element);
        self.submit_happened();
        Ok(())
    }

    fn is_running(&self) -> bool {
        true
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_parser_handles_the_candidate_grammar() {
        let pattern = parse_css("input[type='text'][name*='user']").unwrap();
        assert_eq!(pattern.tag.as_deref(), Some("input"));
        assert_eq!(pattern.attrs.len(), 2);
        assert!(!pattern.attrs[0].1);
        assert!(pattern.attrs[1].1);

        let pattern = parse_css("#main").unwrap();
        assert_eq!(pattern.id.as_deref(), Some("main"));

        assert!(parse_css("button:contains('Login')").is_none());
    }

    #[tokio::test]
    async fn finds_elements_in_document_order() {
        let browser = MockBrowser::with_body(
            MockElement::new("body")
                .child(MockElement::new("div").child(MockElement::new("span").text("first")))
                .child(MockElement::new("span").text("second")),
        );
        let spans = browser.find_elements(&(), By::TagName, "span").await.unwrap();
        assert_eq!(spans.len(), 2);
        let first = browser.text(&(), &spans[0]).await.unwrap();
        assert_eq!(first, "first");
    }

    #[tokio::test]
    async fn detached_nodes_fail_accessors_but_stay_findable() {
        let browser = MockBrowser::with_body(
            MockElement::new("body").child(MockElement::new("div").detached()),
        );
        let div = browser.find_element(&(), By::TagName, "div").await.unwrap();
        assert!(matches!(
            browser.tag_name(&(), &div).await,
            Err(ScribeError::ElementDetached)
        ));
    }
}
