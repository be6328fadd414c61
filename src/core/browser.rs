use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// How a selector string should be interpreted by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum By {
    TagName,
    XPath,
    Css,
}

/// Top-left corner of an element, in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// Rendered extent of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u64,
    pub height: u64,
}

/// Contract for the browser-automation driver.
///
/// Everything the snapshot engine needs from a browser goes through this
/// trait: navigation, script evaluation, element lookup and per-element
/// introspection. Element handles stay valid only while the page they came
/// from is loaded; accessors on a stale handle return
/// [`ScribeError::ElementDetached`](crate::errors::ScribeError::ElementDetached).
#[async_trait]
pub trait BrowserTrait: Send + Sync {
    type TabHandle: Send + Sync;
    type ElementHandle: Clone + Send + Sync;

    /// Launch the browser process.
    async fn launch(&mut self, config: &crate::core::ScrapeConfig) -> Result<()>;

    /// Create a new tab/page.
    async fn new_tab(&self) -> Result<Self::TabHandle>;

    /// Navigate to a URL and wait for the initial load.
    async fn navigate(&self, tab: &Self::TabHandle, url: &str) -> Result<()>;

    /// Current URL of the tab.
    async fn current_url(&self, tab: &Self::TabHandle) -> Result<String>;

    /// Current document title.
    async fn title(&self, tab: &Self::TabHandle) -> Result<String>;

    /// Evaluate a JavaScript expression and return its JSON value.
    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value>;

    /// Find the first element matching the selector.
    async fn find_element(
        &self,
        tab: &Self::TabHandle,
        by: By,
        selector: &str,
    ) -> Result<Self::ElementHandle>;

    /// Find all elements matching the selector, in document order.
    async fn find_elements(
        &self,
        tab: &Self::TabHandle,
        by: By,
        selector: &str,
    ) -> Result<Vec<Self::ElementHandle>>;

    /// Immediate element children of `parent`, in document order.
    async fn child_elements(
        &self,
        tab: &Self::TabHandle,
        parent: &Self::ElementHandle,
    ) -> Result<Vec<Self::ElementHandle>>;

    /// Parent element, or `None` at the document root.
    async fn parent_element(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<Option<Self::ElementHandle>>;

    /// Whether two handles refer to the same DOM node.
    async fn same_element(
        &self,
        tab: &Self::TabHandle,
        a: &Self::ElementHandle,
        b: &Self::ElementHandle,
    ) -> Result<bool>;

    /// Lowercased tag name.
    async fn tag_name(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<String>;

    /// Rendered text content (untrimmed).
    async fn text(&self, tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<String>;

    /// A single attribute value, `None` when absent.
    async fn attribute(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
        name: &str,
    ) -> Result<Option<String>>;

    /// The full attribute map.
    async fn attributes(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<HashMap<String, String>>;

    /// Whether the element is rendered visible.
    async fn is_displayed(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<bool>;

    /// Whether the element accepts interaction (not disabled).
    async fn is_enabled(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<bool>;

    /// Document-coordinate position.
    async fn location(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<Point>;

    /// Rendered size.
    async fn size(&self, tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<Size>;

    /// Clear an input field.
    async fn clear(&self, tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<()>;

    /// Type text into an element.
    async fn send_keys(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
        text: &str,
    ) -> Result<()>;

    /// Send a confirm (Enter) keystroke to an element.
    async fn press_enter(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<()>;

    /// Click an element.
    async fn click(&self, tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<()>;

    /// Check if the browser is still running.
    fn is_running(&self) -> bool;

    /// Close the browser.
    async fn close(&mut self) -> Result<()>;
}
