use crate::core::{Point, Size, Viewport};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot of one visible DOM element and, recursively, its visible
/// children. Records are owned exclusively by their parent; `index` is
/// assigned globally in pre-order discovery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRecord {
    pub index: usize,
    pub tag: String,
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub location: Option<Point>,
    pub size: Option<Size>,
    pub displayed: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
    pub children: Vec<ElementRecord>,
    pub children_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ElementRecord {
    pub fn new(index: usize, tag: String) -> Self {
        Self {
            index,
            tag,
            text: String::new(),
            attributes: HashMap::new(),
            location: None,
            size: None,
            displayed: false,
            enabled: false,
            xpath: None,
            css_selector: None,
            children: Vec::new(),
            children_count: 0,
            error: None,
        }
    }

    /// Minimal record for an element whose tag could not even be read.
    pub fn stub(index: usize, error: String) -> Self {
        let mut record = Self::new(index, String::new());
        record.error = Some(error);
        record
    }

    pub fn attach_children(&mut self, children: Vec<ElementRecord>) {
        self.children_count = children.len();
        self.children = children;
    }

    /// This record plus all records reachable through `children`.
    pub fn count_recursive(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ElementRecord::count_recursive)
            .sum::<usize>()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub viewport_size: Viewport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub page_info: PageInfo,
    pub elements: Vec<ElementRecord>,
    pub total_elements: usize,
}

impl ScrapeResult {
    /// Build a result; `total_elements` counts the whole forest.
    pub fn new(page_info: PageInfo, elements: Vec<ElementRecord>) -> Self {
        let total_elements = elements.iter().map(ElementRecord::count_recursive).sum();
        Self {
            page_info,
            elements,
            total_elements,
        }
    }
}
