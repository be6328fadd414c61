//! Persistence for scrape results: pretty-printed JSON and a
//! self-contained HTML report mirroring the same tree.

use crate::dom::{ElementRecord, ScrapeResult};
use crate::errors::Result;
use std::fs;
use std::path::Path;
use tracing::info;

/// Write the snapshot as pretty-printed JSON, creating parent directories
/// as needed.
pub fn save_json(result: &ScrapeResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let rendered = serde_json::to_string_pretty(result)?;
    fs::write(path, rendered)?;
    info!(path = %path.display(), "snapshot saved");
    Ok(())
}

/// Render the snapshot as a navigable HTML document with one collapsible
/// node per element. Pure projection of the JSON tree; carries no data of
/// its own.
pub fn render_html(result: &ScrapeResult) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!(
        "<title>WebScribe - {}</title>\n",
        escape(&result.page_info.title)
    ));
    out.push_str(
        "<style>\n\
         body { font-family: sans-serif; margin: 1rem 2rem; }\n\
         details { margin-left: 1.2rem; border-left: 1px solid #ccc; padding-left: 0.6rem; }\n\
         summary { cursor: pointer; font-family: monospace; }\n\
         dl { margin: 0.2rem 0 0.6rem 1rem; font-size: 0.85rem; }\n\
         dt { font-weight: bold; display: inline; }\n\
         dd { display: inline; margin: 0 0.8rem 0 0.3rem; }\n\
         .muted { color: #888; }\n\
         </style>\n</head>\n<body>\n",
    );
    out.push_str(&format!(
        "<h1>{}</h1>\n<p class=\"muted\">{} &middot; {} &middot; {} elements &middot; viewport {}x{}</p>\n",
        escape(&result.page_info.title),
        escape(&result.page_info.url),
        result.page_info.timestamp.to_rfc3339(),
        result.total_elements,
        result.page_info.viewport_size.width,
        result.page_info.viewport_size.height,
    ));
    for element in &result.elements {
        render_node(element, &mut out);
    }
    out.push_str("</body>\n</html>\n");
    out
}

/// Write the HTML report next to the JSON document.
pub fn save_html(result: &ScrapeResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, render_html(result))?;
    info!(path = %path.display(), "report saved");
    Ok(())
}

fn render_node(record: &ElementRecord, out: &mut String) {
    out.push_str("<details>\n<summary>");
    out.push_str(&format!(
        "#{} &lt;{}&gt;",
        record.index,
        escape(&record.tag)
    ));
    if !record.text.is_empty() {
        let mut preview: String = record.text.chars().take(60).collect();
        if preview.len() < record.text.len() {
            preview.push_str("...");
        }
        out.push_str(&format!(" <span class=\"muted\">{}</span>", escape(&preview)));
    }
    out.push_str("</summary>\n<dl>\n");

    push_field(out, "children", &record.children_count.to_string());
    push_field(out, "displayed", &record.displayed.to_string());
    push_field(out, "enabled", &record.enabled.to_string());
    if let Some(location) = &record.location {
        push_field(out, "location", &format!("({}, {})", location.x, location.y));
    }
    if let Some(size) = &record.size {
        push_field(out, "size", &format!("{}x{}", size.width, size.height));
    }
    if let Some(xpath) = &record.xpath {
        push_field(out, "xpath", xpath);
    }
    if let Some(css) = &record.css_selector {
        push_field(out, "css", css);
    }
    if let Some(error) = &record.error {
        push_field(out, "error", error);
    }
    if !record.attributes.is_empty() {
        let mut names: Vec<_> = record.attributes.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        let rendered: Vec<String> = names
            .iter()
            .map(|(name, value)| format!("{}=\"{}\"", name, value))
            .collect();
        push_field(out, "attributes", &rendered.join(" "));
    }
    out.push_str("</dl>\n");

    for child in &record.children {
        render_node(child, out);
    }
    out.push_str("</details>\n");
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!("<dt>{}</dt><dd>{}</dd>\n", name, escape(value)));
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
