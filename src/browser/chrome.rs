use crate::core::{BrowserTrait, By, Point, ScrapeConfig, Size};
use crate::errors::{Result, ScribeError};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;

/// Chrome-backed driver.
///
/// Element handles are indexes into a page-side registry
/// (`window.__scribeRegistry`); every element operation is a script
/// evaluation against that registry. Handles are invalidated by navigation
/// (the registry lives in the page's window) — a stale or removed entry
/// surfaces as `ElementDetached`.
pub struct ChromeBrowser {
    browser: Option<Browser>,
}

impl ChromeBrowser {
    pub fn new() -> Self {
        Self { browser: None }
    }

    /// Escape a Rust string into a JS string literal.
    fn js_string(text: &str) -> String {
        serde_json::to_string(text).unwrap_or_else(|_| String::from("\"\""))
    }

    /// Wrap a script body so it runs against one registered element.
    /// The body sees the element as `el` and must return `{value: ...}`;
    /// a missing or disconnected element yields `null`.
    fn element_script(handle: u64, body: &str) -> String {
        format!(
            "(function() {{ \
               const reg = window.__scribeRegistry = window.__scribeRegistry || []; \
               const el = reg[{handle}]; \
               if (!el || !el.isConnected) {{ return null; }} \
               {body} \
             }})()"
        )
    }

    /// Evaluate an element-scoped script and unwrap its `{value}` payload,
    /// mapping the `null` sentinel to `ElementDetached`.
    async fn element_value(&self, tab: &Arc<Tab>, script: &str) -> Result<Value> {
        let result = self.execute_script(tab, script).await?;
        if result.is_null() {
            return Err(ScribeError::ElementDetached);
        }
        Ok(result.get("value").cloned().unwrap_or(Value::Null))
    }

    fn finder_script(by: By, selector: &str) -> String {
        let selector = Self::js_string(selector);
        let collect = match by {
            By::Css => format!(
                "document.querySelectorAll({selector}).forEach(function(el) {{ \
                   out.push(reg.push(el) - 1); \
                 }});"
            ),
            By::TagName => format!(
                "const found = document.getElementsByTagName({selector}); \
                 for (let i = 0; i < found.length; i++) {{ \
                   out.push(reg.push(found[i]) - 1); \
                 }}"
            ),
            By::XPath => format!(
                "const found = document.evaluate({selector}, document, null, \
                   XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 for (let i = 0; i < found.snapshotLength; i++) {{ \
                   const node = found.snapshotItem(i); \
                   if (node && node.nodeType === 1) {{ out.push(reg.push(node) - 1); }} \
                 }}"
            ),
        };
        format!(
            "(function() {{ \
               const reg = window.__scribeRegistry = window.__scribeRegistry || []; \
               const out = []; \
               {collect} \
               return out; \
             }})()"
        )
    }
}

impl Default for ChromeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserTrait for ChromeBrowser {
    type TabHandle = Arc<Tab>;
    type ElementHandle = u64;

    async fn launch(&mut self, config: &ScrapeConfig) -> Result<()> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.browser.viewport.width, config.browser.viewport.height
        );
        let user_agent_arg = config
            .browser
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={ua}"));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new(&window_size_arg),
        ];
        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }
        for arg in &config.browser.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.browser.headless)
            .args(args)
            .build()
            .map_err(|e| ScribeError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| ScribeError::LaunchFailed(e.to_string()))?;
        self.browser = Some(browser);
        Ok(())
    }

    async fn new_tab(&self) -> Result<Self::TabHandle> {
        let browser = self.browser.as_ref().ok_or(ScribeError::BrowserNotLaunched)?;
        browser
            .new_tab()
            .map_err(|e| ScribeError::TabCreationFailed(e.to_string()))
    }

    async fn navigate(&self, tab: &Self::TabHandle, url: &str) -> Result<()> {
        tab.navigate_to(url)
            .map_err(|e| ScribeError::NavigationFailed(e.to_string()))?;
        tab.wait_until_navigated()
            .map_err(|e| ScribeError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn current_url(&self, tab: &Self::TabHandle) -> Result<String> {
        Ok(tab.get_url())
    }

    async fn title(&self, tab: &Self::TabHandle) -> Result<String> {
        let result = self.execute_script(tab, "document.title").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value> {
        let result = tab
            .evaluate(script, false)
            .map_err(|e| ScribeError::ScriptFailed(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
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
        tab: &Self::TabHandle,
        by: By,
        selector: &str,
    ) -> Result<Vec<Self::ElementHandle>> {
        let value = self
            .execute_script(tab, &Self::finder_script(by, selector))
            .await?;
        serde_json::from_value(value).map_err(|e| ScribeError::ScriptFailed(e.to_string()))
    }

    async fn child_elements(
        &self,
        tab: &Self::TabHandle,
        parent: &Self::ElementHandle,
    ) -> Result<Vec<Self::ElementHandle>> {
        let script = Self::element_script(
            *parent,
            "const out = []; \
             for (let i = 0; i < el.children.length; i++) { \
               out.push(reg.push(el.children[i]) - 1); \
             } \
             return {value: out};",
        );
        let value = self.element_value(tab, &script).await?;
        serde_json::from_value(value).map_err(|e| ScribeError::ScriptFailed(e.to_string()))
    }

    async fn parent_element(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<Option<Self::ElementHandle>> {
        let script = Self::element_script(
            *element,
            "const parent = el.parentElement; \
             if (!parent) { return {value: null}; } \
             return {value: reg.push(parent) - 1};",
        );
        let value = self.element_value(tab, &script).await?;
        Ok(value.as_u64())
    }

    async fn same_element(
        &self,
        tab: &Self::TabHandle,
        a: &Self::ElementHandle,
        b: &Self::ElementHandle,
    ) -> Result<bool> {
        let script = format!(
            "(function() {{ \
               const reg = window.__scribeRegistry || []; \
               return {{value: reg[{a}] !== undefined && reg[{a}] === reg[{b}]}}; \
             }})()"
        );
        let value = self.element_value(tab, &script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn tag_name(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<String> {
        let script = Self::element_script(*element, "return {value: el.tagName.toLowerCase()};");
        let value = self.element_value(tab, &script).await?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn text(&self, tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<String> {
        let script = Self::element_script(*element, "return {value: el.innerText || ''};");
        let value = self.element_value(tab, &script).await?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn attribute(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
        name: &str,
    ) -> Result<Option<String>> {
        let name = Self::js_string(name);
        let script = Self::element_script(
            *element,
            &format!("return {{value: el.getAttribute({name})}};"),
        );
        let value = self.element_value(tab, &script).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn attributes(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<HashMap<String, String>> {
        let script = Self::element_script(
            *element,
            "const items = {}; \
             for (let i = 0; i < el.attributes.length; ++i) { \
               items[el.attributes[i].name] = el.attributes[i].value; \
             } \
             return {value: items};",
        );
        let value = self.element_value(tab, &script).await?;
        serde_json::from_value(value).map_err(|e| ScribeError::FieldExtraction(e.to_string()))
    }

    async fn is_displayed(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<bool> {
        let script = Self::element_script(
            *element,
            "const style = window.getComputedStyle(el); \
             const rect = el.getBoundingClientRect(); \
             return {value: style.display !== 'none' && style.visibility !== 'hidden' \
                     && rect.width > 0 && rect.height > 0};",
        );
        let value = self.element_value(tab, &script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<bool> {
        let script = Self::element_script(*element, "return {value: !el.disabled};");
        let value = self.element_value(tab, &script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn location(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<Point> {
        let script = Self::element_script(
            *element,
            "const rect = el.getBoundingClientRect(); \
             return {value: {x: Math.round(rect.left + window.scrollX), \
                             y: Math.round(rect.top + window.scrollY)}};",
        );
        let value = self.element_value(tab, &script).await?;
        serde_json::from_value(value).map_err(|e| ScribeError::FieldExtraction(e.to_string()))
    }

    async fn size(&self, tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<Size> {
        let script = Self::element_script(
            *element,
            "const rect = el.getBoundingClientRect(); \
             return {value: {width: Math.round(rect.width), \
                             height: Math.round(rect.height)}};",
        );
        let value = self.element_value(tab, &script).await?;
        serde_json::from_value(value).map_err(|e| ScribeError::FieldExtraction(e.to_string()))
    }

    async fn clear(&self, tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<()> {
        let script = Self::element_script(
            *element,
            "el.focus(); \
             el.value = ''; \
             el.dispatchEvent(new Event('input', {bubbles: true})); \
             el.dispatchEvent(new Event('change', {bubbles: true})); \
             return {value: true};",
        );
        self.element_value(tab, &script).await?;
        Ok(())
    }

    async fn send_keys(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
        text: &str,
    ) -> Result<()> {
        let text = Self::js_string(text);
        let script = Self::element_script(
            *element,
            &format!(
                "el.focus(); \
                 el.value = (el.value || '') + {text}; \
                 el.dispatchEvent(new Event('input', {{bubbles: true}})); \
                 el.dispatchEvent(new Event('change', {{bubbles: true}})); \
                 return {{value: true}};"
            ),
        );
        self.element_value(tab, &script).await?;
        Ok(())
    }

    async fn press_enter(
        &self,
        tab: &Self::TabHandle,
        element: &Self::ElementHandle,
    ) -> Result<()> {
        let script = Self::element_script(
            *element,
            "const opts = {key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true}; \
             el.dispatchEvent(new KeyboardEvent('keydown', opts)); \
             el.dispatchEvent(new KeyboardEvent('keyup', opts)); \
             if (el.form) { el.form.submit(); } \
             return {value: true};",
        );
        self.element_value(tab, &script).await?;
        Ok(())
    }

    async fn click(&self, tab: &Self::TabHandle, element: &Self::ElementHandle) -> Result<()> {
        let script = Self::element_script(
            *element,
            "el.scrollIntoView({block: 'center'}); \
             el.click(); \
             return {value: true};",
        );
        self.element_value(tab, &script).await?;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.browser.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        self.browser = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(ChromeBrowser::js_string("a'b\"c"), r#""a'b\"c""#);
    }

    #[test]
    fn finder_script_embeds_selector_literally() {
        let script = ChromeBrowser::finder_script(By::Css, "input[name='q']");
        assert!(script.contains(r#"querySelectorAll("input[name='q']")"#));

        let script = ChromeBrowser::finder_script(By::XPath, "//body");
        assert!(script.contains("document.evaluate(\"//body\""));
    }

    #[test]
    fn element_script_guards_against_detached_nodes() {
        let script = ChromeBrowser::element_script(3, "return {value: 1};");
        assert!(script.contains("reg[3]"));
        assert!(script.contains("el.isConnected"));
        assert!(script.contains("return null;"));
    }
}
