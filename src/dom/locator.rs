use crate::core::BrowserTrait;
use crate::errors::{Result, ScribeError};

/// Hard ceiling on ancestor hops so a detached or cyclic walk cannot spin.
const MAX_ANCESTORS: usize = 64;

/// Derive a stable XPath for `element` by walking its ancestors.
///
/// An element with a non-empty `id` resolves to `//*[@id='...']`; the
/// document body resolves to `/html/body`; anything else gets a 1-based
/// index among same-tag siblings and recurses on its parent. A walk that
/// reaches neither base case fails with `LocatorSynthesis`.
pub async fn xpath_for<B: BrowserTrait>(
    browser: &B,
    tab: &B::TabHandle,
    element: &B::ElementHandle,
) -> Result<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut current = element.clone();

    for _ in 0..MAX_ANCESTORS {
        if let Some(id) = browser.attribute(tab, &current, "id").await? {
            if !id.is_empty() {
                let mut path = format!("//*[@id='{id}']");
                for segment in segments.iter().rev() {
                    path.push_str(segment);
                }
                return Ok(path);
            }
        }

        let tag = browser.tag_name(tab, &current).await?.to_lowercase();
        if tag == "body" {
            let mut path = String::from("/html/body");
            for segment in segments.iter().rev() {
                path.push_str(segment);
            }
            return Ok(path);
        }

        let parent = browser
            .parent_element(tab, &current)
            .await?
            .ok_or_else(|| {
                ScribeError::LocatorSynthesis(format!("<{tag}> has no element parent"))
            })?;

        let siblings = browser.child_elements(tab, &parent).await?;
        let mut same_tag_before = 0usize;
        let mut found = false;
        for sibling in &siblings {
            if browser.same_element(tab, sibling, &current).await? {
                found = true;
                break;
            }
            if browser
                .tag_name(tab, sibling)
                .await?
                .eq_ignore_ascii_case(&tag)
            {
                same_tag_before += 1;
            }
        }
        if !found {
            return Err(ScribeError::LocatorSynthesis(format!(
                "<{tag}> is not among its parent's children"
            )));
        }

        segments.push(format!("/{}[{}]", tag, same_tag_before + 1));
        current = parent;
    }

    Err(ScribeError::LocatorSynthesis(
        "ancestor walk exceeded depth limit".to_string(),
    ))
}

/// Derive a CSS path for `element`.
///
/// An element with a non-empty `id` resolves to `#id`; otherwise the path
/// is the chain of `tag.class1.class2` segments from `<body>` down to the
/// element, joined with `" > "`. No nth-child disambiguation is applied,
/// so the path is not guaranteed unique; callers compare snapshots against
/// this exact format.
pub async fn css_path_for<B: BrowserTrait>(
    browser: &B,
    tab: &B::TabHandle,
    element: &B::ElementHandle,
) -> Result<String> {
    if let Some(id) = browser.attribute(tab, element, "id").await? {
        if !id.is_empty() {
            return Ok(format!("#{id}"));
        }
    }

    let mut parts: Vec<String> = Vec::new();
    let mut current = element.clone();

    for _ in 0..MAX_ANCESTORS {
        let tag = browser.tag_name(tab, &current).await?.to_lowercase();
        let mut segment = tag.clone();
        if let Some(class) = browser.attribute(tab, &current, "class").await? {
            for token in class.split_whitespace() {
                segment.push('.');
                segment.push_str(token);
            }
        }
        parts.push(segment);

        if tag == "body" {
            break;
        }
        match browser.parent_element(tab, &current).await? {
            Some(parent) => current = parent,
            None => break,
        }
    }

    parts.reverse();
    Ok(parts.join(" > "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrowser, MockElement};

    fn fixture() -> MockBrowser {
        // <body>
        //   <div id="a">Hi</div>
        //   <div class="b"><span>x</span><span class="c d">y</span></div>
        // </body>
        MockBrowser::with_body(
            MockElement::new("body")
                .child(MockElement::new("div").attr("id", "a").text("Hi"))
                .child(
                    MockElement::new("div")
                        .attr("class", "b")
                        .child(MockElement::new("span").text("x"))
                        .child(MockElement::new("span").attr("class", "c d").text("y")),
                ),
        )
    }

    #[tokio::test]
    async fn xpath_prefers_element_id() {
        let browser = fixture();
        let tab = browser.new_tab().await.unwrap();
        let div = browser.find_element(&tab, crate::core::By::Css, "#a").await.unwrap();
        assert_eq!(xpath_for(&browser, &tab, &div).await.unwrap(), "//*[@id='a']");
    }

    #[tokio::test]
    async fn xpath_of_body_is_absolute() {
        let browser = fixture();
        let tab = browser.new_tab().await.unwrap();
        let body = browser
            .find_element(&tab, crate::core::By::TagName, "body")
            .await
            .unwrap();
        assert_eq!(xpath_for(&browser, &tab, &body).await.unwrap(), "/html/body");
    }

    #[tokio::test]
    async fn xpath_counts_same_tag_siblings() {
        let browser = fixture();
        let tab = browser.new_tab().await.unwrap();
        let spans = browser
            .find_elements(&tab, crate::core::By::TagName, "span")
            .await
            .unwrap();
        assert_eq!(
            xpath_for(&browser, &tab, &spans[0]).await.unwrap(),
            "/html/body/div[2]/span[1]"
        );
        assert_eq!(
            xpath_for(&browser, &tab, &spans[1]).await.unwrap(),
            "/html/body/div[2]/span[2]"
        );
    }

    #[tokio::test]
    async fn css_path_prefers_element_id() {
        let browser = fixture();
        let tab = browser.new_tab().await.unwrap();
        let div = browser.find_element(&tab, crate::core::By::Css, "#a").await.unwrap();
        assert_eq!(css_path_for(&browser, &tab, &div).await.unwrap(), "#a");
    }

    #[tokio::test]
    async fn css_path_chains_tags_and_classes_from_body() {
        let browser = fixture();
        let tab = browser.new_tab().await.unwrap();
        let div = browser
            .find_element(&tab, crate::core::By::Css, "div[class='b']")
            .await
            .unwrap();
        assert_eq!(
            css_path_for(&browser, &tab, &div).await.unwrap(),
            "body > div.b"
        );

        let spans = browser
            .find_elements(&tab, crate::core::By::TagName, "span")
            .await
            .unwrap();
        assert_eq!(
            css_path_for(&browser, &tab, &spans[1]).await.unwrap(),
            "body > div.b > span.c.d"
        );
    }
}
