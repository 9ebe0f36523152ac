//! 页面内容提取工具：get_current_url / get_page_content / extract_text_by_selector / find_elements / extract_links

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::browser::Browser;
use crate::tools::{arg_str, ParamKind, ParamSpec, Tool};

/// 页面文本预览的最大字符数
const TEXT_PREVIEW_CHARS: usize = 5000;
/// find_elements 最多列出的元素数
const MAX_LISTED_ELEMENTS: usize = 20;
const ELEMENT_PREVIEW_CHARS: usize = 100;
const HTML_WRAP_WIDTH: usize = 120;

fn preview(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

/// HTML 转可读文本
pub fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), HTML_WRAP_WIDTH).unwrap_or_else(|_| html.to_string())
}

pub struct GetCurrentUrlTool {
    browser: Arc<dyn Browser>,
}

impl GetCurrentUrlTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for GetCurrentUrlTool {
    fn name(&self) -> &str {
        "get_current_url"
    }

    fn description(&self) -> &str {
        "Return the URL of the current page"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        self.browser.current_url().await.map_err(|e| e.to_string())
    }
}

pub struct GetPageContentTool {
    browser: Arc<dyn Browser>,
}

impl GetPageContentTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for GetPageContentTool {
    fn name(&self) -> &str {
        "get_page_content"
    }

    fn description(&self) -> &str {
        "Read the current page: title, URL and readable text, or only the elements matching a CSS selector"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::optional(
            "selector",
            ParamKind::String,
            "CSS selector limiting the content; whole page when omitted",
        )]
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = self.browser.current_url().await.map_err(|e| e.to_string())?;

        if let Some(selector) = arg_str(&args, "selector").filter(|s| !s.trim().is_empty()) {
            let texts = self
                .browser
                .element_texts(selector)
                .await
                .map_err(|e| e.to_string())?;
            if texts.is_empty() {
                return Err(format!("No elements match selector {}", selector));
            }
            return Ok(format!(
                "URL: {}\nContent of {}:\n{}",
                url,
                selector,
                preview(&texts.join("\n"), TEXT_PREVIEW_CHARS)
            ));
        }

        let title = self.browser.title().await.map_err(|e| e.to_string())?;
        let html = self.browser.page_source().await.map_err(|e| e.to_string())?;
        if html.trim().is_empty() {
            return Err("Page source is empty".to_string());
        }
        let text = html_to_text(&html);
        Ok(format!(
            "Title: {}\nURL: {}\nSource length: {} bytes\n\n{}",
            title,
            url,
            html.len(),
            preview(&text, TEXT_PREVIEW_CHARS)
        ))
    }
}

pub struct ExtractTextTool {
    browser: Arc<dyn Browser>,
}

impl ExtractTextTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for ExtractTextTool {
    fn name(&self) -> &str {
        "extract_text_by_selector"
    }

    fn description(&self) -> &str {
        "Extract the text of the elements matching a CSS selector"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("selector", ParamKind::String, "CSS selector")]
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let selector = arg_str(&args, "selector").unwrap_or("");
        let texts = self
            .browser
            .element_texts(selector)
            .await
            .map_err(|e| e.to_string())?;
        if texts.is_empty() {
            return Err(format!("No elements match selector {}", selector));
        }
        Ok(texts.join("\n"))
    }
}

pub struct FindElementsTool {
    browser: Arc<dyn Browser>,
}

impl FindElementsTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for FindElementsTool {
    fn name(&self) -> &str {
        "find_elements"
    }

    fn description(&self) -> &str {
        "Count the elements matching a CSS selector and preview their text"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("selector", ParamKind::String, "CSS selector")]
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let selector = arg_str(&args, "selector").unwrap_or("");
        let texts = self
            .browser
            .element_texts(selector)
            .await
            .map_err(|e| e.to_string())?;
        let mut out = format!("Found {} elements matching {}", texts.len(), selector);
        for (i, t) in texts.iter().take(MAX_LISTED_ELEMENTS).enumerate() {
            out.push_str(&format!("\n[{}] {}", i + 1, preview(t, ELEMENT_PREVIEW_CHARS)));
        }
        Ok(out)
    }
}

pub struct ExtractLinksTool {
    browser: Arc<dyn Browser>,
}

impl ExtractLinksTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

/// 将 href 解析为绝对地址；忽略锚点与 javascript: 链接
fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match base {
        Some(b) => b.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

#[async_trait]
impl Tool for ExtractLinksTool {
    fn name(&self) -> &str {
        "extract_links"
    }

    fn description(&self) -> &str {
        "List the links on the current page as text -> absolute URL"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        let current = self.browser.current_url().await.map_err(|e| e.to_string())?;
        let base = Url::parse(&current).ok();
        let links = self.browser.links().await.map_err(|e| e.to_string())?;
        let resolved: Vec<String> = links
            .iter()
            .filter_map(|l| {
                resolve_href(base.as_ref(), &l.href).map(|href| {
                    let text = if l.text.is_empty() { "(no text)" } else { l.text.as_str() };
                    format!("- {} -> {}", text, href)
                })
            })
            .collect();
        Ok(format!("{} links on {}\n{}", resolved.len(), current, resolved.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{Link, MockBrowser};
    use serde_json::json;

    fn browser() -> Arc<MockBrowser> {
        Arc::new(
            MockBrowser::new()
                .with_page(
                    "https://news.test/",
                    "News",
                    "<html><body><h1>Headlines</h1><p>Rust 2.0 released</p></body></html>",
                )
                .with_elements("https://news.test/", "h2.title", &["First", "Second"])
                .with_links(
                    "https://news.test/",
                    vec![
                        Link { text: "About".into(), href: "/about".into() },
                        Link { text: "".into(), href: "https://other.test/x".into() },
                        Link { text: "Top".into(), href: "#top".into() },
                    ],
                )
                .starting_at("https://news.test/"),
        )
    }

    #[tokio::test]
    async fn test_page_content_whole_page() {
        let tool = GetPageContentTool::new(browser());
        let out = tool.execute(json!({})).await.unwrap();
        assert!(out.starts_with("Title: News\nURL: https://news.test/"));
        assert!(out.contains("Rust 2.0 released"));
    }

    #[tokio::test]
    async fn test_page_content_with_selector() {
        let tool = GetPageContentTool::new(browser());
        let out = tool.execute(json!({"selector": "h2.title"})).await.unwrap();
        assert!(out.contains("First\nSecond"));
        let err = tool.execute(json!({"selector": ".none"})).await.unwrap_err();
        assert!(err.contains("No elements"));
    }

    #[tokio::test]
    async fn test_find_elements_counts() {
        let tool = FindElementsTool::new(browser());
        let out = tool.execute(json!({"selector": "h2.title"})).await.unwrap();
        assert!(out.starts_with("Found 2 elements matching h2.title"));
        assert!(out.contains("[2] Second"));
    }

    #[tokio::test]
    async fn test_links_are_resolved() {
        let tool = ExtractLinksTool::new(browser());
        let out = tool.execute(json!({})).await.unwrap();
        assert!(out.starts_with("2 links on https://news.test/"));
        assert!(out.contains("- About -> https://news.test/about"));
        assert!(out.contains("- (no text) -> https://other.test/x"));
        assert!(!out.contains("#top"));
    }
}
