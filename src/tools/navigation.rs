//! 导航工具：go_to_url / go_back / go_forward / search_web

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::browser::Browser;
use crate::tools::{arg_str, ParamKind, ParamSpec, Tool};

/// 补全协议并校验 URL；缺少协议时默认 https
pub fn normalize_url(raw: &str) -> Result<Url, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Missing url".to_string());
    }
    let candidate = if raw.contains("://") || raw.starts_with("about:") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let url = Url::parse(&candidate).map_err(|e| format!("Invalid url '{}': {}", raw, e))?;
    match url.scheme() {
        "http" | "https" | "about" | "file" => Ok(url),
        other => Err(format!("Unsupported url scheme: {}", other)),
    }
}

pub struct GoToUrlTool {
    browser: Arc<dyn Browser>,
}

impl GoToUrlTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for GoToUrlTool {
    fn name(&self) -> &str {
        "go_to_url"
    }

    fn description(&self) -> &str {
        "Navigate the browser to the given URL"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "url",
            ParamKind::String,
            "address to open, e.g. https://example.com",
        )]
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = normalize_url(arg_str(&args, "url").unwrap_or(""))?;
        self.browser
            .navigate(url.as_str())
            .await
            .map_err(|e| e.to_string())?;
        let current = self.browser.current_url().await.map_err(|e| e.to_string())?;
        Ok(format!("Navigated to {}; current URL: {}", url, current))
    }
}

pub struct GoBackTool {
    browser: Arc<dyn Browser>,
}

impl GoBackTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for GoBackTool {
    fn name(&self) -> &str {
        "go_back"
    }

    fn description(&self) -> &str {
        "Go to the previous page in browser history"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        self.browser.go_back().await.map_err(|e| e.to_string())?;
        let current = self.browser.current_url().await.map_err(|e| e.to_string())?;
        Ok(format!("Went back; current URL: {}", current))
    }
}

pub struct GoForwardTool {
    browser: Arc<dyn Browser>,
}

impl GoForwardTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for GoForwardTool {
    fn name(&self) -> &str {
        "go_forward"
    }

    fn description(&self) -> &str {
        "Go to the next page in browser history"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        self.browser.go_forward().await.map_err(|e| e.to_string())?;
        let current = self.browser.current_url().await.map_err(|e| e.to_string())?;
        Ok(format!("Went forward; current URL: {}", current))
    }
}

/// 打开搜索引擎结果页：查询词作为 `q` 参数
pub struct SearchWebTool {
    browser: Arc<dyn Browser>,
    engine: String,
}

impl SearchWebTool {
    pub fn new(browser: Arc<dyn Browser>, engine: impl Into<String>) -> Self {
        Self {
            browser,
            engine: engine.into(),
        }
    }

    fn search_url(&self, query: &str) -> Result<Url, String> {
        Url::parse_with_params(&self.engine, &[("q", query)])
            .map_err(|e| format!("Invalid search engine url '{}': {}", self.engine, e))
    }
}

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Open the search engine result page for a query"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("query", ParamKind::String, "search keywords")]
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = arg_str(&args, "query").unwrap_or("").trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        let url = self.search_url(query)?;
        self.browser
            .navigate(url.as_str())
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("Searched for \"{}\"; current URL: {}", query, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowser;
    use serde_json::json;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("example.com").unwrap().as_str(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("http://a.test/x").unwrap().as_str(),
            "http://a.test/x"
        );
        assert!(normalize_url("  ").is_err());
        assert!(normalize_url("ftp://files.test").is_err());
    }

    #[tokio::test]
    async fn test_go_to_url_then_back() {
        let browser = Arc::new(MockBrowser::new());
        let go = GoToUrlTool::new(browser.clone());
        go.execute(json!({"url": "https://a.test"})).await.unwrap();
        let out = go.execute(json!({"url": "b.test"})).await.unwrap();
        assert!(out.ends_with("current URL: https://b.test/"));
        let back = GoBackTool::new(browser.clone());
        let out = back.execute(json!({})).await.unwrap();
        assert_eq!(out, "Went back; current URL: https://a.test/");
    }

    #[tokio::test]
    async fn test_search_encodes_query() {
        let browser = Arc::new(MockBrowser::new());
        let tool = SearchWebTool::new(browser.clone(), "https://search.test/search");
        tool.execute(json!({"query": "rust async & tokio"})).await.unwrap();
        assert_eq!(
            browser.current_url().await.unwrap(),
            "https://search.test/search?q=rust+async+%26+tokio"
        );
    }
}
