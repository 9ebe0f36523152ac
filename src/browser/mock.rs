//! Mock 浏览器（用于测试，无需 Chrome）
//!
//! 内存中维护历史栈、页面表（URL -> 标题/HTML/元素/链接）与交互记录；
//! 未登记的 URL 导航后标题为空页面。

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::browser::{Browser, BrowserError, Link, ScrollDirection, Selector};

/// 单个模拟页面
#[derive(Clone, Debug, Default)]
pub struct MockPage {
    pub title: String,
    pub html: String,
    pub elements: HashMap<String, Vec<String>>,
    pub links: Vec<Link>,
}

#[derive(Debug, Default)]
struct MockState {
    history: Vec<String>,
    index: usize,
    pages: HashMap<String, MockPage>,
    clicks: Vec<String>,
    typed: Vec<(String, String)>,
    scroll_y: i64,
    screenshots: usize,
    closed: bool,
}

impl MockState {
    fn current(&self) -> &str {
        self.history
            .get(self.index)
            .map(|s| s.as_str())
            .unwrap_or("about:blank")
    }

    fn page(&self) -> Option<&MockPage> {
        self.pages.get(self.current())
    }
}

/// 模拟浏览器：可预置页面，并记录点击/输入/滚动，供断言使用
#[derive(Debug, Default)]
pub struct MockBrowser {
    state: Mutex<MockState>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置页面（标题 + HTML）
    pub fn with_page(self, url: &str, title: &str, html: &str) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.pages.insert(
                url.to_string(),
                MockPage {
                    title: title.to_string(),
                    html: html.to_string(),
                    ..MockPage::default()
                },
            );
        }
        self
    }

    /// 为已登记页面预置选择器匹配文本
    pub fn with_elements(self, url: &str, selector: &str, texts: &[&str]) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.pages.entry(url.to_string()).or_default().elements.insert(
                selector.to_string(),
                texts.iter().map(|t| t.to_string()).collect(),
            );
        }
        self
    }

    pub fn with_links(self, url: &str, links: Vec<Link>) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.pages.entry(url.to_string()).or_default().links = links;
        }
        self
    }

    /// 以某个 URL 作为起始页
    pub fn starting_at(self, url: &str) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.history = vec![url.to_string()];
            s.index = 0;
        }
        self
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().map(|s| s.clicks.clone()).unwrap_or_default()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().map(|s| s.typed.clone()).unwrap_or_default()
    }

    pub fn scroll_y(&self) -> i64 {
        self.state.lock().map(|s| s.scroll_y).unwrap_or_default()
    }

    pub fn screenshot_count(&self) -> usize {
        self.state.lock().map(|s| s.screenshots).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> Result<T, BrowserError>) -> Result<T, BrowserError> {
        let mut guard = self.state.lock().map_err(|e| BrowserError::Command {
            op: "lock",
            message: e.to_string(),
        })?;
        if guard.closed {
            return Err(BrowserError::Closed);
        }
        f(&mut guard)
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn current_url(&self) -> Result<String, BrowserError> {
        self.with_state(|s| Ok(s.current().to_string()))
    }

    async fn title(&self) -> Result<String, BrowserError> {
        self.with_state(|s| Ok(s.page().map(|p| p.title.clone()).unwrap_or_default()))
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.with_state(|s| {
            if !s.history.is_empty() {
                let keep = s.index + 1;
                s.history.truncate(keep);
            }
            s.history.push(url.to_string());
            s.index = s.history.len() - 1;
            s.scroll_y = 0;
            Ok(())
        })
    }

    async fn go_back(&self) -> Result<(), BrowserError> {
        self.with_state(|s| {
            if s.index > 0 {
                s.index -= 1;
            }
            Ok(())
        })
    }

    async fn go_forward(&self) -> Result<(), BrowserError> {
        self.with_state(|s| {
            if s.index + 1 < s.history.len() {
                s.index += 1;
            }
            Ok(())
        })
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.with_state(|s| Ok(s.page().map(|p| p.html.clone()).unwrap_or_default()))
    }

    async fn element_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        self.with_state(|s| {
            Ok(s.page()
                .and_then(|p| p.elements.get(selector).cloned())
                .unwrap_or_default())
        })
    }

    async fn links(&self) -> Result<Vec<Link>, BrowserError> {
        self.with_state(|s| Ok(s.page().map(|p| p.links.clone()).unwrap_or_default()))
    }

    async fn click(&self, selector: &Selector) -> Result<(), BrowserError> {
        self.with_state(|s| {
            let found = s
                .page()
                .map(|p| p.elements.contains_key(&selector.value))
                .unwrap_or(false);
            if !found {
                return Err(BrowserError::ElementNotFound(selector.value.clone()));
            }
            s.clicks.push(selector.value.clone());
            Ok(())
        })
    }

    async fn type_text(&self, selector: &Selector, text: &str) -> Result<(), BrowserError> {
        self.with_state(|s| {
            let found = s
                .page()
                .map(|p| p.elements.contains_key(&selector.value))
                .unwrap_or(false);
            if !found {
                return Err(BrowserError::ElementNotFound(selector.value.clone()));
            }
            s.typed.push((selector.value.clone(), text.to_string()));
            Ok(())
        })
    }

    async fn scroll(
        &self,
        direction: ScrollDirection,
        pixels: Option<u32>,
    ) -> Result<(), BrowserError> {
        self.with_state(|s| {
            match (direction, pixels) {
                (ScrollDirection::Down, Some(px)) => s.scroll_y = s.scroll_y.saturating_add(i64::from(px)),
                (ScrollDirection::Up, Some(px)) => s.scroll_y = (s.scroll_y - i64::from(px)).max(0),
                (ScrollDirection::Down, None) => s.scroll_y = i64::MAX,
                (ScrollDirection::Up, None) => s.scroll_y = 0,
            }
            Ok(())
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.with_state(|s| {
            s.screenshots += 1;
            // PNG 文件头，足够让调用方写出一个可识别的文件
            Ok(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
        })
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut guard = self.state.lock().map_err(|e| BrowserError::Command {
            op: "lock",
            message: e.to_string(),
        })?;
        guard.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_navigation() {
        let browser = MockBrowser::new().with_page("https://a.test", "A", "<p>a</p>");
        assert_eq!(browser.current_url().await.unwrap(), "about:blank");
        browser.navigate("https://a.test").await.unwrap();
        browser.navigate("https://b.test").await.unwrap();
        browser.go_back().await.unwrap();
        assert_eq!(browser.current_url().await.unwrap(), "https://a.test");
        assert_eq!(browser.title().await.unwrap(), "A");
        browser.go_forward().await.unwrap();
        assert_eq!(browser.current_url().await.unwrap(), "https://b.test");
    }

    #[tokio::test]
    async fn test_closed_session_rejects_calls() {
        let browser = MockBrowser::new();
        browser.close().await.unwrap();
        browser.close().await.unwrap();
        assert!(browser.is_closed());
        assert!(matches!(
            browser.current_url().await,
            Err(BrowserError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_scroll_past_bottom_saturates() {
        let browser = MockBrowser::new().starting_at("https://a.test");
        browser.scroll(ScrollDirection::Down, None).await.unwrap();
        browser.scroll(ScrollDirection::Down, Some(10)).await.unwrap();
        assert_eq!(browser.scroll_y(), i64::MAX);
        browser.scroll(ScrollDirection::Up, Some(10)).await.unwrap();
        assert_eq!(browser.scroll_y(), i64::MAX - 10);
    }

    #[tokio::test]
    async fn test_click_unknown_element() {
        let browser = MockBrowser::new().starting_at("https://a.test");
        let err = browser.click(&Selector::css("#missing")).await.unwrap_err();
        assert!(matches!(err, BrowserError::ElementNotFound(_)));
    }
}
