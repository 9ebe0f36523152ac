//! 执行器层：受控浏览器的抽象
//!
//! Orchestrator 与各工具只通过 `Browser` trait 访问浏览器；会话在启动时构造一次，
//! 以 `Arc<dyn Browser>` 注入到工具、人工接管协议与 Orchestrator，不存在全局句柄。
//! - **mock**: 内存模拟浏览器（测试、演练）
//! - **chrome**: Headless Chrome 实现（feature "browser"）

#[cfg(feature = "browser")]
pub mod chrome;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "browser")]
pub use chrome::ChromeBrowser;
pub use mock::MockBrowser;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("{op} failed: {message}")]
    Command { op: &'static str, message: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Browser session closed")]
    Closed,
}

/// 选择器类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Css,
    XPath,
}

impl SelectorKind {
    /// 非 "xpath" 的输入一律按 CSS 处理
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("xpath") {
            SelectorKind::XPath
        } else {
            SelectorKind::Css
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    pub value: String,
    pub kind: SelectorKind,
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: SelectorKind::Css,
        }
    }

    pub fn new(value: impl Into<String>, kind: SelectorKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollDirection {
    Down,
    Up,
}

impl ScrollDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "down" => Some(ScrollDirection::Down),
            "up" => Some(ScrollDirection::Up),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Down => "down",
            ScrollDirection::Up => "up",
        }
    }
}

/// 页面中的链接（href 为原始属性值，未解析为绝对地址）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// 受控浏览器：位置/标题查询、导航、元素交互、截图、关闭
#[async_trait]
pub trait Browser: Send + Sync {
    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn go_back(&self) -> Result<(), BrowserError>;

    async fn go_forward(&self) -> Result<(), BrowserError>;

    /// 当前页面 HTML 源码
    async fn page_source(&self) -> Result<String, BrowserError>;

    /// 匹配 CSS 选择器的所有元素的可见文本
    async fn element_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError>;

    async fn links(&self) -> Result<Vec<Link>, BrowserError>;

    async fn click(&self, selector: &Selector) -> Result<(), BrowserError>;

    async fn type_text(&self, selector: &Selector, text: &str) -> Result<(), BrowserError>;

    /// `pixels` 为 None 时滚动到底部（down）或顶部（up）
    async fn scroll(
        &self,
        direction: ScrollDirection,
        pixels: Option<u32>,
    ) -> Result<(), BrowserError>;

    /// PNG 截图字节
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    /// 关闭会话；重复调用应当无副作用
    async fn close(&self) -> Result<(), BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_kind_parse() {
        assert_eq!(SelectorKind::parse("XPath"), SelectorKind::XPath);
        assert_eq!(SelectorKind::parse("css"), SelectorKind::Css);
        assert_eq!(SelectorKind::parse("whatever"), SelectorKind::Css);
    }

    #[test]
    fn test_scroll_direction_parse() {
        assert_eq!(ScrollDirection::parse(" Down "), Some(ScrollDirection::Down));
        assert_eq!(ScrollDirection::parse("up"), Some(ScrollDirection::Up));
        assert_eq!(ScrollDirection::parse("left"), None);
    }
}
