//! Chrome 浏览器：使用 headless_chrome 控制本地 Chrome/Chromium
//!
//! 需启用 feature "browser" 且系统已安装 Chrome/Chromium。
//! headless_chrome 为同步 API，所有调用经 `spawn_blocking` 执行；会话持有单个 Tab。

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser as ChromeProcess, LaunchOptions, Tab};

use crate::browser::{Browser, BrowserError, Link, ScrollDirection, Selector, SelectorKind};
use crate::config::BrowserSection;

/// history.back/forward 之后等待页面切换的时间
const HISTORY_SETTLE_MS: u64 = 500;

const LINKS_JS: &str = r#"
JSON.stringify(Array.from(document.querySelectorAll('a[href]')).map(a => ({
    text: (a.innerText || a.textContent || '').trim().substring(0, 120),
    href: a.getAttribute('href')
})))
"#;

/// Chrome 会话：进程句柄（关闭时置 None 触发退出）+ 当前 Tab
pub struct ChromeBrowser {
    process: Mutex<Option<ChromeProcess>>,
    tab: Arc<Tab>,
}

impl ChromeBrowser {
    /// 启动 Chrome 并打开一个 Tab
    pub async fn launch(cfg: &BrowserSection) -> Result<Self, BrowserError> {
        let headless = cfg.headless;
        let window = (cfg.window_width, cfg.window_height);
        let chrome_path = cfg.chrome_path.clone().map(PathBuf::from);
        let user_agent = cfg.user_agent.clone();
        let nav_timeout = Duration::from_secs(cfg.navigation_timeout_secs);

        tracing::info!(headless, ?chrome_path, "launching chrome");

        tokio::task::spawn_blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(headless)
                .window_size(Some(window))
                .path(chrome_path)
                .idle_browser_timeout(Duration::from_secs(3600))
                .build()
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            let process =
                ChromeProcess::new(options).map_err(|e| BrowserError::Launch(e.to_string()))?;
            let tab = process
                .new_tab()
                .map_err(|e| BrowserError::Launch(format!("new tab: {}", e)))?;
            tab.set_default_timeout(nav_timeout);
            if let Some(ua) = user_agent.as_deref() {
                tab.set_user_agent(ua, None, None)
                    .map_err(|e| BrowserError::Launch(format!("user agent: {}", e)))?;
            }
            Ok(Self {
                process: Mutex::new(Some(process)),
                tab,
            })
        })
        .await
        .map_err(|e| BrowserError::Launch(format!("task join: {}", e)))?
    }

    fn ensure_open(&self) -> Result<(), BrowserError> {
        let guard = self.process.lock().map_err(|e| BrowserError::Command {
            op: "lock",
            message: e.to_string(),
        })?;
        if guard.is_none() {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }

    /// 在阻塞线程池中对 Tab 执行一次同步操作
    async fn with_tab<T, F>(&self, op: &'static str, f: F) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, String> + Send + 'static,
    {
        self.ensure_open()?;
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| BrowserError::Command {
                op,
                message: format!("task join: {}", e),
            })?
            .map_err(|message| BrowserError::Command { op, message })
    }

    async fn evaluate(&self, op: &'static str, js: String) -> Result<Option<serde_json::Value>, BrowserError> {
        self.with_tab(op, move |tab| {
            tab.evaluate(&js, false)
                .map(|obj| obj.value)
                .map_err(|e| e.to_string())
        })
        .await
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn current_url(&self) -> Result<String, BrowserError> {
        self.with_tab("current_url", |tab| Ok(tab.get_url())).await
    }

    async fn title(&self) -> Result<String, BrowserError> {
        self.with_tab("title", |tab| tab.get_title().map_err(|e| e.to_string()))
            .await
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let url = url.to_string();
        tracing::info!(url = %url, "browser navigate");
        self.with_tab("navigate", move |tab| {
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await
    }

    async fn go_back(&self) -> Result<(), BrowserError> {
        self.evaluate("go_back", "window.history.back()".to_string()).await?;
        tokio::time::sleep(Duration::from_millis(HISTORY_SETTLE_MS)).await;
        Ok(())
    }

    async fn go_forward(&self) -> Result<(), BrowserError> {
        self.evaluate("go_forward", "window.history.forward()".to_string())
            .await?;
        tokio::time::sleep(Duration::from_millis(HISTORY_SETTLE_MS)).await;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.with_tab("page_source", |tab| tab.get_content().map_err(|e| e.to_string()))
            .await
    }

    async fn element_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let selector = selector.to_string();
        self.with_tab("element_texts", move |tab| {
            // 无匹配时 find_elements 返回错误，这里视为空结果
            let elements = match tab.find_elements(&selector) {
                Ok(els) => els,
                Err(_) => return Ok(Vec::new()),
            };
            elements
                .iter()
                .map(|el| el.get_inner_text().map_err(|e| e.to_string()))
                .collect()
        })
        .await
    }

    async fn links(&self) -> Result<Vec<Link>, BrowserError> {
        let value = self.evaluate("links", LINKS_JS.to_string()).await?;
        let raw = value
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or("[]")
            .to_string();
        serde_json::from_str(&raw).map_err(|e| BrowserError::Command {
            op: "links",
            message: e.to_string(),
        })
    }

    async fn click(&self, selector: &Selector) -> Result<(), BrowserError> {
        let selector = selector.clone();
        self.with_tab("click", move |tab| {
            let element = match selector.kind {
                SelectorKind::Css => tab.wait_for_element(&selector.value),
                SelectorKind::XPath => tab.wait_for_xpath(&selector.value),
            }
            .map_err(|e| format!("element {} not found: {}", selector.value, e))?;
            element.scroll_into_view().map_err(|e| e.to_string())?;
            element.click().map(|_| ()).map_err(|e| e.to_string())
        })
        .await
    }

    async fn type_text(&self, selector: &Selector, text: &str) -> Result<(), BrowserError> {
        let selector = selector.clone();
        let text = text.to_string();
        self.with_tab("type_text", move |tab| {
            let element = match selector.kind {
                SelectorKind::Css => tab.wait_for_element(&selector.value),
                SelectorKind::XPath => tab.wait_for_xpath(&selector.value),
            }
            .map_err(|e| format!("element {} not found: {}", selector.value, e))?;
            element.click().map_err(|e| e.to_string())?;
            element.type_into(&text).map(|_| ()).map_err(|e| e.to_string())
        })
        .await
    }

    async fn scroll(
        &self,
        direction: ScrollDirection,
        pixels: Option<u32>,
    ) -> Result<(), BrowserError> {
        let js = match (direction, pixels) {
            (ScrollDirection::Down, Some(px)) => format!("window.scrollBy(0, {})", px),
            (ScrollDirection::Up, Some(px)) => format!("window.scrollBy(0, -{})", px),
            (ScrollDirection::Down, None) => {
                "window.scrollTo(0, document.body.scrollHeight)".to_string()
            }
            (ScrollDirection::Up, None) => "window.scrollTo(0, 0)".to_string(),
        };
        self.evaluate("scroll", js).await.map(|_| ())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.with_tab("screenshot", |tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| e.to_string())
        })
        .await
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let process = self
            .process
            .lock()
            .map_err(|e| BrowserError::Command {
                op: "close",
                message: e.to_string(),
            })?
            .take();
        if let Some(process) = process {
            tracing::info!("closing chrome session");
            // Drop 时 headless_chrome 结束 Chrome 进程
            tokio::task::spawn_blocking(move || drop(process))
                .await
                .map_err(|e| BrowserError::Command {
                    op: "close",
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }
}
