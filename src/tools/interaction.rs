//! 页面交互工具：click_element / type_text / scroll_page

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::browser::{Browser, ScrollDirection, Selector, SelectorKind};
use crate::tools::{arg_str, ParamKind, ParamSpec, Tool};

fn selector_from(args: &Value) -> Selector {
    let kind = arg_str(args, "selector_type")
        .map(SelectorKind::parse)
        .unwrap_or(SelectorKind::Css);
    Selector::new(arg_str(args, "selector").unwrap_or(""), kind)
}

fn selector_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec::required("selector", ParamKind::String, "element selector"),
        ParamSpec::optional(
            "selector_type",
            ParamKind::String,
            "\"css\" (default) or \"xpath\"",
        ),
    ]
}

pub struct ClickElementTool {
    browser: Arc<dyn Browser>,
}

impl ClickElementTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for ClickElementTool {
    fn name(&self) -> &str {
        "click_element"
    }

    fn description(&self) -> &str {
        "Click an element on the page"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        selector_params()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let selector = selector_from(&args);
        self.browser
            .click(&selector)
            .await
            .map_err(|e| e.to_string())?;
        let current = self.browser.current_url().await.map_err(|e| e.to_string())?;
        Ok(format!("Clicked {}; current URL: {}", selector.value, current))
    }
}

pub struct TypeTextTool {
    browser: Arc<dyn Browser>,
}

impl TypeTextTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for TypeTextTool {
    fn name(&self) -> &str {
        "type_text"
    }

    fn description(&self) -> &str {
        "Type text into an input element"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        let mut params = selector_params();
        params.insert(
            1,
            ParamSpec::required("text", ParamKind::String, "text to type"),
        );
        params
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let selector = selector_from(&args);
        let text = arg_str(&args, "text").unwrap_or("");
        self.browser
            .type_text(&selector, text)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("Typed {} characters into {}", text.chars().count(), selector.value))
    }
}

pub struct ScrollPageTool {
    browser: Arc<dyn Browser>,
}

impl ScrollPageTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for ScrollPageTool {
    fn name(&self) -> &str {
        "scroll_page"
    }

    fn description(&self) -> &str {
        "Scroll the page by a number of pixels, or to the bottom/top when pixels is omitted"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::optional("direction", ParamKind::String, "\"down\" (default) or \"up\""),
            ParamSpec::optional("pixels", ParamKind::Integer, "distance in pixels"),
        ]
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let raw = arg_str(&args, "direction").unwrap_or("down");
        let direction = ScrollDirection::parse(raw)
            .ok_or_else(|| format!("Invalid direction '{}', expected 'down' or 'up'", raw))?;
        let pixels = match args.get("pixels").filter(|v| !v.is_null()) {
            Some(v) => Some(
                v.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| format!("Invalid pixels: {}", v))?,
            ),
            None => None,
        };
        self.browser
            .scroll(direction, pixels)
            .await
            .map_err(|e| e.to_string())?;
        Ok(match pixels {
            Some(px) => format!("Scrolled {} {} pixels", direction.as_str(), px),
            None if direction == ScrollDirection::Down => "Scrolled to the bottom of the page".to_string(),
            None => "Scrolled to the top of the page".to_string(),
        })
    }
}
