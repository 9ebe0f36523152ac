//! 能力层：Tool trait、注册表、执行器与浏览器能力集
//!
//! 每个浏览器能力在构造时拿到同一个 `Arc<dyn Browser>`；`register_browser_tools` 以固定顺序注册，
//! 保证每次生成的工具描述一致。

pub mod executor;
pub mod extraction;
pub mod interaction;
pub mod navigation;
pub mod registry;
pub mod schema;
pub mod screenshot;

use std::sync::Arc;

use serde_json::Value;

use crate::browser::Browser;
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::handoff::{HandoffProtocol, RequestHumanTool};

pub use executor::{
    args_preview, audit_record, emit_audit, truncate_result, Dispatch, DispatchStatus, ToolExecutor,
    MAX_RESULT_CHARS, TRUNCATION_MARKER,
};
pub use extraction::{ExtractLinksTool, ExtractTextTool, FindElementsTool, GetCurrentUrlTool, GetPageContentTool};
pub use interaction::{ClickElementTool, ScrollPageTool, TypeTextTool};
pub use navigation::{GoBackTool, GoForwardTool, GoToUrlTool, SearchWebTool};
pub use registry::{FnTool, ParamKind, ParamSpec, Tool, ToolDescriptor, ToolRegistry};
pub use schema::tool_call_schema_json;
pub use screenshot::{save_screenshot, TakeScreenshotTool};

/// 读取字符串参数
pub(crate) fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

/// 注册标准浏览器能力集；`handoff` 为 None 时不提供人工接管
pub fn register_browser_tools(
    registry: &mut ToolRegistry,
    browser: Arc<dyn Browser>,
    cfg: &AppConfig,
    handoff: Option<Arc<HandoffProtocol>>,
) -> Result<(), AgentError> {
    registry.register(GoToUrlTool::new(browser.clone()))?;
    registry.register(GoBackTool::new(browser.clone()))?;
    registry.register(GoForwardTool::new(browser.clone()))?;
    registry.register(SearchWebTool::new(
        browser.clone(),
        cfg.browser.search_engine.clone(),
    ))?;
    registry.register(GetCurrentUrlTool::new(browser.clone()))?;
    registry.register(GetPageContentTool::new(browser.clone()))?;
    registry.register(ExtractTextTool::new(browser.clone()))?;
    registry.register(FindElementsTool::new(browser.clone()))?;
    registry.register(ExtractLinksTool::new(browser.clone()))?;
    registry.register(ClickElementTool::new(browser.clone()))?;
    registry.register(TypeTextTool::new(browser.clone()))?;
    registry.register(ScrollPageTool::new(browser.clone()))?;
    registry.register(TakeScreenshotTool::new(
        browser,
        cfg.paths.screenshot_dir.clone(),
    ))?;
    if let Some(protocol) = handoff {
        registry.register(RequestHumanTool::new(protocol))?;
    }
    tracing::info!(count = registry.len(), "browser tools registered");
    Ok(())
}
