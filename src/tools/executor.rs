//! 工具执行器（分发器）
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 查找工具、校验参数、在超时内调用；
//! 所有失败（未知工具、参数错误、工具报错、超时）都转为 Dispatch 数据返回，从不向调用方抛出。
//! 成功结果超过 MAX_RESULT_CHARS 时截断并追加 TRUNCATION_MARKER；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::tools::{ToolDescriptor, ToolRegistry};

/// 成功结果的最大字符数（回合日志永不剪枝，必须在此处限制增长）
pub const MAX_RESULT_CHARS: usize = 2000;
/// 截断标记
pub const TRUNCATION_MARKER: &str = "...\n[result truncated]";
/// 失败描述的最大字符数
const MAX_ERROR_CHARS: usize = 500;
/// 审计日志中参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// 分发状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchStatus {
    Succeeded,
    Failed,
    UnknownTool,
    InvalidArguments,
    TimedOut,
}

impl DispatchStatus {
    fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Succeeded => "ok",
            DispatchStatus::Failed => "error",
            DispatchStatus::UnknownTool => "unknown_tool",
            DispatchStatus::InvalidArguments => "invalid_arguments",
            DispatchStatus::TimedOut => "timeout",
        }
    }
}

/// 一次分发的结果：状态 + 写入回合日志的文本（总是以工具名开头）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatch {
    pub tool: String,
    pub status: DispatchStatus,
    pub text: String,
}

impl Dispatch {
    pub fn succeeded(tool: &str, output: &str) -> Self {
        Self {
            tool: tool.to_string(),
            status: DispatchStatus::Succeeded,
            text: format!("Tool '{}' succeeded: {}", tool, truncate_result(output)),
        }
    }

    pub fn failed(tool: &str, status: DispatchStatus, reason: &str) -> Self {
        Self {
            tool: tool.to_string(),
            status,
            text: format!("Tool '{}' failed: {}", tool, bounded(reason, MAX_ERROR_CHARS)),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DispatchStatus::Succeeded
    }
}

/// 超过 MAX_RESULT_CHARS 个字符时保留前 MAX_RESULT_CHARS 个字符并追加截断标记
pub fn truncate_result(output: &str) -> String {
    if output.chars().count() > MAX_RESULT_CHARS {
        let mut s: String = output.chars().take(MAX_RESULT_CHARS).collect();
        s.push_str(TRUNCATION_MARKER);
        s
    } else {
        output.to_string()
    }
}

fn bounded(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 审计日志中的参数预览
pub fn args_preview(args: &Value) -> String {
    bounded(&args.to_string(), ARGS_PREVIEW_CHARS)
}

/// 一次分发的审计记录（event = "tool_audit"）
pub fn audit_record(dispatch: &Dispatch, args_preview: &str, elapsed: Duration) -> Value {
    serde_json::json!({
        "event": "tool_audit",
        "tool": dispatch.tool,
        "ok": dispatch.is_ok(),
        "outcome": dispatch.status.as_str(),
        "duration_ms": elapsed.as_millis() as u64,
        "args_preview": args_preview,
    })
}

/// 输出审计日志；不经过执行器的分发（如内联人工接管）也必须调用
pub fn emit_audit(dispatch: &Dispatch, args_preview: &str, elapsed: Duration) {
    let audit = audit_record(dispatch, args_preview, elapsed);
    if dispatch.is_ok() {
        tracing::info!(audit = %audit, "tool");
    } else {
        tracing::warn!(audit = %audit, detail = %dispatch.text, "tool");
    }
}

/// 工具执行器：查找、校验、超时、故障隔离
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；永不返回 Err，失败以 Dispatch 描述；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: Value) -> Dispatch {
        let start = Instant::now();
        let preview = args_preview(&args);
        let dispatch = self.dispatch(tool_name, args).await;
        emit_audit(&dispatch, &preview, start.elapsed());
        dispatch
    }

    async fn dispatch(&self, tool_name: &str, args: Value) -> Dispatch {
        let Some(tool) = self.registry.get(tool_name) else {
            return Dispatch::failed(
                tool_name,
                DispatchStatus::UnknownTool,
                &format!(
                    "unknown tool '{}'; available tools: {}",
                    tool_name,
                    self.registry.tool_names().join(", ")
                ),
            );
        };

        if let Err(reason) = tool.descriptor().validate(&args) {
            return Dispatch::failed(
                tool_name,
                DispatchStatus::InvalidArguments,
                &format!("invalid arguments: {}", reason),
            );
        }
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };

        let result = if tool.timeout_exempt() {
            Ok(tool.execute(args).await)
        } else {
            timeout(self.timeout, tool.execute(args)).await
        };

        match result {
            Ok(Ok(output)) => Dispatch::succeeded(tool_name, &output),
            Ok(Err(e)) => Dispatch::failed(tool_name, DispatchStatus::Failed, &e),
            Err(_) => Dispatch::failed(
                tool_name,
                DispatchStatus::TimedOut,
                &format!("timed out after {}s", self.timeout.as_secs()),
            ),
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<std::sync::Arc<dyn crate::tools::Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn describe_all(&self) -> Vec<ToolDescriptor> {
        self.registry.describe_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ParamKind, ParamSpec};
    use serde_json::json;

    fn executor() -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        reg.register(FnTool::new(
            "shout",
            "upper-case text",
            vec![ParamSpec::required("text", ParamKind::String, "text")],
            |args| {
                Box::pin(async move {
                    Ok(args["text"].as_str().unwrap_or_default().to_uppercase())
                })
            },
        ))
        .unwrap();
        reg.register(FnTool::new("explode", "always fails", vec![], |_| {
            Box::pin(async { Err("element not clickable".to_string()) })
        }))
        .unwrap();
        reg.register(FnTool::new("flood", "huge output", vec![], |_| {
            Box::pin(async { Ok("x".repeat(MAX_RESULT_CHARS + 500)) })
        }))
        .unwrap();
        reg.register(FnTool::new("slow", "never returns in time", vec![], |_| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("late".to_string())
            })
        }))
        .unwrap();
        ToolExecutor::new(reg, 1)
    }

    #[tokio::test]
    async fn test_success_is_prefixed_with_tool_name() {
        let d = executor().execute("shout", json!({"text": "hi"})).await;
        assert_eq!(d.status, DispatchStatus::Succeeded);
        assert_eq!(d.text, "Tool 'shout' succeeded: HI");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_data_not_error() {
        let d = executor().execute("teleport", json!({})).await;
        assert_eq!(d.status, DispatchStatus::UnknownTool);
        assert!(d.text.starts_with("Tool 'teleport' failed"));
        assert!(d.text.contains("unknown tool 'teleport'"));
    }

    #[tokio::test]
    async fn test_tool_error_is_contained() {
        let d = executor().execute("explode", json!({})).await;
        assert_eq!(d.status, DispatchStatus::Failed);
        assert_eq!(d.text, "Tool 'explode' failed: element not clickable");
    }

    #[tokio::test]
    async fn test_invalid_arguments_do_not_reach_tool() {
        let d = executor().execute("shout", json!({"txt": "hi"})).await;
        assert_eq!(d.status, DispatchStatus::InvalidArguments);
        assert!(d.text.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn test_long_result_is_truncated() {
        let d = executor().execute("flood", json!({})).await;
        let expected = format!(
            "Tool 'flood' succeeded: {}{}",
            "x".repeat(MAX_RESULT_CHARS),
            TRUNCATION_MARKER
        );
        assert_eq!(d.text, expected);
    }

    #[test]
    fn test_truncate_result_exact_length() {
        let long = "é".repeat(MAX_RESULT_CHARS * 2);
        let out = truncate_result(&long);
        let body = out.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert_eq!(body.chars().count(), MAX_RESULT_CHARS);
        let exact = "a".repeat(MAX_RESULT_CHARS);
        assert_eq!(truncate_result(&exact), exact);
    }

    #[test]
    fn test_audit_record_fields() {
        let d = Dispatch::failed("click_element", DispatchStatus::TimedOut, "timed out after 1s");
        let record = audit_record(&d, &args_preview(&json!({"selector": "#go"})), Duration::from_millis(42));
        assert_eq!(record["event"], "tool_audit");
        assert_eq!(record["tool"], "click_element");
        assert_eq!(record["ok"], false);
        assert_eq!(record["outcome"], "timeout");
        assert_eq!(record["duration_ms"], 42);
        assert_eq!(record["args_preview"], "{\"selector\":\"#go\"}");
    }

    #[tokio::test]
    async fn test_timeout() {
        let d = executor().execute("slow", json!({})).await;
        assert_eq!(d.status, DispatchStatus::TimedOut);
        assert!(d.text.contains("timed out"));
    }
}
