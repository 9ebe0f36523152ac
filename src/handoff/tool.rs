//! request_human_intervention 工具：把接管协议包装为普通能力
//!
//! Orchestrator 通过 `handoff_protocol()` 取得协议并直接运行，以拿到带类型的结果；
//! 单独通过 ToolExecutor 调用时，恢复返回 Ok(摘要)，终止返回 Err(摘要)。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::handoff::{HandoffOutcome, HandoffProtocol, HANDOFF_TOOL_NAME};
use crate::tools::{arg_str, ParamKind, ParamSpec, Tool};

pub struct RequestHumanTool {
    protocol: Arc<HandoffProtocol>,
}

impl RequestHumanTool {
    pub fn new(protocol: Arc<HandoffProtocol>) -> Self {
        Self { protocol }
    }
}

#[async_trait]
impl Tool for RequestHumanTool {
    fn name(&self) -> &str {
        HANDOFF_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Pause and hand the browser to a human operator (login, captcha, anything you cannot do yourself); waits until the operator resumes or aborts"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "reason",
            ParamKind::String,
            "why a human is needed",
        )]
    }

    /// 阻塞在操作员输入上，不受工具超时约束
    fn timeout_exempt(&self) -> bool {
        true
    }

    fn handoff_protocol(&self) -> Option<Arc<HandoffProtocol>> {
        Some(self.protocol.clone())
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let reason = arg_str(&args, "reason").unwrap_or("unspecified");
        let request = self.protocol.run(reason).await;
        match request.outcome() {
            Some(HandoffOutcome::Resumed) => Ok(request.summary()),
            _ => Err(request.summary()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowser;
    use crate::handoff::ScriptedOperator;
    use crate::tools::{ToolExecutor, ToolRegistry};
    use serde_json::json;

    #[tokio::test]
    async fn test_handoff_tool_is_not_bound_by_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(MockBrowser::new());
        let operator = Arc::new(ScriptedOperator::new(["resume"]));
        let protocol = Arc::new(HandoffProtocol::new(browser, operator, dir.path()));
        let mut reg = ToolRegistry::new();
        reg.register(RequestHumanTool::new(protocol)).unwrap();
        let executor = ToolExecutor::new(reg, 0);
        let d = executor
            .execute(HANDOFF_TOOL_NAME, json!({"reason": "2fa"}))
            .await;
        assert!(d.is_ok(), "{}", d.text);
        assert!(d.text.contains("Human intervention completed. Reason: 2fa."));
    }
}
