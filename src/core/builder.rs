//! 编排器构建器：统一的组装逻辑
//!
//! CLI 与集成测试共用同一套装配：配置 -> 工具注册表（标准浏览器能力集 + 人工接管）-> 执行器 -> Planner -> Orchestrator。

use std::sync::Arc;
use std::time::Duration;

use crate::browser::Browser;
use crate::config::AppConfig;
use crate::core::{AgentError, TaskOrchestrator};
use crate::handoff::{HandoffProtocol, Operator};
use crate::llm::LlmClient;
use crate::react::Planner;
use crate::tools::{register_browser_tools, ToolExecutor, ToolRegistry};

pub struct OrchestratorBuilder {
    config: AppConfig,
    operator: Option<Arc<dyn Operator>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            operator: None,
        }
    }

    /// 设置操作员；未设置时不注册人工接管能力
    pub fn with_operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.operator = Some(operator);
        self
    }

    /// 构建工具注册表（严格模式取自配置）
    pub fn build_tool_registry(
        &self,
        browser: Arc<dyn Browser>,
        handoff: Option<Arc<HandoffProtocol>>,
    ) -> Result<ToolRegistry, AgentError> {
        let mut tools = if self.config.agent.strict_registration {
            ToolRegistry::strict()
        } else {
            ToolRegistry::new()
        };
        register_browser_tools(&mut tools, browser, &self.config, handoff)?;
        Ok(tools)
    }

    pub fn build(
        self,
        llm: Arc<dyn LlmClient>,
        browser: Arc<dyn Browser>,
    ) -> Result<TaskOrchestrator, AgentError> {
        let handoff = self.operator.clone().map(|operator| {
            Arc::new(HandoffProtocol::new(
                browser.clone(),
                operator,
                self.config.paths.screenshot_dir.clone(),
            ))
        });

        let tools = self.build_tool_registry(browser.clone(), handoff)?;
        let agent = &self.config.agent;
        let executor = ToolExecutor::new(tools, agent.tool_timeout_secs);
        let planner = Planner::new(llm, agent.completion_phrase.clone())
            .with_context_window(agent.max_context_entries);

        Ok(TaskOrchestrator::new(planner, executor, browser)
            .with_max_iterations(agent.max_iterations)
            .with_pacing(Duration::from_millis(agent.pacing_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowser;
    use crate::handoff::ScriptedOperator;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_build_registers_handoff_only_with_operator() {
        let cfg = AppConfig::default();
        let without = OrchestratorBuilder::new(cfg.clone())
            .build(Arc::new(MockLlmClient::new()), Arc::new(MockBrowser::new()))
            .unwrap();
        assert_eq!(without.tool_names().len(), 13);
        assert_eq!(without.max_iterations(), 50);

        let with = OrchestratorBuilder::new(cfg)
            .with_operator(Arc::new(ScriptedOperator::default()))
            .build(Arc::new(MockLlmClient::new()), Arc::new(MockBrowser::new()))
            .unwrap();
        assert_eq!(
            with.tool_names().last().map(String::as_str),
            Some("request_human_intervention")
        );
    }
}
