//! 任务编排器：主控循环
//!
//! Running(turn) -> Finished | Aborted | IterationExhausted。每回合严格顺序执行：
//! 观察页面 -> Planner 决策 -> 完成则请求最终总结 / 有工具调用则分发（人工接管内联执行，
//! 协议取自注册表中的接管能力）/
//! 否则写入行动提醒 -> 节流等待。回合数达到上限后同样请求最终总结，结果标记为未完成。
//! 无论从哪条路径退出，浏览器会话与 LLM 客户端都会被关闭。

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::browser::Browser;
use crate::core::{TaskResult, TaskState};
use crate::handoff::{HandoffOutcome, HANDOFF_TOOL_NAME};
use crate::memory::TurnRole;
use crate::react::prompts::ACTION_REMINDER;
use crate::react::{Planner, ToolInvocation};
use crate::tools::{args_preview, emit_audit, Dispatch, DispatchStatus, ToolDescriptor, ToolExecutor};

pub const DEFAULT_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_PACING: Duration = Duration::from_millis(1000);

/// 一次任务运行的结果与最终状态（含完整回合日志）
#[derive(Debug)]
pub struct TaskReport {
    pub result: TaskResult,
    pub state: TaskState,
}

/// 单任务编排器：独占一个浏览器会话与一个 LLM 客户端，`run` 消费自身
pub struct TaskOrchestrator {
    planner: Planner,
    executor: ToolExecutor,
    browser: Arc<dyn Browser>,
    max_iterations: usize,
    pacing: Duration,
}

impl TaskOrchestrator {
    pub fn new(planner: Planner, executor: ToolExecutor, browser: Arc<dyn Browser>) -> Self {
        Self {
            planner,
            executor,
            browser,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            pacing: DEFAULT_PACING,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    /// 运行一个任务直到完成、终止或回合耗尽，然后释放资源
    pub async fn run(self, task: &str) -> TaskReport {
        let mut state = TaskState::new(task);
        tracing::info!(task_id = %state.id, task = %task, max_iterations = self.max_iterations, "task started");

        let result = self.drive(&mut state).await;
        self.release().await;

        let outcome = match &result {
            TaskResult::Completed(_) => "completed",
            TaskResult::Aborted(_) => "aborted",
            TaskResult::IterationExhausted { .. } => "iteration_exhausted",
        };
        let (prompt_tokens, completion_tokens, total_tokens) = self.planner.token_usage();
        tracing::info!(
            task_id = %state.id,
            outcome = outcome,
            turns = state.turn_count,
            log_entries = state.turn_log.len(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "task finished"
        );
        TaskReport { result, state }
    }

    async fn drive(&self, state: &mut TaskState) -> TaskResult {
        let tools: Vec<ToolDescriptor> = self.executor.describe_all();

        while state.turn_count < self.max_iterations {
            state.turn_count += 1;
            let turn = state.turn_count;
            tracing::debug!(task_id = %state.id, turn, "turn started");

            let observation = self.observe(state).await;
            state.record(TurnRole::Observation, observation);

            let decision = self
                .planner
                .decide(state.task(), &state.turn_log, &tools, false)
                .await;
            if let Some(text) = &decision.reasoning_text {
                state.record(TurnRole::Planner, text.clone());
            }

            if decision.is_finished {
                tracing::info!(task_id = %state.id, turn, "planner signalled completion");
                return TaskResult::Completed(self.final_summary(state).await);
            }

            match decision.tool_invocation {
                Some(invocation) => {
                    if let Some(result) = self.act(state, invocation).await {
                        return result;
                    }
                }
                None => {
                    tracing::debug!(task_id = %state.id, turn, "no tool call, re-prompting for action");
                    state.record(TurnRole::OperatorPrompt, ACTION_REMINDER);
                }
            }

            if state.turn_count < self.max_iterations && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        tracing::warn!(task_id = %state.id, max_iterations = self.max_iterations, "iteration limit reached");
        TaskResult::IterationExhausted {
            max_iterations: self.max_iterations,
            summary: self.final_summary(state).await,
        }
    }

    /// 当前页面位置 + 标题；不包含页面原文
    async fn observe(&self, state: &mut TaskState) -> String {
        match self.browser.current_url().await {
            Ok(url) => {
                let title = self.browser.title().await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "failed to read page title");
                    String::new()
                });
                state.current_location = url.clone();
                format!("Current page: {} (URL: {})", title, url)
            }
            Err(e) => {
                tracing::warn!(task_id = %state.id, turn = state.turn_count, error = %e, "observation failed");
                format!("Observation unavailable: {}", e)
            }
        }
    }

    /// 分发一个工具调用；返回 Some 表示任务在此终止
    async fn act(&self, state: &mut TaskState, invocation: ToolInvocation) -> Option<TaskResult> {
        tracing::info!(
            task_id = %state.id,
            turn = state.turn_count,
            tool = %invocation.name,
            args = %invocation.arguments,
            "dispatching tool"
        );

        if invocation.name == HANDOFF_TOOL_NAME {
            return self.hand_off(state, invocation).await;
        }

        let dispatch = self
            .executor
            .execute(&invocation.name, invocation.arguments)
            .await;
        state.record(TurnRole::ToolResult, dispatch.text);
        None
    }

    /// 人工接管。注册的能力提供协议且参数合法时内联运行协议；
    /// 否则交给执行器，此时能力执行失败同样视为操作员终止
    async fn hand_off(&self, state: &mut TaskState, invocation: ToolInvocation) -> Option<TaskResult> {
        let protocol = self
            .executor
            .get_tool(HANDOFF_TOOL_NAME)
            .and_then(|tool| tool.handoff_protocol());
        let reason = self.handoff_reason(&invocation);

        let (Some(protocol), Some(reason)) = (protocol, reason.clone()) else {
            let dispatch = self
                .executor
                .execute(&invocation.name, invocation.arguments)
                .await;
            let failed = dispatch.status == DispatchStatus::Failed;
            state.record(TurnRole::ToolResult, dispatch.text);
            if !failed {
                return None;
            }
            let reason = reason.unwrap_or_else(|| "human intervention failed".to_string());
            tracing::warn!(task_id = %state.id, reason = %reason, "task aborted: handoff capability failed");
            return Some(TaskResult::Aborted(reason));
        };

        let started = Instant::now();
        let preview = args_preview(&invocation.arguments);
        state.human_in_control = true;
        let request = protocol.run(&reason).await;
        state.human_in_control = false;

        let summary = request.summary();
        let (dispatch, result) = match request.outcome() {
            Some(HandoffOutcome::Resumed) => {
                if let Some(after) = &request.location_after {
                    state.current_location = after.clone();
                }
                (Dispatch::succeeded(HANDOFF_TOOL_NAME, &summary), None)
            }
            _ => {
                tracing::warn!(task_id = %state.id, reason = %reason, "task aborted by operator");
                (
                    Dispatch::failed(HANDOFF_TOOL_NAME, DispatchStatus::Failed, &summary),
                    Some(TaskResult::Aborted(reason)),
                )
            }
        };
        emit_audit(&dispatch, &preview, started.elapsed());
        state.record(TurnRole::ToolResult, dispatch.text);
        result
    }

    /// 已注册且参数合法的接管调用所给出的原因
    fn handoff_reason(&self, invocation: &ToolInvocation) -> Option<String> {
        let tool = self.executor.get_tool(HANDOFF_TOOL_NAME)?;
        tool.descriptor().validate(&invocation.arguments).ok()?;
        invocation
            .arguments
            .get("reason")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// 最终总结回合；后端失败时返回说明文本
    async fn final_summary(&self, state: &mut TaskState) -> String {
        let turn = self
            .planner
            .decide(state.task(), &state.turn_log, &[], true)
            .await;
        let text = match turn.error {
            Some(e) => format!("Final summary unavailable: {}", e),
            None => turn.reasoning_text.unwrap_or_default(),
        };
        state.record(TurnRole::Planner, text.clone());
        text
    }

    async fn release(&self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "failed to close browser session");
        }
        self.planner.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowser;
    use crate::handoff::{HandoffProtocol, RequestHumanTool, ScriptedOperator};
    use crate::llm::MockLlmClient;
    use crate::tools::{FnTool, ParamKind, ParamSpec, ToolRegistry};
    use std::io::Write;
    use std::sync::Mutex;

    /// 收集 tracing 输出，用于断言审计记录
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogCapture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    const HANDOFF_CALL: &str = "<tool_call>{\"name\": \"request_human_intervention\", \"arguments\": {\"reason\": \"captcha\"}}</tool_call>";

    /// 直接组装（不经过构建器），只注册接管能力
    fn handoff_orchestrator(
        llm: Arc<MockLlmClient>,
        browser: Arc<MockBrowser>,
        operator_lines: &[&str],
        dir: &std::path::Path,
    ) -> TaskOrchestrator {
        let operator = Arc::new(ScriptedOperator::new(operator_lines.iter().copied()));
        let protocol = Arc::new(HandoffProtocol::new(browser.clone(), operator, dir));
        let mut reg = ToolRegistry::new();
        reg.register(RequestHumanTool::new(protocol)).unwrap();
        TaskOrchestrator::new(
            Planner::new(llm, "Task completed"),
            ToolExecutor::new(reg, 5),
            browser,
        )
        .with_pacing(Duration::ZERO)
    }

    fn orchestrator(llm: Arc<MockLlmClient>, browser: Arc<MockBrowser>) -> TaskOrchestrator {
        let mut reg = ToolRegistry::new();
        reg.register(FnTool::new("noop", "does nothing", vec![], |_| {
            Box::pin(async { Ok("nothing happened".to_string()) })
        }))
        .unwrap();
        TaskOrchestrator::new(
            Planner::new(llm, "Task completed"),
            ToolExecutor::new(reg, 5),
            browser,
        )
        .with_pacing(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_completion_requests_final_summary() {
        let llm = Arc::new(MockLlmClient::scripted([
            "Nothing to do. Task completed.",
            "Final answer: nothing to do.",
        ]));
        let browser = Arc::new(MockBrowser::new());
        let report = orchestrator(llm.clone(), browser.clone()).run("idle").await;
        assert_eq!(
            report.result,
            TaskResult::Completed("Final answer: nothing to do.".to_string())
        );
        assert_eq!(report.state.turn_count, 1);
        assert_eq!(llm.request_count(), 2);
        assert!(browser.is_closed());
        assert!(llm.is_closed());
    }

    #[tokio::test]
    async fn test_backend_errors_do_not_stop_the_loop() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_error("timeout");
        llm.push_reply("<tool_call>{\"name\": \"noop\", \"arguments\": {}}</tool_call>");
        llm.push_reply("Task completed");
        llm.push_error("still down");
        let browser = Arc::new(MockBrowser::new());
        let report = orchestrator(llm, browser).with_max_iterations(5).run("t").await;
        assert_eq!(
            report.result,
            TaskResult::Completed("Final summary unavailable: still down".to_string())
        );
        assert_eq!(report.state.turn_count, 3);
        assert_eq!(report.state.turn_log.count(TurnRole::ToolResult), 1);
    }

    #[tokio::test]
    async fn test_observation_failure_is_recorded() {
        let llm = Arc::new(MockLlmClient::scripted(["Task completed", "done"]));
        let browser = Arc::new(MockBrowser::new());
        browser.close().await.unwrap();
        let report = orchestrator(llm, browser).run("t").await;
        let first = &report.state.turn_log.entries()[0];
        assert_eq!(first.role, TurnRole::Observation);
        assert!(first.content.starts_with("Observation unavailable"));
        assert!(report.result.is_completed());
    }

    #[tokio::test]
    async fn test_registered_handoff_abort_ends_task() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::scripted([HANDOFF_CALL, "Task completed", "final"]));
        let browser = Arc::new(MockBrowser::new().starting_at("https://shop.test/"));
        let report = handoff_orchestrator(llm.clone(), browser.clone(), &["abort"], dir.path())
            .run("buy a book")
            .await;

        assert_eq!(report.result, TaskResult::Aborted("captcha".to_string()));
        assert_eq!(report.state.turn_count, 1);
        assert_eq!(llm.request_count(), 1);
        assert!(!report.state.human_in_control);
        assert!(browser.is_closed());
    }

    #[tokio::test]
    async fn test_failing_handoff_capability_aborts() {
        let llm = Arc::new(MockLlmClient::scripted([HANDOFF_CALL, "Task completed", "final"]));
        let mut reg = ToolRegistry::new();
        reg.register(FnTool::new(
            HANDOFF_TOOL_NAME,
            "no operator attached",
            vec![ParamSpec::required("reason", ParamKind::String, "why")],
            |_| Box::pin(async { Err("no operator available".to_string()) }),
        ))
        .unwrap();
        let report = TaskOrchestrator::new(
            Planner::new(llm.clone(), "Task completed"),
            ToolExecutor::new(reg, 5),
            Arc::new(MockBrowser::new()),
        )
        .with_pacing(Duration::ZERO)
        .run("t")
        .await;

        assert_eq!(report.result, TaskResult::Aborted("captcha".to_string()));
        assert_eq!(llm.request_count(), 1);
        assert_eq!(report.state.turn_log.count(TurnRole::ToolResult), 1);
    }

    #[tokio::test]
    async fn test_inline_handoff_writes_tool_audit() {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::scripted([HANDOFF_CALL, "Task completed", "final"]));
        let report = handoff_orchestrator(llm, Arc::new(MockBrowser::new()), &["done"], dir.path())
            .run("t")
            .await;
        assert!(report.result.is_completed());

        let logs = capture.text();
        let audit = logs
            .lines()
            .find(|l| l.contains("\"event\":\"tool_audit\""))
            .expect("no tool_audit record");
        assert!(audit.contains("\"tool\":\"request_human_intervention\""));
        assert!(audit.contains("\"outcome\":\"ok\""));
        assert!(audit.contains("captcha"));
    }

    #[tokio::test]
    async fn test_observation_has_no_operator_status_after_resume() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::scripted([HANDOFF_CALL, "Task completed", "final"]));
        let report = handoff_orchestrator(llm, Arc::new(MockBrowser::new()), &["done"], dir.path())
            .run("t")
            .await;
        let observations: Vec<_> = report
            .state
            .turn_log
            .entries()
            .iter()
            .filter(|e| e.role == TurnRole::Observation)
            .collect();
        assert_eq!(observations.len(), 2);
        assert!(observations
            .iter()
            .all(|e| e.content.starts_with("Current page:") && !e.content.contains("Status:")));
        assert!(!report.state.human_in_control);
    }
}
