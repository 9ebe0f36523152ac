//! 人工接管协议（Human Handoff）
//!
//! 同步的嵌套状态机：Requested -> AwaitingOperator -> {Resumed, Aborted}。
//! 进入时记录页面位置并保存 "before" 截图，随后阻塞等待操作员决定（无超时）；
//! help 或无法识别的输入只会重新提示，不推进状态。恢复时再保存 "after" 截图与新位置，
//! 生成一段摘要文本供写入回合日志；终止时任务立即结束。

pub mod operator;
pub mod tool;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::browser::Browser;
use crate::tools::save_screenshot;

pub use operator::{ConsoleOperator, Operator, ScriptedOperator};
pub use tool::RequestHumanTool;

/// 人工接管能力的注册名
pub const HANDOFF_TOOL_NAME: &str = "request_human_intervention";

const HELP_TEXT: &str = "Commands:\n  done | resume | continue  hand control back to the agent\n  abort | quit              stop the task\n  help | ?                  show this help";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffState {
    Requested,
    AwaitingOperator,
    Resumed,
    Aborted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffOutcome {
    Resumed,
    Aborted,
}

/// 操作员的一行输入
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperatorDecision {
    Resume,
    Abort,
    Help,
    Unknown(String),
}

impl OperatorDecision {
    pub fn parse(line: &str) -> Self {
        let word = line.trim().to_lowercase();
        match word.as_str() {
            "done" | "resume" | "continue" => OperatorDecision::Resume,
            "abort" | "quit" => OperatorDecision::Abort,
            "help" | "?" => OperatorDecision::Help,
            _ => OperatorDecision::Unknown(word),
        }
    }
}

/// 一次接管请求；解决后只有 `summary()` 进入回合日志
#[derive(Clone, Debug)]
pub struct HandoffRequest {
    pub reason: String,
    pub location_before: String,
    pub location_after: Option<String>,
    pub snapshot_before: Option<PathBuf>,
    pub snapshot_after: Option<PathBuf>,
    pub state: HandoffState,
}

impl HandoffRequest {
    fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
            location_before: String::new(),
            location_after: None,
            snapshot_before: None,
            snapshot_after: None,
            state: HandoffState::Requested,
        }
    }

    /// 终态对应的结果；未结束时为 None
    pub fn outcome(&self) -> Option<HandoffOutcome> {
        match self.state {
            HandoffState::Resumed => Some(HandoffOutcome::Resumed),
            HandoffState::Aborted => Some(HandoffOutcome::Aborted),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        let snapshot = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "unavailable".to_string())
        };
        match self.state {
            HandoffState::Aborted => format!(
                "Human intervention aborted by operator. Reason: {}. Location: {}.",
                self.reason, self.location_before
            ),
            _ => format!(
                "Human intervention completed. Reason: {}. Location before: {}. Location after: {}. Snapshots: before={}, after={}.",
                self.reason,
                self.location_before,
                self.location_after.as_deref().unwrap_or("unknown"),
                snapshot(&self.snapshot_before),
                snapshot(&self.snapshot_after),
            ),
        }
    }
}

/// 人工接管协议：持有浏览器会话、操作员与截图目录
pub struct HandoffProtocol {
    browser: Arc<dyn Browser>,
    operator: Arc<dyn Operator>,
    snapshot_dir: PathBuf,
    /// AwaitingOperator 期间为 true：此时浏览器归操作员所有
    in_control: Arc<AtomicBool>,
}

impl HandoffProtocol {
    pub fn new(
        browser: Arc<dyn Browser>,
        operator: Arc<dyn Operator>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            browser,
            operator,
            snapshot_dir: snapshot_dir.into(),
            in_control: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 与外部共享控制权标志（例如操作员界面需要展示当前由谁控制浏览器）
    pub fn with_control_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.in_control = flag;
        self
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    pub fn human_in_control(&self) -> bool {
        self.in_control.load(Ordering::SeqCst)
    }

    /// 执行一次完整的接管；总是以 Resumed 或 Aborted 结束
    pub async fn run(&self, reason: &str) -> HandoffRequest {
        let mut request = HandoffRequest::new(reason);
        request.location_before = self.location().await;
        request.snapshot_before = self.snapshot("before", reason).await;
        request.state = HandoffState::AwaitingOperator;
        self.in_control.store(true, Ordering::SeqCst);
        tracing::info!(reason = %reason, location = %request.location_before, "handoff: awaiting operator");

        self.operator
            .notify(&format!(
                "\n=== Human intervention requested ===\nReason: {}\nCurrent page: {}\nSnapshot: {}\nTake over the browser window, then type 'done' to resume or 'abort' to stop the task ('help' for commands).",
                reason,
                request.location_before,
                request
                    .snapshot_before
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "unavailable".to_string()),
            ))
            .await;

        loop {
            let line = match self.operator.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::warn!("handoff: operator input closed, aborting task");
                    request.state = HandoffState::Aborted;
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "handoff: failed to read operator input, aborting task");
                    request.state = HandoffState::Aborted;
                    break;
                }
            };
            match OperatorDecision::parse(&line) {
                OperatorDecision::Resume => {
                    request.state = HandoffState::Resumed;
                    break;
                }
                OperatorDecision::Abort => {
                    request.state = HandoffState::Aborted;
                    break;
                }
                OperatorDecision::Help => self.operator.notify(HELP_TEXT).await,
                OperatorDecision::Unknown(word) => {
                    self.operator
                        .notify(&format!(
                            "Unrecognized input '{}'. Type 'done' to resume, 'abort' to stop, 'help' for commands.",
                            word
                        ))
                        .await
                }
            }
        }

        self.in_control.store(false, Ordering::SeqCst);

        if request.state == HandoffState::Resumed {
            request.snapshot_after = self.snapshot("after", reason).await;
            request.location_after = Some(self.location().await);
            self.operator.notify("Control returned to the agent.").await;
        } else {
            self.operator.notify("Task aborted.").await;
        }
        tracing::info!(outcome = ?request.state, "handoff: resolved");
        request
    }

    async fn location(&self) -> String {
        match self.browser.current_url().await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "handoff: could not read current URL");
                "unknown".to_string()
            }
        }
    }

    async fn snapshot(&self, phase: &str, reason: &str) -> Option<PathBuf> {
        let label = format!("handoff_{}_{}", phase, reason);
        match save_screenshot(self.browser.as_ref(), &self.snapshot_dir, &label).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(phase = phase, error = %e, "handoff: snapshot failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowser;
    use crate::core::AgentError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 每次读取输入时记录控制权标志
    struct FlagOperator {
        flag: Arc<AtomicBool>,
        seen: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl Operator for FlagOperator {
        async fn notify(&self, _message: &str) {}

        async fn read_line(&self) -> Result<Option<String>, AgentError> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(self.flag.load(Ordering::SeqCst));
            Ok(Some(if seen.len() == 1 { "help" } else { "done" }.to_string()))
        }
    }

    fn protocol(lines: &[&str], dir: &Path) -> (HandoffProtocol, Arc<ScriptedOperator>) {
        let browser = Arc::new(MockBrowser::new().starting_at("https://login.test/"));
        let operator = Arc::new(ScriptedOperator::new(lines.iter().copied()));
        (
            HandoffProtocol::new(browser, operator.clone(), dir),
            operator,
        )
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!(OperatorDecision::parse(" DONE "), OperatorDecision::Resume);
        assert_eq!(OperatorDecision::parse("continue"), OperatorDecision::Resume);
        assert_eq!(OperatorDecision::parse("quit"), OperatorDecision::Abort);
        assert_eq!(OperatorDecision::parse("?"), OperatorDecision::Help);
        assert_eq!(
            OperatorDecision::parse("maybe"),
            OperatorDecision::Unknown("maybe".to_string())
        );
    }

    #[tokio::test]
    async fn test_help_then_done_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let (p, op) = protocol(&["help", "what", "done"], dir.path());
        let req = p.run("login required").await;
        assert_eq!(req.outcome(), Some(HandoffOutcome::Resumed));
        assert_eq!(req.location_before, "https://login.test/");
        assert_eq!(req.location_after.as_deref(), Some("https://login.test/"));
        let before = req.snapshot_before.clone().unwrap();
        assert!(before
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("handoff_before_login_required_"));
        assert!(req.snapshot_after.is_some());
        assert!(op.notices().iter().any(|n| n.contains("Commands:")));
        assert!(op.notices().iter().any(|n| n.contains("Unrecognized input 'what'")));
        assert!(req.summary().contains("Location before: https://login.test/"));
    }

    #[tokio::test]
    async fn test_abort_and_end_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let (p, _) = protocol(&["abort"], dir.path());
        let req = p.run("captcha").await;
        assert_eq!(req.outcome(), Some(HandoffOutcome::Aborted));
        assert!(req.snapshot_after.is_none());
        assert!(req.summary().starts_with("Human intervention aborted"));

        let (p, _) = protocol(&[], dir.path());
        assert_eq!(p.run("captcha").await.outcome(), Some(HandoffOutcome::Aborted));
    }

    #[tokio::test]
    async fn test_human_in_control_only_while_awaiting_operator() {
        let dir = tempfile::tempdir().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let operator = Arc::new(FlagOperator {
            flag: flag.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let p = HandoffProtocol::new(Arc::new(MockBrowser::new()), operator.clone(), dir.path())
            .with_control_flag(flag.clone());
        assert!(!p.human_in_control());

        let req = p.run("login required").await;
        assert_eq!(req.outcome(), Some(HandoffOutcome::Resumed));
        assert_eq!(*operator.seen.lock().unwrap(), vec![true, true]);
        assert!(!p.human_in_control());
        assert!(!flag.load(Ordering::SeqCst));
    }
}
