//! 任务状态与任务结果
//!
//! TaskState 由单个 Orchestrator 独占（无共享、无锁）；TaskResult 是对调用方暴露的三种终态。

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::memory::{TurnLog, TurnRole};

/// 单个任务的运行状态
#[derive(Clone, Debug, Serialize)]
pub struct TaskState {
    pub id: Uuid,
    task: String,
    pub turn_log: TurnLog,
    /// 最近一次观察到的页面位置（URL），每回合刷新
    pub current_location: String,
    /// 仅在人工接管期间为 true
    pub human_in_control: bool,
    /// 已开始的回合数，单调递增
    pub turn_count: usize,
}

impl TaskState {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: task.into(),
            turn_log: TurnLog::new(),
            current_location: String::new(),
            human_in_control: false,
            turn_count: 0,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn record(&mut self, role: TurnRole, content: impl Into<String>) {
        self.turn_log.push(role, content);
    }
}

/// 任务终态：三者的文本形式可区分（`[ABORTED]` / `[INCOMPLETE]` 前缀）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskResult {
    /// Planner 宣告完成后的最终总结
    Completed(String),
    /// 操作员在人工接管中终止
    Aborted(String),
    /// 达到最大回合数后的尽力总结
    IterationExhausted { max_iterations: usize, summary: String },
}

impl TaskResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskResult::Completed(_))
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskResult::Completed(text) => write!(f, "{}", text),
            TaskResult::Aborted(reason) => write!(f, "[ABORTED] Task aborted by operator: {}", reason),
            TaskResult::IterationExhausted {
                max_iterations,
                summary,
            } => write!(
                f,
                "[INCOMPLETE] Reached the maximum number of iterations ({}); the task may be unfinished.\n\n{}",
                max_iterations, summary
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_are_textually_distinct() {
        let done = TaskResult::Completed("title is Example".into()).to_string();
        let aborted = TaskResult::Aborted("login required".into()).to_string();
        let exhausted = TaskResult::IterationExhausted {
            max_iterations: 3,
            summary: "partial".into(),
        }
        .to_string();
        assert_eq!(done, "title is Example");
        assert!(aborted.starts_with("[ABORTED]"));
        assert!(exhausted.starts_with("[INCOMPLETE]"));
        assert!(exhausted.ends_with("partial"));
    }

    #[test]
    fn test_new_state() {
        let state = TaskState::new("check weather site title");
        assert_eq!(state.task(), "check weather site title");
        assert!(state.turn_log.is_empty());
        assert!(!state.human_in_control);
        assert_eq!(state.turn_count, 0);
    }
}
