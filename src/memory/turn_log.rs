//! 回合日志（Turn Log）：Planner 跨回合的唯一记忆
//!
//! 只追加、不删除、不重排；已写入的条目不可变（没有任何可变访问接口）。
//! 长度上限只在发送时统一应用（`to_messages(window)`），日志本身永不截断。

use serde::Serialize;

use crate::memory::Message;

/// 条目角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// 执行器（浏览器）当前状态观察
    Observation,
    /// Planner 的推理文本
    Planner,
    /// 工具调用结果（包括人工接管摘要）
    ToolResult,
    /// 催促 Planner 给出具体动作的提示
    OperatorPrompt,
}

#[derive(Clone, Debug, Serialize)]
pub struct TurnEntry {
    pub role: TurnRole,
    pub content: String,
}

impl TurnEntry {
    /// 投影为 LLM 消息：observation / tool_result 为 system，planner 为 assistant，operator_prompt 为 user
    pub fn to_message(&self) -> Message {
        match self.role {
            TurnRole::Observation => Message::system(format!("Observation: {}", self.content)),
            TurnRole::Planner => Message::assistant(self.content.clone()),
            TurnRole::ToolResult => Message::system(format!("Tool result: {}", self.content)),
            TurnRole::OperatorPrompt => Message::user(self.content.clone()),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TurnLog {
    entries: Vec<TurnEntry>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: TurnRole, content: impl Into<String>) {
        self.entries.push(TurnEntry {
            role,
            content: content.into(),
        });
    }

    pub fn entries(&self) -> &[TurnEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TurnEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按角色计数（测试与日志统计用）
    pub fn count(&self, role: TurnRole) -> usize {
        self.entries.iter().filter(|e| e.role == role).count()
    }

    /// 发送时投影：`window` 为 0 表示不限制，否则只取最近 `window` 条
    pub fn to_messages(&self, window: usize) -> Vec<Message> {
        let start = if window == 0 {
            0
        } else {
            self.entries.len().saturating_sub(window)
        };
        self.entries[start..].iter().map(TurnEntry::to_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Role;

    #[test]
    fn test_push_is_append_only() {
        let mut log = TurnLog::new();
        log.push(TurnRole::Observation, "page A");
        let first = log.entries()[0].content.clone();
        log.push(TurnRole::Planner, "thinking");
        log.push(TurnRole::ToolResult, "ok");
        assert_eq!(log.len(), 3);
        assert_eq!(log.entries()[0].content, first);
        assert_eq!(log.entries()[2].role, TurnRole::ToolResult);
    }

    #[test]
    fn test_role_projection() {
        let mut log = TurnLog::new();
        log.push(TurnRole::Observation, "o");
        log.push(TurnRole::Planner, "p");
        log.push(TurnRole::ToolResult, "t");
        log.push(TurnRole::OperatorPrompt, "u");
        let msgs = log.to_messages(0);
        let roles: Vec<Role> = msgs.iter().map(|m| m.role.clone()).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::Assistant, Role::System, Role::User]
        );
        assert_eq!(msgs[0].content, "Observation: o");
        assert_eq!(msgs[2].content, "Tool result: t");
    }

    #[test]
    fn test_window_applies_at_send_time_only() {
        let mut log = TurnLog::new();
        for i in 0..10 {
            log.push(TurnRole::Planner, format!("step {i}"));
        }
        let msgs = log.to_messages(3);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].content, "step 7");
        assert_eq!(log.len(), 10);
    }
}
