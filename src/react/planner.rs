//! Planner：组装 system prompt + 任务 + 回合日志，调用 LLM，并把回复交给解析器
//!
//! 后端失败不会向上抛出，而是变成一个带错误描述、未完成、无动作的回合。

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::memory::{Message, TurnLog};
use crate::react::interpreter::{parse_planner_reply, PlannerTurn};
use crate::react::prompts::{system_prompt, FINAL_INSTRUCTION};
use crate::tools::ToolDescriptor;

pub struct Planner {
    llm: Arc<dyn LlmClient>,
    completion_phrase: String,
    /// 发送时保留的最近回合条目数；0 表示全部
    context_window: usize,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, completion_phrase: impl Into<String>) -> Self {
        Self {
            llm,
            completion_phrase: completion_phrase.into(),
            context_window: 0,
        }
    }

    pub fn with_context_window(mut self, entries: usize) -> Self {
        self.context_window = entries;
        self
    }

    pub fn completion_phrase(&self) -> &str {
        &self.completion_phrase
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 发送给后端的完整消息列表
    pub fn build_messages(
        &self,
        task: &str,
        log: &TurnLog,
        tools: &[ToolDescriptor],
        is_final: bool,
    ) -> Vec<Message> {
        let mut messages = vec![
            Message::system(system_prompt(tools, &self.completion_phrase, is_final)),
            Message::user(format!("Task: {}", task)),
        ];
        messages.extend(log.to_messages(self.context_window));
        if is_final {
            messages.push(Message::user(FINAL_INSTRUCTION));
        }
        messages
    }

    /// 请求下一步决策（或在 is_final 时请求最终总结）
    pub async fn decide(
        &self,
        task: &str,
        log: &TurnLog,
        tools: &[ToolDescriptor],
        is_final: bool,
    ) -> PlannerTurn {
        let messages = self.build_messages(task, log, tools, is_final);
        match self.llm.complete(&messages).await {
            Ok(raw) => parse_planner_reply(&raw, &self.completion_phrase, is_final),
            Err(e) => {
                tracing::error!(error = %e, is_final = is_final, "planner request failed");
                PlannerTurn::from_error(e)
            }
        }
    }

    pub async fn close(&self) {
        self.llm.close().await;
    }
}
