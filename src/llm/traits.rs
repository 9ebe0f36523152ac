//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete 为一次请求/响应，close 释放传输资源。

use async_trait::async_trait;

use crate::memory::Message;

/// LLM 客户端 trait：非流式完成；失败以字符串描述返回，由 Planner 转为错误回合
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }

    /// 任务结束时调用一次（无论完成、终止还是回合耗尽）
    async fn close(&self) {}
}
