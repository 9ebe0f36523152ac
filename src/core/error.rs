//! Agent 错误类型
//!
//! 库内统一错误：工具注册、人工接管 I/O、配置。
//! 注意：工具调用失败在 ToolExecutor 处被转为数据（Dispatch），LLM 与浏览器故障分别转为
//! 错误回合与观察文本，都不会作为控制流向上传播。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 严格注册模式下重复注册同名工具
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// 人工接管时读取操作员输入失败
    #[error("Operator I/O error: {0}")]
    OperatorIo(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::ConfigError(e.to_string())
    }
}
