//! WebPilot - LLM 驱动的浏览器代理
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、任务状态、主控循环（TaskOrchestrator）与装配
//! - **memory**: LLM 消息与只追加的回合日志
//! - **react**: 回复解析、Planner 与提示词
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **tools**: Tool trait、注册表、执行器与浏览器能力集
//! - **browser**: 受控浏览器抽象（Mock / Headless Chrome）
//! - **handoff**: 人工接管协议与操作员接口
//! - **observability**: 日志初始化

pub mod browser;
pub mod config;
pub mod core;
pub mod handoff;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
