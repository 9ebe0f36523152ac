//! 可观测性：tracing 订阅器初始化
//!
//! 设置了 RUST_LOG 时以其为准，否则使用传入的级别（如 "info"、"webpilot=debug"）。
//! 工具审计记录（event = "tool_audit"）由 ToolExecutor 以 JSON 字段输出。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // 重复初始化（例如测试中）静默忽略
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
