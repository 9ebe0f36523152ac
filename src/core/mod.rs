//! 核心编排层：错误类型、任务状态、主控循环与装配

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use builder::OrchestratorBuilder;
pub use error::AgentError;
pub use orchestrator::{TaskOrchestrator, TaskReport, DEFAULT_MAX_ITERATIONS, DEFAULT_PACING};
pub use state::{TaskResult, TaskState};
