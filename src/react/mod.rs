//! 认知层：回复解析（Response Interpreter）、Planner 与提示词

pub mod interpreter;
pub mod planner;
pub mod prompts;

pub use interpreter::{parse_planner_reply, PlannerTurn, ToolInvocation, TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
pub use planner::Planner;
