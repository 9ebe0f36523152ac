//! 记忆层：LLM 消息与只追加的回合日志

pub mod conversation;
pub mod turn_log;

pub use conversation::{Message, Role};
pub use turn_log::{TurnEntry, TurnLog, TurnRole};
