//! Planner 提示词

use crate::react::interpreter::{TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
use crate::tools::{tool_call_schema_json, ToolDescriptor};

pub const SYSTEM_PROMPT: &str = "You are a web automation agent controlling a real browser to complete the user's task.\n\
Each turn you receive an observation of the current page and the results of your previous actions.\n\
Work step by step: explain briefly what you will do next, then request exactly one tool call.\n\
If a page needs something only a person can do (logging in, solving a captcha, confirming a payment), \
call request_human_intervention with a clear reason.\n\
Never invent page content; read it with the extraction tools first.";

/// 规划回合末尾的行动提醒（Planner 只输出了推理、没有工具调用时写入回合日志）
pub const ACTION_REMINDER: &str = "You did not request a tool call. Choose the next concrete action and emit exactly one tool call block, or state that the task is complete.";

/// 最终总结回合的指令
pub const FINAL_INSTRUCTION: &str = "Based on everything above, write the final result for the task. Be complete and well structured; do not request any more tool calls.";

/// 工具调用格式说明（含 JSON Schema 与完成短语）
pub fn format_instructions(completion_phrase: &str) -> String {
    format!(
        "To use a tool, write exactly one block:\n{open}\n{{\"name\": \"tool_name\", \"arguments\": {{\"param\": \"value\"}}}}\n{close}\n\
The block content must match this JSON Schema:\n{schema}\n\
Only the first block in a reply is executed. When the task is fully done, reply without a tool call and include the phrase \"{phrase}\".",
        open = TOOL_CALL_OPEN,
        close = TOOL_CALL_CLOSE,
        schema = tool_call_schema_json(),
        phrase = completion_phrase,
    )
}

/// 完整的 system prompt；最终回合不列工具
pub fn system_prompt(tools: &[ToolDescriptor], completion_phrase: &str, is_final: bool) -> String {
    if is_final || tools.is_empty() {
        return SYSTEM_PROMPT.to_string();
    }
    let listing: Vec<String> = tools.iter().map(|t| t.render()).collect();
    format!(
        "{}\n\nAvailable tools:\n{}\n\n{}",
        SYSTEM_PROMPT,
        listing.join("\n"),
        format_instructions(completion_phrase)
    )
}
