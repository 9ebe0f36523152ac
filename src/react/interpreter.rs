//! 回复解析：把一次 Planner 原始回复拆为推理文本、至多一个工具调用与完成信号
//!
//! 工具调用写在 `<tool_call>` … `</tool_call>` 之间，载荷为 `{"name": "...", "arguments": {...}}`；
//! 只识别第一个块，后续块原样留在推理文本中。块内载荷无法解析时退化为「无动作」，
//! 原文整体作为推理文本保留，绝不中断回合。

use serde::Deserialize;
use serde_json::{Map, Value};

pub const TOOL_CALL_OPEN: &str = "<tool_call>";
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";

/// 一个结构化工具调用；arguments 总是 JSON 对象
#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

/// 一次 Planner 回复的解析结果
#[derive(Clone, Debug, PartialEq)]
pub struct PlannerTurn {
    pub reasoning_text: Option<String>,
    pub tool_invocation: Option<ToolInvocation>,
    pub is_finished: bool,
    pub raw_text: String,
    /// 后端调用失败时的错误描述；此时 reasoning_text 为该描述
    pub error: Option<String>,
}

impl PlannerTurn {
    /// 后端失败产生的回合：不结束、无动作
    pub fn from_error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            reasoning_text: Some(format!("LLM request failed: {}", message)),
            tool_invocation: None,
            is_finished: false,
            raw_text: String::new(),
            error: Some(message),
        }
    }
}

#[derive(Deserialize)]
struct RawInvocation {
    name: String,
    #[serde(default, alias = "parameters")]
    arguments: Value,
}

/// 去掉块内可能出现的 ``` / ```json 围栏
fn strip_fence(payload: &str) -> &str {
    let s = payload.trim();
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

fn parse_payload(payload: &str) -> Option<ToolInvocation> {
    let raw: RawInvocation = serde_json::from_str(strip_fence(payload)).ok()?;
    let name = raw.name.trim();
    if name.is_empty() {
        return None;
    }
    let arguments = match raw.arguments {
        Value::Null => Value::Object(Map::new()),
        v @ Value::Object(_) => v,
        _ => return None,
    };
    Some(ToolInvocation {
        name: name.to_string(),
        arguments,
    })
}

/// 定位第一个完整的标记对，返回 (块起始, 块结束, 载荷)
fn locate_block(raw: &str) -> Option<(usize, usize, &str)> {
    let start = raw.find(TOOL_CALL_OPEN)?;
    let body_start = start + TOOL_CALL_OPEN.len();
    let close = raw[body_start..].find(TOOL_CALL_CLOSE)?;
    let body_end = body_start + close;
    Some((start, body_end + TOOL_CALL_CLOSE.len(), &raw[body_start..body_end]))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// 解析一次回复
///
/// `is_final` 为 true 表示这是显式请求的最终总结回合，结果必定 finished。
/// 否则仅当推理文本包含完成短语且没有解析出工具调用时才视为完成：工具调用优先。
pub fn parse_planner_reply(raw: &str, completion_phrase: &str, is_final: bool) -> PlannerTurn {
    let mut tool_invocation = None;
    let mut reasoning = raw.trim().to_string();

    if let Some((start, end, payload)) = locate_block(raw) {
        match parse_payload(payload) {
            Some(inv) => {
                reasoning = format!("{}{}", &raw[..start], &raw[end..]).trim().to_string();
                tool_invocation = Some(inv);
            }
            None => {
                tracing::warn!(payload = %payload.trim(), "malformed tool call block, ignoring");
            }
        }
    }

    let phrase_hit = !completion_phrase.is_empty() && reasoning.contains(completion_phrase);
    let is_finished = is_final || (tool_invocation.is_none() && phrase_hit);

    PlannerTurn {
        reasoning_text: non_empty(reasoning),
        tool_invocation,
        is_finished,
        raw_text: raw.to_string(),
        error: None,
    }
}
