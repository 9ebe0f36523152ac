//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters / execute），由 ToolRegistry 按名注册与查找。
//! 注册顺序即描述顺序（`describe_all`），保证每次生成的 prompt 一致；同名重复注册默认覆盖原位置，
//! 严格模式下返回 DuplicateTool。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::handoff::HandoffProtocol;

/// 参数语义类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
}

impl ParamKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
        };
        f.write_str(s)
    }
}

/// 单个参数声明
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// 工具描述（展示给 Planner），注册后不可变
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// 在边界处校验参数：必填项存在、无未声明参数、类型匹配
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let empty = Map::new();
        let obj = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => return Err(format!("arguments must be an object, got {}", other)),
        };
        for key in obj.keys() {
            if !self.parameters.iter().any(|p| &p.name == key) {
                return Err(format!("unexpected parameter '{}'", key));
            }
        }
        for param in &self.parameters {
            match obj.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(format!("missing required parameter '{}'", param.name));
                }
                Some(v) if !v.is_null() && !param.kind.matches(v) => {
                    return Err(format!(
                        "parameter '{}' must be {}, got {}",
                        param.name, param.kind, v
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// 渲染为 prompt 中的一段文本
    pub fn render(&self) -> String {
        let mut out = format!("- {}: {}\n", self.name, self.description);
        if self.parameters.is_empty() {
            out.push_str("  parameters: none\n");
        } else {
            out.push_str("  parameters:\n");
            for p in &self.parameters {
                let opt = if p.required { "" } else { ", optional" };
                out.push_str(&format!(
                    "    {} ({}{}): {}\n",
                    p.name, p.kind, opt, p.description
                ));
            }
        }
        out
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数声明、异步执行（args 为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（调用块中的 "name" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数声明，默认无参数
    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    /// 是否豁免执行超时（如需要等待人工操作的工具）
    fn timeout_exempt(&self) -> bool {
        false
    }

    /// 人工接管能力返回其协议，编排器据此内联运行并拿到带类型的结果
    fn handoff_protocol(&self) -> Option<Arc<HandoffProtocol>> {
        None
    }

    /// 执行工具；Err 为失败描述，由执行器转为结果文本
    async fn execute(&self, args: Value) -> Result<String, String>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

type Invoker = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<String, String>> + Send + Sync>;

/// 以闭包注册的工具：`register(name, invoker, description, parameters)` 形式
pub struct FnTool {
    name: String,
    description: String,
    parameters: Vec<ParamSpec>,
    invoker: Invoker,
}

impl FnTool {
    pub fn new<F>(name: &str, description: &str, parameters: Vec<ParamSpec>, invoker: F) -> Self
    where
        F: Fn(Value) -> BoxFuture<'static, Result<String, String>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            invoker: Arc::new(invoker),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        self.parameters.clone()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        (self.invoker)(args).await
    }
}

/// 工具注册表：按注册顺序存储 Arc<dyn Tool>，名称 -> 下标索引
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
    strict: bool,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 严格模式：重复注册返回 DuplicateTool
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(_) if self.strict => Err(AgentError::DuplicateTool(name)),
            Some(&pos) => {
                tracing::debug!(tool = %name, "tool re-registered, replacing previous definition");
                self.tools[pos] = tool;
                Ok(())
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 全部工具描述，按注册顺序
    pub fn describe_all(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }
}
