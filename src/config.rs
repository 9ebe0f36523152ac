//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WEBPILOT__*` 覆盖（双下划线表示嵌套，如 `WEBPILOT__AGENT__MAX_ITERATIONS=10`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub browser: BrowserSection,
    pub agent: AgentSection,
    pub paths: PathsSection,
}

/// [llm] 段：OpenAI 兼容端点、模型与采样参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: String,
    /// 未设置时读取 OPENAI_API_KEY
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            temperature: 0.2,
            max_tokens: 4096,
            request_timeout_secs: 60,
        }
    }
}

/// [browser] 段：默认显示浏览器窗口，方便人工接管
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    /// search_web 使用的搜索引擎地址，查询词作为 `q` 参数附加
    pub search_engine: String,
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            user_agent: None,
            window_width: 1280,
            window_height: 900,
            search_engine: "https://www.google.com/search".to_string(),
            navigation_timeout_secs: 30,
        }
    }
}

/// [agent] 段：回合上限、节流、工具超时、完成短语
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_iterations: usize,
    /// 每回合之间的固定延迟（毫秒）
    pub pacing_ms: u64,
    /// 单次工具调用超时（秒），人工接管除外
    pub tool_timeout_secs: u64,
    /// Planner 声明任务完成时使用的短语（区分大小写的子串匹配）
    pub completion_phrase: String,
    /// 为 true 时重复注册同名工具报错，否则后注册者覆盖
    pub strict_registration: bool,
    /// 发送给 LLM 的回合日志条数上限，0 表示不限制
    pub max_context_entries: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            pacing_ms: 1000,
            tool_timeout_secs: 30,
            completion_phrase: "Task completed".to_string(),
            strict_registration: false,
            max_context_entries: 0,
        }
    }
}

/// [paths] 段：数据、输出、截图目录（由入口程序创建）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub screenshot_dir: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("data/outputs"),
            screenshot_dir: PathBuf::from("data/screenshots"),
        }
    }
}

impl PathsSection {
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.data_dir, &self.output_dir, &self.screenshot_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 WEBPILOT__* 可覆盖
///
/// 1. 查找 config/default.toml 或 default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WEBPILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WEBPILOT")
            .separator("__")
            .try_parsing(true),
    );

    Ok(builder.build()?.try_deserialize()?)
}
