//! WebPilot - LLM 驱动的浏览器代理
//!
//! 入口：解析参数、加载配置、初始化日志，启动 Chrome 会话并运行一个任务，结果打印并写入 output_dir。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use webpilot::browser::Browser;
use webpilot::config::{load_config, AppConfig};
use webpilot::core::{OrchestratorBuilder, TaskReport};
use webpilot::handoff::ConsoleOperator;
use webpilot::llm::OpenAiClient;

#[derive(Parser, Debug)]
#[command(name = "webpilot", version, about = "Drive a browser with an LLM to complete a task")]
struct Cli {
    /// 任务描述
    #[arg(short, long)]
    task: String,

    /// 配置文件（TOML）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别；RUST_LOG 优先
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 覆盖 agent.max_iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// 以无头模式启动浏览器
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    webpilot::observability::init(&cli.log_level);

    let mut cfg = load_config(cli.config.clone()).context("Failed to load configuration")?;
    if let Some(n) = cli.max_iterations {
        cfg.agent.max_iterations = n;
    }
    if cli.headless {
        cfg.browser.headless = true;
    }
    cfg.paths
        .ensure_dirs()
        .context("Failed to create data directories")?;

    let browser = launch_browser(&cfg).await?;
    let llm = Arc::new(OpenAiClient::from_config(&cfg.llm));
    tracing::info!(model = %cfg.llm.model, base_url = %cfg.llm.base_url, "LLM client ready");

    let orchestrator = match OrchestratorBuilder::new(cfg.clone())
        .with_operator(Arc::new(ConsoleOperator::new()))
        .build(llm, browser.clone())
    {
        Ok(o) => o,
        Err(e) => {
            let _ = browser.close().await;
            return Err(e).context("Failed to build orchestrator");
        }
    };

    let report = orchestrator.run(&cli.task).await;

    println!("\n{}\n{}\n{}", "=".repeat(60), report.result, "=".repeat(60));
    let path = write_report(&cfg, &report).await?;
    println!("Result saved to {}", path.display());
    Ok(())
}

#[cfg(feature = "browser")]
async fn launch_browser(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Browser>> {
    let browser = webpilot::browser::ChromeBrowser::launch(&cfg.browser)
        .await
        .context("Failed to launch Chrome")?;
    Ok(Arc::new(browser))
}

#[cfg(not(feature = "browser"))]
async fn launch_browser(_cfg: &AppConfig) -> anyhow::Result<Arc<dyn Browser>> {
    anyhow::bail!("webpilot was built without the `browser` feature; rebuild with `--features browser` to control Chrome")
}

async fn write_report(cfg: &AppConfig, report: &TaskReport) -> anyhow::Result<PathBuf> {
    let path = cfg
        .paths
        .output_dir
        .join(format!("task-{}.md", report.state.id));
    let body = format!(
        "# Task\n\n{}\n\n# Result\n\n{}\n\n_Turns: {} | Finished: {}_\n",
        report.state.task(),
        report.result,
        report.state.turn_count,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
    );
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
