//! 截图工具与快照保存

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::browser::Browser;
use crate::tools::{arg_str, ParamKind, ParamSpec, Tool};

const MAX_LABEL_CHARS: usize = 40;

/// 文件名安全化：仅保留字母数字、`-`、`_`，其余替换为 `_`
pub fn sanitize_label(label: &str) -> String {
    let s: String = label
        .trim()
        .chars()
        .take(MAX_LABEL_CHARS)
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if s.is_empty() {
        "snapshot".to_string()
    } else {
        s
    }
}

/// 截图并写入 `dir/<label>_<timestamp>.png`，返回文件路径
pub async fn save_screenshot(
    browser: &dyn Browser,
    dir: &Path,
    label: &str,
) -> Result<PathBuf, String> {
    let bytes = browser.screenshot().await.map_err(|e| e.to_string())?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    let path = dir.join(format!("{}_{}.png", sanitize_label(label), stamp));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    Ok(path)
}

pub struct TakeScreenshotTool {
    browser: Arc<dyn Browser>,
    dir: PathBuf,
}

impl TakeScreenshotTool {
    pub fn new(browser: Arc<dyn Browser>, dir: impl Into<PathBuf>) -> Self {
        Self {
            browser,
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl Tool for TakeScreenshotTool {
    fn name(&self) -> &str {
        "take_screenshot"
    }

    fn description(&self) -> &str {
        "Save a screenshot of the current page"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::optional(
            "description",
            ParamKind::String,
            "short label used in the file name",
        )]
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let label = arg_str(&args, "description").unwrap_or("screenshot");
        let path = save_screenshot(self.browser.as_ref(), &self.dir, label).await?;
        Ok(format!("Screenshot saved to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowser;
    use serde_json::json;

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("login page / step 2"), "login_page___step_2");
        assert_eq!(sanitize_label("   "), "snapshot");
        assert_eq!(sanitize_label(&"a".repeat(100)).len(), MAX_LABEL_CHARS);
    }

    #[tokio::test]
    async fn test_screenshot_written_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Arc::new(MockBrowser::new());
        let tool = TakeScreenshotTool::new(browser.clone(), dir.path().join("shots"));
        let out = tool.execute(json!({"description": "home"})).await.unwrap();
        assert!(out.starts_with("Screenshot saved to "));
        let path = PathBuf::from(out.trim_start_matches("Screenshot saved to "));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("home_"));
        assert_eq!(std::fs::read(&path).unwrap()[1..4], *b"PNG");
        assert_eq!(browser.screenshot_count(), 1);
    }
}
