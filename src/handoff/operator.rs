//! 操作员接口：人工接管期间的提示输出与逐行输入
//!
//! - **ConsoleOperator**: 终端 stdin/stdout
//! - **ScriptedOperator**: 预置输入行（测试、演练），并记录所有提示

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};

use crate::core::AgentError;

/// 操作员：`read_line` 无超时阻塞；返回 Ok(None) 表示输入已结束
#[async_trait]
pub trait Operator: Send + Sync {
    async fn notify(&self, message: &str);

    async fn read_line(&self) -> Result<Option<String>, AgentError>;
}

pub struct ConsoleOperator {
    stdin: tokio::sync::Mutex<BufReader<Stdin>>,
}

impl ConsoleOperator {
    pub fn new() -> Self {
        Self {
            stdin: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for ConsoleOperator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    async fn notify(&self, message: &str) {
        let mut out = tokio::io::stdout();
        let _ = out.write_all(message.as_bytes()).await;
        let _ = out.write_all(b"\n").await;
        let _ = out.flush().await;
    }

    async fn read_line(&self) -> Result<Option<String>, AgentError> {
        let mut out = tokio::io::stdout();
        let _ = out.write_all(b"> ").await;
        let _ = out.flush().await;

        let mut line = String::new();
        let n = self
            .stdin
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| AgentError::OperatorIo(e.to_string()))?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[derive(Debug, Default)]
pub struct ScriptedOperator {
    lines: Mutex<VecDeque<String>>,
    notices: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: Mutex::new(lines.into_iter().map(Into::into).collect()),
            notices: Mutex::new(Vec::new()),
        }
    }

    /// 已输出给操作员的全部提示
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn notify(&self, message: &str) {
        if let Ok(mut n) = self.notices.lock() {
            n.push(message.to_string());
        }
    }

    async fn read_line(&self) -> Result<Option<String>, AgentError> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|e| AgentError::OperatorIo(e.to_string()))?;
        Ok(lines.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_operator_drains_then_ends() {
        let op = ScriptedOperator::new(["help", "done"]);
        op.notify("hello").await;
        assert_eq!(op.read_line().await.unwrap().as_deref(), Some("help"));
        assert_eq!(op.read_line().await.unwrap().as_deref(), Some("done"));
        assert_eq!(op.read_line().await.unwrap(), None);
        assert_eq!(op.notices(), vec!["hello".to_string()]);
        assert_eq!(op.remaining(), 0);
    }
}
