//! 外部进程计算引擎 - 基础设施层
//!
//! 持有唯一的引擎子进程，只暴露"发一行 JSON 请求、收一行 JSON 响应"的能力。
//! 子进程退出后下一次调用会重新拉起，不做重试、退避或超时。

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::EngineError;
use crate::infrastructure::engine::ComputeEngine;
use crate::models::engine_result::EngineResult;
use crate::models::memory::{Ack, CalculatorMemory, SessionSnapshot};
use crate::utils::truncate_text;

/// 发给引擎进程的请求
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Evaluate { latex: &'a str },
    State,
    Clear,
}

/// 正在运行的引擎进程
struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// 外部进程计算引擎
///
/// 职责：
/// - 持有唯一的引擎子进程
/// - 暴露 call() / call_as() 能力
/// - 不认识行和会话
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
    worker: Mutex<Option<Worker>>,
}

impl ProcessEngine {
    /// 创建引擎（进程在第一次调用时才启动）
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            worker: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.engine_program.clone(), config.engine_args.clone())
    }

    fn spawn(&self) -> Result<Worker, EngineError> {
        info!("🚀 启动计算引擎进程: {} {}", self.program, self.args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::WorkerClosed)?;
        let stdout = child.stdout.take().ok_or(EngineError::WorkerClosed)?;

        Ok(Worker {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// 发送请求并返回 JSON 响应
    async fn call(&self, request: &Request<'_>) -> Result<JsonValue, EngineError> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');

        let mut guard = self.worker.lock().await;

        // 进程已经退出就丢掉，重新拉起
        if let Some(worker) = guard.as_mut() {
            if let Ok(Some(status)) = worker.child.try_wait() {
                warn!("⚠️ 计算引擎进程已退出 ({})，重新启动", status);
                *guard = None;
            }
        }
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let Some(worker) = guard.as_mut() else {
            return Err(EngineError::WorkerClosed);
        };

        debug!("→ 引擎: {}", truncate_text(line.trim_end(), 120));

        let response = match exchange(worker, &line).await {
            Ok(response) => response,
            Err(e) => {
                *guard = None;
                return Err(e);
            }
        };

        debug!("← 引擎: {}", truncate_text(&response, 120));
        Ok(serde_json::from_str(&response)?)
    }

    /// 发送请求并反序列化为指定类型
    async fn call_as<T: DeserializeOwned>(&self, request: &Request<'_>) -> Result<T, EngineError> {
        let json_value = self.call(request).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }
}

/// 一行请求换一行响应
async fn exchange(worker: &mut Worker, line: &str) -> Result<String, EngineError> {
    worker.stdin.write_all(line.as_bytes()).await?;
    worker.stdin.flush().await?;

    worker
        .stdout
        .next_line()
        .await?
        .ok_or(EngineError::WorkerClosed)
}

#[async_trait]
impl ComputeEngine for ProcessEngine {
    async fn evaluate(
        &self,
        markup: &str,
        _memory: &mut CalculatorMemory,
    ) -> Result<EngineResult, EngineError> {
        self.call_as(&Request::Evaluate { latex: markup }).await
    }

    /// 引擎进程里的状态才是权威的，带依赖信息
    async fn session_state(
        &self,
        _memory: &CalculatorMemory,
    ) -> Result<SessionSnapshot, EngineError> {
        self.call_as(&Request::State).await
    }

    async fn clear(&self, memory: &mut CalculatorMemory) -> Result<Ack, EngineError> {
        let ack: Ack = self.call_as(&Request::Clear).await?;
        if !ack.ok {
            return Err(EngineError::rejected(
                ack.error.unwrap_or_else(|| "clear rejected".to_string()),
            ));
        }
        memory.clear();
        Ok(ack)
    }
}
