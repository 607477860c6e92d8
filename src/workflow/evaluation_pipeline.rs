//! 求值流水线 - 流程层
//!
//! 核心职责：定义"一行"的完整求值流程
//!
//! 流程顺序：
//! 1. normalize → classify
//! 2. 调用计算引擎（持有会话记忆锁）
//! 3. 成功的赋值 / 函数定义写入记忆
//! 4. 失败（引擎报错或 `ok = false`）转换为截断后的错误信息
//!
//! 流水线不碰行存储：结果以 `EvaluationOutcome` 交还给会话控制器，
//! 由它按 row id 做存在性检查后再落到行上。

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::EngineError;
use crate::infrastructure::ComputeEngine;
use crate::models::engine_result::{EngineResult, ResultKind};
use crate::models::memory::{Ack, CalculatorMemory, SessionSnapshot};
use crate::services::markup_normalizer::{classify, normalize, Classification};
use crate::utils::truncate_text;
use crate::workflow::evaluation_ctx::EvaluationTicket;

/// 一次求值的结果
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    pub ticket: EvaluationTicket,
    pub classification: Classification,
    /// 成功时是引擎结果，失败时是截断后的错误信息
    pub result: Result<EngineResult, String>,
}

/// 求值流水线
///
/// - 持有引擎和会话记忆的共享句柄
/// - 不重试，不退避：捕获、标记、报告
#[derive(Clone)]
pub struct EvaluationPipeline {
    engine: Arc<dyn ComputeEngine>,
    memory: Arc<Mutex<CalculatorMemory>>,
    error_message_limit: usize,
}

impl EvaluationPipeline {
    pub fn new(engine: Arc<dyn ComputeEngine>, config: &Config) -> Self {
        Self {
            engine,
            memory: Arc::new(Mutex::new(CalculatorMemory::new())),
            error_message_limit: config.error_message_limit,
        }
    }

    /// 会话记忆的共享句柄
    pub fn memory(&self) -> Arc<Mutex<CalculatorMemory>> {
        Arc::clone(&self.memory)
    }

    pub async fn run(&self, ticket: EvaluationTicket) -> EvaluationOutcome {
        let cleaned = normalize(&ticket.markup);
        let classification = classify(&cleaned);
        info!("{} ⏳ 开始求值 ({})", ticket, classification);

        let result = {
            let mut memory = self.memory.lock().await;
            match self.engine.evaluate(&cleaned, &mut memory).await {
                Ok(result) if result.success => {
                    let result = fill_binding(result, &classification);
                    if memory.record(&result) {
                        debug!("{} 记忆已更新: {:?}", ticket, result.name);
                    }
                    Ok(result)
                }
                Ok(result) => Err(result
                    .error_message()
                    .unwrap_or("unknown engine error")
                    .to_string()),
                Err(e) => Err(e.to_string()),
            }
        };

        let result = result.map_err(|message| {
            warn!("{} ❌ 引擎报告失败: {}", ticket, truncate_text(&message, 80));
            truncate_text(&message, self.error_message_limit)
        });

        EvaluationOutcome {
            ticket,
            classification,
            result,
        }
    }

    /// 求值没有跑完（任务 panic / 被取消）时的失败结果
    pub fn aborted(&self, ticket: EvaluationTicket, reason: &str) -> EvaluationOutcome {
        let classification = classify(&normalize(&ticket.markup));
        warn!("{} 💥 求值异常中止: {}", ticket, truncate_text(reason, 80));
        EvaluationOutcome {
            ticket,
            classification,
            result: Err(truncate_text(reason, self.error_message_limit)),
        }
    }

    pub async fn session_state(&self) -> Result<SessionSnapshot, EngineError> {
        let memory = self.memory.lock().await;
        self.engine.session_state(&memory).await
    }

    pub async fn clear_memory(&self) -> Result<Ack, EngineError> {
        let mut memory = self.memory.lock().await;
        let ack = self.engine.clear(&mut memory).await?;
        info!("🧹 计算器记忆已清空");
        Ok(ack)
    }
}

/// 引擎没有带回绑定名时，用分类结果补上（徽标需要）
fn fill_binding(mut result: EngineResult, classification: &Classification) -> EngineResult {
    if !result.kind.is_definition() || result.name.is_some() {
        return result;
    }

    match (result.kind, classification) {
        (ResultKind::Assignment, Classification::Assignment { name, .. }) => {
            result.name = Some(name.clone());
        }
        (ResultKind::FunctionDef, Classification::FunctionDef { name, params, .. }) => {
            result.name = Some(name.clone());
            if result.params.is_none() {
                result.params = Some(params.clone());
            }
        }
        _ => {}
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::row::RowId;
    use async_trait::async_trait;

    /// 按输入返回固定结果的引擎
    struct TableEngine;

    #[async_trait]
    impl ComputeEngine for TableEngine {
        async fn evaluate(
            &self,
            markup: &str,
            _memory: &mut CalculatorMemory,
        ) -> Result<EngineResult, EngineError> {
            match markup {
                "a=5" => Ok(EngineResult {
                    name: None,
                    ..EngineResult::assignment("a", "5")
                }),
                "1/0" => Ok(EngineResult::failure("division by zero")),
                "crash" => Err(EngineError::WorkerClosed),
                other => Ok(EngineResult::expression(other)),
            }
        }
    }

    fn pipeline(limit: usize) -> EvaluationPipeline {
        let config = Config {
            error_message_limit: limit,
            ..Config::default()
        };
        EvaluationPipeline::new(Arc::new(TableEngine), &config)
    }

    #[tokio::test]
    async fn test_normalizes_before_engine_call() {
        let outcome = pipeline(200)
            .run(EvaluationTicket::new(RowId(1), "\\left(2*3\\right)"))
            .await;
        assert_eq!(outcome.result.unwrap().symbolic, "(2 * 3)");
        assert!(matches!(outcome.classification, Classification::Plain { .. }));
    }

    #[tokio::test]
    async fn test_assignment_recorded_with_fallback_name() {
        let pipeline = pipeline(200);
        let outcome = pipeline.run(EvaluationTicket::new(RowId(1), "a=5")).await;

        let result = outcome.result.unwrap();
        assert_eq!(result.name.as_deref(), Some("a"));
        assert_eq!(pipeline.memory().lock().await.variable("a"), Some("5"));

        let snapshot = pipeline.session_state().await.unwrap();
        assert!(snapshot.variables.contains_key("a"));

        pipeline.clear_memory().await.unwrap();
        assert!(pipeline.memory().lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_become_messages() {
        let pipeline = pipeline(200);

        let outcome = pipeline.run(EvaluationTicket::new(RowId(2), "1/0")).await;
        assert_eq!(outcome.result, Err("division by zero".to_string()));

        let outcome = pipeline.run(EvaluationTicket::new(RowId(3), "crash")).await;
        assert_eq!(outcome.result, Err(EngineError::WorkerClosed.to_string()));
    }

    #[tokio::test]
    async fn test_error_message_truncated() {
        let outcome = pipeline(5)
            .run(EvaluationTicket::new(RowId(2), "1/0"))
            .await;
        assert_eq!(outcome.result, Err("divis...".to_string()));
    }

    #[test]
    fn test_aborted_outcome_is_truncated_failure() {
        let outcome = pipeline(6).aborted(EvaluationTicket::new(RowId(4), "x=1"), "task panicked");
        assert_eq!(outcome.ticket.row_id, RowId(4));
        assert_eq!(outcome.result, Err("task p...".to_string()));
        assert!(matches!(outcome.classification, Classification::Assignment { .. }));
    }
}
