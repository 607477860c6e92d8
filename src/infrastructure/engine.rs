//! 计算引擎边界 - 基础设施层
//!
//! 引擎对上层来说是一个不透明的异步调用：
//! 一次求值请求换回一个结构化结果，或者一个带可读信息的错误。

use async_trait::async_trait;

use crate::error::EngineError;
use crate::models::engine_result::EngineResult;
use crate::models::memory::{Ack, CalculatorMemory, SessionSnapshot};

/// 计算引擎
///
/// 职责：
/// - 对已经规范化的标记串求值
/// - 读取 / 清空会话记忆
/// - 不认识行、焦点、显示模式
///
/// 会话记忆以 `&mut` 显式传入，引擎自身不持有全局状态
#[async_trait]
pub trait ComputeEngine: Send + Sync {
    /// 对一个标记串求值
    async fn evaluate(
        &self,
        markup: &str,
        memory: &mut CalculatorMemory,
    ) -> Result<EngineResult, EngineError>;

    /// 读取当前会话状态
    async fn session_state(
        &self,
        memory: &CalculatorMemory,
    ) -> Result<SessionSnapshot, EngineError> {
        Ok(memory.snapshot())
    }

    /// 清空会话状态
    async fn clear(&self, memory: &mut CalculatorMemory) -> Result<Ack, EngineError> {
        memory.clear();
        Ok(Ack::ok())
    }
}
