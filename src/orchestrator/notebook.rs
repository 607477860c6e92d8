//! 笔记本运行时 - 编排层
//!
//! ## 职责
//!
//! 把同步的 `SessionController` 和异步的 `EvaluationPipeline` 接起来：
//!
//! 1. **提交**：控制器给出的求值请求放进队列，立即返回，焦点已经在新行上
//! 2. **求值**：一个后台任务按提交顺序逐个求值（会话记忆的修改顺序因此确定）
//! 3. **回填**：结果经 channel 回到这里，由控制器做存在性检查后落到行上
//! 4. **统计**：提交 / 成功 / 失败 / 丢弃计数
//!
//! 求值期间行可以被删除、编辑、重新提交，结果回来时过期的会被丢弃。

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::EngineError;
use crate::infrastructure::ComputeEngine;
use crate::models::memory::{Ack, SessionSnapshot};
use crate::models::row::RowId;
use crate::orchestrator::session_controller::SessionController;
use crate::workflow::evaluation_ctx::EvaluationTicket;
use crate::workflow::evaluation_pipeline::{EvaluationOutcome, EvaluationPipeline};

const WORKER_STOPPED: &str = "求值任务已停止";

/// 会话统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotebookStats {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 回来时行已不在或状态已变的结果
    pub discarded: usize,
}

/// 笔记本
pub struct Notebook {
    controller: SessionController,
    pipeline: EvaluationPipeline,
    tickets: mpsc::UnboundedSender<EvaluationTicket>,
    outcomes: mpsc::UnboundedReceiver<EvaluationOutcome>,
    pending: usize,
    stats: NotebookStats,
    worker: JoinHandle<()>,
}

impl Notebook {
    /// 创建笔记本并启动求值任务
    ///
    /// 必须在 tokio 运行时内调用
    pub fn new(engine: Arc<dyn ComputeEngine>, config: &Config) -> Self {
        let pipeline = EvaluationPipeline::new(engine, config);
        let (ticket_tx, ticket_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_evaluations(pipeline.clone(), ticket_rx, outcome_tx));

        Self {
            controller: SessionController::new(),
            pipeline,
            tickets: ticket_tx,
            outcomes: outcome_rx,
            pending: 0,
            stats: NotebookStats::default(),
            worker,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// 用户交互（焦点、编辑、菜单、清理）直接作用在控制器上
    pub fn controller_mut(&mut self) -> &mut SessionController {
        &mut self.controller
    }

    /// 还在路上的求值数
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn stats(&self) -> NotebookStats {
        self.stats
    }

    /// 设置焦点行内容并提交
    pub fn enter(&mut self, content: impl Into<String>) -> Option<RowId> {
        self.controller.set_content(content);
        self.submit()
    }

    /// 提交焦点行
    ///
    /// 返回被送去求值的行；空行 / 文字行只新建一行，不求值
    pub fn submit(&mut self) -> Option<RowId> {
        let ticket = self.controller.submit()?;
        let row_id = ticket.row_id;

        if let Err(mpsc::error::SendError(ticket)) = self.tickets.send(ticket) {
            // 求值任务已经退出，直接把行标成失败
            warn!("[行 {}] 求值任务已停止，请求未送出", row_id);
            self.stats.submitted += 1;
            let outcome = self.pipeline.aborted(ticket, WORKER_STOPPED);
            self.absorb(outcome);
            return None;
        }
        self.pending += 1;
        self.stats.submitted += 1;
        Some(row_id)
    }

    /// 落地所有已经回来的结果，不等待
    pub fn apply_ready(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            self.absorb(outcome);
            applied += 1;
        }
        applied
    }

    /// 等待下一个结果并落地
    pub async fn next_completion(&mut self) -> Option<RowId> {
        if self.pending == 0 {
            return None;
        }
        let outcome = self.outcomes.recv().await?;
        self.pending = self.pending.saturating_sub(1);
        let row_id = outcome.ticket.row_id;
        self.absorb(outcome);
        Some(row_id)
    }

    /// 等待所有在途求值完成
    pub async fn settle(&mut self) {
        while self.next_completion().await.is_some() {}
    }

    fn absorb(&mut self, outcome: EvaluationOutcome) {
        let succeeded = outcome.result.is_ok();

        if !self.controller.apply_completion(outcome) {
            self.stats.discarded += 1;
        } else if succeeded {
            self.stats.succeeded += 1;
        } else {
            self.stats.failed += 1;
        }
    }

    /// 读取计算器记忆
    pub async fn memory_state(&self) -> Result<SessionSnapshot, EngineError> {
        self.pipeline.session_state().await
    }

    /// 清空计算器记忆（已显示的结果不变）
    pub async fn clear_memory(&self) -> Result<Ack, EngineError> {
        self.pipeline.clear_memory().await
    }
}

impl Drop for Notebook {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// 按提交顺序逐个求值
///
/// 每次求值放在单独的任务里：引擎 panic 只会让这一行失败，队列继续往下走
async fn run_evaluations(
    pipeline: EvaluationPipeline,
    mut tickets: mpsc::UnboundedReceiver<EvaluationTicket>,
    outcomes: mpsc::UnboundedSender<EvaluationOutcome>,
) {
    while let Some(ticket) = tickets.recv().await {
        let fallback = ticket.clone();
        let run = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(ticket).await }
        });

        let outcome = match run.await {
            Ok(outcome) => outcome,
            Err(e) => pipeline.aborted(fallback, &format!("求值任务异常终止: {}", e)),
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    info!("求值任务结束");
}
