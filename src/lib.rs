//! # Calc Notebook
//!
//! 一个笔记本式交互计算器的核心：行状态机、标记规范化与分类、
//! 异步求值流水线、结果展示、会话控制器
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（引擎进程），只暴露能力
//! - `ComputeEngine` - 引擎边界 trait：evaluate / session_state / clear
//! - `ProcessEngine` - 外部进程实现，一行 JSON 请求换一行 JSON 响应
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不持有会话状态
//! - `markup_normalizer` - normalize / classify
//! - `RowStore` - 有序行集合
//! - `ResultPresenter` - 结果 → 显示模型，符号 / 数值切换
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一行"的处理流程
//! - `EvaluationTicket` - 上下文封装（row id + 提交时的内容）
//! - `RowController` - 编辑 / 提交 / 模式切换 / 菜单动作
//! - `EvaluationPipeline` - normalize → classify → 引擎 → 记忆
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_controller` - 焦点、菜单、自动清理、结果回填
//! - `orchestrator/notebook` - 后台求值任务与在途计数
//!
//! ## 模块结构

pub mod app;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ConfigError, EngineError};
pub use infrastructure::{ComputeEngine, ProcessEngine};
pub use models::{CalculatorMemory, EngineResult, Row, RowId};
pub use orchestrator::{Notebook, SessionController};
pub use services::{classify, normalize, Classification, DisplayModel, ResultPresenter, RowStore};
pub use workflow::{EvaluationOutcome, EvaluationPipeline, EvaluationTicket, MenuAction};
