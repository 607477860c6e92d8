//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层持有会话状态并负责异步调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session_controller` - 会话控制器
//! - 持有行存储、焦点、打开的菜单
//! - 提交 / 退格 / 导航 / 点击空白处自动清理 / 右键菜单 / 矩阵插入
//! - 按 row id 做存在性检查后落地求值结果
//!
//! ### `notebook` - 笔记本运行时
//! - 启动后台求值任务（按提交顺序）
//! - 统计在途求值，等待完成
//! - 记忆查询与清空
//!
//! ## 层次关系
//!
//! ```text
//! notebook (异步调度)
//!     ↓
//! session_controller (会话状态机)
//!     ↓
//! workflow (RowController / EvaluationPipeline)
//!     ↓
//! services (能力层：normalizer / row_store / presenter)
//!     ↓
//! infrastructure (基础设施：ComputeEngine)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一所有者**：只有 notebook 持有引擎句柄和后台任务
//! 2. **失败止于行**：单行求值失败只影响这一行
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod notebook;
pub mod session_controller;

// 重新导出主要类型
pub use notebook::{Notebook, NotebookStats};
pub use session_controller::{RowAttributes, SessionController};
