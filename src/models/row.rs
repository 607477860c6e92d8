//! 行（Row）数据模型
//!
//! 笔记本的基本单元：一行数学表达式，或者一段文字笔记。
//! 行的求值状态和模式都是显式的枚举，状态转移只能通过转移表进行。

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::models::engine_result::EngineResult;

/// 行标识
///
/// 会话内单调分配，删除后也不会被复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowMode {
    /// 数学表达式（可求值）
    #[default]
    Math,
    /// 文字笔记（永不求值）
    Text,
}

impl RowMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RowMode::Math => "math",
            RowMode::Text => "text",
        }
    }

    /// 模式切换只有 math → text 一个方向
    pub fn toggled(self) -> Option<RowMode> {
        match self {
            RowMode::Math => Some(RowMode::Text),
            RowMode::Text => None,
        }
    }
}

/// 编辑子状态（math-idle ⇄ math-editing）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditPhase {
    #[default]
    Idle,
    Editing,
}

/// 求值状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationState {
    #[default]
    Empty,
    Loading,
    Done,
    Error,
}

/// 驱动求值状态机的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationEvent {
    /// 提交求值
    Submit,
    /// 引擎返回结果
    Succeed,
    /// 引擎报告失败
    Fail,
}

impl EvaluationState {
    /// 状态转移表
    ///
    /// 合法转移：
    /// - `empty | done | error` --Submit--> `loading`
    /// - `loading` --Succeed--> `done`
    /// - `loading` --Fail--> `error`
    ///
    /// 其余组合返回 `None`，调用方应当忽略该事件
    pub fn on(self, event: EvaluationEvent) -> Option<EvaluationState> {
        match (self, event) {
            (
                EvaluationState::Empty | EvaluationState::Done | EvaluationState::Error,
                EvaluationEvent::Submit,
            ) => Some(EvaluationState::Loading),
            (EvaluationState::Loading, EvaluationEvent::Succeed) => Some(EvaluationState::Done),
            (EvaluationState::Loading, EvaluationEvent::Fail) => Some(EvaluationState::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationState::Empty => "empty",
            EvaluationState::Loading => "loading",
            EvaluationState::Done => "done",
            EvaluationState::Error => "error",
        }
    }
}

impl Display for EvaluationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结果显示模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Symbolic,
    Numeric,
}

impl DisplayMode {
    pub fn toggled(self) -> DisplayMode {
        match self {
            DisplayMode::Symbolic => DisplayMode::Numeric,
            DisplayMode::Numeric => DisplayMode::Symbolic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Symbolic => "symbolic",
            DisplayMode::Numeric => "numeric",
        }
    }
}

/// 笔记本中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub mode: RowMode,
    /// 数学模式下是标记串，文字模式下是纯文本
    pub content: String,
    pub edit_phase: EditPhase,
    pub evaluation_state: EvaluationState,
    pub display_mode: DisplayMode,
    /// 只在 `done` / `error` 状态下存在
    pub result: Option<EngineResult>,
}

impl Row {
    /// 创建一个空的数学行
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            mode: RowMode::Math,
            content: String::new(),
            edit_phase: EditPhase::Idle,
            evaluation_state: EvaluationState::Empty,
            display_mode: DisplayMode::Symbolic,
            result: None,
        }
    }

    pub fn with_content(id: RowId, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::new(id)
        }
    }

    /// 内容为空（只含空白也算空）
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// 是否持有已完成的结果
    pub fn has_completed_result(&self) -> bool {
        self.result.is_some()
            && matches!(
                self.evaluation_state,
                EvaluationState::Done | EvaluationState::Error
            )
    }

    /// 数学模式且内容非空时才值得求值
    pub fn is_evaluable(&self) -> bool {
        self.mode == RowMode::Math && !self.is_blank()
    }

    /// 应用求值事件，非法转移返回 false 且不改变状态
    pub fn apply(&mut self, event: EvaluationEvent) -> bool {
        match self.evaluation_state.on(event) {
            Some(next) => {
                self.evaluation_state = next;
                true
            }
            None => false,
        }
    }

    /// loading → done，整体替换旧结果
    pub fn complete(&mut self, result: EngineResult) -> bool {
        if !self.apply(EvaluationEvent::Succeed) {
            return false;
        }
        self.result = Some(result);
        self.display_mode = DisplayMode::Symbolic;
        true
    }

    /// loading → error，旧的成功结果不会残留
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.apply(EvaluationEvent::Fail) {
            return false;
        }
        self.result = Some(EngineResult::failure(message));
        self.display_mode = DisplayMode::Symbolic;
        true
    }
}
