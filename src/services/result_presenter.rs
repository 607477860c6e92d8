//! 结果展示服务 - 业务能力层
//!
//! 把引擎的结构化结果变成显示模型：
//! - 选择分隔符（定义用 `:=`，其它用 `=`，空结果不显示）
//! - 选择渲染路径（矩阵结果必须走矩阵渲染器，行内渲染器排不了多行矩阵）
//! - 符号 / 数值切换
//! - 赋值和函数定义前面加上名字徽标

use serde::Serialize;
use tracing::debug;

use crate::models::engine_result::{EngineResult, ResultKind};
use crate::models::row::{DisplayMode, EvaluationState, Row, RowId};
use crate::services::row_store::RowStore;

/// 分隔符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Separator {
    /// 定义为
    DefinedAs,
    /// 等于
    Equals,
}

impl Separator {
    pub fn glyph(self) -> &'static str {
        match self {
            Separator::DefinedAs => "\\coloneqq",
            Separator::Equals => "=",
        }
    }
}

/// 渲染路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPath {
    /// 标准行内数学渲染
    Inline,
    /// 支持多行矩阵的渲染
    Matrix,
}

/// 名字徽标
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub name: String,
    /// 只有函数定义才有参数列表
    pub params: Option<Vec<String>>,
}

impl Badge {
    /// `a` 或 `f(x, y)`
    pub fn label(&self) -> String {
        match &self.params {
            Some(params) => format!("{}({})", self.name, params.join(", ")),
            None => self.name.clone(),
        }
    }
}

/// 显示模型
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "display", rename_all = "snake_case")]
pub enum DisplayModel {
    /// 没有可显示的内容（未求值，或引擎返回空结果）
    Blank,
    /// 正在求值
    Pending,
    Value {
        separator: Separator,
        path: RenderPath,
        /// 当前激活的标记（符号或数值）
        markup: String,
        plain: Option<String>,
        badge: Option<Badge>,
        /// 存在不同的数值形式时才有切换控件，值为当前模式
        toggle: Option<DisplayMode>,
        /// 矩阵的行列数
        dimensions: Option<(usize, usize)>,
    },
    Error {
        message: String,
    },
}

/// 结果展示服务
pub struct ResultPresenter;

impl ResultPresenter {
    /// 以符号形式渲染
    pub fn render(result: &EngineResult) -> DisplayModel {
        Self::render_with(result, DisplayMode::Symbolic)
    }

    /// 以指定显示模式渲染
    ///
    /// 没有可用的数值形式时，数值模式退回符号形式
    pub fn render_with(result: &EngineResult, mode: DisplayMode) -> DisplayModel {
        if let Some(message) = result.error_message() {
            return DisplayModel::Error {
                message: message.to_string(),
            };
        }

        if result.kind == ResultKind::Empty {
            return DisplayModel::Blank;
        }

        let separator = if result.kind.is_definition() {
            Separator::DefinedAs
        } else {
            Separator::Equals
        };

        let path = if result.matrix {
            RenderPath::Matrix
        } else {
            RenderPath::Inline
        };

        let has_numeric = result.has_distinct_numeric();
        let active = if has_numeric { mode } else { DisplayMode::Symbolic };

        let (markup, plain) = match (active, result.numeric.as_ref()) {
            (DisplayMode::Numeric, Some(numeric)) => (
                numeric.clone(),
                result.numeric_plain.clone().or_else(|| result.plain.clone()),
            ),
            _ => (result.symbolic.clone(), result.plain.clone()),
        };

        let badge = if result.kind.is_definition() {
            result.name.as_ref().map(|name| Badge {
                name: name.clone(),
                params: match result.kind {
                    ResultKind::FunctionDef => Some(result.params.clone().unwrap_or_default()),
                    _ => None,
                },
            })
        } else {
            None
        };

        let dimensions = match (result.rows, result.cols) {
            (Some(rows), Some(cols)) if result.matrix => Some((rows, cols)),
            _ => None,
        };

        DisplayModel::Value {
            separator,
            path,
            markup,
            plain,
            badge,
            toggle: has_numeric.then_some(active),
            dimensions,
        }
    }

    /// 按行当前的状态渲染
    pub fn render_row(row: &Row) -> DisplayModel {
        match (row.evaluation_state, row.result.as_ref()) {
            (EvaluationState::Loading, _) => DisplayModel::Pending,
            (EvaluationState::Done | EvaluationState::Error, Some(result)) => {
                Self::render_with(result, row.display_mode)
            }
            _ => DisplayModel::Blank,
        }
    }

    /// 切换某一行的符号 / 数值显示
    ///
    /// 只有 `done` 状态且存在不同的数值形式时才会切换，返回新的显示模型
    pub fn toggle_numeric(store: &mut RowStore, id: RowId) -> Option<DisplayModel> {
        let row = store.get_mut(id)?;
        if row.evaluation_state != EvaluationState::Done {
            return None;
        }
        if !row.result.as_ref()?.has_distinct_numeric() {
            return None;
        }

        row.display_mode = row.display_mode.toggled();
        debug!("行 {} 切换显示模式为 {}", id, row.display_mode.as_str());
        Some(Self::render_row(row))
    }
}

impl DisplayModel {
    /// 当前显示的标记
    pub fn markup(&self) -> Option<&str> {
        match self {
            DisplayModel::Value { markup, .. } => Some(markup),
            _ => None,
        }
    }
}
