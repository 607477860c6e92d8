//! 求值上下文
//!
//! 封装"哪一行、提交时是什么内容"这一信息。
//! 结果回来时只凭 `row_id` 找行，行已经不在了就丢弃。

use std::fmt::Display;

use crate::models::row::RowId;
use crate::utils::truncate_text;

/// 一次求值请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationTicket {
    /// 提交求值的行
    pub row_id: RowId,

    /// 提交时刻的原始标记（尚未规范化）
    pub markup: String,
}

impl EvaluationTicket {
    pub fn new(row_id: RowId, markup: impl Into<String>) -> Self {
        Self {
            row_id,
            markup: markup.into(),
        }
    }
}

impl Display for EvaluationTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[行 {}] {}", self.row_id, truncate_text(&self.markup, 40))
    }
}
