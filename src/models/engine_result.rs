//! 计算引擎的结构化结果
//!
//! 字段名与引擎的 JSON 协议保持一致（`ok` / `latex` / `numeric_latex` / `type` ...）

use serde::{Deserialize, Serialize};

/// 结果类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// 空输入，不显示任何分隔符
    Empty,
    /// 变量赋值 `x = ...`
    Assignment,
    /// 函数定义 `f(x) = ...`
    FunctionDef,
    /// 普通表达式（引擎的 value / command / equation 都归到这里）
    #[default]
    #[serde(alias = "value", alias = "command", alias = "equation")]
    Expression,
}

impl ResultKind {
    /// 赋值与函数定义会绑定名字
    pub fn is_definition(self) -> bool {
        matches!(self, ResultKind::Assignment | ResultKind::FunctionDef)
    }
}

/// 引擎返回的结构化结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineResult {
    #[serde(rename = "ok")]
    pub success: bool,

    /// 符号形式的显示标记
    #[serde(rename = "latex", default)]
    pub symbolic: String,

    /// 数值近似的显示标记
    #[serde(rename = "numeric_latex", default, skip_serializing_if = "Option::is_none")]
    pub numeric: Option<String>,

    /// 纯文本兜底
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_plain: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: ResultKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,

    #[serde(rename = "is_matrix", default)]
    pub matrix: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineResult {
    pub fn expression(symbolic: impl Into<String>) -> Self {
        Self {
            success: true,
            symbolic: symbolic.into(),
            kind: ResultKind::Expression,
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self {
            success: true,
            kind: ResultKind::Empty,
            plain: Some(String::new()),
            ..Default::default()
        }
    }

    pub fn assignment(name: impl Into<String>, symbolic: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: ResultKind::Assignment,
            ..Self::expression(symbolic)
        }
    }

    pub fn function_def(
        name: impl Into<String>,
        params: Vec<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            params: Some(params),
            kind: ResultKind::FunctionDef,
            ..Self::expression(body)
        }
    }

    pub fn matrix(symbolic: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self {
            matrix: true,
            rows: Some(rows),
            cols: Some(cols),
            ..Self::expression(symbolic)
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_numeric(mut self, numeric: impl Into<String>) -> Self {
        self.numeric = Some(numeric.into());
        self
    }

    pub fn with_plain(mut self, plain: impl Into<String>) -> Self {
        self.plain = Some(plain.into());
        self
    }

    /// 数值形式存在且与符号形式不同
    pub fn has_distinct_numeric(&self) -> bool {
        match self.numeric.as_deref() {
            Some(numeric) => !numeric.trim().is_empty() && numeric != self.symbolic,
            None => false,
        }
    }

    /// 失败结果的错误信息
    pub fn error_message(&self) -> Option<&str> {
        if self.success {
            return None;
        }
        Some(self.error.as_deref().unwrap_or("unknown engine error"))
    }
}
