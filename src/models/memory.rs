//! 计算器记忆
//!
//! 引擎侧绑定的变量与函数。它是整个会话共享的可变状态，
//! 以显式对象的形式传给每一次求值调用，而不是藏在全局变量里。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::engine_result::{EngineResult, ResultKind};

/// 已定义的函数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBinding {
    pub params: Vec<String>,
    /// 函数体的显示标记
    pub body: String,
}

/// 计算器记忆
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculatorMemory {
    variables: BTreeMap<String, String>,
    functions: BTreeMap<String, FunctionBinding>,
}

impl CalculatorMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_variable(&mut self, name: impl Into<String>, markup: impl Into<String>) {
        self.variables.insert(name.into(), markup.into());
    }

    pub fn bind_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<String>,
        body: impl Into<String>,
    ) {
        self.functions.insert(
            name.into(),
            FunctionBinding {
                params,
                body: body.into(),
            },
        );
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionBinding> {
        self.functions.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.functions.is_empty()
    }

    /// 根据成功的赋值 / 函数定义结果更新绑定
    ///
    /// 返回是否记录了新的绑定
    pub fn record(&mut self, result: &EngineResult) -> bool {
        if !result.success {
            return false;
        }
        let Some(name) = result.name.as_deref() else {
            return false;
        };

        match result.kind {
            ResultKind::Assignment => {
                self.bind_variable(name, result.symbolic.clone());
                true
            }
            ResultKind::FunctionDef => {
                let params = result.params.clone().unwrap_or_default();
                self.bind_function(name, params, result.symbolic.clone());
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.variables.clear();
        self.functions.clear();
    }

    /// 生成状态快照
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            variables: self
                .variables
                .iter()
                .map(|(name, markup)| {
                    (
                        name.clone(),
                        VariableView {
                            latex: markup.clone(),
                            deps: Vec::new(),
                        },
                    )
                })
                .collect(),
            functions: self
                .functions
                .iter()
                .map(|(name, binding)| {
                    (
                        name.clone(),
                        FunctionView {
                            latex: binding.body.clone(),
                            params: binding.params.clone(),
                            deps: Vec::new(),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// 变量的显示形式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableView {
    pub latex: String,
    #[serde(default)]
    pub deps: Vec<String>,
}

/// 函数的显示形式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionView {
    pub latex: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub deps: Vec<String>,
}

/// 会话状态快照（引擎 `state` 调用的返回结构）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub variables: BTreeMap<String, VariableView>,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionView>,
}

/// 简单确认结构（引擎 `clear` 调用的返回）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }
}
