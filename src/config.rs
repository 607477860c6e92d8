use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

/// 程序配置
///
/// ## 引擎进程约定
///
/// 默认的 `python3 cas_worker.py` 不随本仓库提供，需要用户自己准备（或用
/// `CAS_ENGINE_PROGRAM` / `CAS_ENGINE_ARGS` 指向别的程序）。任何程序只要满足下面的
/// 约定都可以当引擎：
///
/// - 从 stdin 逐行读取 JSON 请求，每个请求往 stdout 写且只写一行 JSON 响应
/// - `{"op":"evaluate","latex":"..."}` → `{"ok":true,"latex":"...","type":"value", ...}`，
///   可选字段 `numeric_latex` / `plain` / `name` / `params` / `is_matrix` / `rows` / `cols`；
///   失败时 `{"ok":false,"error":"..."}`
/// - `{"op":"state"}` → `{"variables":{...},"functions":{...}}`
/// - `{"op":"clear"}` → `{"ok":true}`
/// - 日志写 stderr，stdout 只留给响应
///
/// 进程退出后下一次请求会重新拉起它，会话记忆随之丢失。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 计算引擎进程的可执行程序
    pub engine_program: String,
    /// 计算引擎进程的参数
    pub engine_args: Vec<String>,
    /// 行内错误信息的最大字符数
    pub error_message_limit: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_program: "python3".to_string(),
            engine_args: vec!["cas_worker.py".to_string()],
            error_message_limit: 200,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从 TOML 文件加载配置，缺失的键使用默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(program) = lookup("CAS_ENGINE_PROGRAM") {
            self.engine_program = program;
        }
        if let Some(args) = lookup("CAS_ENGINE_ARGS") {
            self.engine_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(value) = lookup("ERROR_MESSAGE_LIMIT") {
            self.error_message_limit = parse_env("ERROR_MESSAGE_LIMIT", &value, "usize")?;
        }
        if let Some(value) = lookup("VERBOSE_LOGGING") {
            self.verbose_logging = parse_env("VERBOSE_LOGGING", &value, "bool")?;
        }
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(
    var_name: &str,
    value: &str,
    expected_type: &str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: expected_type.to_string(),
        })
}
