use thiserror::Error;

/// 应用程序错误类型
///
/// 注意：单行的求值失败不会以 `AppError` 的形式向上传播，
/// 它们在求值流水线里就被转换成行的 `error` 状态
#[derive(Debug, Error)]
pub enum AppError {
    /// 计算引擎错误
    #[error("计算引擎错误: {0}")]
    Engine(#[from] EngineError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// IO 错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 计算引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// 启动引擎进程失败
    #[error("无法启动引擎进程 `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// 与引擎进程通信失败
    #[error("与引擎通信失败: {0}")]
    Transport(#[from] std::io::Error),
    /// 引擎返回了无法解析的数据
    #[error("引擎协议错误: {0}")]
    Protocol(#[from] serde_json::Error),
    /// 引擎进程已退出
    #[error("引擎进程已关闭")]
    WorkerClosed,
    /// 引擎明确拒绝了请求
    #[error("{0}")]
    Rejected(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

impl EngineError {
    /// 创建引擎拒绝错误
    pub fn rejected(message: impl Into<String>) -> Self {
        EngineError::Rejected(message.into())
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
