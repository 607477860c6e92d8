use anyhow::{Context, Result};
use std::path::PathBuf;

use calc_notebook::app::TerminalApp;
use calc_notebook::config::Config;
use calc_notebook::error::AppResult;
use calc_notebook::utils::logging;

const DEFAULT_CONFIG_FILE: &str = "calc-notebook.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = load_config().context("加载配置失败")?;

    // 初始化日志
    logging::init(&config);
    logging::log_startup(&config);

    // 初始化并运行应用
    TerminalApp::initialize(&config).run().await?;

    Ok(())
}

/// 配置文件（存在时）+ 环境变量覆盖
fn load_config() -> AppResult<Config> {
    let path = std::env::var("CALC_NOTEBOOK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config = if path.exists() {
        Config::load(&path)?
    } else {
        Config::default()
    };

    Ok(config.with_env_overrides()?)
}
