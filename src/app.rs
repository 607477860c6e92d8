//! 终端前端
//!
//! 逐行读取 stdin，把每一行翻译成一次用户交互，
//! 等在途求值完成后把整个笔记本打印到 stdout。

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::{ComputeEngine, ProcessEngine};
use crate::models::memory::SessionSnapshot;
use crate::models::row::{DisplayMode, RowId, RowMode};
use crate::orchestrator::{Notebook, NotebookStats, SessionController};
use crate::services::result_presenter::{DisplayModel, RenderPath};
use crate::workflow::MenuAction;

/// 一条终端命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 普通输入：写入焦点行并提交
    Enter(String),
    Up,
    Down,
    Focus(usize),
    Back,
    Text,
    Numeric(usize),
    Menu(usize, MenuAction),
    Away,
    Matrix(usize, usize),
    Vars,
    Clear,
    Quit,
}

/// 解析一行输入
pub fn parse_command(line: &str) -> Result<Command, String> {
    let Some(rest) = line.trim().strip_prefix(':') else {
        return Ok(Command::Enter(line.trim().to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    let number = |index: usize| -> Result<usize, String> {
        args.get(index)
            .ok_or_else(|| format!(":{} 缺少参数", name))?
            .parse()
            .map_err(|_| format!(":{} 的参数必须是正整数", name))
    };

    let command = match name {
        "up" => Command::Up,
        "down" => Command::Down,
        "focus" => Command::Focus(number(0)?),
        "back" => Command::Back,
        "text" => Command::Text,
        "num" => Command::Numeric(number(0)?),
        "menu" => {
            let action = args
                .get(1)
                .ok_or_else(|| ":menu 缺少动作".to_string())?
                .parse()?;
            Command::Menu(number(0)?, action)
        }
        "away" => Command::Away,
        "matrix" => Command::Matrix(number(0)?, number(1)?),
        "vars" => Command::Vars,
        "clear" => Command::Clear,
        "quit" | "q" => Command::Quit,
        other => return Err(format!("未知命令 :{}", other)),
    };
    Ok(command)
}

/// 终端应用
pub struct TerminalApp {
    notebook: Notebook,
}

impl TerminalApp {
    /// 用配置里的外部引擎初始化
    pub fn initialize(config: &Config) -> Self {
        Self::with_engine(Arc::new(ProcessEngine::from_config(config)), config)
    }

    pub fn with_engine(engine: Arc<dyn ComputeEngine>, config: &Config) -> Self {
        Self {
            notebook: Notebook::new(engine, config),
        }
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    /// 主循环
    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", render_notebook(self.notebook.controller()));

        while let Some(line) = lines.next_line().await.context("读取标准输入失败")? {
            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(message) => {
                    println!("⚠️ {}", message);
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }

            if let Some(message) = self.execute(command).await {
                println!("{}", message);
            }
            println!("{}", render_notebook(self.notebook.controller()));
        }

        print_session_stats(&self.notebook.stats());
        Ok(())
    }

    /// 执行一条命令并等待求值完成，返回需要额外打印的信息
    pub async fn execute(&mut self, command: Command) -> Option<String> {
        let message = self.dispatch(command).await;
        self.notebook.settle().await;
        message
    }

    async fn dispatch(&mut self, command: Command) -> Option<String> {
        let controller = self.notebook.controller_mut();
        match command {
            Command::Enter(content) => {
                self.notebook.enter(content);
            }
            Command::Up => {
                controller.focus_previous();
            }
            Command::Down => {
                controller.focus_next();
            }
            Command::Focus(index) => {
                if !controller.focus_index(index) {
                    return Some(format!("没有第 {} 行", index));
                }
            }
            Command::Back => {
                controller.backspace();
            }
            Command::Text => {
                controller.toggle_mode();
            }
            Command::Numeric(index) => {
                let Some(id) = row_at(controller, index) else {
                    return Some(format!("没有第 {} 行", index));
                };
                if controller.toggle_numeric(id).is_none() {
                    return Some(format!("第 {} 行没有可切换的数值形式", index));
                }
            }
            Command::Menu(index, action) => {
                let Some(id) = row_at(controller, index) else {
                    return Some(format!("没有第 {} 行", index));
                };
                controller.open_menu(id);
                controller.menu_action(id, action);
            }
            Command::Away => {
                controller.click_outside();
            }
            Command::Matrix(rows, cols) => {
                controller.insert_matrix(rows, cols);
            }
            Command::Vars => {
                return Some(match self.notebook.memory_state().await {
                    Ok(snapshot) => render_memory(&snapshot),
                    Err(e) => {
                        warn!("读取记忆失败: {}", e);
                        format!("⚠️ 读取记忆失败: {}", e)
                    }
                });
            }
            Command::Clear => {
                return Some(match self.notebook.clear_memory().await {
                    Ok(_) => "记忆已清空".to_string(),
                    Err(e) => format!("⚠️ 清空记忆失败: {}", e),
                });
            }
            Command::Quit => {}
        }
        None
    }
}

/// 显示序号（从 1 开始）对应的行
fn row_at(controller: &SessionController, index: usize) -> Option<RowId> {
    index.checked_sub(1).and_then(|i| controller.store().id_at(i))
}

/// 把整个笔记本渲染成文本
pub fn render_notebook(controller: &SessionController) -> String {
    let store = controller.store();
    let mut lines = Vec::with_capacity(store.len());

    for (id, index) in store.renumber_all() {
        let Some(row) = store.get(id) else {
            continue;
        };
        let marker = if id == controller.focused() { '>' } else { ' ' };

        let mut line = match row.mode {
            RowMode::Math => format!("{}[{}] {}", marker, index, row.content),
            RowMode::Text => format!("{}[{}] \" {}", marker, index, row.content),
        };
        if row.mode == RowMode::Math {
            let display = controller.display(id).unwrap_or(DisplayModel::Blank);
            line.push_str(&render_display(&display));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn render_display(model: &DisplayModel) -> String {
    match model {
        DisplayModel::Blank => String::new(),
        DisplayModel::Pending => "  ⏳".to_string(),
        DisplayModel::Error { message } => format!("  ⚠️ {}", message),
        DisplayModel::Value {
            separator,
            path,
            markup,
            badge,
            toggle,
            dimensions,
            ..
        } => {
            let mut out = String::from("  ");
            if let Some(badge) = badge {
                out.push_str(&badge.label());
                out.push(' ');
            }
            out.push_str(separator.glyph());
            out.push(' ');
            out.push_str(markup);
            if let (RenderPath::Matrix, Some((rows, cols))) = (path, dimensions) {
                out.push_str(&format!("  ({}×{})", rows, cols));
            }
            match toggle {
                Some(DisplayMode::Symbolic) => out.push_str("  [≈]"),
                Some(DisplayMode::Numeric) => out.push_str("  [≈ 数值]"),
                None => {}
            }
            out
        }
    }
}

fn render_memory(snapshot: &SessionSnapshot) -> String {
    if snapshot.variables.is_empty() && snapshot.functions.is_empty() {
        return "（记忆为空）".to_string();
    }

    let variables = snapshot
        .variables
        .iter()
        .map(|(name, view)| format!("  {} \\coloneqq {}", name, view.latex));
    let functions = snapshot.functions.iter().map(|(name, view)| {
        format!("  {}({}) \\coloneqq {}", name, view.params.join(", "), view.latex)
    });
    variables.chain(functions).collect::<Vec<_>>().join("\n")
}

fn print_session_stats(stats: &NotebookStats) {
    info!("{}", "=".repeat(60));
    info!("📊 会话统计");
    info!(
        "结束时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("📤 提交: {}", stats.submitted);
    info!("✅ 成功: {}", stats.succeeded);
    info!("❌ 失败: {}", stats.failed);
    info!("🗑️ 丢弃: {}", stats.discarded);
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::engine_result::EngineResult;
    use crate::models::memory::CalculatorMemory;
    use async_trait::async_trait;

    /// `name = value` 当赋值处理，`1/3` 带数值形式，其它原样返回
    struct TinyEngine;

    #[async_trait]
    impl ComputeEngine for TinyEngine {
        async fn evaluate(
            &self,
            markup: &str,
            _memory: &mut CalculatorMemory,
        ) -> Result<EngineResult, EngineError> {
            if let Some((name, value)) = markup.split_once('=') {
                return Ok(EngineResult::assignment(name.trim(), value.trim()));
            }
            if markup == "1/3" {
                return Ok(EngineResult::expression("\\frac{1}{3}").with_numeric("0.3333"));
            }
            Ok(EngineResult::expression(markup))
        }
    }

    fn app() -> TerminalApp {
        TerminalApp::with_engine(Arc::new(TinyEngine), &Config::default())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("1+1"), Ok(Command::Enter("1+1".into())));
        assert_eq!(parse_command(""), Ok(Command::Enter(String::new())));
        assert_eq!(parse_command(":focus 3"), Ok(Command::Focus(3)));
        assert_eq!(parse_command(":matrix 2 3"), Ok(Command::Matrix(2, 3)));
        assert_eq!(
            parse_command(":menu 2 above"),
            Ok(Command::Menu(2, MenuAction::InsertAbove))
        );
        assert_eq!(parse_command(":q"), Ok(Command::Quit));
        assert!(parse_command(":focus").is_err());
        assert!(parse_command(":focus x").is_err());
        assert!(parse_command(":menu 1 fly").is_err());
        assert!(parse_command(":dance").is_err());
    }

    #[tokio::test]
    async fn test_transcript_after_assignment() {
        let mut app = app();
        app.execute(Command::Enter("a = 5".into())).await;

        let transcript = render_notebook(app.notebook().controller());
        assert_eq!(transcript, " [1] a = 5  a \\coloneqq 5\n>[2] ");
    }

    #[tokio::test]
    async fn test_numeric_toggle_command() {
        let mut app = app();
        app.execute(Command::Enter("1/3".into())).await;
        assert!(render_notebook(app.notebook().controller()).contains("= \\frac{1}{3}  [≈]"));

        assert_eq!(app.execute(Command::Numeric(1)).await, None);
        assert!(render_notebook(app.notebook().controller()).contains("= 0.3333  [≈ 数值]"));

        assert!(app.execute(Command::Numeric(2)).await.is_some());
        assert_eq!(
            app.execute(Command::Numeric(9)).await.as_deref(),
            Some("没有第 9 行")
        );
    }

    #[tokio::test]
    async fn test_vars_and_clear() {
        let mut app = app();
        assert_eq!(app.execute(Command::Vars).await.as_deref(), Some("（记忆为空）"));

        app.execute(Command::Enter("b = 2".into())).await;
        let vars = app.execute(Command::Vars).await.unwrap();
        assert_eq!(vars, "  b \\coloneqq 2");

        app.execute(Command::Clear).await;
        assert_eq!(app.execute(Command::Vars).await.as_deref(), Some("（记忆为空）"));
    }

    #[tokio::test]
    async fn test_text_rows_render_as_notes() {
        let mut app = app();
        app.execute(Command::Text).await;
        app.execute(Command::Enter("shopping list".into())).await;

        let transcript = render_notebook(app.notebook().controller());
        assert!(transcript.starts_with(" [1] \" shopping list\n"));
        assert_eq!(app.notebook().stats().submitted, 0);
    }
}
