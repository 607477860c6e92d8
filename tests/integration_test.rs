use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use calc_notebook::config::Config;
use calc_notebook::error::EngineError;
use calc_notebook::models::{CalculatorMemory, EngineResult, EvaluationState};
use calc_notebook::orchestrator::Notebook;
use calc_notebook::services::DisplayModel;
use calc_notebook::workflow::MenuAction;

/// 脚本化的计算引擎
///
/// - `name = value` 是赋值
/// - 记忆里有的名字返回绑定的值
/// - 含 `fail` 的输入报错
/// - 含 `boom` 的输入直接 panic
/// - `1/3` 带数值形式
/// - 设置了闸门时，每次求值都要等放行
struct ScriptedEngine {
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: None,
        })
    }

    fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Some(gate),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl calc_notebook::ComputeEngine for ScriptedEngine {
    async fn evaluate(
        &self,
        markup: &str,
        memory: &mut CalculatorMemory,
    ) -> Result<EngineResult, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if markup.contains("boom") {
            panic!("engine crashed on {}", markup);
        }
        if markup.contains("fail") {
            return Err(EngineError::rejected(format!("cannot evaluate {}", markup)));
        }
        if let Some((name, value)) = markup.split_once('=') {
            return Ok(EngineResult::assignment(name.trim(), value.trim()));
        }
        if let Some(value) = memory.variable(markup) {
            return Ok(EngineResult::expression(value));
        }
        if markup == "1/3" {
            return Ok(EngineResult::expression("\\frac{1}{3}").with_numeric("0.333333333333333"));
        }
        Ok(EngineResult::expression(markup))
    }
}

fn notebook(engine: Arc<ScriptedEngine>) -> Notebook {
    Notebook::new(engine, &Config::default())
}

fn state(notebook: &Notebook, id: calc_notebook::RowId) -> EvaluationState {
    notebook.controller().inspect(id).unwrap().state
}

#[tokio::test]
async fn test_submit_creates_exactly_one_row_after_submitter() {
    let engine = ScriptedEngine::new();
    let mut notebook = notebook(engine.clone());

    for content in ["1+1", "fail here", "2*3"] {
        let before = notebook.controller().store().len();
        let row = notebook.enter(content).unwrap();
        notebook.settle().await;

        let store = notebook.controller().store();
        assert_eq!(store.len(), before + 1);
        assert_eq!(store.next(row), Some(notebook.controller().focused()));
    }

    assert_eq!(engine.calls(), 3);
}

#[tokio::test]
async fn test_empty_submit_never_calls_engine() {
    let engine = ScriptedEngine::new();
    let mut notebook = notebook(engine.clone());

    assert_eq!(notebook.enter(""), None);
    assert_eq!(notebook.enter("   "), None);
    notebook.settle().await;

    assert_eq!(engine.calls(), 0);
    assert_eq!(notebook.controller().store().len(), 3);
}

#[tokio::test]
async fn test_failure_replaces_previous_result() {
    let mut notebook = notebook(ScriptedEngine::new());
    let row = notebook.enter("1/3").unwrap();
    notebook.settle().await;
    assert_eq!(state(&notebook, row), EvaluationState::Done);
    notebook.controller_mut().toggle_numeric(row).unwrap();

    // 回到这一行，改成会失败的内容再提交
    let controller = notebook.controller_mut();
    controller.click_row(row);
    controller.set_content("fail 1/3");
    assert_eq!(notebook.submit(), Some(row));
    notebook.settle().await;

    assert_eq!(state(&notebook, row), EvaluationState::Error);
    let stored = notebook.controller().row(row).unwrap().result.clone().unwrap();
    assert!(!stored.success);
    assert!(stored.numeric.is_none());
    assert_eq!(stored.symbolic, "");
    assert_eq!(
        notebook.controller().display(row),
        Some(DisplayModel::Error {
            message: "cannot evaluate fail 1/3".into()
        })
    );
}

#[tokio::test]
async fn test_engine_panic_is_not_fatal_to_session() {
    let engine = ScriptedEngine::new();
    let mut notebook = notebook(engine.clone());

    let crashed = notebook.enter("boom").unwrap();
    notebook.settle().await;
    assert_eq!(state(&notebook, crashed), EvaluationState::Error);
    assert!(matches!(
        notebook.controller().display(crashed),
        Some(DisplayModel::Error { .. })
    ));

    let next = notebook.enter("1+1").expect("evaluation queue still running");
    notebook.settle().await;
    assert_eq!(state(&notebook, next), EvaluationState::Done);
    assert_eq!(notebook.pending(), 0);
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_row_deleted_while_pending() {
    let gate = Arc::new(Notify::new());
    let mut notebook = notebook(ScriptedEngine::gated(gate.clone()));

    let row = notebook.enter("x^2").unwrap();
    assert_eq!(state(&notebook, row), EvaluationState::Loading);

    notebook.controller_mut().menu_action(row, MenuAction::Delete);
    assert!(!notebook.controller().store().contains(row));

    gate.notify_one();
    notebook.settle().await;

    assert_eq!(notebook.stats().discarded, 1);
    assert_eq!(notebook.controller().store().len(), 1);
}

#[tokio::test]
async fn test_pending_rows_survive_other_interactions() {
    let gate = Arc::new(Notify::new());
    let mut notebook = notebook(ScriptedEngine::gated(gate.clone()));

    let row = notebook.enter("y").unwrap();
    let controller = notebook.controller_mut();
    controller.focus_previous();
    controller.focus_next();
    controller.click_outside();
    assert_eq!(state(&notebook, row), EvaluationState::Loading);
    assert_eq!(notebook.apply_ready(), 0);

    gate.notify_one();
    assert_eq!(notebook.next_completion().await, Some(row));
    assert_eq!(state(&notebook, row), EvaluationState::Done);
}

#[tokio::test]
async fn test_memory_shared_in_submit_order() {
    let mut notebook = notebook(ScriptedEngine::new());

    notebook.enter("a = 1");
    notebook.enter("a = 2");
    let read = notebook.enter("a").unwrap();
    notebook.settle().await;

    assert_eq!(notebook.controller().display(read).unwrap().markup(), Some("2"));

    let snapshot = notebook.memory_state().await.unwrap();
    assert_eq!(snapshot.variables["a"].latex, "2");

    notebook.clear_memory().await.unwrap();
    assert!(notebook.memory_state().await.unwrap().variables.is_empty());

    // 清空记忆后再求值，名字不再有绑定
    let again = notebook.enter("a").unwrap();
    notebook.settle().await;
    assert_eq!(notebook.controller().display(again).unwrap().markup(), Some("a"));
}

#[tokio::test]
async fn test_toggle_numeric_twice_restores_symbolic() {
    let mut notebook = notebook(ScriptedEngine::new());
    let row = notebook.enter("1/3").unwrap();
    notebook.settle().await;

    let original = notebook.controller().display(row).unwrap();
    let controller = notebook.controller_mut();
    let numeric = controller.toggle_numeric(row).unwrap();
    assert_eq!(numeric.markup(), Some("0.333333333333333"));
    assert_eq!(controller.toggle_numeric(row).unwrap(), original);
    assert_eq!(original.markup(), Some("\\frac{1}{3}"));
}

#[tokio::test]
async fn test_click_away_cleanup_keeps_evaluated_rows() {
    let mut notebook = notebook(ScriptedEngine::new());

    // [empty, "2+3"(done), empty, empty(focused/last)]
    notebook.submit();
    let evaluated = notebook.enter("2+3").unwrap();
    notebook.submit();
    notebook.settle().await;
    let last = notebook.controller().focused();
    assert_eq!(notebook.controller().store().len(), 4);

    notebook.controller_mut().click_outside();

    let controller = notebook.controller();
    assert_eq!(controller.store().ids(), vec![evaluated, last]);
    assert_eq!(controller.inspect(evaluated).unwrap().index, 1);
    assert_eq!(controller.display(evaluated).unwrap().markup(), Some("2+3"));
}

#[tokio::test]
async fn test_structural_edits_never_empty_the_notebook() {
    let mut notebook = notebook(ScriptedEngine::new());
    notebook.enter("1");
    notebook.settle().await;

    let controller = notebook.controller_mut();
    for _ in 0..5 {
        let focused = controller.focused();
        controller.menu_action(focused, MenuAction::Delete);
        controller.backspace();
        controller.click_outside();
        assert!(controller.store().len() >= 1);
        assert!(controller.store().contains(controller.focused()));
    }
    assert_eq!(controller.store().len(), 1);
}
