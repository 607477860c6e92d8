//! 会话控制器 - 编排层
//!
//! ## 职责
//!
//! 持有整个笔记本的会话状态：有序的行、当前焦点、打开着的右键菜单（至多一个）。
//! 把用户意图（提交、退格、点击、菜单）翻译成对 `RowStore` / `RowController` 的调用。
//!
//! ## 不变量
//!
//! - 焦点总是指向一个存在的行
//! - 自动清理从不删除焦点行和最后一行
//! - 求值结果回来时先按 row id 做存在性检查，行不在了或者不在 `loading` 就丢弃

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::row::{DisplayMode, EvaluationState, Row, RowId, RowMode};
use crate::services::result_presenter::{DisplayModel, ResultPresenter};
use crate::services::row_store::RowStore;
use crate::workflow::evaluation_ctx::EvaluationTicket;
use crate::workflow::evaluation_pipeline::EvaluationOutcome;
use crate::workflow::row_controller::{MenuAction, MenuEffect, RowController};

/// 供外部测试工具检查的行属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowAttributes {
    pub id: RowId,
    /// 从 1 开始的显示序号
    pub index: usize,
    pub mode: RowMode,
    pub state: EvaluationState,
    pub display: DisplayMode,
    pub focused: bool,
}

/// 会话控制器
#[derive(Debug, Clone)]
pub struct SessionController {
    store: RowStore,
    focused: RowId,
    open_menu: Option<RowId>,
}

impl SessionController {
    /// 以一个空数学行启动，焦点在这一行
    pub fn new() -> Self {
        let store = RowStore::new();
        let focused = store.first().unwrap_or(RowId(1));
        Self {
            store,
            focused,
            open_menu: None,
        }
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    pub fn focused(&self) -> RowId {
        self.focused
    }

    pub fn open_menu_row(&self) -> Option<RowId> {
        self.open_menu
    }

    // ========== 焦点 ==========

    /// 纯指针更新，不影响求值状态
    pub fn focus(&mut self, id: RowId) -> bool {
        if !self.store.contains(id) {
            return false;
        }
        if self.focused != id {
            RowController::finish_edit(&mut self.store, self.focused);
            self.focused = id;
        }
        true
    }

    /// 聚焦第 `index` 行（从 1 开始）
    pub fn focus_index(&mut self, index: usize) -> bool {
        match index.checked_sub(1).and_then(|i| self.store.id_at(i)) {
            Some(id) => self.focus(id),
            None => false,
        }
    }

    pub fn focus_next(&mut self) -> bool {
        match self.store.next(self.focused) {
            Some(id) => self.focus(id),
            None => false,
        }
    }

    pub fn focus_previous(&mut self) -> bool {
        match self.store.previous(self.focused) {
            Some(id) => self.focus(id),
            None => false,
        }
    }

    /// 点击某一行：关闭菜单并聚焦
    pub fn click_row(&mut self, id: RowId) -> bool {
        self.close_menus();
        self.focus(id)
    }

    /// 焦点行被删掉后的兜底
    fn repair_focus(&mut self, preferred: Option<RowId>) {
        if self.store.contains(self.focused) {
            return;
        }
        self.focused = preferred
            .filter(|id| self.store.contains(*id))
            .or_else(|| self.store.first())
            .unwrap_or(self.focused);
    }

    // ========== 编辑 ==========

    /// 设置焦点行的内容
    pub fn set_content(&mut self, content: impl Into<String>) -> bool {
        RowController::edit(&mut self.store, self.focused, content)
    }

    /// 提交焦点行，焦点移到新建的行
    ///
    /// 返回需要交给求值流水线的请求（如果有）
    pub fn submit(&mut self) -> Option<EvaluationTicket> {
        let outcome = RowController::submit(&mut self.store, self.focused)?;
        self.focused = outcome.new_row;
        if let Some(ticket) = &outcome.ticket {
            info!("{} 📤 提交求值", ticket);
        }
        outcome.ticket
    }

    /// 在空的数学行上按退格：删除该行并聚焦前一行
    ///
    /// 只含空白也算空（和提交、自动清理一致）；唯一的一行不会被删除
    pub fn backspace(&mut self) -> bool {
        let id = self.focused;
        let Some(row) = self.store.get(id) else {
            return false;
        };
        if row.mode != RowMode::Math || !row.is_blank() || self.store.len() <= 1 {
            return false;
        }

        let previous = self.store.delete_row(id);
        if self.open_menu == Some(id) {
            self.open_menu = None;
        }
        self.repair_focus(previous);
        debug!("[行 {}] 退格删除，焦点移到 {}", id, self.focused);
        true
    }

    /// 焦点行切换为文字模式
    pub fn toggle_mode(&mut self) -> bool {
        RowController::toggle_mode(&mut self.store, self.focused)
    }

    // ========== 点击空白处 / 自动清理 ==========

    /// 点击所有行之外：关闭菜单并自动清理
    pub fn click_outside(&mut self) -> Vec<RowId> {
        self.close_menus();
        self.auto_cleanup()
    }

    /// 删除除最后一行和焦点行之外、内容为空且没有已完成结果的行
    pub fn auto_cleanup(&mut self) -> Vec<RowId> {
        let last = self.store.last();
        let doomed: Vec<RowId> = self
            .store
            .iter()
            .filter(|row| Some(row.id) != last && row.id != self.focused)
            .filter(|row| row.is_blank() && !row.has_completed_result())
            .map(|row| row.id)
            .collect();

        for id in &doomed {
            self.store.delete_row(*id);
        }
        if !doomed.is_empty() {
            info!("🧹 自动清理了 {} 个空行", doomed.len());
        }
        doomed
    }

    // ========== 右键菜单 ==========

    /// 打开某一行的菜单，之前打开的菜单随之关闭
    pub fn open_menu(&mut self, id: RowId) -> bool {
        if !self.store.contains(id) {
            return false;
        }
        self.open_menu = Some(id);
        true
    }

    pub fn close_menus(&mut self) {
        self.open_menu = None;
    }

    /// 执行菜单动作，执行后菜单关闭
    pub fn menu_action(&mut self, id: RowId, action: MenuAction) -> MenuEffect {
        self.close_menus();
        let effect = RowController::apply_menu_action(&mut self.store, id, action);
        debug!("[行 {}] 菜单动作 {} → {:?}", id, action, effect);

        match effect {
            MenuEffect::Deleted { previous } => self.repair_focus(previous),
            MenuEffect::Inserted(new_row) => self.focused = new_row,
            MenuEffect::Moved | MenuEffect::Nothing => {}
        }
        effect
    }

    // ========== 矩阵插入 ==========

    /// 在焦点行之后插入一个 `rows × cols` 的空矩阵模板并聚焦
    pub fn insert_matrix(&mut self, rows: usize, cols: usize) -> Option<RowId> {
        if rows == 0 || cols == 0 {
            return None;
        }
        let id = self.store.create_row(Some(self.focused));
        RowController::edit(&mut self.store, id, matrix_template(rows, cols));
        self.focused = id;
        Some(id)
    }

    // ========== 求值结果 ==========

    /// 把求值结果落到行上
    ///
    /// 行已被删除或者不在 `loading` 状态时丢弃结果，返回 false
    pub fn apply_completion(&mut self, outcome: EvaluationOutcome) -> bool {
        let id = outcome.ticket.row_id;
        let Some(row) = self.store.get_mut(id) else {
            debug!("[行 {}] 行已不存在，丢弃求值结果", id);
            return false;
        };
        if row.evaluation_state != EvaluationState::Loading {
            debug!("[行 {}] 状态为 {}，丢弃过期的求值结果", id, row.evaluation_state);
            return false;
        }
        if row.mode != RowMode::Math {
            debug!("[行 {}] 已不是数学行，丢弃求值结果", id);
            return false;
        }

        match outcome.result {
            Ok(result) => {
                info!("[行 {}] ✅ 求值完成", id);
                row.complete(result)
            }
            Err(message) => {
                warn!("[行 {}] ❌ 求值失败: {}", id, message);
                row.fail(message)
            }
        }
    }

    /// 切换某一行的符号 / 数值显示
    pub fn toggle_numeric(&mut self, id: RowId) -> Option<DisplayModel> {
        ResultPresenter::toggle_numeric(&mut self.store, id)
    }

    // ========== 查询 ==========

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.store.get(id)
    }

    pub fn display(&self, id: RowId) -> Option<DisplayModel> {
        self.store.get(id).map(ResultPresenter::render_row)
    }

    pub fn inspect(&self, id: RowId) -> Option<RowAttributes> {
        let row = self.store.get(id)?;
        let index = self.store.index_of(id)? + 1;
        Some(RowAttributes {
            id,
            index,
            mode: row.mode,
            state: row.evaluation_state,
            display: row.display_mode,
            focused: id == self.focused,
        })
    }

    /// 按文档顺序的所有行属性
    pub fn inspect_all(&self) -> Vec<RowAttributes> {
        self.store
            .ids()
            .into_iter()
            .filter_map(|id| self.inspect(id))
            .collect()
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

/// 空的 pmatrix 模板
fn matrix_template(rows: usize, cols: usize) -> String {
    let row = vec![""; cols].join(" & ");
    let body = vec![row; rows].join("\\\\");
    format!("\\begin{{pmatrix}}{}\\end{{pmatrix}}", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::engine_result::EngineResult;
    use crate::services::markup_normalizer::Classification;

    fn outcome(ticket: EvaluationTicket, result: Result<EngineResult, String>) -> EvaluationOutcome {
        EvaluationOutcome {
            classification: Classification::Plain {
                expression: ticket.markup.clone(),
            },
            ticket,
            result,
        }
    }

    /// 输入内容并提交，立即给出结果
    fn evaluate_now(session: &mut SessionController, content: &str, symbolic: &str) -> RowId {
        let id = session.focused();
        session.set_content(content);
        let ticket = session.submit().unwrap();
        assert!(session.apply_completion(outcome(ticket, Ok(EngineResult::expression(symbolic)))));
        id
    }

    #[test]
    fn test_boot_state() {
        let session = SessionController::new();
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.focused(), RowId(1));
        assert_eq!(session.open_menu_row(), None);
    }

    #[test]
    fn test_submit_moves_focus_to_new_row() {
        let mut session = SessionController::new();
        let first = session.focused();
        session.set_content("2+3");
        let ticket = session.submit().unwrap();

        assert_eq!(ticket.row_id, first);
        assert_eq!(session.store().len(), 2);
        assert_eq!(session.store().next(first), Some(session.focused()));
        assert_eq!(session.inspect(first).unwrap().state, EvaluationState::Loading);
    }

    #[test]
    fn test_auto_cleanup_keeps_results_and_last_row() {
        let mut session = SessionController::new();
        // [empty, "2+3"(done), empty, empty(focused/last)]
        session.submit();
        let done = evaluate_now(&mut session, "2+3", "5");
        session.submit();
        let last = session.focused();
        assert_eq!(session.store().len(), 4);

        let removed = session.click_outside();
        assert_eq!(removed.len(), 2);
        assert_eq!(session.store().ids(), vec![done, last]);
        assert_eq!(session.inspect(done).unwrap().state, EvaluationState::Done);
        assert_eq!(session.row(done).unwrap().content, "2+3");
    }

    #[test]
    fn test_auto_cleanup_spares_focused_row() {
        let mut session = SessionController::new();
        let first = session.focused();
        session.submit();
        session.focus(first);

        assert!(session.click_outside().is_empty());
        assert_eq!(session.store().len(), 2);
    }

    #[test]
    fn test_backspace_on_empty_row() {
        let mut session = SessionController::new();
        let first = session.focused();
        assert!(!session.backspace(), "唯一的行不能删");

        session.set_content("1");
        session.submit();
        let second = session.focused();
        assert!(session.backspace());
        assert!(!session.store().contains(second));
        assert_eq!(session.focused(), first);

        // 有内容时退格不删行
        assert!(!session.backspace());
    }

    #[test]
    fn test_backspace_treats_whitespace_as_empty() {
        let mut session = SessionController::new();
        let first = session.focused();
        session.submit();
        let second = session.focused();

        session.set_content("  \t ");
        assert!(session.backspace());
        assert!(!session.store().contains(second));
        assert_eq!(session.focused(), first);
    }

    #[test]
    fn test_backspace_on_first_row_focuses_new_first() {
        let mut session = SessionController::new();
        let first = session.focused();
        session.submit();
        let second = session.focused();
        session.focus(first);

        assert!(session.backspace());
        assert_eq!(session.focused(), second);
    }

    #[test]
    fn test_navigation_does_not_change_state() {
        let mut session = SessionController::new();
        let first = evaluate_now(&mut session, "1+1", "2");
        let second = session.focused();

        assert!(session.focus_previous());
        assert_eq!(session.focused(), first);
        assert!(!session.focus_previous());
        assert!(session.focus_next());
        assert_eq!(session.focused(), second);
        assert_eq!(session.inspect(first).unwrap().state, EvaluationState::Done);
        assert!(session.focus_index(1));
        assert_eq!(session.focused(), first);
        assert!(!session.focus_index(0));
    }

    #[test]
    fn test_single_open_menu() {
        let mut session = SessionController::new();
        let first = session.focused();
        session.submit();
        let second = session.focused();

        assert!(session.open_menu(first));
        assert!(session.open_menu(second));
        assert_eq!(session.open_menu_row(), Some(second));

        session.click_row(first);
        assert_eq!(session.open_menu_row(), None);

        session.open_menu(first);
        session.click_outside();
        assert_eq!(session.open_menu_row(), None);
    }

    #[test]
    fn test_menu_delete_refocuses() {
        let mut session = SessionController::new();
        let first = session.focused();
        session.submit();
        let second = session.focused();

        session.open_menu(second);
        assert_eq!(
            session.menu_action(second, MenuAction::Delete),
            MenuEffect::Deleted { previous: Some(first) }
        );
        assert_eq!(session.focused(), first);
        assert_eq!(session.open_menu_row(), None);

        let MenuEffect::Inserted(above) = session.menu_action(first, MenuAction::InsertAbove) else {
            panic!("应该插入新行");
        };
        assert_eq!(session.store().ids(), vec![above, first]);
        assert_eq!(session.focused(), above);
    }

    #[test]
    fn test_stale_completions_discarded() {
        let mut session = SessionController::new();
        let first = session.focused();
        session.set_content("x");
        let ticket = session.submit().unwrap();

        // 行在求值期间被删掉
        session.menu_action(first, MenuAction::Delete);
        assert!(!session.store().contains(first));
        assert!(!session.apply_completion(outcome(ticket.clone(), Ok(EngineResult::expression("x")))));

        // 不在 loading 的行
        let second = session.focused();
        let stray = EvaluationTicket::new(second, "y");
        assert!(!session.apply_completion(outcome(stray, Err("late".into()))));
        assert_eq!(session.inspect(second).unwrap().state, EvaluationState::Empty);
    }

    #[test]
    fn test_loading_row_keeps_math_mode() {
        let mut session = SessionController::new();
        let first = session.focused();
        session.set_content("x^2");
        let ticket = session.submit().unwrap();

        session.focus(first);
        assert!(!session.toggle_mode());
        assert_eq!(session.row(first).unwrap().mode, RowMode::Math);

        // 即便行已经变成文字行，迟到的结果也不会落上去
        session.store.get_mut(first).unwrap().mode = RowMode::Text;
        assert!(!session.apply_completion(outcome(ticket, Ok(EngineResult::expression("x^2")))));
        assert!(session.row(first).unwrap().result.is_none());
    }

    #[test]
    fn test_out_of_order_completion() {
        let mut session = SessionController::new();
        let a = session.focused();
        session.set_content("1");
        let first = session.submit().unwrap();
        let b = session.focused();
        session.set_content("2");
        let second = session.submit().unwrap();

        assert!(session.apply_completion(outcome(second, Err("boom".into()))));
        assert_eq!(session.inspect(a).unwrap().state, EvaluationState::Loading);
        assert!(session.apply_completion(outcome(first, Ok(EngineResult::expression("1")))));

        assert_eq!(session.inspect(a).unwrap().state, EvaluationState::Done);
        assert_eq!(session.inspect(b).unwrap().state, EvaluationState::Error);
        assert_eq!(
            session.display(b),
            Some(DisplayModel::Error { message: "boom".into() })
        );
    }

    #[test]
    fn test_insert_matrix_template() {
        assert_eq!(
            matrix_template(2, 2),
            "\\begin{pmatrix} & \\\\ & \\end{pmatrix}"
        );
        assert_eq!(matrix_template(1, 3), "\\begin{pmatrix} &  & \\end{pmatrix}");

        let mut session = SessionController::new();
        let first = session.focused();
        let id = session.insert_matrix(2, 2).unwrap();
        assert_eq!(session.focused(), id);
        assert_eq!(session.store().previous(id), Some(first));
        assert!(session.row(id).unwrap().content.starts_with("\\begin{pmatrix}"));
        assert_eq!(session.insert_matrix(0, 3), None);
    }

    #[test]
    fn test_inspect_serializes() {
        let mut session = SessionController::new();
        let id = evaluate_now(&mut session, "1/3", "\\frac{1}{3}");

        let json = serde_json::to_value(session.inspect(id).unwrap()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["index"], 1);
        assert_eq!(json["state"], "done");
        assert_eq!(json["display"], "symbolic");
        assert_eq!(json["mode"], "math");
        assert_eq!(session.inspect_all().len(), 2);
    }
}
