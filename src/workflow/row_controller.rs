//! 行控制器 - 流程层
//!
//! 单行的编辑、提交、模式切换和右键菜单动作。
//! 所有操作都以 `RowStore` + row id 为输入，id 未知时是空操作。

use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, info};

use crate::models::row::{EditPhase, EvaluationEvent, EvaluationState, RowId, RowMode};
use crate::services::row_store::RowStore;
use crate::workflow::evaluation_ctx::EvaluationTicket;

/// 提交的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// 紧跟在提交行后面新建的行
    pub new_row: RowId,
    /// 需要求值时才有
    pub ticket: Option<EvaluationTicket>,
}

/// 右键菜单动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Delete,
    MoveUp,
    InsertAbove,
    InsertBelow,
}

impl FromStr for MenuAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delete" => Ok(MenuAction::Delete),
            "up" | "move-up" => Ok(MenuAction::MoveUp),
            "above" | "insert-above" => Ok(MenuAction::InsertAbove),
            "below" | "insert-below" => Ok(MenuAction::InsertBelow),
            other => Err(format!("未知的菜单动作: {}", other)),
        }
    }
}

impl Display for MenuAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MenuAction::Delete => "delete",
            MenuAction::MoveUp => "move-up",
            MenuAction::InsertAbove => "insert-above",
            MenuAction::InsertBelow => "insert-below",
        };
        f.write_str(name)
    }
}

/// 菜单动作的效果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEffect {
    /// 行被删掉了，附带它的前一行
    Deleted { previous: Option<RowId> },
    /// 新插入了一行
    Inserted(RowId),
    Moved,
    /// 什么都没发生（未知 id / 只剩一行）
    Nothing,
}

/// 行控制器
pub struct RowController;

impl RowController {
    /// 编辑器内容变化
    pub fn edit(store: &mut RowStore, id: RowId, content: impl Into<String>) -> bool {
        let Some(row) = store.get_mut(id) else {
            return false;
        };
        row.content = content.into();
        if row.mode == RowMode::Math {
            row.edit_phase = EditPhase::Editing;
        }
        true
    }

    /// 编辑器失去焦点
    pub fn finish_edit(store: &mut RowStore, id: RowId) {
        if let Some(row) = store.get_mut(id) {
            row.edit_phase = EditPhase::Idle;
        }
    }

    /// 提交（回车）
    ///
    /// 无论是否求值、求值成败，都会在当前行之后新建一行。
    /// 只有数学模式、内容非空、且当前状态允许 Submit 时才产生求值请求
    pub fn submit(store: &mut RowStore, id: RowId) -> Option<SubmitOutcome> {
        let row = store.get_mut(id)?;
        row.edit_phase = EditPhase::Idle;

        let ticket = if row.is_evaluable() && row.apply(EvaluationEvent::Submit) {
            Some(EvaluationTicket::new(id, row.content.clone()))
        } else {
            debug!(
                "[行 {}] 不需要求值 (模式 {}, 状态 {})",
                id,
                row.mode.as_str(),
                row.evaluation_state
            );
            None
        };

        let new_row = store.create_row(Some(id));
        Some(SubmitOutcome { new_row, ticket })
    }

    /// math → text，单向；求值中的行不能切换
    pub fn toggle_mode(store: &mut RowStore, id: RowId) -> bool {
        let Some(row) = store.get_mut(id) else {
            return false;
        };
        if row.evaluation_state == EvaluationState::Loading {
            debug!("[行 {}] 求值中，忽略模式切换", id);
            return false;
        }
        match row.mode.toggled() {
            Some(mode) => {
                row.mode = mode;
                row.edit_phase = EditPhase::Idle;
                info!("[行 {}] 切换为{}模式", id, mode.as_str());
                true
            }
            None => false,
        }
    }

    pub fn apply_menu_action(store: &mut RowStore, id: RowId, action: MenuAction) -> MenuEffect {
        if !store.contains(id) {
            return MenuEffect::Nothing;
        }

        match action {
            MenuAction::Delete => {
                if store.len() <= 1 {
                    return MenuEffect::Nothing;
                }
                let previous = store.delete_row(id);
                MenuEffect::Deleted { previous }
            }
            MenuAction::MoveUp => {
                store.move_up(id);
                MenuEffect::Moved
            }
            MenuAction::InsertAbove => match store.previous(id) {
                Some(previous) => MenuEffect::Inserted(store.create_row(Some(previous))),
                None => {
                    // 已经是第一行：先插到后面，再挪到最前
                    let new_row = store.create_row(Some(id));
                    store.move_up(new_row);
                    MenuEffect::Inserted(new_row)
                }
            },
            MenuAction::InsertBelow => MenuEffect::Inserted(store.create_row(Some(id))),
        }
    }
}
