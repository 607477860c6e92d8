//! 行存储 - 业务能力层
//!
//! 持有有序的行集合以及 id → 行状态的映射。
//! 对未知 id 的任何操作都是静默的空操作：行可能在捕获用户意图和执行动作之间
//! 被自动清理删掉，这不是错误。

use indexmap::IndexMap;
use tracing::debug;

use crate::models::row::{Row, RowId};

/// 行存储
///
/// 不变量：
/// - 至少有一行（删除最后一行是空操作）
/// - id 单调分配，永不复用
#[derive(Debug, Clone)]
pub struct RowStore {
    rows: IndexMap<RowId, Row>,
    next_id: u64,
}

impl RowStore {
    /// 创建只含一个空数学行的存储
    pub fn new() -> Self {
        let mut store = Self {
            rows: IndexMap::new(),
            next_id: 1,
        };
        store.create_row(None);
        store
    }

    /// 在 `after` 之后插入新行；`after` 为空或未知时追加到末尾
    pub fn create_row(&mut self, after: Option<RowId>) -> RowId {
        let id = RowId(self.next_id);
        self.next_id += 1;

        let position = after
            .and_then(|after| self.rows.get_index_of(&after))
            .map(|index| index + 1)
            .unwrap_or(self.rows.len());

        self.rows.shift_insert(position, id, Row::new(id));
        debug!("新建行 {} (位置 {})", id, position + 1);
        id
    }

    /// 删除行，返回它前面那一行的 id
    ///
    /// 只剩一行、或 id 未知时什么都不做并返回 `None`
    pub fn delete_row(&mut self, id: RowId) -> Option<RowId> {
        if self.rows.len() <= 1 {
            debug!("拒绝删除行 {}: 这是最后一行", id);
            return None;
        }
        let (index, _, _) = self.rows.shift_remove_full(&id)?;
        debug!("删除行 {}", id);

        index
            .checked_sub(1)
            .and_then(|prev| self.rows.get_index(prev))
            .map(|(prev_id, _)| *prev_id)
    }

    /// 和前一行交换位置；已经是第一行时不动
    pub fn move_up(&mut self, id: RowId) {
        let Some(index) = self.rows.get_index_of(&id) else {
            return;
        };
        if index == 0 {
            return;
        }
        self.rows.swap_indices(index - 1, index);
    }

    /// 按文档顺序给出 (id, 显示序号)，序号从 1 开始
    pub fn renumber_all(&self) -> Vec<(RowId, usize)> {
        self.rows
            .keys()
            .enumerate()
            .map(|(index, id)| (*id, index + 1))
            .collect()
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut Row> {
        self.rows.get_mut(&id)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn index_of(&self, id: RowId) -> Option<usize> {
        self.rows.get_index_of(&id)
    }

    pub fn id_at(&self, index: usize) -> Option<RowId> {
        self.rows.get_index(index).map(|(id, _)| *id)
    }

    /// 前一行
    pub fn previous(&self, id: RowId) -> Option<RowId> {
        let index = self.index_of(id)?;
        index.checked_sub(1).and_then(|prev| self.id_at(prev))
    }

    /// 后一行
    pub fn next(&self, id: RowId) -> Option<RowId> {
        let index = self.index_of(id)?;
        self.id_at(index + 1)
    }

    pub fn first(&self) -> Option<RowId> {
        self.id_at(0)
    }

    pub fn last(&self) -> Option<RowId> {
        self.rows.last().map(|(id, _)| *id)
    }

    pub fn ids(&self) -> Vec<RowId> {
        self.rows.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }
}

impl Default for RowStore {
    fn default() -> Self {
        Self::new()
    }
}
