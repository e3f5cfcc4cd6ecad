pub mod dual_prefix;
pub mod prefix;
pub mod range;
pub mod rate_plan;
pub mod trie;
pub mod validity;

use serde::Serialize;

use crate::core::LoadError;
use crate::source::{FormFactor, Row, RowSource};

/// 各类查找缓存的能力抽象：批量构建 → 只读查询 → 整体 clear/重建。
///
/// ## 契约（重要）
/// - 构建期（`add_row` / 各自的 `add_*`）单线程执行；任一错误都意味着整次加载作废，
///   调用方不得发布部分构建的实例。
/// - 构建完成后实例不再变更，查询方法只读、可并发。
/// - 查询未命中不是错误：返回 `None` / 空切片。
pub trait LookupIndex: Default + Send + Sync + 'static {
    /// 本缓存行格式的字段数约束
    fn form_factor() -> FormFactor;

    /// 接收一行已切分字段，解析类型后调用对应的 `add_*`
    fn add_row(&mut self, row: &Row) -> Result<(), LoadError>;

    /// 丢弃所有 group
    fn clear(&mut self);

    fn group_count(&self) -> usize;

    fn object_count(&self) -> usize;

    /// 诊断输出：每个存储对象一条，group 按名称排序
    fn dump(&self) -> Vec<DumpEntry>;

    /// 从一批行构建新实例；行错误附带来源名与行号
    fn build(source_name: &str, rows: &[Row]) -> Result<Self, LoadError> {
        let mut index = Self::default();
        let mut form_factor = Self::form_factor();
        for row in rows {
            form_factor
                .check(row)
                .and_then(|_| index.add_row(row))
                .map_err(|e| e.at_line(source_name, row.line))?;
        }
        Ok(index)
    }

    fn load(source: &dyn RowSource) -> Result<Self, LoadError> {
        let rows = source.rows()?;
        Self::build(source.name(), &rows)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DumpEntry {
    pub group: String,
    pub key: String,
    pub results: Vec<String>,
}

pub use dual_prefix::DualPrefixIndex;
pub use prefix::PrefixMatchIndex;
pub use range::RangeIndex;
pub use rate_plan::{RateStep, RateTier, TieredRatePlan};
pub use trie::DigitTrie;
pub use validity::{ClosedValidityIndex, OpenValidityIndex};

/// group 名按字典序排列，保证 dump 输出稳定
pub(crate) fn sorted_keys<V>(map: &std::collections::HashMap<String, V>) -> Vec<&String> {
    let mut keys = map.keys().collect::<Vec<_>>();
    keys.sort();
    keys
}
