use std::collections::HashMap;

use crate::core::{LoadError, ResultSet};
use crate::index::{sorted_keys, DigitTrie, DumpEntry, LookupIndex};
use crate::source::{FormFactor, Row};

/// 最长前缀（best match）索引：每个 group 一棵数字 trie。
///
/// 行格式：`group;prefix;result(s)…`
#[derive(Debug, Default)]
pub struct PrefixMatchIndex {
    groups: HashMap<String, DigitTrie<ResultSet>>,
}

impl PrefixMatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一个数字前缀；同一 group 内重复插入同一前缀为错误（不静默覆盖）。
    /// 空前缀作为该 group 的兜底结果。
    pub fn add_prefix(
        &mut self,
        group: &str,
        digits: &str,
        results: ResultSet,
    ) -> Result<(), LoadError> {
        DigitTrie::<ResultSet>::validate(digits)?;
        let trie = self.groups.entry(group.to_string()).or_default();
        let node = trie.node_for_insert(digits)?;
        trie.set_value(node, results)
            .map_err(|_| LoadError::DuplicatePrefix {
                group: group.to_string(),
                prefix: digits.to_string(),
            })
    }

    /// 最长前缀匹配；未知 group 或无任何前缀命中返回 None
    pub fn match_prefix(&self, group: &str, number: &str) -> Option<&ResultSet> {
        self.groups.get(group)?.best_match(number)
    }
}

impl LookupIndex for PrefixMatchIndex {
    fn form_factor() -> FormFactor {
        FormFactor::at_least(3)
    }

    fn add_row(&mut self, row: &Row) -> Result<(), LoadError> {
        self.add_prefix(row.text(0), row.text(1), row.results_from(2))
    }

    fn clear(&mut self) {
        self.groups.clear();
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn object_count(&self) -> usize {
        self.groups.values().map(DigitTrie::len).sum()
    }

    fn dump(&self) -> Vec<DumpEntry> {
        let mut out = Vec::new();
        for group in sorted_keys(&self.groups) {
            self.groups[group].for_each(|prefix, results| {
                out.push(DumpEntry {
                    group: group.clone(),
                    key: prefix.to_string(),
                    results: results.clone(),
                });
            });
        }
        out
    }
}
