use std::collections::HashMap;

use crate::core::time::display_date;
use crate::core::{date_from, date_to, range_from, range_to, LoadError, ResultSet, Timestamp};
use crate::index::{sorted_keys, DumpEntry, LookupIndex};
use crate::source::{FormFactor, Row};

#[derive(Clone, Debug)]
struct RangeItem {
    range_from: i64,
    range_to: i64,
    valid_from: Timestamp,
    valid_to: Timestamp,
    results: ResultSet,
    next: Option<u32>,
}

impl RangeItem {
    fn same_range(&self, other: &RangeItem) -> bool {
        self.range_from == other.range_from && self.range_to == other.range_to
    }

    /// 数值区间相交即冲突；完全相同的区间除外，它们按链序排列，查询时先到先得
    fn overlaps(&self, other: &RangeItem) -> bool {
        self.range_from <= other.range_to
            && other.range_from <= self.range_to
            && !self.same_range(other)
    }

    fn contains(&self, value: i64, at: Timestamp) -> bool {
        self.range_from <= value
            && value <= self.range_to
            && self.valid_from <= at
            && at < self.valid_to
    }
}

/// 单个 group 的链：arena 存储，按 range_from 升序以 next 下标串联
#[derive(Clone, Debug, Default)]
struct RangeChain {
    items: Vec<RangeItem>,
    head: Option<u32>,
}

impl RangeChain {
    fn iter(&self) -> RangeIter<'_> {
        RangeIter {
            chain: self,
            cur: self.head,
        }
    }
}

struct RangeIter<'a> {
    chain: &'a RangeChain,
    cur: Option<u32>,
}

impl<'a> Iterator for RangeIter<'a> {
    type Item = &'a RangeItem;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.chain.items.get(self.cur? as usize)?;
        self.cur = item.next;
        Some(item)
    }
}

/// 数值区间索引：`[range_from, range_to]`（闭区间）× `[valid_from, valid_to)`。
///
/// 同一 group 内数值区间互不相交；同一区间可有多条（通常是不同有效期的版本），
/// 按插入顺序排在一起。
///
/// 行格式：`group;rangeFrom;rangeTo;validFrom;validTo[;result(s)…]`
///
/// 哨兵：range 边界 0 → ∓∞；日期边界 0 → LOW_DATE / HIGH_DATE。
#[derive(Debug, Default)]
pub struct RangeIndex {
    groups: HashMap<String, RangeChain>,
}

impl RangeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(
        &mut self,
        group: &str,
        from: i64,
        to: i64,
        valid_from: Timestamp,
        valid_to: Timestamp,
        results: ResultSet,
    ) -> Result<(), LoadError> {
        if from != 0 && to != 0 && from > to {
            return Err(LoadError::InvalidRange { from, to });
        }
        if valid_from != 0 && valid_to != 0 && valid_from > valid_to {
            return Err(LoadError::InvalidValidity {
                from: valid_from,
                to: valid_to,
            });
        }

        let mut item = RangeItem {
            range_from: range_from(from),
            range_to: range_to(to),
            valid_from: date_from(valid_from),
            valid_to: date_to(valid_to),
            results,
            next: None,
        };

        let chain = self.groups.entry(group.to_string()).or_default();

        // 从链头扫描：位置 = 第一个 range_from 更大的节点之前（相同区间保持插入顺序）；
        // 全链都要做重叠检查
        let mut after: Option<u32> = None;
        let mut placed = false;
        let mut cur = chain.head;
        while let Some(i) = cur {
            let node = &chain.items[i as usize];
            if node.overlaps(&item) {
                return Err(LoadError::RangeOverlap {
                    group: group.to_string(),
                    from: item.range_from,
                    to: item.range_to,
                    valid_from: item.valid_from,
                    valid_to: item.valid_to,
                });
            }
            if !placed {
                if node.range_from > item.range_from {
                    placed = true;
                } else {
                    after = Some(i);
                }
            }
            cur = node.next;
        }

        let id = chain.items.len() as u32;
        match after {
            None => {
                item.next = chain.head;
                chain.head = Some(id);
            }
            Some(a) => {
                item.next = chain.items[a as usize].next;
                chain.items[a as usize].next = Some(id);
            }
        }
        chain.items.push(item);
        Ok(())
    }

    /// 沿链第一个同时覆盖 `value` 与 `at` 的条目（先到先得，非最佳匹配）
    pub fn get_entry(&self, group: &str, value: i64, at: Timestamp) -> Option<&ResultSet> {
        self.groups
            .get(group)?
            .iter()
            .take_while(|item| item.range_from <= value)
            .find(|item| item.contains(value, at))
            .map(|item| &item.results)
    }
}

impl LookupIndex for RangeIndex {
    fn form_factor() -> FormFactor {
        FormFactor::at_least(5)
    }

    fn add_row(&mut self, row: &Row) -> Result<(), LoadError> {
        let from = row.int(1, "rangeFrom")?;
        let to = row.int(2, "rangeTo")?;
        let valid_from = row.date(3, "validFrom")?;
        let valid_to = row.date(4, "validTo")?;
        self.add_entry(row.text(0), from, to, valid_from, valid_to, row.results_from(5))
    }

    fn clear(&mut self) {
        self.groups.clear();
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn object_count(&self) -> usize {
        self.groups.values().map(|c| c.items.len()).sum()
    }

    fn dump(&self) -> Vec<DumpEntry> {
        let mut out = Vec::new();
        for group in sorted_keys(&self.groups) {
            for item in self.groups[group].iter() {
                out.push(DumpEntry {
                    group: group.clone(),
                    key: format!(
                        "[{},{}] valid [{},{})",
                        item.range_from,
                        item.range_to,
                        display_date(item.valid_from),
                        display_date(item.valid_to)
                    ),
                    results: item.results.clone(),
                });
            }
        }
        out
    }
}
