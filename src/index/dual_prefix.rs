use std::collections::HashMap;

use crate::core::{LoadError, ResultSet};
use crate::index::{sorted_keys, DigitTrie, DumpEntry, LookupIndex};
use crate::source::{FormFactor, Row};

type PairId = u32;

#[derive(Debug)]
struct PairEntry {
    origin: String,
    destination: String,
    results: ResultSet,
}

/// 一个 group 的两棵 trie：起点前缀 / 终点前缀。
/// 同一行插入的两个前缀以同一个 pair id 互相关联；节点上的 id 列表按插入顺序递增。
#[derive(Debug, Default)]
struct DualGroup {
    origin: DigitTrie<Vec<PairId>>,
    destination: DigitTrie<Vec<PairId>>,
    pairs: Vec<PairEntry>,
}

impl DualGroup {
    fn tag(trie: &mut DigitTrie<Vec<PairId>>, node: u32, id: PairId) {
        trie.value_or_insert_with(node, Vec::new).push(id);
    }
}

/// 有序 id 列表求第一个公共元素
fn common_pair(a: &[PairId], b: &[PairId]) -> Option<PairId> {
    let (mut i, mut j) = (0usize, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return Some(a[i]),
        }
    }
    None
}

/// 双键（起点 + 终点）最长前缀索引。
///
/// 行格式：`group;origin-prefix;destination-prefix;result(s)…`
///
/// 命中要求起点、终点两侧匹配到的节点来自同一次插入；
/// 多个组合同时成立时，起点更长者优先，其次终点更长者优先。
#[derive(Debug, Default)]
pub struct DualPrefixIndex {
    groups: HashMap<String, DualGroup>,
}

impl DualPrefixIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pair(
        &mut self,
        group: &str,
        origin: &str,
        destination: &str,
        results: ResultSet,
    ) -> Result<(), LoadError> {
        DigitTrie::<Vec<PairId>>::validate(origin)?;
        DigitTrie::<Vec<PairId>>::validate(destination)?;

        let g = self.groups.entry(group.to_string()).or_default();
        let o = g.origin.node_for_insert(origin)?;
        let d = g.destination.node_for_insert(destination)?;

        if let (Some(os), Some(ds)) = (g.origin.value(o), g.destination.value(d)) {
            if common_pair(os, ds).is_some() {
                return Err(LoadError::DuplicatePrefix {
                    group: group.to_string(),
                    prefix: format!("{origin}->{destination}"),
                });
            }
        }

        let id = g.pairs.len() as PairId;
        g.pairs.push(PairEntry {
            origin: origin.to_string(),
            destination: destination.to_string(),
            results,
        });
        DualGroup::tag(&mut g.origin, o, id);
        DualGroup::tag(&mut g.destination, d, id);
        Ok(())
    }

    pub fn match_origin_destination(
        &self,
        group: &str,
        origin_number: &str,
        destination_number: &str,
    ) -> Option<&ResultSet> {
        let g = self.groups.get(group)?;
        let origins = g.origin.matches_deepest_first(origin_number);
        if origins.is_empty() {
            return None;
        }
        let destinations = g.destination.matches_deepest_first(destination_number);
        for o in &origins {
            for d in &destinations {
                if let Some(id) = common_pair(o, d) {
                    return g.pairs.get(id as usize).map(|p| &p.results);
                }
            }
        }
        None
    }
}

impl LookupIndex for DualPrefixIndex {
    fn form_factor() -> FormFactor {
        FormFactor::at_least(4)
    }

    fn add_row(&mut self, row: &Row) -> Result<(), LoadError> {
        self.add_pair(row.text(0), row.text(1), row.text(2), row.results_from(3))
    }

    fn clear(&mut self) {
        self.groups.clear();
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn object_count(&self) -> usize {
        self.groups.values().map(|g| g.pairs.len()).sum()
    }

    fn dump(&self) -> Vec<DumpEntry> {
        let mut out = Vec::new();
        for group in sorted_keys(&self.groups) {
            for p in &self.groups[group].pairs {
                out.push(DumpEntry {
                    group: group.clone(),
                    key: format!("{}->{}", p.origin, p.destination),
                    results: p.results.clone(),
                });
            }
        }
        out
    }
}
