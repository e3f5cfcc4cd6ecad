use std::collections::HashMap;

use crate::core::time::display_date;
use crate::core::{date_from, date_to, LoadError, ResultSet, Timestamp};
use crate::index::{sorted_keys, DumpEntry, LookupIndex};
use crate::source::{FormFactor, Row};

/// 一个 group 内所有资源共用的节点 arena；每个资源一条按起始时间升序的链
#[derive(Clone, Debug)]
struct SegmentArena<N> {
    nodes: Vec<N>,
    heads: HashMap<String, u32>,
}

impl<N> Default for SegmentArena<N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            heads: HashMap::new(),
        }
    }
}

trait Linked {
    fn next(&self) -> Option<u32>;
    fn set_next(&mut self, next: Option<u32>);
}

impl<N: Linked> SegmentArena<N> {
    fn chain(&self, resource: &str) -> ChainIter<'_, N> {
        ChainIter {
            nodes: &self.nodes,
            cur: self.heads.get(resource).copied(),
        }
    }

    /// 把 `node` 链接到 `after` 之后（None = 成为新链头）
    fn link(&mut self, resource: &str, after: Option<u32>, mut node: N) {
        let id = self.nodes.len() as u32;
        match after {
            None => {
                node.set_next(self.heads.get(resource).copied());
                self.heads.insert(resource.to_string(), id);
            }
            Some(a) => {
                node.set_next(self.nodes[a as usize].next());
                self.nodes[a as usize].set_next(Some(id));
            }
        }
        self.nodes.push(node);
    }

    fn sorted_resources(&self) -> Vec<&String> {
        sorted_keys(&self.heads)
    }
}

struct ChainIter<'a, N> {
    nodes: &'a [N],
    cur: Option<u32>,
}

impl<'a, N: Linked> Iterator for ChainIter<'a, N> {
    type Item = (u32, &'a N);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let node = self.nodes.get(id as usize)?;
        self.cur = node.next();
        Some((id, node))
    }
}

#[derive(Clone, Debug)]
struct ClosedSegment {
    time_from: Timestamp,
    time_to: Timestamp,
    results: ResultSet,
    next: Option<u32>,
}

impl Linked for ClosedSegment {
    fn next(&self) -> Option<u32> {
        self.next
    }

    fn set_next(&mut self, next: Option<u32>) {
        self.next = next;
    }
}

/// 闭区间有效期索引：每个资源的 `[time_from, time_to)` 段互不重叠、按起始时间升序。
///
/// 行格式：`group;resourceId;start;end;result(s)…`（end 为 0 表示不限）
///
/// 与 range / prefix 不同：重叠条目只记录 error 日志并丢弃，不中断加载。
#[derive(Debug, Default)]
pub struct ClosedValidityIndex {
    groups: HashMap<String, SegmentArena<ClosedSegment>>,
}

impl ClosedValidityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回 `Ok(true)` 表示已插入，`Ok(false)` 表示与已有段重叠被丢弃
    pub fn add_entry(
        &mut self,
        group: &str,
        resource: &str,
        start: Timestamp,
        end: Timestamp,
        results: ResultSet,
    ) -> Result<bool, LoadError> {
        let time_from = date_from(start);
        let time_to = date_to(end);
        if time_from >= time_to {
            return Err(LoadError::InvalidValidity {
                from: time_from,
                to: time_to,
            });
        }

        let arena = self.groups.entry(group.to_string()).or_default();
        let node = ClosedSegment {
            time_from,
            time_to,
            results,
            next: None,
        };

        // 三种位置：链头（end ≤ head.from）、两段之间（start ≥ prev.to 且 end ≤ next.from）、链尾
        let mut prev: Option<u32> = None;
        let mut last_valid_to = Timestamp::MIN;
        let mut slot: Option<Option<u32>> = None;
        for (id, seg) in arena.chain(resource) {
            if time_from >= last_valid_to && time_to <= seg.time_from {
                slot = Some(prev);
                break;
            }
            last_valid_to = seg.time_to;
            prev = Some(id);
        }
        if slot.is_none() && time_from >= last_valid_to {
            slot = Some(prev);
        }

        if let Some(after) = slot {
            arena.link(resource, after, node);
            return Ok(true);
        }

        tracing::error!(
            "Validity segment [{},{}) for resource '{}' in group '{}' overlaps an existing segment, dropped",
            display_date(time_from),
            display_date(time_to),
            resource,
            group
        );
        Ok(false)
    }

    /// 第一个 `[time_from, time_to)` 覆盖 `time` 的段
    pub fn get_validity_segment_match(
        &self,
        group: &str,
        resource: &str,
        time: Timestamp,
    ) -> Option<&ResultSet> {
        self.groups
            .get(group)?
            .chain(resource)
            .map(|(_, seg)| seg)
            .take_while(|seg| seg.time_from <= time)
            .find(|seg| time < seg.time_to)
            .map(|seg| &seg.results)
    }
}

impl LookupIndex for ClosedValidityIndex {
    fn form_factor() -> FormFactor {
        FormFactor::at_least(5)
    }

    fn add_row(&mut self, row: &Row) -> Result<(), LoadError> {
        let start = row.date(2, "start")?;
        let end = row.date(3, "end")?;
        self.add_entry(row.text(0), row.text(1), start, end, row.results_from(4))
            .map(|_| ())
    }

    fn clear(&mut self) {
        self.groups.clear();
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn object_count(&self) -> usize {
        self.groups.values().map(|a| a.nodes.len()).sum()
    }

    fn dump(&self) -> Vec<DumpEntry> {
        let mut out = Vec::new();
        for group in sorted_keys(&self.groups) {
            let arena = &self.groups[group];
            for resource in arena.sorted_resources() {
                for (_, seg) in arena.chain(resource) {
                    out.push(DumpEntry {
                        group: group.clone(),
                        key: format!(
                            "{} [{},{})",
                            resource,
                            display_date(seg.time_from),
                            display_date(seg.time_to)
                        ),
                        results: seg.results.clone(),
                    });
                }
            }
        }
        out
    }
}

#[derive(Clone, Debug)]
struct OpenSegment {
    time_from: Timestamp,
    results: ResultSet,
    next: Option<u32>,
}

impl Linked for OpenSegment {
    fn next(&self) -> Option<u32> {
        self.next
    }

    fn set_next(&mut self, next: Option<u32>) {
        self.next = next;
    }
}

/// 开放式有效期索引：只记录起始时间，隐含结束时间 = 下一段的起始时间（链尾延伸到 +∞）。
///
/// 行格式：`group;resourceId;start;result(s)…`
#[derive(Debug, Default)]
pub struct OpenValidityIndex {
    groups: HashMap<String, SegmentArena<OpenSegment>>,
}

impl OpenValidityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(
        &mut self,
        group: &str,
        resource: &str,
        start: Timestamp,
        results: ResultSet,
    ) -> Result<(), LoadError> {
        let time_from = date_from(start);
        let arena = self.groups.entry(group.to_string()).or_default();

        // 插在第一个起始时间更晚的节点之前；相同起始时间排在已有节点之后（后者遮蔽前者）
        let mut after: Option<u32> = None;
        for (id, seg) in arena.chain(resource) {
            if seg.time_from > time_from {
                break;
            }
            if seg.time_from == time_from {
                tracing::warn!(
                    "Duplicate start {} for resource '{}' in group '{}', later entry shadows earlier one",
                    display_date(time_from),
                    resource,
                    group
                );
            }
            after = Some(id);
        }
        arena.link(
            resource,
            after,
            OpenSegment {
                time_from,
                results,
                next: None,
            },
        );
        Ok(())
    }

    /// 命中条件：`time ≥ node.time_from` 且（node 为链尾 或 `time < next.time_from`）
    pub fn get_validity_segment_match(
        &self,
        group: &str,
        resource: &str,
        time: Timestamp,
    ) -> Option<&ResultSet> {
        let arena = self.groups.get(group)?;
        for (_, seg) in arena.chain(resource) {
            if seg.time_from > time {
                return None;
            }
            let ends_after = match seg.next {
                None => true,
                Some(n) => time < arena.nodes[n as usize].time_from,
            };
            if ends_after {
                return Some(&seg.results);
            }
        }
        None
    }
}

impl LookupIndex for OpenValidityIndex {
    fn form_factor() -> FormFactor {
        FormFactor::at_least(4)
    }

    fn add_row(&mut self, row: &Row) -> Result<(), LoadError> {
        let start = row.date(2, "start")?;
        self.add_entry(row.text(0), row.text(1), start, row.results_from(3))
    }

    fn clear(&mut self) {
        self.groups.clear();
    }

    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn object_count(&self) -> usize {
        self.groups.values().map(|a| a.nodes.len()).sum()
    }

    fn dump(&self) -> Vec<DumpEntry> {
        let mut out = Vec::new();
        for group in sorted_keys(&self.groups) {
            let arena = &self.groups[group];
            for resource in arena.sorted_resources() {
                for (_, seg) in arena.chain(resource) {
                    out.push(DumpEntry {
                        group: group.clone(),
                        key: format!("{} from {}", resource, display_date(seg.time_from)),
                        results: seg.results.clone(),
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn first<'a>(r: Option<&'a ResultSet>) -> Option<&'a str> {
        r.and_then(|v| v.first()).map(String::as_str)
    }

    #[test]
    fn closed_segments_are_half_open() {
        let src = MemorySource::from_lines("closed", &["G;R1;100;200;X", "G;R1;200;300;Y"]);
        let idx = ClosedValidityIndex::load(&src).unwrap();
        assert_eq!(first(idx.get_validity_segment_match("G", "R1", 150)), Some("X"));
        assert_eq!(first(idx.get_validity_segment_match("G", "R1", 200)), Some("Y"));
        assert_eq!(first(idx.get_validity_segment_match("G", "R1", 250)), Some("Y"));
        assert_eq!(idx.get_validity_segment_match("G", "R1", 350), None);
        assert_eq!(idx.get_validity_segment_match("G", "R1", 99), None);
        assert_eq!(idx.get_validity_segment_match("G", "R2", 150), None);
        assert_eq!(idx.get_validity_segment_match("H", "R1", 150), None);
    }

    #[test]
    fn closed_inserts_at_head_middle_and_tail() {
        let mut idx = ClosedValidityIndex::new();
        assert!(idx.add_entry("G", "R", 300, 400, vec!["c".into()]).unwrap());
        assert!(idx.add_entry("G", "R", 100, 200, vec!["a".into()]).unwrap());
        assert!(idx.add_entry("G", "R", 500, 0, vec!["e".into()]).unwrap());
        assert!(idx.add_entry("G", "R", 200, 300, vec!["b".into()]).unwrap());
        assert!(idx.add_entry("G", "R", 400, 450, vec!["d".into()]).unwrap());

        let order = idx
            .dump()
            .into_iter()
            .map(|e| e.results[0].clone())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(first(idx.get_validity_segment_match("G", "R", 420)), Some("d"));
        assert_eq!(idx.get_validity_segment_match("G", "R", 470), None);
        assert_eq!(
            first(idx.get_validity_segment_match("G", "R", i64::MAX - 1)),
            Some("e")
        );
    }

    #[test]
    fn closed_overlap_is_dropped_not_fatal() {
        let src = MemorySource::from_lines(
            "closed",
            &["G;R1;100;200;X", "G;R1;150;250;Z", "G;R1;200;300;Y"],
        );
        let idx = ClosedValidityIndex::load(&src).unwrap();
        assert_eq!(idx.object_count(), 2);
        assert_eq!(first(idx.get_validity_segment_match("G", "R1", 160)), Some("X"));
        assert_eq!(first(idx.get_validity_segment_match("G", "R1", 220)), Some("Y"));

        let mut idx = idx;
        assert!(!idx.add_entry("G", "R1", 50, 150, vec!["W".into()]).unwrap());
    }

    #[test]
    fn closed_rejects_empty_segment() {
        let mut idx = ClosedValidityIndex::new();
        assert!(matches!(
            idx.add_entry("G", "R", 200, 200, vec![]),
            Err(LoadError::InvalidValidity { .. })
        ));
    }

    #[test]
    fn open_segments_end_at_next_start() {
        let src = MemorySource::from_lines("open", &["G;R1;300;Y", "G;R1;100;X"]);
        let idx = OpenValidityIndex::load(&src).unwrap();
        assert_eq!(first(idx.get_validity_segment_match("G", "R1", 150)), Some("X"));
        assert_eq!(first(idx.get_validity_segment_match("G", "R1", 299)), Some("X"));
        assert_eq!(first(idx.get_validity_segment_match("G", "R1", 300)), Some("Y"));
        assert_eq!(first(idx.get_validity_segment_match("G", "R1", 500)), Some("Y"));
        assert_eq!(idx.get_validity_segment_match("G", "R1", 50), None);
        assert_eq!(idx.get_validity_segment_match("G", "R9", 150), None);
    }

    #[test]
    fn open_duplicate_start_shadows_earlier_entry() {
        let mut idx = OpenValidityIndex::new();
        idx.add_entry("G", "R", 100, vec!["first".into()]).unwrap();
        idx.add_entry("G", "R", 100, vec!["second".into()]).unwrap();
        idx.add_entry("G", "R", 0, vec!["origin".into()]).unwrap();
        assert_eq!(first(idx.get_validity_segment_match("G", "R", 150)), Some("second"));
        assert_eq!(first(idx.get_validity_segment_match("G", "R", -1)), Some("origin"));
        assert_eq!(idx.object_count(), 3);
    }

    #[test]
    fn resources_and_groups_are_isolated() {
        let mut idx = OpenValidityIndex::new();
        idx.add_entry("A", "R", 100, vec!["a".into()]).unwrap();
        idx.add_entry("B", "R", 100, vec!["b".into()]).unwrap();
        idx.add_entry("B", "S", 100, vec!["bs".into()]).unwrap();
        assert_eq!(first(idx.get_validity_segment_match("A", "R", 200)), Some("a"));
        assert_eq!(first(idx.get_validity_segment_match("B", "R", 200)), Some("b"));
        assert_eq!(idx.get_validity_segment_match("A", "S", 200), None);
        assert_eq!(idx.group_count(), 2);
    }

    #[test]
    fn reload_after_clear_matches_first_load() {
        let lines = ["G;R1;100;200;X", "G;R1;200;300;Y", "G;R2;0;0;Z"];
        let src = MemorySource::from_lines("closed", &lines);
        let mut idx = ClosedValidityIndex::load(&src).unwrap();
        let times = [50, 150, 250, 350];
        let snapshot = |idx: &ClosedValidityIndex| {
            times
                .iter()
                .map(|t| {
                    (
                        idx.get_validity_segment_match("G", "R1", *t).cloned(),
                        idx.get_validity_segment_match("G", "R2", *t).cloned(),
                    )
                })
                .collect::<Vec<_>>()
        };
        let before = snapshot(&idx);
        idx.clear();
        assert_eq!(idx.group_count(), 0);
        let idx = ClosedValidityIndex::load(&src).unwrap();
        assert_eq!(before, snapshot(&idx));
    }

    #[test]
    fn closed_groups_are_isolated() {
        let mut idx = ClosedValidityIndex::new();
        assert!(idx.add_entry("A", "R", 100, 200, vec!["a".into()]).unwrap());
        // 另一个 group 的同资源同时段不算重叠
        assert!(idx.add_entry("B", "R", 100, 200, vec!["b".into()]).unwrap());
        assert_eq!(first(idx.get_validity_segment_match("A", "R", 150)), Some("a"));
        assert_eq!(first(idx.get_validity_segment_match("B", "R", 150)), Some("b"));
        assert_eq!(idx.get_validity_segment_match("C", "R", 150), None);
        assert_eq!(idx.group_count(), 2);
        assert_eq!(idx.object_count(), 2);
    }

    #[test]
    fn open_reload_after_clear_matches_first_load() {
        let lines = ["G;R1;100;X", "G;R1;300;Y", "H;R1;0;Z"];
        let src = MemorySource::from_lines("open", &lines);
        let mut idx = OpenValidityIndex::load(&src).unwrap();
        let times = [50, 150, 350];
        let snapshot = |idx: &OpenValidityIndex| {
            times
                .iter()
                .map(|t| {
                    (
                        idx.get_validity_segment_match("G", "R1", *t).cloned(),
                        idx.get_validity_segment_match("H", "R1", *t).cloned(),
                    )
                })
                .collect::<Vec<_>>()
        };
        let before = snapshot(&idx);
        idx.clear();
        assert_eq!(idx.group_count(), 0);
        assert_eq!(idx.get_validity_segment_match("G", "R1", 150), None);
        let idx = OpenValidityIndex::load(&src).unwrap();
        assert_eq!(before, snapshot(&idx));
        assert_eq!(idx.object_count(), 3);
    }
}
