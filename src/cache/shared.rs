use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::core::LoadError;
use crate::index::LookupIndex;
use crate::source::RowSource;

/// 一次成功加载的统计
#[derive(Clone, Debug, Default)]
pub struct LoadStats {
    pub groups: usize,
    pub objects: usize,
    pub rows: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct LoadHistory {
    last: Option<LoadStats>,
    last_error: Option<String>,
}

/// 已发布的只读快照 + 重载入口。
///
/// - 读：`snapshot()` 拿到 `Arc<T>`，之后的查询不加锁；重载期间读者继续使用旧快照。
/// - 写：`load()` 在旁路完整构建新实例，成功后一次 `ArcSwap::store` 原子切换；
///   失败时旧快照保持不变（不会发布部分构建的实例）。
/// - 同一缓存的多次重载经 `reload_gate` 串行化。
pub struct SharedCache<T> {
    name: String,
    current: ArcSwap<T>,
    reload_gate: Mutex<()>,
    history: Mutex<LoadHistory>,
    loads: AtomicU64,
}

impl<T: LookupIndex> SharedCache<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current: ArcSwap::from_pointee(T::default()),
            reload_gate: Mutex::new(()),
            history: Mutex::new(LoadHistory::default()),
            loads: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前发布的快照
    pub fn snapshot(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// 从数据源完整构建并发布
    pub fn load(&self, source: &dyn RowSource) -> Result<LoadStats, LoadError> {
        let _g = self.reload_gate.lock();
        let started = Instant::now();

        let built = source
            .rows()
            .and_then(|rows| T::build(source.name(), &rows).map(|index| (index, rows.len())));
        let (index, rows) = match built {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(
                    "Cache '{}' load from {} failed, keeping previous snapshot: {}",
                    self.name,
                    source.name(),
                    e
                );
                self.history.lock().last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let stats = LoadStats {
            groups: index.group_count(),
            objects: index.object_count(),
            rows,
            elapsed: started.elapsed(),
        };
        self.current.store(Arc::new(index));
        self.loads.fetch_add(1, Ordering::Relaxed);
        {
            let mut h = self.history.lock();
            h.last = Some(stats.clone());
            h.last_error = None;
        }

        tracing::info!(
            "Cache '{}' loaded from {}: rows={} groups={} objects={} in {:?}",
            self.name,
            source.name(),
            stats.rows,
            stats.groups,
            stats.objects,
            stats.elapsed
        );
        Ok(stats)
    }

    /// 发布一个由调用方直接 `add_*` 构建好的实例
    pub fn publish(&self, index: T) {
        let _g = self.reload_gate.lock();
        tracing::debug!(
            "Cache '{}' publishing prebuilt instance: groups={} objects={}",
            self.name,
            index.group_count(),
            index.object_count()
        );
        self.current.store(Arc::new(index));
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    /// 丢弃所有 group（发布空实例）
    pub fn clear(&self) {
        let _g = self.reload_gate.lock();
        self.current.store(Arc::new(T::default()));
        // 统计随快照一起清空，report 不再显示已丢弃数据的行数
        self.history.lock().last = None;
        tracing::debug!("Cache '{}' cleared", self.name);
    }

    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn last_load(&self) -> Option<LoadStats> {
        self.history.lock().last.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.history.lock().last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{LookupIndex, PrefixMatchIndex, RangeIndex};
    use crate::source::MemorySource;

    #[test]
    fn readers_keep_their_snapshot_across_reload() {
        let cache = SharedCache::<PrefixMatchIndex>::new("prefix");
        cache
            .load(&MemorySource::from_lines("v1", &["TEL;0039;Italy"]))
            .unwrap();
        let old = cache.snapshot();

        cache
            .load(&MemorySource::from_lines("v2", &["TEL;0039;Italia"]))
            .unwrap();
        let new = cache.snapshot();

        assert_eq!(old.match_prefix("TEL", "0039").unwrap()[0], "Italy");
        assert_eq!(new.match_prefix("TEL", "0039").unwrap()[0], "Italia");
        assert_eq!(cache.load_count(), 2);
    }

    #[test]
    fn failed_load_keeps_previous_snapshot() {
        let cache = SharedCache::<RangeIndex>::new("range");
        cache
            .load(&MemorySource::from_lines(
                "good",
                &["G;1000;1999;0;0;A", "G;2000;2999;0;0;B"],
            ))
            .unwrap();

        let bad = MemorySource::from_lines(
            "bad",
            &["G;1000;1999;0;0;A", "G;2000;2999;0;0;B", "G;1500;2500;0;0;C"],
        );
        assert!(cache.load(&bad).is_err());
        assert!(cache.last_error().is_some());

        let snap = cache.snapshot();
        assert_eq!(snap.get_entry("G", 1500, 0).unwrap()[0], "A");
        assert_eq!(snap.object_count(), 2);
        assert_eq!(cache.last_load().map(|s| s.objects), Some(2));
    }

    #[test]
    fn clear_publishes_empty_instance() {
        let cache = SharedCache::<PrefixMatchIndex>::new("prefix");
        let mut built = PrefixMatchIndex::new();
        built.add_prefix("TEL", "1", vec!["one".into()]).unwrap();
        cache.publish(built);
        assert_eq!(cache.snapshot().group_count(), 1);

        cache.clear();
        assert_eq!(cache.snapshot().group_count(), 0);
        assert_eq!(cache.snapshot().match_prefix("TEL", "1"), None);
    }

    #[test]
    fn clear_forgets_last_load_stats() {
        let cache = SharedCache::<PrefixMatchIndex>::new("prefix");
        cache
            .load(&MemorySource::from_lines("v1", &["TEL;1;a", "TEL;2;b"]))
            .unwrap();
        assert_eq!(cache.last_load().map(|s| s.rows), Some(2));

        cache.clear();
        assert!(cache.last_load().is_none());
        assert_eq!(cache.snapshot().object_count(), 0);
    }

    #[test]
    fn concurrent_readers_see_consistent_snapshots() {
        let cache = Arc::new(SharedCache::<PrefixMatchIndex>::new("prefix"));
        cache
            .load(&MemorySource::from_lines("v1", &["TEL;1;a", "TEL;2;a"]))
            .unwrap();

        let readers = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let snap = cache.snapshot();
                        // 同一快照内两个前缀总是同一版本
                        let one = snap.match_prefix("TEL", "1").cloned();
                        let two = snap.match_prefix("TEL", "2").cloned();
                        assert_eq!(one, two);
                    }
                })
            })
            .collect::<Vec<_>>();

        for v in ["b", "c", "d"] {
            let lines = [format!("TEL;1;{v}"), format!("TEL;2;{v}")];
            cache.load(&MemorySource::from_lines(v, &lines)).unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
    }
}
