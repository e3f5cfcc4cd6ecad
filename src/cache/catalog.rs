use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::cache::shared::{LoadStats, SharedCache};
use crate::config::{CacheConfig, CacheKind, CatalogConfig};
use crate::core::LoadError;
use crate::index::{
    ClosedValidityIndex, DualPrefixIndex, DumpEntry, LookupIndex, OpenValidityIndex,
    PrefixMatchIndex, RangeIndex, TieredRatePlan,
};
use crate::stats::{CacheReport, CatalogReport};

/// 一个已配置缓存（按类型区分的 SharedCache）
pub enum AnyCache {
    Prefix(SharedCache<PrefixMatchIndex>),
    DualPrefix(SharedCache<DualPrefixIndex>),
    Range(SharedCache<RangeIndex>),
    Validity(SharedCache<ClosedValidityIndex>),
    ValidityOpen(SharedCache<OpenValidityIndex>),
    RatePlan(SharedCache<TieredRatePlan>),
}

/// 对每种变体执行同一段代码（`$c` 绑定到 `&SharedCache<_>`）
macro_rules! each_cache {
    ($any:expr, $c:ident => $body:expr) => {
        match $any {
            AnyCache::Prefix($c) => $body,
            AnyCache::DualPrefix($c) => $body,
            AnyCache::Range($c) => $body,
            AnyCache::Validity($c) => $body,
            AnyCache::ValidityOpen($c) => $body,
            AnyCache::RatePlan($c) => $body,
        }
    };
}

impl AnyCache {
    pub fn new(name: &str, kind: CacheKind) -> Self {
        match kind {
            CacheKind::Prefix => AnyCache::Prefix(SharedCache::new(name)),
            CacheKind::DualPrefix => AnyCache::DualPrefix(SharedCache::new(name)),
            CacheKind::Range => AnyCache::Range(SharedCache::new(name)),
            CacheKind::Validity => AnyCache::Validity(SharedCache::new(name)),
            CacheKind::ValidityOpen => AnyCache::ValidityOpen(SharedCache::new(name)),
            CacheKind::RatePlan => AnyCache::RatePlan(SharedCache::new(name)),
        }
    }

    pub fn kind(&self) -> CacheKind {
        match self {
            AnyCache::Prefix(_) => CacheKind::Prefix,
            AnyCache::DualPrefix(_) => CacheKind::DualPrefix,
            AnyCache::Range(_) => CacheKind::Range,
            AnyCache::Validity(_) => CacheKind::Validity,
            AnyCache::ValidityOpen(_) => CacheKind::ValidityOpen,
            AnyCache::RatePlan(_) => CacheKind::RatePlan,
        }
    }

    fn load(&self, cfg: &CacheConfig) -> Result<LoadStats, LoadError> {
        let source = cfg.source();
        each_cache!(self, c => c.load(&source))
    }

    fn clear(&self) {
        each_cache!(self, c => c.clear())
    }

    fn dump(&self) -> Vec<DumpEntry> {
        each_cache!(self, c => c.snapshot().dump())
    }

    fn report(&self) -> CacheReport {
        each_cache!(self, c => report_of(c, self.kind()))
    }
}

fn report_of<T: LookupIndex>(cache: &SharedCache<T>, kind: CacheKind) -> CacheReport {
    let snap = cache.snapshot();
    let last = cache.last_load();
    CacheReport {
        name: cache.name().to_string(),
        kind,
        groups: snap.group_count(),
        objects: snap.object_count(),
        rows: last.as_ref().map(|s| s.rows).unwrap_or(0),
        loads: cache.load_count(),
        last_elapsed: last.map(|s| s.elapsed),
        last_error: cache.last_error(),
    }
}

struct CatalogEntry {
    config: CacheConfig,
    cache: AnyCache,
}

/// 按配置持有全部缓存实例。
///
/// 首次加载与全量重载通过 rayon 并行执行（缓存之间互不依赖）；
/// 单个缓存的重载仍由其 `SharedCache` 串行化。
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// 只创建空实例，不读数据文件
    pub fn from_config(config: &CatalogConfig) -> Self {
        let entries = config
            .caches
            .iter()
            .map(|c| CatalogEntry {
                config: c.clone(),
                cache: AnyCache::new(&c.name, c.kind),
            })
            .collect::<Vec<_>>();
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.config.name.clone(), i))
            .collect();
        Self { entries, by_name }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 并行加载所有缓存；返回顺序与配置顺序一致
    pub fn load_all(&self) -> Vec<(String, Result<LoadStats, LoadError>)> {
        let outcomes = self
            .entries
            .par_iter()
            .map(|e| (e.config.name.clone(), e.cache.load(&e.config)))
            .collect::<Vec<_>>();

        let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            tracing::warn!(
                "Catalog load finished: {} of {} caches failed",
                failed,
                outcomes.len()
            );
        } else {
            tracing::info!("Catalog load finished: {} caches ready", outcomes.len());
        }
        outcomes
    }

    /// 重载单个缓存；失败时旧快照保持发布
    pub fn reload(&self, name: &str) -> Result<LoadStats, LoadError> {
        let e = self.entry(name)?;
        tracing::info!("Reloading cache '{}' from {:?}", name, e.config.file);
        e.cache.load(&e.config)
    }

    pub fn clear(&self, name: &str) -> Result<(), LoadError> {
        self.entry(name)?.cache.clear();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&AnyCache, LoadError> {
        self.entry(name).map(|e| &e.cache)
    }

    pub fn dump(&self, name: &str) -> Result<Vec<DumpEntry>, LoadError> {
        Ok(self.get(name)?.dump())
    }

    pub fn report(&self) -> CatalogReport {
        CatalogReport {
            caches: self.entries.iter().map(|e| e.cache.report()).collect(),
            process_rss_bytes: CatalogReport::read_process_rss(),
        }
    }

    pub fn prefix(&self, name: &str) -> Result<Arc<PrefixMatchIndex>, LoadError> {
        match self.get(name)? {
            AnyCache::Prefix(c) => Ok(c.snapshot()),
            other => Err(wrong_kind(name, other.kind(), CacheKind::Prefix)),
        }
    }

    pub fn dual_prefix(&self, name: &str) -> Result<Arc<DualPrefixIndex>, LoadError> {
        match self.get(name)? {
            AnyCache::DualPrefix(c) => Ok(c.snapshot()),
            other => Err(wrong_kind(name, other.kind(), CacheKind::DualPrefix)),
        }
    }

    pub fn range(&self, name: &str) -> Result<Arc<RangeIndex>, LoadError> {
        match self.get(name)? {
            AnyCache::Range(c) => Ok(c.snapshot()),
            other => Err(wrong_kind(name, other.kind(), CacheKind::Range)),
        }
    }

    pub fn validity(&self, name: &str) -> Result<Arc<ClosedValidityIndex>, LoadError> {
        match self.get(name)? {
            AnyCache::Validity(c) => Ok(c.snapshot()),
            other => Err(wrong_kind(name, other.kind(), CacheKind::Validity)),
        }
    }

    pub fn validity_open(&self, name: &str) -> Result<Arc<OpenValidityIndex>, LoadError> {
        match self.get(name)? {
            AnyCache::ValidityOpen(c) => Ok(c.snapshot()),
            other => Err(wrong_kind(name, other.kind(), CacheKind::ValidityOpen)),
        }
    }

    pub fn rate_plan(&self, name: &str) -> Result<Arc<TieredRatePlan>, LoadError> {
        match self.get(name)? {
            AnyCache::RatePlan(c) => Ok(c.snapshot()),
            other => Err(wrong_kind(name, other.kind(), CacheKind::RatePlan)),
        }
    }

    fn entry(&self, name: &str) -> Result<&CatalogEntry, LoadError> {
        self.by_name
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| LoadError::Config(format!("unknown cache '{}'", name)))
    }
}

fn wrong_kind(name: &str, actual: CacheKind, wanted: CacheKind) -> LoadError {
    LoadError::Config(format!(
        "cache '{}' is a {} cache, not {}",
        name, actual, wanted
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unique_tmp_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("cdr-lookup-catalog-{}-{}", tag, nanos));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_catalog(dir: &std::path::Path) -> Catalog {
        std::fs::write(dir.join("prefix.dat"), "TEL;0039;Italy\nTEL;0049;Germany\n").unwrap();
        std::fs::write(dir.join("dual.dat"), "RT;0039;0049;IT-DE\n").unwrap();
        std::fs::write(dir.join("range.dat"), "G;1000;1999;0;0;A\n").unwrap();
        std::fs::write(dir.join("validity.dat"), "G;R1;100;200;A\n").unwrap();
        std::fs::write(dir.join("open.dat"), "G;R1;100;A\nG;R1;200;B\n").unwrap();
        std::fs::write(dir.join("rates.dat"), "M|1|0|60|1|0.01|60\n").unwrap();
        std::fs::write(
            dir.join("catalog.toml"),
            r#"
            [[cache]]
            name = "Country"
            kind = "prefix"
            file = "prefix.dat"

            [[cache]]
            name = "Route"
            kind = "dual_prefix"
            file = "dual.dat"

            [[cache]]
            name = "Zones"
            kind = "range"
            file = "range.dat"

            [[cache]]
            name = "Seg"
            kind = "validity"
            file = "validity.dat"

            [[cache]]
            name = "OpenSeg"
            kind = "validity_open"
            file = "open.dat"

            [[cache]]
            name = "Rates"
            kind = "rate_plan"
            file = "rates.dat"
            delimiter = "|"
            "#,
        )
        .unwrap();
        let cfg = CatalogConfig::from_path(&dir.join("catalog.toml")).unwrap();
        Catalog::from_config(&cfg)
    }

    #[test]
    fn loads_every_kind_in_parallel() {
        let dir = unique_tmp_dir("all");
        let catalog = write_catalog(&dir);
        assert_eq!(catalog.len(), 6);

        let outcomes = catalog.load_all();
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(outcomes[0].0, "Country");

        let prefix = catalog.prefix("Country").unwrap();
        assert_eq!(prefix.match_prefix("TEL", "00391234").unwrap()[0], "Italy");

        let dual = catalog.dual_prefix("Route").unwrap();
        assert_eq!(
            dual.match_origin_destination("RT", "0039111", "0049222").unwrap()[0],
            "IT-DE"
        );

        assert_eq!(catalog.range("Zones").unwrap().get_entry("G", 1500, 0).unwrap()[0], "A");
        assert_eq!(
            catalog.validity("Seg").unwrap().get_validity_segment_match("G", "R1", 150).unwrap()[0],
            "A"
        );
        assert_eq!(
            catalog
                .validity_open("OpenSeg")
                .unwrap()
                .get_validity_segment_match("G", "R1", 250)
                .unwrap()[0],
            "B"
        );
        assert_eq!(catalog.rate_plan("Rates").unwrap().price_model("M").len(), 1);

        let report = catalog.report();
        assert_eq!(report.caches.len(), 6);
        assert!(report.caches.iter().all(|c| c.loads == 1 && c.last_error.is_none()));
    }

    #[test]
    fn typed_access_checks_kind_and_name() {
        let dir = unique_tmp_dir("kind");
        let catalog = write_catalog(&dir);
        assert!(matches!(catalog.range("Country"), Err(LoadError::Config(m)) if m.contains("prefix")));
        assert!(matches!(catalog.prefix("Nope"), Err(LoadError::Config(m)) if m.contains("unknown")));
    }

    #[test]
    fn reload_publishes_new_data_and_keeps_old_on_failure() {
        let dir = unique_tmp_dir("reload");
        let catalog = write_catalog(&dir);
        catalog.load_all();
        let before = catalog.prefix("Country").unwrap();

        std::fs::write(dir.join("prefix.dat"), "TEL;0039;Italia\n").unwrap();
        catalog.reload("Country").unwrap();
        assert_eq!(
            catalog.prefix("Country").unwrap().match_prefix("TEL", "0039").unwrap()[0],
            "Italia"
        );
        // 旧快照仍可用
        assert_eq!(before.match_prefix("TEL", "0039").unwrap()[0], "Italy");

        std::fs::write(dir.join("prefix.dat"), "TEL;0039;A\nTEL;0039;B\n").unwrap();
        assert!(catalog.reload("Country").is_err());
        assert_eq!(
            catalog.prefix("Country").unwrap().match_prefix("TEL", "0039").unwrap()[0],
            "Italia"
        );
        let report = catalog.report();
        assert!(report.caches[0].last_error.is_some());
    }

    #[test]
    fn clear_and_dump() {
        let dir = unique_tmp_dir("dump");
        let catalog = write_catalog(&dir);
        catalog.load_all();
        let dump = catalog.dump("Country").unwrap();
        assert_eq!(dump.len(), 2);
        assert_eq!(dump[0].key, "0039");

        catalog.clear("Country").unwrap();
        assert!(catalog.dump("Country").unwrap().is_empty());
        let report = catalog.report();
        assert_eq!(report.caches[0].objects, 0);
        assert_eq!(report.caches[0].rows, 0);
        assert!(report.caches[0].last_elapsed.is_none());
    }
}
