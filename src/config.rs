use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::LoadError;
use crate::source::{FileSource, DEFAULT_DELIMITER};

/// 缓存类型（决定行格式与索引结构）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Prefix,
    DualPrefix,
    Range,
    Validity,
    ValidityOpen,
    RatePlan,
}

impl CacheKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::Prefix => "prefix",
            CacheKind::DualPrefix => "dual_prefix",
            CacheKind::Range => "range",
            CacheKind::Validity => "validity",
            CacheKind::ValidityOpen => "validity_open",
            CacheKind::RatePlan => "rate_plan",
        }
    }
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

/// 单个缓存的实例配置（每个实例独立持有，无进程级共享状态）
#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    pub kind: CacheKind,
    pub file: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl CacheConfig {
    pub fn source(&self) -> FileSource {
        FileSource::new(&self.file).with_delimiter(self.delimiter)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CatalogConfig {
    #[serde(rename = "cache", default)]
    pub caches: Vec<CacheConfig>,
}

impl CatalogConfig {
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let cfg: CatalogConfig =
            toml::from_str(text).map_err(|e| LoadError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 读取配置文件；相对的数据文件路径以配置文件所在目录为基准
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::parse(&text)?;
        if let Some(base) = path.parent() {
            for c in cfg.caches.iter_mut() {
                if c.file.is_relative() {
                    c.file = base.join(&c.file);
                }
            }
        }
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), LoadError> {
        let mut seen = HashSet::new();
        for c in &self.caches {
            if c.name.trim().is_empty() {
                return Err(LoadError::Config("cache name must not be empty".into()));
            }
            if !seen.insert(c.name.as_str()) {
                return Err(LoadError::Config(format!(
                    "duplicate cache name '{}'",
                    c.name
                )));
            }
        }
        Ok(())
    }
}
