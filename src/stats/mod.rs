use std::fmt;
use std::time::Duration;

use crate::config::CacheKind;

/// 单个缓存的加载统计
#[derive(Clone, Debug)]
pub struct CacheReport {
    pub name: String,
    pub kind: CacheKind,
    /// 当前快照的 group 数
    pub groups: usize,
    /// 当前快照的存储对象数（前缀 / 区间 / 段 / 阶梯版本）
    pub objects: usize,
    /// 最近一次成功加载读入的数据行
    pub rows: usize,
    /// 成功发布次数
    pub loads: u64,
    pub last_elapsed: Option<Duration>,
    /// 最近一次加载失败的原因（之后成功则清空）
    pub last_error: Option<String>,
}

/// 全部缓存的汇总
#[derive(Clone, Debug, Default)]
pub struct CatalogReport {
    pub caches: Vec<CacheReport>,
    /// 进程级 RSS（从 /proc/self/statm 读取）
    pub process_rss_bytes: u64,
}

impl CatalogReport {
    /// 从 /proc/self/statm 读取进程 RSS；非 Linux 返回 0
    pub fn read_process_rss() -> u64 {
        std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|s| {
                // statm 格式: size resident shared text lib data dt (单位: 页)
                let parts: Vec<&str> = s.split_whitespace().collect();
                parts.get(1)?.parse::<u64>().ok()
            })
            .map(|pages| pages * 4096)
            .unwrap_or(0)
    }

    pub fn failed(&self) -> usize {
        self.caches.iter().filter(|c| c.last_error.is_some()).count()
    }

    pub fn total_objects(&self) -> usize {
        self.caches.iter().map(|c| c.objects).sum()
    }
}

fn human_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn elapsed_ms(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:.1} ms", d.as_secs_f64() * 1000.0),
        None => "-".to_string(),
    }
}

impl fmt::Display for CatalogReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(f, "║                   cdr-lookup Cache Report                    ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════════════════╣")?;
        writeln!(
            f,
            "║ Process RSS: {:>47} ║",
            human_bytes(self.process_rss_bytes)
        )?;
        writeln!(
            f,
            "║ Caches:      {:>10}   objects: {:>10}   failed: {:>3}  ║",
            self.caches.len(),
            self.total_objects(),
            self.failed()
        )?;
        for c in &self.caches {
            writeln!(f, "╠──────────────────────────────────────────────────────────────╣")?;
            writeln!(f, "║ {:<30} {:>29} ║", c.name, c.kind.as_str())?;
            writeln!(
                f,
                "║   groups:  {:>10}   objects: {:>10}   rows: {:>8} ║",
                c.groups, c.objects, c.rows
            )?;
            writeln!(
                f,
                "║   loads:   {:>10}   last load: {:>29} ║",
                c.loads,
                elapsed_ms(c.last_elapsed)
            )?;
            if let Some(err) = &c.last_error {
                writeln!(f, "║   error:   {}", err)?;
            }
        }
        writeln!(f, "╚══════════════════════════════════════════════════════════════╝")?;
        Ok(())
    }
}
