pub mod error;
pub mod time;

pub use error::LoadError;
pub use time::{date_from, date_to, parse_date, Timestamp, HIGH_DATE, LOW_DATE};

/// 一行数据末尾的结果字段（result(s)…）
pub type ResultSet = Vec<String>;

/// 未命中时对外展示的哨兵文本（CLI / dump）；Rust API 内部用 `None` 表示未命中
pub const NO_MATCH: &str = "NOMATCH";

/// 数值区间下界哨兵：0 → -∞
pub fn range_from(v: i64) -> i64 {
    if v == 0 {
        i64::MIN
    } else {
        v
    }
}

/// 数值区间上界哨兵：0 → +∞
pub fn range_to(v: i64) -> i64 {
    if v == 0 {
        i64::MAX
    } else {
        v
    }
}
