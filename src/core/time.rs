use chrono::{NaiveDate, NaiveDateTime};

use crate::core::error::LoadError;

/// 秒级 Unix 时间戳
pub type Timestamp = i64;

pub const LOW_DATE: Timestamp = i64::MIN;
pub const HIGH_DATE: Timestamp = i64::MAX;

const TEXT_FORMATS: [&str; 1] = ["%Y-%m-%d %H:%M:%S"];

/// 起始日期哨兵：0 → LOW_DATE
pub fn date_from(ts: Timestamp) -> Timestamp {
    if ts == 0 {
        LOW_DATE
    } else {
        ts
    }
}

/// 结束日期哨兵：0 → HIGH_DATE
pub fn date_to(ts: Timestamp) -> Timestamp {
    if ts == 0 {
        HIGH_DATE
    } else {
        ts
    }
}

/// 解析日期字段（UTC），依次尝试：
/// 1. 8 / 14 位纯数字且是合法日期：`YYYYMMDD` / `YYYYMMDDHHMMSS`
/// 2. 整数：epoch 秒（0 = 不限）；不是合法日期的 8 / 14 位数字也落到这里
/// 3. `YYYY-MM-DD HH:MM:SS` 或 `YYYY-MM-DD`
///
/// 返回值尚未做哨兵替换，由各索引的 `add_*` 自行处理。
pub fn parse_date(field: &'static str, value: &str) -> Result<Timestamp, LoadError> {
    let value = value.trim();
    if let Some(ts) = parse_compact(value) {
        return Ok(ts);
    }
    if let Ok(ts) = value.parse::<i64>() {
        return Ok(ts);
    }
    for fmt in TEXT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt.and_utc().timestamp());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().timestamp());
        }
    }
    Err(LoadError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_compact(value: &str) -> Option<Timestamp> {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let dt = match value.len() {
        14 => NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S").ok()?,
        8 => NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?,
        _ => return None,
    };
    Some(dt.and_utc().timestamp())
}

/// 哨兵感知的时间显示（dump / report 用）
pub fn display_date(ts: Timestamp) -> String {
    match ts {
        LOW_DATE => "LOW_DATE".to_string(),
        HIGH_DATE => "HIGH_DATE".to_string(),
        other => other.to_string(),
    }
}
