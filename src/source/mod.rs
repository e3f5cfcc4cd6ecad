pub mod file;
pub mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

use crate::core::{parse_date, LoadError, ResultSet, Timestamp};

pub const DEFAULT_DELIMITER: char = ';';

/// 数据源抽象：文件 / 进程内方法等加载策略都在核心之外实现此 trait。
///
/// ## 契约
/// - 已跳过空行与 `#` 注释行；字段已按分隔符切分并去除首尾空白。
/// - `Row::line` 为源中的 1-based 行号，用于错误定位。
pub trait RowSource: Send + Sync {
    fn name(&self) -> &str;
    fn rows(&self) -> Result<Vec<Row>, LoadError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub line: usize,
    pub fields: Vec<String>,
}

impl Row {
    pub fn new(line: usize, fields: Vec<String>) -> Self {
        Self { line, fields }
    }

    /// 按分隔符切分一行文本；空行与注释行返回 None
    pub fn parse(line: usize, text: &str, delimiter: char) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let fields = trimmed
            .split(delimiter)
            .map(|f| f.trim().to_string())
            .collect();
        Some(Self { line, fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn text(&self, idx: usize) -> &str {
        self.fields.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn int(&self, idx: usize, field: &'static str) -> Result<i64, LoadError> {
        let raw = self.text(idx);
        raw.parse::<i64>().map_err(|_| LoadError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
    }

    pub fn float(&self, idx: usize, field: &'static str) -> Result<f64, LoadError> {
        let raw = self.text(idx);
        raw.parse::<f64>().map_err(|_| LoadError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
    }

    pub fn date(&self, idx: usize, field: &'static str) -> Result<Timestamp, LoadError> {
        parse_date(field, self.text(idx))
    }

    /// 从 `idx` 开始的剩余字段作为结果集
    pub fn results_from(&self, idx: usize) -> ResultSet {
        self.fields.get(idx..).map(<[String]>::to_vec).unwrap_or_default()
    }
}

/// 单次加载内的字段数约束（form factor）：首行确定字段数，之后每行必须一致。
#[derive(Clone, Debug)]
pub struct FormFactor {
    min: usize,
    max: Option<usize>,
    expected: Option<usize>,
}

impl FormFactor {
    pub fn at_least(min: usize) -> Self {
        Self {
            min,
            max: None,
            expected: None,
        }
    }

    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
            expected: None,
        }
    }

    pub fn check(&mut self, row: &Row) -> Result<(), LoadError> {
        let found = row.len();
        if found < self.min {
            return Err(LoadError::FieldCount {
                expected: self.min,
                found,
            });
        }
        if let Some(max) = self.max {
            if found > max {
                return Err(LoadError::TooManyFields { max, found });
            }
        }
        match self.expected {
            None => {
                self.expected = Some(found);
                Ok(())
            }
            Some(expected) if expected == found => Ok(()),
            Some(expected) => Err(LoadError::FormFactorChanged { expected, found }),
        }
    }
}
