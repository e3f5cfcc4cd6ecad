use std::path::PathBuf;

use crate::core::Timestamp;

/// 加载期错误：除 closed validity 重叠（仅记录日志）外，任何一个都会让整个缓存加载失败。
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("expected at least {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("expected at most {max} fields, found {found}")]
    TooManyFields { max: usize, found: usize },

    #[error("form factor changed mid-load: first row had {expected} fields, this row has {found}")]
    FormFactorChanged { expected: usize, found: usize },

    #[error("field '{field}' is not a valid number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("prefix '{0}' contains non-digit characters")]
    InvalidDigits(String),

    #[error("beat must be > 0, got {0}")]
    InvalidBeat(i64),

    #[error("charge base must be a positive number, got {0}")]
    InvalidChargeBase(f64),

    #[error("range from {from} is greater than range to {to}")]
    InvalidRange { from: i64, to: i64 },

    #[error("validity from {from} is not before validity to {to}")]
    InvalidValidity { from: Timestamp, to: Timestamp },

    #[error("duplicate prefix '{prefix}' in group '{group}'")]
    DuplicatePrefix { group: String, prefix: String },

    #[error("range [{from},{to}] valid [{valid_from},{valid_to}) overlaps an existing entry in group '{group}'")]
    RangeOverlap {
        group: String,
        from: i64,
        to: i64,
        valid_from: Timestamp,
        valid_to: Timestamp,
    },

    #[error("price model '{model}' step {step} already has a version starting at {start}")]
    DuplicateStepVersion {
        model: String,
        step: u32,
        start: Timestamp,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source_name} line {line}: {error}")]
    AtLine {
        source_name: String,
        line: usize,
        #[source]
        error: Box<LoadError>,
    },
}

impl LoadError {
    pub fn at_line(self, source_name: &str, line: usize) -> Self {
        LoadError::AtLine {
            source_name: source_name.to_string(),
            line,
            error: Box::new(self),
        }
    }

    /// 去掉 `AtLine` 包装后的原始错误
    pub fn root(&self) -> &LoadError {
        match self {
            LoadError::AtLine { error, .. } => error.root(),
            other => other,
        }
    }
}
