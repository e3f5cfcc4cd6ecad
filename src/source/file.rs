use std::path::PathBuf;

use crate::core::LoadError;
use crate::source::{Row, RowSource, DEFAULT_DELIMITER};

/// 分隔符文本文件数据源
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    delimiter: char,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self {
            path,
            name,
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl RowSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> Result<Vec<Row>, LoadError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let rows = text
            .lines()
            .enumerate()
            .filter_map(|(i, line)| Row::parse(i + 1, line, self.delimiter))
            .collect::<Vec<_>>();
        tracing::debug!("Read {} rows from {:?}", rows.len(), self.path);
        Ok(rows)
    }
}
