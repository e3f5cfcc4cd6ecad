use crate::core::LoadError;
use crate::source::{Row, RowSource, DEFAULT_DELIMITER};

/// 进程内数据源：由调用方方法直接提供的行（测试与嵌入式调用）
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    name: String,
    rows: Vec<Row>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// 以默认分隔符解析文本行，行号按输入顺序 1-based 编号
    pub fn from_lines<S: AsRef<str>>(name: impl Into<String>, lines: &[S]) -> Self {
        let rows = lines
            .iter()
            .enumerate()
            .filter_map(|(i, l)| Row::parse(i + 1, l.as_ref(), DEFAULT_DELIMITER))
            .collect();
        Self {
            name: name.into(),
            rows,
        }
    }

    /// 追加一行已切分的字段
    pub fn push<S: Into<String>>(&mut self, fields: impl IntoIterator<Item = S>) {
        let line = self.rows.len() + 1;
        self.rows
            .push(Row::new(line, fields.into_iter().map(Into::into).collect()));
    }
}

impl RowSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> Result<Vec<Row>, LoadError> {
        Ok(self.rows.clone())
    }
}
