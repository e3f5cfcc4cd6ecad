use crate::core::LoadError;

/// 0 号槽位保留给根节点，根永远不会是子节点，因此 0 可作为“无子节点”标记
const NO_CHILD: u32 = 0;

#[derive(Clone, Debug)]
struct TrieNode<T> {
    children: [u32; 10],
    value: Option<T>,
}

impl<T> TrieNode<T> {
    fn empty() -> Self {
        Self {
            children: [NO_CHILD; 10],
            value: None,
        }
    }
}

/// 10 叉数字 trie（arena 存储）：
/// - 节点平铺在 Vec 中，子节点以下标引用，构建完成后查询不分配内存
/// - 每个节点可携带一个值；查询沿路径记录最近一次见到的值（最长前缀优先）
#[derive(Clone, Debug)]
pub struct DigitTrie<T> {
    nodes: Vec<TrieNode<T>>,
    values: usize,
}

impl<T> Default for DigitTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DigitTrie<T> {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::empty()],
            values: 0,
        }
    }

    pub fn validate(digits: &str) -> Result<(), LoadError> {
        if digits.bytes().all(|b| b.is_ascii_digit()) {
            Ok(())
        } else {
            Err(LoadError::InvalidDigits(digits.to_string()))
        }
    }

    /// 沿 `digits` 建立路径（缺失节点即时创建），返回终点节点下标
    pub fn node_for_insert(&mut self, digits: &str) -> Result<u32, LoadError> {
        Self::validate(digits)?;
        let mut cur = 0usize;
        for b in digits.bytes() {
            let slot = (b - b'0') as usize;
            let next = self.nodes[cur].children[slot];
            cur = if next == NO_CHILD {
                let id = self.nodes.len();
                self.nodes.push(TrieNode::empty());
                self.nodes[cur].children[slot] = id as u32;
                id
            } else {
                next as usize
            };
        }
        Ok(cur as u32)
    }

    pub fn value(&self, node: u32) -> Option<&T> {
        self.nodes.get(node as usize)?.value.as_ref()
    }

    /// 在节点上放置值；节点已有值时原样返回新值（由调用方决定是否报错）
    pub fn set_value(&mut self, node: u32, value: T) -> Result<(), T> {
        let slot = &mut self.nodes[node as usize].value;
        if slot.is_some() {
            return Err(value);
        }
        *slot = Some(value);
        self.values += 1;
        Ok(())
    }

    /// 节点上的值；尚无值时以 `init` 创建
    pub fn value_or_insert_with(&mut self, node: u32, init: impl FnOnce() -> T) -> &mut T {
        let slot = &mut self.nodes[node as usize].value;
        if slot.is_none() {
            self.values += 1;
        }
        slot.get_or_insert_with(init)
    }

    /// 最长前缀匹配：O(len(number))，遇到非数字字符即停止
    pub fn best_match(&self, number: &str) -> Option<&T> {
        let mut best = self.nodes[0].value.as_ref();
        let mut cur = 0usize;
        for b in number.bytes() {
            if !b.is_ascii_digit() {
                break;
            }
            let next = self.nodes[cur].children[(b - b'0') as usize];
            if next == NO_CHILD {
                break;
            }
            cur = next as usize;
            if let Some(v) = self.nodes[cur].value.as_ref() {
                best = Some(v);
            }
        }
        best
    }

    /// 路径上所有携带值的节点，最深的在前
    pub fn matches_deepest_first(&self, number: &str) -> Vec<&T> {
        let mut out = Vec::new();
        if let Some(v) = self.nodes[0].value.as_ref() {
            out.push(v);
        }
        let mut cur = 0usize;
        for b in number.bytes() {
            if !b.is_ascii_digit() {
                break;
            }
            let next = self.nodes[cur].children[(b - b'0') as usize];
            if next == NO_CHILD {
                break;
            }
            cur = next as usize;
            if let Some(v) = self.nodes[cur].value.as_ref() {
                out.push(v);
            }
        }
        out.reverse();
        out
    }

    /// 携带值的节点数
    pub fn len(&self) -> usize {
        self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// 按数字序深度优先遍历所有值及其前缀
    pub fn for_each(&self, mut f: impl FnMut(&str, &T)) {
        let mut prefix = String::new();
        self.walk(0, &mut prefix, &mut f);
    }

    fn walk(&self, node: usize, prefix: &mut String, f: &mut impl FnMut(&str, &T)) {
        if let Some(v) = self.nodes[node].value.as_ref() {
            f(prefix, v);
        }
        for (digit, &child) in self.nodes[node].children.iter().enumerate() {
            if child == NO_CHILD {
                continue;
            }
            prefix.push((b'0' + digit as u8) as char);
            self.walk(child as usize, prefix, f);
            prefix.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_nodes_along_common_prefix() {
        let mut trie = DigitTrie::new();
        let a = trie.node_for_insert("0039").unwrap();
        trie.set_value(a, "Italy").unwrap();
        let b = trie.node_for_insert("0049").unwrap();
        trie.set_value(b, "Germany").unwrap();

        // root + "0" + "00" + "003" + "0039" + "004" + "0049"
        assert_eq!(trie.node_count(), 7);
        assert_eq!(trie.len(), 2);
        assert_eq!(trie.node_for_insert("0039").unwrap(), a);
        assert_eq!(trie.set_value(a, "again"), Err("again"));
    }

    #[test]
    fn best_match_prefers_deepest_node() {
        let mut trie = DigitTrie::new();
        for (p, v) in [("00", "intl"), ("0039", "Italy"), ("003906", "Rome")] {
            let n = trie.node_for_insert(p).unwrap();
            trie.set_value(n, v).unwrap();
        }
        assert_eq!(trie.best_match("0039061234"), Some(&"Rome"));
        assert_eq!(trie.best_match("00391"), Some(&"Italy"));
        assert_eq!(trie.best_match("0044"), Some(&"intl"));
        assert_eq!(trie.best_match("0039-06"), Some(&"Italy"));
        assert_eq!(trie.best_match("1"), None);
        assert_eq!(
            trie.matches_deepest_first("003906"),
            vec![&"Rome", &"Italy", &"intl"]
        );
    }

    #[test]
    fn value_or_insert_with_creates_once() {
        let mut trie: DigitTrie<Vec<u32>> = DigitTrie::new();
        let n = trie.node_for_insert("39").unwrap();
        trie.value_or_insert_with(n, Vec::new).push(1);
        trie.value_or_insert_with(n, Vec::new).push(2);
        assert_eq!(trie.len(), 1);
        assert_eq!(trie.value(n), Some(&vec![1, 2]));
    }

    #[test]
    fn rejects_non_digits_and_walks_in_order() {
        let mut trie: DigitTrie<u8> = DigitTrie::new();
        assert!(matches!(
            trie.node_for_insert("12a"),
            Err(LoadError::InvalidDigits(_))
        ));

        for (p, v) in [("2", 2), ("10", 10), ("1", 1)] {
            let n = trie.node_for_insert(p).unwrap();
            trie.set_value(n, v).unwrap();
        }
        let mut seen = Vec::new();
        trie.for_each(|p, v| seen.push((p.to_string(), *v)));
        assert_eq!(
            seen,
            vec![
                ("1".to_string(), 1),
                ("10".to_string(), 10),
                ("2".to_string(), 2)
            ]
        );
    }
}
