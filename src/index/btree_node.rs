use crate::error::{IndexError, IndexResult};
use crate::index::{KeyType, KeyValue};
use crate::storage::codec::BTreeNodeCodec;
use std::cmp::Ordering;
use std::io::{Read, Seek, SeekFrom, Write};

/// Width of a numeric key slot in bytes.
pub const NUMERIC_KEY_WIDTH: u32 = 8;

/// Record geometry shared by every node of one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    pub key_type: KeyType,
    pub order: u32,
    /// Text slot capacity in bytes; always [`NUMERIC_KEY_WIDTH`] for numeric keys.
    pub key_width: u32,
}

impl NodeLayout {
    pub fn new(key_type: KeyType, order: u32, key_width: u32) -> IndexResult<Self> {
        if order < 2 {
            return Err(IndexError::Usage(format!(
                "B-tree order must be at least 2, got {}",
                order
            )));
        }
        let key_width = if key_type.is_numeric() {
            NUMERIC_KEY_WIDTH
        } else {
            key_width
        };
        if key_width == 0 {
            return Err(IndexError::Usage("key width must be positive".to_string()));
        }
        Ok(Self {
            key_type,
            order,
            key_width,
        })
    }

    pub fn max_keys(&self) -> usize {
        2 * self.order as usize - 1
    }

    pub fn max_children(&self) -> usize {
        2 * self.order as usize
    }

    pub fn key_slot_size(&self) -> usize {
        match self.key_type {
            KeyType::Integer | KeyType::Float => NUMERIC_KEY_WIDTH as usize,
            KeyType::Text => 4 + self.key_width as usize,
        }
    }

    pub fn node_size(&self) -> usize {
        1 + 4 + self.max_keys() * self.key_slot_size() + self.max_children() * 8
    }
}

/// Where a single-key probe of one node leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeProbe {
    /// Exact match in a leaf; carries the data pointer.
    Hit(u64),
    /// Continue in the child at this index.
    Descend(usize),
    /// Leaf reached without a match.
    Miss,
}

/// In-memory copy of one on-disk node. A node is loaded, mutated and written
/// back by the operation that needs it and is never cached beyond that.
#[derive(Debug, Clone, PartialEq)]
pub struct BTreeNode {
    pub(crate) offset: u64,
    pub(crate) is_leaf: bool,
    pub(crate) key_type: KeyType,
    pub(crate) keys: Vec<KeyValue>,
    pub(crate) data_pointers: Vec<u64>,
    pub(crate) children: Vec<u64>,
}

impl BTreeNode {
    pub fn new_leaf(offset: u64, key_type: KeyType) -> Self {
        Self {
            offset,
            is_leaf: true,
            key_type,
            keys: vec![],
            data_pointers: vec![],
            children: vec![],
        }
    }

    /// An internal node whose only child is `first_child`; used when the tree
    /// grows a new root above a full one.
    pub fn new_internal(offset: u64, key_type: KeyType, first_child: u64) -> Self {
        Self {
            offset,
            is_leaf: false,
            key_type,
            keys: vec![],
            data_pointers: vec![],
            children: vec![first_child],
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[KeyValue] {
        &self.keys
    }

    pub fn data_pointers(&self) -> &[u64] {
        &self.data_pointers
    }

    pub fn children(&self) -> &[u64] {
        &self.children
    }

    pub fn is_full(&self, order: u32) -> bool {
        self.keys.len() >= 2 * order as usize - 1
    }

    /// Index of the first key `>= key`.
    pub fn lower_bound(&self, key: &KeyValue) -> IndexResult<usize> {
        key.check_type(self.key_type)?;
        Ok(self
            .keys
            .partition_point(|k| k.total_cmp(key) == Ordering::Less))
    }

    /// Index of the first key `> key`.
    pub fn upper_bound(&self, key: &KeyValue) -> IndexResult<usize> {
        key.check_type(self.key_type)?;
        Ok(self
            .keys
            .partition_point(|k| k.total_cmp(key) != Ordering::Greater))
    }

    pub fn equal_range(&self, key: &KeyValue) -> IndexResult<(usize, usize)> {
        Ok((self.lower_bound(key)?, self.upper_bound(key)?))
    }

    /// Inserts `key` after any equal keys. On a leaf `pointer` is the data
    /// pointer stored beside it; on an internal node it is the child that
    /// holds keys at or above `key` and lands in the slot right after it.
    pub fn insert_in_place(&mut self, key: KeyValue, pointer: u64, order: u32) -> IndexResult<()> {
        if self.is_full(order) {
            return Err(IndexError::Usage(format!(
                "insert into full node at offset {}",
                self.offset
            )));
        }
        let index = self.upper_bound(&key)?;
        self.keys.insert(index, key);
        if self.is_leaf {
            self.data_pointers.insert(index, pointer);
        } else {
            self.children.insert(index + 1, pointer);
        }
        Ok(())
    }

    /// Places a separator promoted from child `index`, with its new right
    /// sibling at `index + 1`.
    pub fn insert_separator(
        &mut self,
        index: usize,
        key: KeyValue,
        right_child: u64,
        order: u32,
    ) -> IndexResult<()> {
        key.check_type(self.key_type)?;
        if self.is_leaf {
            return Err(IndexError::Usage(
                "separator insert into a leaf node".to_string(),
            ));
        }
        if self.is_full(order) {
            return Err(IndexError::Usage(format!(
                "separator insert into full node at offset {}",
                self.offset
            )));
        }
        if index > self.keys.len() || index >= self.children.len() {
            return Err(IndexError::Internal(format!(
                "separator index {} out of range for node at offset {}",
                index, self.offset
            )));
        }
        self.keys.insert(index, key);
        self.children.insert(index + 1, right_child);
        Ok(())
    }

    /// Probes this node for the first key `>= key`. A leaf reports the data
    /// pointer of an exact match; an internal node always descends, taking the
    /// child left of an equal separator because leaf splits keep the separator's
    /// entry in the left half.
    pub fn search_local(&self, key: &KeyValue) -> IndexResult<NodeProbe> {
        let index = self.lower_bound(key)?;
        if !self.is_leaf {
            return Ok(NodeProbe::Descend(index));
        }
        match self.keys.get(index) {
            Some(found) if found.total_cmp(key) == Ordering::Equal => {
                Ok(NodeProbe::Hit(self.data_pointers[index]))
            }
            _ => Ok(NodeProbe::Miss),
        }
    }

    /// Moves the upper half of a full node into a new sibling at
    /// `sibling_offset` and returns the separator for the parent.
    ///
    /// A leaf keeps the median (and its data pointer), so it is left with `t`
    /// keys and the sibling with `t - 1`. An internal node gives the median up,
    /// keeping `t - 1` keys and `t` children, the sibling taking the rest.
    pub fn split_off(&mut self, order: u32, sibling_offset: u64) -> IndexResult<(KeyValue, BTreeNode)> {
        if !self.is_full(order) {
            return Err(IndexError::Usage(format!(
                "split of non-full node at offset {} ({} keys)",
                self.offset,
                self.keys.len()
            )));
        }
        let t = order as usize;
        let mut sibling = BTreeNode {
            offset: sibling_offset,
            is_leaf: self.is_leaf,
            key_type: self.key_type,
            keys: self.keys.split_off(t),
            data_pointers: vec![],
            children: vec![],
        };
        let median;
        if self.is_leaf {
            sibling.data_pointers = self.data_pointers.split_off(t);
            median = self.keys[t - 1].clone();
        } else {
            sibling.children = self.children.split_off(t);
            median = self.keys.pop().ok_or_else(|| {
                IndexError::Internal(format!("node at offset {} lost its median", self.offset))
            })?;
        }
        Ok((median, sibling))
    }

    /// Writes this node's record at its own offset.
    pub fn serialize<W: Write + Seek>(&self, file: &mut W, layout: &NodeLayout) -> IndexResult<()> {
        let bytes = BTreeNodeCodec::encode(self, layout)?;
        file.seek(SeekFrom::Start(self.offset))?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Reads the node record stored at `offset`.
    pub fn deserialize<R: Read + Seek>(
        file: &mut R,
        offset: u64,
        layout: &NodeLayout,
    ) -> IndexResult<Self> {
        let mut bytes = vec![0u8; layout.node_size()];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut bytes)
            .map_err(|e| IndexError::from_read(e, &format!("node at offset {}", offset)))?;
        let (node, _) = BTreeNodeCodec::decode(&bytes, offset, layout)?;
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn full_leaf(order: u32) -> BTreeNode {
        let mut leaf = BTreeNode::new_leaf(0, KeyType::Integer);
        for k in 1..=(2 * order as i64 - 1) {
            leaf.insert_in_place(KeyValue::from(k * 10), k as u64, order)
                .unwrap();
        }
        leaf
    }

    #[test]
    fn insert_keeps_keys_sorted() {
        let mut leaf = BTreeNode::new_leaf(0, KeyType::Integer);
        for (k, p) in [(20, 2), (5, 0), (10, 1)] {
            leaf.insert_in_place(KeyValue::from(k), p, 3).unwrap();
        }
        assert_eq!(
            leaf.keys(),
            &[KeyValue::from(5), KeyValue::from(10), KeyValue::from(20)]
        );
        assert_eq!(leaf.data_pointers(), &[0, 1, 2]);
    }

    #[test]
    fn duplicates_go_after_equal_keys() {
        let mut leaf = BTreeNode::new_leaf(0, KeyType::Text);
        leaf.insert_in_place(KeyValue::from("a"), 1, 3).unwrap();
        leaf.insert_in_place(KeyValue::from("a"), 2, 3).unwrap();
        leaf.insert_in_place(KeyValue::from("0"), 3, 3).unwrap();
        assert_eq!(leaf.data_pointers(), &[3, 1, 2]);
    }

    #[test]
    fn insert_rejects_wrong_type_and_full_node() {
        let mut leaf = BTreeNode::new_leaf(0, KeyType::Integer);
        assert!(matches!(
            leaf.insert_in_place(KeyValue::from("x"), 0, 3),
            Err(IndexError::KeyTypeMismatch { .. })
        ));
        let mut full = full_leaf(2);
        assert!(matches!(
            full.insert_in_place(KeyValue::from(1), 0, 2),
            Err(IndexError::Usage(_))
        ));
    }

    #[test]
    fn internal_insert_places_child_after_key() {
        let mut node = BTreeNode::new_internal(0, KeyType::Integer, 100);
        node.insert_in_place(KeyValue::from(50), 200, 3).unwrap();
        node.insert_in_place(KeyValue::from(10), 300, 3).unwrap();
        assert_eq!(node.keys(), &[KeyValue::from(10), KeyValue::from(50)]);
        assert_eq!(node.children(), &[100, 300, 200]);
    }

    #[test]
    fn search_local_probes() {
        let leaf = full_leaf(3);
        assert_eq!(
            leaf.search_local(&KeyValue::from(30)).unwrap(),
            NodeProbe::Hit(3)
        );
        assert_eq!(
            leaf.search_local(&KeyValue::from(31)).unwrap(),
            NodeProbe::Miss
        );

        let mut internal = BTreeNode::new_internal(0, KeyType::Integer, 1);
        internal
            .insert_separator(0, KeyValue::from(10), 2, 3)
            .unwrap();
        assert_eq!(
            internal.search_local(&KeyValue::from(10)).unwrap(),
            NodeProbe::Descend(0)
        );
        assert_eq!(
            internal.search_local(&KeyValue::from(11)).unwrap(),
            NodeProbe::Descend(1)
        );
    }

    #[test]
    fn leaf_split_copies_median_up() {
        let mut leaf = full_leaf(3);
        let (median, sibling) = leaf.split_off(3, 500).unwrap();
        assert_eq!(median, KeyValue::from(30));
        assert_eq!(leaf.num_keys(), 3);
        assert_eq!(sibling.num_keys(), 2);
        assert_eq!(sibling.offset(), 500);
        assert_eq!(leaf.data_pointers(), &[1, 2, 3]);
        assert_eq!(sibling.data_pointers(), &[4, 5]);
    }

    #[test]
    fn internal_split_moves_median_up() {
        let mut node = BTreeNode::new_internal(0, KeyType::Integer, 0);
        for k in 1..=5 {
            node.insert_in_place(KeyValue::from(k), k as u64 * 100, 3)
                .unwrap();
        }
        let (median, sibling) = node.split_off(3, 900).unwrap();
        assert_eq!(median, KeyValue::from(3));
        assert_eq!(node.keys(), &[KeyValue::from(1), KeyValue::from(2)]);
        assert_eq!(node.children(), &[0, 100, 200]);
        assert_eq!(sibling.keys(), &[KeyValue::from(4), KeyValue::from(5)]);
        assert_eq!(sibling.children(), &[300, 400, 500]);
    }

    #[test]
    fn split_requires_full_node() {
        let mut leaf = BTreeNode::new_leaf(0, KeyType::Integer);
        assert!(matches!(leaf.split_off(3, 1), Err(IndexError::Usage(_))));
    }

    #[test]
    fn serialize_at_offset() {
        let layout = NodeLayout::new(KeyType::Integer, 3, 0).unwrap();
        let mut leaf = full_leaf(3);
        leaf.offset = 7;
        let mut file = Cursor::new(Vec::new());
        leaf.serialize(&mut file, &layout).unwrap();
        assert_eq!(file.get_ref().len(), 7 + layout.node_size());
        let loaded = BTreeNode::deserialize(&mut file, 7, &layout).unwrap();
        assert_eq!(loaded, leaf);
        assert!(matches!(
            BTreeNode::deserialize(&mut file, 8, &layout),
            Err(IndexError::Corrupt(_))
        ));
    }
}
