use log::{debug, info};
use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use crate::config::BTreeConfig;
use crate::error::{IndexError, IndexResult};
use crate::index::{BTreeNode, KeyType, KeyValue, NodeLayout, NodeProbe};
use crate::storage::DiskManager;

/// Persisted once at the start of every tree file. A `root_offset` of zero
/// means no root has been allocated yet; offset zero always belongs to the
/// header itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BTreeHeader {
    pub order: u32,
    pub key_type: KeyType,
    pub key_width: u32,
    pub column_name: String,
    pub root_offset: u64,
    pub node_count: u64,
    pub entry_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeState {
    /// No root node allocated.
    Empty,
    /// Root allocated, nothing inserted.
    Initialized,
    Populated,
}

#[derive(derive_new::new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub height: usize,
    pub node_count: u64,
    pub leaf_count: u64,
    pub entry_count: u64,
}

/// Disk-resident B-tree over one column. Every node access goes through the
/// [`DiskManager`]; a node is read, changed and written back within the
/// operation that touches it.
///
/// Leaves hold every `(key, data pointer)` entry. Internal keys are
/// separators: a leaf split copies its median up and keeps it, an internal
/// split moves its median up.
pub struct BTree<S = File> {
    disk: DiskManager<S>,
    column_name: String,
    root_offset: Option<u64>,
    entry_count: u64,
}

impl BTree<File> {
    /// Creates (or truncates) a tree file and initializes an empty root.
    /// The file stays exclusively locked while the tree is alive. The lock is
    /// taken before truncation, so a file held by another writer is untouched.
    pub fn create(
        path: impl AsRef<Path>,
        column_name: &str,
        key_type: KeyType,
        config: &BTreeConfig,
    ) -> IndexResult<Self> {
        config.validate()?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path.as_ref())?;
        Self::lock(&file, path.as_ref())?;
        file.set_len(0)?;
        let mut tree = Self::new(file, column_name, key_type, config)?;
        tree.initialize()?;
        info!(
            "created {} B-tree for column '{}' at {}",
            key_type,
            column_name,
            path.as_ref().display()
        );
        Ok(tree)
    }

    /// Opens an existing tree file for further inserts.
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        Self::lock(&file, path.as_ref())?;
        Self::load(file)
    }

    /// Opens an existing tree file for searching only. No lock is taken.
    pub fn open_read_only(path: impl AsRef<Path>) -> IndexResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::load(file)
    }

    fn lock(file: &File, path: &Path) -> IndexResult<()> {
        fs4::FileExt::try_lock_exclusive(file).map_err(|e| {
            IndexError::Usage(format!(
                "{} is locked by another writer: {}",
                path.display(),
                e
            ))
        })
    }
}

impl BTree<Cursor<Vec<u8>>> {
    /// Loads a tree from a byte image of a tree file, e.g. the tree section
    /// of an auxiliary index.
    pub fn from_bytes(bytes: Vec<u8>) -> IndexResult<Self> {
        Self::load(Cursor::new(bytes))
    }

    /// An in-memory tree, initialized and ready for inserts.
    pub fn in_memory(
        column_name: &str,
        key_type: KeyType,
        config: &BTreeConfig,
    ) -> IndexResult<Self> {
        let mut tree = Self::new(Cursor::new(Vec::new()), column_name, key_type, config)?;
        tree.initialize()?;
        Ok(tree)
    }
}

impl<S: Read + Write + Seek> BTree<S> {
    /// Wraps empty storage. Nothing is written until [`BTree::initialize`].
    pub fn new(
        storage: S,
        column_name: &str,
        key_type: KeyType,
        config: &BTreeConfig,
    ) -> IndexResult<Self> {
        config.validate()?;
        let layout = NodeLayout::new(key_type, config.order, config.text_key_width)?;
        Ok(Self {
            disk: DiskManager::new(storage, layout, 0),
            column_name: column_name.to_string(),
            root_offset: None,
            entry_count: 0,
        })
    }

    /// Reads a tree back from storage holding a saved tree file. The header is
    /// validated and the root node read before anything else is trusted.
    pub fn load(mut storage: S) -> IndexResult<Self> {
        let header = DiskManager::read_header(&mut storage)?;
        let layout = NodeLayout::new(header.key_type, header.order, header.key_width)
            .map_err(|e| IndexError::Corrupt(e.to_string()))?;
        let mut disk = DiskManager::new(storage, layout, header.node_count);
        disk.check_extent()?;
        let capacity = header
            .node_count
            .checked_mul(layout.max_keys() as u64)
            .unwrap_or(u64::MAX);
        if header.entry_count > capacity {
            return Err(IndexError::Corrupt(format!(
                "header records {} entries but {} nodes hold at most {}",
                header.entry_count, header.node_count, capacity
            )));
        }
        let root_offset = match header.root_offset {
            0 => None,
            offset => {
                disk.read_node(offset)?;
                Some(offset)
            }
        };
        info!(
            "loaded {} B-tree for column '{}': order {}, {} nodes, {} entries",
            header.key_type, header.column_name, header.order, header.node_count, header.entry_count
        );
        Ok(Self {
            disk,
            column_name: header.column_name,
            root_offset,
            entry_count: header.entry_count,
        })
    }

    /// Like [`BTree::load`], but fails unless the stored key type is `expected`.
    pub fn load_as(storage: S, expected: KeyType) -> IndexResult<Self> {
        let tree = Self::load(storage)?;
        if tree.key_type() != expected {
            return Err(IndexError::KeyTypeMismatch {
                expected,
                found: tree.key_type(),
            });
        }
        Ok(tree)
    }

    pub fn key_type(&self) -> KeyType {
        self.disk.layout().key_type
    }

    pub fn order(&self) -> u32 {
        self.disk.layout().order
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn root_offset(&self) -> Option<u64> {
        self.root_offset
    }

    pub fn len(&self) -> u64 {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    pub fn state(&self) -> TreeState {
        match (self.root_offset, self.entry_count) {
            (None, _) => TreeState::Empty,
            (Some(_), 0) => TreeState::Initialized,
            (Some(_), _) => TreeState::Populated,
        }
    }

    pub fn header(&self) -> BTreeHeader {
        let layout = self.disk.layout();
        BTreeHeader {
            order: layout.order,
            key_type: layout.key_type,
            key_width: layout.key_width,
            column_name: self.column_name.clone(),
            root_offset: self.root_offset.unwrap_or(0),
            node_count: self.disk.node_count(),
            entry_count: self.entry_count,
        }
    }

    /// Allocates an empty leaf root right after the header and writes both.
    pub fn initialize(&mut self) -> IndexResult<()> {
        if self.root_offset.is_some() {
            return Err(IndexError::Usage(format!(
                "B-tree for column '{}' is already initialized",
                self.column_name
            )));
        }
        let offset = self.disk.allocate_offset();
        let root = BTreeNode::new_leaf(offset, self.key_type());
        self.disk.write_node(&root)?;
        self.root_offset = Some(offset);
        self.disk.write_header(&self.header())?;
        debug!("initialized root leaf at offset {}", offset);
        Ok(())
    }

    /// Inserts one entry, splitting full nodes on the way down so every node
    /// the insert descends into has room.
    pub fn insert(&mut self, key: KeyValue, pointer: u64) -> IndexResult<()> {
        let root_offset = self.root_offset.ok_or_else(|| {
            IndexError::Usage(format!(
                "insert into uninitialized B-tree for column '{}'",
                self.column_name
            ))
        })?;
        key.check_type(self.key_type())?;
        self.check_key_width(&key)?;

        let order = self.order();
        let root = self.disk.read_node(root_offset)?;
        let start = if root.is_full(order) {
            let new_offset = self.disk.allocate_offset();
            let mut new_root = BTreeNode::new_internal(new_offset, self.key_type(), root_offset);
            self.split_child(&mut new_root, 0, root)?;
            self.root_offset = Some(new_offset);
            self.disk.write_header(&self.header())?;
            debug!(
                "root split, tree grew a level: new root at offset {}",
                new_offset
            );
            new_root
        } else {
            root
        };
        self.insert_non_full(start, key, pointer)?;
        self.entry_count += 1;
        Ok(())
    }

    /// Rejects text keys wider than the slot before any node is split for them.
    fn check_key_width(&self, key: &KeyValue) -> IndexResult<()> {
        if let KeyValue::Text(text) = key {
            let width = self.disk.layout().key_width as usize;
            if text.len() > width {
                return Err(IndexError::KeyTooLong {
                    len: text.len(),
                    width,
                });
            }
        }
        Ok(())
    }

    fn insert_non_full(
        &mut self,
        mut node: BTreeNode,
        key: KeyValue,
        pointer: u64,
    ) -> IndexResult<()> {
        let order = self.order();
        let mut budget = NodeBudget::new(self.disk.node_count());
        loop {
            budget.charge(node.offset())?;
            if node.is_leaf() {
                node.insert_in_place(key, pointer, order)?;
                return self.disk.write_node(&node);
            }
            let index = node.upper_bound(&key)?;
            let mut child = self.disk.read_node(node.children()[index])?;
            if child.is_full(order) {
                let (left, right) = self.split_child(&mut node, index, child)?;
                child = if key.total_cmp(&node.keys()[index]) == Ordering::Less {
                    left
                } else {
                    right
                };
            }
            node = child;
        }
    }

    /// Splits the full `child` stored at `parent.children()[index]`: its upper
    /// half moves into a newly allocated sibling, the separator goes into
    /// `parent` at `index` and the sibling becomes child `index + 1`. All three
    /// nodes are written back; the split halves are returned.
    pub fn split_child(
        &mut self,
        parent: &mut BTreeNode,
        index: usize,
        mut child: BTreeNode,
    ) -> IndexResult<(BTreeNode, BTreeNode)> {
        if parent.children().get(index) != Some(&child.offset()) {
            return Err(IndexError::Usage(format!(
                "node at offset {} is not child {} of node at offset {}",
                child.offset(),
                index,
                parent.offset()
            )));
        }
        let order = self.order();
        if !child.is_full(order) {
            return Err(IndexError::Usage(format!(
                "split of non-full node at offset {} ({} keys)",
                child.offset(),
                child.num_keys()
            )));
        }
        if parent.is_full(order) {
            return Err(IndexError::Usage(format!(
                "split into full parent at offset {}",
                parent.offset()
            )));
        }
        let sibling_offset = self.disk.allocate_offset();
        let (separator, sibling) = child.split_off(order, sibling_offset)?;
        debug!(
            "split {} node at offset {} around {}: sibling at offset {}",
            if child.is_leaf() { "leaf" } else { "internal" },
            child.offset(),
            separator,
            sibling_offset
        );
        parent.insert_separator(index, separator, sibling_offset, order)?;
        self.disk.write_node(&sibling)?;
        self.disk.write_node(&child)?;
        self.disk.write_node(parent)?;
        Ok((child, sibling))
    }

    /// Every data pointer stored under `key`, in insertion order.
    pub fn search(&mut self, key: &KeyValue) -> IndexResult<Vec<u64>> {
        let root_offset = self.root_offset.ok_or(IndexError::EmptyTree)?;
        key.check_type(self.key_type())?;
        let mut pointers = Vec::new();
        let mut budget = NodeBudget::new(self.disk.node_count());
        let mut stack = vec![root_offset];
        while let Some(offset) = stack.pop() {
            budget.charge(offset)?;
            let node = self.disk.read_node(offset)?;
            let (lo, hi) = node.equal_range(key)?;
            if node.is_leaf() {
                pointers.extend_from_slice(&node.data_pointers()[lo..hi]);
            } else {
                // equal keys can straddle every child between the bounds
                stack.extend(node.children()[lo..=hi].iter().rev());
            }
        }
        Ok(pointers)
    }

    /// The first data pointer stored under `key`, following a single
    /// root-to-leaf path.
    pub fn get(&mut self, key: &KeyValue) -> IndexResult<Option<u64>> {
        let mut offset = self.root_offset.ok_or(IndexError::EmptyTree)?;
        let mut budget = NodeBudget::new(self.disk.node_count());
        loop {
            budget.charge(offset)?;
            let node = self.disk.read_node(offset)?;
            match node.search_local(key)? {
                NodeProbe::Hit(pointer) => return Ok(Some(pointer)),
                NodeProbe::Miss => return Ok(None),
                NodeProbe::Descend(index) => offset = node.children()[index],
            }
        }
    }

    pub fn contains(&mut self, key: &KeyValue) -> IndexResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Writes the header and flushes. Nodes are already on disk: they are
    /// written as soon as an insert or split changes them.
    pub fn save(&mut self) -> IndexResult<()> {
        let header = self.header();
        self.disk.write_header(&header)?;
        self.disk.flush()?;
        info!(
            "saved B-tree for column '{}': {} nodes, {} entries",
            self.column_name, header.node_count, header.entry_count
        );
        Ok(())
    }

    /// Saves, then returns the complete tree file image.
    pub fn to_bytes(&mut self) -> IndexResult<Vec<u8>> {
        self.save()?;
        self.disk.to_bytes()
    }

    pub fn into_inner(self) -> S {
        self.disk.into_inner()
    }

    /// All entries in key order.
    pub fn entries(&mut self) -> IndexResult<Vec<(KeyValue, u64)>> {
        let mut entries = Vec::new();
        let Some(root_offset) = self.root_offset else {
            return Ok(entries);
        };
        let mut budget = NodeBudget::new(self.disk.node_count());
        let mut stack = vec![root_offset];
        while let Some(offset) = stack.pop() {
            budget.charge(offset)?;
            let node = self.disk.read_node(offset)?;
            if node.is_leaf() {
                entries.extend(
                    node.keys()
                        .iter()
                        .cloned()
                        .zip(node.data_pointers().iter().copied()),
                );
            } else {
                stack.extend(node.children().iter().rev());
            }
        }
        Ok(entries)
    }

    pub fn stats(&mut self) -> IndexResult<TreeStats> {
        let Some(root_offset) = self.root_offset else {
            return Ok(TreeStats::new(0, 0, 0, 0));
        };
        let mut height = 0;
        let mut node_count = 0;
        let mut leaf_count = 0;
        let mut entry_count = 0;
        let mut budget = NodeBudget::new(self.disk.node_count());
        let mut stack = vec![(root_offset, 1)];
        while let Some((offset, depth)) = stack.pop() {
            budget.charge(offset)?;
            let node = self.disk.read_node(offset)?;
            node_count += 1;
            height = height.max(depth);
            if node.is_leaf() {
                leaf_count += 1;
                entry_count += node.num_keys() as u64;
            } else {
                stack.extend(node.children().iter().map(|c| (*c, depth + 1)));
            }
        }
        Ok(TreeStats::new(height, node_count, leaf_count, entry_count))
    }

    /// Walks the whole tree and checks its structural invariants: keys sorted
    /// within each node and inside their separator bounds, non-root occupancy
    /// between `t - 1` and `2t - 1`, every leaf at the same depth, and the
    /// stored entry count.
    pub fn verify(&mut self) -> IndexResult<()> {
        let Some(root_offset) = self.root_offset else {
            return Ok(());
        };
        let order = self.order() as usize;
        let mut leaf_depth = None;
        let mut entries = 0u64;
        let mut stack: Vec<(u64, usize, Option<KeyValue>, Option<KeyValue>)> =
            vec![(root_offset, 0, None, None)];
        let mut budget = NodeBudget::new(self.disk.node_count());
        while let Some((offset, depth, lower, upper)) = stack.pop() {
            budget.charge(offset)?;
            let node = self.disk.read_node(offset)?;
            let keys = node.keys();
            if offset != root_offset && keys.len() < order - 1 {
                return Err(IndexError::Corrupt(format!(
                    "node at offset {} underflows with {} keys",
                    offset,
                    keys.len()
                )));
            }
            if keys
                .windows(2)
                .any(|w| w[0].total_cmp(&w[1]) == Ordering::Greater)
            {
                return Err(IndexError::Corrupt(format!(
                    "keys out of order in node at offset {}",
                    offset
                )));
            }
            let out_of_bounds = keys.iter().any(|k| {
                lower
                    .as_ref()
                    .is_some_and(|l| k.total_cmp(l) == Ordering::Less)
                    || upper
                        .as_ref()
                        .is_some_and(|u| k.total_cmp(u) == Ordering::Greater)
            });
            if out_of_bounds {
                return Err(IndexError::Corrupt(format!(
                    "node at offset {} holds a key outside its parent's separators",
                    offset
                )));
            }
            if node.is_leaf() {
                entries += keys.len() as u64;
                match leaf_depth {
                    None => leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(IndexError::Corrupt(format!(
                            "leaf at offset {} has depth {}, expected {}",
                            offset, depth, d
                        )));
                    }
                    Some(_) => {}
                }
                continue;
            }
            for (i, child) in node.children().iter().enumerate() {
                let child_lower = if i == 0 {
                    lower.clone()
                } else {
                    Some(keys[i - 1].clone())
                };
                let child_upper = if i == keys.len() {
                    upper.clone()
                } else {
                    Some(keys[i].clone())
                };
                stack.push((*child, depth + 1, child_lower, child_upper));
            }
        }
        if entries != self.entry_count {
            return Err(IndexError::Corrupt(format!(
                "header records {} entries, leaves hold {}",
                self.entry_count, entries
            )));
        }
        Ok(())
    }
}

/// Caps a traversal at one visit per allocated node. A well-formed tree
/// reaches each node through exactly one parent, so exceeding the cap means
/// child links loop back or are shared.
struct NodeBudget {
    remaining: u64,
}

impl NodeBudget {
    fn new(node_count: u64) -> Self {
        Self {
            remaining: node_count,
        }
    }

    fn charge(&mut self, offset: u64) -> IndexResult<()> {
        if self.remaining == 0 {
            return Err(IndexError::Corrupt(format!(
                "node at offset {} reached more often than the tree has nodes: child links form a cycle",
                offset
            )));
        }
        self.remaining -= 1;
        Ok(())
    }
}
