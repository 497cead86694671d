pub mod auxiliary;
mod bloom_filter;
mod btree;
mod btree_node;
pub mod builder;
mod key;

pub use auxiliary::{assemble, unpack, AuxiliaryIndex, LookupOutcome};
pub use bloom_filter::BloomFilter;
pub use btree::{BTree, BTreeHeader, TreeState, TreeStats};
pub use btree_node::{BTreeNode, NodeLayout, NodeProbe, NUMERIC_KEY_WIDTH};
pub use builder::{BuildSummary, ColumnIndexBuilder};
pub use key::{KeyType, KeyValue};
