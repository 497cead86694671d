mod bloom_filter;
mod btree_header;
mod btree_node;
mod common;

pub use bloom_filter::{BloomFilterCodec, BLOOM_FORMAT_VERSION, BLOOM_HEADER_SIZE, BLOOM_MAGIC};
pub use btree_header::{
    BTreeHeaderCodec, BTREE_FORMAT_VERSION, BTREE_HEADER_SIZE, BTREE_MAGIC, COLUMN_NAME_LEN,
};
pub use btree_node::BTreeNodeCodec;
pub use common::CommonCodec;

// data + consumed offset
pub type DecodedData<T> = (T, usize);
