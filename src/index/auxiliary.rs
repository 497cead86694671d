use log::info;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::{IndexError, IndexResult};
use crate::index::{BTree, BloomFilter, KeyValue};
use crate::storage::codec::CommonCodec;

/// Width of the leading field holding the Bloom filter's start offset.
pub const AUX_OFFSET_SIZE: usize = 8;

/// Builds `offset | tree bytes | bloom bytes`, where `offset` is the absolute
/// position of the first Bloom filter byte.
pub fn assemble(tree_bytes: &[u8], bloom_bytes: &[u8]) -> Vec<u8> {
    let offset = (AUX_OFFSET_SIZE + tree_bytes.len()) as u64;
    let mut bytes = Vec::with_capacity(offset as usize + bloom_bytes.len());
    bytes.extend(CommonCodec::encode_u64(offset));
    bytes.extend_from_slice(tree_bytes);
    bytes.extend_from_slice(bloom_bytes);
    bytes
}

/// Splits an assembled image back into its tree and Bloom filter sections.
pub fn unpack(bytes: &[u8]) -> IndexResult<(&[u8], &[u8])> {
    if bytes.len() < AUX_OFFSET_SIZE {
        return Err(IndexError::Corrupt(format!(
            "auxiliary index of {} bytes has no offset field",
            bytes.len()
        )));
    }
    let (offset, _) = CommonCodec::decode_u64(bytes)?;
    if offset < AUX_OFFSET_SIZE as u64 || offset > bytes.len() as u64 {
        return Err(IndexError::Corrupt(format!(
            "Bloom filter offset {} outside the {} byte auxiliary index",
            offset,
            bytes.len()
        )));
    }
    let offset = offset as usize;
    Ok((&bytes[AUX_OFFSET_SIZE..offset], &bytes[offset..]))
}

/// Concatenates a saved tree file and a saved Bloom filter file into
/// `out_path`. Returns the Bloom filter offset written.
pub fn assemble_files(
    tree_path: impl AsRef<Path>,
    bloom_path: impl AsRef<Path>,
    out_path: impl AsRef<Path>,
) -> IndexResult<u64> {
    let tree_bytes = fs::read(tree_path.as_ref())?;
    let bloom_bytes = fs::read(bloom_path.as_ref())?;
    let bytes = assemble(&tree_bytes, &bloom_bytes);
    fs::write(out_path.as_ref(), &bytes)?;
    let offset = (AUX_OFFSET_SIZE + tree_bytes.len()) as u64;
    info!(
        "assembled {} ({} tree bytes, {} filter bytes, filter at offset {})",
        out_path.as_ref().display(),
        tree_bytes.len(),
        bloom_bytes.len(),
        offset
    );
    Ok(offset)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The Bloom filter ruled the key out; the tree was not read.
    FilteredOut,
    /// The filter passed the key but the tree holds no entry for it.
    FalsePositive,
    Found(Vec<u64>),
}

impl LookupOutcome {
    pub fn pointers(&self) -> &[u64] {
        match self {
            LookupOutcome::Found(pointers) => pointers,
            _ => &[],
        }
    }
}

/// Read side of an assembled index: the Bloom filter answers first and the
/// tree is searched only for keys it cannot rule out.
pub struct AuxiliaryIndex {
    tree: BTree<Cursor<Vec<u8>>>,
    bloom: BloomFilter,
}

impl AuxiliaryIndex {
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        Self::from_bytes(&fs::read(path.as_ref())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> IndexResult<Self> {
        let (tree_bytes, bloom_bytes) = unpack(bytes)?;
        let tree = BTree::from_bytes(tree_bytes.to_vec())?;
        let bloom = BloomFilter::deserialize(bloom_bytes)?;
        Ok(Self { tree, bloom })
    }

    pub fn tree(&self) -> &BTree<Cursor<Vec<u8>>> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut BTree<Cursor<Vec<u8>>> {
        &mut self.tree
    }

    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    pub fn lookup(&mut self, key: &KeyValue) -> IndexResult<LookupOutcome> {
        key.check_type(self.tree.key_type())?;
        if !self.bloom.query(key.to_bloom_bytes()) {
            return Ok(LookupOutcome::FilteredOut);
        }
        let pointers = self.tree.search(key)?;
        if pointers.is_empty() {
            Ok(LookupOutcome::FalsePositive)
        } else {
            Ok(LookupOutcome::Found(pointers))
        }
    }
}
