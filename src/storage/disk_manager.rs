use log::debug;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{IndexError, IndexResult};
use crate::index::{BTreeHeader, BTreeNode, NodeLayout};
use crate::storage::codec::{BTreeHeaderCodec, BTREE_HEADER_SIZE};

/// Node arena over a single seekable store. The header occupies the first
/// [`BTREE_HEADER_SIZE`] bytes and node `i` lives at
/// `BTREE_HEADER_SIZE + i * node_size`; offsets never move once allocated.
#[derive(Debug)]
pub struct DiskManager<S = File> {
    storage: S,
    layout: NodeLayout,
    node_count: u64,
}

impl<S: Read + Write + Seek> DiskManager<S> {
    pub fn new(storage: S, layout: NodeLayout, node_count: u64) -> Self {
        Self {
            storage,
            layout,
            node_count,
        }
    }

    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    pub fn node_offset(&self, index: u64) -> u64 {
        BTREE_HEADER_SIZE as u64 + index * self.layout.node_size() as u64
    }

    /// Reserves the next node slot. Does not perform any disk I/O; the slot
    /// exists on disk once the node is first written.
    pub fn allocate_offset(&mut self) -> u64 {
        let offset = self.node_offset(self.node_count);
        self.node_count += 1;
        debug!("allocated node slot {} at offset {}", self.node_count - 1, offset);
        offset
    }

    /// Fails unless the store is long enough to hold every allocated node.
    pub fn check_extent(&mut self) -> IndexResult<()> {
        let len = self.storage.seek(SeekFrom::End(0))?;
        let needed = (self.layout.node_size() as u64)
            .checked_mul(self.node_count)
            .and_then(|n| n.checked_add(BTREE_HEADER_SIZE as u64));
        match needed {
            Some(needed) if needed <= len => Ok(()),
            _ => Err(IndexError::Corrupt(format!(
                "header records {} nodes of {} bytes but the store holds {} bytes",
                self.node_count,
                self.layout.node_size(),
                len
            ))),
        }
    }

    fn check_offset(&self, offset: u64) -> IndexResult<()> {
        let node_size = self.layout.node_size() as u64;
        let relative = offset.checked_sub(BTREE_HEADER_SIZE as u64).ok_or_else(|| {
            IndexError::Corrupt(format!("node offset {} points into the header", offset))
        })?;
        if relative % node_size != 0 {
            return Err(IndexError::Corrupt(format!(
                "node offset {} is not on a {} byte slot boundary",
                offset, node_size
            )));
        }
        if relative / node_size >= self.node_count {
            return Err(IndexError::Corrupt(format!(
                "node offset {} is past the {} allocated nodes",
                offset, self.node_count
            )));
        }
        Ok(())
    }

    pub fn read_node(&mut self, offset: u64) -> IndexResult<BTreeNode> {
        self.check_offset(offset)?;
        BTreeNode::deserialize(&mut self.storage, offset, &self.layout)
    }

    pub fn write_node(&mut self, node: &BTreeNode) -> IndexResult<()> {
        self.check_offset(node.offset())?;
        node.serialize(&mut self.storage, &self.layout)
    }

    pub fn write_header(&mut self, header: &BTreeHeader) -> IndexResult<()> {
        let bytes = BTreeHeaderCodec::encode(header)?;
        self.storage.seek(SeekFrom::Start(0))?;
        self.storage.write_all(&bytes)?;
        Ok(())
    }

    /// Reads and validates the header at the start of `storage`.
    pub fn read_header(storage: &mut S) -> IndexResult<BTreeHeader> {
        let mut bytes = vec![0u8; BTREE_HEADER_SIZE];
        storage.seek(SeekFrom::Start(0))?;
        storage
            .read_exact(&mut bytes)
            .map_err(|e| IndexError::from_read(e, "B-tree header"))?;
        let (header, _) = BTreeHeaderCodec::decode(&bytes)?;
        Ok(header)
    }

    pub fn flush(&mut self) -> IndexResult<()> {
        self.storage.flush()?;
        Ok(())
    }

    /// Copies the whole store, header included.
    pub fn to_bytes(&mut self) -> IndexResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.storage.seek(SeekFrom::Start(0))?;
        self.storage.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}
