use crate::error::{IndexError, IndexResult};
use crate::index::{BTreeHeader, KeyType};
use crate::storage::codec::{CommonCodec, DecodedData};

pub const BTREE_MAGIC: [u8; 4] = *b"BTRE";
pub const BTREE_FORMAT_VERSION: u32 = 1;
pub const COLUMN_NAME_LEN: usize = 50;
// magic | version | order | key type | key width | column name | root | nodes | entries
pub const BTREE_HEADER_SIZE: usize = 4 + 4 + 4 + 1 + 4 + COLUMN_NAME_LEN + 8 + 8 + 8;

pub struct BTreeHeaderCodec;

impl BTreeHeaderCodec {
    pub fn encode(header: &BTreeHeader) -> IndexResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(BTREE_HEADER_SIZE);
        bytes.extend_from_slice(&BTREE_MAGIC);
        bytes.extend(CommonCodec::encode_u32(BTREE_FORMAT_VERSION));
        bytes.extend(CommonCodec::encode_u32(header.order));
        bytes.extend(CommonCodec::encode_u8(header.key_type.tag()));
        bytes.extend(CommonCodec::encode_u32(header.key_width));
        bytes.extend(CommonCodec::encode_padded_name(
            &header.column_name,
            COLUMN_NAME_LEN,
        )?);
        bytes.extend(CommonCodec::encode_u64(header.root_offset));
        bytes.extend(CommonCodec::encode_u64(header.node_count));
        bytes.extend(CommonCodec::encode_u64(header.entry_count));
        debug_assert_eq!(bytes.len(), BTREE_HEADER_SIZE);
        Ok(bytes)
    }

    /// Decodes and validates a header. The magic marker, format version and
    /// key type tag are checked before any offset is trusted.
    pub fn decode(bytes: &[u8]) -> IndexResult<DecodedData<BTreeHeader>> {
        if bytes.len() < BTREE_HEADER_SIZE {
            return Err(IndexError::Corrupt(format!(
                "B-tree header needs {} bytes, found {}",
                BTREE_HEADER_SIZE,
                bytes.len()
            )));
        }
        if bytes[..4] != BTREE_MAGIC {
            return Err(IndexError::Corrupt(format!(
                "bad magic marker {:?}, expected {:?}",
                &bytes[..4],
                BTREE_MAGIC
            )));
        }
        let mut left_bytes = &bytes[4..];

        let (version, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        if version != BTREE_FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported B-tree format version {}",
                version
            )));
        }

        let (order, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        if order < 2 {
            return Err(IndexError::Corrupt(format!("invalid B-tree order {}", order)));
        }

        let (tag, offset) = CommonCodec::decode_u8(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let key_type = KeyType::from_tag(tag)?;

        let (key_width, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        if key_width == 0 {
            return Err(IndexError::Corrupt("key width is zero".to_string()));
        }

        let (column_name, offset) = CommonCodec::decode_padded_name(left_bytes, COLUMN_NAME_LEN)?;
        left_bytes = &left_bytes[offset..];

        let (root_offset, offset) = CommonCodec::decode_u64(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (node_count, offset) = CommonCodec::decode_u64(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (entry_count, _) = CommonCodec::decode_u64(left_bytes)?;

        Ok((
            BTreeHeader {
                order,
                key_type,
                key_width,
                column_name,
                root_offset,
                node_count,
                entry_count,
            },
            BTREE_HEADER_SIZE,
        ))
    }
}
