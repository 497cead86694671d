use crate::error::{IndexError, IndexResult};
use crate::index::BloomFilter;
use crate::storage::codec::{CommonCodec, DecodedData};

pub const BLOOM_MAGIC: [u8; 4] = *b"BLMF";
pub const BLOOM_FORMAT_VERSION: u32 = 1;
// magic | version | bit count | hash count | item count
pub const BLOOM_HEADER_SIZE: usize = 4 + 4 + 8 + 4 + 8;

pub struct BloomFilterCodec;

impl BloomFilterCodec {
    pub fn encode(filter: &BloomFilter) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BLOOM_HEADER_SIZE + filter.bits.len());
        bytes.extend_from_slice(&BLOOM_MAGIC);
        bytes.extend(CommonCodec::encode_u32(BLOOM_FORMAT_VERSION));
        bytes.extend(CommonCodec::encode_u64(filter.bit_count));
        bytes.extend(CommonCodec::encode_u32(filter.hash_count));
        bytes.extend(CommonCodec::encode_u64(filter.item_count));
        bytes.extend_from_slice(&filter.bits);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> IndexResult<DecodedData<BloomFilter>> {
        if bytes.len() < BLOOM_HEADER_SIZE {
            return Err(IndexError::Corrupt(format!(
                "Bloom filter header needs {} bytes, found {}",
                BLOOM_HEADER_SIZE,
                bytes.len()
            )));
        }
        if bytes[..4] != BLOOM_MAGIC {
            return Err(IndexError::Corrupt(format!(
                "bad Bloom filter magic {:?}",
                &bytes[..4]
            )));
        }
        let mut left_bytes = &bytes[4..];

        let (version, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        if version != BLOOM_FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported Bloom filter version {}",
                version
            )));
        }
        let (bit_count, offset) = CommonCodec::decode_u64(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (hash_count, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (item_count, offset) = CommonCodec::decode_u64(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        if bit_count == 0 || hash_count == 0 {
            return Err(IndexError::Corrupt(format!(
                "degenerate Bloom filter: {} bits, {} hashes",
                bit_count, hash_count
            )));
        }
        let byte_len = BloomFilter::byte_len(bit_count);
        if (left_bytes.len() as u64) < byte_len {
            return Err(IndexError::Corrupt(format!(
                "Bloom filter bit array truncated: need {} bytes, found {}",
                byte_len,
                left_bytes.len()
            )));
        }
        let byte_len = byte_len as usize;

        Ok((
            BloomFilter {
                bit_count,
                hash_count,
                item_count,
                bits: left_bytes[..byte_len].to_vec(),
            },
            BLOOM_HEADER_SIZE + byte_len,
        ))
    }
}
