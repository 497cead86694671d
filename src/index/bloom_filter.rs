use log::{info, warn};
use std::fs;
use std::path::Path;

use crate::config::{BloomConfig, DEFAULT_BLOOM_HASHES};
use crate::error::{IndexError, IndexResult};
use crate::storage::codec::BloomFilterCodec;
use crate::utils::hash::{city_hash64, murmur3_32};

/// Fixed-size existence pre-filter. Bits are only ever set, so a clear bit
/// proves an item was never inserted.
///
/// Probe 0 is `murmur3_32(item) mod m`, probe 1 is `city_hash64(item) mod m`,
/// and any further probe `i` uses double hashing `h1 + i * h2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    pub(crate) bit_count: u64,
    pub(crate) hash_count: u32,
    pub(crate) item_count: u64,
    pub(crate) bits: Vec<u8>,
}

impl BloomFilter {
    /// A filter of `bit_count` bits probed by the two base hashes.
    pub fn new(bit_count: u64) -> IndexResult<Self> {
        Self::with_hashes(bit_count, DEFAULT_BLOOM_HASHES)
    }

    pub fn with_hashes(bit_count: u64, hash_count: u32) -> IndexResult<Self> {
        if bit_count == 0 {
            return Err(IndexError::Usage(
                "Bloom filter needs at least one bit".to_string(),
            ));
        }
        if hash_count == 0 {
            return Err(IndexError::Usage(
                "Bloom filter needs at least one hash".to_string(),
            ));
        }
        Ok(Self {
            bit_count,
            hash_count,
            item_count: 0,
            bits: vec![0; Self::byte_len(bit_count) as usize],
        })
    }

    pub fn from_config(config: &BloomConfig) -> IndexResult<Self> {
        config.validate()?;
        Self::with_hashes(config.bit_count, config.hash_count)
    }

    pub fn byte_len(bit_count: u64) -> u64 {
        bit_count.div_ceil(8)
    }

    pub fn bit_count(&self) -> u64 {
        self.bit_count
    }

    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Number of insert calls, duplicates included.
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    pub fn set_bit_count(&self) -> u64 {
        self.bits.iter().map(|b| b.count_ones() as u64).sum()
    }

    /// Bit positions probed for `item`.
    pub fn positions(&self, item: &[u8]) -> Vec<u64> {
        let h1 = murmur3_32(item, 0) as u64;
        let h2 = city_hash64(item);
        (0..self.hash_count as u64)
            .map(|i| match i {
                0 => h1 % self.bit_count,
                1 => h2 % self.bit_count,
                _ => h1.wrapping_add(i.wrapping_mul(h2)) % self.bit_count,
            })
            .collect()
    }

    pub fn insert(&mut self, item: impl AsRef<[u8]>) {
        for position in self.positions(item.as_ref()) {
            self.bits[(position / 8) as usize] |= 1 << (position % 8);
        }
        self.item_count += 1;
    }

    /// `false` means definitely absent; `true` means possibly present.
    pub fn query(&self, item: impl AsRef<[u8]>) -> bool {
        self.positions(item.as_ref())
            .into_iter()
            .all(|position| self.bits[(position / 8) as usize] & (1 << (position % 8)) != 0)
    }

    /// `(1 - e^(-k n / m))^k` for the current item count.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        let k = self.hash_count as f64;
        let n = self.item_count as f64;
        let m = self.bit_count as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    pub fn serialize(&self) -> Vec<u8> {
        BloomFilterCodec::encode(self)
    }

    /// Decodes a complete filter image; trailing bytes are rejected.
    pub fn deserialize(bytes: &[u8]) -> IndexResult<Self> {
        let (filter, consumed) = BloomFilterCodec::decode(bytes)?;
        if consumed != bytes.len() {
            return Err(IndexError::Corrupt(format!(
                "{} trailing bytes after Bloom filter",
                bytes.len() - consumed
            )));
        }
        if filter.item_count > filter.bit_count {
            warn!(
                "Bloom filter holds {} items in {} bits, estimated false positive rate {:.3}",
                filter.item_count,
                filter.bit_count,
                filter.estimated_false_positive_rate()
            );
        }
        Ok(filter)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> IndexResult<()> {
        fs::write(path.as_ref(), self.serialize())?;
        info!(
            "saved Bloom filter ({} bits, {} items) to {}",
            self.bit_count,
            self.item_count,
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> IndexResult<Self> {
        Self::deserialize(&fs::read(path.as_ref())?)
    }
}
