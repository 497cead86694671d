use crate::error::{IndexError, IndexResult};

pub const DEFAULT_ORDER: u32 = 3;
pub const DEFAULT_TEXT_KEY_WIDTH: u32 = 64;
pub const DEFAULT_BLOOM_BITS: u64 = 512;
pub const DEFAULT_BLOOM_HASHES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeConfig {
    /// Minimum degree `t`: non-root nodes hold between `t - 1` and `2t - 1` keys.
    pub order: u32,
    /// Byte capacity of a text key slot. Ignored for numeric key types.
    pub text_key_width: u32,
}

impl BTreeConfig {
    pub fn validate(&self) -> IndexResult<()> {
        if self.order < 2 {
            return Err(IndexError::Usage(format!(
                "B-tree order must be at least 2, got {}",
                self.order
            )));
        }
        if self.text_key_width == 0 {
            return Err(IndexError::Usage(
                "text key width must be at least 1 byte".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BTreeConfig {
    fn default() -> Self {
        BTreeConfig {
            order: DEFAULT_ORDER,
            text_key_width: DEFAULT_TEXT_KEY_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomConfig {
    pub bit_count: u64,
    pub hash_count: u32,
}

impl BloomConfig {
    /// Sizes a filter for `expected_items` at the requested false-positive rate,
    /// using the textbook `m = -n ln p / (ln 2)^2` and `k = m/n ln 2` bounds.
    pub fn for_capacity(expected_items: u64, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-9, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let bit_count = (-(n * p.ln()) / (ln2 * ln2)).ceil().max(8.0) as u64;
        let hash_count = ((bit_count as f64 / n) * ln2).round().max(1.0) as u32;
        BloomConfig {
            bit_count,
            hash_count,
        }
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.bit_count == 0 {
            return Err(IndexError::Usage(
                "Bloom filter needs at least one bit".to_string(),
            ));
        }
        if self.hash_count == 0 {
            return Err(IndexError::Usage(
                "Bloom filter needs at least one hash function".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BloomConfig {
    fn default() -> Self {
        BloomConfig {
            bit_count: DEFAULT_BLOOM_BITS,
            hash_count: DEFAULT_BLOOM_HASHES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndexConfig {
    pub btree: BTreeConfig,
    pub bloom: BloomConfig,
}

impl IndexConfig {
    pub fn validate(&self) -> IndexResult<()> {
        self.btree.validate()?;
        self.bloom.validate()
    }
}
