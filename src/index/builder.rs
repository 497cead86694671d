use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::IndexConfig;
use crate::error::IndexResult;
use crate::index::auxiliary::assemble_files;
use crate::index::{BTree, BloomFilter, KeyType, KeyValue, TreeStats};

pub const BLOOM_FILE_NAME: &str = "BloomFilter.bin";
pub const AUX_FILE_NAME: &str = "AuxiliaryIndex.bin";

#[derive(derive_new::new, Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub column_name: String,
    pub key_type: KeyType,
    pub stats: TreeStats,
    pub bloom_bits_set: u64,
    pub bloom_false_positive_rate: f64,
    pub tree_path: PathBuf,
    pub bloom_path: PathBuf,
    pub aux_path: PathBuf,
    pub bloom_offset: u64,
}

/// Bulk-load pipeline for one column: every `(key, row)` pair goes into a
/// fresh tree and Bloom filter, both are saved, then assembled.
#[derive(Debug, Clone)]
pub struct ColumnIndexBuilder {
    column_name: String,
    key_type: KeyType,
    config: IndexConfig,
    out_dir: PathBuf,
}

impl ColumnIndexBuilder {
    pub fn new(
        column_name: &str,
        key_type: KeyType,
        config: IndexConfig,
        out_dir: impl AsRef<Path>,
    ) -> IndexResult<Self> {
        config.validate()?;
        Ok(Self {
            column_name: column_name.to_string(),
            key_type,
            config,
            out_dir: out_dir.as_ref().to_path_buf(),
        })
    }

    pub fn tree_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}.btree", self.column_name))
    }

    pub fn bloom_path(&self) -> PathBuf {
        self.out_dir.join(BLOOM_FILE_NAME)
    }

    pub fn aux_path(&self) -> PathBuf {
        self.out_dir.join(AUX_FILE_NAME)
    }

    pub fn build<I>(&self, entries: I) -> IndexResult<BuildSummary>
    where
        I: IntoIterator<Item = (KeyValue, u64)>,
    {
        fs::create_dir_all(&self.out_dir)?;
        let tree_path = self.tree_path();
        let bloom_path = self.bloom_path();
        let aux_path = self.aux_path();

        let mut bloom = BloomFilter::from_config(&self.config.bloom)?;
        let stats = {
            let mut tree = BTree::create(
                &tree_path,
                &self.column_name,
                self.key_type,
                &self.config.btree,
            )?;
            for (key, row) in entries {
                bloom.insert(key.to_bloom_bytes());
                tree.insert(key, row)?;
            }
            tree.save()?;
            tree.stats()?
        };
        bloom.save(&bloom_path)?;
        let bloom_offset = assemble_files(&tree_path, &bloom_path, &aux_path)?;

        info!(
            "indexed column '{}': {} entries in {} nodes, height {}",
            self.column_name, stats.entry_count, stats.node_count, stats.height
        );
        Ok(BuildSummary::new(
            self.column_name.clone(),
            self.key_type,
            stats,
            bloom.set_bit_count(),
            bloom.estimated_false_positive_rate(),
            tree_path,
            bloom_path,
            aux_path,
            bloom_offset,
        ))
    }
}
