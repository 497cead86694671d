use aux_index::config::{BTreeConfig, BloomConfig, IndexConfig};
use aux_index::error::IndexError;
use aux_index::index::{
    assemble, unpack, AuxiliaryIndex, BTree, BloomFilter, ColumnIndexBuilder, KeyType, KeyValue,
    LookupOutcome,
};
use aux_index::loader::CsvTable;
use std::fs;
use tempfile::TempDir;

#[test]
fn scenario_d_offset_and_sections() {
    let tree: Vec<u8> = (0..100).collect();
    let bloom: Vec<u8> = (0..64).map(|b| b ^ 0x5a).collect();
    let bytes = assemble(&tree, &bloom);
    let offset = u64::from_be_bytes(bytes[..8].try_into().unwrap());
    assert_eq!(offset, 108);
    assert_eq!(&bytes[offset as usize..], bloom.as_slice());
    let (tree_part, bloom_part) = unpack(&bytes).unwrap();
    assert_eq!(tree_part, tree.as_slice());
    assert_eq!(bloom_part, bloom.as_slice());
}

#[test]
fn in_memory_parts_assemble_and_query() {
    let mut tree = BTree::in_memory("id", KeyType::Integer, &BTreeConfig::default()).unwrap();
    let mut bloom = BloomFilter::new(512).unwrap();
    for key in [4i64, 8, 15, 16, 23, 42] {
        let key = KeyValue::from(key);
        bloom.insert(key.to_bloom_bytes());
        tree.insert(key, 7).unwrap();
    }
    let bytes = assemble(&tree.to_bytes().unwrap(), &bloom.serialize());
    let mut index = AuxiliaryIndex::from_bytes(&bytes).unwrap();
    assert_eq!(index.bloom(), &bloom);
    assert_eq!(
        index.lookup(&KeyValue::from(42)).unwrap(),
        LookupOutcome::Found(vec![7])
    );
    assert!(index.bloom().query("42"));
    assert!(matches!(
        index.lookup(&KeyValue::from("42")),
        Err(IndexError::KeyTypeMismatch { .. })
    ));
}

#[test]
fn truncated_auxiliary_file_fails() {
    let mut tree = BTree::in_memory("id", KeyType::Integer, &BTreeConfig::default()).unwrap();
    tree.insert(KeyValue::from(1), 1).unwrap();
    let bloom = BloomFilter::new(64).unwrap();
    let bytes = assemble(&tree.to_bytes().unwrap(), &bloom.serialize());
    for cut in [4, 50, bytes.len() - 1] {
        assert!(
            matches!(
                AuxiliaryIndex::from_bytes(&bytes[..cut]),
                Err(IndexError::Corrupt(_))
            ),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn csv_to_auxiliary_index_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("people.csv");
    fs::write(
        &csv_path,
        "id,name,city\n\
         17,alice,paris\n\
         3,bob,oslo\n\
         42,carol,lima\n\
         8,dave,oslo\n\
         23,erin,rome\n\
         5,frank,oslo\n\
         11,grace,kiev\n",
    )
    .unwrap();

    let table = CsvTable::load(&csv_path).unwrap();
    let key_type = table.infer_key_type("city").unwrap();
    assert_eq!(key_type, KeyType::Text);
    let entries = table.column_entries("city", key_type).unwrap();

    let out_dir = temp_dir.path().join("index");
    let config = IndexConfig {
        btree: BTreeConfig {
            order: 2,
            text_key_width: 16,
        },
        bloom: BloomConfig::default(),
    };
    let builder = ColumnIndexBuilder::new("city", key_type, config, &out_dir).unwrap();
    let summary = builder.build(entries).unwrap();
    assert_eq!(summary.stats.entry_count, 7);
    assert!(summary.tree_path.ends_with("city.btree"));
    assert!(summary.bloom_path.ends_with("BloomFilter.bin"));

    let tree_bytes = fs::read(&summary.tree_path).unwrap();
    let bloom_bytes = fs::read(&summary.bloom_path).unwrap();
    let aux_bytes = fs::read(&summary.aux_path).unwrap();
    assert_eq!(summary.bloom_offset, 8 + tree_bytes.len() as u64);
    assert_eq!(
        &aux_bytes[..8],
        &(8 + tree_bytes.len() as u64).to_be_bytes()
    );
    assert_eq!(&aux_bytes[summary.bloom_offset as usize..], bloom_bytes.as_slice());

    let mut index = AuxiliaryIndex::open(&summary.aux_path).unwrap();
    index.tree_mut().verify().unwrap();
    assert_eq!(index.tree().column_name(), "city");
    assert_eq!(
        index.lookup(&KeyValue::from("oslo")).unwrap(),
        LookupOutcome::Found(vec![1, 3, 5])
    );
    assert_eq!(
        index.lookup(&KeyValue::from("rome")).unwrap().pointers(),
        &[4]
    );
    assert!(matches!(
        index.lookup(&KeyValue::from("berlin")).unwrap(),
        LookupOutcome::FilteredOut | LookupOutcome::FalsePositive
    ));
}

#[test]
fn builder_rejects_unknown_column_and_bad_config() {
    let table = CsvTable::parse("id\n1\n").unwrap();
    assert!(matches!(
        table.column_entries("missing", KeyType::Integer),
        Err(IndexError::Usage(_))
    ));
    let config = IndexConfig {
        btree: BTreeConfig {
            order: 1,
            text_key_width: 8,
        },
        bloom: BloomConfig::default(),
    };
    let temp_dir = TempDir::new().unwrap();
    assert!(matches!(
        ColumnIndexBuilder::new("id", KeyType::Integer, config, temp_dir.path()),
        Err(IndexError::Usage(_))
    ));
}
