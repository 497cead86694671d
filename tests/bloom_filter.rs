use aux_index::config::BloomConfig;
use aux_index::error::IndexError;
use aux_index::index::BloomFilter;
use aux_index::utils::hash::{city_hash64, murmur3_32};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn scenario_b_no_false_negative_after_more_inserts() {
    let mut filter = BloomFilter::new(512).unwrap();
    filter.insert("42");
    assert!(filter.query("42"));
    // "999" may or may not be reported; either answer is legal
    let _ = filter.query("999");

    for i in 0..1000 {
        filter.insert(format!("unrelated-{}", i));
        assert!(filter.query("42"));
    }
}

#[test]
fn two_hash_filter_sets_the_base_hash_bits() {
    let mut filter = BloomFilter::new(512).unwrap();
    filter.insert(b"42");
    let expected = [
        murmur3_32(b"42", 0) as u64 % 512,
        city_hash64(b"42") % 512,
    ];
    assert_eq!(filter.positions(b"42"), expected.to_vec());
    let set = if expected[0] == expected[1] { 1 } else { 2 };
    assert_eq!(filter.set_bit_count(), set);
}

#[test]
fn random_items_never_produce_false_negatives() {
    let mut rng = StdRng::seed_from_u64(11);
    let config = BloomConfig::for_capacity(2000, 0.01);
    let mut filter = BloomFilter::from_config(&config).unwrap();
    let items: Vec<Vec<u8>> = (0..2000)
        .map(|_| {
            let len = rng.random_range(1..40);
            (0..len).map(|_| rng.random::<u8>()).collect()
        })
        .collect();
    for item in items.iter() {
        filter.insert(item);
    }
    assert!(items.iter().all(|item| filter.query(item)));

    let probes = 10_000;
    let false_positives = (0..probes)
        .filter(|i| filter.query(format!("absent-{}", i)))
        .count();
    // sized for 1%; leave generous headroom
    assert!(false_positives < probes / 20, "{} false positives", false_positives);
    assert!(filter.estimated_false_positive_rate() < 0.02);
}

#[test]
fn serialized_filter_answers_identically() {
    let mut filter = BloomFilter::with_hashes(256, 3).unwrap();
    for i in 0..40 {
        filter.insert(i.to_string());
    }
    let restored = BloomFilter::deserialize(&filter.serialize()).unwrap();
    assert_eq!(restored.item_count(), 40);
    for i in 0..500 {
        let item = i.to_string();
        assert_eq!(restored.query(&item), filter.query(&item));
    }
}

#[test]
fn bad_magic_is_corrupt() {
    let mut bytes = BloomFilter::new(64).unwrap().serialize();
    bytes[0] = b'Z';
    assert!(matches!(
        BloomFilter::deserialize(&bytes),
        Err(IndexError::Corrupt(_))
    ));
}
