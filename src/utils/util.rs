use comfy_table::Cell;

use crate::index::{BTreeHeader, BloomFilter, BuildSummary, KeyValue, LookupOutcome, TreeStats};

const TABLE_PRESET: &str = "||--+-++|    ++++++";

fn property_table(rows: Vec<(&str, String)>) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(TABLE_PRESET);
    table.set_header(vec![Cell::new("property"), Cell::new("value")]);
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    table
}

pub fn pretty_format_header(header: &BTreeHeader) -> comfy_table::Table {
    property_table(vec![
        ("column", header.column_name.clone()),
        ("key type", header.key_type.to_string()),
        ("key width", header.key_width.to_string()),
        ("order", header.order.to_string()),
        ("root offset", header.root_offset.to_string()),
        ("nodes", header.node_count.to_string()),
        ("entries", header.entry_count.to_string()),
    ])
}

pub fn pretty_format_stats(stats: &TreeStats) -> comfy_table::Table {
    property_table(vec![
        ("height", stats.height.to_string()),
        ("reachable nodes", stats.node_count.to_string()),
        ("leaves", stats.leaf_count.to_string()),
        ("leaf entries", stats.entry_count.to_string()),
    ])
}

pub fn pretty_format_bloom(bloom: &BloomFilter) -> comfy_table::Table {
    property_table(vec![
        ("bits", bloom.bit_count().to_string()),
        ("hashes", bloom.hash_count().to_string()),
        ("items", bloom.item_count().to_string()),
        ("bits set", bloom.set_bit_count().to_string()),
        (
            "est. false positive rate",
            format!("{:.4}", bloom.estimated_false_positive_rate()),
        ),
    ])
}

pub fn pretty_format_summary(summary: &BuildSummary) -> comfy_table::Table {
    property_table(vec![
        ("column", summary.column_name.clone()),
        ("key type", summary.key_type.to_string()),
        ("entries", summary.stats.entry_count.to_string()),
        ("nodes", summary.stats.node_count.to_string()),
        ("height", summary.stats.height.to_string()),
        ("bloom bits set", summary.bloom_bits_set.to_string()),
        (
            "est. false positive rate",
            format!("{:.4}", summary.bloom_false_positive_rate),
        ),
        ("tree file", summary.tree_path.display().to_string()),
        ("bloom file", summary.bloom_path.display().to_string()),
        ("auxiliary file", summary.aux_path.display().to_string()),
        ("bloom offset", summary.bloom_offset.to_string()),
    ])
}

pub fn pretty_format_lookup(key: &KeyValue, outcome: &LookupOutcome) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(TABLE_PRESET);
    table.set_header(vec![Cell::new("key"), Cell::new("result"), Cell::new("rows")]);
    let result = match outcome {
        LookupOutcome::FilteredOut => "absent (bloom filter)",
        LookupOutcome::FalsePositive => "absent (bloom false positive)",
        LookupOutcome::Found(_) => "found",
    };
    let rows = outcome
        .pointers()
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    table.add_row(vec![
        Cell::new(format!("{key}")),
        Cell::new(result),
        Cell::new(rows),
    ]);
    table
}
