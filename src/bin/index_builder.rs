use aux_index::config::{
    BTreeConfig, BloomConfig, IndexConfig, DEFAULT_BLOOM_BITS, DEFAULT_BLOOM_HASHES, DEFAULT_ORDER,
    DEFAULT_TEXT_KEY_WIDTH,
};
use aux_index::error::IndexResult;
use aux_index::index::{ColumnIndexBuilder, KeyType};
use aux_index::loader::CsvTable;
use aux_index::utils::util::pretty_format_summary;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, PartialEq)]
#[clap(author, version, about = "Build a B-tree and Bloom filter index over one CSV column", long_about = None)]
struct Args {
    #[clap(help = "CSV file with a header row")]
    csv_file: PathBuf,
    #[clap(help = "Name of the column to index")]
    column_name: String,
    #[clap(short = 't', long, default_value_t = DEFAULT_ORDER, help = "B-tree order (minimum degree)")]
    order: u32,
    #[clap(long, default_value_t = DEFAULT_BLOOM_BITS, help = "Bloom filter size in bits")]
    bloom_bits: u64,
    #[clap(long, default_value_t = DEFAULT_BLOOM_HASHES, help = "Bloom filter hash count")]
    bloom_hashes: u32,
    #[clap(
        long,
        help = "Size the Bloom filter for this false positive rate instead of --bloom-bits/--bloom-hashes",
        value_name = "RATE"
    )]
    false_positive_rate: Option<f64>,
    #[clap(long, default_value_t = DEFAULT_TEXT_KEY_WIDTH, help = "Text key slot width in bytes")]
    key_width: u32,
    #[clap(
        long,
        help = "Key type (integer|float|text), inferred from the column when omitted",
        value_name = "TYPE"
    )]
    key_type: Option<KeyType>,
    #[clap(short = 'o', long, default_value = ".", help = "Directory for the index files")]
    out_dir: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!(
            "Failed to build index for column '{}': {}",
            args.column_name, e
        );
        std::process::exit(1);
    }
}

fn run(args: &Args) -> IndexResult<()> {
    let table = CsvTable::load(&args.csv_file)?;
    let key_type = match args.key_type {
        Some(key_type) => key_type,
        None => table.infer_key_type(&args.column_name)?,
    };
    let entries = table.column_entries(&args.column_name, key_type)?;

    let bloom = match args.false_positive_rate {
        Some(rate) => BloomConfig::for_capacity(entries.len() as u64, rate),
        None => BloomConfig {
            bit_count: args.bloom_bits,
            hash_count: args.bloom_hashes,
        },
    };
    let config = IndexConfig {
        btree: BTreeConfig {
            order: args.order,
            text_key_width: args.key_width,
        },
        bloom,
    };

    let builder = ColumnIndexBuilder::new(&args.column_name, key_type, config, &args.out_dir)?;
    let summary = builder.build(entries)?;
    println!("{}", pretty_format_summary(&summary));
    println!(
        "B-tree index built and saved successfully for column: {}",
        args.column_name
    );
    Ok(())
}
