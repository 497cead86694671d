use aux_index::error::IndexResult;
use aux_index::index::{AuxiliaryIndex, KeyValue};
use aux_index::utils::util::{
    pretty_format_bloom, pretty_format_header, pretty_format_lookup, pretty_format_stats,
};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, PartialEq)]
#[clap(author, version, about = "Inspect and query an assembled auxiliary index", long_about = None)]
struct Args {
    #[clap(help = "Path to AuxiliaryIndex.bin")]
    aux_file: PathBuf,
    #[clap(short = 'k', long = "key", help = "Key to look up (repeatable)")]
    keys: Vec<String>,
    #[clap(long, help = "Check the tree's ordering and occupancy invariants")]
    verify: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Failed to inspect {}: {}", args.aux_file.display(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> IndexResult<()> {
    let mut index = AuxiliaryIndex::open(&args.aux_file)?;
    println!("{}", pretty_format_header(&index.tree().header()));
    println!("{}", pretty_format_stats(&index.tree_mut().stats()?));
    println!("{}", pretty_format_bloom(index.bloom()));

    if args.verify {
        index.tree_mut().verify()?;
        println!("tree invariants hold");
    }

    let key_type = index.tree().key_type();
    for raw in args.keys.iter() {
        let key = KeyValue::parse(key_type, raw)?;
        let outcome = index.lookup(&key)?;
        println!("{}", pretty_format_lookup(&key, &outcome));
    }
    Ok(())
}
