//! Inspect a sparse-histogram chunk file.
//!
//! Reads a raw chunk buffer (count header included) and prints the layout
//! and every decoded sample.

use clap::Parser;
use histopack::{HistogramIter, SparseHistogram};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "hpk-dump")]
#[command(about = "Dump the contents of a sparse-histogram chunk")]
struct Args {
    /// File holding one raw chunk buffer
    chunk: PathBuf,

    /// Print only the layout and sample count
    #[arg(short, long)]
    meta: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let bytes = match std::fs::read(&args.chunk) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{}: {e}", args.chunk.display());
            return ExitCode::FAILURE;
        }
    };

    let mut it = HistogramIter::new(&bytes);
    let mut printed_layout = false;
    let mut n = 0usize;
    while it.next() {
        let (t, h) = it.at_histogram();
        if !printed_layout {
            println!("schema: {}", h.schema);
            println!("positive spans: {:?}", h.positive_spans);
            println!("negative spans: {:?}", h.negative_spans);
            printed_layout = true;
        }
        if !args.meta {
            print_sample(t, &h);
        }
        n += 1;
    }
    println!("samples: {n}");

    if let Some(e) = it.err() {
        eprintln!("chunk is damaged: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn print_sample(t: i64, h: &SparseHistogram) {
    println!(
        "t={t} count={} zero_count={} sum={} pos={:?} neg={:?}",
        h.count, h.zero_count, h.sum, h.positive_buckets, h.negative_buckets
    );
}
