//! huffpack CLI
//! Usage:
//!   huffpack compress   <input> <output> [--info]
//!   huffpack decompress <input> <output> [--info]

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use huffpack::{Decoder, Encoder};

#[derive(Parser)]
#[command(name = "huffpack", about = "Compress and decompress files with Huffman coding")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file
    Compress {
        input: PathBuf,
        output: PathBuf,
        /// Show file sizes and compression rate
        #[arg(short, long)]
        info: bool,
    },
    /// Decompress a file produced by `huffpack compress`
    Decompress {
        input: PathBuf,
        output: PathBuf,
        /// Show file sizes and compression rate
        #[arg(short, long)]
        info: bool,
    },
}

const SIZE_UNITS: [&str; 4] = ["bytes", "KB", "MB", "GB"];
const SIZE_FACTOR: f64 = 1024.0;

fn show_size(bytes: u64) -> String {
    if (bytes as f64) < SIZE_FACTOR {
        return format!("{} {}", bytes, SIZE_UNITS[0]);
    }
    let mut size = bytes as f64 / SIZE_FACTOR;
    for unit in &SIZE_UNITS[1..SIZE_UNITS.len() - 1] {
        if size < SIZE_FACTOR {
            return format!("{:.2} {}", size, unit);
        }
        size /= SIZE_FACTOR;
    }
    format!("{:.2} {}", size, SIZE_UNITS[SIZE_UNITS.len() - 1])
}

fn show_info(input: &Path, input_size: u64, output: &Path, output_size: u64) {
    println!("Input file: {}, size: {}", input.display(), show_size(input_size));
    println!("Output file: {}, size: {}", output.display(), show_size(output_size));
}

fn show_rate(compressed: u64, decompressed: u64, compressing: bool) {
    if decompressed == 0 {
        return;
    }
    let rate = compressed as f64 / decompressed as f64;
    let verb = if compressing { "is" } else { "was" };
    if rate < 1.0 {
        println!("Compressed file {} {}% less", verb, 100 - (100.0 * rate) as i64);
    } else {
        println!("Compressed file {} {}% bigger", verb, (100.0 * rate) as i64 - 100);
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("cannot open input file {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("cannot open output file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn compress(input: &Path, output: &Path, info: bool) -> Result<()> {
    let mut encoder = Encoder::new();
    encoder.count_from(open(input)?).context("counting pass failed")?;

    let (read, written) = encoder
        .encode(open(input)?, create(output)?)
        .context("encoding failed")?;
    info!(read, written, "compressed {}", input.display());

    if info {
        show_info(input, encoder.input_size(), output, encoder.output_size()?);
        show_rate(written, read, true);
    }
    Ok(())
}

fn decompress(input: &Path, output: &Path, info: bool) -> Result<()> {
    let (read, written) = Decoder::new()
        .decode(open(input)?, create(output)?)
        .context("decoding failed, output file is unreliable")?;
    info!(read, written, "decompressed {}", input.display());

    if info {
        show_info(input, read, output, written);
        show_rate(read, written, false);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compress { input, output, info } => compress(&input, &output, info),
        Commands::Decompress { input, output, info } => decompress(&input, &output, info),
    }
}
