//! Compression front end for the gzip file format.
//!
//! Usage: `gzip input output.gz`
//!
//! Compresses a single input file into a single gzip file, recording the
//! input's name and modification time in the header. Exits with status 1
//! and a one-line message on standard error for any failure.

use clap::Parser;
use ferroflate_container::gzip::{GzipMetadata, GzipWriter, OperatingSystem};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;
use std::time::UNIX_EPOCH;

#[derive(Parser)]
#[command(name = "gzip", version, about = "Compress a file into gzip format")]
struct Args {
    /// Uncompressed input file
    input: PathBuf,
    /// Compressed output file
    output: PathBuf,

    /// Compression level (0 = store, 9 = best)
    #[arg(short, long, default_value_t = 6)]
    level: u8,
}

fn main() {
    let args = Args::parse();
    if let Err(message) = run(&args) {
        eprintln!("{message}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), String> {
    if args.level > 9 {
        return Err(format!("invalid compression level {}", args.level));
    }

    let input = File::open(&args.input)
        .map_err(|e| format!("cannot open {}: {}", args.input.display(), e))?;

    let metadata = GzipMetadata {
        modification_time: modification_time(&input),
        operating_system: OperatingSystem::Unix,
        file_name: args
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        header_crc: true,
        extra_flags: match args.level {
            0..=1 => 4, // Fastest
            9 => 2,     // Maximum compression
            _ => 0,
        },
        ..GzipMetadata::default()
    };

    let output = File::create(&args.output)
        .map_err(|e| format!("cannot create {}: {}", args.output.display(), e))?;
    let mut writer = GzipWriter::with_level(output, &metadata, args.level)
        .map_err(|e| format!("cannot write {}: {}", args.output.display(), e))?;

    let mut reader = BufReader::new(input);
    io::copy(&mut reader, &mut writer)
        .map_err(|e| format!("{}: {}", args.input.display(), e))?;
    writer
        .finish()
        .map_err(|e| format!("cannot write {}: {}", args.output.display(), e))?;
    Ok(())
}

/// The input's mtime as nonzero Unix seconds, if the platform provides it.
fn modification_time(file: &File) -> Option<u32> {
    let mtime = file.metadata().ok()?.modified().ok()?;
    let seconds = mtime.duration_since(UNIX_EPOCH).ok()?.as_secs();
    u32::try_from(seconds).ok().filter(|&s| s != 0)
}
