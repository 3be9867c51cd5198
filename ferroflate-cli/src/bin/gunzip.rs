//! Decompression front end for the gzip file format.
//!
//! Usage: `gunzip input.gz output`
//!
//! Decompresses a single gzip file into a single output file, printing the
//! header metadata to standard error. Exits with status 1 and a one-line
//! message on standard error for any failure.

use clap::Parser;
use ferroflate_container::gzip::{GzipMetadata, GzipReader};
use ferroflate_core::markable::MarkableFile;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "gunzip", version, about = "Decompress a gzip file")]
struct Args {
    /// Compressed input file
    input: PathBuf,
    /// Decompressed output file
    output: PathBuf,
}

fn main() {
    let args = Args::parse();
    if let Err(message) = run(&args) {
        eprintln!("{message}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), String> {
    let input = MarkableFile::open(&args.input)
        .map_err(|e| format!("cannot open {}: {}", args.input.display(), e))?;
    let mut reader = GzipReader::from_markable(input)
        .map_err(|e| format!("{}: {}", args.input.display(), e))?;
    print_metadata(reader.metadata());

    let output = File::create(&args.output)
        .map_err(|e| format!("cannot create {}: {}", args.output.display(), e))?;
    let mut writer = BufWriter::new(output);
    io::copy(&mut reader, &mut writer)
        .map_err(|e| format!("{}: {}", args.input.display(), e))?;
    writer
        .flush()
        .map_err(|e| format!("cannot write {}: {}", args.output.display(), e))?;
    Ok(())
}

fn print_metadata(metadata: &GzipMetadata) {
    match metadata.modification_time {
        Some(seconds) => eprintln!("Last modified: {} (Unix seconds)", seconds),
        None => eprintln!("Last modified: N/A"),
    }
    eprintln!(
        "Extra flags: {}",
        match metadata.extra_flags {
            2 => "Maximum compression".to_string(),
            4 => "Fastest compression".to_string(),
            other => format!("Unknown ({})", other),
        }
    );
    eprintln!("Operating system: {}", metadata.operating_system.name());
    if metadata.is_text {
        eprintln!("Flag: Text");
    }
    if let Some(field) = &metadata.extra_field {
        eprintln!("Extra field: {} bytes", field.len());
    }
    if let Some(name) = &metadata.file_name {
        eprintln!("File name: {}", name);
    }
    if let Some(comment) = &metadata.comment {
        eprintln!("Comment: {}", comment);
    }
    if metadata.header_crc {
        eprintln!("Header CRC-16: verified");
    }
}
