use clap::Parser;
use std::fs;
use std::io::{self, Read};
use vellum_chunk::text::{DEFAULT_MAX_CHUNK_SIZE, TextSplitter};

/// A CLI tool to split text files into bounded-size chunks as JSON output.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum size for each text chunk, in bytes.
    #[arg(short, long, default_value_t = DEFAULT_MAX_CHUNK_SIZE)]
    max_chunk_size: usize,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let splitter = TextSplitter::new(args.max_chunk_size);
    let chunks = splitter.split(&content);

    let json_output = serde_json::to_string_pretty(&chunks)?;
    println!("{}", json_output);

    Ok(())
}
