use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Map CSV rows onto typed records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Map every data row through a mapping schema and print JSON lines
    Read(ReadArgs),
    /// Show the header index of a CSV file, including duplicate disambiguation
    Headers(HeadersArgs),
    /// Print the map tree a mapping schema resolves to
    Plan(PlanArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Mapping schema describing the record
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,
    /// Number of data rows to skip before reading
    #[arg(long, default_value_t = 0)]
    pub skip: usize,
    /// Maximum number of rows to emit
    #[arg(long)]
    pub limit: Option<usize>,
    /// Pretty-print each record
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Args)]
pub struct HeadersArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Zero-based physical row holding the header
    #[arg(long = "header-row", default_value_t = 0)]
    pub header_row: usize,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Mapping schema to resolve
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
