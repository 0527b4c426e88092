//! Maps rows of tabular data onto typed records.
//!
//! Record types describe themselves through [`convert::FromValue`] (usually
//! via [`impl_sheet_record!`]). The [`auto::AutoMapper`] turns that
//! description into a tree of [`map::Map`] nodes, callers adjust individual
//! nodes through path expressions on an [`importer::ClassMap`], and an
//! [`importer::Importer`] reads rows from a [`sheet::SheetReader`].

pub mod auto;
pub mod cli;
pub mod column;
pub mod convert;
pub mod error;
pub mod fallback;
pub mod header;
pub mod importer;
pub mod map;
pub mod mappers;
pub mod materialize;
pub mod path;
pub mod pipeline;
pub mod schema;
pub mod shape;
pub mod sheet;
pub mod source;
pub mod table;
pub mod transform;
pub mod value;

use std::{
    env,
    io::{self, BufWriter, Write},
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use encoding_rs::{Encoding, UTF_8};
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    schema::MappingSchema,
    sheet::{SheetOptions, SheetReader},
    source::CsvSource,
    value::Value,
};

pub use crate::{
    error::Error,
    importer::{ClassMap, Importer},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_mapper", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Read(args) => handle_read(&args),
        Commands::Headers(args) => handle_headers(&args),
        Commands::Plan(args) => handle_plan(&args),
    }
}

fn open_source(args: &cli::InputArgs) -> Result<CsvSource> {
    let encoding = resolve_encoding(args.input_encoding.as_deref())?;
    let delimiter = resolve_input_delimiter(&args.input, args.delimiter);
    debug!(
        "Opening '{}' with delimiter '{}' and encoding {}",
        args.input.display(),
        printable_delimiter(delimiter),
        encoding.name()
    );
    CsvSource::from_path(&args.input, delimiter, encoding)
        .with_context(|| format!("Opening input file {:?}", args.input))
}

fn load_schema(path: &Path) -> Result<MappingSchema> {
    MappingSchema::load(path).with_context(|| format!("Loading mapping schema from {path:?}"))
}

fn handle_read(args: &cli::ReadArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let root = schema
        .build_map()
        .with_context(|| format!("Building map tree for '{}'", schema.name))?;
    let source = open_source(&args.input)?;
    let mut sheet = SheetReader::new(source, schema.sheet_options());
    if args.skip > 0 && !sheet.seek(args.skip)? {
        info!("Input has fewer than {} data row(s); nothing to read", args.skip);
        return Ok(());
    }

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let mut emitted = 0usize;
    while args.limit.is_none_or(|limit| emitted < limit) && sheet.next_row()? {
        let value = sheet.read_value(&root)?.unwrap_or(Value::Null);
        let json = value.to_json();
        let rendered = if args.pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        }
        .context("Serializing record as JSON")?;
        writeln!(writer, "{rendered}").context("Writing record")?;
        emitted += 1;
    }
    writer.flush().context("Flushing output")?;
    info!(
        "Mapped {emitted} row(s) from '{}' as '{}'",
        args.input.input.display(),
        schema.name
    );
    Ok(())
}

fn handle_headers(args: &cli::HeadersArgs) -> Result<()> {
    let source = open_source(&args.input)?;
    let mut sheet = SheetReader::new(
        source,
        SheetOptions {
            header_row: args.header_row,
            ..SheetOptions::default()
        },
    );
    let header = sheet
        .header()?
        .ok_or_else(|| anyhow!("Input has no header row"))?;
    let rows = (0..header.len())
        .map(|index| {
            vec![
                index.to_string(),
                header.name_at(index).unwrap_or_default().to_string(),
                header.lookup_key(index).unwrap_or_default().to_string(),
            ]
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&["#", "name", "lookup key"], &rows));
    Ok(())
}

fn handle_plan(args: &cli::PlanArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let root = schema
        .build_map()
        .with_context(|| format!("Building map tree for '{}'", schema.name))?;
    for line in root.describe() {
        println!("{line}");
    }
    Ok(())
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

/// Explicit delimiter, else tab for `.tsv` files and comma otherwise.
pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    })
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
