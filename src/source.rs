//! Row sources: the decoder-facing side of the engine.
//!
//! The mapping engine only needs to step through rows and pull raw cell
//! values by position. [`CsvSource`] provides that over delimited text
//! (any `encoding_rs` encoding); [`MemorySource`] does the same over rows
//! already held in memory, typically in tests or when another decoder has
//! produced typed cells.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufReader, Cursor, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDateTime;
use encoding_rs::{Encoding, UTF_8};

use crate::{error::SheetError, value::Value};

/// Raw value of one cell as reported by the decoder.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Text handed to the value pipeline; `None` for empty cells.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(text) => Some(text.clone()),
            Cell::Number(number) => Some(Value::Float(*number).as_display()),
            Cell::Boolean(flag) => Some(flag.to_string()),
            Cell::DateTime(stamp) => Some(stamp.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        if text.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(text.to_string())
        }
    }
}

/// Primitive operations the engine needs from a sheet decoder.
pub trait RowSource {
    /// Sheet name used in diagnostics.
    fn name(&self) -> &str;

    /// Moves to the next physical row; `false` once the sheet is exhausted.
    fn read_next_row(&mut self) -> Result<bool, SheetError>;

    /// Width of the current row.
    fn field_count(&self) -> usize;

    /// Raw cell at `column` in the current row; out-of-range columns are empty.
    fn raw_value(&self, column: usize) -> Cell;

    /// Cell text as the sheet displays it. Decoders without display
    /// formatting fall back to the raw text.
    fn formatted_value(&self, column: usize) -> Option<String> {
        self.raw_value(column).to_text()
    }

    /// Rewinds so that the next `read_next_row` returns the first physical row.
    fn reset(&mut self) -> Result<(), SheetError>;

    /// Positions the source on physical row `row` (zero-based). Returns
    /// `false` if the sheet ends first.
    fn advance_to(&mut self, row: usize) -> Result<bool, SheetError> {
        self.reset()?;
        for _ in 0..=row {
            if !self.read_next_row()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// In-memory rows, optionally with display formatting per cell.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    rows: Vec<Vec<Cell>>,
    formatted: HashMap<(usize, usize), String>,
    position: Option<usize>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
            formatted: HashMap::new(),
            position: None,
        }
    }

    /// Text rows; empty strings become [`Cell::Empty`].
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<&str>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Cell::from).collect())
            .collect();
        Self::new(name, rows)
    }

    pub fn with_formatting(mut self, row: usize, column: usize, text: impl Into<String>) -> Self {
        self.formatted.insert((row, column), text.into());
        self
    }

    fn current(&self) -> Option<&Vec<Cell>> {
        self.position.and_then(|idx| self.rows.get(idx))
    }
}

impl RowSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_next_row(&mut self) -> Result<bool, SheetError> {
        let next = self.position.map_or(0, |idx| idx + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn field_count(&self) -> usize {
        self.current().map_or(0, Vec::len)
    }

    fn raw_value(&self, column: usize) -> Cell {
        self.current()
            .and_then(|row| row.get(column))
            .cloned()
            .unwrap_or_default()
    }

    fn formatted_value(&self, column: usize) -> Option<String> {
        self.position
            .and_then(|row| self.formatted.get(&(row, column)))
            .cloned()
            .or_else(|| self.raw_value(column).to_text())
    }

    fn reset(&mut self) -> Result<(), SheetError> {
        self.position = None;
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Origin {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// Delimited text decoded with an arbitrary encoding. Every row is exposed;
/// header handling is left to the sheet reader.
pub struct CsvSource {
    name: String,
    origin: Origin,
    delimiter: u8,
    encoding: &'static Encoding,
    reader: csv::Reader<Box<dyn Read>>,
    record: csv::ByteRecord,
    current: Vec<String>,
}

impl CsvSource {
    /// Opens a file, or standard input when `path` is `-`.
    pub fn from_path(
        path: &Path,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<Self, SheetError> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("stdin")
            .to_string();
        let origin = if path == Path::new("-") {
            let mut buffer = Vec::new();
            io::stdin().lock().read_to_end(&mut buffer)?;
            Origin::Bytes(buffer.into())
        } else {
            Origin::Path(path.to_path_buf())
        };
        Self::open(name, origin, delimiter, encoding)
    }

    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<Self, SheetError> {
        let bytes: Vec<u8> = bytes.into();
        Self::open(name.into(), Origin::Bytes(bytes.into()), delimiter, encoding)
    }

    pub fn utf8(name: impl Into<String>, text: &str) -> Result<Self, SheetError> {
        Self::from_bytes(name, text.as_bytes(), b',', UTF_8)
    }

    fn open(
        name: String,
        origin: Origin,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<Self, SheetError> {
        let reader = open_reader(&origin, delimiter)?;
        Ok(Self {
            name,
            origin,
            delimiter,
            encoding,
            reader,
            record: csv::ByteRecord::new(),
            current: Vec::new(),
        })
    }
}

fn open_reader(origin: &Origin, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>, SheetError> {
    let input: Box<dyn Read> = match origin {
        Origin::Path(path) => Box::new(BufReader::new(File::open(path)?)),
        Origin::Bytes(bytes) => Box::new(Cursor::new(Arc::clone(bytes))),
    };
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_reader(input))
}

fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> Result<String, SheetError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(SheetError::Decode {
            encoding: encoding.name().to_string(),
        })
    } else {
        Ok(text.into_owned())
    }
}

impl RowSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_next_row(&mut self) -> Result<bool, SheetError> {
        if !self.reader.read_byte_record(&mut self.record)? {
            self.current.clear();
            return Ok(false);
        }
        self.current = self
            .record
            .iter()
            .map(|field| decode_field(field, self.encoding))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(true)
    }

    fn field_count(&self) -> usize {
        self.current.len()
    }

    fn raw_value(&self, column: usize) -> Cell {
        self.current
            .get(column)
            .map(|text| Cell::from(text.as_str()))
            .unwrap_or_default()
    }

    fn reset(&mut self) -> Result<(), SheetError> {
        self.reader = open_reader(&self.origin, self.delimiter)?;
        self.current.clear();
        Ok(())
    }
}
