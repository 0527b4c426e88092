//! Error taxonomy for configuration, per-cell reads, and row mapping.
//!
//! Configuration problems ([`ConfigError`]) are raised while map trees are
//! built or customised and are always fatal. Cell-level problems
//! ([`CellError`]) are recoverable inside a value pipeline when a fallback is
//! registered; otherwise they escalate to a [`RowMappingError`], the only
//! error a row-level caller sees.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Don't know how to build type '{type_name}': {reason}")]
    UnsupportedType { type_name: String, reason: String },

    #[error("Type '{type_name}' refers to itself through field '{field}'")]
    RecursiveType { type_name: String, field: String },

    #[error("Type '{type_name}' has no field named '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("Invalid path expression '{path}' at position {position}: {reason}")]
    MalformedPath {
        path: String,
        position: usize,
        reason: String,
    },

    #[error("Path step '{step}' cannot be applied to type '{type_name}'")]
    UnsupportedStep { step: String, type_name: String },

    #[error("Separator list must not be empty")]
    EmptySeparators,

    #[error("Format list must not be empty")]
    EmptyFormats,

    #[error("Value pipeline for '{target}' has no mappers")]
    MissingMapper { target: String },

    #[error("A class map for '{type_name}' is already registered")]
    DuplicateClassMap { type_name: String },

    #[error("Class maps are frozen once rows have been read; cannot configure '{type_name}'")]
    Frozen { type_name: String },

    #[error("Cannot {operation} on {target}")]
    Unsupported { operation: String, target: String },

    #[error("Value '{value}' is not a valid {target}: {reason}")]
    InvalidValue {
        value: String,
        target: String,
        reason: String,
    },
}

/// Failure converting a dynamic [`Value`](crate::value::Value) into a Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValueError {
    pub expected: String,
    pub found: String,
    pub path: Vec<String>,
}

impl ValueError {
    pub fn new(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
            path: Vec::new(),
        }
    }

    /// Prefixes the error location with a record field or element label.
    pub fn within(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "expected {}, found {}", self.expected, self.found)
        } else {
            write!(
                f,
                "field '{}': expected {}, found {}",
                join_member_path(&self.path),
                self.expected,
                self.found
            )
        }
    }
}

/// Joins member segments as `owner.items[0].name`.
pub fn join_member_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut joined = String::new();
    for segment in segments {
        let segment = segment.as_ref();
        if !joined.is_empty() && !segment.starts_with('[') {
            joined.push('.');
        }
        joined.push_str(segment);
    }
    joined
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("Column {column} not found")]
    ColumnNotFound { column: String },

    #[error("Sheet has no header row; column {column} cannot be located by name")]
    HeaderRequired { column: String },

    #[error("Cell is empty but a {target} value is required")]
    EmptyValue { target: String },

    #[error("Cannot convert '{value}' to {target}: {reason}")]
    Conversion {
        value: String,
        target: String,
        reason: String,
    },

    #[error(transparent)]
    Assignment(#[from] ValueError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Sheet '{sheet}' row {row}{}{}: {source}", describe_column(.column), describe_member(.member))]
pub struct RowMappingError {
    pub sheet: String,
    pub row: usize,
    pub column: Option<String>,
    pub member: Option<String>,
    #[source]
    pub source: CellError,
}

fn describe_column(column: &Option<String>) -> String {
    column
        .as_deref()
        .map(|c| format!(" column {c}"))
        .unwrap_or_default()
}

fn describe_member(member: &Option<String>) -> String {
    member
        .as_deref()
        .filter(|m| !m.is_empty())
        .map(|m| format!(" (member '{m}')"))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Row has {count} column(s) which exceeds the configured maximum of {max}")]
    TooManyColumns { count: usize, max: usize },

    #[error("Sheet '{sheet}' has no header row at index {row}")]
    NoHeaderRow { sheet: String, row: usize },

    #[error("Sheet '{sheet}' cannot be repositioned")]
    ResetUnsupported { sheet: String },

    #[error("Failed to decode text with encoding {encoding}")]
    Decode { encoding: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Row(#[from] RowMappingError),

    #[error(transparent)]
    Sheet(#[from] SheetError),
}

pub type Result<T> = std::result::Result<T, Error>;
