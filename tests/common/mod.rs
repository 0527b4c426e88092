#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use sheet_mapper::{
    impl_sheet_enum, impl_sheet_record,
    header::HeaderIndex,
    sheet::{SheetOptions, SheetReader},
    source::MemorySource,
};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Sheet over in-memory text rows; the first row is the header.
pub fn sheet(rows: Vec<Vec<&str>>) -> SheetReader<MemorySource> {
    SheetReader::new(MemorySource::from_rows("Sheet1", rows), SheetOptions::default())
}

pub fn headerless_sheet(rows: Vec<Vec<&str>>) -> SheetReader<MemorySource> {
    SheetReader::new(
        MemorySource::from_rows("Sheet1", rows),
        SheetOptions::headerless(),
    )
}

pub fn header(names: &[&str]) -> HeaderIndex {
    HeaderIndex::build(names.iter().map(|name| Some(*name)), usize::MAX).expect("header")
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub id: i32,
    pub name: String,
}

impl_sheet_record!(Person {
    id: i32,
    name: String,
});

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Status {
    #[default]
    Open,
    Closed,
}

impl_sheet_enum!(Status { Open, Closed });

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Address {
    pub city: String,
    pub zip: Option<String>,
}

impl_sheet_record!(Address {
    city: String,
    zip: Option<String>,
});

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub status: Status,
    pub tags: Vec<String>,
    pub address: Address,
}

impl_sheet_record!(Order {
    id: i64,
    status: Status,
    tags: Vec<String>,
    address: Address,
});
