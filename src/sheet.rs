//! Sheet-level row stepping and the per-sheet column binding cache.

use std::collections::HashMap;

use log::{debug, trace};

use crate::{
    column::{BoundReader, ColumnSpec, SheetLayout},
    error::{CellError, Error, RowMappingError, SheetError, join_member_path},
    header::HeaderIndex,
    map::{CellFailure, ColumnRef, Map, NodeId},
    source::{Cell, RowSource},
    value::Value,
};

pub const DEFAULT_MAX_COLUMNS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetOptions {
    pub has_header: bool,
    /// Physical row holding the header; rows above it are skipped.
    pub header_row: usize,
    pub skip_blank_lines: bool,
    pub max_columns: usize,
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            header_row: 0,
            skip_blank_lines: true,
            max_columns: DEFAULT_MAX_COLUMNS,
        }
    }
}

impl SheetOptions {
    pub fn headerless() -> Self {
        Self {
            has_header: false,
            ..Self::default()
        }
    }
}

/// Column bindings for one sheet, keyed by map node. A header never changes
/// within a sheet, so each node binds at most once per read direction.
#[derive(Debug, Default)]
pub struct BindingCache {
    entries: HashMap<(NodeId, bool), Result<Option<BoundReader>, CellError>>,
}

impl BindingCache {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything a map node may look at while resolving the current row.
pub struct RowContext<'a> {
    source: &'a dyn RowSource,
    header: Option<&'a HeaderIndex>,
    cache: &'a mut BindingCache,
}

impl<'a> RowContext<'a> {
    pub fn new(
        source: &'a dyn RowSource,
        header: Option<&'a HeaderIndex>,
        cache: &'a mut BindingCache,
    ) -> Self {
        Self {
            source,
            header,
            cache,
        }
    }

    pub fn header(&self) -> Option<&'a HeaderIndex> {
        self.header
    }

    /// Binds `spec` for node `id`, reusing an earlier binding on this sheet.
    /// Headerless bindings that follow the row width are redone per row.
    pub fn bind(
        &mut self,
        id: NodeId,
        spec: &ColumnSpec,
        multiple: bool,
    ) -> Result<Option<BoundReader>, CellError> {
        let per_row = self.header.is_none() && spec.depends_on_row_width();
        if !per_row && let Some(cached) = self.cache.entries.get(&(id, multiple)) {
            return cached.clone();
        }
        let layout = SheetLayout {
            header: self.header,
            field_count: self.source.field_count(),
        };
        let bound = if multiple {
            spec.bind_multiple(&layout)
        } else {
            spec.bind_single(&layout)
        };
        trace!(
            "Bound {spec} on sheet '{}' to {bound:?}",
            self.source.name()
        );
        if !per_row {
            self.cache.entries.insert((id, multiple), bound.clone());
        }
        bound
    }

    pub fn cell(&self, column: usize) -> Cell {
        self.source.raw_value(column)
    }

    /// Text for the pipeline: the display-formatted value when requested,
    /// otherwise the raw cell rendered as text.
    pub fn text(&self, column: usize, raw: &Cell, preserve_formatting: bool) -> Option<String> {
        if preserve_formatting {
            self.source.formatted_value(column)
        } else {
            raw.to_text()
        }
    }
}

/// Steps through the data rows of one sheet and resolves map trees against
/// the current row.
pub struct SheetReader<S> {
    source: S,
    options: SheetOptions,
    header: Option<HeaderIndex>,
    header_loaded: bool,
    bindings: BindingCache,
    current_row: Option<usize>,
}

impl<S: RowSource> SheetReader<S> {
    pub fn new(source: S, options: SheetOptions) -> Self {
        Self {
            source,
            options,
            header: None,
            header_loaded: false,
            bindings: BindingCache::default(),
            current_row: None,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn options(&self) -> &SheetOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Physical index of the row last returned by [`next_row`](Self::next_row).
    pub fn current_row(&self) -> Option<usize> {
        self.current_row
    }

    /// Header of the sheet, reading it on first use. `None` for headerless sheets.
    pub fn header(&mut self) -> Result<Option<&HeaderIndex>, SheetError> {
        self.ensure_header()?;
        Ok(self.header.as_ref())
    }

    fn ensure_header(&mut self) -> Result<(), SheetError> {
        if self.header_loaded {
            return Ok(());
        }
        if self.options.has_header {
            for _ in 0..=self.options.header_row {
                if !self.source.read_next_row()? {
                    return Err(SheetError::NoHeaderRow {
                        sheet: self.source.name().to_string(),
                        row: self.options.header_row,
                    });
                }
            }
            let names = (0..self.source.field_count())
                .map(|column| self.source.raw_value(column).to_text())
                .collect::<Vec<_>>();
            let header = HeaderIndex::build(names, self.options.max_columns)?;
            debug!(
                "Read header of sheet '{}' at row {} with {} column(s)",
                self.source.name(),
                self.options.header_row,
                header.len()
            );
            self.header = Some(header);
            self.current_row = Some(self.options.header_row);
        }
        self.header_loaded = true;
        Ok(())
    }

    fn is_blank(&self) -> bool {
        (0..self.source.field_count()).all(|column| self.source.raw_value(column).is_empty())
    }

    /// Moves to the next data row; `false` once the sheet is exhausted.
    pub fn next_row(&mut self) -> Result<bool, SheetError> {
        self.ensure_header()?;
        loop {
            if !self.source.read_next_row()? {
                return Ok(false);
            }
            let row = self.current_row.map_or(0, |row| row + 1);
            self.current_row = Some(row);
            if self.source.field_count() > self.options.max_columns {
                return Err(SheetError::TooManyColumns {
                    count: self.source.field_count(),
                    max: self.options.max_columns,
                });
            }
            if self.options.skip_blank_lines && self.is_blank() {
                trace!("Skipping blank row {row} of sheet '{}'", self.source.name());
                continue;
            }
            return Ok(true);
        }
    }

    /// Rewinds to before the first data row. Column bindings are kept.
    pub fn reset(&mut self) -> Result<(), SheetError> {
        self.source.reset()?;
        self.current_row = None;
        self.header_loaded = false;
        Ok(())
    }

    /// Positions the reader so that the next [`next_row`](Self::next_row)
    /// returns data row `index` (zero-based, counted after the header).
    pub fn seek(&mut self, index: usize) -> Result<bool, SheetError> {
        self.reset()?;
        self.ensure_header()?;
        if index == 0 {
            return Ok(true);
        }
        if self.options.skip_blank_lines {
            for _ in 0..index {
                if !self.next_row()? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        let before = match self.current_row {
            Some(header_row) => header_row + index,
            None => index - 1,
        };
        let found = self.source.advance_to(before)?;
        self.current_row = Some(before);
        Ok(found)
    }

    /// Resolves `map` against the current row.
    pub fn read_value(&mut self, map: &Map) -> Result<Option<Value>, Error> {
        self.ensure_header()?;
        let mut ctx = RowContext::new(&self.source, self.header.as_ref(), &mut self.bindings);
        match map.resolve(&mut ctx) {
            Ok(value) => Ok(value),
            Err(failure) => Err(self.row_error(failure).into()),
        }
    }

    pub fn row_error(&self, failure: CellFailure) -> RowMappingError {
        let column = failure.column.map(|column| match column {
            ColumnRef::Index(index) => self
                .header
                .as_ref()
                .and_then(|header| header.name_at(index))
                .filter(|name| !name.is_empty())
                .map(|name| format!("'{name}'"))
                .unwrap_or_else(|| format!("#{index}")),
            ColumnRef::Spec(spec) => spec,
        });
        let member = if failure.member.is_empty() {
            None
        } else {
            Some(join_member_path(&failure.member))
        };
        RowMappingError {
            sheet: self.source.name().to_string(),
            row: self.current_row.unwrap_or_default(),
            column,
            member,
            source: failure.error,
        }
    }
}
