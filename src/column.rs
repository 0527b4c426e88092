//! Sheet-independent column specifications and their resolution against a
//! concrete header.

use std::{fmt, sync::Arc};

use itertools::Itertools;
use regex::Regex;

use crate::{error::CellError, header::HeaderIndex};

/// Header-name predicate used by [`ColumnSpec::Predicate`].
#[derive(Clone)]
pub struct ColumnPredicate {
    description: String,
    matcher: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl ColumnPredicate {
    pub fn new<F>(description: impl Into<String>, matcher: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            matcher: Arc::new(matcher),
        }
    }

    pub fn regex(regex: Regex) -> Self {
        let description = format!("/{}/", regex.as_str());
        Self::new(description, move |name| regex.is_match(name))
    }

    pub fn matches(&self, name: &str) -> bool {
        (self.matcher)(name)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for ColumnPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ColumnPredicate")
            .field(&self.description)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ColumnSpec {
    Name(String),
    Index(usize),
    /// Single reads bind the first name present; multi reads require all.
    Names(Vec<String>),
    Indices(Vec<usize>),
    Predicate(ColumnPredicate),
    AllColumns,
    /// First child that binds wins.
    Composite(Vec<ColumnSpec>),
}

impl ColumnSpec {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSpec::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn matching<F>(description: impl Into<String>, matcher: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        ColumnSpec::Predicate(ColumnPredicate::new(description, matcher))
    }

    /// Whether this spec naturally addresses several columns at once.
    pub fn is_multiple(&self) -> bool {
        match self {
            ColumnSpec::Name(_) | ColumnSpec::Index(_) => false,
            ColumnSpec::Names(_)
            | ColumnSpec::Indices(_)
            | ColumnSpec::Predicate(_)
            | ColumnSpec::AllColumns => true,
            ColumnSpec::Composite(children) => children.iter().any(ColumnSpec::is_multiple),
        }
    }

    /// Whether binding without a header reads the current row's width.
    pub fn depends_on_row_width(&self) -> bool {
        match self {
            ColumnSpec::AllColumns => true,
            ColumnSpec::Composite(children) => children.iter().any(ColumnSpec::depends_on_row_width),
            _ => false,
        }
    }

    /// Binds to one column for scalar reads. `Ok(None)` means the column is
    /// absent from this sheet.
    pub fn bind_single(&self, layout: &SheetLayout<'_>) -> Result<Option<BoundReader>, CellError> {
        match self {
            ColumnSpec::Name(name) => {
                let header = layout.require_header(self)?;
                Ok(header.index_of(name).map(BoundReader::Single))
            }
            ColumnSpec::Names(names) => {
                let header = layout.require_header(self)?;
                Ok(names
                    .iter()
                    .find_map(|name| header.index_of(name))
                    .map(BoundReader::Single))
            }
            ColumnSpec::Index(index) => Ok(layout.positional(*index).map(BoundReader::Single)),
            ColumnSpec::Indices(indices) => Ok(indices
                .iter()
                .unique()
                .find_map(|index| layout.positional(*index))
                .map(BoundReader::Single)),
            ColumnSpec::Predicate(predicate) => {
                let header = layout.require_header(self)?;
                Ok(header
                    .first_index_matching(|name| predicate.matches(name))
                    .map(BoundReader::Single))
            }
            ColumnSpec::AllColumns => Ok(Some(BoundReader::Multiple(layout.all_columns()))),
            ColumnSpec::Composite(children) => {
                bind_first(children, |child| child.bind_single(layout))
            }
        }
    }

    /// Binds to every column this selection names, for collection reads.
    pub fn bind_multiple(
        &self,
        layout: &SheetLayout<'_>,
    ) -> Result<Option<BoundReader>, CellError> {
        match self {
            ColumnSpec::Name(_) | ColumnSpec::Index(_) => Ok(self
                .bind_single(layout)?
                .map(|bound| BoundReader::Multiple(bound.indices().to_vec()))),
            ColumnSpec::Names(names) => {
                let header = layout.require_header(self)?;
                let indices = names
                    .iter()
                    .map(|name| header.index_of(name))
                    .collect::<Option<Vec<_>>>();
                Ok(indices.map(BoundReader::Multiple))
            }
            ColumnSpec::Indices(indices) => {
                let bound = indices
                    .iter()
                    .unique()
                    .map(|index| layout.positional(*index))
                    .collect::<Option<Vec<_>>>();
                Ok(bound.map(BoundReader::Multiple))
            }
            ColumnSpec::Predicate(predicate) => {
                let header = layout.require_header(self)?;
                let indices = header.indices_matching(|name| predicate.matches(name));
                if indices.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(BoundReader::Multiple(indices)))
                }
            }
            ColumnSpec::AllColumns => Ok(Some(BoundReader::Multiple(layout.all_columns()))),
            ColumnSpec::Composite(children) => {
                bind_first(children, |child| child.bind_multiple(layout))
            }
        }
    }
}

fn bind_first<F>(children: &[ColumnSpec], mut bind: F) -> Result<Option<BoundReader>, CellError>
where
    F: FnMut(&ColumnSpec) -> Result<Option<BoundReader>, CellError>,
{
    let mut first_error = None;
    for child in children {
        match bind(child) {
            Ok(Some(bound)) => return Ok(Some(bound)),
            Ok(None) => {}
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(None),
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSpec::Name(name) => write!(f, "'{name}'"),
            ColumnSpec::Index(index) => write!(f, "#{index}"),
            ColumnSpec::Names(names) => write!(
                f,
                "[{}]",
                names.iter().map(|name| format!("'{name}'")).join(", ")
            ),
            ColumnSpec::Indices(indices) => write!(
                f,
                "[{}]",
                indices.iter().map(|index| format!("#{index}")).join(", ")
            ),
            ColumnSpec::Predicate(predicate) => write!(f, "matching {}", predicate.description()),
            ColumnSpec::AllColumns => f.write_str("all columns"),
            ColumnSpec::Composite(children) => {
                write!(f, "{}", children.iter().map(ToString::to_string).join(" or "))
            }
        }
    }
}

/// Column positions a spec resolved to on one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundReader {
    Single(usize),
    Multiple(Vec<usize>),
}

impl BoundReader {
    pub fn first(&self) -> Option<usize> {
        self.indices().first().copied()
    }

    pub fn indices(&self) -> &[usize] {
        match self {
            BoundReader::Single(index) => std::slice::from_ref(index),
            BoundReader::Multiple(indices) => indices,
        }
    }
}

/// What a spec is resolved against: the header, if the sheet has one, and the
/// width of the row being read.
#[derive(Debug, Clone, Copy)]
pub struct SheetLayout<'a> {
    pub header: Option<&'a HeaderIndex>,
    pub field_count: usize,
}

impl<'a> SheetLayout<'a> {
    fn require_header(&self, spec: &ColumnSpec) -> Result<&'a HeaderIndex, CellError> {
        self.header.ok_or_else(|| CellError::HeaderRequired {
            column: spec.to_string(),
        })
    }

    /// Headerless sheets accept any position; rows shorter than it read as empty.
    fn positional(&self, index: usize) -> Option<usize> {
        match self.header {
            Some(header) if index >= header.len() => None,
            _ => Some(index),
        }
    }

    fn all_columns(&self) -> Vec<usize> {
        let width = self.header.map_or(self.field_count, HeaderIndex::len);
        (0..width).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> HeaderIndex {
        HeaderIndex::build(names.iter().map(|n| Some(*n)), usize::MAX).expect("header")
    }

    fn layout(header: &HeaderIndex) -> SheetLayout<'_> {
        SheetLayout {
            header: Some(header),
            field_count: header.len(),
        }
    }

    #[test]
    fn only_all_columns_depends_on_row_width() {
        assert!(ColumnSpec::AllColumns.depends_on_row_width());
        assert!(
            ColumnSpec::Composite(vec![ColumnSpec::Index(0), ColumnSpec::AllColumns])
                .depends_on_row_width()
        );
        assert!(!ColumnSpec::Indices(vec![0, 1]).depends_on_row_width());
        assert!(!ColumnSpec::names(["a"]).depends_on_row_width());
    }

    #[test]
    fn names_bind_first_present_for_single_reads() {
        let index = header(&["A", "B", "C"]);
        let spec = ColumnSpec::names(["missing", "c", "b"]);
        assert_eq!(
            spec.bind_single(&layout(&index)).unwrap(),
            Some(BoundReader::Single(2))
        );
    }

    #[test]
    fn names_require_every_column_for_multi_reads() {
        let index = header(&["A", "B", "C"]);
        let present = ColumnSpec::names(["C", "A"]);
        assert_eq!(
            present.bind_multiple(&layout(&index)).unwrap(),
            Some(BoundReader::Multiple(vec![2, 0]))
        );
        let partial = ColumnSpec::names(["C", "Z"]);
        assert_eq!(partial.bind_multiple(&layout(&index)).unwrap(), None);
    }

    #[test]
    fn indices_deduplicate_and_keep_spec_order() {
        let index = header(&["A", "B", "C"]);
        let spec = ColumnSpec::Indices(vec![2, 0, 2]);
        assert_eq!(
            spec.bind_multiple(&layout(&index)).unwrap(),
            Some(BoundReader::Multiple(vec![2, 0]))
        );
        assert_eq!(
            spec.bind_single(&layout(&index)).unwrap(),
            Some(BoundReader::Single(2))
        );
    }

    #[test]
    fn predicate_follows_header_order() {
        let index = header(&["Q2", "Name", "Q1"]);
        let spec = ColumnSpec::matching("starts with Q", |name| name.starts_with('Q'));
        assert_eq!(
            spec.bind_multiple(&layout(&index)).unwrap(),
            Some(BoundReader::Multiple(vec![0, 2]))
        );
        assert_eq!(
            spec.bind_single(&layout(&index)).unwrap(),
            Some(BoundReader::Single(0))
        );
    }

    #[test]
    fn name_lookup_without_header_fails_loudly() {
        let headerless = SheetLayout {
            header: None,
            field_count: 3,
        };
        let err = ColumnSpec::Name("Id".to_string())
            .bind_single(&headerless)
            .unwrap_err();
        assert!(matches!(err, CellError::HeaderRequired { .. }));
        assert_eq!(
            ColumnSpec::Index(7).bind_single(&headerless).unwrap(),
            Some(BoundReader::Single(7))
        );
    }

    #[test]
    fn composite_falls_through_to_later_children() {
        let index = header(&["Identifier"]);
        let spec = ColumnSpec::Composite(vec![
            ColumnSpec::Name("Id".to_string()),
            ColumnSpec::Name("Identifier".to_string()),
        ]);
        assert_eq!(
            spec.bind_single(&layout(&index)).unwrap(),
            Some(BoundReader::Single(0))
        );
        let none = ColumnSpec::Composite(vec![ColumnSpec::Index(5)]);
        assert_eq!(none.bind_single(&layout(&index)).unwrap(), None);
    }
}
