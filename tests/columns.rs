mod common;

use regex::Regex;
use sheet_mapper::{
    column::{BoundReader, ColumnPredicate, ColumnSpec, SheetLayout},
    error::CellError,
};

use common::header;

fn layout(header: &sheet_mapper::header::HeaderIndex) -> SheetLayout<'_> {
    SheetLayout {
        header: Some(header),
        field_count: header.len(),
    }
}

fn headerless(width: usize) -> SheetLayout<'static> {
    SheetLayout {
        header: None,
        field_count: width,
    }
}

#[test]
fn single_reads_take_the_first_present_name() {
    let index = header(&["Code", "Name", "Alias"]);
    let spec = ColumnSpec::names(["Nickname", "alias", "name"]);
    assert_eq!(
        spec.bind_single(&layout(&index)),
        Ok(Some(BoundReader::Single(2)))
    );
}

#[test]
fn multi_reads_require_every_name() {
    let index = header(&["A1", "A2", "A3"]);
    let all = ColumnSpec::names(["A1", "A2", "A3"]);
    assert_eq!(
        all.bind_multiple(&layout(&index)),
        Ok(Some(BoundReader::Multiple(vec![0, 1, 2])))
    );
    let missing = ColumnSpec::names(["A1", "A4"]);
    assert_eq!(missing.bind_multiple(&layout(&index)), Ok(None));
}

#[test]
fn indices_outside_the_header_are_absent() {
    let index = header(&["A", "B"]);
    assert_eq!(ColumnSpec::Index(5).bind_single(&layout(&index)), Ok(None));
    assert_eq!(
        ColumnSpec::Indices(vec![4, 1, 1]).bind_single(&layout(&index)),
        Ok(Some(BoundReader::Single(1)))
    );
    assert_eq!(
        ColumnSpec::Indices(vec![1, 0, 1]).bind_multiple(&layout(&index)),
        Ok(Some(BoundReader::Multiple(vec![1, 0])))
    );
}

#[test]
fn predicates_bind_in_header_order() {
    let index = header(&["Q1 Sales", "Region", "Q2 Sales", "Q3 Costs"]);
    let spec = ColumnSpec::Predicate(ColumnPredicate::regex(
        Regex::new(r"^Q\d Sales$").expect("regex"),
    ));
    assert_eq!(
        spec.bind_multiple(&layout(&index)),
        Ok(Some(BoundReader::Multiple(vec![0, 2])))
    );
    assert_eq!(
        spec.bind_single(&layout(&index)),
        Ok(Some(BoundReader::Single(0)))
    );

    let none = ColumnSpec::matching("starts with Z", |name| name.starts_with('Z'));
    assert_eq!(none.bind_multiple(&layout(&index)), Ok(None));
}

#[test]
fn name_based_specs_need_a_header() {
    for spec in [
        ColumnSpec::Name("Id".to_string()),
        ColumnSpec::names(["Id"]),
        ColumnSpec::matching("any", |_| true),
    ] {
        assert!(matches!(
            spec.bind_single(&headerless(3)),
            Err(CellError::HeaderRequired { .. })
        ));
    }
}

#[test]
fn headerless_sheets_bind_any_position() {
    assert_eq!(
        ColumnSpec::Index(7).bind_single(&headerless(2)),
        Ok(Some(BoundReader::Single(7)))
    );
    assert_eq!(
        ColumnSpec::AllColumns.bind_multiple(&headerless(3)),
        Ok(Some(BoundReader::Multiple(vec![0, 1, 2])))
    );
}

#[test]
fn composite_falls_through_to_the_first_child_that_binds() {
    let index = header(&["Id", "Name"]);
    let spec = ColumnSpec::Composite(vec![
        ColumnSpec::Name("Identifier".to_string()),
        ColumnSpec::Name("Id".to_string()),
        ColumnSpec::Index(1),
    ]);
    assert_eq!(
        spec.bind_single(&layout(&index)),
        Ok(Some(BoundReader::Single(0)))
    );
    assert_eq!(spec.to_string(), "'Identifier' or 'Id' or #1");
}

#[test]
fn composite_on_headerless_sheet_uses_positional_children() {
    let spec = ColumnSpec::Composite(vec![
        ColumnSpec::Name("Id".to_string()),
        ColumnSpec::Index(0),
    ]);
    assert_eq!(
        spec.bind_single(&headerless(2)),
        Ok(Some(BoundReader::Single(0)))
    );

    let names_only = ColumnSpec::Composite(vec![
        ColumnSpec::Name("Id".to_string()),
        ColumnSpec::Name("Key".to_string()),
    ]);
    assert_eq!(
        names_only.bind_single(&headerless(2)),
        Err(CellError::HeaderRequired {
            column: "'Id'".to_string()
        })
    );
}

#[test]
fn multiplicity_follows_the_spec_kind() {
    assert!(!ColumnSpec::Name("a".to_string()).is_multiple());
    assert!(!ColumnSpec::Index(0).is_multiple());
    assert!(ColumnSpec::AllColumns.is_multiple());
    assert!(
        ColumnSpec::Composite(vec![ColumnSpec::Index(0), ColumnSpec::names(["a", "b"])])
            .is_multiple()
    );
}
