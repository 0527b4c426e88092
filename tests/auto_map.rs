mod common;

use std::collections::BTreeMap;

use sheet_mapper::{
    Importer, impl_sheet_record,
    auto::AutoMapper,
    column::ColumnSpec,
    error::{ConfigError, Error},
    fallback::{EmptyValueStrategy, FixedValue},
    map::Map,
    mappers::DictionaryMapper,
    value::Value,
};

use common::{Address, Order, Person, Status, sheet};

#[derive(Debug, Default, PartialEq)]
struct Product {
    code: String,
    qty: u32,
    ratio: f64,
    notes: String,
    grade: char,
}

impl_sheet_record!(Product {
    code: String => |field| field.column("Product Code"),
    qty: u32 => |field| field.default_value(1u32),
    ratio: f64 => |field| field.invalid_fallback(FixedValue::new(0.0)),
    notes: String => |field| field.ignore(),
    grade: char => |field| field.mapper(DictionaryMapper::new([("best", Value::Char('A'))])),
});

#[derive(Debug, Default, PartialEq)]
struct Scores {
    id: i32,
    quarters: [i32; 3],
    regions: BTreeMap<String, i32>,
}

impl_sheet_record!(Scores {
    id: i32,
    quarters: [i32; 3] => |field| field.columns(ColumnSpec::names(["Q1", "Q2", "Q3"])),
    regions: BTreeMap<String, i32> => |field| field.columns(ColumnSpec::matching(
        "region columns",
        |name| name.starts_with("R:"),
    )),
});

#[test]
fn nested_records_read_their_fields_from_the_same_row() {
    let mut rows = sheet(vec![
        vec!["id", "status", "tags", "city", "zip"],
        vec!["7", "closed", "red;blue", "Oslo", ""],
    ]);
    let order: Order = Importer::new()
        .read_row(&mut rows)
        .expect("row")
        .expect("present");
    assert_eq!(
        order,
        Order {
            id: 7,
            status: Status::Closed,
            tags: vec!["red".to_string(), "blue".to_string()],
            address: Address {
                city: "Oslo".to_string(),
                zip: None,
            },
        }
    );
}

#[test]
fn tree_mirrors_the_record_layout() {
    let map = AutoMapper::default().map_type::<Order>().expect("map");
    let lines = map.describe();
    assert_eq!(lines[0], "Order (object)");
    assert!(lines[1].starts_with("  id: i64 <- 'id'"));
    assert!(lines[2].starts_with("  status: Status <- 'status'"));
    assert!(lines[3].starts_with("  tags: Vec<String> <- split 'tags' by [',', ';']"));
    assert_eq!(lines[4], "  address: Address (object)");
    assert!(lines[5].starts_with("    city: string <- 'city'"));
}

#[test]
fn declared_field_settings_shape_the_tree() {
    let map = AutoMapper::default().map_type::<Product>().expect("map");
    let Map::Object(object) = &map else {
        panic!("expected an object map");
    };
    let names = object
        .members()
        .iter()
        .map(|member| member.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["code", "qty", "ratio", "grade"]);

    let mut rows = sheet(vec![
        vec!["Product Code", "qty", "ratio", "notes", "grade"],
        vec!["P-1", "", "n/a", "fragile", "best"],
        vec!["P-2", "4", "0.25", "", "B"],
    ]);
    let products: Vec<Product> = Importer::new().read_all(&mut rows).expect("rows");
    assert_eq!(
        products,
        vec![
            Product {
                code: "P-1".to_string(),
                qty: 1,
                ratio: 0.0,
                notes: String::new(),
                grade: 'A',
            },
            Product {
                code: "P-2".to_string(),
                qty: 4,
                ratio: 0.25,
                notes: String::new(),
                grade: 'B',
            },
        ]
    );
}

#[test]
fn arrays_and_dictionaries_span_several_columns() {
    let mut rows = sheet(vec![
        vec!["id", "Q1", "Q2", "Q3", "R:North", "R:South"],
        vec!["1", "10", "20", "30", "5", "6"],
    ]);
    let scores: Scores = Importer::new()
        .read_row(&mut rows)
        .expect("row")
        .expect("present");
    assert_eq!(scores.quarters, [10, 20, 30]);
    assert_eq!(
        scores.regions,
        BTreeMap::from([("R:North".to_string(), 5), ("R:South".to_string(), 6)])
    );
}

#[test]
fn empty_cells_follow_the_configured_strategy() {
    let rows = || sheet(vec![vec!["id", "name"], vec!["", "Ann"]]);

    let err = Importer::new()
        .read_row::<Person, _>(&mut rows())
        .unwrap_err();
    assert!(matches!(err, Error::Row(ref row) if row.member.as_deref() == Some("id")));

    let mut lenient = Importer::with_mapper(AutoMapper::new(EmptyValueStrategy::SetToDefaultValue));
    let person: Person = lenient
        .read_row(&mut rows())
        .expect("row")
        .expect("present");
    assert_eq!(person.id, 0);
    assert_eq!(person.name, "Ann");
}

#[test]
fn unsupported_field_types_fail_at_configuration_time() {
    #[derive(Debug, Default)]
    struct Matrix {
        cells: Vec<Vec<i32>>,
    }

    impl_sheet_record!(Matrix {
        cells: Vec<Vec<i32>>,
    });

    let err = AutoMapper::default().map_type::<Matrix>().unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedType { .. }));
}
