mod common;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

use common::{TestWorkspace, fixture_path};

fn sheet_mapper() -> Command {
    Command::cargo_bin("sheet-mapper").expect("binary exists")
}

fn fixture(name: &str) -> String {
    fixture_path(name).to_str().expect("utf-8 path").to_string()
}

#[test]
fn read_emits_one_json_line_per_row() {
    let output = sheet_mapper()
        .args([
            "read",
            "-i",
            &fixture("orders.csv"),
            "-s",
            &fixture("orders.yaml"),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf-8 output");
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 3);

    let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
    assert_eq!(
        first,
        serde_json::json!({
            "id": 1,
            "status": "Open",
            "tags": ["a", "b"],
            "address": { "city": "OSLO", "zip": "0150" }
        })
    );
    let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
    assert_eq!(second["tags"], serde_json::json!([]));
    assert_eq!(second["address"]["zip"], serde_json::Value::Null);
    assert!(lines[2].contains("TROMS"));
}

#[test]
fn read_honours_skip_and_limit() {
    sheet_mapper()
        .args([
            "read",
            "-i",
            &fixture("orders.csv"),
            "-s",
            &fixture("orders.yaml"),
            "--skip",
            "1",
            "--limit",
            "1",
        ])
        .assert()
        .success()
        .stdout(contains("BERGEN").and(contains("OSLO").not()).and(contains("TROMS").not()));
}

#[test]
fn read_reports_the_failing_row() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("bad.csv", "id,status,tags,city,zip\n1,open,,Oslo,\nx,open,,Bergen,\n");
    sheet_mapper()
        .args([
            "read",
            "-i",
            input.to_str().expect("utf-8 path"),
            "-s",
            &fixture("orders.yaml"),
        ])
        .assert()
        .failure()
        .stdout(contains("OSLO"))
        .stderr(contains("Sheet 'bad' row 2 column 'id' (member 'id')"));
}

#[test]
fn read_accepts_custom_delimiters_and_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", "Person Id;Full Name\n7;Ada\n");
    let schema = workspace.write(
        "people.yaml",
        "name: Person\nfields:\n  - name: id\n    type: integer\n    column: Person Id\n  - name: name\n    column: Full Name\n",
    );
    sheet_mapper()
        .args([
            "read",
            "-i",
            input.to_str().expect("utf-8 path"),
            "-s",
            schema.to_str().expect("utf-8 path"),
            "--delimiter",
            ";",
        ])
        .assert()
        .success()
        .stdout(contains(r#"{"id":7,"name":"Ada"}"#));
}

#[test]
fn headers_lists_disambiguated_lookup_keys() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("dupes.csv", "A,B,a\n1,2,3\n");
    sheet_mapper()
        .args(["headers", "-i", input.to_str().expect("utf-8 path")])
        .assert()
        .success()
        .stdout(contains("lookup key").and(contains("a_2")));
}

#[test]
fn plan_prints_the_map_tree() {
    sheet_mapper()
        .args(["plan", "-s", &fixture("orders.yaml")])
        .assert()
        .success()
        .stdout(
            contains("Order (object)")
                .and(contains("  address: Order.Address (object)"))
                .and(contains("ConvertCase(Upper)")),
        );
}

#[test]
fn missing_schema_file_fails_with_context() {
    sheet_mapper()
        .args(["plan", "-s", "does-not-exist.yaml"])
        .assert()
        .failure()
        .stderr(contains("Loading mapping schema"));
}

#[test]
fn unknown_encoding_is_rejected() {
    sheet_mapper()
        .args([
            "headers",
            "-i",
            &fixture("orders.csv"),
            "--input-encoding",
            "klingon",
        ])
        .assert()
        .failure()
        .stderr(contains("Unknown encoding 'klingon'"));
}
