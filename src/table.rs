//! Plain-text tables for terminal output.

use std::{borrow::Cow, fmt::Write as _};

/// Renders left-aligned columns separated by two spaces, with a dashed rule
/// under the header. Rows shorter than the header leave trailing cells blank.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count().max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(single_line(cell).chars().count());
        }
    }

    let mut output = String::new();
    let header_cells = headers.iter().map(|header| Cow::Borrowed(*header));
    let _ = writeln!(output, "{}", join_cells(header_cells, &widths));
    let rule = widths.iter().map(|width| Cow::Owned("-".repeat(*width)));
    let _ = writeln!(output, "{}", join_cells(rule, &widths));
    for row in rows {
        let cells = row.iter().map(|cell| single_line(cell));
        let _ = writeln!(output, "{}", join_cells(cells, &widths));
    }
    output
}

fn join_cells<'a>(cells: impl Iterator<Item = Cow<'a, str>>, widths: &[usize]) -> String {
    let mut line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_columns_to_the_widest_cell() {
        let rendered = render_table(
            &["#", "name"],
            &[
                vec!["0".to_string(), "Customer Name".to_string()],
                vec!["1".to_string(), "a\tb".to_string()],
            ],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "#    name");
        assert_eq!(lines[1], "---  -------------");
        assert_eq!(lines[2], "0    Customer Name");
        assert_eq!(lines[3], "1    a b");
    }
}
