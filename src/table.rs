use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{data::Value, store::QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Renders a query result as an elastic text table. Numeric columns are
/// right-aligned; nulls render as blanks.
pub fn render_result(result: &QueryResult) -> String {
    let rows = result
        .rows
        .iter()
        .map(|row| row.iter().map(Value::as_display).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let aligns = (0..result.columns.len())
        .map(|idx| {
            let numeric = result
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|value| !value.is_null())
                .all(|value| value.as_f64().is_some());
            if numeric && !result.is_empty() {
                Align::Right
            } else {
                Align::Left
            }
        })
        .collect::<Vec<_>>();
    render_aligned(&result.columns, &rows, &aligns)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    render_aligned(headers, rows, &vec![Align::Left; headers.len()])
}

fn render_aligned(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    let header_line = format_row(headers, &widths, aligns);
    let _ = writeln!(output, "{header_line}");

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths, &[]);
    let _ = writeln!(output, "{separator_line}");

    for row in rows {
        let row_line = format_row(row, &widths, aligns);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

pub fn print_result(result: &QueryResult) {
    print!("{}", render_result(result));
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        let pad = " ".repeat(padding);
        let cell = match aligns.get(idx).copied().unwrap_or(Align::Left) {
            Align::Left => format!("{sanitized}{pad}"),
            Align::Right => format!("{pad}{sanitized}"),
        };
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // Skip ANSI escape sequence (e.g. \x1b[31m)
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
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
    fn numeric_columns_are_right_aligned() {
        let result = QueryResult {
            columns: vec!["room_type".into(), "listing_count".into()],
            rows: vec![
                vec![Value::from("Private room"), Value::Integer(7)],
                vec![Value::from("Shared room"), Value::Integer(120)],
            ],
        };
        let rendered = render_result(&result);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "room_type     listing_count");
        assert_eq!(lines[2], "Private room              7");
        assert_eq!(lines[3], "Shared room             120");
    }

    #[test]
    fn empty_result_renders_header_only() {
        let result = QueryResult {
            columns: vec!["month".into(), "revenue".into()],
            rows: Vec::new(),
        };
        assert_eq!(render_result(&result).lines().count(), 2);
    }

    #[test]
    fn control_characters_are_flattened() {
        let rendered = render_table(&["note".to_string()], &[vec!["a\nb".to_string()]]);
        assert!(rendered.contains("a b"));
    }
}
