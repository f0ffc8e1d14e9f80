//! Dataset export (CSV / JSON)
//!
//! Pure serialization functions, no filesystem I/O. The caller writes the
//! returned string to disk.

use crate::db::Record;
use serde_json::Value;

/// Export format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// File extension for this format (without leading dot)
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn render(&self, rows: &[Record]) -> String {
        match self {
            ExportFormat::Csv => to_csv(rows),
            ExportFormat::Json => to_json(rows),
        }
    }
}

/// Serialize rows as RFC 4180 CSV.
///
/// The header is the union of all keys in first-seen order; a key missing
/// from a row exports as an empty field.
pub fn to_csv(rows: &[Record]) -> String {
    let columns = column_union(rows);
    let mut out = String::new();

    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        csv_escape_into(&mut out, col);
    }
    out.push('\n');

    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let text = row.get(*col).map(value_to_export_string).unwrap_or_default();
            csv_escape_into(&mut out, &text);
        }
        out.push('\n');
    }

    out
}

/// Serialize rows as a pretty-printed JSON array.
pub fn to_json(rows: &[Record]) -> String {
    serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
}

fn column_union(rows: &[Record]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }
    columns
}

/// Untruncated value string for CSV export (null -> empty string).
fn value_to_export_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
    }
}

/// Quote a field if it contains `,` `"` or a newline (RFC 4180).
fn csv_escape_into(out: &mut String, field: &str) {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        out.push('"');
        for c in field.chars() {
            if c == '"' {
                out.push_str("\"\"");
            } else {
                out.push(c);
            }
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}
