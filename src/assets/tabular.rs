//! Tabular asset format: tab-separated values with a header line.

use crate::error::{ForgeError, Result};

/// A parsed tabular asset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parse tabular text: first non-blank line is the tab-separated header,
/// every following non-blank line a data row.
///
/// Blank lines anywhere in the data are silently dropped, not just trailing
/// ones. Rows are kept verbatim, even when their width disagrees with the
/// header.
pub fn parse(path: &str, text: &str) -> Result<Table> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return Err(ForgeError::Parse {
            path: path.to_string(),
            detail: "tabular asset has no header line".to_string(),
        });
    };

    let headers = header_line.split('\t').map(str::to_string).collect();
    let rows = lines
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect();

    Ok(Table { headers, rows })
}

/// Serialize a table back to text.
///
/// Rows narrower than the header are padded with empty fields; one trailing
/// blank line is appended.
pub fn to_text(table: &Table) -> String {
    let mut out = String::new();
    out.push_str(&table.headers.join("\t"));
    out.push('\n');
    for row in &table.rows {
        let width = row.len().max(table.headers.len());
        for i in 0..width {
            if i > 0 {
                out.push('\t');
            }
            if let Some(value) = row.get(i) {
                out.push_str(value);
            }
        }
        out.push('\n');
    }
    out.push('\n');
    out
}
