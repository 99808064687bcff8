//! Tabular input for metadata import, and the CSV writer used for export.
//!
//! CSV is handled by a small quote-aware state machine; spreadsheets go
//! through an injected [`SpreadsheetDecoder`] so the parser works (and
//! reports a clear error) when no decoder is configured.

use crate::errors::{CatalogueError, CatalogueResult};
use crate::services::normalize::file_extension;
use bytes::Bytes;
use calamine::{Reader, open_workbook_auto_from_rs};
use std::{borrow::Cow, collections::HashMap, io::Cursor, sync::Arc};
use tracing::{debug, warn};

/// One parsed row: header name -> cell value.
pub type Row = HashMap<String, String>;

/// Decodes the first sheet of a workbook into header-keyed rows.
///
/// The first sheet row holds the headers; empty cells read as `""` and rows
/// with no content are dropped.
pub trait SpreadsheetDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> CatalogueResult<Vec<Row>>;
}

/// Spreadsheet decoder backed by `calamine` (xlsx, xls, ods).
#[derive(Debug, Default, Clone, Copy)]
pub struct CalamineDecoder;

impl SpreadsheetDecoder for CalamineDecoder {
    fn decode(&self, data: &[u8]) -> CatalogueResult<Vec<Row>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))
            .map_err(|err| CatalogueError::Decode(err.to_string()))?;

        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range.map_err(|err| CatalogueError::Decode(err.to_string()))?,
            None => return Ok(Vec::new()),
        };

        let mut sheet_rows = range.rows().map(|cells| {
            cells
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect::<Vec<_>>()
        });

        let Some(headers) = sheet_rows.next() else {
            return Ok(Vec::new());
        };

        Ok(sheet_rows
            .filter(|values| values.iter().any(|v| !v.is_empty()))
            .map(|values| zip_row(&headers, values))
            .collect())
    }
}

/// Turns an uploaded metadata file into rows.
#[derive(Clone, Default)]
pub struct TabularParser {
    spreadsheet: Option<Arc<dyn SpreadsheetDecoder>>,
}

impl TabularParser {
    pub fn new(spreadsheet: Option<Arc<dyn SpreadsheetDecoder>>) -> Self {
        Self { spreadsheet }
    }

    /// Parser with the bundled `calamine` spreadsheet decoder.
    pub fn with_calamine() -> Self {
        Self::new(Some(Arc::new(CalamineDecoder)))
    }

    /// Parse `data` according to the extension of `file_name`.
    ///
    /// Returns rows in file order. A file with no data rows yields an empty
    /// vector rather than an error.
    pub async fn parse(&self, file_name: &str, data: Bytes) -> CatalogueResult<Vec<Row>> {
        let extension = file_extension(file_name);
        match extension.as_str() {
            "csv" => {
                let text = csv_text(file_name, &data);
                let rows = parse_csv(&text);
                debug!("parsed {} CSV rows from {}", rows.len(), file_name);
                Ok(rows)
            }
            "xlsx" | "xls" => {
                let decoder = self.spreadsheet.clone().ok_or_else(|| {
                    CatalogueError::CapabilityUnavailable(
                        "Excel parser not available. Please use CSV for metadata import.".into(),
                    )
                })?;
                let rows = tokio::task::spawn_blocking(move || decoder.decode(&data))
                    .await
                    .map_err(|err| CatalogueError::Decode(err.to_string()))??;
                debug!("decoded {} spreadsheet rows from {}", rows.len(), file_name);
                Ok(rows)
            }
            _ => Err(CatalogueError::UnsupportedFormat(extension)),
        }
    }
}

/// Decode CSV bytes as UTF-8. Invalid sequences become U+FFFD and are
/// reported, since they usually mean a Latin-1 export.
fn csv_text<'a>(file_name: &str, data: &'a [u8]) -> Cow<'a, str> {
    let text = String::from_utf8_lossy(data);
    if let Cow::Owned(_) = text {
        warn!(
            "{} is not valid UTF-8; invalid bytes were replaced, save the sheet as UTF-8 CSV",
            file_name
        );
    }
    text
}

/// Parse CSV text: first non-blank line is the header row, blank lines are
/// skipped, rows are zipped positionally against the headers.
///
/// Records are line based; a newline inside a quoted field ends the record.
pub fn parse_csv(text: &str) -> Vec<Row> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let headers = parse_csv_line(header_line);

    lines
        .map(|line| zip_row(&headers, parse_csv_line(line)))
        .collect()
}

/// Split one CSV line into trimmed fields.
///
/// Commas inside double quotes do not split; `""` inside quotes is a literal
/// quote. Quote characters themselves are not part of the value.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            other => current.push(other),
        }
    }

    fields.push(current.trim().to_string());
    fields
}

fn zip_row(headers: &[String], values: Vec<String>) -> Row {
    let mut values = values.into_iter();
    let mut row = Row::with_capacity(headers.len());
    for header in headers {
        let value = values.next().unwrap_or_default();
        if !header.is_empty() {
            row.insert(header.clone(), value);
        }
    }
    row
}

/// Anything that can supply a cell for a named column on export.
pub trait CsvRow {
    fn cell(&self, header: &str) -> Option<&str>;
}

impl CsvRow for Row {
    fn cell(&self, header: &str) -> Option<&str> {
        self.get(header).map(String::as_str)
    }
}

/// Write headers plus rows as CSV.
///
/// Every value is wrapped in double quotes with inner quotes doubled,
/// whether or not it needs it. Lines are joined with `\n`.
pub fn write_csv<R: CsvRow>(headers: &[&str], rows: &[R]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        let line = headers
            .iter()
            .map(|header| quote_cell(row.cell(header).unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }
    lines.join("\n")
}

fn quote_cell(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
