//! Spreadsheet reader: `.xlsx`, `.xls` and `.xlsb` bytes into a [`Table`].
//!
//! Only the first worksheet is read. The first row of its used range is the
//! header; every following non-empty row becomes one table row.
//!
//! Data cells holding `#N/A` (as an error value or as text) or one of the
//! usual missing-value spellings are read as empty.

use calamine::{CellErrorType, Data, Range, Reader, Xls, Xlsb, Xlsx};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::error::{ReadError, ReadResult};
use crate::models::{format_datetime, Cell, SourceFormat, Table};

/// Text values that mean "no value" in a data cell. Matched exactly.
pub const MISSING_MARKERS: [&str; 19] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null", "",
];

/// Result of reading a workbook, with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Decoded first sheet
    pub table: Table,
    /// Decoder that was used
    pub format: SourceFormat,
    /// Name of the worksheet that was read
    pub sheet_name: String,
}

/// Read a workbook from disk, choosing the decoder by extension.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ReadResult<ParseResult> {
    let path = path.as_ref();
    let format = detect_format(&path.to_string_lossy())?;
    let bytes = std::fs::read(path)?;
    parse_bytes(&bytes, format)
}

/// Resolve the decoder for an uploaded file name.
pub fn detect_format(file_name: &str) -> ReadResult<SourceFormat> {
    SourceFormat::from_path(file_name).ok_or_else(|| {
        let ext = Path::new(file_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| file_name.to_string());
        ReadError::UnsupportedExtension(ext)
    })
}

/// Decode workbook bytes with the decoder for `format`.
pub fn parse_bytes(bytes: &[u8], format: SourceFormat) -> ReadResult<ParseResult> {
    let cursor = Cursor::new(bytes);

    let (sheet_name, range) = match format {
        SourceFormat::Xlsx => {
            let workbook: Xlsx<_> = Xlsx::new(cursor).map_err(calamine::Error::Xlsx)?;
            first_sheet(workbook)?
        }
        SourceFormat::Xls => {
            let workbook: Xls<_> = Xls::new(cursor).map_err(calamine::Error::Xls)?;
            first_sheet(workbook)?
        }
        SourceFormat::Xlsb => {
            let workbook: Xlsb<_> = Xlsb::new(cursor).map_err(calamine::Error::Xlsb)?;
            first_sheet(workbook)?
        }
    };

    Ok(ParseResult {
        table: range_to_table(&range)?,
        format,
        sheet_name,
    })
}

/// Name and cells of the first worksheet.
fn first_sheet<RS, R>(mut workbook: R) -> ReadResult<(String, Range<Data>)>
where
    RS: Read + Seek,
    R: Reader<RS>,
    calamine::Error: From<R::Error>,
{
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ReadError::NoSheet)?;
    let range = workbook
        .worksheet_range(&name)
        .map_err(calamine::Error::from)?;
    Ok((name, range))
}

/// Build a table from a worksheet range: header row, then data rows.
pub fn range_to_table(range: &Range<Data>) -> ReadResult<Table> {
    let mut rows = range.rows();
    let header = rows.next().ok_or(ReadError::EmptySheet)?;

    let mut table = Table::new(header_names(header));

    for row in rows {
        let cells: Vec<Cell> = row.iter().map(to_cell).collect();
        if cells.iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        table.push_row(cells);
    }

    Ok(table)
}

/// Header cells as column names.
///
/// Blank headers become `Unnamed: <index>`; a repeated name gets `.1`, `.2`, …
fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    header
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let name = match header_text(d) {
                Some(s) if !s.trim().is_empty() => s,
                _ => format!("Unnamed: {}", i),
            };
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            unique
        })
        .collect()
}

fn header_text(d: &Data) -> Option<String> {
    match d {
        Data::Empty => None,
        // Header names are taken literally, markers included.
        Data::String(s) => Some(s.clone()),
        Data::Error(e) => Some(e.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|v| format_datetime(&v))
            .or_else(|| Some(dt.as_f64().to_string())),
        other => Some(to_cell(other).to_string()),
    }
}

/// Convert a calamine value into a [`Cell`].
///
/// `#N/A` errors and [`MISSING_MARKERS`] text become [`Cell::Empty`].
pub fn to_cell(d: &Data) -> Cell {
    match d {
        Data::Empty | Data::Error(CellErrorType::NA) => Cell::Empty,
        Data::String(s) if MISSING_MARKERS.contains(&s.as_str()) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(v) => Cell::DateTime(v),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}
