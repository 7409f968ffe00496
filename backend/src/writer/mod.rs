//! Result workbook writer.
//!
//! One worksheet, bold header row, one row per table row. Dates keep an
//! Excel date format so they stay dates when reopened.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

use crate::config::{OUTPUT_SHEET_NAME, OUTPUT_SUFFIX};
use crate::error::{WriteError, WriteResult};
use crate::models::{Cell, Table};

/// Excel worksheet limits.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Serialize `table` as an `.xlsx` workbook.
pub fn write_xlsx(table: &Table) -> WriteResult<Vec<u8>> {
    if table.row_count() + 1 > MAX_ROWS || table.column_count() > MAX_COLUMNS {
        return Err(WriteError::TooLarge {
            rows: table.row_count(),
            columns: table.column_count(),
        });
    }

    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(OUTPUT_SHEET_NAME)?;

    for (c, name) in table.columns().iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, name, &header_format)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    sheet.write_number(r, c, *n)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Cell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Cell::DateTime(dt) => {
                    let format = if dt.num_seconds_from_midnight() == 0 {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    sheet.write_number_with_format(r, c, excel_serial(dt), format)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Write `table` to `path` as `.xlsx`.
pub fn write_xlsx_file<P: AsRef<Path>>(table: &Table, path: P) -> WriteResult<()> {
    let bytes = write_xlsx(table)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Suggested download name: the input name with its extension replaced by
/// `_FirmForecast_Sum.xlsx`.
///
/// ```
/// use demandsum::writer::output_file_name;
/// assert_eq!(output_file_name("plan.xlsb"), "plan_FirmForecast_Sum.xlsx");
/// ```
pub fn output_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    };
    format!("{}{}", stem, OUTPUT_SUFFIX)
}

/// Days since the 1900 date system epoch (1899-12-30), fractional for time.
fn excel_serial(dt: &NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (*dt - epoch).num_milliseconds() as f64 / 86_400_000.0
}
