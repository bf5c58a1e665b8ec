//! Spreadsheet export: [`ResultTable`] → XLSX bytes.
//!
//! One worksheet, one bold header row of canonical column names, then one
//! row per record in upload order. Quantities and dimensions that came back
//! as numbers are written as numeric cells; everything else is text.

use crate::error::ExtractError;
use crate::record::{FieldValue, ResultTable};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;
use tracing::{debug, info};

/// MIME type for the downloadable workbook.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// File name offered when the caller does not choose one.
pub const DEFAULT_OUTPUT_FILENAME: &str = "appropriation_sheets.xlsx";

/// Serialize `table` as a single-sheet workbook named `sheet_name`.
///
/// Headers are written even when the table has no rows.
pub fn export(table: &ResultTable, sheet_name: &str) -> Result<Vec<u8>, ExtractError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (c, column) in table.columns().iter().enumerate() {
        let col = c as u16;
        worksheet.write_string_with_format(0, col, column.name(), &header_format)?;
        worksheet.set_column_width(col, (column.name().len() + 4) as f64)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (r, row) in table.rows().iter().enumerate() {
        let xl_row = (r + 1) as u32;
        for (c, value) in row.values().iter().enumerate() {
            let col = c as u16;
            match value {
                FieldValue::Number(n) => {
                    worksheet.write_number(xl_row, col, *n)?;
                }
                FieldValue::Text(s) if s.is_empty() => {}
                FieldValue::Text(s) => {
                    worksheet.write_string(xl_row, col, s)?;
                }
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    debug!("Exported {} rows → {} bytes", table.len(), bytes.len());
    Ok(bytes)
}

/// Export `table` and write it to `path`.
///
/// Writes to a sibling temp file first and renames it into place. On
/// failure the temp file is removed and `path` is left untouched.
pub async fn write_xlsx(
    table: &ResultTable,
    path: impl AsRef<Path>,
    sheet_name: &str,
) -> Result<(), ExtractError> {
    let path = path.as_ref();
    let bytes = export(table, sheet_name)?;
    let write_failed = |source| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
    }

    let tmp_path = path.with_extension("xlsx.tmp");
    let written = match tokio::fs::write(&tmp_path, &bytes).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(rm) = tokio::fs::remove_file(&tmp_path).await {
            debug!("Could not remove {}: {}", tmp_path.display(), rm);
        }
        return Err(write_failed(e));
    }

    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}
