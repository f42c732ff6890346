//! Tabular export of extracted records
//!
//! One header row, then one row per record with the columns of
//! [`ItemRecord::COLUMNS`] in that order. The xlsx format puts that table
//! on a single named worksheet.

use crate::config::ExportFormat;
use crate::output::{OutputError, OutputResult};
use crate::state::ItemRecord;
use rust_xlsxwriter::{Format, Workbook};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Renders records into `writer` in the given format
///
/// # Arguments
///
/// * `records` - Records in output order
/// * `writer` - Destination of the rendered table
/// * `format` - CSV, TSV, a JSON array or an xlsx workbook
/// * `sheet_name` - Worksheet name, only used by xlsx
pub fn render_table<W: Write>(
    records: &[ItemRecord],
    writer: W,
    format: ExportFormat,
    sheet_name: &str,
) -> OutputResult<()> {
    match format {
        ExportFormat::Csv => render_delimited(records, writer, b','),
        ExportFormat::Tsv => render_delimited(records, writer, b'\t'),
        ExportFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            Ok(())
        }
        ExportFormat::Xlsx => render_workbook(records, writer, sheet_name),
    }
}

fn render_workbook<W: Write>(
    records: &[ItemRecord],
    mut writer: W,
    sheet_name: &str,
) -> OutputResult<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    let header = Format::new().set_bold();
    for (col, title) in (0u16..).zip(ItemRecord::COLUMNS) {
        sheet.write_string_with_format(0, col, title, &header)?;
    }

    for (row, record) in (1u32..).zip(records) {
        for (col, value) in (0u16..).zip(record.row()) {
            sheet.write_string(row, col, value)?;
        }
    }

    let bytes = workbook.save_to_buffer()?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn render_delimited<W: Write>(records: &[ItemRecord], writer: W, delimiter: u8) -> OutputResult<()> {
    let mut table = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    table.write_record(ItemRecord::COLUMNS)?;
    for record in records {
        table.write_record(record.row())?;
    }
    table.flush()?;
    Ok(())
}

/// Writes the export file, replacing any previous one atomically
///
/// # Returns
///
/// * `Ok(())` - File written
/// * `Err(OutputError)` - Rendering or writing failed; any old export is kept
pub fn export_records(
    records: &[ItemRecord],
    path: &Path,
    format: ExportFormat,
    sheet_name: &str,
) -> OutputResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    render_table(records, &mut file, format, sheet_name)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| OutputError::Io(e.error))?;

    tracing::info!(
        "Exported {} record(s) to {} ({:?})",
        records.len(),
        path.display(),
        format
    );
    Ok(())
}
