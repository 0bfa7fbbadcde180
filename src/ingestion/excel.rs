//! Workbook decoding (`.xlsx` and `.xls`) into a [`TabularResult`].
//!
//! Behavior:
//! - Builds a [`SheetCatalog`] of the workbook's worksheets (chart and macro sheets are
//!   left out) and resolves the sheet hint against it
//! - Detects the first non-empty row as the header row
//! - Reads the remaining non-empty rows, padded or truncated to the header width

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use calamine::{
    open_workbook, Data, ExcelDateTime, Range, Reader, SheetType, SheetVisible, Sheets, Xls, Xlsx,
};
use quick_xml::events::Event;

use crate::error::{LoadError, LoadResult};
use crate::types::{fit_row, normalize_headers, TabularResult, Value};

use super::sheets::{SheetCatalog, SheetEntry, SheetSelection};

type Workbook = Sheets<BufReader<File>>;

const WORKBOOK_PART: &str = "xl/workbook.xml";

/// A decoded sheet together with how it was chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub selection: SheetSelection,
    pub table: TabularResult,
}

/// Load one sheet of an `.xlsx` workbook.
pub fn load_xlsx(path: impl AsRef<Path>, hint: Option<&str>) -> LoadResult<SheetTable> {
    let (mut wb, catalog) = open_xlsx(path.as_ref())?;
    load_selected(&mut wb, &catalog, hint)
}

/// Load one sheet of a legacy `.xls` workbook.
pub fn load_xls(path: impl AsRef<Path>, hint: Option<&str>) -> LoadResult<SheetTable> {
    let (mut wb, catalog) = open_xls(path.as_ref())?;
    load_selected(&mut wb, &catalog, hint)
}

/// List the worksheets of an `.xlsx` workbook.
pub fn xlsx_catalog(path: impl AsRef<Path>) -> LoadResult<SheetCatalog> {
    open_xlsx(path.as_ref()).map(|(_, catalog)| catalog)
}

/// List the worksheets of an `.xls` workbook.
pub fn xls_catalog(path: impl AsRef<Path>) -> LoadResult<SheetCatalog> {
    open_xls(path.as_ref()).map(|(_, catalog)| catalog)
}

fn open_xlsx(path: &Path) -> LoadResult<(Workbook, SheetCatalog)> {
    let wb: Xlsx<_> = open_workbook(path).map_err(calamine::Error::from)?;
    let active = xlsx_active_tab(path)?;

    // activeTab indexes the full sheet list, so the flag is set before filtering.
    let entries = wb
        .sheets_metadata()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.typ == SheetType::WorkSheet)
        .map(|(idx, s)| {
            SheetEntry::new(
                s.name.clone(),
                active == Some(idx),
                s.visible == SheetVisible::Visible,
            )
        })
        .collect();
    let catalog = SheetCatalog::new(entries).ok_or_else(|| LoadError::EmptyWorkbook {
        path: path.to_path_buf(),
    })?;
    Ok((Sheets::Xlsx(wb), catalog))
}

fn open_xls(path: &Path) -> LoadResult<(Workbook, SheetCatalog)> {
    let wb: Xls<_> = open_workbook(path).map_err(calamine::Error::from)?;
    let catalog = SheetCatalog::from_visibility(
        wb.sheets_metadata()
            .iter()
            .filter(|s| s.typ == SheetType::WorkSheet)
            .map(|s| (s.name.clone(), s.visible == SheetVisible::Visible)),
    )
    .ok_or_else(|| LoadError::EmptyWorkbook {
        path: path.to_path_buf(),
    })?;
    Ok((Sheets::Xls(wb), catalog))
}

fn load_selected(
    wb: &mut Workbook,
    catalog: &SheetCatalog,
    hint: Option<&str>,
) -> LoadResult<SheetTable> {
    let selection = catalog.resolve(hint);
    tracing::info!(sheet = %selection.name, reason = %selection.reason, "selected sheet");
    let range = wb.worksheet_range(&selection.name)?;
    let table = range_to_table(&selection.name, &range)?;
    Ok(SheetTable { selection, table })
}

/// Index of the sheet the workbook opens on, from `<workbookView activeTab=".."/>`.
///
/// A `workbookView` without the attribute means the first sheet. No `workbookView` at
/// all means the workbook does not say.
fn xlsx_active_tab(path: &Path) -> LoadResult<Option<usize>> {
    let file = BufReader::new(File::open(path)?);
    let mut archive = zip::ZipArchive::new(file)?;
    let part = match archive.by_name(WORKBOOK_PART) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    active_tab_from_xml(BufReader::new(part))
}

fn active_tab_from_xml<R: BufRead>(xml: R) -> LoadResult<Option<usize>> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"workbookView" =>
            {
                let mut tab = 0;
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"activeTab" {
                        if let Ok(v) = std::str::from_utf8(&attr.value) {
                            tab = v.trim().parse().unwrap_or(0);
                        }
                    }
                }
                return Ok(Some(tab));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn range_to_table(sheet: &str, range: &Range<Data>) -> LoadResult<TabularResult> {
    let mut rows = range.rows().skip_while(|row| row_is_empty(row));
    let header = rows.next().ok_or_else(|| LoadError::MissingHeader {
        context: format!("sheet '{sheet}'"),
    })?;

    let columns = normalize_headers(header.iter().map(cell_to_header_string));
    let width = columns.len();
    let data = rows
        .filter(|row| !row_is_empty(row))
        .map(|row| fit_row(row.iter().map(cell_to_value).collect(), width))
        .collect();

    Ok(TabularResult::new(columns, data))
}

fn row_is_empty(row: &[Data]) -> bool {
    row.iter().all(|c| match c {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    })
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        Data::DateTime(dt) => excel_datetime_to_string(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Workbooks store every number as a float; integral values come back as integers.
fn cell_to_value(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::Utf8(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 => {
            Value::Int64(*f as i64)
        }
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::Utf8(excel_datetime_to_string(dt)),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Utf8(s.clone()),
        other => Value::Utf8(other.to_string()),
    }
}

/// ISO 8601 text for a date-formatted cell: `2024-01-02T00:00:00` for datetimes and
/// `PT5400S`-style for durations. Serials outside the representable range keep their number.
fn excel_datetime_to_string(dt: &ExcelDateTime) -> String {
    let rendered = if dt.is_duration() {
        dt.as_duration().map(|d| d.to_string())
    } else {
        dt.as_datetime()
            .map(|d| d.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    };
    rendered.unwrap_or_else(|| dt.as_f64().to_string())
}
