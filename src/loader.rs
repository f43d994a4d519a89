use crate::areas::bucket_for;
use crate::error::{LoadError, LoadResult};
use crate::schema::{ColumnIndex, ColumnKind, Field, SCHEMA};
use crate::types::{AppointmentRecord, CellValue, Counters, NormalizedTable, RawSheet};
use crate::util::{excel_serial_to_date, number_to_text, parse_date_safe, parse_f64_safe};
use crate::window::DateWindow;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub window_rows: usize,
    pub outside_window: usize,
    pub unparsed_dates: usize,
    /// Non-blank counter cells in kept rows that were not numbers; read as 0.
    pub unparsed_counters: usize,
}

/// Read, normalize and window the export at `path`.
///
/// `today` anchors the reporting window; `sheet` picks a worksheet by name
/// (the first sheet when `None`, ignored for CSV).
pub fn load(
    path: &Path,
    sheet: Option<&str>,
    today: NaiveDate,
) -> LoadResult<(NormalizedTable, LoadReport)> {
    let raw = read_sheet(path, sheet)?;
    let window = DateWindow::anchored_at(today);
    debug!(start = %window.start, end = %window.end, "reporting window");
    let (table, report) = normalize(raw, &window)?;
    info!(
        path = %path.display(),
        total = report.total_rows,
        kept = report.window_rows,
        "loaded appointment export"
    );
    Ok((table, report))
}

pub fn read_sheet(path: &Path, sheet: Option<&str>) -> LoadResult<RawSheet> {
    if !path.exists() {
        return Err(LoadError::source_unavailable(path, "file not found"));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path, sheet),
        "csv" => read_csv(path),
        other => Err(LoadError::source_unavailable(
            path,
            format!("unsupported file format: {}", other),
        )),
    }
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> LoadResult<RawSheet> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| LoadError::source_unavailable(path, e))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = match sheet {
        Some(name) => sheet_names
            .iter()
            .find(|n| n.as_str() == name)
            .cloned()
            .ok_or_else(|| {
                LoadError::source_unavailable(
                    path,
                    format!("sheet \"{}\" not found (available: {})", name, sheet_names.join(", ")),
                )
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| LoadError::source_unavailable(path, "workbook contains no sheets"))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LoadError::source_unavailable(path, e))?;
    debug!(sheet = %sheet_name, size = ?range.get_size(), "read worksheet");

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(header_text).collect(),
        None => Vec::new(),
    };
    let rows: Vec<Vec<CellValue>> = rows
        .map(|row| row.iter().map(cell_from_excel).collect())
        .collect();
    Ok(RawSheet { headers, rows })
}

fn header_text(cell: &Data) -> String {
    match cell_from_excel(cell) {
        CellValue::Text(s) => s,
        CellValue::Number(n) => number_to_text(n),
        CellValue::Date(d) => d.to_string(),
        CellValue::Empty => String::new(),
    }
}

fn cell_from_excel(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) | Data::DurationIso(_) => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(d) => CellValue::Date(d),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match parse_date_safe(Some(s)) {
            Some(d) => CellValue::Date(d),
            None => CellValue::Text(s.clone()),
        },
    }
}

fn read_csv(path: &Path) -> LoadResult<RawSheet> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| LoadError::source_unavailable(path, e))?;
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| LoadError::source_unavailable(path, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| LoadError::source_unavailable(path, e))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(RawSheet { headers, rows })
}

/// Apply the schema to a raw sheet: typed fields, date window, area bucket.
pub fn normalize(sheet: RawSheet, window: &DateWindow) -> LoadResult<(NormalizedTable, LoadReport)> {
    let index = ColumnIndex::resolve(&sheet.headers)?;
    let kinds: HashMap<Field, ColumnKind> = SCHEMA.iter().map(|s| (s.field, s.kind)).collect();

    let mut report = LoadReport {
        total_rows: sheet.rows.len(),
        ..Default::default()
    };
    let mut records = Vec::new();
    let unparsed_counters = Cell::new(0usize);

    for row in &sheet.rows {
        let text = |field: Field| -> String {
            debug_assert_eq!(kinds.get(&field), Some(&ColumnKind::Text));
            cell_text(cell_at(row, &index, field))
        };
        let count = |field: Field| -> f64 {
            debug_assert_eq!(kinds.get(&field), Some(&ColumnKind::Count));
            cell_count(cell_at(row, &index, field)).unwrap_or_else(|| {
                unparsed_counters.set(unparsed_counters.get() + 1);
                0.0
            })
        };

        let Some(calendar_date) = cell_date(cell_at(row, &index, Field::CalendarDate)) else {
            report.unparsed_dates += 1;
            continue;
        };
        if !window.contains(calendar_date) {
            report.outside_window += 1;
            continue;
        }

        let area_code = text(Field::AreaCode);
        let area = bucket_for(&area_code).to_string();
        records.push(AppointmentRecord {
            customer_code: text(Field::CustomerCode),
            customer_type_descr: text(Field::CustomerTypeDescr),
            customer_type_group: text(Field::CustomerTypeGroup),
            shop_code_descr: text(Field::ShopCodeDescr),
            area_manager: text(Field::AreaManager),
            area_code,
            media_type_group_descr: text(Field::MediaTypeGroupDescr),
            service_category_descr: text(Field::ServiceCategoryDescr),
            calendar_date,
            iso_week: text(Field::IsoWeek),
            area,
            raw: Counters {
                agenda_appointments: count(Field::AgendaAppointments),
                opportunity_test: count(Field::OpportunityTest),
                appointments_completed: count(Field::AppointmentsCompleted),
                appointments_cancelled: count(Field::AppointmentsCancelled),
                net_trial_activated: count(Field::NetTrialActivated),
                appointments_rescheduled: count(Field::AppointmentsRescheduled),
                all_appointments: count(Field::AllAppointments),
            },
        });
    }

    if report.unparsed_dates > 0 {
        warn!(rows = report.unparsed_dates, "dropped rows without a readable date");
    }
    report.unparsed_counters = unparsed_counters.get();
    if report.unparsed_counters > 0 {
        warn!(cells = report.unparsed_counters, "read non-numeric counter cells as 0");
    }
    report.window_rows = records.len();
    Ok((NormalizedTable { records }, report))
}

static EMPTY_CELL: CellValue = CellValue::Empty;

fn cell_at<'a>(row: &'a [CellValue], index: &ColumnIndex, field: Field) -> &'a CellValue {
    index
        .position(field)
        .and_then(|idx| row.get(idx))
        .unwrap_or(&EMPTY_CELL)
}

fn cell_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) => number_to_text(*n),
        CellValue::Date(d) => d.to_string(),
    }
}

/// Counter value of a cell. Blanks are 0; `None` means the cell held
/// something that is not a number.
fn cell_count(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Empty => Some(0.0),
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Number(_) | CellValue::Date(_) => None,
        CellValue::Text(s) => parse_f64_safe(Some(s)),
    }
}

fn cell_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Number(n) => excel_serial_to_date(*n),
        CellValue::Text(s) => parse_date_safe(Some(s)),
        CellValue::Empty => None,
    }
}
