//! Declarative column schema for the appointment export.
//!
//! Each expected column is listed once with its canonical (normalized) name,
//! the record field it feeds and how its cells are read. Headers are
//! normalized first, then resolved against this table; anything missing is
//! reported in one [`LoadError::SchemaMismatch`].

use std::collections::HashMap;

use crate::error::{LoadError, LoadResult};

/// Week-key column as it appears in the export.
pub const WEEK_SOURCE_COLUMN: &str = "Calendar[ISO Week]";
pub const WEEK_COLUMN: &str = "ISO Week";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Kept as text even when the cell looks numeric.
    Text,
    Date,
    /// Numeric counter; blanks and junk read as zero.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CustomerCode,
    CustomerTypeDescr,
    CustomerTypeGroup,
    ShopCodeDescr,
    AreaManager,
    MediaTypeGroupDescr,
    AreaCode,
    ServiceCategoryDescr,
    CalendarDate,
    IsoWeek,
    AgendaAppointments,
    OpportunityTest,
    AppointmentsCompleted,
    AppointmentsCancelled,
    NetTrialActivated,
    AppointmentsRescheduled,
    AllAppointments,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub field: Field,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, field: Field, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { name, field, kind }
}

pub const SCHEMA: [ColumnSpec; 17] = [
    col("Customer[Customer Code]", Field::CustomerCode, ColumnKind::Text),
    col("Customer Lifecycle History[Customer Type Descr]", Field::CustomerTypeDescr, ColumnKind::Text),
    col("Customer Lifecycle History[Customer Type Group]", Field::CustomerTypeGroup, ColumnKind::Text),
    col("Shop[Shop Code - Descr]", Field::ShopCodeDescr, ColumnKind::Text),
    col("Shop[Area Manager]", Field::AreaManager, ColumnKind::Text),
    col("Medical Channel[Mediatype Group Descr]", Field::MediaTypeGroupDescr, ColumnKind::Text),
    col("Shop[Area Code]", Field::AreaCode, ColumnKind::Text),
    col("Service Appointment[Service Category Descr]", Field::ServiceCategoryDescr, ColumnKind::Text),
    col("Calendar[Date]", Field::CalendarDate, ColumnKind::Date),
    col(WEEK_COLUMN, Field::IsoWeek, ColumnKind::Text),
    col("Agenda_Appointments__Heads_", Field::AgendaAppointments, ColumnKind::Count),
    col("Opportunity_Test__Heads_", Field::OpportunityTest, ColumnKind::Count),
    col("Appointments_Completed", Field::AppointmentsCompleted, ColumnKind::Count),
    col("Appointments_Cancelled", Field::AppointmentsCancelled, ColumnKind::Count),
    col("Net_Trial_Activated__Heads_", Field::NetTrialActivated, ColumnKind::Count),
    col("FP_Appointments_Rescheduled", Field::AppointmentsRescheduled, ColumnKind::Count),
    col("FP_ALL_Appointments", Field::AllAppointments, ColumnKind::Count),
];

/// Canonical name for a raw header.
///
/// Measure columns are exported fully bracketed (`[FP_ALL_Appointments]`);
/// those lose their brackets. Table-qualified names (`Shop[Area Code]`) are
/// kept verbatim, except the week key which gets its short name.
pub fn normalize_header(raw: &str) -> String {
    let raw = raw.trim();
    let name = if raw.starts_with('[') {
        raw.trim_matches(|c| c == '[' || c == ']')
    } else {
        raw
    };
    if name == WEEK_SOURCE_COLUMN {
        WEEK_COLUMN.to_string()
    } else {
        name.to_string()
    }
}

/// Column positions for every schema field in a given header row.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    positions: HashMap<Field, usize>,
}

impl ColumnIndex {
    /// Normalize `headers` and locate every schema column. Duplicates keep
    /// the first occurrence.
    pub fn resolve(headers: &[String]) -> LoadResult<Self> {
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            by_name.entry(normalize_header(header)).or_insert(idx);
        }

        let mut positions = HashMap::new();
        let mut missing = Vec::new();
        for spec in SCHEMA.iter() {
            match by_name.get(spec.name) {
                Some(idx) => {
                    positions.insert(spec.field, *idx);
                }
                None => missing.push(spec.name.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(LoadError::SchemaMismatch { missing });
        }
        Ok(ColumnIndex { positions })
    }

    pub fn position(&self, field: Field) -> Option<usize> {
        self.positions.get(&field).copied()
    }
}

/// Header row as the export writes it: bracketed measures, long week name.
#[cfg(test)]
pub(crate) fn export_headers() -> Vec<String> {
    SCHEMA
        .iter()
        .map(|spec| match spec.kind {
            ColumnKind::Count => format!("[{}]", spec.name),
            _ if spec.field == Field::IsoWeek => WEEK_SOURCE_COLUMN.to_string(),
            _ => spec.name.to_string(),
        })
        .collect()
}
