use chrono::NaiveDate;
use serde::Serialize;
use std::ops::AddAssign;
use tabled::Tabled;

use crate::util::{format_number, format_value};

/// A single cell as read from the source, before any schema is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

/// Header row plus data rows of the selected sheet, untyped.
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// The seven appointment counters carried by every row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Counters {
    pub agenda_appointments: f64,
    pub opportunity_test: f64,
    pub appointments_completed: f64,
    pub appointments_cancelled: f64,
    pub net_trial_activated: f64,
    pub appointments_rescheduled: f64,
    pub all_appointments: f64,
}

impl Counters {
    pub fn divided_by(&self, divisor: f64) -> Counters {
        Counters {
            agenda_appointments: self.agenda_appointments / divisor,
            opportunity_test: self.opportunity_test / divisor,
            appointments_completed: self.appointments_completed / divisor,
            appointments_cancelled: self.appointments_cancelled / divisor,
            net_trial_activated: self.net_trial_activated / divisor,
            appointments_rescheduled: self.appointments_rescheduled / divisor,
            all_appointments: self.all_appointments / divisor,
        }
    }

    /// Agenda plus cancelled, i.e. every appointment that was ever booked.
    pub fn booked(&self) -> f64 {
        self.agenda_appointments + self.appointments_cancelled
    }
}

impl AddAssign for Counters {
    fn add_assign(&mut self, other: Counters) {
        self.agenda_appointments += other.agenda_appointments;
        self.opportunity_test += other.opportunity_test;
        self.appointments_completed += other.appointments_completed;
        self.appointments_cancelled += other.appointments_cancelled;
        self.net_trial_activated += other.net_trial_activated;
        self.appointments_rescheduled += other.appointments_rescheduled;
        self.all_appointments += other.all_appointments;
    }
}

/// The five ratio metrics. `None` marks a zero denominator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    pub test_conversion: Option<f64>,
    pub trial_conversion: Option<f64>,
    pub cancellation: Option<f64>,
    pub reschedule: Option<f64>,
    pub show: Option<f64>,
}

/// One row of the normalized table.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentRecord {
    pub customer_code: String,
    pub customer_type_descr: String,
    pub customer_type_group: String,
    pub shop_code_descr: String,
    pub area_manager: String,
    pub area_code: String,
    pub media_type_group_descr: String,
    pub service_category_descr: String,
    pub calendar_date: NaiveDate,
    pub iso_week: String,
    pub area: String,
    pub raw: Counters,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    pub records: Vec<AppointmentRecord>,
}

/// A normalized row with its "Other Areas" share and per-row rates.
#[derive(Debug, Clone, PartialEq)]
pub struct ApportionedRecord {
    pub record: AppointmentRecord,
    pub apportioned: Counters,
    /// Raw agenda + cancelled, unapportioned.
    pub total_appointments_raw: f64,
    pub total_appointments: f64,
    pub rates: Rates,
}

#[derive(Debug, Clone, Default)]
pub struct ApportionedTable {
    pub records: Vec<ApportionedRecord>,
    pub other_areas_divisor: usize,
}

impl ApportionedTable {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct OverviewRow {
    #[serde(rename = "Areas")]
    #[tabled(rename = "Areas")]
    pub area: String,
    #[serde(rename = "All Appointments")]
    #[tabled(rename = "All Appointments")]
    pub all_appointments: String,
    #[serde(rename = "Total Appointments")]
    #[tabled(rename = "Total Appointments")]
    pub total_appointments: String,
    #[serde(rename = "Appointments Cancelled")]
    #[tabled(rename = "Appointments Cancelled")]
    pub appointments_cancelled: String,
    #[serde(rename = "Appointments Rescheduled")]
    #[tabled(rename = "Appointments Rescheduled")]
    pub appointments_rescheduled: String,
    #[serde(rename = "Agenda Appointments")]
    #[tabled(rename = "Agenda Appointments")]
    pub agenda_appointments: String,
    #[serde(rename = "Appointments Completed")]
    #[tabled(rename = "Appointments Completed")]
    pub appointments_completed: String,
    #[serde(rename = "Opportunity Test")]
    #[tabled(rename = "Opportunity Test")]
    pub opportunity_test: String,
    #[serde(rename = "Net Trial Activated")]
    #[tabled(rename = "Net Trial Activated")]
    pub net_trial_activated: String,
    #[serde(rename = "Appointment to test: Conversion rate")]
    #[tabled(rename = "Appointment to test: Conversion rate")]
    pub test_conversion: String,
    #[serde(rename = "Appointment to trial: Conversion rate")]
    #[tabled(rename = "Appointment to trial: Conversion rate")]
    pub trial_conversion: String,
    #[serde(rename = "Cancellation rate")]
    #[tabled(rename = "Cancellation rate")]
    pub cancellation_rate: String,
    #[serde(rename = "Reschedule rate")]
    #[tabled(rename = "Reschedule rate")]
    pub reschedule_rate: String,
    #[serde(rename = "Show rate")]
    #[tabled(rename = "Show rate")]
    pub show_rate: String,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    #[serde(rename = "ISO Week")]
    #[tabled(rename = "ISO Week")]
    pub iso_week: String,
    #[serde(rename = "Areas")]
    #[tabled(rename = "Areas")]
    pub area: String,
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value", display_with = "display_point_value")]
    pub value: Option<f64>,
}

fn display_point_value(value: &Option<f64>) -> String {
    match value {
        Some(v) => format_value(*v),
        None => "N/A".to_string(),
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ShopPivotRow {
    #[serde(rename = "Shop Code - Descr")]
    #[tabled(rename = "Shop Code - Descr")]
    pub shop_code_descr: String,
    #[serde(rename = "Area Manager")]
    #[tabled(rename = "Area Manager")]
    pub area_manager: String,
    #[serde(rename = "All Appointments")]
    #[tabled(rename = "All Appointments")]
    pub all_appointments: String,
    #[serde(rename = "Total Appointments")]
    #[tabled(rename = "Total Appointments")]
    pub total_appointments: String,
    #[serde(rename = "Agenda Appointments")]
    #[tabled(rename = "Agenda Appointments")]
    pub agenda_appointments: String,
    #[serde(rename = "Appointments Cancelled")]
    #[tabled(rename = "Appointments Cancelled")]
    pub appointments_cancelled: String,
    #[serde(rename = "Appointments Rescheduled")]
    #[tabled(rename = "Appointments Rescheduled")]
    pub appointments_rescheduled: String,
    #[serde(rename = "Appointments Completed")]
    #[tabled(rename = "Appointments Completed")]
    pub appointments_completed: String,
    #[serde(rename = "Opportunity Test")]
    #[tabled(rename = "Opportunity Test")]
    pub opportunity_test: String,
    #[serde(rename = "Net Trial Activated")]
    #[tabled(rename = "Net Trial Activated")]
    pub net_trial_activated: String,
    #[serde(rename = "Appointment to test: Conversion rate")]
    #[tabled(rename = "Appointment to test: Conversion rate")]
    pub test_conversion: String,
    #[serde(rename = "Appointment to trial: Conversion rate")]
    #[tabled(rename = "Appointment to trial: Conversion rate")]
    pub trial_conversion: String,
    #[serde(rename = "Cancellation rate")]
    #[tabled(rename = "Cancellation rate")]
    pub cancellation_rate: String,
    #[serde(rename = "Reschedule rate")]
    #[tabled(rename = "Reschedule rate")]
    pub reschedule_rate: String,
    #[serde(rename = "Show rate")]
    #[tabled(rename = "Show rate")]
    pub show_rate: String,
}

/// Whole-number rendering used for summed counters in the tables.
pub fn format_count(n: f64) -> String {
    format_number(n, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_field_by_field() {
        let mut total = Counters {
            agenda_appointments: 1.0,
            all_appointments: 2.0,
            ..Default::default()
        };
        total += Counters {
            agenda_appointments: 3.0,
            appointments_cancelled: 4.0,
            ..Default::default()
        };
        assert_eq!(total.agenda_appointments, 4.0);
        assert_eq!(total.appointments_cancelled, 4.0);
        assert_eq!(total.all_appointments, 2.0);
        assert_eq!(total.booked(), 8.0);
    }

    #[test]
    fn divided_by_scales_every_counter() {
        let c = Counters {
            agenda_appointments: 9.0,
            opportunity_test: 3.0,
            appointments_completed: 6.0,
            appointments_cancelled: 1.0,
            net_trial_activated: 2.0,
            appointments_rescheduled: 4.0,
            all_appointments: 8.0,
        };
        let half = c.divided_by(2.0);
        assert_eq!(half.agenda_appointments, 4.5);
        assert_eq!(half.opportunity_test, 1.5);
        assert_eq!(half.appointments_completed, 3.0);
        assert_eq!(half.appointments_cancelled, 0.5);
        assert_eq!(half.net_trial_activated, 1.0);
        assert_eq!(half.appointments_rescheduled, 2.0);
        assert_eq!(half.all_appointments, 4.0);
    }

    #[test]
    fn undefined_point_renders_as_na() {
        assert_eq!(display_point_value(&None), "N/A");
        assert_eq!(display_point_value(&Some(0.25)), "0.25");
    }
}
