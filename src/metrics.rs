//! Metric engine.
//!
//! Rows in the "Other Areas" bucket stand for several underlying area codes,
//! so their counters are divided by the number of distinct codes in the
//! bucket to get a per-area estimate comparable with the named areas. The
//! estimate is lossy: the divisor is global to the loaded table, not per week.
//!
//! Ratios never fail: a zero denominator yields `None`.

use std::collections::BTreeMap;

use tracing::warn;

use crate::areas::{is_other, OtherAreasDivisor};
use crate::error::{ViewError, ViewResult};
use crate::types::{
    ApportionedRecord, ApportionedTable, AppointmentRecord, Counters, NormalizedTable, Rates,
};
use crate::util::mean_defined;

/// `numerator / denominator`, undefined when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        None
    } else {
        Some(numerator / denominator)
    }
}

impl Rates {
    pub fn from_counters(c: &Counters) -> Rates {
        Rates {
            test_conversion: ratio(c.opportunity_test, c.agenda_appointments),
            trial_conversion: ratio(c.net_trial_activated, c.agenda_appointments),
            cancellation: ratio(c.appointments_cancelled, c.booked()),
            reschedule: ratio(c.appointments_rescheduled, c.all_appointments),
            show: ratio(c.appointments_completed, c.agenda_appointments),
        }
    }

    /// Field-wise mean of per-row rates, skipping undefined entries.
    pub fn mean_of(rates: &[Rates]) -> Rates {
        let field = |get: fn(&Rates) -> Option<f64>| -> Option<f64> {
            let values: Vec<Option<f64>> = rates.iter().map(get).collect();
            mean_defined(&values)
        };
        Rates {
            test_conversion: field(|r| r.test_conversion),
            trial_conversion: field(|r| r.trial_conversion),
            cancellation: field(|r| r.cancellation),
            reschedule: field(|r| r.reschedule),
            show: field(|r| r.show),
        }
    }
}

/// Apportion a single row. `divisor` is `None` when it is undefined, in
/// which case "Other Areas" rows keep their raw counts.
pub fn apportion_record(record: &AppointmentRecord, divisor: Option<f64>) -> ApportionedRecord {
    let booked_raw = record.raw.booked();
    let (apportioned, total_appointments) = match divisor {
        Some(d) if is_other(&record.area) => {
            let total = if booked_raw == 0.0 { 0.0 } else { booked_raw / d };
            (record.raw.divided_by(d), total)
        }
        _ => (record.raw, booked_raw),
    };
    ApportionedRecord {
        record: record.clone(),
        rates: Rates::from_counters(&apportioned),
        apportioned,
        total_appointments_raw: booked_raw,
        total_appointments,
    }
}

pub fn apportion(table: &NormalizedTable) -> ApportionedTable {
    let divisor = OtherAreasDivisor::from_records(&table.records);
    let has_other = table.records.iter().any(|r| is_other(&r.area));
    if has_other && divisor.as_divisor().is_none() {
        warn!("\"Other Areas\" rows carry no area code; keeping their raw counts");
    }
    ApportionedTable {
        records: table
            .records
            .iter()
            .map(|r| apportion_record(r, divisor.as_divisor()))
            .collect(),
        other_areas_divisor: divisor.count(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Area,
    WeekArea,
    ShopManager,
}

impl GroupKey {
    fn key_of(&self, r: &AppointmentRecord) -> Vec<String> {
        match self {
            GroupKey::Area => vec![r.area.clone()],
            GroupKey::WeekArea => vec![r.iso_week.clone(), r.area.clone()],
            GroupKey::ShopManager => vec![r.shop_code_descr.clone(), r.area_manager.clone()],
        }
    }
}

/// How a group's ratios are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateStrategy {
    /// Ratios recomputed from the summed apportioned counters.
    RateOfSums,
    /// Plain mean of the per-row ratios.
    MeanOfRates,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ViewFilter<'a> {
    pub weeks: Option<&'a [String]>,
    pub area_managers: Option<&'a [String]>,
}

impl<'a> ViewFilter<'a> {
    pub fn weeks(weeks: &'a [String]) -> Self {
        ViewFilter {
            weeks: Some(weeks),
            area_managers: None,
        }
    }

    fn matches(&self, r: &AppointmentRecord) -> bool {
        self.weeks.map_or(true, |w| w.contains(&r.iso_week))
            && self
                .area_managers
                .map_or(true, |m| m.contains(&r.area_manager))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: Vec<String>,
    pub row_count: usize,
    pub raw: Counters,
    pub apportioned: Counters,
    pub total_appointments_raw: f64,
    pub total_appointments: f64,
    pub rates: Rates,
}

/// Read-only aggregation result, rows ordered by key.
#[derive(Debug, Clone)]
pub struct AggregatedView {
    pub rows: Vec<GroupRow>,
}

impl AggregatedView {
    pub fn empty() -> Self {
        AggregatedView { rows: Vec::new() }
    }

    #[cfg(test)]
    pub fn find(&self, key: &[&str]) -> Option<&GroupRow> {
        self.rows
            .iter()
            .find(|row| row.key.iter().map(String::as_str).eq(key.iter().copied()))
    }
}

/// Group the filtered rows, sum every counter and derive the ratios with
/// `strategy`. A filter that matches nothing yields `EmptyFilterResult`.
pub fn aggregate(
    table: &ApportionedTable,
    group_key: GroupKey,
    strategy: RateStrategy,
    filter: &ViewFilter<'_>,
) -> ViewResult<AggregatedView> {
    #[derive(Default)]
    struct Acc {
        row_count: usize,
        raw: Counters,
        apportioned: Counters,
        total_appointments_raw: f64,
        total_appointments: f64,
        row_rates: Vec<Rates>,
    }

    let mut groups: BTreeMap<Vec<String>, Acc> = BTreeMap::new();
    for r in table.records.iter().filter(|r| filter.matches(&r.record)) {
        let e = groups.entry(group_key.key_of(&r.record)).or_default();
        e.row_count += 1;
        e.raw += r.record.raw;
        e.apportioned += r.apportioned;
        e.total_appointments_raw += r.total_appointments_raw;
        e.total_appointments += r.total_appointments;
        e.row_rates.push(r.rates);
    }

    if groups.is_empty() {
        return Err(ViewError::EmptyFilterResult);
    }

    let rows = groups
        .into_iter()
        .map(|(key, acc)| {
            let rates = match strategy {
                RateStrategy::RateOfSums => Rates::from_counters(&acc.apportioned),
                RateStrategy::MeanOfRates => Rates::mean_of(&acc.row_rates),
            };
            GroupRow {
                key,
                row_count: acc.row_count,
                raw: acc.raw,
                apportioned: acc.apportioned,
                total_appointments_raw: acc.total_appointments_raw,
                total_appointments: acc.total_appointments,
                rates,
            }
        })
        .collect();

    Ok(AggregatedView { rows })
}

/// Anything that can be charted over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    AllAppointments,
    TotalAppointments,
    AppointmentsCancelled,
    AppointmentsRescheduled,
    AgendaAppointments,
    AppointmentsCompleted,
    OpportunityTest,
    NetTrialActivated,
    TestConversionRate,
    TrialConversionRate,
    CancellationRate,
    RescheduleRate,
    ShowRate,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::AllAppointments,
        Metric::TotalAppointments,
        Metric::AppointmentsCancelled,
        Metric::AppointmentsRescheduled,
        Metric::AgendaAppointments,
        Metric::AppointmentsCompleted,
        Metric::OpportunityTest,
        Metric::NetTrialActivated,
        Metric::TestConversionRate,
        Metric::TrialConversionRate,
        Metric::CancellationRate,
        Metric::RescheduleRate,
        Metric::ShowRate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::AllAppointments => "All Appointments",
            Metric::TotalAppointments => "Total Appointments",
            Metric::AppointmentsCancelled => "Appointments Cancelled",
            Metric::AppointmentsRescheduled => "Appointments Rescheduled",
            Metric::AgendaAppointments => "Agenda Appointments",
            Metric::AppointmentsCompleted => "Appointments Completed",
            Metric::OpportunityTest => "Opportunity Test",
            Metric::NetTrialActivated => "Net Trial Activated",
            Metric::TestConversionRate => "Appointment to test: Conversion rate",
            Metric::TrialConversionRate => "Appointment to trial: Conversion rate",
            Metric::CancellationRate => "Cancellation rate",
            Metric::RescheduleRate => "Reschedule rate",
            Metric::ShowRate => "Show rate",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Value of this metric for a group: counters are the apportioned sums,
    /// rates whatever the view's strategy produced.
    pub fn value(&self, row: &GroupRow) -> Option<f64> {
        let c = &row.apportioned;
        match self {
            Metric::AllAppointments => Some(c.all_appointments),
            Metric::TotalAppointments => Some(row.total_appointments),
            Metric::AppointmentsCancelled => Some(c.appointments_cancelled),
            Metric::AppointmentsRescheduled => Some(c.appointments_rescheduled),
            Metric::AgendaAppointments => Some(c.agenda_appointments),
            Metric::AppointmentsCompleted => Some(c.appointments_completed),
            Metric::OpportunityTest => Some(c.opportunity_test),
            Metric::NetTrialActivated => Some(c.net_trial_activated),
            Metric::TestConversionRate => row.rates.test_conversion,
            Metric::TrialConversionRate => row.rates.trial_conversion,
            Metric::CancellationRate => row.rates.cancellation,
            Metric::RescheduleRate => row.rates.reschedule,
            Metric::ShowRate => row.rates.show,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{agenda, record, table};
    use super::*;
    use crate::areas::OTHER_AREAS;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn zero_denominators_are_undefined_for_every_rate() {
        let rates = Rates::from_counters(&Counters {
            opportunity_test: 3.0,
            net_trial_activated: 1.0,
            appointments_completed: 2.0,
            appointments_rescheduled: 4.0,
            ..Default::default()
        });
        assert_eq!(rates.test_conversion, None);
        assert_eq!(rates.trial_conversion, None);
        assert_eq!(rates.cancellation, None);
        assert_eq!(rates.reschedule, None);
        assert_eq!(rates.show, None);
    }

    #[test]
    fn rates_follow_their_formulas() {
        let rates = Rates::from_counters(&Counters {
            agenda_appointments: 20.0,
            opportunity_test: 5.0,
            appointments_completed: 15.0,
            appointments_cancelled: 5.0,
            net_trial_activated: 2.0,
            appointments_rescheduled: 3.0,
            all_appointments: 30.0,
        });
        assert_eq!(rates.test_conversion, Some(0.25));
        assert_eq!(rates.trial_conversion, Some(0.1));
        assert_eq!(rates.cancellation, Some(0.2));
        assert_eq!(rates.reschedule, Some(0.1));
        assert_eq!(rates.show, Some(0.75));
    }

    #[test]
    fn other_areas_rows_are_divided_by_distinct_code_count() {
        let t = table(vec![
            record("2024-20", "501", "S1", "M", agenda(9.0, 3.0)),
            record("2024-20", "502", "S2", "M", agenda(9.0, 0.0)),
            record("2024-20", "501", "S1", "M", agenda(9.0, 6.0)),
            record("2024-20", "304", "S3", "Tamara Fuente", agenda(9.0, 3.0)),
        ]);
        let apportioned = apportion(&t);
        assert_eq!(apportioned.other_areas_divisor, 2);

        let agendas: Vec<f64> = apportioned
            .records
            .iter()
            .map(|r| r.apportioned.agenda_appointments)
            .collect();
        assert_eq!(agendas, vec![4.5, 4.5, 4.5, 9.0]);
        assert_eq!(apportioned.records[2].apportioned.opportunity_test, 3.0);
        assert_eq!(apportioned.records[3].apportioned, apportioned.records[3].record.raw);

        let view = aggregate(&apportioned, GroupKey::Area, RateStrategy::RateOfSums, &ViewFilter::default()).unwrap();
        let other = view.find(&[OTHER_AREAS]).unwrap();
        assert!(close(other.apportioned.agenda_appointments, 13.5));
        assert!(close(other.raw.agenda_appointments, 27.0));
    }

    #[test]
    fn total_appointments_apportions_the_raw_sum() {
        let raw = Counters {
            agenda_appointments: 3.0,
            appointments_cancelled: 1.0,
            ..Default::default()
        };
        let other = apportion_record(&record("w", "501", "S", "M", raw), Some(2.0));
        assert_eq!(other.total_appointments, 2.0);
        assert_eq!(other.total_appointments_raw, 4.0);

        let named = apportion_record(&record("w", "109", "S", "M", raw), Some(2.0));
        assert_eq!(named.total_appointments, 4.0);

        let empty = apportion_record(&record("w", "501", "S", "M", Counters::default()), Some(2.0));
        assert_eq!(empty.total_appointments, 0.0);
    }

    #[test]
    fn undefined_divisor_keeps_raw_counts() {
        let t = table(vec![record("w", "", "S", "M", agenda(8.0, 2.0))]);
        let apportioned = apportion(&t);
        assert_eq!(apportioned.other_areas_divisor, 0);
        assert_eq!(apportioned.records[0].apportioned.agenda_appointments, 8.0);
        assert_eq!(apportioned.records[0].rates.test_conversion, Some(0.25));
    }

    #[test]
    fn named_area_summary_sums_then_divides() {
        let t = apportion(&table(vec![
            record("2024-20", "109", "S1", "Eleonora Armonici", agenda(10.0, 2.0)),
            record("2024-20", "109", "S2", "Eleonora Armonici", agenda(20.0, 8.0)),
        ]));
        let view = aggregate(&t, GroupKey::Area, RateStrategy::RateOfSums, &ViewFilter::default()).unwrap();
        assert_eq!(view.rows.len(), 1);
        let row = &view.rows[0];
        assert_eq!(row.key, vec!["109-Area 7 Eleonora Armonici"]);
        assert_eq!(row.apportioned.agenda_appointments, 30.0);
        assert_eq!(row.apportioned.opportunity_test, 10.0);
        assert!(close(row.rates.test_conversion.unwrap(), 1.0 / 3.0));
    }

    #[test]
    fn rate_of_sums_differs_from_mean_of_rates() {
        let t = apportion(&table(vec![
            record("2024-20", "109", "S1", "M", agenda(10.0, 2.0)),
            record("2024-20", "109", "S2", "M", agenda(20.0, 8.0)),
        ]));
        let sums = aggregate(&t, GroupKey::WeekArea, RateStrategy::RateOfSums, &ViewFilter::default()).unwrap();
        let means = aggregate(&t, GroupKey::WeekArea, RateStrategy::MeanOfRates, &ViewFilter::default()).unwrap();

        let of_sums = sums.rows[0].rates.test_conversion.unwrap();
        let of_rates = means.rows[0].rates.test_conversion.unwrap();
        assert!(close(of_sums, 10.0 / 30.0));
        assert!(close(of_rates, (0.2 + 0.4) / 2.0));
        assert!(!close(of_sums, of_rates));
        // counters are summed the same way under both strategies
        assert_eq!(sums.rows[0].apportioned, means.rows[0].apportioned);
    }

    #[test]
    fn mean_of_rates_skips_undefined_rows() {
        let t = apportion(&table(vec![
            record("2024-20", "304", "S1", "M", agenda(10.0, 5.0)),
            record("2024-20", "304", "S1", "M", agenda(0.0, 0.0)),
        ]));
        let view = aggregate(&t, GroupKey::WeekArea, RateStrategy::MeanOfRates, &ViewFilter::default()).unwrap();
        assert_eq!(view.rows[0].rates.test_conversion, Some(0.5));
        assert_eq!(view.rows[0].rates.reschedule, None);
    }

    #[test]
    fn groups_are_keyed_and_ordered() {
        let t = apportion(&table(vec![
            record("2024-21", "304", "S1", "Tamara Fuente", agenda(1.0, 0.0)),
            record("2024-20", "501", "S9", "Someone Else", agenda(1.0, 0.0)),
            record("2024-20", "304", "S1", "Tamara Fuente", agenda(1.0, 0.0)),
        ]));
        let view = aggregate(&t, GroupKey::WeekArea, RateStrategy::MeanOfRates, &ViewFilter::default()).unwrap();
        let keys: Vec<Vec<String>> = view.rows.iter().map(|r| r.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                vec!["2024-20".to_string(), "304-Area 30 Tamara Fuente".to_string()],
                vec!["2024-20".to_string(), OTHER_AREAS.to_string()],
                vec!["2024-21".to_string(), "304-Area 30 Tamara Fuente".to_string()],
            ]
        );

        let shops = aggregate(&t, GroupKey::ShopManager, RateStrategy::RateOfSums, &ViewFilter::default()).unwrap();
        assert_eq!(shops.find(&["S1", "Tamara Fuente"]).unwrap().row_count, 2);
    }

    #[test]
    fn filters_narrow_rows_and_empty_matches_are_signalled() {
        let t = apportion(&table(vec![
            record("2024-20", "304", "S1", "Tamara Fuente", agenda(4.0, 1.0)),
            record("2024-21", "304", "S1", "Tamara Fuente", agenda(6.0, 1.0)),
            record("2024-21", "109", "S2", "Eleonora Armonici", agenda(5.0, 1.0)),
        ]));
        let weeks = vec!["2024-21".to_string()];
        let managers = vec!["Tamara Fuente".to_string()];
        let filter = ViewFilter {
            weeks: Some(weeks.as_slice()),
            area_managers: Some(managers.as_slice()),
        };
        let view = aggregate(&t, GroupKey::ShopManager, RateStrategy::RateOfSums, &filter).unwrap();
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].raw.agenda_appointments, 6.0);

        let nothing = vec!["1999-01".to_string()];
        let result = aggregate(&t, GroupKey::Area, RateStrategy::RateOfSums, &ViewFilter::weeks(&nothing));
        assert_eq!(result.unwrap_err(), ViewError::EmptyFilterResult);
    }

    #[test]
    fn metric_names_round_trip_and_read_values() {
        for m in Metric::ALL {
            assert_eq!(Metric::from_name(m.name()), Some(m));
        }
        assert_eq!(Metric::from_name("show RATE"), Some(Metric::ShowRate));
        assert_eq!(Metric::from_name("bogus"), None);

        let t = apportion(&table(vec![record("w", "304", "S", "M", agenda(4.0, 1.0))]));
        let view = aggregate(&t, GroupKey::WeekArea, RateStrategy::MeanOfRates, &ViewFilter::default()).unwrap();
        assert_eq!(Metric::AgendaAppointments.value(&view.rows[0]), Some(4.0));
        assert_eq!(Metric::TotalAppointments.value(&view.rows[0]), Some(4.0));
        assert_eq!(Metric::TestConversionRate.value(&view.rows[0]), Some(0.25));
        assert_eq!(Metric::ShowRate.value(&view.rows[0]), Some(0.0));
        assert_eq!(Metric::RescheduleRate.value(&view.rows[0]), None);
    }
}
