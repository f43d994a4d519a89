use crate::error::{ViewError, ViewResult};
use crate::metrics::{aggregate, AggregatedView, GroupKey, Metric, RateStrategy, ViewFilter};
use crate::types::{format_count, ApportionedTable, OverviewRow, ShopPivotRow, TimeSeriesPoint};
use crate::util::format_percent;

pub const DEFAULT_AREA_MANAGERS: [&str; 2] = ["Tamara Fuente", "Eleonora Armonici"];

/// Distinct weeks in table order.
pub fn week_options(table: &ApportionedTable) -> Vec<String> {
    distinct(table.records.iter().map(|r| r.record.iso_week.as_str()))
}

/// Distinct area managers in table order.
pub fn area_manager_options(table: &ApportionedTable) -> Vec<String> {
    distinct(table.records.iter().map(|r| r.record.area_manager.as_str()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.iter().any(|seen| seen == v) {
            out.push(v.to_string());
        }
    }
    out
}

/// The second-to-last week: the last one is usually still in progress.
pub fn default_week(weeks: &[String]) -> Option<String> {
    match weeks.len() {
        0 => None,
        1 => Some(weeks[0].clone()),
        n => Some(weeks[n - 2].clone()),
    }
}

pub fn default_area_managers(options: &[String]) -> Vec<String> {
    DEFAULT_AREA_MANAGERS
        .iter()
        .filter(|m| options.iter().any(|o| o == *m))
        .map(|m| m.to_string())
        .collect()
}

/// Per-area sums for the selected weeks, ratios from the summed counters.
/// No matching rows is not an error here: the view is simply empty.
pub fn overview_view(table: &ApportionedTable, weeks: &[String]) -> AggregatedView {
    match aggregate(table, GroupKey::Area, RateStrategy::RateOfSums, &ViewFilter::weeks(weeks)) {
        Ok(view) => view,
        Err(_) => AggregatedView::empty(),
    }
}

pub fn overview_summary(table: &ApportionedTable, weeks: &[String]) -> Vec<OverviewRow> {
    overview_view(table, weeks)
        .rows
        .iter()
        .map(|g| {
            let c = &g.apportioned;
            OverviewRow {
                area: g.key[0].clone(),
                all_appointments: format_count(c.all_appointments),
                total_appointments: format_count(g.total_appointments),
                appointments_cancelled: format_count(c.appointments_cancelled),
                appointments_rescheduled: format_count(c.appointments_rescheduled),
                agenda_appointments: format_count(c.agenda_appointments),
                appointments_completed: format_count(c.appointments_completed),
                opportunity_test: format_count(c.opportunity_test),
                net_trial_activated: format_count(c.net_trial_activated),
                test_conversion: format_percent(g.rates.test_conversion, 1),
                trial_conversion: format_percent(g.rates.trial_conversion, 1),
                cancellation_rate: format_percent(g.rates.cancellation, 1),
                reschedule_rate: format_percent(g.rates.reschedule, 1),
                show_rate: format_percent(g.rates.show, 1),
            }
        })
        .collect()
}

/// Week-by-area aggregation over the whole window, ratios as the mean of
/// per-row ratios.
pub fn time_series_view(table: &ApportionedTable) -> ViewResult<AggregatedView> {
    aggregate(table, GroupKey::WeekArea, RateStrategy::MeanOfRates, &ViewFilter::default())
}

pub fn time_series(table: &ApportionedTable, metric: Metric) -> Vec<TimeSeriesPoint> {
    let Ok(view) = time_series_view(table) else {
        return Vec::new();
    };
    view.rows
        .iter()
        .map(|g| TimeSeriesPoint {
            iso_week: g.key[0].clone(),
            area: g.key[1].clone(),
            metric: metric.name().to_string(),
            value: metric.value(g),
        })
        .collect()
}

/// Per shop and area manager for the selected weeks and managers.
/// Counters are the shops' own (raw) sums.
pub fn shop_pivot(
    table: &ApportionedTable,
    weeks: &[String],
    area_managers: &[String],
) -> ViewResult<Vec<ShopPivotRow>> {
    if weeks.is_empty() || area_managers.is_empty() {
        return Err(ViewError::InsufficientFilters);
    }
    let filter = ViewFilter {
        weeks: Some(weeks),
        area_managers: Some(area_managers),
    };
    let view = aggregate(table, GroupKey::ShopManager, RateStrategy::RateOfSums, &filter)?;
    Ok(view
        .rows
        .iter()
        .map(|g| {
            let c = &g.raw;
            ShopPivotRow {
                shop_code_descr: g.key[0].clone(),
                area_manager: g.key[1].clone(),
                all_appointments: format_count(c.all_appointments),
                total_appointments: format_count(g.total_appointments_raw),
                agenda_appointments: format_count(c.agenda_appointments),
                appointments_cancelled: format_count(c.appointments_cancelled),
                appointments_rescheduled: format_count(c.appointments_rescheduled),
                appointments_completed: format_count(c.appointments_completed),
                opportunity_test: format_count(c.opportunity_test),
                net_trial_activated: format_count(c.net_trial_activated),
                test_conversion: format_percent(g.rates.test_conversion, 2),
                trial_conversion: format_percent(g.rates.trial_conversion, 2),
                cancellation_rate: format_percent(g.rates.cancellation, 2),
                reschedule_rate: format_percent(g.rates.reschedule, 2),
                show_rate: format_percent(g.rates.show, 2),
            }
        })
        .collect())
}
