// Chart data for the presentation layer.
//
// Nothing here draws anything: the structures are serialized to JSON and a
// front end renders them as grouped bars (overview) or connected lines
// (time series), one series per area.
use serde::Serialize;

use crate::metrics::{AggregatedView, GroupRow, Metric};
use crate::types::TimeSeriesPoint;
use crate::util::{format_number, format_percent};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BarPoint {
    pub area: String,
    pub series: String,
    pub value: Option<f64>,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<BarPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewCharts {
    pub counters: BarChart,
    pub conversion: BarChart,
    pub cancellation_and_show: BarChart,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinePoint {
    pub iso_week: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineSeries {
    pub name: String,
    pub area: String,
    pub points: Vec<LinePoint>,
}

const COUNTER_BARS: [Metric; 8] = [
    Metric::AllAppointments,
    Metric::TotalAppointments,
    Metric::AppointmentsCancelled,
    Metric::AppointmentsRescheduled,
    Metric::AgendaAppointments,
    Metric::AppointmentsCompleted,
    Metric::OpportunityTest,
    Metric::NetTrialActivated,
];

fn melt(
    view: &AggregatedView,
    series: &[(Metric, &str)],
    label: impl Fn(Option<f64>) -> String,
) -> Vec<BarPoint> {
    let mut bars = Vec::new();
    for (metric, name) in series {
        for row in &view.rows {
            let value = metric.value(row);
            bars.push(BarPoint {
                area: area_of(row),
                series: name.to_string(),
                value,
                label: label(value),
            });
        }
    }
    bars
}

fn area_of(row: &GroupRow) -> String {
    row.key.last().cloned().unwrap_or_default()
}

pub fn overview_charts(view: &AggregatedView) -> OverviewCharts {
    let counter_series: Vec<(Metric, String)> = COUNTER_BARS
        .iter()
        .map(|m| (*m, format!("Sum of {}", m.name())))
        .collect();
    let counter_refs: Vec<(Metric, &str)> =
        counter_series.iter().map(|(m, n)| (*m, n.as_str())).collect();
    let percent = |v: Option<f64>| format_percent(v, 1);

    OverviewCharts {
        counters: BarChart {
            title: "Overview Chart".to_string(),
            bars: melt(view, &counter_refs, |v| format_number(v.unwrap_or(0.0), 0)),
        },
        conversion: BarChart {
            title: "Conversion Rates by Area".to_string(),
            bars: melt(
                view,
                &[
                    (Metric::TestConversionRate, "Appointment to test"),
                    (Metric::TrialConversionRate, "Appointment to trial"),
                ],
                percent,
            ),
        },
        cancellation_and_show: BarChart {
            title: "Cancellation and Show Rates by Area".to_string(),
            bars: melt(
                view,
                &[
                    (Metric::CancellationRate, "Cancellation rate"),
                    (Metric::RescheduleRate, "Reschedule rate"),
                    (Metric::ShowRate, "Show rate"),
                ],
                percent,
            ),
        },
    }
}

/// One line per area, points in the order the series arrive (week order).
pub fn time_series_lines(metric: Metric, points: &[TimeSeriesPoint]) -> Vec<LineSeries> {
    let mut lines: Vec<LineSeries> = Vec::new();
    for p in points {
        let idx = match lines.iter().position(|l| l.area == p.area) {
            Some(idx) => idx,
            None => {
                lines.push(LineSeries {
                    name: format!("{} - {}", metric.name(), p.area),
                    area: p.area.clone(),
                    points: Vec::new(),
                });
                lines.len() - 1
            }
        };
        lines[idx].points.push(LinePoint {
            iso_week: p.iso_week.clone(),
            value: p.value,
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::OTHER_AREAS;
    use crate::metrics::apportion;
    use crate::metrics::fixtures::{agenda, record, table};
    use crate::reports::{overview_view, time_series};

    #[test]
    fn overview_bars_are_melted_per_series_and_area() {
        let t = apportion(&table(vec![
            record("2024-20", "109", "S1", "Eleonora Armonici", agenda(30.0, 10.0)),
            record("2024-20", "501", "S2", "Marco Bianchi", agenda(0.0, 0.0)),
        ]));
        let view = overview_view(&t, &["2024-20".to_string()]);
        let charts = overview_charts(&view);

        assert_eq!(charts.counters.bars.len(), 8 * 2);
        assert_eq!(charts.counters.bars[0].series, "Sum of All Appointments");
        assert_eq!(charts.conversion.bars.len(), 2 * 2);
        assert_eq!(charts.cancellation_and_show.bars.len(), 3 * 2);

        let test_named = &charts.conversion.bars[0];
        assert_eq!(test_named.area, "109-Area 7 Eleonora Armonici");
        assert_eq!(test_named.label, "33.3%");
        let test_other = &charts.conversion.bars[1];
        assert_eq!(test_other.area, OTHER_AREAS);
        assert_eq!(test_other.value, None);
        assert_eq!(test_other.label, "N/A");
    }

    #[test]
    fn lines_are_split_by_area_in_week_order() {
        let t = apportion(&table(vec![
            record("2024-20", "304", "S1", "Tamara Fuente", agenda(4.0, 1.0)),
            record("2024-21", "304", "S1", "Tamara Fuente", agenda(8.0, 1.0)),
            record("2024-21", "109", "S2", "Eleonora Armonici", agenda(2.0, 1.0)),
        ]));
        let points = time_series(&t, Metric::AgendaAppointments);
        let lines = time_series_lines(Metric::AgendaAppointments, &points);

        assert_eq!(lines.len(), 2);
        let tamara = lines.iter().find(|l| l.area.starts_with("304")).unwrap();
        assert_eq!(tamara.name, "Agenda Appointments - 304-Area 30 Tamara Fuente");
        let weeks: Vec<&str> = tamara.points.iter().map(|p| p.iso_week.as_str()).collect();
        assert_eq!(weeks, vec!["2024-20", "2024-21"]);
        assert_eq!(tamara.points[1].value, Some(8.0));
    }
}
