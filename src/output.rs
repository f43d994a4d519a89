use crate::error::OutputResult;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> OutputResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> OutputResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown rendering of the first `max_rows` rows, or `None` when there is
/// nothing to show.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> Option<String>
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return None;
    }
    Some(Table::new(slice).with(Style::markdown()).to_string())
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    match render_table(rows, max_rows) {
        Some(table) => println!("{}\n", table),
        None => println!("(no rows)\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeSeriesPoint;

    fn point(week: &str, value: Option<f64>) -> TimeSeriesPoint {
        TimeSeriesPoint {
            iso_week: week.to_string(),
            area: "Other Areas".to_string(),
            metric: "Show rate".to_string(),
            value,
        }
    }

    #[test]
    fn renders_markdown_and_truncates() {
        let rows = vec![point("2024-20", Some(0.5)), point("2024-21", None)];
        let table = render_table(&rows, 1).unwrap();
        assert!(table.contains("| ISO Week"));
        assert!(table.contains("2024-20"));
        assert!(!table.contains("2024-21"));

        let all = render_table(&rows, 10).unwrap();
        assert!(all.contains("N/A"));
        assert!(render_table::<TimeSeriesPoint>(&[], 10).is_none());
    }

    #[test]
    fn writes_csv_with_renamed_headers() {
        let path = std::env::temp_dir().join(format!("mb_report_out_{}.csv", std::process::id()));
        write_csv(&path, &[point("2024-20", Some(0.5)), point("2024-21", None)]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("ISO Week,Areas,Metric,Value"));
        assert_eq!(lines.next(), Some("2024-20,Other Areas,Show rate,0.5"));
        assert_eq!(lines.next(), Some("2024-21,Other Areas,Show rate,"));
    }
}
