// Entry point and high-level CLI flow.
//
// The appointment export is loaded at start-up and cached; the menu then
// renders the three views against the cached table, reloading first when
// the file changed on disk:
// - Overview: per-area summary for one week, plus bar chart data.
// - Time Series: one metric per week and area, plus line chart data.
// - Shop Details: per-shop pivot for selected weeks and area managers.
// "Update data" reloads the source and swaps the table in wholesale.
mod areas;
mod charts;
mod error;
mod loader;
mod metrics;
mod output;
mod reports;
mod schema;
mod store;
mod types;
mod util;
mod window;

use chrono::{Local, NaiveDate};
use clap::Parser;
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::{LoadedTable, TableStore};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use error::{LoadResult, ViewError};
use metrics::Metric;

static STORE: Lazy<TableStore> = Lazy::new(TableStore::new);

#[derive(Parser, Debug)]
#[command(name = "mb-report")]
#[command(version, about = "Appointment conversion, cancellation and show-rate report")]
struct Args {
    /// Appointment export (.xlsx, .xls, .ods or .csv)
    #[arg(short, long, default_value = "mbreport_query_new.xlsx")]
    input: PathBuf,

    /// Worksheet name (default: first sheet)
    #[arg(short, long)]
    sheet: Option<String>,

    /// Anchor date for the 12-week window, YYYY-MM-DD (default: today)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Directory for exported CSV/JSON files
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Rows shown in console previews
    #[arg(long, default_value_t = 10)]
    preview_rows: usize,

    /// Export every view with default filters and exit
    #[arg(long)]
    batch: bool,

    /// Print detailed progress
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn anchor_date(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn out(&self, file: &str) -> PathBuf {
        self.out_dir.join(file)
    }
}

fn load_source(args: &Args, path: &Path) -> LoadResult<(types::ApportionedTable, loader::LoadReport)> {
    let (normalized, report) = loader::load(path, args.sheet.as_deref(), args.anchor_date())?;
    Ok((metrics::apportion(&normalized), report))
}

fn print_load_summary(loaded: &LoadedTable) {
    let report = &loaded.report;
    println!(
        "Processing dataset... ({} rows read, {} in the 12-week window)",
        util::format_int(report.total_rows),
        util::format_int(report.window_rows)
    );
    if loaded.table.is_empty() {
        warn!("no rows fall inside the reporting window");
    }
    if report.unparsed_dates > 0 {
        println!(
            "Note: {} rows skipped due to unreadable dates.",
            util::format_int(report.unparsed_dates)
        );
    }
    if report.unparsed_counters > 0 {
        println!(
            "Note: {} non-numeric counter cells read as 0.",
            util::format_int(report.unparsed_counters)
        );
    }
    println!(
        "Other Areas divisor: {} distinct area codes\n",
        loaded.table.other_areas_divisor
    );
}

/// Read a single line of input after printing `prompt`.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    read_line("Enter choice: ")
}

/// Print numbered options and read a comma-separated selection.
/// An empty answer keeps `defaults`.
fn pick_many(label: &str, options: &[String], defaults: &[String]) -> Vec<String> {
    println!("{}:", label);
    for (idx, opt) in options.iter().enumerate() {
        let marker = if defaults.contains(opt) { "*" } else { " " };
        println!(" {}[{}] {}", marker, idx + 1, opt);
    }
    let answer = read_line("Select numbers (comma-separated, blank for *): ");
    if answer.is_empty() {
        return defaults.to_vec();
    }
    answer
        .split(',')
        .filter_map(|s| s.trim().parse::<usize>().ok())
        .filter_map(|n| n.checked_sub(1).and_then(|i| options.get(i)).cloned())
        .collect()
}

fn pick_one(label: &str, options: &[String], default: Option<&String>) -> Option<String> {
    let defaults: Vec<String> = default.cloned().into_iter().collect();
    pick_many(label, options, &defaults).into_iter().next()
}

fn report_write(result: error::OutputResult<()>, path: &Path) {
    match result {
        Ok(()) => println!("(Exported to {})", path.display()),
        Err(e) => error!(path = %path.display(), "write error: {}", e),
    }
}

/// Table for the views: the cached one while the export is unchanged on
/// disk, a fresh load otherwise. A failed load falls back to the cache.
fn current_table(args: &Args) -> Option<Arc<LoadedTable>> {
    let table = match STORE.get_or_load(&args.input, |p| load_source(args, p)) {
        Ok((loaded, fresh)) => {
            if fresh {
                print_load_summary(&loaded);
            }
            Some(loaded)
        }
        Err(e) => {
            warn!("could not refresh the export: {}", e);
            STORE.current()
        }
    };
    if table.is_none() {
        println!("Error: No data loaded. Please load the export first (option 1).\n");
    }
    table
}

/// Handle option [1]: reload the export and swap it in.
fn handle_reload(args: &Args) {
    match STORE.reload(&args.input, |p| load_source(args, p)) {
        Ok(loaded) => {
            print_load_summary(&loaded);
            println!("Data Updated Successfully\n");
        }
        Err(e) => {
            eprintln!("Failed to load file: {}", e);
            if STORE.current().is_some() {
                println!("Keeping the previously loaded data.\n");
            }
        }
    }
}

fn run_overview(args: &Args, loaded: &LoadedTable, weeks: &[String]) {
    let table = &loaded.table;
    let rows = reports::overview_summary(table, weeks);
    let note = format!("ISO Week: {}", weeks.join(", "));
    output::preview_table("Overview", Some(&note), &rows, args.preview_rows);
    if rows.is_empty() {
        println!("No data for the selected week.\n");
        return;
    }
    let csv_path = args.out("overview.csv");
    report_write(output::write_csv(&csv_path, &rows), &csv_path);

    let charts = charts::overview_charts(&reports::overview_view(table, weeks));
    let json_path = args.out("overview_charts.json");
    report_write(output::write_json(&json_path, &charts), &json_path);
}

fn run_time_series(args: &Args, loaded: &LoadedTable, metric: Metric) {
    let points = reports::time_series(&loaded.table, metric);
    output::preview_table(
        "Time Series of Selected Metric by Area",
        Some(metric.name()),
        &points,
        args.preview_rows,
    );
    if points.is_empty() {
        return;
    }
    let csv_path = args.out("time_series.csv");
    report_write(output::write_csv(&csv_path, &points), &csv_path);

    let lines = charts::time_series_lines(metric, &points);
    let json_path = args.out("time_series_lines.json");
    report_write(output::write_json(&json_path, &lines), &json_path);
}

fn run_shop_details(args: &Args, loaded: &LoadedTable, weeks: &[String], managers: &[String]) {
    match reports::shop_pivot(&loaded.table, weeks, managers) {
        Ok(rows) => {
            output::preview_table("Shop Details", None, &rows, args.preview_rows);
            let csv_path = args.out("shop_details.csv");
            report_write(output::write_csv(&csv_path, &rows), &csv_path);
        }
        Err(ViewError::InsufficientFilters) => println!("Not enough filters to show data.\n"),
        Err(ViewError::EmptyFilterResult) => println!("No data for the selected filters.\n"),
    }
}

fn handle_overview(args: &Args) {
    let Some(loaded) = current_table(args) else { return };
    let weeks = reports::week_options(&loaded.table);
    let Some(week) = pick_one("ISO Weeks", &weeks, reports::default_week(&weeks).as_ref()) else {
        println!("No week selected.\n");
        return;
    };
    run_overview(args, &loaded, &[week]);
}

fn handle_time_series(args: &Args) {
    let Some(loaded) = current_table(args) else { return };
    let names: Vec<String> = Metric::ALL.iter().map(|m| m.name().to_string()).collect();
    let picked = pick_one("Metrics", &names, names.first());
    let metric = picked
        .as_deref()
        .and_then(Metric::from_name)
        .unwrap_or(Metric::AllAppointments);
    run_time_series(args, &loaded, metric);
}

fn handle_shop_details(args: &Args) {
    let Some(loaded) = current_table(args) else { return };
    let weeks = reports::week_options(&loaded.table);
    let default_weeks: Vec<String> = reports::default_week(&weeks).into_iter().collect();
    let selected_weeks = pick_many("ISO Weeks", &weeks, &default_weeks);

    let managers = reports::area_manager_options(&loaded.table);
    let default_managers = reports::default_area_managers(&managers);
    let selected_managers = pick_many("Area Managers", &managers, &default_managers);

    run_shop_details(args, &loaded, &selected_weeks, &selected_managers);
}

/// Export every view with its default filters.
fn run_batch(args: &Args, loaded: &LoadedTable) {
    let weeks = reports::week_options(&loaded.table);
    match reports::default_week(&weeks) {
        Some(week) => run_overview(args, loaded, &[week]),
        None => warn!("no weeks in the reporting window"),
    }
    run_time_series(args, loaded, Metric::AllAppointments);

    let default_weeks: Vec<String> = reports::default_week(&weeks).into_iter().collect();
    let managers = reports::area_manager_options(&loaded.table);
    run_shop_details(
        args,
        loaded,
        &default_weeks,
        &reports::default_area_managers(&managers),
    );
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .init();

    match STORE.get_or_load(&args.input, |p| load_source(&args, p)) {
        Ok((loaded, _)) => {
            print_load_summary(&loaded);
            println!("Data Loaded Successfully\n");
            if args.batch {
                run_batch(&args, &loaded);
                return;
            }
        }
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
            if args.batch {
                std::process::exit(e.exit_code());
            }
        }
    }

    loop {
        println!("MB Report Analysis");
        println!("[1] Update Data");
        println!("[2] Overview");
        println!("[3] Time Series");
        println!("[4] Shop Details");
        println!("[5] Exit\n");
        match read_choice().as_str() {
            "1" => handle_reload(&args),
            "2" => handle_overview(&args),
            "3" => handle_time_series(&args),
            "4" => handle_shop_details(&args),
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1 to 5.\n"),
        }
    }
}
