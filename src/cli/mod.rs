//! Command-line parsing for the `gr4j` rainfall-runoff tool.
//!
//! Argument parsing and command dispatch stay separate from the model and
//! calibration code; `app` turns these structs into run configurations.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gr4j", version, about = "GR4J rainfall-runoff simulation and calibration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calibrate the four parameters against observed discharge and report skill.
    Calibrate(CalibrateArgs),
    /// Run the model with given parameters over a forcing file.
    Simulate(SimulateArgs),
    /// Download daily precipitation and temperature from Open-Meteo.
    Fetch(FetchArgs),
    /// Download an ECMWF daily forecast from Open-Meteo.
    Forecast(ForecastArgs),
}

/// Options for a calibration run.
#[derive(Debug, Parser, Clone)]
pub struct CalibrateArgs {
    /// CSV with columns date, P, E, Q.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: PathBuf,

    /// First day of the validation window (YYYY-MM-DD).
    #[arg(long, default_value = "2015-01-01", value_parser = parse_iso_date)]
    pub split: NaiveDate,

    #[command(flatten)]
    pub bounds: BoundsArgs,

    /// Maximum number of optimizer generations.
    #[arg(long, default_value_t = 40)]
    pub generations: usize,

    /// Population size multiplier (population = popsize * 4).
    #[arg(long, default_value_t = 15)]
    pub popsize: usize,

    /// Random seed for the optimizer.
    #[arg(long, default_value_t = 123)]
    pub seed: u64,

    /// Relative convergence tolerance on population energies.
    #[arg(long, default_value_t = 0.01)]
    pub tol: f64,

    /// Stop the search after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub time_budget: Option<f64>,

    /// Evaluate candidates on a single thread.
    #[arg(long)]
    pub serial: bool,

    /// Start the validation run from the calibration run's final stores.
    #[arg(long)]
    pub warm_start: bool,

    #[command(flatten)]
    pub plot: PlotArgs,

    /// Export dated P, E, Q and simulated Q to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export calibrated parameters (plus scores and settings) to JSON.
    #[arg(long = "export-params", value_name = "JSON")]
    pub export_params: Option<PathBuf>,
}

/// Search box, one `lo,hi` pair per parameter.
#[derive(Debug, Args, Clone)]
pub struct BoundsArgs {
    /// Production store capacity bounds (mm).
    #[arg(long, value_name = "LO,HI", default_value = "50,2500", value_parser = parse_pair, allow_hyphen_values = true)]
    pub x1_bounds: (f64, f64),

    /// Groundwater exchange bounds (mm/day).
    #[arg(long, value_name = "LO,HI", default_value = "-5,5", value_parser = parse_pair, allow_hyphen_values = true)]
    pub x2_bounds: (f64, f64),

    /// Routing store capacity bounds (mm).
    #[arg(long, value_name = "LO,HI", default_value = "20,500", value_parser = parse_pair, allow_hyphen_values = true)]
    pub x3_bounds: (f64, f64),

    /// Routing time constant bounds (days).
    #[arg(long, value_name = "LO,HI", default_value = "1,20", value_parser = parse_pair, allow_hyphen_values = true)]
    pub x4_bounds: (f64, f64),
}

/// Terminal hydrograph options.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Render an ASCII hydrograph in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Years to show, counted back from the last date.
    #[arg(long, default_value_t = 2)]
    pub plot_years: u32,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for a plain simulation run.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// CSV with columns date, P, E and optionally Q.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: PathBuf,

    /// Parameter JSON produced by `gr4j calibrate --export-params`.
    #[arg(long, value_name = "JSON", conflicts_with_all = ["x1", "x2", "x3", "x4"])]
    pub params: Option<PathBuf>,

    /// Production store capacity (mm).
    #[arg(long, requires_all = ["x2", "x3", "x4"])]
    pub x1: Option<f64>,

    /// Groundwater exchange (mm/day).
    #[arg(long, allow_hyphen_values = true)]
    pub x2: Option<f64>,

    /// Routing store capacity (mm).
    #[arg(long)]
    pub x3: Option<f64>,

    /// Routing time constant (days).
    #[arg(long)]
    pub x4: Option<f64>,

    /// Initial production store level (mm). Defaults to X1 / 2.
    #[arg(long)]
    pub s0: Option<f64>,

    /// Initial routing store level (mm). Defaults to X3 / 2.
    #[arg(long)]
    pub r0: Option<f64>,

    #[command(flatten)]
    pub plot: PlotArgs,

    /// Export dated P, E, Q and simulated Q to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

/// Options for a historical weather download.
#[derive(Debug, Parser, Clone)]
pub struct FetchArgs {
    /// Latitude (decimal degrees).
    #[arg(long, alias = "latitude", allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude (decimal degrees).
    #[arg(long, alias = "longitude", allow_hyphen_values = true)]
    pub lon: f64,

    /// First day (YYYY-MM-DD).
    #[arg(long, value_parser = parse_iso_date)]
    pub start: NaiveDate,

    /// Last day, inclusive (YYYY-MM-DD).
    #[arg(long, value_parser = parse_iso_date)]
    pub end: NaiveDate,

    /// Time zone for daily aggregation.
    #[arg(long, default_value = "America/Lima")]
    pub timezone: String,

    /// Output CSV.
    #[arg(long, value_name = "CSV", default_value = "meteo.csv")]
    pub out: PathBuf,
}

/// Options for a forecast download.
#[derive(Debug, Parser, Clone)]
pub struct ForecastArgs {
    /// Latitude (decimal degrees).
    #[arg(long, alias = "latitude", allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude (decimal degrees).
    #[arg(long, alias = "longitude", allow_hyphen_values = true)]
    pub lon: f64,

    /// First forecast day (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_iso_date)]
    pub start: Option<NaiveDate>,

    /// Number of days, 1 to 16.
    #[arg(long, default_value_t = 10)]
    pub days: u32,

    /// Directory for `forecast_YYYYMMDD.csv`.
    #[arg(long, value_name = "DIR", default_value = "data")]
    pub output_dir: PathBuf,
}

fn parse_iso_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD ({e})"))
}

fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (lo, hi) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LO,HI (got '{s}')"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid number '{}': {e}", v.trim()))
    };
    Ok((parse(lo)?, parse(hi)?))
}
