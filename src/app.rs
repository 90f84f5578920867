//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - runs calibration or a fixed-parameter simulation
//! - downloads weather data
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{CalibrateArgs, Command, FetchArgs, ForecastArgs, SimulateArgs};
use crate::data::{ForecastRequest, MeteoClient, MeteoRequest};
use crate::domain::{Gr4jParams, ModelState, OptimizerConfig, ParamBounds, RunConfig};
use crate::error::{AppError, ErrorKind};

pub mod pipeline;

/// Entry point for the `gr4j` binary.
pub fn run() -> Result<(), AppError> {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .try_init()
        .ok();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Fetch(args) => handle_fetch(args),
        Command::Forecast(args) => handle_forecast(args),
    }
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let run = pipeline::run_calibration(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest.stats, &config, &run.result, &run.skill)
    );

    if config.plot {
        let plot = crate::plot::render_hydrograph(
            &run.ingest.dates(),
            &run.ingest.observed(),
            &run.skill.discharge,
            config.plot_years,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &config.export_results {
        crate::io::write_results_csv(path, &run.ingest.records, &run.skill.discharge)?;
        info!("wrote results to {}", path.display());
    }
    if let Some(path) = &config.export_params {
        crate::io::write_params_json(path, &run.params_file(&config))?;
        info!("wrote parameters to {}", path.display());
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let params = simulate_params_from_args(&args)?;
    let initial = initial_state_from_args(&args, &params);
    let run = pipeline::run_simulation(&args.input, params, initial)?;

    println!(
        "{}",
        crate::report::format_simulation_summary(
            &run.ingest.stats,
            &run.params,
            run.initial,
            run.score.as_ref()
        )
    );

    if args.plot.plot && !args.plot.no_plot {
        let plot = crate::plot::render_hydrograph(
            &run.ingest.dates(),
            &run.ingest.observed(),
            &run.discharge,
            args.plot.plot_years,
            args.plot.width,
            args.plot.height,
        );
        println!("{plot}");
    }

    if let Some(path) = &args.export {
        crate::io::write_results_csv(path, &run.ingest.records, &run.discharge)?;
        info!("wrote results to {}", path.display());
    }

    Ok(())
}

fn handle_fetch(args: FetchArgs) -> Result<(), AppError> {
    let request = MeteoRequest {
        latitude: args.lat,
        longitude: args.lon,
        start_date: args.start,
        end_date: args.end,
        timezone: args.timezone,
    };
    let days = MeteoClient::from_env()?.fetch_daily(&request)?;
    crate::io::write_meteo_csv(&args.out, &days)?;
    println!("Wrote {} days to {}", days.len(), args.out.display());
    Ok(())
}

fn handle_forecast(args: ForecastArgs) -> Result<(), AppError> {
    let request = ForecastRequest {
        latitude: args.lat,
        longitude: args.lon,
        start_date: args.start.unwrap_or_else(|| chrono::Utc::now().date_naive()),
        forecast_days: args.days,
    };
    let days = MeteoClient::from_env()?.fetch_forecast(&request)?;

    std::fs::create_dir_all(&args.output_dir).map_err(|e| {
        AppError::new(
            ErrorKind::Input,
            format!("Failed to create '{}': {e}", args.output_dir.display()),
        )
    })?;
    let path = args.output_dir.join(request.file_name());
    crate::io::write_meteo_csv(&path, &days)?;
    println!("Wrote {} forecast days to {}", days.len(), path.display());
    Ok(())
}

pub fn run_config_from_args(args: &CalibrateArgs) -> RunConfig {
    RunConfig {
        input: args.input.clone(),
        split_date: args.split,
        bounds: ParamBounds {
            x1: args.bounds.x1_bounds,
            x2: args.bounds.x2_bounds,
            x3: args.bounds.x3_bounds,
            x4: args.bounds.x4_bounds,
        },
        optimizer: OptimizerConfig {
            max_generations: args.generations,
            population_factor: args.popsize,
            seed: args.seed,
            tol: args.tol,
            parallel: !args.serial,
            time_budget_secs: args.time_budget,
            ..OptimizerConfig::default()
        },
        warm_start: args.warm_start,
        plot: args.plot.plot && !args.plot.no_plot,
        plot_years: args.plot.plot_years,
        plot_width: args.plot.width,
        plot_height: args.plot.height,
        export_results: args.export.clone(),
        export_params: args.export_params.clone(),
    }
}

/// Parameters come from `--params` or from all four `--xN` flags.
fn simulate_params_from_args(args: &SimulateArgs) -> Result<Gr4jParams, AppError> {
    if let Some(path) = &args.params {
        return Ok(crate::io::read_params_json(path)?.params);
    }
    match (args.x1, args.x2, args.x3, args.x4) {
        (Some(x1), Some(x2), Some(x3), Some(x4)) => Ok(Gr4jParams::new(x1, x2, x3, x4)),
        _ => Err(AppError::new(
            ErrorKind::Input,
            "Provide --params FILE or all of --x1, --x2, --x3, --x4.",
        )),
    }
}

/// Explicit initial stores, filling an unset one with its half-full default.
fn initial_state_from_args(args: &SimulateArgs, params: &Gr4jParams) -> Option<ModelState> {
    if args.s0.is_none() && args.r0.is_none() {
        return None;
    }
    let default = ModelState::initial(params);
    Some(ModelState::new(
        args.s0.unwrap_or(default.production_store),
        args.r0.unwrap_or(default.routing_store),
    ))
}
