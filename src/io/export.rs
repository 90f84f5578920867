//! CSV exports.
//!
//! Both files are meant to be easy to consume in spreadsheets, and both are
//! readable again by the ingest (extra columns are ignored).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data::MeteoDay;
use crate::domain::DailyRecord;
use crate::error::{AppError, ErrorKind};

/// Write dated forcing, observed and simulated discharge.
///
/// Missing observations are written as empty fields.
pub fn write_results_csv(path: &Path, records: &[DailyRecord], simulated: &[f64]) -> Result<(), AppError> {
    if records.len() != simulated.len() {
        return Err(AppError::new(
            ErrorKind::Input,
            format!(
                "Cannot export {} rows with {} simulated values.",
                records.len(),
                simulated.len()
            ),
        ));
    }

    let mut file = create(path)?;
    writeln!(file, "date,P,E,Q,Qsim").map_err(header_error)?;

    for (r, q) in records.iter().zip(simulated) {
        writeln!(
            file,
            "{},{},{},{},{:.6}",
            r.date,
            r.precip,
            r.pet,
            r.observed.map(|v| v.to_string()).unwrap_or_default(),
            q
        )
        .map_err(row_error)?;
    }
    file.flush().map_err(row_error)?;
    Ok(())
}

/// Write downloaded daily weather with the derived evapotranspiration.
pub fn write_meteo_csv(path: &Path, days: &[MeteoDay]) -> Result<(), AppError> {
    let mut file = create(path)?;
    writeln!(file, "date,P,E,tmax,tmin,tmean").map_err(header_error)?;

    for d in days {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            d.date,
            fmt_opt(d.precip),
            fmt_opt(d.pet),
            fmt_opt(d.tmax),
            fmt_opt(d.tmin),
            fmt_opt(d.tmean)
        )
        .map_err(row_error)?;
    }
    file.flush().map_err(row_error)?;
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>, AppError> {
    File::create(path).map(BufWriter::new).map_err(|e| {
        AppError::new(
            ErrorKind::Input,
            format!("Failed to create export CSV '{}': {e}", path.display()),
        )
    })
}

fn header_error(e: std::io::Error) -> AppError {
    AppError::new(ErrorKind::Input, format!("Failed to write export CSV header: {e}"))
}

fn row_error(e: std::io::Error) -> AppError {
    AppError::new(ErrorKind::Input, format!("Failed to write export CSV row: {e}"))
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.3}")).unwrap_or_default()
}
