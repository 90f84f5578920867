//! Read/write calibrated parameter files (JSON).
//!
//! A parameter file is the portable result of a calibration run: the four
//! parameters plus enough metadata (split date, scores, optimizer settings)
//! to tell how they were obtained. The schema is `domain::ParamsFile`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::domain::ParamsFile;
use crate::error::{AppError, ErrorKind};

/// Value of the `tool` field in files this crate writes.
pub const TOOL_NAME: &str = "gr4j";

pub fn write_params_json(path: &Path, params: &ParamsFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            ErrorKind::Input,
            format!("Failed to create params JSON '{}': {e}", path.display()),
        )
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, params)
        .map_err(|e| AppError::new(ErrorKind::Input, format!("Failed to write params JSON: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::new(ErrorKind::Input, format!("Failed to write params JSON: {e}")))?;
    Ok(())
}

pub fn read_params_json(path: &Path) -> Result<ParamsFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            ErrorKind::Input,
            format!("Failed to open params JSON '{}': {e}", path.display()),
        )
    })?;
    let params: ParamsFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(ErrorKind::Input, format!("Invalid params JSON: {e}")))?;

    if params.params.to_array().iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(
            ErrorKind::Input,
            "Params JSON holds non-finite parameter values.",
        ));
    }
    Ok(params)
}
