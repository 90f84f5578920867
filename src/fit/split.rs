//! Chronological split of a dated series into calibration and validation windows.

use std::ops::Range;

use chrono::NaiveDate;
use log::warn;

use crate::error::{AppError, ErrorKind};

/// Index ranges of the two windows. They are adjacent and cover the series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSplit {
    pub calibration: Range<usize>,
    pub validation: Range<usize>,
}

impl WindowSplit {
    /// Split at a position: `[0, at)` calibrates, `[at, len)` validates.
    pub fn at(at: usize, len: usize) -> Self {
        let at = at.min(len);
        Self {
            calibration: 0..at,
            validation: at..len,
        }
    }

    pub fn len(&self) -> usize {
        self.validation.end
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Calibration gets dates strictly before `split`, validation the rest.
///
/// Dates must be strictly ascending. An empty calibration window is an
/// error; an empty validation window is allowed and logged.
pub fn split_by_date(dates: &[NaiveDate], split: NaiveDate) -> Result<WindowSplit, AppError> {
    if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(AppError::new(
            ErrorKind::Input,
            format!(
                "Dates must be strictly ascending ({} is followed by {}).",
                pair[0], pair[1]
            ),
        ));
    }

    let cut = dates.partition_point(|d| *d < split);
    if cut == 0 {
        return Err(AppError::new(
            ErrorKind::InsufficientData,
            format!("No rows before the split date {split}; the calibration window is empty."),
        ));
    }
    if cut == dates.len() {
        warn!("No rows on or after {split}; the validation window is empty.");
    }

    Ok(WindowSplit::at(cut, dates.len()))
}
