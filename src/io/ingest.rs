//! CSV ingest of daily forcing and observed discharge.
//!
//! Turns a dated CSV (`date, P, E[, Q]`) into a clean, chronologically
//! ordered series the simulator can run on.
//!
//! Design goals:
//! - **Strict schema**: required columns must exist (exit code 2 otherwise)
//! - **No silent drops**: positions are days, so a bad date/P/E row fails the
//!   whole ingest with every offending line listed
//! - **Missing discharge is data**: empty or unparseable Q becomes a gap in
//!   the observations, not an error

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use log::{info, warn};

use crate::domain::DailyRecord;
use crate::error::{AppError, ErrorKind};

const DATE_COLUMNS: &[&str] = &["date", "fecha"];
const PRECIP_COLUMNS: &[&str] = &["p", "precip", "precipitation"];
const PET_COLUMNS: &[&str] = &["e", "pet", "etp", "evap"];
const OBSERVED_COLUMNS: &[&str] = &["q", "qobs", "observed"];

/// Row errors listed in the failure message before truncating.
const MAX_REPORTED_ROW_ERRORS: usize = 10;

/// Summary of the ingested series.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub n_observed: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Number of breaks in the daily calendar between consecutive rows.
    pub gaps: usize,
    /// Non-empty discharge cells that did not parse; counted as missing.
    pub invalid_observed: usize,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub date: Option<String>,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.date {
            Some(date) => write!(f, "line {} ({date}): {}", self.line, self.message),
            None => write!(f, "line {}: {}", self.line, self.message),
        }
    }
}

/// Ingest output: date-sorted records + stats.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub records: Vec<DailyRecord>,
    pub stats: DatasetStats,
    pub rows_read: usize,
    /// Whether the file carried a discharge column at all.
    pub has_observed: bool,
}

impl IngestedData {
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn precip(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.precip).collect()
    }

    pub fn pet(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.pet).collect()
    }

    /// Observed discharge with NaN for missing values.
    pub fn observed(&self) -> Vec<f64> {
        self.records
            .iter()
            .map(|r| r.observed.unwrap_or(f64::NAN))
            .collect()
    }
}

/// Load a daily series from CSV.
///
/// With `require_observed`, the file must have a discharge column with at
/// least one value.
pub fn load_records(path: &Path, require_observed: bool) -> Result<IngestedData, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            ErrorKind::Input,
            format!("Failed to open CSV '{}': {e}", path.display()),
        )
    })?;
    read_records(file, require_observed)
}

/// Same as [`load_records`] over any reader.
pub fn read_records<R: std::io::Read>(reader: R, require_observed: bool) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(ErrorKind::Input, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let columns = Columns::resolve(&build_header_map(&headers), require_observed)?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut invalid_observed = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    date: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &columns) {
            Ok((row, unparsed_q)) => {
                if let Some(raw) = unparsed_q {
                    invalid_observed += 1;
                    if invalid_observed <= MAX_REPORTED_ROW_ERRORS {
                        warn!("line {line}: unreadable discharge '{raw}' treated as missing.");
                    }
                }
                records.push(row);
            }
            Err(message) => row_errors.push(RowError {
                line,
                date: record.get(columns.date).map(str::to_string),
                message,
            }),
        }
    }

    if !row_errors.is_empty() {
        return Err(row_error_report(&row_errors));
    }
    if records.is_empty() {
        return Err(AppError::new(ErrorKind::InsufficientData, "CSV has no data rows."));
    }

    records.sort_by_key(|r| r.date);
    if let Some(pair) = records.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(AppError::new(
            ErrorKind::Input,
            format!("Duplicate date {} in input.", pair[0].date),
        ));
    }

    if invalid_observed > MAX_REPORTED_ROW_ERRORS {
        warn!("{invalid_observed} unreadable discharge values in total.");
    }

    let stats = compute_stats(&records, invalid_observed);
    if require_observed && stats.n_observed == 0 {
        return Err(AppError::new(
            ErrorKind::InsufficientData,
            "No observed discharge values in input.",
        ));
    }
    info!(
        "ingested {} rows, {} to {}, {} with observed discharge",
        stats.n_rows, stats.first_date, stats.last_date, stats.n_observed
    );

    Ok(IngestedData {
        records,
        stats,
        rows_read,
        has_observed: columns.observed.is_some(),
    })
}

/// Resolved column positions.
struct Columns {
    date: usize,
    precip: usize,
    pet: usize,
    observed: Option<usize>,
}

impl Columns {
    fn resolve(header_map: &HashMap<String, usize>, require_observed: bool) -> Result<Self, AppError> {
        let required = |aliases: &[&str]| {
            find_column(header_map, aliases).ok_or_else(|| {
                AppError::new(
                    ErrorKind::Input,
                    format!("Missing required column: one of {}", quote_all(aliases)),
                )
            })
        };

        let date = required(DATE_COLUMNS)?;
        let precip = required(PRECIP_COLUMNS)?;
        let pet = required(PET_COLUMNS)?;
        let observed = if require_observed {
            Some(required(OBSERVED_COLUMNS)?)
        } else {
            find_column(header_map, OBSERVED_COLUMNS)
        };

        Ok(Self {
            date,
            precip,
            pet,
            observed,
        })
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| header_map.get(*alias).copied())
}

fn quote_all(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("`{n}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse one row. A non-empty discharge cell that does not parse is kept as
/// missing and returned alongside so the caller can report it.
fn parse_row<'a>(
    record: &'a StringRecord,
    columns: &Columns,
) -> Result<(DailyRecord, Option<&'a str>), String> {
    let date = parse_date(get_required(record, columns.date, "date")?)?;
    let precip = parse_required_f64(get_required(record, columns.precip, "P")?, "P")?;
    let pet = parse_required_f64(get_required(record, columns.pet, "E")?, "E")?;
    let raw_q = columns.observed.and_then(|idx| get_optional(record, idx));
    let observed = parse_opt_f64(raw_q);
    let unparsed = raw_q.filter(|raw| observed.is_none() && !raw.eq_ignore_ascii_case("nan"));

    Ok((
        DailyRecord {
            date,
            precip,
            pet,
            observed,
        },
        unparsed,
    ))
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    get_optional(record, idx).ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_required_f64(s: &str, name: &str) -> Result<f64, String> {
    parse_opt_f64(Some(s)).ok_or_else(|| format!("Invalid `{name}` value '{s}'."))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // ISO is preferred; spreadsheet exports often use day-first dates.
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, YYYY/MM/DD."
    ))
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

fn row_error_report(errors: &[RowError]) -> AppError {
    let mut message = format!("{} invalid row(s) in input:", errors.len());
    for e in errors.iter().take(MAX_REPORTED_ROW_ERRORS) {
        message.push_str(&format!("\n  {e}"));
    }
    if errors.len() > MAX_REPORTED_ROW_ERRORS {
        message.push_str(&format!("\n  ... and {} more", errors.len() - MAX_REPORTED_ROW_ERRORS));
    }
    AppError::new(ErrorKind::Input, message)
}

/// `records` must be non-empty and sorted.
fn compute_stats(records: &[DailyRecord], invalid_observed: usize) -> DatasetStats {
    let mut gaps = 0;
    for pair in records.windows(2) {
        let step = (pair[1].date - pair[0].date).num_days();
        if step > 1 {
            gaps += 1;
            if gaps <= MAX_REPORTED_ROW_ERRORS {
                warn!(
                    "Calendar gap: {} missing day(s) between {} and {}.",
                    step - 1,
                    pair[0].date,
                    pair[1].date
                );
            }
        }
    }
    if gaps > MAX_REPORTED_ROW_ERRORS {
        warn!("{gaps} calendar gaps in total.");
    }

    DatasetStats {
        n_rows: records.len(),
        n_observed: records.iter().filter(|r| r.observed.is_some()).count(),
        first_date: records[0].date,
        last_date: records[records.len() - 1].date,
        gaps,
        invalid_observed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load(csv: &str, require_observed: bool) -> Result<IngestedData, AppError> {
        read_records(csv.as_bytes(), require_observed)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn reads_spanish_headers_and_missing_discharge() {
        let csv = "\u{feff}Fecha,P,E,Q\n2014-01-01,3.5,2.0,1.2\n2014-01-02,0,2.1,\n2014-01-03,0,2.2,n/a\n";
        let data = load(csv, true).unwrap();
        assert_eq!(data.records.len(), 3);
        assert_eq!(data.records[0].observed, Some(1.2));
        assert_eq!(data.records[1].observed, None);
        assert_eq!(data.records[2].observed, None);
        assert_eq!(data.stats.n_observed, 1);
        assert_eq!(data.stats.invalid_observed, 1);
        assert!(data.observed()[1].is_nan());
        assert!(data.has_observed);
    }

    #[test]
    fn accepts_aliases_and_date_formats() {
        let csv = "date,precip,pet,qobs\n31/12/2014,1,1,1\n2015/01/01,2,2,2\n02-01-2015,3,3,3\n";
        let data = load(csv, true).unwrap();
        assert_eq!(
            data.dates(),
            vec![date("2014-12-31"), date("2015-01-01"), date("2015-01-02")]
        );
        assert_eq!(data.precip(), vec![1.0, 2.0, 3.0]);
        assert_eq!(data.pet(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn sorts_rows_by_date() {
        let csv = "date,p,e,q\n2014-01-03,3,0,3\n2014-01-01,1,0,1\n2014-01-02,2,0,2\n";
        let data = load(csv, true).unwrap();
        assert_eq!(data.precip(), vec![1.0, 2.0, 3.0]);
        assert_eq!(data.stats.first_date, date("2014-01-01"));
        assert_eq!(data.stats.last_date, date("2014-01-03"));
    }

    #[test]
    fn bad_rows_fail_the_ingest_with_line_numbers() {
        let csv = "date,p,e,q\n2014-01-01,1,0,1\nnot-a-date,1,0,1\n2014-01-03,,0,1\n2014-01-04,1,abc,1\n";
        let err = load(csv, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.message().starts_with("3 invalid row(s)"));
        assert!(err.message().contains("line 3"));
        assert!(err.message().contains("line 4"));
        assert!(err.message().contains("line 5"));
    }

    #[test]
    fn unreadable_discharge_is_counted_as_missing() {
        let csv = "date,p,e,q\n\
                   2014-01-01,1,0,1.5\n\
                   2014-01-02,1,0,\"1,5\"\n\
                   2014-01-03,1,0,n/d\n\
                   2014-01-04,1,0,\n\
                   2014-01-05,1,0,NaN\n";
        let data = load(csv, true).unwrap();
        assert_eq!(data.records.len(), 5);
        assert_eq!(data.stats.n_observed, 1);
        assert_eq!(data.stats.invalid_observed, 2);
        assert_eq!(data.records[1].observed, None);
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let csv = "date,p,e,q\n2014-01-01,1,0,1\n01/01/2014,2,0,2\n";
        let err = load(csv, true).unwrap_err();
        assert!(err.message().contains("Duplicate date 2014-01-01"));
    }

    #[test]
    fn gaps_are_counted_not_rejected() {
        let csv = "date,p,e,q\n2014-01-01,1,0,1\n2014-01-05,1,0,1\n2014-01-06,1,0,1\n";
        let data = load(csv, true).unwrap();
        assert_eq!(data.stats.gaps, 1);
    }

    #[test]
    fn discharge_column_is_optional_for_simulation() {
        let csv = "date,p,e\n2014-01-01,1,0\n";
        let data = load(csv, false).unwrap();
        assert!(!data.has_observed);
        assert_eq!(data.records[0].observed, None);

        let err = load(csv, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.message().contains("`q`"));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let err = load("date,p,q\n2014-01-01,1,1\n", false).unwrap_err();
        assert!(err.message().contains("`evap`"));
    }

    #[test]
    fn empty_inputs_are_insufficient() {
        let err = load("date,p,e,q\n", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);

        let err = load("date,p,e,q\n2014-01-01,1,0,\n", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("basin.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "date,P,E,Q").unwrap();
        writeln!(f, "2014-01-01,5.0,1.0,0.8").unwrap();
        drop(f);

        let data = load_records(&path, true).unwrap();
        assert_eq!(data.rows_read, 1);
        assert_eq!(data.records[0].precip, 5.0);

        let missing = load_records(&dir.path().join("nope.csv"), true).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Input);
    }
}
