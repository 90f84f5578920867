//! Open-Meteo integration for daily precipitation and temperature.
//!
//! Two endpoints share one response shape:
//! - the forecast API with an explicit historical/recent window
//! - the ECMWF API for up to 16 days ahead
//!
//! Responses are validated and turned into [`MeteoDay`] rows with the
//! evapotranspiration estimate filled in, so a download can be fed to the
//! simulator as-is.

use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::data::pet::oudin_pet;
use crate::error::{AppError, ErrorKind};

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
const OPEN_METEO_ECMWF_URL: &str = "https://api.open-meteo.com/v1/ecmwf";
const DAILY_VARIABLES: &str = "precipitation_sum,temperature_2m_max,temperature_2m_min";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shortest historical window the downloader accepts, in days (inclusive).
pub const MIN_WINDOW_DAYS: i64 = 10;
/// Longest forecast horizon the ECMWF endpoint serves.
pub const MAX_FORECAST_DAYS: u32 = 16;

/// One day of downloaded weather. `None` marks a value the API left null.
#[derive(Debug, Clone, PartialEq)]
pub struct MeteoDay {
    pub date: NaiveDate,
    /// Precipitation sum (mm).
    pub precip: Option<f64>,
    /// Daily maximum temperature at 2 m (°C).
    pub tmax: Option<f64>,
    /// Daily minimum temperature at 2 m (°C).
    pub tmin: Option<f64>,
    /// Mean of `tmax` and `tmin` (°C).
    pub tmean: Option<f64>,
    /// Potential evapotranspiration from `tmean` (mm/day).
    pub pet: Option<f64>,
}

/// A historical (or recent) daily download.
#[derive(Debug, Clone, PartialEq)]
pub struct MeteoRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub timezone: String,
}

impl MeteoRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_location(self.latitude, self.longitude)?;
        if self.start_date > self.end_date {
            return Err(AppError::new(
                ErrorKind::Input,
                format!(
                    "Start date {} is after end date {}.",
                    self.start_date, self.end_date
                ),
            ));
        }
        let days = (self.end_date - self.start_date).num_days() + 1;
        if days < MIN_WINDOW_DAYS {
            return Err(AppError::new(
                ErrorKind::Input,
                format!("The window must cover at least {MIN_WINDOW_DAYS} days; it covers {days}."),
            ));
        }
        Ok(())
    }
}

/// An ECMWF forecast download starting at `start_date`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub forecast_days: u32,
}

impl ForecastRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_location(self.latitude, self.longitude)?;
        if !(1..=MAX_FORECAST_DAYS).contains(&self.forecast_days) {
            return Err(AppError::new(
                ErrorKind::Input,
                format!(
                    "Forecast days must be between 1 and {MAX_FORECAST_DAYS} (got {}).",
                    self.forecast_days
                ),
            ));
        }
        Ok(())
    }

    /// Last forecast day, inclusive.
    pub fn end_date(&self) -> NaiveDate {
        self.start_date + chrono::Days::new(u64::from(self.forecast_days.saturating_sub(1)))
    }

    /// `forecast_YYYYMMDD.csv`, keyed by the start date.
    pub fn file_name(&self) -> String {
        format!("forecast_{}.csv", self.start_date.format("%Y%m%d"))
    }
}

fn validate_location(latitude: f64, longitude: f64) -> Result<(), AppError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::new(
            ErrorKind::Input,
            format!("Invalid location: latitude {latitude}, longitude {longitude}."),
        ));
    }
    Ok(())
}

pub struct MeteoClient {
    client: Client,
    forecast_url: String,
    ecmwf_url: String,
}

impl MeteoClient {
    /// Build a client; `OPEN_METEO_URL` / `OPEN_METEO_ECMWF_URL` (environment
    /// or `.env`) override the public endpoints.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let forecast_url = std::env::var("OPEN_METEO_URL").unwrap_or_else(|_| OPEN_METEO_URL.to_string());
        let ecmwf_url =
            std::env::var("OPEN_METEO_ECMWF_URL").unwrap_or_else(|_| OPEN_METEO_ECMWF_URL.to_string());
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::new(ErrorKind::Network, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            forecast_url,
            ecmwf_url,
        })
    }

    pub fn fetch_daily(&self, request: &MeteoRequest) -> Result<Vec<MeteoDay>, AppError> {
        request.validate()?;
        let query = [
            ("latitude", request.latitude.to_string()),
            ("longitude", request.longitude.to_string()),
            ("daily", DAILY_VARIABLES.to_string()),
            ("start_date", request.start_date.to_string()),
            ("end_date", request.end_date.to_string()),
            ("timezone", request.timezone.clone()),
        ];
        let body = self.get_daily(&self.forecast_url, &query)?;
        parse_daily(body, request.latitude)
    }

    pub fn fetch_forecast(&self, request: &ForecastRequest) -> Result<Vec<MeteoDay>, AppError> {
        request.validate()?;
        let query = [
            ("latitude", request.latitude.to_string()),
            ("longitude", request.longitude.to_string()),
            ("daily", DAILY_VARIABLES.to_string()),
            ("start_date", request.start_date.to_string()),
            ("end_date", request.end_date().to_string()),
            ("timezone", "UTC".to_string()),
        ];
        let body = self.get_daily(&self.ecmwf_url, &query)?;
        parse_daily(body, request.latitude)
    }

    fn get_daily(&self, url: &str, query: &[(&str, String)]) -> Result<DailyResponse, AppError> {
        debug!("GET {url} {query:?}");
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| AppError::new(ErrorKind::Network, format!("Open-Meteo request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                ErrorKind::Network,
                format!("Open-Meteo request failed with status {}.", resp.status()),
            ));
        }

        resp.json()
            .map_err(|e| AppError::new(ErrorKind::Network, format!("Failed to parse Open-Meteo response: {e}")))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DailyResponse {
    #[serde(default)]
    daily: Option<DailyBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct DailyBlock {
    time: Option<Vec<String>>,
    precipitation_sum: Option<Vec<Option<f64>>>,
    temperature_2m_max: Option<Vec<Option<f64>>>,
    temperature_2m_min: Option<Vec<Option<f64>>>,
}

/// Validate a decoded response and build dated rows.
pub fn parse_daily(response: DailyResponse, latitude: f64) -> Result<Vec<MeteoDay>, AppError> {
    let daily = response.daily.ok_or_else(|| {
        AppError::new(
            ErrorKind::Network,
            "Unexpected Open-Meteo response: `daily` block not found.",
        )
    })?;

    let missing: Vec<&str> = [
        ("precipitation_sum", daily.precipitation_sum.is_none()),
        ("temperature_2m_max", daily.temperature_2m_max.is_none()),
        ("temperature_2m_min", daily.temperature_2m_min.is_none()),
        ("time", daily.time.is_none()),
    ]
    .into_iter()
    .filter_map(|(key, absent)| absent.then_some(key))
    .collect();

    let (Some(time), Some(precip), Some(tmax), Some(tmin)) = (
        daily.time,
        daily.precipitation_sum,
        daily.temperature_2m_max,
        daily.temperature_2m_min,
    ) else {
        return Err(AppError::new(
            ErrorKind::Network,
            format!(
                "Open-Meteo response is missing required keys: {}.",
                missing.join(", ")
            ),
        ));
    };

    if !(time.len() == precip.len() && time.len() == tmax.len() && time.len() == tmin.len()) {
        return Err(AppError::new(
            ErrorKind::Network,
            format!(
                "Open-Meteo daily arrays differ in length: time={}, precipitation_sum={}, temperature_2m_max={}, temperature_2m_min={}.",
                time.len(),
                precip.len(),
                tmax.len(),
                tmin.len()
            ),
        ));
    }

    time.iter()
        .zip(precip)
        .zip(tmax)
        .zip(tmin)
        .map(|(((raw_date, p), hi), lo)| {
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
                AppError::new(
                    ErrorKind::Network,
                    format!("Invalid Open-Meteo date '{raw_date}': {e}"),
                )
            })?;
            let tmean = match (hi, lo) {
                (Some(hi), Some(lo)) => Some((hi + lo) / 2.0),
                _ => None,
            };
            Ok(MeteoDay {
                date,
                precip: p,
                tmax: hi,
                tmin: lo,
                tmean,
                pet: tmean.map(|t| oudin_pet(t, date.ordinal(), latitude)),
            })
        })
        .collect()
}
