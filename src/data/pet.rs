//! Potential evapotranspiration from air temperature (Oudin et al., 2005).
//!
//! `PE = Re / (λ ρ) * (T + 5) / 100` (m/day, reported in mm/day), zero when
//! `T <= -5 °C`, where `Re` is the extraterrestrial radiation for the day of
//! year and latitude.

use std::f64::consts::PI;

/// Solar constant (MJ m^-2 min^-1).
const SOLAR_CONSTANT: f64 = 0.082;
/// Water density (kg m^-3).
const WATER_DENSITY: f64 = 1000.0;

/// Extraterrestrial radiation (MJ m^-2 day^-1).
pub fn extraterrestrial_radiation(day_of_year: u32, latitude_deg: f64) -> f64 {
    let lat = latitude_deg.to_radians();
    let doy = f64::from(day_of_year);
    let declination = 0.409 * (2.0 * PI / 365.0 * doy - 1.39).sin();
    let inv_distance = 1.0 + 0.033 * (2.0 * PI / 365.0 * doy).cos();
    let sunset_angle = (-lat.tan() * declination.tan()).clamp(-1.0, 1.0).acos();
    24.0 * 60.0 / PI
        * SOLAR_CONSTANT
        * inv_distance
        * (sunset_angle * lat.sin() * declination.sin()
            + lat.cos() * declination.cos() * sunset_angle.sin())
}

/// Daily potential evapotranspiration (mm/day) from mean temperature (°C).
pub fn oudin_pet(mean_temp: f64, day_of_year: u32, latitude_deg: f64) -> f64 {
    if mean_temp + 5.0 <= 0.0 {
        return 0.0;
    }
    // Latent heat of vaporization (MJ/kg).
    let lambda = 2.501 - 0.002361 * mean_temp;
    let re = extraterrestrial_radiation(day_of_year, latitude_deg);
    (re / (lambda * WATER_DENSITY) * (mean_temp + 5.0) / 100.0 * 1000.0).max(0.0)
}
