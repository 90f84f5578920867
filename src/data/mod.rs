//! Remote weather data and derived forcing.
//!
//! - Open-Meteo daily precipitation/temperature downloads (`meteo`)
//! - temperature-based evapotranspiration estimate (`pet`)

pub mod meteo;
pub mod pet;

pub use meteo::*;
pub use pet::*;
