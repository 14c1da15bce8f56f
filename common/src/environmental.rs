//! Ambient-light and weather compensation.
//!
//! Lux, weather and season contributions are summed, scaled by how far the
//! sun is above the horizon, and clamped to `[0, max_boost]`.

use crate::{config::EnvironmentalConfig, types::WeatherCondition};

// (upper bound exclusive, boost), checked in order.
const LUX_STEPS: [(f64, i32); 6] = [
    (10.0, 15),
    (25.0, 10),
    (50.0, 7),
    (100.0, 5),
    (200.0, 3),
    (400.0, 1),
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvironmentalInputs {
    pub illuminance_lux: Option<f64>,
    pub weather: Option<WeatherCondition>,
    pub month: Option<u32>,
    pub sun_elevation: Option<f64>,
}

pub fn calculate(inputs: &EnvironmentalInputs, config: &EnvironmentalConfig) -> i32 {
    let raw = lux_boost(inputs.illuminance_lux)
        + inputs.weather.map(weather_boost).unwrap_or(0)
        + seasonal_boost(inputs.month, config);
    let scaled = time_multiplier(inputs.sun_elevation, config) * raw as f64;

    (scaled.round() as i32).min(config.max_boost).max(0)
}

pub fn lux_boost(illuminance_lux: Option<f64>) -> i32 {
    let Some(lux) = illuminance_lux.filter(|lux| lux.is_finite() && *lux >= 0.0) else {
        return 0;
    };

    LUX_STEPS
        .iter()
        .find(|(below, _)| lux < *below)
        .map(|(_, boost)| *boost)
        .unwrap_or(0)
}

pub fn weather_boost(condition: WeatherCondition) -> i32 {
    match condition {
        WeatherCondition::Fog => 20,
        WeatherCondition::Pouring | WeatherCondition::Hail => 18,
        WeatherCondition::Snowy
        | WeatherCondition::SnowyRainy
        | WeatherCondition::LightningRainy
        | WeatherCondition::Exceptional => 15,
        WeatherCondition::Rainy | WeatherCondition::Lightning => 12,
        WeatherCondition::Cloudy => 10,
        WeatherCondition::PartlyCloudy | WeatherCondition::WindyVariant => 5,
        WeatherCondition::Windy => 2,
        WeatherCondition::Sunny | WeatherCondition::ClearNight => 0,
    }
}

pub fn seasonal_boost(month: Option<u32>, config: &EnvironmentalConfig) -> i32 {
    match month {
        Some(12 | 1 | 2) => config.winter_boost,
        Some(6..=8) => config.summer_penalty,
        _ => 0,
    }
}

pub fn time_multiplier(sun_elevation: Option<f64>, config: &EnvironmentalConfig) -> f64 {
    match sun_elevation.filter(|elevation| elevation.is_finite()) {
        None => 0.0,
        Some(elevation) if elevation < config.night_elevation => 0.0,
        Some(elevation) if elevation < config.day_elevation => config.twilight_multiplier,
        Some(_) => 1.0,
    }
}
