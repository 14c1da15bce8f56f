//! Horizon compensation for dark days.
//!
//! Active while the sun is within `window_deg` of the horizon and ambient
//! light is below the dark-day threshold. Fires on both crossings unless
//! `sunset_only` is set and the sun is known to be rising.

use crate::config::DuskConfig;

pub fn calculate(
    sun_elevation: Option<f64>,
    illuminance_lux: Option<f64>,
    sun_rising: Option<bool>,
    config: &DuskConfig,
) -> i32 {
    let Some(elevation) = sun_elevation.filter(|elevation| elevation.is_finite()) else {
        return 0;
    };
    let Some(lux) = illuminance_lux.filter(|lux| lux.is_finite() && *lux >= 0.0) else {
        return 0;
    };

    if elevation.abs() > config.window_deg || config.window_deg <= 0.0 {
        return 0;
    }
    if lux >= config.dark_lux_threshold {
        return 0;
    }
    if config.sunset_only && sun_rising == Some(true) {
        return 0;
    }

    let closeness = 1.0 - elevation.abs() / config.window_deg;
    let span = (config.max_boost - config.min_boost) as f64;
    let boost = config.min_boost as f64 + span * closeness;

    (boost.round() as i32).min(config.max_boost).max(0)
}
