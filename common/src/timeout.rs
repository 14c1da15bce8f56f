use chrono::Duration;

use crate::config::TimeoutConfig;

/// How long a manual override should hold, given current conditions.
pub fn compute(
    sun_elevation: Option<f64>,
    environmental_boost: i32,
    config: &TimeoutConfig,
) -> Duration {
    let mut minutes = config.base_minutes as f64;

    if sun_elevation.is_some_and(|elevation| elevation < config.night_elevation) {
        minutes *= config.night_factor;
    }
    if environmental_boost > config.dim_boost_threshold {
        minutes *= config.dim_factor;
    }

    let capped = minutes.min(config.max_minutes as f64);
    Duration::seconds((capped * 60.0).round() as i64)
}
