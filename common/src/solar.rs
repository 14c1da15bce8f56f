//! NOAA sun position.
//!
//! Julian century -> mean longitude and anomaly -> equation of centre ->
//! apparent longitude -> declination and equation of time -> hour angle.
//! Everything is evaluated in UTC so no local timezone is involved.

use chrono::{DateTime, Duration, Utc};

const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;
const J2000: f64 = 2_451_545.0;

struct SolarParams {
    declination: f64,
    /// Minutes.
    equation_of_time: f64,
}

fn julian_century(when: DateTime<Utc>) -> f64 {
    let seconds = when.timestamp() as f64 + f64::from(when.timestamp_subsec_millis()) / 1_000.0;
    let julian_day = UNIX_EPOCH_JULIAN_DAY + seconds / 86_400.0;
    (julian_day - J2000) / 36_525.0
}

fn solar_params(jc: f64) -> SolarParams {
    let l0 = (280.46646 + jc * (36_000.76983 + 0.0003032 * jc)).rem_euclid(360.0);
    let m = 357.52911 + jc * (35_999.05029 - 0.0001537 * jc);
    let m_rad = m.to_radians();
    let e = 0.016708634 - jc * (0.000042037 + 0.0000001267 * jc);

    let centre = m_rad.sin() * (1.914602 - jc * (0.004817 + 0.000014 * jc))
        + (2.0 * m_rad).sin() * (0.019993 - 0.000101 * jc)
        + (3.0 * m_rad).sin() * 0.000289;

    let omega = 125.04 - 1_934.136 * jc;
    let apparent_longitude = l0 + centre - 0.00569 - 0.00478 * omega.to_radians().sin();

    let obliquity_mean = 23.0
        + (26.0 + (21.448 - jc * (46.815 + jc * (0.00059 - jc * 0.001813))) / 60.0) / 60.0;
    let obliquity = (obliquity_mean + 0.00256 * omega.to_radians().cos()).to_radians();

    let declination = (obliquity.sin() * apparent_longitude.to_radians().sin())
        .asin()
        .to_degrees();

    let l0_rad = l0.to_radians();
    let y = (obliquity / 2.0).tan().powi(2);
    let equation_of_time = 4.0
        * (y * (2.0 * l0_rad).sin() - 2.0 * e * m_rad.sin()
            + 4.0 * e * y * m_rad.sin() * (2.0 * l0_rad).cos()
            - 0.5 * y * y * (4.0 * l0_rad).sin()
            - 1.25 * e * e * (2.0 * m_rad).sin())
        .to_degrees();

    SolarParams {
        declination,
        equation_of_time,
    }
}

/// Sun elevation in degrees above the horizon, without refraction.
pub fn sun_elevation(when: DateTime<Utc>, latitude: f64, longitude: f64) -> f64 {
    let params = solar_params(julian_century(when));

    let minutes_utc = f64::from(when.timestamp().rem_euclid(86_400) as u32) / 60.0;
    let true_solar_time = minutes_utc + params.equation_of_time + 4.0 * longitude;

    let mut hour_angle = true_solar_time.rem_euclid(1_440.0) / 4.0 - 180.0;
    if hour_angle < -180.0 {
        hour_angle += 360.0;
    }

    let lat = latitude.to_radians();
    let declination = params.declination.to_radians();
    let cos_zenith = (lat.sin() * declination.sin()
        + lat.cos() * declination.cos() * hour_angle.to_radians().cos())
    .clamp(-1.0, 1.0);

    90.0 - cos_zenith.acos().to_degrees()
}

/// Whether the sun is climbing at `when`.
pub fn is_rising(when: DateTime<Utc>, latitude: f64, longitude: f64) -> bool {
    let later = when + Duration::minutes(5);
    sun_elevation(later, latitude, longitude) > sun_elevation(when, latitude, longitude)
}
