//! Inbound MQTT payload parsing.

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use zonelight_common::{
    config::AdjustmentConfig, AnchorSource, CoordinatorEvent, WeatherCondition, ZoneTarget,
    TOPIC_SENSOR_ILLUMINANCE, TOPIC_SENSOR_SUN_ELEVATION, TOPIC_SENSOR_SUN_RISING,
    TOPIC_SENSOR_WEATHER,
};

/// A single sensor reading. `None` marks the sensor as unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorUpdate {
    Illuminance(Option<f64>),
    Weather(Option<WeatherCondition>),
    SunElevation(Option<f64>),
    SunRising(Option<bool>),
}

#[derive(Debug, Deserialize)]
struct ManualPayload {
    zone: String,
    #[serde(default)]
    minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct WakePayload {
    /// Unix seconds; absent or null clears the anchor.
    #[serde(default)]
    pub anchor: Option<i64>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub source: Option<AnchorSource>,
}

impl WakePayload {
    pub fn into_event(self, default_source: AnchorSource) -> anyhow::Result<CoordinatorEvent> {
        let anchor_time = self.anchor.map(epoch_to_utc).transpose()?;
        Ok(CoordinatorEvent::WakeAnchorUpdated {
            anchor_time,
            skip: self.skip,
            source: self.source.unwrap_or(default_source),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AdjustPayload {
    #[serde(default)]
    zone: Option<String>,
    #[serde(default)]
    brightness: i32,
    #[serde(default)]
    warmth: i32,
}

pub fn parse_sensor(topic: &str, message: &str) -> anyhow::Result<SensorUpdate> {
    let value = message.trim();
    let unavailable = is_unavailable(value);

    match topic {
        TOPIC_SENSOR_ILLUMINANCE => {
            if unavailable {
                return Ok(SensorUpdate::Illuminance(None));
            }
            let lux = value
                .parse::<f64>()
                .with_context(|| format!("invalid illuminance `{value}`"))?;
            if !lux.is_finite() || lux < 0.0 {
                bail!("illuminance out of range: {lux}");
            }
            Ok(SensorUpdate::Illuminance(Some(lux)))
        }
        TOPIC_SENSOR_WEATHER => {
            if unavailable {
                return Ok(SensorUpdate::Weather(None));
            }
            Ok(SensorUpdate::Weather(Some(value.parse::<WeatherCondition>()?)))
        }
        TOPIC_SENSOR_SUN_ELEVATION => {
            if unavailable {
                return Ok(SensorUpdate::SunElevation(None));
            }
            let elevation = value
                .parse::<f64>()
                .with_context(|| format!("invalid sun elevation `{value}`"))?;
            if !elevation.is_finite() || !(-90.0..=90.0).contains(&elevation) {
                bail!("sun elevation out of range: {elevation}");
            }
            Ok(SensorUpdate::SunElevation(Some(elevation)))
        }
        TOPIC_SENSOR_SUN_RISING => {
            if unavailable {
                return Ok(SensorUpdate::SunRising(None));
            }
            let rising = match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "rising" => true,
                "false" | "0" | "off" | "setting" => false,
                other => bail!("invalid sun direction `{other}`"),
            };
            Ok(SensorUpdate::SunRising(Some(rising)))
        }
        _ => Err(anyhow!("not a sensor topic: {topic}")),
    }
}

pub fn parse_manual(message: &str) -> anyhow::Result<CoordinatorEvent> {
    let message = message.trim();
    let (zone_id, minutes) = if message.starts_with('{') {
        let payload: ManualPayload =
            serde_json::from_str(message).context("invalid manual payload")?;
        (payload.zone, payload.minutes)
    } else {
        (message.to_string(), None)
    };

    let zone_id = zone_id.trim().to_string();
    if zone_id.is_empty() {
        bail!("manual payload names no zone");
    }

    Ok(CoordinatorEvent::ManualChangeDetected {
        zone_id,
        duration: minutes
            .filter(|minutes| *minutes > 0)
            .map(|minutes| Duration::minutes(i64::from(minutes))),
    })
}

pub fn parse_clear(message: &str) -> CoordinatorEvent {
    CoordinatorEvent::ClearManual(ZoneTarget::parse(message))
}

pub fn parse_scene(message: &str) -> CoordinatorEvent {
    let name = message.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") || name.eq_ignore_ascii_case("clear") {
        CoordinatorEvent::SceneCleared
    } else {
        CoordinatorEvent::SceneSelected(name.to_string())
    }
}

pub fn parse_wake(message: &str) -> anyhow::Result<CoordinatorEvent> {
    let message = message.trim();
    match message.to_ascii_lowercase().as_str() {
        "skip" => return Ok(CoordinatorEvent::WakeSkipNext),
        "clear" | "none" => return Ok(CoordinatorEvent::WakeCleared),
        _ => {}
    }

    if let Ok(epoch) = message.parse::<i64>() {
        return Ok(CoordinatorEvent::WakeAnchorUpdated {
            anchor_time: Some(epoch_to_utc(epoch)?),
            skip: false,
            source: AnchorSource::Alarm,
        });
    }

    let payload: WakePayload = serde_json::from_str(message).context("invalid wake payload")?;
    payload.into_event(AnchorSource::Alarm)
}

pub fn parse_adjust(message: &str, steps: &AdjustmentConfig) -> anyhow::Result<CoordinatorEvent> {
    let message = message.trim();
    let keyword = |brightness_delta, warmth_delta| CoordinatorEvent::Adjust {
        target: ZoneTarget::All,
        brightness_delta,
        warmth_delta,
    };

    match message.to_ascii_lowercase().as_str() {
        "brighter" => return Ok(keyword(steps.brightness_step, 0)),
        "dimmer" => return Ok(keyword(-steps.brightness_step, 0)),
        "cooler" => return Ok(keyword(0, steps.warmth_step_k)),
        "warmer" => return Ok(keyword(0, -steps.warmth_step_k)),
        "reset" => return Ok(CoordinatorEvent::ClearManual(ZoneTarget::All)),
        _ => {}
    }

    let payload: AdjustPayload =
        serde_json::from_str(message).with_context(|| format!("invalid adjust payload `{message}`"))?;
    Ok(CoordinatorEvent::Adjust {
        target: payload
            .zone
            .as_deref()
            .map(ZoneTarget::parse)
            .unwrap_or(ZoneTarget::All),
        brightness_delta: payload.brightness,
        warmth_delta: payload.warmth,
    })
}

pub fn epoch_to_utc(epoch: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0).ok_or_else(|| anyhow!("timestamp out of range: {epoch}"))
}

fn is_unavailable(value: &str) -> bool {
    value.is_empty()
        || value.eq_ignore_ascii_case("unavailable")
        || value.eq_ignore_ascii_case("unknown")
}
