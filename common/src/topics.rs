pub const TOPIC_SENSOR_ILLUMINANCE: &str = "zonelight/sensor/illuminance";
pub const TOPIC_SENSOR_WEATHER: &str = "zonelight/sensor/weather";
pub const TOPIC_SENSOR_SUN_ELEVATION: &str = "zonelight/sensor/sun_elevation";
pub const TOPIC_SENSOR_SUN_RISING: &str = "zonelight/sensor/sun_rising";
pub const TOPIC_SENSOR_WILDCARD: &str = "zonelight/sensor/#";

pub const TOPIC_CMD_MANUAL: &str = "zonelight/cmnd/manual";
pub const TOPIC_CMD_CLEAR: &str = "zonelight/cmnd/clear";
pub const TOPIC_CMD_SCENE: &str = "zonelight/cmnd/scene";
pub const TOPIC_CMD_WAKE: &str = "zonelight/cmnd/wake";
pub const TOPIC_CMD_ADJUST: &str = "zonelight/cmnd/adjust";
pub const TOPIC_CMD_WILDCARD: &str = "zonelight/cmnd/#";

pub const TOPIC_CONTROLLER_EVENTS: &str = "zonelight/controller/events";
pub const TOPIC_CONTROLLER_STATUS: &str = "zonelight/controller/status";

/// Largest payload accepted or published on any topic.
pub const MAX_PAYLOAD_BYTES: usize = 1024;

pub fn zone_state_topic(zone_id: &str) -> String {
    format!("zonelight/zone/{zone_id}/state")
}
