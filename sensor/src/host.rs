use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{debug, info, warn};

use zonelight_common::{
    solar, WeatherCondition, TOPIC_SENSOR_ILLUMINANCE, TOPIC_SENSOR_SUN_ELEVATION,
    TOPIC_SENSOR_SUN_RISING, TOPIC_SENSOR_WEATHER,
};

/// Direct-beam contribution of a clear sky with the sun at zenith.
const CLEAR_ZENITH_LUX: f64 = 100_000.0;
/// Clear-sky reading with the sun on the horizon.
const CLEAR_HORIZON_LUX: f64 = 4_000.0;
/// Reading at the end of civil twilight (-6°).
const CIVIL_TWILIGHT_LUX: f64 = 3.4;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let latitude = env_coordinate("ZONELIGHT_LAT", 51.5, 90.0);
    let longitude = env_coordinate("ZONELIGHT_LON", -0.13, 180.0);
    let weather = match std::env::var("ZONELIGHT_WEATHER") {
        Ok(raw) => match raw.parse::<WeatherCondition>() {
            Ok(weather) => Some(weather),
            Err(err) => {
                warn!("{err}; publishing weather as unavailable");
                None
            }
        },
        Err(_) => None,
    };

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mut mqtt_options = MqttOptions::new("zonelight-sensor", mqtt_host, mqtt_port);

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!("sensor bridge started for {latitude:.3},{longitude:.3}");

    let mut interval = tokio::time::interval(Duration::from_secs(30));

    loop {
        interval.tick().await;

        let now = Utc::now();
        let elevation = solar::sun_elevation(now, latitude, longitude);
        let rising = solar::is_rising(now, latitude, longitude);
        let lux = estimate_lux(elevation, weather);
        debug!("elevation={elevation:.2} rising={rising} lux={lux:.1}");

        publish(&mqtt, TOPIC_SENSOR_SUN_ELEVATION, format!("{elevation:.2}")).await?;
        publish(&mqtt, TOPIC_SENSOR_SUN_RISING, rising.to_string()).await?;
        publish(&mqtt, TOPIC_SENSOR_ILLUMINANCE, format!("{lux:.1}")).await?;
        let weather_payload = weather.map_or("unavailable", WeatherCondition::as_str);
        publish(&mqtt, TOPIC_SENSOR_WEATHER, weather_payload.to_string()).await?;
    }
}

async fn publish(mqtt: &AsyncClient, topic: &str, payload: String) -> anyhow::Result<()> {
    mqtt.publish(topic, QoS::AtLeastOnce, true, payload)
        .await
        .with_context(|| format!("failed to publish {topic}"))
}

fn env_coordinate(key: &str, fallback: f64, limit: f64) -> f64 {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value.abs() <= limit => value,
            _ => {
                warn!("ignoring invalid {key}={raw}");
                fallback
            }
        },
        Err(_) => fallback,
    }
}

/// Outdoor illuminance for a clear sky, attenuated by cloud cover. Twilight
/// fades exponentially from the horizon value to the civil twilight value.
fn estimate_lux(elevation: f64, weather: Option<WeatherCondition>) -> f64 {
    let clear_sky = if elevation >= 0.0 {
        CLEAR_HORIZON_LUX + CLEAR_ZENITH_LUX * elevation.to_radians().sin()
    } else if elevation > -6.0 {
        let depth = -elevation / 6.0;
        CLEAR_HORIZON_LUX * (CIVIL_TWILIGHT_LUX / CLEAR_HORIZON_LUX).powf(depth)
    } else {
        0.0
    };

    clear_sky * weather.map_or(1.0, transmission)
}

fn transmission(weather: WeatherCondition) -> f64 {
    match weather {
        WeatherCondition::ClearNight | WeatherCondition::Sunny => 1.0,
        WeatherCondition::Windy => 0.9,
        WeatherCondition::PartlyCloudy | WeatherCondition::WindyVariant => 0.6,
        WeatherCondition::Cloudy => 0.35,
        WeatherCondition::Rainy | WeatherCondition::Lightning => 0.3,
        WeatherCondition::Snowy
        | WeatherCondition::SnowyRainy
        | WeatherCondition::LightningRainy
        | WeatherCondition::Exceptional => 0.25,
        WeatherCondition::Pouring | WeatherCondition::Hail => 0.2,
        WeatherCondition::Fog => 0.15,
    }
}
