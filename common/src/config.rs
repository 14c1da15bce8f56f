use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, scene::ScenePreset, types::ZoneId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub id: ZoneId,
    pub brightness_min_base: u8,
    pub brightness_max_base: u8,
    #[serde(default)]
    pub warmth_min_base: Option<u32>,
    #[serde(default)]
    pub warmth_max_base: Option<u32>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub environmental_enabled: bool,
    #[serde(default = "default_true")]
    pub dusk_enabled: bool,
    #[serde(default = "default_true")]
    pub wake_enabled: bool,
    /// Minutes before the wake anchor at which this zone's ramp completes.
    #[serde(default)]
    pub wake_lead_minutes: u32,
}

fn default_true() -> bool {
    true
}

impl ZoneConfig {
    pub fn new(id: impl Into<ZoneId>, brightness_min_base: u8, brightness_max_base: u8) -> Self {
        Self {
            id: id.into(),
            brightness_min_base,
            brightness_max_base,
            warmth_min_base: None,
            warmth_max_base: None,
            enabled: true,
            environmental_enabled: true,
            dusk_enabled: true,
            wake_enabled: true,
            wake_lead_minutes: 0,
        }
    }

    pub fn with_warmth(mut self, min_kelvin: u32, max_kelvin: u32) -> Self {
        self.warmth_min_base = Some(min_kelvin);
        self.warmth_max_base = Some(max_kelvin);
        self
    }

    pub fn warmth_range(&self) -> Option<(u32, u32)> {
        self.warmth_min_base.zip(self.warmth_max_base)
    }

    /// Warmth bases must sit inside `limits` so adjustment never moves the
    /// unadjusted side off its base.
    pub fn validate(&self, limits: &WarmthLimits) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyZoneId);
        }

        if self.brightness_min_base >= self.brightness_max_base || self.brightness_max_base > 100
        {
            return Err(ConfigError::InvalidBrightness {
                zone: self.id.clone(),
                min: self.brightness_min_base,
                max: self.brightness_max_base,
            });
        }

        match (self.warmth_min_base, self.warmth_max_base) {
            (None, None) => Ok(()),
            (Some(min), Some(max)) if min < max => {
                if min < limits.min_kelvin || max > limits.max_kelvin {
                    return Err(ConfigError::WarmthOutOfLimits {
                        zone: self.id.clone(),
                        min,
                        max,
                        min_kelvin: limits.min_kelvin,
                        max_kelvin: limits.max_kelvin,
                    });
                }
                Ok(())
            }
            (Some(min), Some(max)) => Err(ConfigError::InvalidWarmth {
                zone: self.id.clone(),
                min,
                max,
            }),
            _ => Err(ConfigError::PartialWarmth {
                zone: self.id.clone(),
            }),
        }
    }
}

pub fn validate_zones(zones: &[ZoneConfig], limits: &WarmthLimits) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for zone in zones {
        zone.validate(limits)?;
        if !seen.insert(zone.id.as_str()) {
            return Err(ConfigError::DuplicateZone(zone.id.clone()));
        }
    }
    Ok(())
}

pub fn default_zones() -> Vec<ZoneConfig> {
    vec![
        ZoneConfig::new("main_living", 45, 100).with_warmth(2250, 2950),
        ZoneConfig::new("kitchen_island", 30, 100).with_warmth(2000, 4000),
        ZoneConfig::new("bedroom_primary", 20, 40).with_warmth(1800, 2250),
        ZoneConfig {
            dusk_enabled: false,
            ..ZoneConfig::new("accent_spots", 20, 50).with_warmth(2000, 2700)
        },
        ZoneConfig::new("recessed_ceiling", 2, 23).with_warmth(1800, 2250),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentalConfig {
    pub max_boost: i32,
    pub winter_boost: i32,
    pub summer_penalty: i32,
    /// Below this elevation the boost is suppressed entirely.
    pub night_elevation: f64,
    /// At or above this elevation the full boost applies.
    pub day_elevation: f64,
    pub twilight_multiplier: f64,
}

impl Default for EnvironmentalConfig {
    fn default() -> Self {
        Self {
            max_boost: 25,
            winter_boost: 8,
            summer_penalty: -3,
            night_elevation: -6.0,
            day_elevation: 6.0,
            twilight_multiplier: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuskConfig {
    pub window_deg: f64,
    pub dark_lux_threshold: f64,
    pub min_boost: i32,
    pub max_boost: i32,
    pub sunset_only: bool,
}

impl Default for DuskConfig {
    fn default() -> Self {
        Self {
            window_deg: 4.0,
            dark_lux_threshold: 3_000.0,
            min_boost: 5,
            max_boost: 25,
            sunset_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WakeManualPolicy {
    /// A zone under manual control receives no wake boost.
    #[default]
    RespectManual,
    /// The wake ramp still applies to a target zone under manual control.
    OverrideManual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    pub target_zone: Option<ZoneId>,
    pub ramp_minutes: u32,
    pub max_boost: i32,
    pub manual_policy: WakeManualPolicy,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            target_zone: Some("bedroom_primary".to_string()),
            ramp_minutes: 15,
            max_boost: 20,
            manual_policy: WakeManualPolicy::RespectManual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub base_minutes: u32,
    pub night_elevation: f64,
    pub night_factor: f64,
    pub dim_boost_threshold: i32,
    pub dim_factor: f64,
    pub max_minutes: u32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            base_minutes: 30,
            night_elevation: -6.0,
            night_factor: 1.5,
            dim_boost_threshold: 10,
            dim_factor: 1.3,
            max_minutes: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Ceiling for the summed environmental, dusk and wake boosts.
    pub automated_ceiling: i32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            automated_ceiling: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentConfig {
    pub brightness_step: i32,
    pub warmth_step_k: i32,
    pub brightness_limit: i32,
    pub warmth_limit_k: i32,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            brightness_step: 10,
            warmth_step_k: 500,
            brightness_limit: 100,
            warmth_limit_k: 2_500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmthLimits {
    pub min_kelvin: u32,
    pub max_kelvin: u32,
}

impl Default for WarmthLimits {
    fn default() -> Self {
        Self {
            min_kelvin: 1_500,
            max_kelvin: 6_500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub environmental: EnvironmentalConfig,
    pub dusk: DuskConfig,
    pub wake: WakeConfig,
    pub timeout: TimeoutConfig,
    pub aggregator: AggregatorConfig,
    pub adjustment: AdjustmentConfig,
    pub warmth_limits_k: WarmthLimits,
    pub tick_interval_secs: u64,
    pub recompute_debounce_ms: u64,
    pub manual_debounce_ms: u64,
    pub sensor_stale_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environmental: EnvironmentalConfig::default(),
            dusk: DuskConfig::default(),
            wake: WakeConfig::default(),
            timeout: TimeoutConfig::default(),
            aggregator: AggregatorConfig::default(),
            adjustment: AdjustmentConfig::default(),
            warmth_limits_k: WarmthLimits::default(),
            tick_interval_secs: 30,
            recompute_debounce_ms: 250,
            manual_debounce_ms: 2_000,
            sensor_stale_timeout_secs: 900,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub zones: Vec<ZoneConfig>,
    pub scenes: Vec<ScenePreset>,
    pub timezone: String,
    pub network: NetworkConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            zones: default_zones(),
            scenes: ScenePreset::defaults(),
            timezone: "America/Los_Angeles".to_string(),
            network: NetworkConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.engine.sanitize();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_zones(&self.zones, &self.engine.warmth_limits_k)?;
        crate::scene::validate_scenes(&self.scenes)
    }
}

impl EngineConfig {
    pub fn sanitize(&mut self) {
        self.environmental.sanitize();
        self.dusk.sanitize();
        self.wake.sanitize();
        self.timeout.sanitize();
        self.aggregator.automated_ceiling = self.aggregator.automated_ceiling.clamp(0, 100);
        self.adjustment.sanitize();
        self.warmth_limits_k.sanitize();
        self.tick_interval_secs = self.tick_interval_secs.clamp(5, 300);
        self.recompute_debounce_ms = self.recompute_debounce_ms.min(5_000);
        self.manual_debounce_ms = self.manual_debounce_ms.min(60_000);
        self.sensor_stale_timeout_secs = self.sensor_stale_timeout_secs.max(60);
    }
}

impl EnvironmentalConfig {
    pub fn sanitize(&mut self) {
        self.max_boost = self.max_boost.clamp(0, 25);
        self.winter_boost = self.winter_boost.clamp(0, 25);
        self.summer_penalty = self.summer_penalty.clamp(-25, 0);
        self.night_elevation = finite_or(self.night_elevation, -6.0).clamp(-18.0, 0.0);
        self.day_elevation = finite_or(self.day_elevation, 6.0).clamp(0.0, 30.0);
        self.twilight_multiplier = finite_or(self.twilight_multiplier, 0.7).clamp(0.0, 1.0);
    }
}

impl DuskConfig {
    pub fn sanitize(&mut self) {
        self.window_deg = finite_or(self.window_deg, 4.0).clamp(0.5, 15.0);
        self.dark_lux_threshold = finite_or(self.dark_lux_threshold, 3_000.0).max(0.0);
        self.max_boost = self.max_boost.clamp(0, 25);
        self.min_boost = self.min_boost.clamp(0, self.max_boost);
    }
}

impl WakeConfig {
    pub fn sanitize(&mut self) {
        self.ramp_minutes = self.ramp_minutes.clamp(1, 120);
        self.max_boost = self.max_boost.clamp(0, 100);
        if self
            .target_zone
            .as_ref()
            .is_some_and(|zone| zone.trim().is_empty())
        {
            self.target_zone = None;
        }
    }
}

impl TimeoutConfig {
    pub fn sanitize(&mut self) {
        self.max_minutes = self.max_minutes.clamp(1, 24 * 60);
        self.base_minutes = self.base_minutes.clamp(1, self.max_minutes);
        self.night_elevation = finite_or(self.night_elevation, -6.0).clamp(-18.0, 6.0);
        self.night_factor = finite_or(self.night_factor, 1.5).clamp(1.0, 4.0);
        self.dim_factor = finite_or(self.dim_factor, 1.3).clamp(1.0, 4.0);
        self.dim_boost_threshold = self.dim_boost_threshold.clamp(0, 25);
    }
}

impl AdjustmentConfig {
    pub fn sanitize(&mut self) {
        self.brightness_limit = self.brightness_limit.clamp(0, 100);
        self.warmth_limit_k = self.warmth_limit_k.clamp(0, 5_000);
        self.brightness_step = self.brightness_step.clamp(1, 50);
        self.warmth_step_k = self.warmth_step_k.clamp(50, 2_500);
    }
}

impl WarmthLimits {
    pub fn sanitize(&mut self) {
        self.min_kelvin = self.min_kelvin.clamp(1_000, 10_000);
        self.max_kelvin = self.max_kelvin.clamp(1_000, 10_000);
        if self.min_kelvin >= self.max_kelvin {
            *self = Self::default();
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
