use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{aggregator::BoostResult, error::UnknownWeatherCondition};

pub type ZoneId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherCondition {
    #[serde(rename = "clear-night")]
    ClearNight,
    #[serde(rename = "sunny")]
    Sunny,
    #[serde(rename = "partlycloudy")]
    PartlyCloudy,
    #[serde(rename = "cloudy")]
    Cloudy,
    #[serde(rename = "windy")]
    Windy,
    #[serde(rename = "windy-variant")]
    WindyVariant,
    #[serde(rename = "fog")]
    Fog,
    #[serde(rename = "rainy")]
    Rainy,
    #[serde(rename = "pouring")]
    Pouring,
    #[serde(rename = "lightning")]
    Lightning,
    #[serde(rename = "lightning-rainy")]
    LightningRainy,
    #[serde(rename = "snowy")]
    Snowy,
    #[serde(rename = "snowy-rainy")]
    SnowyRainy,
    #[serde(rename = "hail")]
    Hail,
    #[serde(rename = "exceptional")]
    Exceptional,
}

impl WeatherCondition {
    pub const ALL: [Self; 15] = [
        Self::ClearNight,
        Self::Sunny,
        Self::PartlyCloudy,
        Self::Cloudy,
        Self::Windy,
        Self::WindyVariant,
        Self::Fog,
        Self::Rainy,
        Self::Pouring,
        Self::Lightning,
        Self::LightningRainy,
        Self::Snowy,
        Self::SnowyRainy,
        Self::Hail,
        Self::Exceptional,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClearNight => "clear-night",
            Self::Sunny => "sunny",
            Self::PartlyCloudy => "partlycloudy",
            Self::Cloudy => "cloudy",
            Self::Windy => "windy",
            Self::WindyVariant => "windy-variant",
            Self::Fog => "fog",
            Self::Rainy => "rainy",
            Self::Pouring => "pouring",
            Self::Lightning => "lightning",
            Self::LightningRainy => "lightning-rainy",
            Self::Snowy => "snowy",
            Self::SnowyRainy => "snowy-rainy",
            Self::Hail => "hail",
            Self::Exceptional => "exceptional",
        }
    }
}

impl FromStr for WeatherCondition {
    type Err = UnknownWeatherCondition;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|condition| condition.as_str() == normalized)
            .ok_or_else(|| UnknownWeatherCondition(raw.trim().to_string()))
    }
}

/// Latest ambient readings. Every field is optional; calculators treat a
/// missing or unusable reading as contributing nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    #[serde(rename = "illuminanceLux")]
    pub illuminance_lux: Option<f64>,
    pub weather: Option<WeatherCondition>,
    #[serde(rename = "sunElevation")]
    pub sun_elevation: Option<f64>,
    #[serde(rename = "sunRising")]
    pub sun_rising: Option<bool>,
}

impl SensorSnapshot {
    pub fn usable_lux(&self) -> Option<f64> {
        self.illuminance_lux
            .filter(|lux| lux.is_finite() && *lux >= 0.0)
    }

    pub fn usable_elevation(&self) -> Option<f64> {
        self.sun_elevation
            .filter(|elevation| elevation.is_finite() && (-90.0..=90.0).contains(elevation))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleInputs {
    pub now: DateTime<Utc>,
    /// Calendar month (1-12) in the installation's local timezone.
    pub month: Option<u32>,
    pub sensors: SensorSnapshot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManualControlState {
    #[default]
    Automatic,
    Manual {
        #[serde(rename = "startedAt")]
        started_at: DateTime<Utc>,
        #[serde(rename = "expiresAt")]
        expires_at: DateTime<Utc>,
    },
}

impl ManualControlState {
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual { .. })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Manual { expires_at, .. } => Some(*expires_at),
            Self::Automatic => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputedBoundaries {
    pub brightness_min: u8,
    pub brightness_max: u8,
    pub warmth_min: Option<u32>,
    pub warmth_max: Option<u32>,
    pub degraded_brightness: bool,
    pub degraded_warmth: bool,
}

impl ComputedBoundaries {
    pub fn degraded_range(&self) -> bool {
        self.degraded_brightness || self.degraded_warmth
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneResult {
    #[serde(rename = "zoneId")]
    pub zone_id: ZoneId,
    pub enabled: bool,
    #[serde(rename = "brightnessMin")]
    pub brightness_min: u8,
    #[serde(rename = "brightnessMax")]
    pub brightness_max: u8,
    #[serde(rename = "warmthMin")]
    pub warmth_min: Option<u32>,
    #[serde(rename = "warmthMax")]
    pub warmth_max: Option<u32>,
    #[serde(rename = "manualActive")]
    pub manual_active: bool,
    #[serde(rename = "manualExpiresAt")]
    pub manual_expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "degradedRange")]
    pub degraded_range: bool,
    pub brightness: BoostResult,
    pub warmth: BoostResult,
    pub changed: bool,
}

impl ZoneResult {
    /// Compares only what the downstream driver acts on.
    pub fn same_output(&self, other: &Self) -> bool {
        self.enabled == other.enabled
            && self.brightness_min == other.brightness_min
            && self.brightness_max == other.brightness_max
            && self.warmth_min == other.warmth_min
            && self.warmth_max == other.warmth_max
            && self.manual_active == other.manual_active
            && self.degraded_range == other.degraded_range
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    ManualOverrideStarted {
        #[serde(rename = "zoneId")]
        zone_id: ZoneId,
        #[serde(rename = "expiresAt")]
        expires_at: DateTime<Utc>,
    },
    ManualOverrideExtended {
        #[serde(rename = "zoneId")]
        zone_id: ZoneId,
        #[serde(rename = "expiresAt")]
        expires_at: DateTime<Utc>,
    },
    ManualOverrideExpired {
        #[serde(rename = "zoneId")]
        zone_id: ZoneId,
    },
    ManualOverrideCleared {
        #[serde(rename = "zoneId")]
        zone_id: ZoneId,
    },
    DegradedRange {
        #[serde(rename = "zoneId")]
        zone_id: ZoneId,
    },
    WakeAnchorPassed {
        #[serde(rename = "anchorTime")]
        anchor_time: DateTime<Utc>,
    },
    BoundariesRecomputed {
        #[serde(rename = "cycleAt")]
        cycle_at: DateTime<Utc>,
    },
}

impl Notification {
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::DegradedRange { .. })
    }
}
