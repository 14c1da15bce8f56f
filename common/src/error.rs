use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("zone id cannot be empty")]
    EmptyZoneId,
    #[error("duplicate zone id `{0}`")]
    DuplicateZone(String),
    #[error("zone `{zone}`: brightness range {min}-{max}% is invalid")]
    InvalidBrightness { zone: String, min: u8, max: u8 },
    #[error("zone `{zone}`: warmth range needs both a minimum and a maximum")]
    PartialWarmth { zone: String },
    #[error("zone `{zone}`: warmth range {min}K-{max}K is invalid")]
    InvalidWarmth { zone: String, min: u32, max: u32 },
    #[error("zone `{zone}`: warmth range {min}K-{max}K is outside {min_kelvin}K-{max_kelvin}K")]
    WarmthOutOfLimits {
        zone: String,
        min: u32,
        max: u32,
        min_kelvin: u32,
        max_kelvin: u32,
    },
    #[error("scene name cannot be empty")]
    EmptySceneName,
    #[error("duplicate scene `{0}`")]
    DuplicateScene(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("unknown zone `{0}`")]
    UnknownZone(String),
    #[error("unknown scene `{0}`")]
    UnknownScene(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown weather condition `{0}`")]
pub struct UnknownWeatherCondition(pub String);
