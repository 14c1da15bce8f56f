pub mod aggregator;
pub mod boundary;
pub mod config;
pub mod coordinator;
pub mod dusk;
pub mod environmental;
pub mod error;
pub mod manual;
pub mod persist;
pub mod scene;
pub mod solar;
pub mod timeout;
pub mod topics;
pub mod types;
pub mod wake;

pub use aggregator::{BoostResult, BoostSource, ManualDeltas};
pub use config::{EngineConfig, RuntimeConfig, ZoneConfig};
pub use coordinator::{
    Coordinator, CoordinatorEvent, CoordinatorStatus, CycleReport, EventOutcome, ZoneTarget,
};
pub use error::{ConfigError, CoordinatorError};
pub use persist::PersistedState;
pub use scene::ScenePreset;
pub use topics::*;
pub use types::{
    CycleInputs, ManualControlState, Notification, SensorSnapshot, WeatherCondition, ZoneId,
    ZoneResult,
};
pub use wake::{AnchorSource, WakeAnchor};
