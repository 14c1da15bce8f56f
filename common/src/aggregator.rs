//! Combines the per-source offsets for one zone.
//!
//! Automated sources (environmental, dusk, wake) are filtered by the zone's
//! eligibility flags and manual state, then capped as a group. Manual and
//! scene offsets represent explicit intent and pass through uncapped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::{AggregatorConfig, WakeManualPolicy, ZoneConfig},
    scene::SceneOffsets,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostSource {
    Environmental,
    Dusk,
    Wake,
    /// Amount trimmed off the automated sum by the ceiling (always negative).
    Ceiling,
    Manual,
    Scene,
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoostResult {
    pub total: i32,
    pub breakdown: BTreeMap<BoostSource, i32>,
}

impl BoostResult {
    /// Adds a contribution. Zero contributions are not recorded.
    pub fn add(&mut self, source: BoostSource, amount: i32) {
        if amount == 0 {
            return;
        }
        self.total = self.total.saturating_add(amount);
        *self.breakdown.entry(source).or_insert(0) += amount;
    }

    pub fn get(&self, source: BoostSource) -> i32 {
        self.breakdown.get(&source).copied().unwrap_or(0)
    }
}

/// Raw calculator outputs for the current cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutomatedBoosts {
    pub environmental: i32,
    pub dusk: i32,
    pub wake: i32,
}

/// Per-zone manual deltas, set by adjustments and reset on clear or expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualDeltas {
    pub brightness: i32,
    pub warmth: i32,
}

impl ManualDeltas {
    pub fn is_zero(&self) -> bool {
        self.brightness == 0 && self.warmth == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedOffsets {
    pub brightness: BoostResult,
    pub warmth: BoostResult,
}

pub fn aggregate(
    zone: &ZoneConfig,
    manual_active: bool,
    boosts: &AutomatedBoosts,
    manual: &ManualDeltas,
    scene: &SceneOffsets,
    config: &AggregatorConfig,
    wake_policy: WakeManualPolicy,
) -> AggregatedOffsets {
    let mut brightness = BoostResult::default();

    let environmental = if zone.environmental_enabled && !manual_active {
        boosts.environmental.max(0)
    } else {
        0
    };
    let dusk = if zone.dusk_enabled && !manual_active {
        boosts.dusk.max(0)
    } else {
        0
    };
    let wake_allowed = match wake_policy {
        WakeManualPolicy::RespectManual => !manual_active,
        WakeManualPolicy::OverrideManual => true,
    };
    let wake = if zone.wake_enabled && wake_allowed {
        boosts.wake.max(0)
    } else {
        0
    };

    brightness.add(BoostSource::Environmental, environmental);
    brightness.add(BoostSource::Dusk, dusk);
    brightness.add(BoostSource::Wake, wake);

    let automated = environmental + dusk + wake;
    let ceiling = config.automated_ceiling.max(0);
    if automated > ceiling {
        brightness.add(BoostSource::Ceiling, ceiling - automated);
    }

    brightness.add(BoostSource::Manual, manual.brightness);
    brightness.add(BoostSource::Scene, scene.brightness);

    let mut warmth = BoostResult::default();
    warmth.add(BoostSource::Manual, manual.warmth);
    warmth.add(BoostSource::Scene, scene.warmth);

    AggregatedOffsets { brightness, warmth }
}
