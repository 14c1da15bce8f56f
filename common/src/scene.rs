use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, types::ZoneId};

/// Named preset that shifts zone ranges while it is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenePreset {
    pub name: String,
    pub brightness_offset: i32,
    pub warmth_offset: i32,
    /// Zones the preset applies to; empty means every zone.
    #[serde(default)]
    pub zones: Vec<ZoneId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneOffsets {
    pub brightness: i32,
    pub warmth: i32,
}

impl ScenePreset {
    pub fn new(name: impl Into<String>, brightness_offset: i32, warmth_offset: i32) -> Self {
        Self {
            name: name.into(),
            brightness_offset,
            warmth_offset,
            zones: Vec::new(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("all_lights", 0, 0),
            Self::new("no_spotlights", 15, 0),
            Self::new("evening_comfort", -30, -500),
            Self::new("ultra_dim", -50, -1_000),
        ]
    }

    pub fn applies_to(&self, zone_id: &str) -> bool {
        self.zones.is_empty() || self.zones.iter().any(|zone| zone == zone_id)
    }

    pub fn offsets_for(&self, zone_id: &str) -> SceneOffsets {
        if self.applies_to(zone_id) {
            SceneOffsets {
                brightness: self.brightness_offset,
                warmth: self.warmth_offset,
            }
        } else {
            SceneOffsets::default()
        }
    }
}

pub fn find<'a>(scenes: &'a [ScenePreset], name: &str) -> Option<&'a ScenePreset> {
    let name = name.trim();
    scenes
        .iter()
        .find(|scene| scene.name.eq_ignore_ascii_case(name))
}

pub fn validate_scenes(scenes: &[ScenePreset]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for scene in scenes {
        if scene.name.trim().is_empty() {
            return Err(ConfigError::EmptySceneName);
        }
        if !seen.insert(scene.name.to_ascii_lowercase()) {
            return Err(ConfigError::DuplicateScene(scene.name.clone()));
        }
    }
    Ok(())
}
