//! Durable state layout.
//!
//! Loading is lenient per entry: a corrupt timer or adjustment entry is
//! dropped on its own so the affected zone falls back to automatic control
//! while the rest of the file still loads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{types::ZoneId, wake::WakeAnchor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManualStateKind {
    #[default]
    Automatic,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedZoneTimer {
    pub zone_id: ZoneId,
    pub manual_state: ManualStateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PersistedZoneTimer {
    pub fn automatic(zone_id: &str) -> Self {
        Self {
            zone_id: zone_id.to_string(),
            manual_state: ManualStateKind::Automatic,
            started_at: None,
            expires_at: None,
        }
    }

    fn is_well_formed(&self) -> bool {
        if self.zone_id.trim().is_empty() {
            return false;
        }
        match self.manual_state {
            ManualStateKind::Automatic => true,
            ManualStateKind::Manual => self.expires_at.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAdjustment {
    pub zone_id: ZoneId,
    #[serde(default)]
    pub brightness: i32,
    #[serde(default)]
    pub warmth: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub timers: Vec<PersistedZoneTimer>,
    #[serde(default)]
    pub wake: WakeAnchor,
    #[serde(default)]
    pub adjustments: Vec<PersistedAdjustment>,
    #[serde(default)]
    pub scene: Option<String>,
}

impl PersistedState {
    /// Parses what it can. Returns the state together with the number of
    /// entries that had to be dropped. Fails only if the document itself is
    /// not a JSON object.
    pub fn from_slice_lenient(raw: &[u8]) -> Result<(Self, usize), serde_json::Error> {
        let value: Value = serde_json::from_slice(raw)?;
        let Value::Object(mut root) = value else {
            return Err(serde::de::Error::custom("state document is not an object"));
        };

        let mut dropped = 0;

        let timers = take_entries::<PersistedZoneTimer>(&mut root, "timers", &mut dropped)
            .into_iter()
            .filter(|timer| {
                let keep = timer.is_well_formed();
                if !keep {
                    dropped += 1;
                }
                keep
            })
            .collect();

        let adjustments = take_entries::<PersistedAdjustment>(&mut root, "adjustments", &mut dropped)
            .into_iter()
            .filter(|adjustment| {
                let keep = !adjustment.zone_id.trim().is_empty();
                if !keep {
                    dropped += 1;
                }
                keep
            })
            .collect();

        let wake = match root.remove("wake") {
            None | Some(Value::Null) => WakeAnchor::default(),
            Some(raw) => serde_json::from_value(raw).unwrap_or_else(|_| {
                dropped += 1;
                WakeAnchor::default()
            }),
        };

        let scene = match root.remove("scene") {
            Some(Value::String(name)) if !name.trim().is_empty() => Some(name),
            None | Some(Value::Null) => None,
            Some(_) => {
                dropped += 1;
                None
            }
        };

        Ok((
            Self {
                timers,
                wake,
                adjustments,
                scene,
            },
            dropped,
        ))
    }
}

fn take_entries<T>(
    root: &mut serde_json::Map<String, Value>,
    key: &str,
    dropped: &mut usize,
) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
{
    match root.remove(key) {
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    *dropped += 1;
                    None
                }
            })
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => {
            *dropped += 1;
            Vec::new()
        }
    }
}
