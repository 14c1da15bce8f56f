//! Pre-alarm wake ramp.
//!
//! The ramp for a zone runs over `[anchor - lead - ramp, anchor - lead]` and
//! rises along a normalised logistic curve from 0 to `max_boost`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const RAMP_STEEPNESS: f64 = 4.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnchorSource {
    /// Derived from an external alarm signal.
    #[default]
    Alarm,
    /// Set explicitly by a caller; alarm updates do not replace it.
    Manual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeAnchor {
    #[serde(default)]
    pub anchor_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skip_once: bool,
    #[serde(default)]
    pub source: AnchorSource,
}

impl WakeAnchor {
    /// The anchor the ramp should count toward, if any.
    pub fn active_anchor(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.skip_once {
            return None;
        }
        self.anchor_time.filter(|anchor| *anchor > now)
    }

    /// Returns whether the stored anchor changed. Past anchors are stored as
    /// "no anchor". A pending skip survives a repeat of the same anchor time.
    pub fn update(
        &mut self,
        anchor_time: Option<DateTime<Utc>>,
        skip_once: bool,
        source: AnchorSource,
        now: DateTime<Utc>,
    ) -> bool {
        let pinned = self.source == AnchorSource::Manual
            && self.anchor_time.is_some_and(|anchor| anchor > now);
        if source == AnchorSource::Alarm && pinned {
            return false;
        }

        let next = match anchor_time.filter(|anchor| *anchor > now) {
            Some(anchor) => Self {
                anchor_time: Some(anchor),
                skip_once: skip_once || (self.skip_once && self.anchor_time == Some(anchor)),
                source,
            },
            None => Self::default(),
        };

        let changed = next != *self;
        *self = next;
        changed
    }

    pub fn skip_next(&mut self) -> bool {
        if self.anchor_time.is_none() || self.skip_once {
            return false;
        }
        self.skip_once = true;
        true
    }

    pub fn clear(&mut self) -> bool {
        let changed = *self != Self::default();
        *self = Self::default();
        changed
    }

    /// Drops an anchor that has passed, along with its skip flag, and returns
    /// the anchor time that passed.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let passed = self.anchor_time.filter(|anchor| *anchor <= now)?;
        *self = Self::default();
        Some(passed)
    }
}

pub fn calculate(
    now: DateTime<Utc>,
    anchor: &WakeAnchor,
    zone_id: &str,
    target_zone: Option<&str>,
    lead_offset: Duration,
    ramp_duration: Duration,
    max_boost: i32,
) -> i32 {
    if target_zone != Some(zone_id) || max_boost <= 0 {
        return 0;
    }
    let Some(anchor_time) = anchor.active_anchor(now) else {
        return 0;
    };

    let end = anchor_time - lead_offset;
    let start = end - ramp_duration;
    if now < start || now > end {
        return 0;
    }

    let ramp_ms = ramp_duration.num_milliseconds();
    let progress = if ramp_ms <= 0 {
        1.0
    } else {
        (now - start).num_milliseconds() as f64 / ramp_ms as f64
    };

    ((max_boost as f64 * ramp_curve(progress)).round() as i32).clamp(0, max_boost)
}

fn ramp_curve(progress: f64) -> f64 {
    let x = 2.0 * progress.clamp(0.0, 1.0) - 1.0;
    let low = logistic(-1.0);
    let high = logistic(1.0);
    (logistic(x) - low) / (high - low)
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-RAMP_STEEPNESS * x).exp())
}
