//! Asymmetric range adjustment with collapse prevention.
//!
//! A positive offset raises only the minimum, a negative offset lowers only
//! the maximum. When the adjusted side crosses the other one, the range is
//! pinned to the adjusted value and reported as degraded.
//!
//! Warmth follows the same sign convention in Kelvin: a positive offset is
//! cooler and raises the warm end, a negative offset is warmer and lowers
//! the cool end.

use crate::{
    config::{WarmthLimits, ZoneConfig},
    types::ComputedBoundaries,
};

pub const BRIGHTNESS_FLOOR: i32 = 0;
pub const BRIGHTNESS_CEILING: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustedRange {
    pub min: i32,
    pub max: i32,
    pub degraded: bool,
}

pub fn adjust_range(
    min_base: i32,
    max_base: i32,
    offset: i32,
    floor: i32,
    ceiling: i32,
) -> AdjustedRange {
    let (mut min, mut max) = (min_base, max_base);
    if offset > 0 {
        min = min.saturating_add(offset);
    } else if offset < 0 {
        max = max.saturating_add(offset);
    }

    min = min.clamp(floor, ceiling);
    max = max.clamp(floor, ceiling);

    if min < max {
        return AdjustedRange {
            min,
            max,
            degraded: false,
        };
    }

    let pinned = if offset < 0 { max } else { min };
    AdjustedRange {
        min: pinned,
        max: pinned,
        degraded: true,
    }
}

pub fn compute(
    zone: &ZoneConfig,
    brightness_offset: i32,
    warmth_offset: i32,
    warmth_limits: &WarmthLimits,
) -> ComputedBoundaries {
    let brightness = adjust_range(
        zone.brightness_min_base as i32,
        zone.brightness_max_base as i32,
        brightness_offset,
        BRIGHTNESS_FLOOR,
        BRIGHTNESS_CEILING,
    );

    let warmth = zone.warmth_range().map(|(min, max)| {
        adjust_range(
            kelvin(min),
            kelvin(max),
            warmth_offset,
            kelvin(warmth_limits.min_kelvin),
            kelvin(warmth_limits.max_kelvin),
        )
    });

    ComputedBoundaries {
        brightness_min: brightness.min as u8,
        brightness_max: brightness.max as u8,
        warmth_min: warmth.map(|range| range.min as u32),
        warmth_max: warmth.map(|range| range.max as u32),
        degraded_brightness: brightness.degraded,
        degraded_warmth: warmth.is_some_and(|range| range.degraded),
    }
}

fn kelvin(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
