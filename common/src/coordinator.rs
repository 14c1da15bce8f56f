//! Owns all zone state and runs the recompute cycle.
//!
//! The coordinator is the only writer of manual timers, manual deltas, the
//! wake anchor and the active scene. Events mutate that state and report
//! whether a recompute is due; `recompute` turns the current state plus one
//! set of sensor readings into per-zone results.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    aggregator::{self, AutomatedBoosts, BoostResult, ManualDeltas},
    boundary,
    config::{validate_zones, EngineConfig, ZoneConfig},
    dusk,
    environmental::{self, EnvironmentalInputs},
    error::CoordinatorError,
    manual::{ManualTimers, TimerTransition},
    persist::{PersistedAdjustment, PersistedState},
    scene::{self, ScenePreset},
    timeout,
    types::{CycleInputs, ManualControlState, Notification, ZoneId, ZoneResult},
    wake::{self, AnchorSource, WakeAnchor},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneTarget {
    Zone(ZoneId),
    All,
}

impl ZoneTarget {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" || raw.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Zone(raw.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    ManualChangeDetected {
        zone_id: ZoneId,
        duration: Option<Duration>,
    },
    ClearManual(ZoneTarget),
    Adjust {
        target: ZoneTarget,
        brightness_delta: i32,
        warmth_delta: i32,
    },
    SceneSelected(String),
    SceneCleared,
    WakeAnchorUpdated {
        anchor_time: Option<DateTime<Utc>>,
        skip: bool,
        source: AnchorSource,
    },
    WakeSkipNext,
    WakeCleared,
    Reconfigure(Vec<ZoneConfig>),
}

impl CoordinatorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ManualChangeDetected { .. } => "manual_change_detected",
            Self::ClearManual(_) => "clear_manual",
            Self::Adjust { .. } => "adjust",
            Self::SceneSelected(_) => "scene_selected",
            Self::SceneCleared => "scene_cleared",
            Self::WakeAnchorUpdated { .. } => "wake_anchor_updated",
            Self::WakeSkipNext => "wake_skip_next",
            Self::WakeCleared => "wake_cleared",
            Self::Reconfigure(_) => "reconfigure",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub notifications: Vec<Notification>,
    /// Results are stale and a cycle should run.
    pub recompute: bool,
    /// Durable state changed and should be saved.
    pub state_changed: bool,
}

impl EventOutcome {
    fn changed() -> Self {
        Self {
            notifications: Vec::new(),
            recompute: true,
            state_changed: true,
        }
    }

    fn push(&mut self, transition: TimerTransition) {
        self.notifications.push(transition.into_notification());
        self.recompute = true;
        self.state_changed = true;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle_at: DateTime<Utc>,
    pub results: Vec<ZoneResult>,
    pub notifications: Vec<Notification>,
    pub state_changed: bool,
    pub environmental: i32,
    pub dusk: i32,
}

impl CycleReport {
    pub fn changed_results(&self) -> impl Iterator<Item = &ZoneResult> {
        self.results.iter().filter(|result| result.changed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorStatus {
    #[serde(rename = "lastCycleAt")]
    pub last_cycle_at: Option<DateTime<Utc>>,
    #[serde(rename = "environmentalBoost")]
    pub environmental_boost: i32,
    #[serde(rename = "duskBoost")]
    pub dusk_boost: i32,
    #[serde(rename = "smartTimeoutMinutes")]
    pub smart_timeout_minutes: i64,
    #[serde(rename = "activeScene")]
    pub active_scene: Option<String>,
    pub wake: WakeAnchor,
    pub manual: BTreeMap<ZoneId, ManualControlState>,
    pub zones: Vec<ZoneResult>,
}

#[derive(Debug, Clone)]
pub struct Coordinator {
    config: EngineConfig,
    zones: Vec<ZoneConfig>,
    scenes: Vec<ScenePreset>,

    timers: ManualTimers,
    deltas: BTreeMap<ZoneId, ManualDeltas>,
    last_manual_event: BTreeMap<ZoneId, DateTime<Utc>>,
    wake: WakeAnchor,
    active_scene: Option<String>,

    results: BTreeMap<ZoneId, ZoneResult>,
    last_cycle_at: Option<DateTime<Utc>>,
    last_sun_elevation: Option<f64>,
    last_environmental: i32,
    last_dusk: i32,
}

impl Coordinator {
    pub fn new(
        mut config: EngineConfig,
        zones: Vec<ZoneConfig>,
        scenes: Vec<ScenePreset>,
    ) -> Result<Self, CoordinatorError> {
        config.sanitize();
        validate_zones(&zones, &config.warmth_limits_k)?;
        scene::validate_scenes(&scenes)?;

        Ok(Self {
            config,
            zones,
            scenes,
            timers: ManualTimers::new(),
            deltas: BTreeMap::new(),
            last_manual_event: BTreeMap::new(),
            wake: WakeAnchor::default(),
            active_scene: None,
            results: BTreeMap::new(),
            last_cycle_at: None,
            last_sun_elevation: None,
            last_environmental: 0,
            last_dusk: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn zones(&self) -> &[ZoneConfig] {
        &self.zones
    }

    pub fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }

    pub fn manual_state(&self, zone_id: &str) -> ManualControlState {
        self.timers.state(zone_id)
    }

    pub fn manual_deltas(&self, zone_id: &str) -> ManualDeltas {
        self.deltas.get(zone_id).copied().unwrap_or_default()
    }

    /// Zones currently under a manual override.
    pub fn manual_count(&self) -> usize {
        self.timers.active_count()
    }

    /// Override duration for the conditions seen on the last cycle.
    pub fn smart_timeout(&self) -> Duration {
        timeout::compute(
            self.last_sun_elevation,
            self.last_environmental,
            &self.config.timeout,
        )
    }

    /// Loads durable state. Stale timers come back automatic without any
    /// notification, and their deltas are discarded with them.
    pub fn restore(&mut self, state: &PersistedState, now: DateTime<Utc>) {
        self.timers.restore(&state.timers, now);
        let zones = &self.zones;
        self.timers
            .retain_zones(|zone_id| zones.iter().any(|zone| zone.id == zone_id));

        let limits = &self.config.adjustment;
        self.deltas = state
            .adjustments
            .iter()
            .filter(|adjustment| self.timers.is_manual(&adjustment.zone_id))
            .map(|adjustment| {
                let deltas = ManualDeltas {
                    brightness: adjustment
                        .brightness
                        .clamp(-limits.brightness_limit, limits.brightness_limit),
                    warmth: adjustment
                        .warmth
                        .clamp(-limits.warmth_limit_k, limits.warmth_limit_k),
                };
                (adjustment.zone_id.clone(), deltas)
            })
            .filter(|(_, deltas)| !deltas.is_zero())
            .collect();

        self.wake = state.wake;
        self.wake.refresh(now);

        self.active_scene = state
            .scene
            .as_deref()
            .and_then(|name| scene::find(&self.scenes, name))
            .map(|preset| preset.name.clone());
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            timers: self
                .timers
                .snapshot(self.zones.iter().map(|zone| zone.id.as_str())),
            wake: self.wake,
            adjustments: self
                .deltas
                .iter()
                .map(|(zone_id, deltas)| PersistedAdjustment {
                    zone_id: zone_id.clone(),
                    brightness: deltas.brightness,
                    warmth: deltas.warmth,
                })
                .collect(),
            scene: self.active_scene.clone(),
        }
    }

    pub fn handle(
        &mut self,
        event: CoordinatorEvent,
        now: DateTime<Utc>,
    ) -> Result<EventOutcome, CoordinatorError> {
        match event {
            CoordinatorEvent::ManualChangeDetected { zone_id, duration } => {
                self.ensure_zone(&zone_id)?;
                Ok(self.manual_change(&zone_id, duration, now))
            }
            CoordinatorEvent::ClearManual(target) => {
                let zone_ids = self.resolve(&target)?;
                let mut outcome = EventOutcome::default();
                for zone_id in zone_ids {
                    self.last_manual_event.remove(&zone_id);
                    if self.deltas.remove(&zone_id).is_some() {
                        outcome.recompute = true;
                        outcome.state_changed = true;
                    }
                    if let Some(transition) = self.timers.clear(&zone_id) {
                        outcome.push(transition);
                    }
                }
                Ok(outcome)
            }
            CoordinatorEvent::Adjust {
                target,
                brightness_delta,
                warmth_delta,
            } => {
                let zone_ids = self.resolve(&target)?;
                let limits = self.config.adjustment.clone();
                let duration = self.smart_timeout();
                let mut outcome = EventOutcome::changed();

                for zone_id in zone_ids {
                    let deltas = self.deltas.entry(zone_id.clone()).or_default();
                    deltas.brightness = deltas
                        .brightness
                        .saturating_add(brightness_delta)
                        .clamp(-limits.brightness_limit, limits.brightness_limit);
                    deltas.warmth = deltas
                        .warmth
                        .saturating_add(warmth_delta)
                        .clamp(-limits.warmth_limit_k, limits.warmth_limit_k);
                    if deltas.is_zero() {
                        self.deltas.remove(&zone_id);
                    }

                    self.last_manual_event.insert(zone_id.clone(), now);
                    if let Some(transition) =
                        self.timers.manual_change_detected(&zone_id, duration, now)
                    {
                        outcome.push(transition);
                    }
                }
                Ok(outcome)
            }
            CoordinatorEvent::SceneSelected(name) => {
                let preset = scene::find(&self.scenes, &name)
                    .ok_or_else(|| CoordinatorError::UnknownScene(name.trim().to_string()))?;
                if self.active_scene.as_deref() == Some(preset.name.as_str()) {
                    return Ok(EventOutcome::default());
                }
                self.active_scene = Some(preset.name.clone());
                Ok(EventOutcome::changed())
            }
            CoordinatorEvent::SceneCleared => Ok(if self.active_scene.take().is_some() {
                EventOutcome::changed()
            } else {
                EventOutcome::default()
            }),
            CoordinatorEvent::WakeAnchorUpdated {
                anchor_time,
                skip,
                source,
            } => Ok(changed_if(self.wake.update(anchor_time, skip, source, now))),
            CoordinatorEvent::WakeSkipNext => Ok(changed_if(self.wake.skip_next())),
            CoordinatorEvent::WakeCleared => Ok(changed_if(self.wake.clear())),
            CoordinatorEvent::Reconfigure(zones) => {
                validate_zones(&zones, &self.config.warmth_limits_k)?;
                self.reconfigure(zones);
                Ok(EventOutcome::changed())
            }
        }
    }

    pub fn recompute(&mut self, inputs: &CycleInputs) -> CycleReport {
        let now = inputs.now;
        let mut notifications = Vec::new();
        let mut state_changed = false;

        for transition in self.timers.expire_due(now) {
            self.deltas.remove(transition.zone_id());
            self.last_manual_event.remove(transition.zone_id());
            notifications.push(transition.into_notification());
            state_changed = true;
        }

        if let Some(anchor_time) = self.wake.refresh(now) {
            notifications.push(Notification::WakeAnchorPassed { anchor_time });
            state_changed = true;
        }

        let sensors = &inputs.sensors;
        let sun_elevation = sensors.usable_elevation();
        let illuminance_lux = sensors.usable_lux();

        let environmental = environmental::calculate(
            &EnvironmentalInputs {
                illuminance_lux,
                weather: sensors.weather,
                month: inputs.month,
                sun_elevation,
            },
            &self.config.environmental,
        );
        let dusk = dusk::calculate(
            sun_elevation,
            illuminance_lux,
            sensors.sun_rising,
            &self.config.dusk,
        );

        self.last_sun_elevation = sun_elevation;
        self.last_environmental = environmental;
        self.last_dusk = dusk;

        let mut results: Vec<ZoneResult> = self
            .zones
            .iter()
            .map(|zone| self.evaluate_zone(zone, now, environmental, dusk))
            .collect();

        for result in &mut results {
            let previous = self.results.get(&result.zone_id);
            result.changed = previous.map_or(true, |previous| !previous.same_output(result));

            let was_degraded = previous.is_some_and(|previous| previous.degraded_range);
            if result.degraded_range && !was_degraded {
                notifications.push(Notification::DegradedRange {
                    zone_id: result.zone_id.clone(),
                });
            }
        }

        self.results = results
            .iter()
            .map(|result| (result.zone_id.clone(), result.clone()))
            .collect();
        self.last_cycle_at = Some(now);
        notifications.push(Notification::BoundariesRecomputed { cycle_at: now });

        CycleReport {
            cycle_at: now,
            results,
            notifications,
            state_changed,
            environmental,
            dusk,
        }
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            last_cycle_at: self.last_cycle_at,
            environmental_boost: self.last_environmental,
            dusk_boost: self.last_dusk,
            smart_timeout_minutes: self.smart_timeout().num_minutes(),
            active_scene: self.active_scene.clone(),
            wake: self.wake,
            manual: self
                .zones
                .iter()
                .map(|zone| (zone.id.clone(), self.timers.state(&zone.id)))
                .collect(),
            zones: self
                .zones
                .iter()
                .filter_map(|zone| self.results.get(&zone.id).cloned())
                .collect(),
        }
    }

    fn manual_change(
        &mut self,
        zone_id: &str,
        duration: Option<Duration>,
        now: DateTime<Utc>,
    ) -> EventOutcome {
        let debounce = Duration::milliseconds(self.config.manual_debounce_ms as i64);
        if let Some(last) = self.last_manual_event.get(zone_id) {
            if now >= *last && now - *last < debounce {
                return EventOutcome::default();
            }
        }
        self.last_manual_event.insert(zone_id.to_string(), now);

        let duration = duration
            .filter(|duration| *duration > Duration::zero())
            .unwrap_or_else(|| self.smart_timeout());

        let mut outcome = EventOutcome::default();
        if let Some(transition) = self.timers.manual_change_detected(zone_id, duration, now) {
            outcome.push(transition);
        }
        outcome
    }

    fn reconfigure(&mut self, zones: Vec<ZoneConfig>) {
        self.zones = zones;
        let zones = &self.zones;
        let known = |zone_id: &str| zones.iter().any(|zone| zone.id == zone_id);

        self.timers.retain_zones(known);
        self.deltas.retain(|zone_id, _| known(zone_id));
        self.last_manual_event.retain(|zone_id, _| known(zone_id));
        self.results.retain(|zone_id, _| known(zone_id));
    }

    fn evaluate_zone(
        &self,
        zone: &ZoneConfig,
        now: DateTime<Utc>,
        environmental: i32,
        dusk: i32,
    ) -> ZoneResult {
        let manual_state = self.timers.state(&zone.id);
        let manual_active = manual_state.is_manual();

        if !zone.enabled {
            return ZoneResult {
                zone_id: zone.id.clone(),
                enabled: false,
                brightness_min: zone.brightness_min_base,
                brightness_max: zone.brightness_max_base,
                warmth_min: zone.warmth_min_base,
                warmth_max: zone.warmth_max_base,
                manual_active,
                manual_expires_at: manual_state.expires_at(),
                degraded_range: false,
                brightness: BoostResult::default(),
                warmth: BoostResult::default(),
                changed: false,
            };
        }

        let wake = wake::calculate(
            now,
            &self.wake,
            &zone.id,
            self.config.wake.target_zone.as_deref(),
            Duration::minutes(i64::from(zone.wake_lead_minutes)),
            Duration::minutes(i64::from(self.config.wake.ramp_minutes)),
            self.config.wake.max_boost,
        );

        let scene_offsets = self
            .active_scene
            .as_deref()
            .and_then(|name| scene::find(&self.scenes, name))
            .map(|preset| preset.offsets_for(&zone.id))
            .unwrap_or_default();

        let offsets = aggregator::aggregate(
            zone,
            manual_active,
            &AutomatedBoosts {
                environmental,
                dusk,
                wake,
            },
            &self.manual_deltas(&zone.id),
            &scene_offsets,
            &self.config.aggregator,
            self.config.wake.manual_policy,
        );

        let bounds = boundary::compute(
            zone,
            offsets.brightness.total,
            offsets.warmth.total,
            &self.config.warmth_limits_k,
        );

        ZoneResult {
            zone_id: zone.id.clone(),
            enabled: true,
            brightness_min: bounds.brightness_min,
            brightness_max: bounds.brightness_max,
            warmth_min: bounds.warmth_min,
            warmth_max: bounds.warmth_max,
            manual_active,
            manual_expires_at: manual_state.expires_at(),
            degraded_range: bounds.degraded_range(),
            brightness: offsets.brightness,
            warmth: offsets.warmth,
            changed: false,
        }
    }

    fn ensure_zone(&self, zone_id: &str) -> Result<(), CoordinatorError> {
        if self.zones.iter().any(|zone| zone.id == zone_id) {
            Ok(())
        } else {
            Err(CoordinatorError::UnknownZone(zone_id.to_string()))
        }
    }

    fn resolve(&self, target: &ZoneTarget) -> Result<Vec<ZoneId>, CoordinatorError> {
        match target {
            ZoneTarget::All => Ok(self.zones.iter().map(|zone| zone.id.clone()).collect()),
            ZoneTarget::Zone(zone_id) => {
                self.ensure_zone(zone_id)?;
                Ok(vec![zone_id.clone()])
            }
        }
    }
}

fn changed_if(changed: bool) -> EventOutcome {
    if changed {
        EventOutcome::changed()
    } else {
        EventOutcome::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        aggregator::BoostSource,
        config::{default_zones, WakeManualPolicy},
        error::ConfigError,
        persist::{ManualStateKind, PersistedZoneTimer},
        types::{SensorSnapshot, WeatherCondition},
    };

    fn coordinator() -> Coordinator {
        Coordinator::new(
            EngineConfig::default(),
            default_zones(),
            ScenePreset::defaults(),
        )
        .unwrap()
    }

    fn at(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, day, hour, minute, 0).unwrap()
    }

    fn inputs(
        now: DateTime<Utc>,
        lux: Option<f64>,
        weather: Option<WeatherCondition>,
        elevation: Option<f64>,
    ) -> CycleInputs {
        CycleInputs {
            now,
            month: Some(now.month()),
            sensors: SensorSnapshot {
                illuminance_lux: lux,
                weather,
                sun_elevation: elevation,
                sun_rising: None,
            },
        }
    }

    fn dusk_evening(now: DateTime<Utc>) -> CycleInputs {
        inputs(now, Some(500.0), Some(WeatherCondition::Cloudy), Some(-1.0))
    }

    fn zone<'a>(report: &'a CycleReport, zone_id: &str) -> &'a ZoneResult {
        report
            .results
            .iter()
            .find(|result| result.zone_id == zone_id)
            .unwrap()
    }

    fn manual(zone_id: &str, minutes: Option<i64>) -> CoordinatorEvent {
        CoordinatorEvent::ManualChangeDetected {
            zone_id: zone_id.to_string(),
            duration: minutes.map(Duration::minutes),
        }
    }

    #[test]
    fn manual_count_tracks_active_overrides() {
        let mut coordinator = coordinator();
        let now = at(1, 1, 0, 0);
        assert_eq!(coordinator.manual_count(), 0);

        coordinator.handle(manual("main_living", None), now).unwrap();
        coordinator.handle(manual("accent_spots", None), now).unwrap();
        assert_eq!(coordinator.manual_count(), 2);

        coordinator
            .handle(CoordinatorEvent::ClearManual(ZoneTarget::All), now)
            .unwrap();
        assert_eq!(coordinator.manual_count(), 0);
    }

    #[test]
    fn foggy_winter_dawn_caps_automated_offset() {
        let mut coordinator = coordinator();
        let report = coordinator.recompute(&inputs(
            at(1, 14, 7, 20),
            Some(15.0),
            Some(WeatherCondition::Fog),
            Some(-2.0),
        ));

        assert_eq!(report.environmental, 25);
        assert_eq!(report.dusk, 15);

        let living = zone(&report, "main_living");
        assert_eq!(living.brightness.total, 30);
        assert_eq!(living.brightness.get(BoostSource::Ceiling), -10);
        assert_eq!((living.brightness_min, living.brightness_max), (75, 100));
        assert!(!living.degraded_range);

        // Dusk disabled for the accent spots.
        let accent = zone(&report, "accent_spots");
        assert_eq!(accent.brightness.total, 25);
        assert_eq!((accent.brightness_min, accent.brightness_max), (45, 50));

        let bedroom = zone(&report, "bedroom_primary");
        assert_eq!((bedroom.brightness_min, bedroom.brightness_max), (50, 50));
        assert!(bedroom.degraded_range);
        assert!(report.notifications.contains(&Notification::DegradedRange {
            zone_id: "bedroom_primary".to_string()
        }));
    }

    #[test]
    fn clear_summer_noon_leaves_base_ranges() {
        let mut coordinator = coordinator();
        let report = coordinator.recompute(&inputs(
            at(7, 15, 19, 0),
            Some(15_000.0),
            Some(WeatherCondition::Sunny),
            Some(60.0),
        ));

        assert_eq!(report.environmental, 0);
        assert_eq!(report.dusk, 0);
        for (result, zone) in report.results.iter().zip(default_zones()) {
            assert_eq!(result.brightness.total, 0);
            assert_eq!(result.brightness_min, zone.brightness_min_base);
            assert_eq!(result.brightness_max, zone.brightness_max_base);
            assert!(result.changed);
        }
        assert_eq!(
            report.notifications,
            vec![Notification::BoundariesRecomputed {
                cycle_at: at(7, 15, 19, 0)
            }]
        );
    }

    #[test]
    fn manual_override_suppresses_dusk_until_expiry() {
        let mut coordinator = coordinator();
        let start = at(4, 10, 2, 30);

        let before = coordinator.recompute(&dusk_evening(start));
        assert_eq!(before.dusk, 20);
        assert_eq!(zone(&before, "main_living").brightness.get(BoostSource::Dusk), 20);
        assert_eq!(coordinator.smart_timeout(), Duration::minutes(30));

        let outcome = coordinator
            .handle(manual("main_living", None), start)
            .unwrap();
        assert_eq!(
            outcome.notifications,
            vec![Notification::ManualOverrideStarted {
                zone_id: "main_living".to_string(),
                expires_at: start + Duration::minutes(30),
            }]
        );
        assert!(outcome.recompute);

        let during = coordinator.recompute(&dusk_evening(start + Duration::minutes(10)));
        let living = zone(&during, "main_living");
        assert!(living.manual_active);
        assert_eq!(living.brightness, BoostResult::default());
        assert_eq!((living.brightness_min, living.brightness_max), (45, 100));
        // Other zones keep their automated boost.
        assert!(zone(&during, "kitchen_island").brightness.get(BoostSource::Dusk) > 0);

        let after = coordinator.recompute(&dusk_evening(start + Duration::minutes(30)));
        assert!(after.notifications.contains(&Notification::ManualOverrideExpired {
            zone_id: "main_living".to_string()
        }));
        let living = zone(&after, "main_living");
        assert!(!living.manual_active);
        assert_eq!(living.brightness.get(BoostSource::Dusk), 20);
        assert!(living.changed);
    }

    #[test]
    fn expiry_at_exact_tick_timestamp() {
        let mut coordinator = coordinator();
        let start = at(3, 2, 18, 0);
        coordinator
            .handle(manual("kitchen_island", Some(20)), start)
            .unwrap();

        let report = coordinator.recompute(&dusk_evening(start + Duration::minutes(20)));

        assert!(report.state_changed);
        assert_eq!(
            coordinator.manual_state("kitchen_island"),
            ManualControlState::Automatic
        );
    }

    #[test]
    fn stale_persisted_timer_restores_automatic_without_replay() {
        let now = at(5, 5, 12, 0);
        let state = PersistedState {
            timers: vec![PersistedZoneTimer {
                zone_id: "main_living".to_string(),
                manual_state: ManualStateKind::Manual,
                started_at: Some(now - Duration::minutes(40)),
                expires_at: Some(now - Duration::minutes(10)),
            }],
            adjustments: vec![PersistedAdjustment {
                zone_id: "main_living".to_string(),
                brightness: -20,
                warmth: 0,
            }],
            ..PersistedState::default()
        };

        let mut coordinator = coordinator();
        coordinator.restore(&state, now);

        assert_eq!(
            coordinator.manual_state("main_living"),
            ManualControlState::Automatic
        );
        assert_eq!(coordinator.manual_deltas("main_living"), ManualDeltas::default());

        let report = coordinator.recompute(&dusk_evening(now));
        assert!(!report.notifications.iter().any(|notification| matches!(
            notification,
            Notification::ManualOverrideStarted { .. } | Notification::ManualOverrideExpired { .. }
        )));
        assert!(!report.state_changed);
    }

    #[test]
    fn live_persisted_state_round_trips() {
        let now = at(5, 5, 12, 0);
        let mut before = coordinator();
        before
            .handle(
                CoordinatorEvent::Adjust {
                    target: ZoneTarget::Zone("main_living".to_string()),
                    brightness_delta: -20,
                    warmth_delta: 500,
                },
                now,
            )
            .unwrap();
        before
            .handle(
                CoordinatorEvent::SceneSelected("Evening_Comfort".to_string()),
                now,
            )
            .unwrap();

        let mut restored = coordinator();
        restored.restore(&before.persisted_state(), now + Duration::minutes(5));

        assert_eq!(
            restored.manual_state("main_living"),
            before.manual_state("main_living")
        );
        assert_eq!(
            restored.manual_deltas("main_living"),
            ManualDeltas {
                brightness: -20,
                warmth: 500,
            }
        );
        assert_eq!(restored.active_scene(), Some("evening_comfort"));
    }

    #[test]
    fn clearing_an_automatic_zone_is_a_no_op() {
        let mut coordinator = coordinator();
        let now = at(6, 1, 20, 0);

        let outcome = coordinator
            .handle(
                CoordinatorEvent::ClearManual(ZoneTarget::Zone("main_living".to_string())),
                now,
            )
            .unwrap();
        assert_eq!(outcome, EventOutcome::default());

        coordinator.handle(manual("main_living", None), now).unwrap();
        let first = coordinator
            .handle(CoordinatorEvent::ClearManual(ZoneTarget::All), now)
            .unwrap();
        let second = coordinator
            .handle(CoordinatorEvent::ClearManual(ZoneTarget::All), now)
            .unwrap();

        assert_eq!(
            first.notifications,
            vec![Notification::ManualOverrideCleared {
                zone_id: "main_living".to_string()
            }]
        );
        assert_eq!(second, EventOutcome::default());
    }

    #[test]
    fn repeated_manual_changes_only_extend() {
        let mut coordinator = coordinator();
        let start = at(9, 9, 17, 0);
        coordinator
            .handle(manual("bedroom_primary", Some(60)), start)
            .unwrap();

        let mut previous = coordinator
            .manual_state("bedroom_primary")
            .expires_at()
            .unwrap();
        for step in 1..=8 {
            let now = start + Duration::minutes(step * 5);
            coordinator
                .handle(manual("bedroom_primary", Some(10 * step)), now)
                .unwrap();
            let expires_at = coordinator
                .manual_state("bedroom_primary")
                .expires_at()
                .unwrap();
            assert!(expires_at >= previous);
            previous = expires_at;
        }
    }

    #[test]
    fn bursts_of_manual_changes_are_debounced() {
        let mut coordinator = coordinator();
        let start = at(9, 9, 17, 0);

        let first = coordinator.handle(manual("main_living", Some(10)), start).unwrap();
        assert!(first.recompute);

        let burst = coordinator
            .handle(
                manual("main_living", Some(90)),
                start + Duration::milliseconds(500),
            )
            .unwrap();
        assert_eq!(burst, EventOutcome::default());
        assert_eq!(
            coordinator.manual_state("main_living").expires_at(),
            Some(start + Duration::minutes(10))
        );

        let later = coordinator
            .handle(manual("main_living", Some(90)), start + Duration::seconds(3))
            .unwrap();
        assert!(later.state_changed);
    }

    #[test]
    fn adjustments_accumulate_and_clamp() {
        let mut coordinator = coordinator();
        let now = at(10, 1, 19, 0);
        let dimmer = CoordinatorEvent::Adjust {
            target: ZoneTarget::All,
            brightness_delta: -60,
            warmth_delta: -2_000,
        };

        coordinator.handle(dimmer.clone(), now).unwrap();
        coordinator.handle(dimmer, now).unwrap();

        assert_eq!(
            coordinator.manual_deltas("kitchen_island"),
            ManualDeltas {
                brightness: -100,
                warmth: -2_500,
            }
        );
        assert!(coordinator.manual_state("kitchen_island").is_manual());

        let report = coordinator.recompute(&dusk_evening(now + Duration::minutes(1)));
        let kitchen = zone(&report, "kitchen_island");
        assert_eq!((kitchen.brightness_min, kitchen.brightness_max), (0, 0));
        assert!(kitchen.degraded_range);
        assert_eq!(kitchen.warmth_min, Some(1_500));
        assert_eq!(kitchen.warmth_max, Some(1_500));
    }

    #[test]
    fn expiry_resets_only_that_zones_deltas() {
        let mut coordinator = coordinator();
        let now = at(10, 1, 19, 0);
        coordinator
            .handle(
                CoordinatorEvent::Adjust {
                    target: ZoneTarget::Zone("main_living".to_string()),
                    brightness_delta: 10,
                    warmth_delta: 0,
                },
                now,
            )
            .unwrap();
        coordinator
            .handle(manual("kitchen_island", Some(120)), now)
            .unwrap();
        coordinator
            .handle(
                CoordinatorEvent::Adjust {
                    target: ZoneTarget::Zone("kitchen_island".to_string()),
                    brightness_delta: 10,
                    warmth_delta: 0,
                },
                now,
            )
            .unwrap();

        coordinator.recompute(&dusk_evening(now + Duration::minutes(31)));

        assert_eq!(coordinator.manual_deltas("main_living"), ManualDeltas::default());
        assert_eq!(coordinator.manual_deltas("kitchen_island").brightness, 10);
    }

    #[test]
    fn scenes_shift_ranges_and_reject_unknown_names() {
        let mut coordinator = coordinator();
        let now = at(11, 20, 3, 0);

        let error = coordinator
            .handle(CoordinatorEvent::SceneSelected("disco".to_string()), now)
            .unwrap_err();
        assert_eq!(error, CoordinatorError::UnknownScene("disco".to_string()));
        assert_eq!(coordinator.active_scene(), None);

        coordinator
            .handle(CoordinatorEvent::SceneSelected("ultra_dim".to_string()), now)
            .unwrap();
        let report = coordinator.recompute(&inputs(now, None, None, Some(-40.0)));
        let living = zone(&report, "main_living");
        assert_eq!((living.brightness_min, living.brightness_max), (45, 50));
        assert_eq!(living.warmth.get(BoostSource::Scene), -1_000);
        assert_eq!(living.warmth_max, Some(1_950));

        let cleared = coordinator
            .handle(CoordinatorEvent::SceneCleared, now)
            .unwrap();
        assert!(cleared.recompute);
        assert_eq!(
            coordinator
                .handle(CoordinatorEvent::SceneCleared, now)
                .unwrap(),
            EventOutcome::default()
        );
    }

    #[test]
    fn wake_ramp_targets_one_zone_and_respects_manual() {
        let mut coordinator = coordinator();
        let now = at(2, 3, 14, 0);
        let anchor = at(2, 3, 14, 15);
        coordinator
            .handle(
                CoordinatorEvent::WakeAnchorUpdated {
                    anchor_time: Some(anchor),
                    skip: false,
                    source: AnchorSource::Alarm,
                },
                now,
            )
            .unwrap();

        let dark = |now| inputs(now, Some(0.0), None, Some(-30.0));
        let report = coordinator.recompute(&dark(anchor - Duration::seconds(1)));
        assert_eq!(zone(&report, "bedroom_primary").brightness.get(BoostSource::Wake), 20);
        assert_eq!(zone(&report, "main_living").brightness.total, 0);

        coordinator
            .handle(manual("bedroom_primary", None), anchor - Duration::seconds(1))
            .unwrap();
        let report = coordinator.recompute(&dark(anchor - Duration::seconds(1)));
        assert_eq!(zone(&report, "bedroom_primary").brightness.total, 0);

        let report = coordinator.recompute(&dark(anchor));
        assert!(report
            .notifications
            .contains(&Notification::WakeAnchorPassed { anchor_time: anchor }));
        assert_eq!(coordinator.status().wake, WakeAnchor::default());
    }

    #[test]
    fn wake_override_policy_ramps_through_manual() {
        let mut config = EngineConfig::default();
        config.wake.manual_policy = WakeManualPolicy::OverrideManual;
        let mut coordinator =
            Coordinator::new(config, default_zones(), ScenePreset::defaults()).unwrap();
        let anchor = at(2, 3, 14, 15);
        let now = anchor - Duration::seconds(1);

        coordinator
            .handle(
                CoordinatorEvent::WakeAnchorUpdated {
                    anchor_time: Some(anchor),
                    skip: false,
                    source: AnchorSource::Manual,
                },
                now,
            )
            .unwrap();
        coordinator.handle(manual("bedroom_primary", None), now).unwrap();

        let report = coordinator.recompute(&inputs(now, None, None, Some(-30.0)));
        assert_eq!(zone(&report, "bedroom_primary").brightness.total, 20);
    }

    #[test]
    fn disabled_zone_emits_base_range() {
        let mut zones = default_zones();
        zones[0].enabled = false;
        let mut coordinator =
            Coordinator::new(EngineConfig::default(), zones, ScenePreset::defaults()).unwrap();

        let report = coordinator.recompute(&inputs(
            at(1, 14, 7, 20),
            Some(15.0),
            Some(WeatherCondition::Fog),
            Some(-2.0),
        ));
        let living = zone(&report, "main_living");

        assert!(!living.enabled);
        assert_eq!((living.brightness_min, living.brightness_max), (45, 100));
        assert_eq!(living.brightness, BoostResult::default());
    }

    #[test]
    fn unchanged_cycles_are_not_marked_changed() {
        let mut coordinator = coordinator();
        let now = at(7, 15, 19, 0);
        let noon = |now| {
            inputs(
                now,
                Some(15_000.0),
                Some(WeatherCondition::Sunny),
                Some(60.0),
            )
        };

        coordinator.recompute(&noon(now));
        let second = coordinator.recompute(&noon(now + Duration::seconds(30)));

        assert_eq!(second.changed_results().count(), 0);
    }

    #[test]
    fn degraded_notification_fires_on_entry_only() {
        let mut coordinator = coordinator();
        let dawn = |now| {
            inputs(
                now,
                Some(15.0),
                Some(WeatherCondition::Fog),
                Some(-2.0),
            )
        };
        let now = at(1, 14, 7, 20);

        coordinator.recompute(&dawn(now));
        let second = coordinator.recompute(&dawn(now + Duration::seconds(30)));

        assert!(!second
            .notifications
            .iter()
            .any(Notification::is_warning));
    }

    #[test]
    fn unknown_zones_are_rejected() {
        let mut coordinator = coordinator();
        let now = at(1, 1, 0, 0);

        assert_eq!(
            coordinator.handle(manual("garage", None), now),
            Err(CoordinatorError::UnknownZone("garage".to_string()))
        );
        assert_eq!(
            coordinator.handle(
                CoordinatorEvent::ClearManual(ZoneTarget::Zone("garage".to_string())),
                now
            ),
            Err(CoordinatorError::UnknownZone("garage".to_string()))
        );
    }

    #[test]
    fn invalid_reconfigure_is_rejected_wholesale() {
        let mut coordinator = coordinator();
        let now = at(1, 1, 0, 0);
        let zones = vec![
            ZoneConfig::new("porch", 10, 90),
            ZoneConfig::new("porch", 20, 80),
        ];

        let error = coordinator
            .handle(CoordinatorEvent::Reconfigure(zones), now)
            .unwrap_err();

        assert!(matches!(error, CoordinatorError::InvalidConfig(_)));
        assert_eq!(coordinator.zones(), default_zones().as_slice());
    }

    #[test]
    fn reconfigure_rejects_warmth_outside_kelvin_limits() {
        let mut coordinator = coordinator();
        let now = at(1, 1, 0, 0);
        let zones = vec![ZoneConfig::new("candle", 10, 60).with_warmth(1_000, 3_000)];

        let error = coordinator
            .handle(CoordinatorEvent::Reconfigure(zones), now)
            .unwrap_err();

        assert!(matches!(
            error,
            CoordinatorError::InvalidConfig(ConfigError::WarmthOutOfLimits { .. })
        ));
        assert_eq!(coordinator.zones(), default_zones().as_slice());
    }

    #[test]
    fn reconfigure_drops_state_of_removed_zones() {
        let mut coordinator = coordinator();
        let now = at(1, 1, 0, 0);
        coordinator.handle(manual("main_living", None), now).unwrap();
        coordinator.handle(manual("kitchen_island", None), now).unwrap();

        let zones = vec![ZoneConfig::new("kitchen_island", 30, 100).with_warmth(2_000, 4_000)];
        coordinator
            .handle(CoordinatorEvent::Reconfigure(zones), now)
            .unwrap();

        assert!(coordinator.manual_state("kitchen_island").is_manual());
        assert_eq!(
            coordinator.persisted_state().timers,
            vec![PersistedZoneTimer {
                zone_id: "kitchen_island".to_string(),
                manual_state: ManualStateKind::Manual,
                started_at: Some(now),
                expires_at: Some(now + Duration::minutes(30)),
            }]
        );
    }

    #[test]
    fn zone_target_parsing() {
        assert_eq!(ZoneTarget::parse(" ALL "), ZoneTarget::All);
        assert_eq!(ZoneTarget::parse(""), ZoneTarget::All);
        assert_eq!(
            ZoneTarget::parse("main_living"),
            ZoneTarget::Zone("main_living".to_string())
        );
    }
}
