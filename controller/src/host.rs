use std::{collections::HashMap, net::SocketAddr, pin::Pin, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot, Mutex},
    time::{Instant, Interval, MissedTickBehavior, Sleep},
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use zonelight_common::{
    config::default_zones, zone_state_topic, AnchorSource, Coordinator, CoordinatorError,
    CoordinatorEvent, CoordinatorStatus, CycleInputs, CycleReport, Notification, RuntimeConfig,
    ScenePreset, SensorSnapshot, WeatherCondition, ZoneConfig, ZoneResult, ZoneTarget,
    MAX_PAYLOAD_BYTES,
    TOPIC_CMD_ADJUST, TOPIC_CMD_CLEAR, TOPIC_CMD_MANUAL, TOPIC_CMD_SCENE, TOPIC_CMD_WAKE,
    TOPIC_CMD_WILDCARD, TOPIC_CONTROLLER_EVENTS, TOPIC_CONTROLLER_STATUS,
    TOPIC_SENSOR_ILLUMINANCE, TOPIC_SENSOR_SUN_ELEVATION, TOPIC_SENSOR_SUN_RISING,
    TOPIC_SENSOR_WEATHER, TOPIC_SENSOR_WILDCARD,
};

use crate::{
    commands::{self, SensorUpdate, WakePayload},
    store::AppStore,
};

const COMMAND_QUEUE_DEPTH: usize = 64;

#[derive(Clone)]
struct AppState {
    commands: mpsc::Sender<Command>,
    runtime: Arc<Mutex<RuntimeConfig>>,
    store: AppStore,
}

type EventReply = oneshot::Sender<Result<(), CoordinatorError>>;

enum Command {
    Event {
        event: CoordinatorEvent,
        reply: Option<EventReply>,
    },
    Sensor(SensorUpdate),
    Status(oneshot::Sender<CoordinatorStatus>),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct StatusSummary<'a> {
    #[serde(rename = "lastCycleAt")]
    last_cycle_at: Option<DateTime<Utc>>,
    #[serde(rename = "environmentalBoost")]
    environmental_boost: i32,
    #[serde(rename = "duskBoost")]
    dusk_boost: i32,
    #[serde(rename = "activeScene")]
    active_scene: Option<&'a str>,
    #[serde(rename = "manualZones")]
    manual_zones: Vec<&'a str>,
    #[serde(rename = "wakeAnchor")]
    wake_anchor: Option<DateTime<Utc>>,
    #[serde(rename = "wakeSkip")]
    wake_skip: bool,
}

#[derive(Debug, Clone, Copy)]
struct Reading<T> {
    value: T,
    at: Instant,
}

#[derive(Debug, Default)]
struct SensorReadings {
    illuminance: Option<Reading<f64>>,
    weather: Option<Reading<WeatherCondition>>,
    sun_elevation: Option<Reading<f64>>,
    sun_rising: Option<Reading<bool>>,
}

impl SensorReadings {
    fn apply(&mut self, update: SensorUpdate, at: Instant) {
        match update {
            SensorUpdate::Illuminance(value) => {
                self.illuminance = value.map(|value| Reading { value, at })
            }
            SensorUpdate::Weather(value) => self.weather = value.map(|value| Reading { value, at }),
            SensorUpdate::SunElevation(value) => {
                self.sun_elevation = value.map(|value| Reading { value, at })
            }
            SensorUpdate::SunRising(value) => {
                self.sun_rising = value.map(|value| Reading { value, at })
            }
        }
    }

    /// Readings older than `stale_after` are reported as unavailable.
    fn snapshot(&self, now: Instant, stale_after: Duration) -> SensorSnapshot {
        SensorSnapshot {
            illuminance_lux: fresh(self.illuminance, now, stale_after),
            weather: fresh(self.weather, now, stale_after),
            sun_elevation: fresh(self.sun_elevation, now, stale_after),
            sun_rising: fresh(self.sun_rising, now, stale_after),
        }
    }
}

fn fresh<T: Copy>(reading: Option<Reading<T>>, now: Instant, stale_after: Duration) -> Option<T> {
    reading
        .filter(|reading| now.saturating_duration_since(reading.at) <= stale_after)
        .map(|reading| reading.value)
}

struct CoordinatorLoop {
    coordinator: Coordinator,
    readings: SensorReadings,
    timezone: Option<Tz>,
    mqtt: AsyncClient,
    store: AppStore,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    runtime.sanitize();
    if let Err(err) = runtime.validate() {
        warn!("invalid zone configuration ({err}); falling back to defaults");
        runtime.zones = default_zones();
        runtime.scenes = ScenePreset::defaults();
    }

    let timezone = match runtime.timezone.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(err) => {
            warn!("unknown timezone {}: {err}; using UTC months", runtime.timezone);
            None
        }
    };

    let mut coordinator = Coordinator::new(
        runtime.engine.clone(),
        runtime.zones.clone(),
        runtime.scenes.clone(),
    )
    .context("failed to build coordinator")?;

    let persisted = store.load_state().await.unwrap_or_else(|err| {
        warn!("failed to load persisted state, starting automatic: {err:#}");
        Default::default()
    });
    coordinator.restore(&persisted, Utc::now());
    info!(
        "restored {} manual override(s) across {} zones",
        coordinator.manual_count(),
        coordinator.zones().len()
    );

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("zonelight-controller", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);
    let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);

    let app_state = AppState {
        commands,
        runtime: Arc::new(Mutex::new(runtime)),
        store: store.clone(),
    };

    subscribe_topics(&mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_coordinator_loop(
        CoordinatorLoop {
            coordinator,
            readings: SensorReadings::default(),
            timezone,
            mqtt,
            store,
        },
        receiver,
    );

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/manual", post(handle_manual))
        .route("/api/clear", post(handle_clear))
        .route("/api/scenes", get(handle_get_scenes))
        .route("/api/scene", post(handle_scene))
        .route("/api/scene/clear", post(handle_scene_clear))
        .route("/api/wake", post(handle_wake))
        .route("/api/wake/skip", post(handle_wake_skip))
        .route("/api/wake/clear", post(handle_wake_clear))
        .route("/api/adjust", post(handle_adjust))
        .route("/api/zones", get(handle_get_zones).put(handle_put_zones))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let port = std::env::var("ZONELIGHT_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("controller server failed")?;
    info!("controller stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    for topic in [TOPIC_SENSOR_WILDCARD, TOPIC_CMD_WILDCARD] {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    let topic = message.topic.clone();
                    if let Err(err) =
                        handle_mqtt_message(&app_state, message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message on {topic} dropped: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_coordinator_loop(state: CoordinatorLoop, receiver: mpsc::Receiver<Command>) {
    tokio::spawn(state.run(receiver));
}

enum Step<T> {
    Cycle,
    Command(T),
    Closed,
}

/// Decides when the coordinator loop runs a cycle. The baseline tick always
/// runs one so expiries are seen within one interval; `arm` schedules a
/// debounced cycle so a burst of events produces a single recompute.
struct CycleScheduler {
    tick: Interval,
    debounce: Pin<Box<Sleep>>,
    debounce_for: Duration,
    pending: bool,
}

impl CycleScheduler {
    fn new(tick_every: Duration, debounce_for: Duration) -> Self {
        let mut tick = tokio::time::interval(tick_every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            tick,
            debounce: Box::pin(tokio::time::sleep(debounce_for)),
            debounce_for,
            pending: false,
        }
    }

    fn arm(&mut self) {
        self.pending = true;
        let deadline = Instant::now() + self.debounce_for;
        self.debounce.as_mut().reset(deadline);
    }

    async fn next<T>(&mut self, commands: &mut mpsc::Receiver<T>) -> Step<T> {
        tokio::select! {
            _ = self.tick.tick() => {
                self.pending = false;
                Step::Cycle
            }
            () = &mut self.debounce, if self.pending => {
                self.pending = false;
                Step::Cycle
            }
            command = commands.recv() => match command {
                Some(command) => Step::Command(command),
                None => Step::Closed,
            },
        }
    }
}

impl CoordinatorLoop {
    /// Single owner of the coordinator.
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let config = self.coordinator.config();
        let mut scheduler = CycleScheduler::new(
            Duration::from_secs(config.tick_interval_secs),
            Duration::from_millis(config.recompute_debounce_ms),
        );

        loop {
            match scheduler.next(&mut commands).await {
                Step::Cycle => self.cycle().await,
                Step::Command(command) => {
                    if self.handle_command(command).await {
                        scheduler.arm();
                    }
                }
                Step::Closed => break,
            }
        }

        info!("coordinator loop stopped");
    }

    /// Returns whether a recompute should be scheduled.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Event { event, reply } => {
                let name = event.name();
                let result = self.coordinator.handle(event, Utc::now());
                let recompute = match &result {
                    Ok(outcome) => {
                        for notification in &outcome.notifications {
                            self.publish_notification(notification);
                        }
                        if outcome.state_changed {
                            self.save_state().await;
                        }
                        outcome.recompute
                    }
                    Err(err) => {
                        warn!("{name} rejected: {err}");
                        false
                    }
                };
                if let Some(reply) = reply {
                    let _ = reply.send(result.map(|_| ()));
                }
                recompute
            }
            Command::Sensor(update) => {
                self.readings.apply(update, Instant::now());
                false
            }
            Command::Status(reply) => {
                let _ = reply.send(self.coordinator.status());
                false
            }
        }
    }

    async fn cycle(&mut self) {
        let now = Utc::now();
        let month = match self.timezone {
            Some(tz) => now.with_timezone(&tz).month(),
            None => now.month(),
        };
        let stale_after =
            Duration::from_secs(self.coordinator.config().sensor_stale_timeout_secs);
        let inputs = CycleInputs {
            now,
            month: Some(month),
            sensors: self.readings.snapshot(Instant::now(), stale_after),
        };

        let report = self.coordinator.recompute(&inputs);
        debug!(
            "cycle: environmental={} dusk={} changed_zones={}",
            report.environmental,
            report.dusk,
            report.changed_results().count()
        );

        for (topic, result) in zone_state_messages(&report) {
            publish_json(&self.mqtt, &topic, true, result);
        }
        for notification in &report.notifications {
            self.publish_notification(notification);
        }
        if report.state_changed {
            self.save_state().await;
        }

        let status = self.coordinator.status();
        let summary = StatusSummary {
            last_cycle_at: status.last_cycle_at,
            environmental_boost: status.environmental_boost,
            dusk_boost: status.dusk_boost,
            active_scene: status.active_scene.as_deref(),
            manual_zones: status
                .manual
                .iter()
                .filter(|(_, state)| state.is_manual())
                .map(|(zone_id, _)| zone_id.as_str())
                .collect(),
            wake_anchor: status.wake.anchor_time,
            wake_skip: status.wake.skip_once,
        };
        publish_json(&self.mqtt, TOPIC_CONTROLLER_STATUS, true, &summary);
    }

    fn publish_notification(&self, notification: &Notification) {
        log_notification(notification);
        publish_json(&self.mqtt, TOPIC_CONTROLLER_EVENTS, false, notification);
    }

    async fn save_state(&self) {
        if let Err(err) = self.store.save_state(&self.coordinator.persisted_state()).await {
            warn!("failed to persist coordinator state: {err:#}");
        }
    }
}

/// Every zone's state is republished each cycle, changed or not.
fn zone_state_messages(report: &CycleReport) -> Vec<(String, &ZoneResult)> {
    report
        .results
        .iter()
        .map(|result| (zone_state_topic(&result.zone_id), result))
        .collect()
}

fn log_notification(notification: &Notification) {
    let message = match notification {
        Notification::ManualOverrideStarted {
            zone_id,
            expires_at,
        } => format!("manual override started in {zone_id} until {expires_at}"),
        Notification::ManualOverrideExtended {
            zone_id,
            expires_at,
        } => format!("manual override in {zone_id} extended to {expires_at}"),
        Notification::ManualOverrideExpired { zone_id } => {
            format!("manual override in {zone_id} expired")
        }
        Notification::ManualOverrideCleared { zone_id } => {
            format!("manual override in {zone_id} cleared")
        }
        Notification::DegradedRange { zone_id } => {
            format!("zone {zone_id} range collapsed to a single value")
        }
        Notification::WakeAnchorPassed { anchor_time } => {
            format!("wake anchor {anchor_time} passed")
        }
        Notification::BoundariesRecomputed { cycle_at } => {
            debug!("boundaries recomputed at {cycle_at}");
            return;
        }
    };

    if notification.is_warning() {
        warn!("{message}");
    } else {
        info!("{message}");
    }
}

// try_publish keeps a stalled broker connection from blocking the loop.
fn publish_json<T: Serialize>(mqtt: &AsyncClient, topic: &str, retain: bool, payload: &T) {
    let body = match serde_json::to_vec(payload) {
        Ok(body) => body,
        Err(err) => {
            warn!("{topic} serialization failed: {err}");
            return;
        }
    };
    if body.len() > MAX_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload for {topic} ({} bytes)",
            body.len()
        );
        return;
    }
    if let Err(err) = mqtt.try_publish(topic, QoS::AtLeastOnce, retain, body) {
        warn!("{topic} publish failed: {err}");
    }
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;

    let command = match topic.as_str() {
        TOPIC_SENSOR_ILLUMINANCE
        | TOPIC_SENSOR_WEATHER
        | TOPIC_SENSOR_SUN_ELEVATION
        | TOPIC_SENSOR_SUN_RISING => Command::Sensor(commands::parse_sensor(&topic, &message)?),
        TOPIC_CMD_MANUAL => mqtt_event(commands::parse_manual(&message)?),
        TOPIC_CMD_CLEAR => mqtt_event(commands::parse_clear(&message)),
        TOPIC_CMD_SCENE => mqtt_event(commands::parse_scene(&message)),
        TOPIC_CMD_WAKE => mqtt_event(commands::parse_wake(&message)?),
        TOPIC_CMD_ADJUST => {
            let steps = app_state.runtime.lock().await.engine.adjustment.clone();
            mqtt_event(commands::parse_adjust(&message, &steps)?)
        }
        _ => return Ok(()),
    };

    app_state
        .commands
        .send(command)
        .await
        .context("coordinator loop is not running")
}

fn mqtt_event(event: CoordinatorEvent) -> Command {
    Command::Event { event, reply: None }
}

async fn send_event(
    state: &AppState,
    event: CoordinatorEvent,
) -> Result<(), axum::response::Response> {
    let (reply, response) = oneshot::channel();
    let command = Command::Event {
        event,
        reply: Some(reply),
    };
    if state.commands.send(command).await.is_err() {
        return Err(coordinator_unavailable());
    }

    match response.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(error_response(StatusCode::BAD_REQUEST, &err.to_string())),
        Err(_) => Err(coordinator_unavailable()),
    }
}

async fn fetch_status(state: &AppState) -> Result<CoordinatorStatus, axum::response::Response> {
    let (reply, response) = oneshot::channel();
    if state.commands.send(Command::Status(reply)).await.is_err() {
        return Err(coordinator_unavailable());
    }
    response.await.map_err(|_| coordinator_unavailable())
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    match fetch_status(&state).await {
        Ok(status) => Json(status).into_response(),
        Err(response) => response,
    }
}

async fn respond_after(state: AppState, event: CoordinatorEvent) -> axum::response::Response {
    if let Err(response) = send_event(&state, event).await {
        return response;
    }
    handle_get_status(State(state)).await.into_response()
}

async fn handle_manual(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(zone) = params.get("zone").map(|zone| zone.trim()).filter(|zone| !zone.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'zone' parameter");
    };

    let duration = match params.get("minutes") {
        None => None,
        Some(value) => match value.parse::<u32>() {
            Ok(minutes) if (1..=24 * 60).contains(&minutes) => {
                Some(chrono::Duration::minutes(i64::from(minutes)))
            }
            _ => {
                return error_response(StatusCode::BAD_REQUEST, "Invalid minutes value (1-1440)")
            }
        },
    };

    let event = CoordinatorEvent::ManualChangeDetected {
        zone_id: zone.to_string(),
        duration,
    };
    respond_after(state, event).await
}

async fn handle_clear(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(zone) = params.get("zone") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'zone' parameter");
    };
    respond_after(state, CoordinatorEvent::ClearManual(ZoneTarget::parse(zone))).await
}

async fn handle_get_scenes(State(state): State<AppState>) -> impl IntoResponse {
    let scenes = state.runtime.lock().await.scenes.clone();
    Json(scenes)
}

async fn handle_scene(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(name) = params.get("name") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'name' parameter");
    };
    respond_after(state, CoordinatorEvent::SceneSelected(name.clone())).await
}

async fn handle_scene_clear(State(state): State<AppState>) -> impl IntoResponse {
    respond_after(state, CoordinatorEvent::SceneCleared).await
}

async fn handle_wake(
    State(state): State<AppState>,
    Json(payload): Json<WakePayload>,
) -> impl IntoResponse {
    let event = match payload.into_event(AnchorSource::Manual) {
        Ok(event) => event,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &format!("{err:#}")),
    };
    respond_after(state, event).await
}

async fn handle_wake_skip(State(state): State<AppState>) -> impl IntoResponse {
    respond_after(state, CoordinatorEvent::WakeSkipNext).await
}

async fn handle_wake_clear(State(state): State<AppState>) -> impl IntoResponse {
    respond_after(state, CoordinatorEvent::WakeCleared).await
}

async fn handle_adjust(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let parse_delta = |key: &str| match params.get(key) {
        None => Ok(0),
        Some(value) => value.parse::<i32>().map_err(|_| key.to_string()),
    };
    let (brightness_delta, warmth_delta) = match (parse_delta("brightness"), parse_delta("warmth"))
    {
        (Ok(brightness), Ok(warmth)) => (brightness, warmth),
        (Err(key), _) | (_, Err(key)) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid '{key}' value"))
        }
    };

    let target = params
        .get("zone")
        .map(|zone| ZoneTarget::parse(zone))
        .unwrap_or(ZoneTarget::All);
    let event = CoordinatorEvent::Adjust {
        target,
        brightness_delta,
        warmth_delta,
    };
    respond_after(state, event).await
}

async fn handle_get_zones(State(state): State<AppState>) -> impl IntoResponse {
    let zones = state.runtime.lock().await.zones.clone();
    Json(zones)
}

async fn handle_put_zones(
    State(state): State<AppState>,
    Json(zones): Json<Vec<ZoneConfig>>,
) -> impl IntoResponse {
    if let Err(response) = send_event(&state, CoordinatorEvent::Reconfigure(zones.clone())).await {
        return response;
    }

    let runtime = {
        let mut runtime = state.runtime.lock().await;
        runtime.zones = zones;
        runtime.clone()
    };
    if let Err(err) = state.store.save_runtime_config(&runtime).await {
        warn!("failed to persist zone update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }

    Json(runtime.zones).into_response()
}

fn coordinator_unavailable() -> axum::response::Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Coordinator is not running",
    )
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_readings_are_dropped_from_snapshot() {
        let start = Instant::now();
        let mut readings = SensorReadings::default();
        readings.apply(SensorUpdate::Illuminance(Some(12.0)), start);
        readings.apply(
            SensorUpdate::Weather(Some(WeatherCondition::Fog)),
            start + Duration::from_secs(600),
        );

        let snapshot = readings.snapshot(start + Duration::from_secs(901), Duration::from_secs(900));

        assert_eq!(snapshot.illuminance_lux, None);
        assert_eq!(snapshot.weather, Some(WeatherCondition::Fog));
    }

    #[test]
    fn unavailable_update_clears_reading() {
        let now = Instant::now();
        let mut readings = SensorReadings::default();
        readings.apply(SensorUpdate::SunElevation(Some(-2.0)), now);
        readings.apply(SensorUpdate::SunElevation(None), now);

        assert_eq!(
            readings.snapshot(now, Duration::from_secs(900)).sun_elevation,
            None
        );
    }

    fn scheduler() -> CycleScheduler {
        CycleScheduler::new(Duration::from_secs(30), Duration::from_millis(250))
    }

    #[tokio::test(start_paused = true)]
    async fn tick_runs_a_cycle_every_interval() {
        let (_commands, mut receiver) = mpsc::channel::<u32>(8);
        let mut scheduler = scheduler();
        let start = Instant::now();

        assert!(matches!(scheduler.next(&mut receiver).await, Step::Cycle));
        assert!(start.elapsed() < Duration::from_millis(1));

        for round in 1..=3 {
            assert!(matches!(scheduler.next(&mut receiver).await, Step::Cycle));
            assert_eq!(start.elapsed().as_secs(), 30 * round);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_produces_one_debounced_cycle() {
        let (commands, mut receiver) = mpsc::channel(8);
        let mut scheduler = scheduler();
        let start = Instant::now();
        assert!(matches!(scheduler.next(&mut receiver).await, Step::Cycle));

        for event in 0..3u32 {
            commands.send(event).await.unwrap();
        }
        for expected in 0..3u32 {
            match scheduler.next(&mut receiver).await {
                Step::Command(event) => assert_eq!(event, expected),
                _ => panic!("expected queued command {expected}"),
            }
            scheduler.arm();
        }

        assert!(matches!(scheduler.next(&mut receiver).await, Step::Cycle));
        let debounced = start.elapsed();
        assert!(
            debounced >= Duration::from_millis(250) && debounced < Duration::from_secs(1),
            "debounced cycle at {debounced:?}"
        );

        // No second debounced cycle; the next one is the baseline tick.
        assert!(matches!(scheduler.next(&mut receiver).await, Step::Cycle));
        assert_eq!(start.elapsed().as_secs(), 30);

        drop(commands);
        assert!(matches!(scheduler.next(&mut receiver).await, Step::Closed));
    }

    #[test]
    fn every_zone_is_republished_each_cycle() {
        let mut coordinator = Coordinator::new(
            zonelight_common::EngineConfig::default(),
            default_zones(),
            ScenePreset::defaults(),
        )
        .unwrap();
        let inputs = CycleInputs {
            now: Utc::now(),
            month: Some(1),
            sensors: SensorSnapshot::default(),
        };
        coordinator.recompute(&inputs);
        let report = coordinator.recompute(&inputs);

        assert_eq!(report.changed_results().count(), 0);
        let topics: Vec<String> = zone_state_messages(&report)
            .into_iter()
            .map(|(topic, _)| topic)
            .collect();
        assert_eq!(topics.len(), default_zones().len());
        assert!(topics.contains(&zone_state_topic("main_living")));
    }
}
