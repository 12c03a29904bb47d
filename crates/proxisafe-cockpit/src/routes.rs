//! Actix route handlers for the dashboard, status, video and stress
//! endpoints.
//!
//! Every handler reads a copy of the published state and the current sensor
//! snapshot; none of them holds a lock across serialisation.  Risk is
//! recomputed from the current readings and the last published distance, so
//! a status poll between two ticks reflects the freshest sensor values.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    HttpResponse,
    http::header,
    web::{self, Bytes},
};
use async_stream::stream;
use futures_util::Stream;
use proxisafe_hal::TelemetrySource;
use proxisafe_kernel::{Watchdog, compute_risk, suggestions};
use proxisafe_middleware::{EventBus, Topic};
use proxisafe_runtime::ResultSlot;
use proxisafe_types::{Event, EventPayload};
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::{Value, json};
use tracing::info;

const EVENT_SOURCE: &str = "proxisafe-cockpit::routes";

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

/// Interval between MJPEG parts.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(50);

const MJPEG_BOUNDARY: &str = "frame";

/// Ticks without a frame between two preamble writes (one second).
const IDLE_PREAMBLE_TICKS: u32 = 20;

/// Everything the handlers read or control.
pub struct AppState {
    pub slot: ResultSlot,
    pub telemetry: Arc<dyn TelemetrySource>,
    pub bus: EventBus,
    pub watchdog: Option<Arc<Watchdog>>,
}

impl AppState {
    pub fn new(slot: ResultSlot, telemetry: Arc<dyn TelemetrySource>, bus: EventBus) -> Self {
        Self {
            slot,
            telemetry,
            bus,
            watchdog: None,
        }
    }

    /// Report component health at `/sensor_data`.
    pub fn with_watchdog(mut self, watchdog: Arc<Watchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }
}

/// The dashboard page, pointed at the WebSocket port.
pub struct DashboardPage(String);

impl DashboardPage {
    pub fn new(ws_port: u16) -> Self {
        Self(DASHBOARD_HTML.replace("__WS_PORT__", &ws_port.to_string()))
    }

    pub fn html(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Stress parameters
// ---------------------------------------------------------------------------

/// One loosely typed request value.  Query strings only ever produce
/// [`Text`][Self::Text]; JSON bodies may produce any variant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Int(i64),
    Float(f64),
    Flag(bool),
    Text(String),
    Other(IgnoredAny),
}

impl LooseValue {
    /// Numbers truncate toward zero; text must hold an integer literal.
    fn as_seconds(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Flag(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_intensity(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Flag(b) => Some(f64::from(u8::from(*b))),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Other(_) => None,
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

/// Raw `seconds` / `intensity` as found in a query string or JSON object.
/// Unknown keys are ignored and no value is rejected at this stage.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StressFields {
    #[serde(default)]
    pub seconds: Option<LooseValue>,
    #[serde(default)]
    pub intensity: Option<LooseValue>,
}

/// Parameters of a stress start request.
///
/// Malformed values never produce an error response; they fall back to
/// [`DEFAULT_SECONDS`][Self::DEFAULT_SECONDS] and
/// [`DEFAULT_INTENSITY`][Self::DEFAULT_INTENSITY].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressParams {
    pub seconds: i64,
    pub intensity: f64,
}

impl StressParams {
    pub const DEFAULT_SECONDS: i64 = 30;
    pub const DEFAULT_INTENSITY: f64 = 0.9;

    /// Query values first; keys missing (or empty) in the query are taken
    /// from the body.
    ///
    /// ```rust
    /// use proxisafe_cockpit::{StressFields, StressParams};
    ///
    /// let query: StressFields =
    ///     serde_json::from_str(r#"{"seconds": "abc", "intensity": "0.4"}"#).unwrap();
    /// let params = StressParams::resolve(query, StressFields::default());
    /// assert_eq!(params.seconds, 30);
    /// assert_eq!(params.intensity, 0.4);
    /// ```
    pub fn resolve(query: StressFields, body: StressFields) -> Self {
        let pick =
            |q: Option<LooseValue>, b: Option<LooseValue>| q.filter(|v| !v.is_blank()).or(b);
        let seconds = pick(query.seconds, body.seconds);
        let intensity = pick(query.intensity, body.intensity);

        Self {
            seconds: seconds
                .as_ref()
                .and_then(LooseValue::as_seconds)
                .unwrap_or(Self::DEFAULT_SECONDS),
            intensity: intensity
                .as_ref()
                .and_then(LooseValue::as_intensity)
                .unwrap_or(Self::DEFAULT_INTENSITY),
        }
    }

    /// Parameters carried in a JSON object, e.g. a WebSocket control
    /// message.
    pub fn from_json(value: &Value) -> Self {
        let fields = StressFields::deserialize(value).unwrap_or_default();
        Self::resolve(fields, StressFields::default())
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Register every HTTP route.  Known paths answer 405 to other methods;
/// unknown paths answer 404.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(web::get().to(index))
            .route(web::head().to(index)),
    )
    .service(web::resource("/video_feed").route(web::get().to(video_feed)))
    .service(
        web::resource("/sensor_data")
            .route(web::get().to(sensor_data))
            .route(web::head().to(sensor_data)),
    )
    .service(
        web::resource("/api/system")
            .route(web::get().to(system))
            .route(web::head().to(system)),
    )
    .service(
        web::resource("/api/suggestions")
            .route(web::get().to(api_suggestions))
            .route(web::head().to(api_suggestions)),
    )
    .service(
        web::resource("/stress/start")
            .route(web::get().to(stress_start))
            .route(web::post().to(stress_start)),
    )
    .service(
        web::resource("/stress/stop")
            .route(web::get().to(stress_stop))
            .route(web::post().to(stress_stop)),
    );
}

async fn index(page: web::Data<DashboardPage>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page.html().to_owned())
}

async fn sensor_data(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(status_record(&state))
}

async fn system(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(system_record(&state))
}

async fn api_suggestions(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(suggestions_record(&state))
}

/// A query or body that fails to deserialize is treated as absent.
async fn stress_start(
    state: web::Data<AppState>,
    query: Option<web::Query<StressFields>>,
    body: Option<web::Json<StressFields>>,
) -> HttpResponse {
    let params = StressParams::resolve(
        query.map(web::Query::into_inner).unwrap_or_default(),
        body.map(web::Json::into_inner).unwrap_or_default(),
    );
    HttpResponse::Ok().json(apply_stress(&state, params))
}

async fn stress_stop(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(stop_stress(&state))
}

/// Endless `multipart/x-mixed-replace` stream of the latest frame.
async fn video_feed(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .content_type(format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}"))
        .streaming(mjpeg_parts(state.into_inner()))
}

/// One part per [`FRAME_INTERVAL`] once a frame has been published.  Until
/// then a CRLF preamble goes out every second, so a viewer that left is
/// noticed by the failed write.
pub(crate) fn mjpeg_parts(
    state: Arc<AppState>,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    stream! {
        let mut ticker = actix_web::rt::time::interval(FRAME_INTERVAL);
        let mut idle_ticks: u32 = 0;
        loop {
            ticker.tick().await;
            match state.slot.frame() {
                Some(jpeg) => {
                    yield Ok::<Bytes, actix_web::Error>(mjpeg_part(&jpeg));
                }
                None => {
                    if idle_ticks % IDLE_PREAMBLE_TICKS == 0 {
                        yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"\r\n"));
                    }
                    idle_ticks = idle_ticks.wrapping_add(1);
                }
            }
        }
    }
}

fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let head = format!("--{MJPEG_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut payload = Vec::with_capacity(head.len() + jpeg.len() + 2);
    payload.extend_from_slice(head.as_bytes());
    payload.extend_from_slice(jpeg);
    payload.extend_from_slice(b"\r\n");
    Bytes::from(payload)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// `{sensors, distance_m, risk, system_state, stress, capture_mode, health}`
pub fn status_record(state: &AppState) -> Value {
    let sensors = state.telemetry.snapshot();
    let latest = state.slot.latest();
    let distance = latest.as_ref().and_then(|r| r.distance);
    let health = state
        .watchdog
        .as_ref()
        .map(|wd| json!(wd.report()))
        .unwrap_or_else(|| json!({}));

    json!({
        "sensors": sensors,
        "distance_m": distance,
        "risk": compute_risk(&sensors, distance),
        "system_state": state.slot.state(),
        "stress": state.telemetry.stress_status(),
        "virtual_distance": latest.as_ref().is_some_and(|r| r.virtual_distance),
        "capture_mode": latest.as_ref().map(|r| r.capture_mode),
        "health": health,
    })
}

/// `{state, risk, distance_m}`
pub fn system_record(state: &AppState) -> Value {
    let distance = state.slot.distance();
    json!({
        "state": state.slot.state(),
        "risk": compute_risk(&state.telemetry.snapshot(), distance),
        "distance_m": distance,
    })
}

/// `{suggestions: [...]}`
pub fn suggestions_record(state: &AppState) -> Value {
    let distance = state.slot.distance();
    let risk = compute_risk(&state.telemetry.snapshot(), distance);
    json!({ "suggestions": suggestions(distance, risk) })
}

/// Open a stress window and answer with the window actually in force.
pub(crate) fn apply_stress(state: &AppState, params: StressParams) -> Value {
    let window = state
        .telemetry
        .trigger_stress(params.seconds.max(0) as u64, params.intensity);
    let seconds = window
        .until
        .saturating_duration_since(window.started_at)
        .as_secs();
    info!(
        requested_seconds = params.seconds,
        seconds,
        intensity = window.intensity,
        "stress window started"
    );
    // Only the dashboard and ws clients care; an empty bus is normal.
    state.bus.publish_to(
        Topic::SafetyAlerts,
        Event::new(
            EVENT_SOURCE,
            EventPayload::StressStarted {
                seconds,
                intensity: window.intensity,
            },
        ),
    );
    json!({ "ok": true, "seconds": seconds, "intensity": window.intensity })
}

pub(crate) fn stop_stress(state: &AppState) -> Value {
    let was_active = state.telemetry.active_stress().is_some();
    state.telemetry.cancel_stress();
    info!(was_active, "stress window cancelled");
    state.bus.publish_to(
        Topic::SafetyAlerts,
        Event::new(EVENT_SOURCE, EventPayload::StressCancelled),
    );
    json!({ "ok": true })
}
