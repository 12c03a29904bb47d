//! Monitor configuration – reads/writes `~/.proxisafe/config.toml`.
//!
//! A missing file is not an error: every field has a default and the monitor
//! runs on the synthetic camera with no configuration at all.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use proxisafe_hal::CaptureConfig;
use proxisafe_perception::DistanceFilterConfig;
use proxisafe_runtime::PipelineConfig;
use proxisafe_types::SafetyError;
use serde::{Deserialize, Serialize};

/// Persisted settings stored in `~/.proxisafe/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP port for the cockpit.
    pub http_port: u16,

    /// WebSocket port for the event bridge.
    pub ws_port: u16,

    /// MJPEG stream of an IP camera, e.g. `http://cam.local:8080/video`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,

    /// Single-JPEG endpoint of the same camera, e.g. `http://cam.local:8080/shot.jpg`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_url: Option<String>,

    pub device_index: u32,

    /// Consecutive failed reads before the capture source is demoted.
    pub failure_threshold: u32,

    pub snapshot_timeout_ms: u64,

    /// Physical side length of the tracked marker, metres.
    pub marker_size_m: f64,

    /// Marker id to track; the largest visible marker when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<i32>,

    /// EMA weight of the newest distance sample.
    pub smooth_alpha: f64,

    /// Marker-less frames tolerated before the distance filter resets.
    pub stale_frames: u32,

    pub tick_ms: u64,

    pub sensor_interval_ms: u64,

    pub jpeg_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: proxisafe_cockpit::DEFAULT_PORT,
            ws_port: proxisafe_cockpit::DEFAULT_WS_PORT,
            stream_url: None,
            snapshot_url: None,
            device_index: 0,
            failure_threshold: proxisafe_hal::capture::DEFAULT_FAILURE_THRESHOLD,
            snapshot_timeout_ms: 3000,
            marker_size_m: proxisafe_perception::distance::DEFAULT_MARKER_SIZE_M,
            target_id: None,
            smooth_alpha: proxisafe_perception::distance::DEFAULT_ALPHA,
            stale_frames: proxisafe_perception::distance::DEFAULT_STALE_FRAMES,
            tick_ms: 30,
            sensor_interval_ms: 1000,
            jpeg_quality: proxisafe_runtime::overlay::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Config {
    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            stream_url: self.stream_url.clone(),
            snapshot_url: self.snapshot_url.clone(),
            device_index: self.device_index,
            failure_threshold: self.failure_threshold.max(1),
            snapshot_timeout: Duration::from_millis(self.snapshot_timeout_ms),
            ..CaptureConfig::default()
        }
    }

    pub fn distance_filter(&self) -> DistanceFilterConfig {
        DistanceFilterConfig {
            alpha: self.smooth_alpha,
            marker_size: self.marker_size_m,
            target_id: self.target_id,
            stale_frames: self.stale_frames,
            ..DistanceFilterConfig::default()
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            tick: Duration::from_millis(self.tick_ms.max(1)),
            jpeg_quality: self.jpeg_quality,
            ..PipelineConfig::default()
        }
    }

    pub fn sensor_interval(&self) -> Duration {
        Duration::from_millis(self.sensor_interval_ms)
    }
}

/// Return the path to `~/.proxisafe/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".proxisafe").join("config.toml")
}

/// Resolve the effective configuration: file (or defaults), then
/// environment overrides.
///
/// # Errors
///
/// Returns [`SafetyError::Config`] when the file exists but cannot be read
/// or parsed.
pub fn load() -> Result<Config, SafetyError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the file at `path`.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, SafetyError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        SafetyError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| SafetyError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply environment overrides to `cfg`.  Unparseable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `IP_CAM_URL` | `stream_url` (empty = unset) |
/// | `IP_CAM_SNAPSHOT_URL` | `snapshot_url` (empty = unset) |
/// | `PROXISAFE_PORT` | `http_port` |
/// | `PROXISAFE_WS_PORT` | `ws_port` |
/// | `PROXISAFE_MARKER_SIZE` | `marker_size_m` |
/// | `PROXISAFE_TARGET_ID` | `target_id` |
/// | `PROXISAFE_SMOOTH_ALPHA` | `smooth_alpha` |
/// | `PROXISAFE_TICK_MS` | `tick_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("IP_CAM_URL") {
        cfg.stream_url = non_blank(v);
    }
    if let Ok(v) = std::env::var("IP_CAM_SNAPSHOT_URL") {
        cfg.snapshot_url = non_blank(v);
    }
    if let Some(port) = parsed_var("PROXISAFE_PORT") {
        cfg.http_port = port;
    }
    if let Some(port) = parsed_var("PROXISAFE_WS_PORT") {
        cfg.ws_port = port;
    }
    if let Some(size) = parsed_var::<f64>("PROXISAFE_MARKER_SIZE")
        && size.is_finite()
        && size > 0.0
    {
        cfg.marker_size_m = size;
    }
    if let Some(id) = parsed_var("PROXISAFE_TARGET_ID") {
        cfg.target_id = Some(id);
    }
    if let Some(alpha) = parsed_var("PROXISAFE_SMOOTH_ALPHA") {
        cfg.smooth_alpha = alpha;
    }
    if let Some(tick) = parsed_var("PROXISAFE_TICK_MS") {
        cfg.tick_ms = tick;
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn non_blank(v: String) -> Option<String> {
    let trimmed = v.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Save `cfg` to `~/.proxisafe/config.toml`, creating the directory.
pub fn save(cfg: &Config) -> Result<PathBuf, SafetyError> {
    let path = config_path();
    save_to(cfg, &path)?;
    Ok(path)
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), SafetyError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            SafetyError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    fs::write(path, to_toml(cfg)?)
        .map_err(|e| SafetyError::Config(format!("failed to write {}: {e}", path.display())))
}

pub fn to_toml(cfg: &Config) -> Result<String, SafetyError> {
    toml::to_string_pretty(cfg)
        .map_err(|e| SafetyError::Config(format!("failed to serialize config: {e}")))
}
