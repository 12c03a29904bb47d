//! [`CaptureSourceManager`] – camera/stream lifecycle and failover.
//!
//! At startup the manager probes, in priority order:
//!
//! 1. a live MJPEG stream (`stream_url`),
//! 2. a pull-based snapshot endpoint (`snapshot_url`),
//! 3. a local capture device through each [`DeviceBackend`] in turn,
//! 4. the [`SyntheticCamera`], which never fails.
//!
//! While in `Stream` or `LocalDevice` mode every failed read is counted.
//! Once `failure_threshold` consecutive reads have failed the manager demotes
//! itself to `Snapshot` (when a snapshot endpoint is configured) or to
//! `Synthetic`.  Demotion is one-way for the rest of the run.

use std::time::Duration;

use proxisafe_types::{CaptureMode, SafetyError};
use tracing::{debug, info, warn};

use crate::camera::{Camera, CameraFrame};
use crate::device::DeviceBackend;
use crate::snapshot::{DEFAULT_SNAPSHOT_TIMEOUT, SnapshotClient};
use crate::stream::{DEFAULT_READ_TIMEOUT, MjpegStream};
use crate::synthetic::{DEFAULT_SYNTHETIC_SIZE, SyntheticCamera};

/// Consecutive failed reads that trigger a demotion (several seconds at the
/// nominal frame cadence).
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 200;

/// Acquisition settings.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub stream_url: Option<String>,
    pub snapshot_url: Option<String>,
    /// Local device number handed to each backend.
    pub device_index: u32,
    pub failure_threshold: u32,
    /// Bound on one snapshot fetch, also used as the stream connect timeout.
    pub snapshot_timeout: Duration,
    /// Longest wait for the next frame of an open stream.
    pub stream_read_timeout: Duration,
    pub synthetic_size: (u32, u32),
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            stream_url: None,
            snapshot_url: None,
            device_index: 0,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            snapshot_timeout: DEFAULT_SNAPSHOT_TIMEOUT,
            stream_read_timeout: DEFAULT_READ_TIMEOUT,
            synthetic_size: DEFAULT_SYNTHETIC_SIZE,
        }
    }
}

/// A one-way mode change, reported once via
/// [`CaptureSourceManager::take_demotion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demotion {
    pub from: CaptureMode,
    pub to: CaptureMode,
}

/// Owns the active acquisition source. Exactly one mode is active at a time.
pub struct CaptureSourceManager {
    mode: CaptureMode,
    /// Open handle while in `Stream` or `LocalDevice` mode.
    live: Option<Box<dyn Camera>>,
    snapshot: Option<SnapshotClient>,
    synthetic: SyntheticCamera,
    consecutive_failures: u32,
    failure_threshold: u32,
    pending_demotion: Option<Demotion>,
}

impl CaptureSourceManager {
    /// Probe the configured sources once and settle on the best one.
    pub fn probe(config: &CaptureConfig, backends: &[Box<dyn DeviceBackend>]) -> Self {
        let snapshot = non_empty(config.snapshot_url.as_deref()).and_then(|url| {
            SnapshotClient::new(url, config.snapshot_timeout)
                .map_err(|e| warn!(error = %e, "snapshot endpoint unusable"))
                .ok()
        });

        let mut mode = CaptureMode::Synthetic;
        let mut live: Option<Box<dyn Camera>> = None;

        if let Some(url) = non_empty(config.stream_url.as_deref()) {
            match MjpegStream::open(url, config.snapshot_timeout, config.stream_read_timeout) {
                Ok(stream) => {
                    info!(url, "capture: using live stream");
                    mode = CaptureMode::Stream;
                    live = Some(Box::new(stream));
                }
                Err(e) => warn!(url, error = %e, "capture: stream unopenable"),
            }
        }

        if live.is_none() {
            if let Some(client) = &snapshot {
                info!(url = client.url(), "capture: using snapshot endpoint");
                mode = CaptureMode::Snapshot;
            } else if let Some(camera) = open_first_device(backends, config.device_index) {
                mode = CaptureMode::LocalDevice;
                live = Some(camera);
            } else {
                info!("capture: no camera available, falling back to synthetic source");
            }
        }

        Self::assemble(mode, live, snapshot, config)
    }

    /// A manager locked to the synthetic source.
    pub fn synthetic(config: &CaptureConfig) -> Self {
        Self::assemble(CaptureMode::Synthetic, None, None, config)
    }

    fn assemble(
        mode: CaptureMode,
        live: Option<Box<dyn Camera>>,
        snapshot: Option<SnapshotClient>,
        config: &CaptureConfig,
    ) -> Self {
        let (w, h) = config.synthetic_size;
        Self {
            mode,
            live,
            snapshot,
            synthetic: SyntheticCamera::with_size("synthetic", w, h),
            consecutive_failures: 0,
            failure_threshold: config.failure_threshold.max(1),
            pending_demotion: None,
        }
    }

    /// The currently active mode.
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Return the next frame, or `None` when nothing is available this tick.
    ///
    /// Never blocks longer than the driver's read timeout (live modes) or the
    /// snapshot timeout (snapshot mode).  Synthetic mode always yields a
    /// frame.
    pub fn next_frame(&mut self) -> Option<CameraFrame> {
        match self.mode {
            CaptureMode::Stream | CaptureMode::LocalDevice => self.read_live(),
            CaptureMode::Snapshot => self.read_snapshot(),
            CaptureMode::Synthetic => Some(self.synthetic.frame()),
        }
    }

    /// The most recent demotion, if it has not been taken yet.
    pub fn take_demotion(&mut self) -> Option<Demotion> {
        self.pending_demotion.take()
    }

    /// Release any open device or stream handle.
    ///
    /// The manager keeps serving synthetic frames afterwards.
    pub fn release(&mut self) {
        if let Some(camera) = self.live.take() {
            debug!(camera = camera.id(), "capture: releasing handle");
        }
        if matches!(self.mode, CaptureMode::Stream | CaptureMode::LocalDevice) {
            self.mode = CaptureMode::Synthetic;
        }
    }

    fn read_live(&mut self) -> Option<CameraFrame> {
        let result = match self.live.as_mut() {
            Some(camera) => camera.capture(),
            None => Err(SafetyError::Capture {
                source_name: self.mode.to_string(),
                details: "no open handle".to_string(),
            }),
        };
        match result {
            Ok(frame) if frame.is_valid() => {
                self.consecutive_failures = 0;
                Some(frame)
            }
            Ok(_) => {
                self.record_failure("empty frame");
                None
            }
            Err(e) => {
                self.record_failure(&e.to_string());
                None
            }
        }
    }

    fn read_snapshot(&mut self) -> Option<CameraFrame> {
        let Some(client) = &self.snapshot else {
            self.demote();
            return None;
        };
        match client.fetch() {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!(error = %e, "capture: snapshot unavailable");
                None
            }
        }
    }

    fn record_failure(&mut self, reason: &str) {
        self.consecutive_failures += 1;
        debug!(
            mode = %self.mode,
            failures = self.consecutive_failures,
            reason,
            "capture: read failed"
        );
        if self.consecutive_failures >= self.failure_threshold {
            self.demote();
        }
    }

    /// One-way transition out of the current mode.
    fn demote(&mut self) {
        let from = self.mode;
        let to = match from {
            CaptureMode::Stream | CaptureMode::LocalDevice if self.snapshot.is_some() => {
                CaptureMode::Snapshot
            }
            _ => CaptureMode::Synthetic,
        };
        if from == to {
            return;
        }
        warn!(
            %from,
            %to,
            failures = self.consecutive_failures,
            "capture: source failing, demoting"
        );
        self.live = None;
        self.mode = to;
        self.consecutive_failures = 0;
        self.pending_demotion = Some(Demotion { from, to });
    }
}

impl Drop for CaptureSourceManager {
    fn drop(&mut self) {
        self.release();
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn open_first_device(backends: &[Box<dyn DeviceBackend>], index: u32) -> Option<Box<dyn Camera>> {
    for backend in backends {
        match backend.open(index) {
            Ok(camera) => {
                info!(backend = backend.name(), index, "capture: using local device");
                return Some(camera);
            }
            Err(e) => debug!(backend = backend.name(), index, error = %e, "capture: backend failed"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Device that yields `good_frames` frames and then fails forever.
    struct FlakyCamera {
        good_frames: usize,
        reads: Arc<AtomicUsize>,
    }

    impl Camera for FlakyCamera {
        fn id(&self) -> &str {
            "flaky"
        }

        fn capture(&mut self) -> Result<CameraFrame, SafetyError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if n < self.good_frames {
                Ok(CameraFrame::filled(4, 4, [1, 1, 1]))
            } else {
                Err(SafetyError::Capture {
                    source_name: "flaky".into(),
                    details: "unplugged".into(),
                })
            }
        }
    }

    struct FlakyBackend {
        good_frames: usize,
        reads: Arc<AtomicUsize>,
    }

    impl DeviceBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        fn open(&self, _index: u32) -> Result<Box<dyn Camera>, SafetyError> {
            Ok(Box::new(FlakyCamera {
                good_frames: self.good_frames,
                reads: Arc::clone(&self.reads),
            }))
        }
    }

    struct MissingBackend;

    impl DeviceBackend for MissingBackend {
        fn name(&self) -> &str {
            "missing"
        }

        fn open(&self, index: u32) -> Result<Box<dyn Camera>, SafetyError> {
            Err(SafetyError::Capture {
                source_name: "missing".into(),
                details: format!("no device {index}"),
            })
        }
    }

    fn small_config() -> CaptureConfig {
        CaptureConfig {
            failure_threshold: 5,
            synthetic_size: (64, 64),
            ..CaptureConfig::default()
        }
    }

    fn flaky(good_frames: usize) -> (Box<dyn DeviceBackend>, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let backend = FlakyBackend {
            good_frames,
            reads: Arc::clone(&reads),
        };
        (Box::new(backend), reads)
    }

    #[test]
    fn nothing_configured_selects_synthetic_and_never_fails() {
        let mut manager = CaptureSourceManager::probe(&small_config(), &[]);
        assert_eq!(manager.mode(), CaptureMode::Synthetic);
        for _ in 0..1000 {
            let frame = manager.next_frame().expect("synthetic mode must always yield");
            assert!(frame.is_valid());
        }
    }

    #[test]
    fn blank_urls_count_as_unconfigured() {
        let config = CaptureConfig {
            stream_url: Some("   ".into()),
            snapshot_url: Some(String::new()),
            ..small_config()
        };
        let manager = CaptureSourceManager::probe(&config, &[]);
        assert_eq!(manager.mode(), CaptureMode::Synthetic);
    }

    #[test]
    fn first_working_backend_wins() {
        let (flaky_backend, _) = flaky(10);
        let backends: Vec<Box<dyn DeviceBackend>> =
            vec![Box::new(MissingBackend) as Box<dyn DeviceBackend>, flaky_backend];
        let mut manager = CaptureSourceManager::probe(&small_config(), &backends);
        assert_eq!(manager.mode(), CaptureMode::LocalDevice);
        assert_eq!(manager.next_frame().unwrap().width, 4);
    }

    #[test]
    fn unreachable_stream_falls_through_to_device() {
        let (backend, _) = flaky(1);
        let config = CaptureConfig {
            stream_url: Some("http://127.0.0.1:9/video".into()),
            snapshot_timeout: Duration::from_millis(300),
            ..small_config()
        };
        let manager = CaptureSourceManager::probe(&config, &[backend]);
        assert_eq!(manager.mode(), CaptureMode::LocalDevice);
    }

    #[test]
    fn silent_stream_endpoint_falls_through_within_bound() {
        use std::io::Read;
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/video", listener.local_addr().unwrap());
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request);
            std::thread::sleep(Duration::from_secs(2));
        });

        let config = CaptureConfig {
            stream_url: Some(url),
            snapshot_timeout: Duration::from_millis(300),
            stream_read_timeout: Duration::from_millis(200),
            ..small_config()
        };
        let start = std::time::Instant::now();
        let manager = CaptureSourceManager::probe(&config, &[]);
        assert_eq!(manager.mode(), CaptureMode::Synthetic);
        assert!(start.elapsed() < Duration::from_millis(1500));
        server.join().unwrap();
    }

    #[test]
    fn snapshot_outranks_local_device() {
        let (backend, reads) = flaky(1);
        let config = CaptureConfig {
            snapshot_url: Some("http://127.0.0.1:9/shot.jpg".into()),
            snapshot_timeout: Duration::from_millis(300),
            ..small_config()
        };
        let mut manager = CaptureSourceManager::probe(&config, &[backend]);
        assert_eq!(manager.mode(), CaptureMode::Snapshot);
        // A failing snapshot yields nothing instead of erroring.
        assert!(manager.next_frame().is_none());
        assert_eq!(reads.load(Ordering::SeqCst), 0, "device must not be opened");
    }

    #[test]
    fn sustained_failures_demote_to_synthetic() {
        let (backend, _) = flaky(2);
        let mut manager = CaptureSourceManager::probe(&small_config(), &[backend]);
        assert!(manager.next_frame().is_some());
        assert!(manager.next_frame().is_some());

        for _ in 0..4 {
            assert!(manager.next_frame().is_none());
            assert_eq!(manager.mode(), CaptureMode::LocalDevice);
        }
        assert!(manager.next_frame().is_none());
        assert_eq!(manager.mode(), CaptureMode::Synthetic);
        assert_eq!(
            manager.take_demotion(),
            Some(Demotion {
                from: CaptureMode::LocalDevice,
                to: CaptureMode::Synthetic,
            })
        );
        assert_eq!(manager.take_demotion(), None);
        assert!(manager.next_frame().is_some());
    }

    #[test]
    fn successful_read_resets_failure_count() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut manager = CaptureSourceManager::assemble(
            CaptureMode::LocalDevice,
            Some(Box::new(FlakyCamera {
                good_frames: 0,
                reads: Arc::clone(&reads),
            })),
            None,
            &small_config(),
        );
        manager.next_frame();
        manager.next_frame();
        assert_eq!(manager.consecutive_failures(), 2);

        manager.live = Some(Box::new(FlakyCamera {
            good_frames: usize::MAX,
            reads: Arc::new(AtomicUsize::new(0)),
        }));
        assert!(manager.next_frame().is_some());
        assert_eq!(manager.consecutive_failures(), 0);
    }

    #[test]
    fn failing_live_source_demotes_to_snapshot_when_configured() {
        let reads = Arc::new(AtomicUsize::new(0));
        let config = small_config();
        let snapshot =
            SnapshotClient::new("http://127.0.0.1:9/shot.jpg", Duration::from_millis(300)).ok();
        let mut manager = CaptureSourceManager::assemble(
            CaptureMode::Stream,
            Some(Box::new(FlakyCamera {
                good_frames: 0,
                reads,
            })),
            snapshot,
            &config,
        );
        for _ in 0..config.failure_threshold {
            manager.next_frame();
        }
        assert_eq!(manager.mode(), CaptureMode::Snapshot);
        assert_eq!(
            manager.take_demotion().map(|d| d.to),
            Some(CaptureMode::Snapshot)
        );
    }

    #[test]
    fn release_drops_handle_and_falls_back_to_synthetic() {
        let (backend, _) = flaky(usize::MAX);
        let mut manager = CaptureSourceManager::probe(&small_config(), &[backend]);
        manager.release();
        assert_eq!(manager.mode(), CaptureMode::Synthetic);
        assert!(manager.live.is_none());
        assert!(manager.next_frame().is_some());
    }
}
