//! `proxisafe-cockpit` – HTTP + WebSocket transport for operators.
//!
//! Boots an actix-web server (default port `5000`) that:
//!
//! 1. **Serves** the embedded dashboard at `/`.
//! 2. **Streams** the latest annotated frame as `multipart/x-mixed-replace`
//!    MJPEG at `/video_feed`.
//! 3. **Reports** status at `/sensor_data`, `/api/system` and
//!    `/api/suggestions`.
//! 4. **Controls** the stress window at `/stress/start` and `/stress/stop`
//!    (GET or POST, query string or JSON body).
//! 5. **Bridges** the [`EventBus`][proxisafe_middleware::EventBus] to
//!    WebSocket clients at `/ws` on a second Tokio listener (default port
//!    `5001`).
//!
//! Handlers only read published state; they never block the frame pipeline.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use proxisafe_cockpit::{AppState, CockpitServer};
//! use proxisafe_hal::SensorBank;
//! use proxisafe_middleware::EventBus;
//! use proxisafe_runtime::ResultSlot;
//!
//! #[tokio::main]
//! async fn main() {
//!     let state = AppState::new(ResultSlot::new(), Arc::new(SensorBank::new()), EventBus::default());
//!     CockpitServer::new(Arc::new(state))
//!         .run()
//!         .await
//!         .expect("cockpit server failed");
//! }
//! ```

pub mod routes;
pub mod server;

pub use routes::{AppState, DashboardPage, LooseValue, StressFields, StressParams};
pub use server::{CockpitServer, DEFAULT_PORT, DEFAULT_WS_PORT, HttpThread};
