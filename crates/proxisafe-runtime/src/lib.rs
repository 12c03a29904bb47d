//! `proxisafe-runtime` – the frame loop.
//!
//! Ties capture, distance filtering, risk scoring and publication together
//! and runs them on background workers.
//!
//! # Modules
//!
//! - [`pipeline`] – [`FramePipeline`][pipeline::FramePipeline]: one tick is
//!   capture → markers → distance (or virtual distance) → risk → state →
//!   overlay → JPEG → publish.  Runs on a dedicated OS thread because the
//!   capture drivers block.
//! - [`latest`] – [`ResultSlot`][latest::ResultSlot]: the lock-guarded
//!   single slot holding the most recent published frame and decision.
//! - [`overlay`] – HUD rendering onto frames and JPEG encoding.
//! - [`presence`] – [`PresenceDetector`][presence::PresenceDetector]: optional
//!   annotation-only detector (e.g. a person box).
//! - [`tasks`] – [`run_sensor_task`][tasks::run_sensor_task]: the async
//!   periodic sensor update.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP span export.

pub mod latest;
pub mod overlay;
pub mod pipeline;
pub mod presence;
pub mod tasks;
pub mod telemetry;

pub use latest::{LatestResult, ResultSlot};
pub use pipeline::{FramePipeline, PipelineConfig, TickOutcome};
pub use presence::{NoPresence, PresenceBox, PresenceDetector};
pub use tasks::run_sensor_task;
pub use telemetry::{TracerProviderGuard, init_tracing};
