//! `proxisafe-middleware` – alert and status fan-out.
//!
//! Routes safety events from the frame pipeline and the telemetry controls
//! to any number of transport clients without caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
