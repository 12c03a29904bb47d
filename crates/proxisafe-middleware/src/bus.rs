//! Fan-out of safety events to any number of viewers.
//!
//! One [`tokio::sync::broadcast`] channel per topic: each viewer gets its own
//! copy of every event and a slow viewer only loses its own backlog.
//! Publishing never blocks, so the frame pipeline thread can publish from
//! outside the async runtime.
//!
//! # Topics
//!
//! | Topic | Carries |
//! |---|---|
//! | [`Topic::Telemetry`] | Per-tick status records (sensors, distance, risk) |
//! | [`Topic::SafetyAlerts`] | State transitions, capture demotions, stress windows |

use proxisafe_types::Event;
use tokio::sync::broadcast;
use tracing::warn;

/// Events buffered per topic before a lagging viewer starts losing them.
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// High-frequency status records.
    Telemetry,
    /// Low-frequency, operator-relevant safety events.
    SafetyAlerts,
}

/// Handle to the per-topic channels; clones publish into the same channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    telemetry: broadcast::Sender<Event>,
    safety_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` events are buffered on each topic.
    pub fn new(capacity: usize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity);
        let (safety_alerts, _) = broadcast::channel(capacity);
        Self {
            telemetry,
            safety_alerts,
        }
    }

    /// Hand `event` to every current subscriber of `topic` and return how
    /// many there were.
    /// Returns `0` when nobody is listening, which is a normal condition for
    /// a monitor running without connected viewers.
    pub fn publish_to(&self, topic: Topic, event: Event) -> usize {
        self.topic_sender(topic).send(event).unwrap_or(0)
    }

    /// Start receiving `topic` from now on.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::SafetyAlerts => &self.safety_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Subscription to one [`Topic`], from [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Next event, or `Lagged(n)` when `n` events were overwritten before
    /// this subscriber read them, or `Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Like [`recv`][Self::recv] but skips over lag notifications.
    ///
    /// Returns `None` once the bus is closed.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "topic receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`next_event`][Self::next_event] for
    /// synchronous callers. Returns `None` when nothing is queued.
    pub fn next_event_now(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "topic receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Subscribed topic.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
