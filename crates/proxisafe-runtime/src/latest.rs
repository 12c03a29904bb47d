//! Single-slot store for the most recent pipeline result.
//!
//! The frame pipeline is the only writer; HTTP handlers read copies.  The
//! whole tuple is replaced under one lock so a reader never sees the frame
//! of one tick paired with the state of another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use proxisafe_types::{CaptureMode, OperationalState};

/// One published tick.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestResult {
    /// Annotated frame, JPEG-encoded. Shared so readers copy a pointer.
    pub jpeg: Arc<Vec<u8>>,
    /// Distance used for this tick's risk (real or virtual), metres.
    pub distance: Option<f64>,
    /// `true` when `distance` came from the virtual-distance fallback.
    pub virtual_distance: bool,
    pub risk: f64,
    pub state: OperationalState,
    pub capture_mode: CaptureMode,
    /// Monotonic tick counter.
    pub sequence: u64,
}

/// Cloneable handle to the shared slot.
#[derive(Debug, Clone, Default)]
pub struct ResultSlot {
    inner: Arc<Mutex<Option<LatestResult>>>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot. Last writer wins.
    pub fn publish(&self, result: LatestResult) {
        *self.lock() = Some(result);
    }

    /// Copy of the latest result, if anything has been published.
    pub fn latest(&self) -> Option<LatestResult> {
        self.lock().clone()
    }

    /// Latest encoded frame.
    pub fn frame(&self) -> Option<Arc<Vec<u8>>> {
        self.lock().as_ref().map(|r| Arc::clone(&r.jpeg))
    }

    pub fn distance(&self) -> Option<f64> {
        self.lock().as_ref().and_then(|r| r.distance)
    }

    /// Published state; `Running` before the first tick.
    pub fn state(&self) -> OperationalState {
        self.lock()
            .as_ref()
            .map(|r| r.state)
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<LatestResult>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(sequence: u64, state: OperationalState) -> LatestResult {
        LatestResult {
            jpeg: Arc::new(vec![0xFF, 0xD8, sequence as u8]),
            distance: Some(1.0),
            virtual_distance: false,
            risk: 0.4,
            state,
            capture_mode: CaptureMode::Synthetic,
            sequence,
        }
    }

    #[test]
    fn empty_slot_defaults() {
        let slot = ResultSlot::new();
        assert!(slot.latest().is_none());
        assert!(slot.frame().is_none());
        assert_eq!(slot.distance(), None);
        assert_eq!(slot.state(), OperationalState::Running);
    }

    #[test]
    fn clones_share_the_slot_and_last_writer_wins() {
        let writer = ResultSlot::new();
        let reader = writer.clone();
        writer.publish(result(1, OperationalState::Running));
        writer.publish(result(2, OperationalState::Stopped));

        let latest = reader.latest().unwrap();
        assert_eq!(latest.sequence, 2);
        assert_eq!(reader.state(), OperationalState::Stopped);
        assert_eq!(reader.frame().unwrap()[2], 2);
    }
}
